use super::*;
use crate::test_support::{Op, PixelSurface};

fn layer(name: &str, persistence: Persistence) -> Layer<PixelSurface> {
    Layer::new(name, PixelSurface::new(Size::new(64.0, 64.0)), Placement::Overlay, persistence)
}

fn paint(layer: &mut Layer<PixelSurface>) {
    layer.surface_mut().fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), "red", 1.0);
    layer.mark_drawn();
}

// =============================================================
// Layer
// =============================================================

#[test]
fn new_transient_layer_needs_first_clear() {
    let l = layer("cursor", Persistence::Transient);
    assert!(!l.is_cleared());
    assert!(l.needs_clear());
}

#[test]
fn persistent_layer_never_needs_clear() {
    let mut l = layer("map", Persistence::Persistent);
    paint(&mut l);
    assert!(!l.needs_clear());
    assert!(l.is_persistent());
}

#[test]
fn clear_wipes_view_rect_and_sets_flag() {
    let mut l = layer("cursor", Persistence::Transient);
    paint(&mut l);
    l.clear(Size::new(64.0, 64.0));
    assert!(l.is_cleared());
    assert_eq!(l.surface().painted(), 0);
    assert_eq!(l.surface().ops.last(), Some(&Op::ClearRect(Rect::new(0.0, 0.0, 64.0, 64.0))));
}

#[test]
fn mark_drawn_resets_cleared_on_transient() {
    let mut l = layer("cursor", Persistence::Transient);
    l.clear(Size::new(64.0, 64.0));
    assert!(!l.needs_clear());
    l.mark_drawn();
    assert!(l.needs_clear());
}

#[test]
fn accessors_report_construction_values() {
    let l = Layer::new("bg", PixelSurface::new(Size::new(4.0, 4.0)), Placement::Background, Persistence::Persistent);
    assert_eq!(l.name(), "bg");
    assert_eq!(l.placement(), Placement::Background);
    assert_eq!(l.persistence(), Persistence::Persistent);
}

// =============================================================
// LayerRegistry
// =============================================================

#[test]
fn registry_starts_empty() {
    let reg: LayerRegistry<PixelSurface> = LayerRegistry::new();
    assert!(reg.is_empty());
    assert_eq!(reg.len(), 0);
}

#[test]
fn registry_preserves_insertion_order() {
    let mut reg = LayerRegistry::new();
    reg.insert(layer("a", Persistence::Persistent));
    reg.insert(layer("b", Persistence::Transient));
    reg.insert(layer("c", Persistence::Persistent));
    let names: Vec<_> = reg.iter().map(Layer::name).collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn registry_insert_same_name_replaces_in_place() {
    let mut reg = LayerRegistry::new();
    reg.insert(layer("a", Persistence::Persistent));
    reg.insert(layer("b", Persistence::Persistent));
    let old = reg.insert(layer("a", Persistence::Transient));
    assert!(old.is_some_and(|l| l.is_persistent()));
    assert_eq!(reg.len(), 2);
    assert!(!reg.get("a").is_some_and(Layer::is_persistent));
    assert_eq!(reg.iter().next().map(Layer::name), Some("a"));
}

#[test]
fn registry_lookup_missing() {
    let mut reg: LayerRegistry<PixelSurface> = LayerRegistry::new();
    assert!(reg.get("nope").is_none());
    assert!(reg.get_mut("nope").is_none());
    assert!(!reg.contains("nope"));
}

#[test]
fn clear_transient_only_touches_dirty_transient_layers() {
    let mut reg = LayerRegistry::new();
    reg.insert(layer("map", Persistence::Persistent));
    reg.insert(layer("fx", Persistence::Transient));
    if let Some(l) = reg.get_mut("map") {
        paint(l);
    }
    if let Some(l) = reg.get_mut("fx") {
        paint(l);
    }

    assert_eq!(reg.clear_transient(Size::new(64.0, 64.0)), 1);
    assert!(reg.get("map").is_some_and(|l| l.surface().painted() > 0));
    assert!(reg.get("fx").is_some_and(|l| l.surface().painted() == 0));
}

#[test]
fn clear_transient_twice_is_noop_second_time() {
    let mut reg = LayerRegistry::new();
    reg.insert(layer("fx", Persistence::Transient));
    if let Some(l) = reg.get_mut("fx") {
        paint(l);
    }
    assert_eq!(reg.clear_transient(Size::new(64.0, 64.0)), 1);
    let ops_after_first = reg.get("fx").map(|l| l.surface().ops.len());

    assert_eq!(reg.clear_transient(Size::new(64.0, 64.0)), 0);
    assert_eq!(reg.get("fx").map(|l| l.surface().ops.len()), ops_after_first);
}

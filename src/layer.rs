//! Named drawing layers and their clear bookkeeping.
//!
//! Transient layers are wiped once per tick, but only if something was
//! drawn on them since the last wipe. The `cleared` flag tracks that: draws
//! reset it, wipes set it.

#[cfg(test)]
#[path = "layer_test.rs"]
mod layer_test;

use std::collections::HashMap;

use crate::geom::{Rect, Size};
use crate::surface::{Persistence, Placement, Surface};

/// A named surface plus its placement and persistence.
pub struct Layer<S> {
    name: String,
    surface: S,
    placement: Placement,
    persistence: Persistence,
    cleared: bool,
}

impl<S: Surface> Layer<S> {
    #[must_use]
    pub fn new(name: impl Into<String>, surface: S, placement: Placement, persistence: Persistence) -> Self {
        Self { name: name.into(), surface, placement, persistence, cleared: false }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    #[must_use]
    pub fn persistence(&self) -> Persistence {
        self.persistence
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistence == Persistence::Persistent
    }

    /// Whether the layer has been wiped since its last draw.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Whether the per-tick clear pass must wipe this layer.
    #[must_use]
    pub fn needs_clear(&self) -> bool {
        !self.is_persistent() && !self.cleared
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Record that pixels were drawn on this layer.
    pub fn mark_drawn(&mut self) {
        if !self.is_persistent() {
            self.cleared = false;
        }
    }

    /// Wipe the `view` rectangle anchored at the origin.
    pub fn clear(&mut self, view: Size) {
        self.surface.clear_rect(Rect::new(0.0, 0.0, view.width, view.height));
        self.cleared = true;
    }
}

/// All layers of a game, in creation order.
pub struct LayerRegistry<S> {
    layers: Vec<Layer<S>>,
    index: HashMap<String, usize>,
}

impl<S> Default for LayerRegistry<S> {
    fn default() -> Self {
        Self { layers: Vec::new(), index: HashMap::new() }
    }
}

impl<S: Surface> LayerRegistry<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a layer. A layer with the same name is replaced in place and
    /// returned.
    pub fn insert(&mut self, layer: Layer<S>) -> Option<Layer<S>> {
        if let Some(&i) = self.index.get(layer.name()) {
            return Some(std::mem::replace(&mut self.layers[i], layer));
        }
        self.index.insert(layer.name().to_owned(), self.layers.len());
        self.layers.push(layer);
        None
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Layer<S>> {
        self.index.get(name).map(|&i| &self.layers[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layer<S>> {
        self.index.get(name).map(|&i| &mut self.layers[i])
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer<S>> {
        self.layers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer<S>> {
        self.layers.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wipe every transient layer that was drawn on since its last wipe.
    /// Returns how many layers were wiped.
    pub fn clear_transient(&mut self, view: Size) -> usize {
        let mut wiped = 0;
        for layer in self.layers.iter_mut().filter(|l| l.needs_clear()) {
            layer.clear(view);
            wiped += 1;
        }
        wiped
    }
}

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::config::GameConfig;
use crate::draw::DrawManager;
use crate::engine::GameControl;
use crate::map::TileMap;
use crate::test_support::{self, PixelSurface, RecordingScroll, ScriptedInput};
use crate::viewport::Viewport;

/// Components a [`FrameContext`] borrows.
struct Parts {
    config: GameConfig,
    draw: DrawManager<PixelSurface>,
    viewport: Viewport,
    map: TileMap,
    input: InputState,
    control: GameControl<PixelSurface>,
}

impl Parts {
    fn new() -> Self {
        let config = GameConfig::default();
        Self {
            draw: test_support::draw_manager(&config),
            viewport: Viewport::new(&config, Box::new(RecordingScroll::default())),
            map: TileMap::new(&config),
            input: InputState::new(),
            control: GameControl::default(),
            config,
        }
    }

    fn ctx(&mut self) -> FrameContext<'_, PixelSurface> {
        FrameContext {
            config: &self.config,
            draw: &mut self.draw,
            viewport: &mut self.viewport,
            map: &mut self.map,
            input: &self.input,
            control: &mut self.control,
        }
    }
}

/// Records the callbacks it receives.
struct Recorder {
    caps: Capabilities,
    seen: Vec<String>,
}

impl Recorder {
    fn shared(caps: Capabilities) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { caps, seen: Vec::new() }))
    }
}

impl Hook<PixelSurface> for Recorder {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn mouse_down(&mut self, _ctx: &mut FrameContext<'_, PixelSurface>, cursor: Point, _button: Button) {
        self.seen.push(format!("down {},{}", cursor.x, cursor.y));
    }

    fn mouse_move(&mut self, _ctx: &mut FrameContext<'_, PixelSurface>, _cursor: Point, tile: (usize, usize)) {
        self.seen.push(format!("move {tile:?}"));
    }

    fn key_down(&mut self, ctx: &mut FrameContext<'_, PixelSurface>, key: &Key, _modifiers: Modifiers) {
        let held = ctx.input.is_key_down(key.as_str());
        self.seen.push(format!("key {} held={held}", key.as_str()));
    }

    fn resize(&mut self, _ctx: &mut FrameContext<'_, PixelSurface>, size: Size) {
        self.seen.push(format!("resize {}x{}", size.width, size.height));
    }

    fn pointer_lock_lost(&mut self, _ctx: &mut FrameContext<'_, PixelSurface>) {
        self.seen.push("unlocked".into());
    }
}

fn router() -> (EventRouter<PixelSurface>, ScriptedInput) {
    let input = ScriptedInput::default();
    (EventRouter::new(Box::new(input.clone())), input)
}

fn frame() -> InputFrame {
    InputFrame {
        view: Size::new(800.0, 600.0),
        area: Size::new(3000.0, 2000.0),
        tile: Size::new(32.0, 32.0),
        pan: Point::new(0.0, 0.0),
        cursor_speed: 1.0,
    }
}

fn down(x: f64, y: f64) -> GameEvent {
    GameEvent::MouseDown { cursor: Point::new(x, y), button: Button::Primary }
}

// =============================================================
// Capabilities
// =============================================================

#[test]
fn every_event_maps_to_one_capability() {
    let events = [
        down(0.0, 0.0),
        GameEvent::MouseMove { cursor: Point::default(), tile: (0, 0) },
        GameEvent::MouseEnter,
        GameEvent::Wheel { dx: 0.0, dy: 1.0 },
        GameEvent::KeyUp { key: Key::new("a"), modifiers: Modifiers::default() },
        GameEvent::Resize { size: Size::new(1.0, 1.0) },
        GameEvent::PointerLockGained,
    ];
    for event in events {
        assert_eq!(event.capability().bits().count_ones(), 1, "{event:?}");
    }
}

#[test]
fn composite_flags_cover_their_members() {
    assert!(Capabilities::MOUSE.contains(Capabilities::WHEEL | Capabilities::MOUSE_LEAVE));
    assert!(Capabilities::KEYS.contains(Capabilities::KEY_UP));
    assert!(!Capabilities::MOUSE.contains(Capabilities::UPDATE));
}

// =============================================================
// Dispatch
// =============================================================

#[test]
fn dispatch_skips_hooks_without_capability() {
    let (mut router, _) = router();
    let mouse = Recorder::shared(Capabilities::MOUSE_DOWN);
    let keys = Recorder::shared(Capabilities::KEYS);
    router.add_hook(mouse.clone());
    router.add_hook(keys.clone());

    let mut parts = Parts::new();
    assert_eq!(router.dispatch(&down(3.0, 4.0), &mut parts.ctx()), 1);
    assert_eq!(mouse.borrow().seen, vec!["down 3,4"]);
    assert!(keys.borrow().seen.is_empty());
}

#[test]
fn dispatch_follows_registration_order() {
    let (mut router, _) = router();
    let order = Rc::new(RefCell::new(Vec::new()));

    struct Tagged(&'static str, Rc<RefCell<Vec<&'static str>>>);
    impl Hook<PixelSurface> for Tagged {
        fn capabilities(&self) -> Capabilities {
            Capabilities::MOUSE
        }
        fn mouse_down(&mut self, _ctx: &mut FrameContext<'_, PixelSurface>, _cursor: Point, _button: Button) {
            self.1.borrow_mut().push(self.0);
        }
    }

    for tag in ["first", "second", "third"] {
        router.add_hook(Rc::new(RefCell::new(Tagged(tag, Rc::clone(&order)))));
    }
    let mut parts = Parts::new();
    router.dispatch(&down(0.0, 0.0), &mut parts.ctx());
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn busy_hook_is_skipped() {
    let (mut router, _) = router();
    let hook = Recorder::shared(Capabilities::MOUSE);
    router.add_hook(hook.clone());

    let _held = hook.borrow_mut();
    let mut parts = Parts::new();
    assert_eq!(router.dispatch(&down(0.0, 0.0), &mut parts.ctx()), 0);
}

#[test]
fn remove_hook_by_identity() {
    let (mut router, _) = router();
    let a = Recorder::shared(Capabilities::MOUSE);
    let b = Recorder::shared(Capabilities::MOUSE);
    let a_ref: HookRef<PixelSurface> = a.clone();
    router.add_hook(a_ref.clone());
    router.add_hook(b.clone());

    assert!(router.remove_hook(&a_ref));
    assert!(!router.remove_hook(&a_ref));
    assert_eq!(router.hook_count(), 1);

    let mut parts = Parts::new();
    router.dispatch(&down(1.0, 1.0), &mut parts.ctx());
    assert!(a.borrow().seen.is_empty());
    assert_eq!(b.borrow().seen.len(), 1);
}

#[test]
fn hooks_see_context() {
    let (mut router, _) = router();
    let hook = Recorder::shared(Capabilities::KEYS);
    router.add_hook(hook.clone());

    let mut parts = Parts::new();
    let event = router
        .normalize(RawInput::KeyDown { key: Key::new("w"), modifiers: Modifiers::default() }, &frame())
        .unwrap();
    parts.input = router.state().clone();
    router.dispatch(&event, &mut parts.ctx());
    assert_eq!(hook.borrow().seen, vec!["key w held=true"]);
}

#[test]
fn resize_and_lock_callbacks() {
    let (mut router, _) = router();
    let hook = Recorder::shared(Capabilities::RESIZE | Capabilities::POINTER_LOCK);
    router.add_hook(hook.clone());

    let mut parts = Parts::new();
    router.dispatch(&GameEvent::Resize { size: Size::new(640.0, 480.0) }, &mut parts.ctx());
    router.dispatch(&GameEvent::PointerLockLost, &mut parts.ctx());
    router.dispatch(&GameEvent::PointerLockGained, &mut parts.ctx());
    assert_eq!(hook.borrow().seen, vec!["resize 640x480", "unlocked"]);
}

// =============================================================
// Normalize and adapter
// =============================================================

#[test]
fn normalize_tracks_tile_under_cursor() {
    let (mut router, _) = router();
    let event = router.normalize(RawInput::MouseMove { x: 65.0, y: 97.0, movement_x: 0.0, movement_y: 0.0 }, &frame());
    assert_eq!(event, Some(GameEvent::MouseMove { cursor: Point::new(65.0, 97.0), tile: (2, 3) }));
    assert_eq!(router.state().tile, (2, 3));
}

#[test]
fn normalize_swallows_lock_errors() {
    let (mut router, _) = router();
    assert_eq!(router.normalize(RawInput::PointerLockError { message: "nope".into() }, &frame()), None);
}

#[test]
fn pointer_lock_request_reports_support() {
    let (mut router, input) = router();
    assert!(router.request_pointer_lock());
    input.log.borrow_mut().lock_unsupported = true;
    assert!(!router.request_pointer_lock());
    assert_eq!(input.log.borrow().lock_requests, 2);
}

#[test]
fn connect_and_disconnect_reach_adapter() {
    let (mut router, input) = router();
    router.connect(Rc::new(|_raw: RawInput| {})).unwrap();
    assert!(input.log.borrow().connected);
    router.disconnect();
    assert!(!input.log.borrow().connected);
}

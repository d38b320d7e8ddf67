//! Event routing: capability-filtered fan-out of normalized input to hooks.
//!
//! A [`Hook`] declares which callbacks it implements through
//! [`Hook::capabilities`]; every callback has a no-op default. The router
//! only calls a hook for events whose capability bit it declared, so a hook
//! that cares about key presses never sees mouse traffic.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use log::{debug, warn};

use crate::engine::FrameContext;
use crate::error::InputError;
use crate::geom::{Point, Size};
use crate::input::{Button, GameEvent, InputAdapter, InputFrame, InputSink, InputState, Key, Modifiers, RawInput};
use crate::surface::Surface;

bitflags! {
    /// Callbacks a hook implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const UPDATE = 1 << 0;
        const MOUSE_DOWN = 1 << 1;
        const MOUSE_UP = 1 << 2;
        const MOUSE_MOVE = 1 << 3;
        const MOUSE_CLICK = 1 << 4;
        const MOUSE_ENTER = 1 << 5;
        const MOUSE_LEAVE = 1 << 6;
        const WHEEL = 1 << 7;
        const KEY_DOWN = 1 << 8;
        const KEY_UP = 1 << 9;
        const RESIZE = 1 << 10;
        const POINTER_LOCK_GAINED = 1 << 11;
        const POINTER_LOCK_LOST = 1 << 12;

        const MOUSE = Self::MOUSE_DOWN.bits()
            | Self::MOUSE_UP.bits()
            | Self::MOUSE_MOVE.bits()
            | Self::MOUSE_CLICK.bits()
            | Self::MOUSE_ENTER.bits()
            | Self::MOUSE_LEAVE.bits()
            | Self::WHEEL.bits();
        const KEYS = Self::KEY_DOWN.bits() | Self::KEY_UP.bits();
        const POINTER_LOCK = Self::POINTER_LOCK_GAINED.bits() | Self::POINTER_LOCK_LOST.bits();
    }
}

impl GameEvent {
    /// The capability a hook must declare to receive this event.
    #[must_use]
    pub fn capability(&self) -> Capabilities {
        match self {
            Self::MouseDown { .. } => Capabilities::MOUSE_DOWN,
            Self::MouseUp { .. } => Capabilities::MOUSE_UP,
            Self::MouseClick { .. } => Capabilities::MOUSE_CLICK,
            Self::MouseMove { .. } => Capabilities::MOUSE_MOVE,
            Self::MouseEnter => Capabilities::MOUSE_ENTER,
            Self::MouseLeave => Capabilities::MOUSE_LEAVE,
            Self::Wheel { .. } => Capabilities::WHEEL,
            Self::KeyDown { .. } => Capabilities::KEY_DOWN,
            Self::KeyUp { .. } => Capabilities::KEY_UP,
            Self::Resize { .. } => Capabilities::RESIZE,
            Self::PointerLockGained => Capabilities::POINTER_LOCK_GAINED,
            Self::PointerLockLost => Capabilities::POINTER_LOCK_LOST,
        }
    }
}

/// Game object driven by the loop and/or by input.
#[allow(unused_variables)]
pub trait Hook<S: Surface> {
    fn capabilities(&self) -> Capabilities;

    /// Per-tick update with the scaled delta time in milliseconds.
    fn update(&mut self, ctx: &mut FrameContext<'_, S>, delta_ms: f64) {}

    fn mouse_down(&mut self, ctx: &mut FrameContext<'_, S>, cursor: Point, button: Button) {}

    fn mouse_up(&mut self, ctx: &mut FrameContext<'_, S>, cursor: Point, button: Button) {}

    fn mouse_click(&mut self, ctx: &mut FrameContext<'_, S>, cursor: Point, button: Button) {}

    fn mouse_move(&mut self, ctx: &mut FrameContext<'_, S>, cursor: Point, tile: (usize, usize)) {}

    fn mouse_enter(&mut self, ctx: &mut FrameContext<'_, S>) {}

    fn mouse_leave(&mut self, ctx: &mut FrameContext<'_, S>) {}

    fn wheel(&mut self, ctx: &mut FrameContext<'_, S>, dx: f64, dy: f64) {}

    fn key_down(&mut self, ctx: &mut FrameContext<'_, S>, key: &Key, modifiers: Modifiers) {}

    fn key_up(&mut self, ctx: &mut FrameContext<'_, S>, key: &Key, modifiers: Modifiers) {}

    fn resize(&mut self, ctx: &mut FrameContext<'_, S>, size: Size) {}

    fn pointer_lock_gained(&mut self, ctx: &mut FrameContext<'_, S>) {}

    fn pointer_lock_lost(&mut self, ctx: &mut FrameContext<'_, S>) {}
}

/// Shared handle to a registered hook.
pub type HookRef<S> = Rc<RefCell<dyn Hook<S>>>;

/// Call the callback on `hook` matching `event`.
pub fn deliver<S: Surface>(hook: &mut dyn Hook<S>, ctx: &mut FrameContext<'_, S>, event: &GameEvent) {
    match event {
        GameEvent::MouseDown { cursor, button } => hook.mouse_down(ctx, *cursor, *button),
        GameEvent::MouseUp { cursor, button } => hook.mouse_up(ctx, *cursor, *button),
        GameEvent::MouseClick { cursor, button } => hook.mouse_click(ctx, *cursor, *button),
        GameEvent::MouseMove { cursor, tile } => hook.mouse_move(ctx, *cursor, *tile),
        GameEvent::MouseEnter => hook.mouse_enter(ctx),
        GameEvent::MouseLeave => hook.mouse_leave(ctx),
        GameEvent::Wheel { dx, dy } => hook.wheel(ctx, *dx, *dy),
        GameEvent::KeyDown { key, modifiers } => hook.key_down(ctx, key, *modifiers),
        GameEvent::KeyUp { key, modifiers } => hook.key_up(ctx, key, *modifiers),
        GameEvent::Resize { size } => hook.resize(ctx, *size),
        GameEvent::PointerLockGained => hook.pointer_lock_gained(ctx),
        GameEvent::PointerLockLost => hook.pointer_lock_lost(ctx),
    }
}

/// Owns the input adapter and the tracked input state, and fans normalized
/// events out to event hooks in registration order.
pub struct EventRouter<S: Surface> {
    adapter: Box<dyn InputAdapter>,
    state: InputState,
    hooks: Vec<HookRef<S>>,
}

impl<S: Surface> EventRouter<S> {
    #[must_use]
    pub fn new(adapter: Box<dyn InputAdapter>) -> Self {
        Self { adapter, state: InputState::new(), hooks: Vec::new() }
    }

    /// Start receiving host input through `sink`.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's [`InputError::Attach`].
    pub fn connect(&mut self, sink: InputSink) -> Result<(), InputError> {
        self.adapter.connect(sink)
    }

    pub fn disconnect(&mut self) {
        self.adapter.disconnect();
    }

    /// Ask the host for pointer lock. Failures are logged, not fatal.
    pub fn request_pointer_lock(&mut self) -> bool {
        match self.adapter.request_pointer_lock() {
            Ok(()) => true,
            Err(e) => {
                warn!("events: {e}");
                false
            }
        }
    }

    pub fn add_hook(&mut self, hook: HookRef<S>) {
        self.hooks.push(hook);
    }

    /// Unregister `hook` (compared by identity). Returns whether it was present.
    pub fn remove_hook(&mut self, hook: &HookRef<S>) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|h| !Rc::ptr_eq(h, hook));
        self.hooks.len() != before
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    #[must_use]
    pub fn state(&self) -> &InputState {
        &self.state
    }

    /// Fold `raw` into the input state and return the normalized event.
    /// Pointer-lock errors are logged and yield nothing.
    pub fn normalize(&mut self, raw: RawInput, frame: &InputFrame) -> Option<GameEvent> {
        if let RawInput::PointerLockError { message } = &raw {
            warn!("events: {}", InputError::PointerLock(message.clone()));
        }
        self.state.apply(raw, frame)
    }

    /// Call every hook that declared the capability for `event`.
    /// Returns how many hooks received it.
    pub fn dispatch(&self, event: &GameEvent, ctx: &mut FrameContext<'_, S>) -> usize {
        let wanted = event.capability();
        let mut delivered = 0;
        for hook in &self.hooks {
            let Ok(mut hook) = hook.try_borrow_mut() else {
                debug!("events: hook busy, skipping {event:?}");
                continue;
            };
            if hook.capabilities().contains(wanted) {
                deliver(&mut *hook, ctx, event);
                delivered += 1;
            }
        }
        delivered
    }
}

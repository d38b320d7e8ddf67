//! Input model: raw host events, the normalized game event vocabulary, and
//! the cursor/keyboard state derived from them.
//!
//! Hosts deliver [`RawInput`] through an [`InputSink`] handed to their
//! [`InputAdapter`]. [`InputState::apply`] folds each raw event into the
//! tracked state and yields the [`GameEvent`] hooks see.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::error::InputError;
use crate::geom::{Point, Size};

/// Keyboard/mouse modifier keys held during an event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code.
    #[must_use]
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Middle,
            2 => Self::Secondary,
            _ => Self::Primary,
        }
    }
}

/// A keyboard key as named by the host (e.g. `"ArrowLeft"`, `"a"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Event as delivered by the host, in view coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum RawInput {
    MouseDown { x: f64, y: f64, button: Button },
    MouseUp { x: f64, y: f64, button: Button },
    Click { x: f64, y: f64, button: Button },
    /// `movement_*` is the relative motion, used while the pointer is locked.
    MouseMove { x: f64, y: f64, movement_x: f64, movement_y: f64 },
    Wheel { dx: f64, dy: f64 },
    KeyDown { key: Key, modifiers: Modifiers },
    KeyUp { key: Key, modifiers: Modifiers },
    /// Host window resized.
    Resize { width: f64, height: f64 },
    PointerLockChange { locked: bool },
    PointerLockError { message: String },
    MouseEnter,
    MouseLeave,
}

/// Normalized event dispatched to hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    MouseDown { cursor: Point, button: Button },
    MouseUp { cursor: Point, button: Button },
    MouseClick { cursor: Point, button: Button },
    MouseMove { cursor: Point, tile: (usize, usize) },
    MouseEnter,
    MouseLeave,
    Wheel { dx: f64, dy: f64 },
    KeyDown { key: Key, modifiers: Modifiers },
    KeyUp { key: Key, modifiers: Modifiers },
    Resize { size: Size },
    PointerLockGained,
    PointerLockLost,
}

/// Callback the host invokes for every raw event.
pub type InputSink = Rc<dyn Fn(RawInput)>;

/// Host side of input delivery.
pub trait InputAdapter {
    /// Start delivering events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`InputError::Attach`] if listeners cannot be installed.
    fn connect(&mut self, sink: InputSink) -> Result<(), InputError>;

    /// Stop delivering events.
    fn disconnect(&mut self);

    /// Ask the host to capture the pointer. The outcome arrives later as
    /// [`RawInput::PointerLockChange`] or [`RawInput::PointerLockError`].
    ///
    /// # Errors
    ///
    /// Returns [`InputError::PointerLockUnsupported`] if the host cannot
    /// lock the pointer at all.
    fn request_pointer_lock(&mut self) -> Result<(), InputError>;
}

/// Geometry needed to turn a cursor position into a tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputFrame {
    pub view: Size,
    pub area: Size,
    pub tile: Size,
    /// Current camera offset (non-positive).
    pub pan: Point,
    pub cursor_speed: f64,
}

/// Cursor, tile and keyboard state tracked across events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    pub cursor: Point,
    /// `(column, row)` of the game-area tile under the cursor.
    pub tile: (usize, usize),
    pub mouse_over: bool,
    pub pointer_locked: bool,
    pub keys_down: BTreeSet<Key>,
}

impl InputState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_key_down(&self, key: &str) -> bool {
        self.keys_down.iter().any(|k| k.as_str() == key)
    }

    /// Fold `raw` into the state and return the event hooks should see.
    /// Pointer-lock errors produce no event.
    pub fn apply(&mut self, raw: RawInput, frame: &InputFrame) -> Option<GameEvent> {
        let event = match raw {
            RawInput::MouseDown { x, y, button } => {
                self.place_cursor(x, y, frame);
                GameEvent::MouseDown { cursor: self.cursor, button }
            }
            RawInput::MouseUp { x, y, button } => {
                self.place_cursor(x, y, frame);
                GameEvent::MouseUp { cursor: self.cursor, button }
            }
            RawInput::Click { x, y, button } => {
                self.place_cursor(x, y, frame);
                GameEvent::MouseClick { cursor: self.cursor, button }
            }
            RawInput::MouseMove { x, y, movement_x, movement_y } => {
                if self.pointer_locked {
                    let speed = frame.cursor_speed;
                    self.place_cursor(self.cursor.x + movement_x * speed, self.cursor.y + movement_y * speed, frame);
                } else {
                    self.place_cursor(x, y, frame);
                }
                GameEvent::MouseMove { cursor: self.cursor, tile: self.tile }
            }
            RawInput::Wheel { dx, dy } => GameEvent::Wheel { dx, dy },
            RawInput::KeyDown { key, modifiers } => {
                self.keys_down.insert(key.clone());
                GameEvent::KeyDown { key, modifiers }
            }
            RawInput::KeyUp { key, modifiers } => {
                self.keys_down.remove(&key);
                GameEvent::KeyUp { key, modifiers }
            }
            RawInput::Resize { width, height } => GameEvent::Resize { size: Size::new(width, height) },
            RawInput::PointerLockChange { locked } => {
                self.pointer_locked = locked;
                if locked {
                    self.place_cursor(frame.view.width / 2.0, frame.view.height / 2.0, frame);
                    GameEvent::PointerLockGained
                } else {
                    GameEvent::PointerLockLost
                }
            }
            RawInput::PointerLockError { .. } => return None,
            RawInput::MouseEnter => {
                self.mouse_over = true;
                GameEvent::MouseEnter
            }
            RawInput::MouseLeave => {
                self.mouse_over = false;
                GameEvent::MouseLeave
            }
        };
        Some(event)
    }

    /// Clamp `(x, y)` to the view and recompute the tile under it.
    fn place_cursor(&mut self, x: f64, y: f64, frame: &InputFrame) {
        self.cursor = Point::new(x.clamp(0.0, frame.view.width), y.clamp(0.0, frame.view.height));
        self.tile = tile_under(self.cursor, frame);
    }
}

/// Tile coordinate under a view-space cursor, clamped to the last column
/// and row of the game area.
#[must_use]
pub fn tile_under(cursor: Point, frame: &InputFrame) -> (usize, usize) {
    (
        axis_tile(cursor.x - frame.pan.x, frame.tile.width, frame.area.width),
        axis_tile(cursor.y - frame.pan.y, frame.tile.height, frame.area.height),
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_tile(pos: f64, tile: f64, area: f64) -> usize {
    let last = ((area / tile).ceil() - 1.0).max(0.0);
    (pos / tile).floor().clamp(0.0, last) as usize
}

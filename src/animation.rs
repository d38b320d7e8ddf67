//! Sprite animation playback.
//!
//! Each [`Animation`] walks the frames of one sprite sheet. Time accumulates
//! in `elapsed_ms` and is converted to whole frame steps, so playback speed
//! does not depend on how often the loop ticks.
//!
//! Redraws are dirty-tracked: `needs_redraw` is raised when the visible frame
//! changes and lowered only by a successful draw. A draw that fails (image
//! not loaded yet, layer missing) leaves the flag up and is retried on the
//! next tick.

#[cfg(test)]
#[path = "animation_test.rs"]
mod animation_test;

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::draw::DrawSurface;
use crate::geom::{Point, Rect, Size};
use crate::sprite::SpriteSheet;
use crate::surface::Surface;

pub type AnimationId = Uuid;

/// How the frame index moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Advance and wrap around forever.
    #[default]
    Loop,
    /// Advance (or retreat) and stop at the first or last frame.
    Flip,
    /// Follow an external [`FrameProperty`]; time is ignored.
    Property,
}

/// Shared frame index written by game code and read by a
/// [`PlayMode::Property`] animation.
#[derive(Debug, Clone, Default)]
pub struct FrameProperty(Rc<Cell<usize>>);

impl FrameProperty {
    #[must_use]
    pub fn new(frame: usize) -> Self {
        Self(Rc::new(Cell::new(frame)))
    }

    #[must_use]
    pub fn get(&self) -> usize {
        self.0.get()
    }

    pub fn set(&self, frame: usize) {
        self.0.set(frame);
    }
}

/// Construction options for [`crate::draw::DrawManager::animation`].
#[derive(Debug, Clone, Default)]
pub struct AnimationOptions {
    pub mode: PlayMode,
    /// Defaults to the configured frame duration.
    pub frame_ms: Option<f64>,
    pub position: Point,
    /// Defaults to the size of one frame of the sheet image.
    pub size: Option<Size>,
    pub rotation: f64,
    pub property: Option<FrameProperty>,
}

#[derive(Debug, Clone)]
pub struct Animation {
    id: AnimationId,
    sheet: SpriteSheet,
    layer: String,
    rect: Rect,
    rotation: f64,
    mode: PlayMode,
    frame: usize,
    total_frames: usize,
    elapsed_ms: f64,
    frame_ms: f64,
    forward: bool,
    paused: bool,
    property: Option<FrameProperty>,
    drawn: bool,
    needs_redraw: bool,
}

impl Animation {
    #[must_use]
    pub fn new(
        id: AnimationId,
        sheet: SpriteSheet,
        layer: impl Into<String>,
        rect: Rect,
        frame_ms: f64,
        options: AnimationOptions,
    ) -> Self {
        let total_frames = sheet.total_frames();
        Self {
            id,
            sheet,
            layer: layer.into(),
            rect,
            rotation: options.rotation,
            mode: options.mode,
            frame: 0,
            total_frames,
            elapsed_ms: 0.0,
            frame_ms,
            forward: true,
            paused: false,
            property: options.property,
            drawn: false,
            needs_redraw: true,
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn id(&self) -> AnimationId {
        self.id
    }

    #[must_use]
    pub fn sheet(&self) -> &SpriteSheet {
        &self.sheet
    }

    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[must_use]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[must_use]
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    #[must_use]
    pub fn frame(&self) -> usize {
        self.frame
    }

    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    #[must_use]
    pub fn frame_ms(&self) -> f64 {
        self.frame_ms
    }

    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn is_drawn(&self) -> bool {
        self.drawn
    }

    #[must_use]
    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    // --- Playback control ---

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Flip the direction a [`PlayMode::Flip`] animation travels.
    pub fn reverse(&mut self) {
        self.forward = !self.forward;
    }

    pub fn set_forward(&mut self, forward: bool) {
        self.forward = forward;
    }

    /// Drive this animation from `property` (switches to property mode).
    pub fn bind_property(&mut self, property: FrameProperty) {
        self.property = Some(property);
        self.mode = PlayMode::Property;
    }

    /// Jump to `frame`, clamped to the last frame.
    pub fn set_frame(&mut self, frame: usize) {
        let frame = frame.min(self.total_frames.saturating_sub(1));
        if frame != self.frame {
            self.frame = frame;
            self.needs_redraw = true;
        }
    }

    // --- Time ---

    /// Accumulate `delta_ms` and advance by however many whole frames fit.
    pub fn frame_update(&mut self, delta_ms: f64) {
        if self.paused {
            return;
        }
        if self.mode == PlayMode::Property {
            self.follow_property();
            return;
        }

        self.elapsed_ms += delta_ms.max(0.0);
        let lapse = (self.elapsed_ms / self.frame_ms).floor();
        if lapse >= 1.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let steps = lapse as usize;
            self.advance(steps);
            self.elapsed_ms %= self.frame_ms;
        }
    }

    fn advance(&mut self, lapse: usize) {
        match self.mode {
            PlayMode::Loop => {
                self.frame = (self.frame + lapse % self.total_frames) % self.total_frames;
                self.needs_redraw = true;
            }
            PlayMode::Flip => {
                let last = self.total_frames - 1;
                let next = if self.forward {
                    self.frame.saturating_add(lapse).min(last)
                } else {
                    self.frame.saturating_sub(lapse)
                };
                if next != self.frame {
                    self.frame = next;
                    self.needs_redraw = true;
                }
            }
            PlayMode::Property => self.follow_property(),
        }
    }

    fn follow_property(&mut self) {
        let Some(property) = &self.property else {
            return;
        };
        let target = property.get().min(self.total_frames - 1);
        if target != self.frame {
            self.frame = target;
            self.needs_redraw = true;
        }
    }

    // --- Pixels ---

    /// Redraw the current frame if it is stale. The previous footprint is
    /// cleared first. Returns whether the animation is now on screen.
    pub fn draw<S: Surface>(&mut self, surface: &mut DrawSurface<S>) -> bool {
        if !self.needs_redraw {
            return self.drawn;
        }
        if self.drawn {
            self.clear(surface);
        }
        self.drawn = surface
            .sub_sprite(
                self.sheet.name(),
                &self.layer,
                self.frame,
                Point::new(self.rect.x, self.rect.y),
                Some(Size::new(self.rect.width, self.rect.height)),
                self.rotation,
            )
            .is_ok();
        self.needs_redraw = !self.drawn;
        self.drawn
    }

    /// Erase the last drawn footprint, rotated the way it was drawn.
    pub fn clear<S: Surface>(&mut self, surface: &mut DrawSurface<S>) {
        if surface.clear_rectangle(&self.layer, self.rect, self.rotation).is_ok() {
            self.drawn = false;
        }
        self.needs_redraw = true;
    }

    /// Rotate by `radians` about the center.
    pub fn rotate<S: Surface>(&mut self, radians: f64, surface: &mut DrawSurface<S>) {
        if self.drawn {
            self.clear(surface);
        }
        self.rotation += radians;
        self.needs_redraw = true;
    }

    pub fn move_by<S: Surface>(&mut self, dx: f64, dy: f64, surface: &mut DrawSurface<S>) {
        self.move_to(Point::new(self.rect.x + dx, self.rect.y + dy), surface);
    }

    /// Place the top-left corner at `to`.
    pub fn move_to<S: Surface>(&mut self, to: Point, surface: &mut DrawSurface<S>) {
        if self.drawn {
            self.clear(surface);
        }
        self.rect.x = to.x;
        self.rect.y = to.y;
        self.needs_redraw = true;
    }
}

//! Edge-panning camera.
//!
//! The game area is a surface larger than the view window. Panning shifts
//! it left/up by a non-positive offset `(pan_x, pan_y)`, clamped so the area
//! always covers the view:
//!
//! ```text
//! max_pan = min(0, view - area)      max_pan <= pan <= 0
//! ```
//!
//! Velocity comes from how close the cursor is to a view edge: zero at the
//! margin boundary, ramping linearly up to the pan speed at the edge itself.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use log::debug;

use crate::config::GameConfig;
use crate::geom::{Point, Size};

/// Host side of the scrollable game area.
pub trait ScrollArea {
    /// Position the game area at `(x, y)` relative to the view.
    fn move_to(&mut self, x: f64, y: f64);

    /// Size the view window. `fullscreen` views fill the host window.
    fn set_view_size(&mut self, view: Size, fullscreen: bool);

    fn set_area_size(&mut self, area: Size);
}

/// Signed pan velocity for a cursor at `pos` along an axis of length
/// `extent`. Positive near the start edge, negative near the end edge.
#[must_use]
pub fn edge_velocity(pos: f64, extent: f64, margin: f64, speed: f64) -> f64 {
    let ramp = |dist: f64| ((margin - dist) / margin * speed).round().clamp(0.0, speed);
    if pos < margin {
        ramp(pos)
    } else if pos > extent - margin {
        -ramp(extent - pos)
    } else {
        0.0
    }
}

fn max_pan(view: f64, area: f64) -> f64 {
    (view - area).min(0.0)
}

pub struct Viewport {
    pan_x: f64,
    pan_y: f64,
    panning_x: f64,
    panning_y: f64,
    max_pan_x: f64,
    max_pan_y: f64,
    view: Size,
    area_size: Size,
    pan_enabled: bool,
    fullscreen: bool,
    margin: f64,
    speed: f64,
    has_pointer_lock: bool,
    area: Box<dyn ScrollArea>,
}

impl Viewport {
    #[must_use]
    pub fn new(config: &GameConfig, area: Box<dyn ScrollArea>) -> Self {
        let view = config.view_size();
        let area_size = config.game_area_size();
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            panning_x: 0.0,
            panning_y: 0.0,
            max_pan_x: max_pan(view.width, area_size.width),
            max_pan_y: max_pan(view.height, area_size.height),
            view,
            area_size,
            pan_enabled: config.pan,
            fullscreen: config.fullscreen,
            margin: config.pan_margin,
            speed: config.pan_speed,
            has_pointer_lock: false,
            area,
        }
    }

    /// Push the current sizes and offset to the host.
    pub fn start(&mut self) {
        self.area.set_view_size(self.view, self.fullscreen);
        self.area.set_area_size(self.area_size);
        self.area.move_to(self.pan_x, self.pan_y);
    }

    /// One camera tick. Returns whether the game area moved.
    pub fn update(&mut self, cursor: Point) -> bool {
        self.panning_x = edge_velocity(cursor.x, self.view.width, self.margin, self.speed);
        self.panning_y = edge_velocity(cursor.y, self.view.height, self.margin, self.speed);
        if !self.pan_enabled || (self.panning_x == 0.0 && self.panning_y == 0.0) {
            return false;
        }
        self.move_to(self.pan_x + self.panning_x, self.pan_y + self.panning_y)
    }

    /// Place the game area at `(x, y)`, clamped to the pan range. Returns
    /// whether the offset changed.
    pub fn move_to(&mut self, x: f64, y: f64) -> bool {
        let x = x.clamp(self.max_pan_x, 0.0);
        let y = y.clamp(self.max_pan_y, 0.0);
        #[allow(clippy::float_cmp)]
        let unchanged = x == self.pan_x && y == self.pan_y;
        if unchanged {
            return false;
        }
        self.pan_x = x;
        self.pan_y = y;
        self.area.move_to(x, y);
        true
    }

    /// Change the view size and re-clamp the offset.
    pub fn set_size(&mut self, view: Size) {
        debug!("viewport: view {}x{}", view.width, view.height);
        self.view = view;
        self.area.set_view_size(view, self.fullscreen);
        self.reclamp();
    }

    /// Follow a host window resize. Only fullscreen views track the window.
    /// Returns whether the view size changed.
    pub fn resize(&mut self, window: Size) -> bool {
        if !self.fullscreen || window == self.view {
            return false;
        }
        self.set_size(window);
        true
    }

    pub fn resize_area(&mut self, area: Size) {
        debug!("viewport: game area {}x{}", area.width, area.height);
        self.area_size = area;
        self.area.set_area_size(area);
        self.reclamp();
    }

    fn reclamp(&mut self) {
        self.max_pan_x = max_pan(self.view.width, self.area_size.width);
        self.max_pan_y = max_pan(self.view.height, self.area_size.height);
        self.move_to(self.pan_x, self.pan_y);
    }

    #[must_use]
    pub fn pan(&self) -> Point {
        Point::new(self.pan_x, self.pan_y)
    }

    /// Velocity computed by the last [`Self::update`].
    #[must_use]
    pub fn velocity(&self) -> Point {
        Point::new(self.panning_x, self.panning_y)
    }

    #[must_use]
    pub fn max_pan(&self) -> Point {
        Point::new(self.max_pan_x, self.max_pan_y)
    }

    #[must_use]
    pub fn view_size(&self) -> Size {
        self.view
    }

    #[must_use]
    pub fn area_size(&self) -> Size {
        self.area_size
    }

    #[must_use]
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    #[must_use]
    pub fn is_pan_enabled(&self) -> bool {
        self.pan_enabled
    }

    pub fn set_pan_enabled(&mut self, enabled: bool) {
        self.pan_enabled = enabled;
    }

    #[must_use]
    pub fn has_pointer_lock(&self) -> bool {
        self.has_pointer_lock
    }

    pub fn set_pointer_lock(&mut self, locked: bool) {
        self.has_pointer_lock = locked;
    }
}

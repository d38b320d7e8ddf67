//! Host drawing surface traits.
//!
//! The toolkit never talks to a canvas directly. Each layer owns one value
//! implementing [`Surface`], a small subset of the `Canvas2D` API; the
//! browser implementation lives in [`crate::web`] and tests use an in-memory
//! pixel surface.

use crate::error::SurfaceError;
use crate::geom::{Rect, Size};

/// A decoded image the host can blit.
pub trait ImageSource {
    /// Natural size in pixels.
    fn size(&self) -> Size;
}

/// Where a layer lives in the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Fixed to the view window; sized to the view.
    Overlay,
    /// Part of the scrollable game area; sized to the game area.
    Background,
}

/// Whether a layer keeps its pixels across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Only cleared explicitly.
    Persistent,
    /// Wiped by the per-tick clear pass whenever something was drawn on it.
    Transient,
}

/// 2D drawing surface backing one layer.
///
/// Methods mirror `CanvasRenderingContext2d`: transforms stack with
/// `save`/`restore` and apply to every subsequent draw or clear.
pub trait Surface {
    type Image: ImageSource;

    fn save(&mut self);

    fn restore(&mut self);

    /// # Errors
    ///
    /// Returns [`SurfaceError::Canvas`] if the host rejects the transform.
    fn translate(&mut self, x: f64, y: f64) -> Result<(), SurfaceError>;

    /// # Errors
    ///
    /// Returns [`SurfaceError::Canvas`] if the host rejects the transform.
    fn rotate(&mut self, radians: f64) -> Result<(), SurfaceError>;

    /// Copy `src` from `image` into `dst`, scaling as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Canvas`] if the host rejects the blit.
    fn draw_image(&mut self, image: &Self::Image, src: Rect, dst: Rect) -> Result<(), SurfaceError>;

    fn clear_rect(&mut self, rect: Rect);

    fn fill_rect(&mut self, rect: Rect, color: &str, alpha: f64);

    fn stroke_rect(&mut self, rect: Rect, color: &str, line_width: f64);

    /// `y` is the text baseline.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Canvas`] if the host rejects the call.
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: &str, font: &str) -> Result<(), SurfaceError>;

    /// Toggle interpolated image scaling.
    fn set_smoothing(&mut self, enabled: bool);

    /// Resize the backing store. Resizing discards existing pixels.
    fn resize(&mut self, size: Size);

    fn size(&self) -> Size;
}

/// Creates the surface for a newly added layer.
pub trait SurfaceFactory<S: Surface> {
    /// # Errors
    ///
    /// Returns [`SurfaceError::Create`] if the host cannot create the surface.
    fn create(&mut self, name: &str, placement: Placement, size: Size) -> Result<S, SurfaceError>;
}

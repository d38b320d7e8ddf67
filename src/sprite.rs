//! Sprite sheet descriptors.
//!
//! A sprite sheet is a single image cut into a `columns x rows` grid of
//! equally sized frames. Frames are numbered row-major from the top-left.

#[cfg(test)]
#[path = "sprite_test.rs"]
mod sprite_test;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DrawError};
use crate::geom::{Rect, Size};

/// Name and grid dimensions of a sprite sheet. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SheetSpec")]
pub struct SpriteSheet {
    name: String,
    columns: usize,
    rows: usize,
}

#[derive(Deserialize)]
struct SheetSpec {
    name: String,
    columns: usize,
    rows: usize,
}

impl TryFrom<SheetSpec> for SpriteSheet {
    type Error = ConfigError;

    fn try_from(spec: SheetSpec) -> Result<Self, Self::Error> {
        Self::new(spec.name, spec.columns, spec.rows)
    }
}

impl SpriteSheet {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if either dimension is zero.
    pub fn new(name: impl Into<String>, columns: usize, rows: usize) -> Result<Self, ConfigError> {
        if columns == 0 {
            return Err(ConfigError::Invalid { field: "columns", reason: "must be at least 1".into() });
        }
        if rows == 0 {
            return Err(ConfigError::Invalid { field: "rows", reason: "must be at least 1".into() });
        }
        Ok(Self { name: name.into(), columns, rows })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn total_frames(&self) -> usize {
        self.columns * self.rows
    }

    /// Size of one frame for a sheet image of the given size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_size(&self, image: Size) -> Size {
        Size::new(image.width / self.columns as f64, image.height / self.rows as f64)
    }

    /// `(column, row)` cell of a linear frame index.
    #[must_use]
    pub fn cell(&self, frame: usize) -> (usize, usize) {
        (frame % self.columns, frame / self.columns)
    }

    /// Source rectangle of `frame` within a sheet image of size `image`.
    ///
    /// Width is divided by `columns` and height by `rows`.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::FrameOutOfRange`] if `frame` is not a valid frame.
    #[allow(clippy::cast_precision_loss)]
    pub fn frame_source_rect(&self, image: Size, frame: usize) -> Result<Rect, DrawError> {
        let total = self.total_frames();
        if frame >= total {
            return Err(DrawError::FrameOutOfRange { sheet: self.name.clone(), frame, total });
        }
        let size = self.frame_size(image);
        let (col, row) = self.cell(frame);
        Ok(Rect::new(col as f64 * size.width, row as f64 * size.height, size.width, size.height))
    }
}

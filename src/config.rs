//! Game configuration.
//!
//! `GameConfig` holds the tunables every component reads: view and game-area
//! dimensions, tile size, camera panning parameters, the game speed
//! multiplier, and the image-loading timeout. Every field has a default so a
//! host can supply a partial JSON document.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use serde::{Deserialize, Serialize};

use crate::consts;
use crate::error::ConfigError;
use crate::geom::Size;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// View follows the host window size on resize.
    pub fullscreen: bool,
    /// Enable edge panning of the game area.
    pub pan: bool,
    /// Multiplier applied to relative cursor movement while the pointer is locked.
    pub cursor_speed: f64,
    /// Interpolated (true) or nearest-neighbour (false) image scaling.
    pub smoothing: bool,
    pub game_area_width: f64,
    pub game_area_height: f64,
    pub view_width: f64,
    pub view_height: f64,
    /// Multiplier applied to wall-clock delta time.
    pub game_speed: f64,
    pub tile_width: f64,
    pub tile_height: f64,
    pub pan_margin: f64,
    pub pan_speed: f64,
    /// Frame duration used when an animation does not specify one.
    pub default_frame_ms: f64,
    /// Give up on pending images after this long. `0` waits forever.
    pub load_timeout_ms: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fullscreen: false,
            pan: false,
            cursor_speed: 1.0,
            smoothing: false,
            game_area_width: consts::GAME_AREA_WIDTH,
            game_area_height: consts::GAME_AREA_HEIGHT,
            view_width: consts::VIEW_WIDTH,
            view_height: consts::VIEW_HEIGHT,
            game_speed: 1.0,
            tile_width: consts::TILE_WIDTH,
            tile_height: consts::TILE_HEIGHT,
            pan_margin: consts::PAN_MARGIN,
            pan_speed: consts::PAN_SPEED,
            default_frame_ms: consts::DEFAULT_FRAME_MS,
            load_timeout_ms: consts::LOAD_TIMEOUT_MS,
        }
    }
}

impl GameConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("view_width", self.view_width)?;
        positive("view_height", self.view_height)?;
        positive("game_area_width", self.game_area_width)?;
        positive("game_area_height", self.game_area_height)?;
        positive("tile_width", self.tile_width)?;
        positive("tile_height", self.tile_height)?;
        positive("pan_margin", self.pan_margin)?;
        positive("default_frame_ms", self.default_frame_ms)?;
        non_negative("pan_speed", self.pan_speed)?;
        non_negative("game_speed", self.game_speed)?;
        non_negative("cursor_speed", self.cursor_speed)?;
        Ok(())
    }

    #[must_use]
    pub fn view_size(&self) -> Size {
        Size::new(self.view_width, self.view_height)
    }

    #[must_use]
    pub fn game_area_size(&self) -> Size {
        Size::new(self.game_area_width, self.game_area_height)
    }

    #[must_use]
    pub fn tile_size(&self) -> Size {
        Size::new(self.tile_width, self.tile_height)
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be positive, got {value}") })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must not be negative, got {value}") })
    }
}

//! Shared numeric defaults for the game toolkit.

// ── Geometry ────────────────────────────────────────────────────

/// Default tile width in pixels.
pub const TILE_WIDTH: f64 = 32.0;

/// Default tile height in pixels.
pub const TILE_HEIGHT: f64 = 32.0;

/// Default view window width in CSS pixels.
pub const VIEW_WIDTH: f64 = 800.0;

/// Default view window height in CSS pixels.
pub const VIEW_HEIGHT: f64 = 600.0;

/// Default scrollable game-area width in pixels.
pub const GAME_AREA_WIDTH: f64 = 3000.0;

/// Default scrollable game-area height in pixels.
pub const GAME_AREA_HEIGHT: f64 = 2000.0;

// ── Camera ──────────────────────────────────────────────────────

/// Distance from a view edge, in pixels, inside which the camera pans.
pub const PAN_MARGIN: f64 = 16.0;

/// Pan velocity in pixels per tick when the cursor sits on the edge.
pub const PAN_SPEED: f64 = 35.0;

// ── Timing ──────────────────────────────────────────────────────

/// Default time a single animation frame stays on screen.
pub const DEFAULT_FRAME_MS: f64 = 100.0;

/// How long image loading may take before missing images are given up on.
pub const LOAD_TIMEOUT_MS: u32 = 10_000;

// ── Text ────────────────────────────────────────────────────────

pub const DEFAULT_TEXT_COLOR: &str = "black";
pub const DEFAULT_TEXT_SIZE: f64 = 12.0;
pub const DEFAULT_FONT: &str = "Arial";

//! Error types.
//!
//! Most failures in this crate are routine rather than exceptional: an image
//! that has not finished loading, or a layer that has not been created yet.
//! Drawing code reports them as `Err` values and callers retry on the next
//! tick; nothing here is fatal to the game loop.

/// Failure reported by a host drawing surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// A `Canvas2D` call was rejected by the host.
    #[error("canvas operation failed: {0}")]
    Canvas(String),
    /// The host could not create a surface for the named layer.
    #[error("could not create surface for layer `{0}`")]
    Create(String),
}

/// Failure of a draw operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrawError {
    /// The image is unknown or has not finished loading.
    #[error("image `{0}` is not loaded")]
    MissingImage(String),
    /// No sprite sheet is registered under this name.
    #[error("sprite sheet `{0}` is not registered")]
    MissingSprite(String),
    /// No layer exists with this name.
    #[error("layer `{0}` does not exist")]
    MissingLayer(String),
    /// The frame index is past the end of the sprite sheet.
    #[error("frame {frame} is out of range for `{sheet}` ({total} frames)")]
    FrameOutOfRange { sheet: String, frame: usize, total: usize },
    /// No animation exists with this id.
    #[error("animation {0} does not exist")]
    MissingAnimation(uuid::Uuid),
    /// The host surface rejected the call.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Failure to build a [`crate::config::GameConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure of a tile map or collision grid operation.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map grid is empty")]
    Empty,
    #[error("map row {row} has {found} cells, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("cell ({x}, {y}) is outside the {columns}x{rows} grid")]
    OutOfBounds { x: usize, y: usize, columns: usize, rows: usize },
    #[error("collision layer `{0}` does not exist")]
    UnknownCollisionLayer(String),
    #[error("collision grid is {found_columns}x{found_rows}, map is {columns}x{rows}")]
    DimensionMismatch { columns: usize, rows: usize, found_columns: usize, found_rows: usize },
    #[error("invalid map JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Draw(#[from] DrawError),
}

/// Failure while loading image resources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("image `{name}` failed to load from `{source_url}`")]
    Failed { name: String, source_url: String },
    #[error("image loading timed out after {after_ms} ms; still pending: {pending:?}")]
    Timeout { after_ms: u32, pending: Vec<String> },
}

/// Failure reported by an input adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("pointer lock is not supported by this host")]
    PointerLockUnsupported,
    #[error("pointer lock request failed: {0}")]
    PointerLock(String),
    #[error("failed to attach input listeners: {0}")]
    Attach(String),
}

/// Failure to construct or drive a [`crate::engine::Game`].
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Draw(#[from] DrawError),
    /// The page is missing something the game needs.
    #[error("host setup failed: {0}")]
    Host(String),
    /// The game is already borrowed, e.g. by a running tick.
    #[error("game is busy")]
    Busy,
}

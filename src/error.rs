// THEORY:
// Errors are split by layer. `SamplingError` is per tick and never fatal to a
// session: the scheduler logs it and keeps the previous palette.
// `SchedulerError` rejects a session before it starts. `MediaError` and
// `ConfigError` only surface while the binary is setting up.

use thiserror::Error;

/// Failures produced while turning a frame into a palette.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// The grid does not fit the frame, or has a zero dimension.
    #[error("invalid grid {rows}x{columns} for a {width}x{height} frame")]
    InvalidGrid {
        rows: u32,
        columns: u32,
        width: u32,
        height: u32,
    },
    /// The frame could not be turned into a pixel surface.
    #[error("decode error: {0}")]
    Decode(String),
}

impl SamplingError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<image::ImageError> for SamplingError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failures raised when a sampling session cannot be started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("a sampling session is already running")]
    AlreadyRunning,
    #[error("sampling interval must be greater than zero")]
    InvalidInterval,
    #[error("media source has zero duration")]
    EmptySource,
    #[error("grid must have at least one row and one column, got {rows}x{columns}")]
    InvalidGrid { rows: u32, columns: u32 },
}

/// Failures raised while loading a media asset.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("no decodable frames found in {0}")]
    Empty(String),
    #[error("frame rate must be a positive number, got {0}")]
    InvalidFrameRate(f64),
}

/// Failures raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

//! Error types for bmbb-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bmbb-ap
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was attempted while a conflicting one is in flight
    #[error("Busy: {0}")]
    Busy(String),

    /// Playback requested before a song was selected
    #[error("No song selected")]
    NotSelected,

    /// File does not exist
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// File exists but could not be opened
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Audio header outside the configured PCM profile
    #[error("Audio format mismatch: {0}")]
    FormatMismatch(String),

    /// Fewer bytes than a fixed-size structure requires
    #[error("Truncated: expected {expected} bytes, read {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Output device rejected (or never accepted) the requested parameters
    #[error("Audio configuration failed: {0}")]
    ConfigFailed(String),

    /// Audio output write or trigger failure
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Actuator line I/O failure
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] bmbb_common::Error),

    /// Worker panics and poisoned locks
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map a failed `File::open` to `NotFound` or `OpenFailed`
    pub fn open_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(path),
            _ => Error::OpenFailed { path, source },
        }
    }
}

/// Convenience Result type using bmbb-ap Error
pub type Result<T> = std::result::Result<T, Error>;

//! Common error types for BMBB

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for BMBB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the BMBB crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested file could not be found or opened
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),
}

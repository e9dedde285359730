//! # BMBB Common Library
//!
//! Shared code for the Big Mouth Billy Bass player:
//! - Error types
//! - Bootstrap configuration helpers (config file location, root folder)
//! - Monotonic time helpers shared by the audio and motion workers
//! - Instruction script format (`.DAT` movement files)

pub mod config;
pub mod error;
pub mod io;
pub mod script;
pub mod time;

pub use error::{Error, Result};
pub use script::{Instruction, Movement};

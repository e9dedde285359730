//! Song catalog and playback coordinator

pub mod catalog;
pub mod engine;

pub use catalog::{Catalog, Mode, Song};
pub use engine::{CurrentPolicy, EngineOptions, PlaybackEngine, SessionReport};

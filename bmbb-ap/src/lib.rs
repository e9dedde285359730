//! # Big Mouth Billy Bass Audio Player Library (bmbb-ap)
//!
//! Plays a WAV track while replaying its timed motion script on the
//! figure's actuator lines, both started from one shared instant.
//!
//! **Architecture:** blocking PCM streamer + async instruction scheduler,
//! coordinated by [`PlaybackEngine`]

pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod motion;
pub mod playback;
pub mod shell;
pub mod worker;

pub use error::{Error, Result};
pub use playback::PlaybackEngine;

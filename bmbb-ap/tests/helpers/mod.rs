//! Test helper modules for bmbb-ap integration tests
//!
//! - audio_generator: hound-written WAV fixtures
//! - doubles: recording PCM sink and recording actuator lines
//! - scripts: instruction file fixtures

#![allow(dead_code)]

pub mod audio_generator;
pub mod doubles;
pub mod scripts;

pub use audio_generator::{generate_mono_wav, generate_stereo_wav, TEST_SAMPLE_RATE};
pub use doubles::{LineEvent, RecordingLines, RecordingSink, SinkEvent};
pub use scripts::write_script;

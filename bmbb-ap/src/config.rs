//! Bootstrap configuration for bmbb-ap
//!
//! Loaded once at start-up from TOML. Every field has a built-in default, so
//! an absent file or an empty one yields a working player.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--root-folder, --sink, --device)
//! 2. Environment variables (BMBB_ROOT_FOLDER)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::audio::{PcmFormat, StreamerSettings};
use crate::error::{Error, Result};
use crate::motion::{MotionSettings, PinMap};
use crate::playback::CurrentPolicy;
use bmbb_common::config::{locate_config_file, read_config_file};
use bmbb_common::script::DEFAULT_CALIBRATION_MS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the songs (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Output backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Real audio device via cpal
    #[default]
    Cpal,
    /// Headless real-time pacing, no audio hardware
    Paced,
}

/// Actuator line backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineBackend {
    /// Log transitions only
    #[default]
    Trace,
    /// sysfs GPIO
    Sysfs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,

    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Blocks written before the device clock starts
    #[serde(default = "default_initial_blocks")]
    pub initial_blocks: usize,

    /// Total blocks in the pool
    #[serde(default = "default_block_count")]
    pub block_count: usize,

    /// Longest a blocking device write may wait
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default)]
    pub sink: SinkKind,

    /// cpal device name (default device if unset)
    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Subtracted from every parsed timestamp to absorb output latency
    #[serde(default = "default_calibration_offset_ms")]
    pub calibration_offset_ms: i64,

    /// MOUTH/TAIL pulse length
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_release_on_cancel")]
    pub release_on_cancel: bool,

    #[serde(default)]
    pub backend: LineBackend,

    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,

    #[serde(default)]
    pub pins: PinMap,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub current_policy: CurrentPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG wins
    #[serde(default)]
    pub level: Option<String>,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_bit_depth() -> u16 {
    16
}

fn default_channels() -> u16 {
    1
}

fn default_initial_blocks() -> usize {
    2
}

fn default_block_count() -> usize {
    4
}

fn default_write_timeout_ms() -> u64 {
    1000
}

fn default_calibration_offset_ms() -> i64 {
    DEFAULT_CALIBRATION_MS
}

fn default_settle_ms() -> u64 {
    100
}

fn default_release_on_cancel() -> bool {
    true
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            bit_depth: default_bit_depth(),
            channels: default_channels(),
            initial_blocks: default_initial_blocks(),
            block_count: default_block_count(),
            write_timeout_ms: default_write_timeout_ms(),
            sink: SinkKind::default(),
            device: None,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            calibration_offset_ms: default_calibration_offset_ms(),
            settle_ms: default_settle_ms(),
            release_on_cancel: default_release_on_cancel(),
            backend: LineBackend::default(),
            gpio_root: default_gpio_root(),
            pins: PinMap::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(text)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Locate and load the config file.
    ///
    /// Returns the defaults and `None` when no file exists in any standard
    /// location; an explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match locate_config_file(explicit)? {
            Some(path) => {
                let text = read_config_file(&path)?;
                let config = Self::from_toml_str(&text)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Reject values the player cannot run with
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate < 10 {
            return Err(Error::Config(format!(
                "audio.sample_rate {} is below 10 Hz",
                audio.sample_rate
            )));
        }
        if audio.initial_blocks < 2 {
            return Err(Error::Config(format!(
                "audio.initial_blocks must be at least 2, got {}",
                audio.initial_blocks
            )));
        }
        if audio.block_count < audio.initial_blocks + 2 {
            return Err(Error::Config(format!(
                "audio.block_count must be at least initial_blocks + 2 ({}), got {}",
                audio.initial_blocks + 2,
                audio.block_count
            )));
        }
        if audio.write_timeout_ms == 0 {
            return Err(Error::Config("audio.write_timeout_ms must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::new(
            self.audio.sample_rate,
            self.audio.bit_depth,
            self.audio.channels,
        )
    }

    pub fn streamer_settings(&self) -> StreamerSettings {
        StreamerSettings {
            initial_blocks: self.audio.initial_blocks,
            block_count: self.audio.block_count,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.audio.write_timeout_ms)
    }

    pub fn motion_settings(&self) -> MotionSettings {
        MotionSettings {
            settle: Duration::from_millis(self.motion.settle_ms),
            release_on_cancel: self.motion.release_on_cancel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config.pcm_format(), PcmFormat::mono_16(44100));
        assert_eq!(config.audio.block_count, 4);
        assert_eq!(config.audio.sink, SinkKind::Cpal);
        assert_eq!(config.motion.calibration_offset_ms, 200);
        assert_eq!(config.motion.pins.mouth1, 27);
        assert_eq!(config.playback.current_policy, CurrentPolicy::Selection);
        assert!(config.logging.level.is_none());
    }

    #[test]
    fn test_full_file_parses() {
        let text = r#"
            root_folder = "/media/SD"

            [audio]
            sample_rate = 22050
            initial_blocks = 3
            block_count = 6
            sink = "paced"

            [motion]
            calibration_offset_ms = 150
            settle_ms = 80
            release_on_cancel = false
            backend = "sysfs"
            pins = { mouth0 = 5, mouth1 = 6, body0 = 13, body1 = 19 }

            [playback]
            current_policy = "while_playing"

            [logging]
            level = "debug"
        "#;
        let config = TomlConfig::from_toml_str(text).unwrap();
        assert_eq!(config.root_folder, Some(PathBuf::from("/media/SD")));
        assert_eq!(config.audio.sample_rate, 22050);
        assert_eq!(config.audio.sink, SinkKind::Paced);
        assert_eq!(config.streamer_settings().block_count, 6);
        assert_eq!(config.motion.backend, LineBackend::Sysfs);
        assert_eq!(config.motion.pins.body1, 19);
        assert_eq!(config.motion_settings().settle, Duration::from_millis(80));
        assert!(!config.motion_settings().release_on_cancel);
        assert_eq!(config.playback.current_policy, CurrentPolicy::WhilePlaying);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_rejects_single_prefill_block() {
        let result = TomlConfig::from_toml_str("[audio]\ninitial_blocks = 1\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_pool_without_steady_state_blocks() {
        let result = TomlConfig::from_toml_str("[audio]\ninitial_blocks = 3\nblock_count = 4\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_sink() {
        let result = TomlConfig::from_toml_str("[audio]\nsink = \"alsa\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = TomlConfig::load(Some(Path::new("/nonexistent/bmbb.toml")));
        assert!(result.is_err());
    }
}

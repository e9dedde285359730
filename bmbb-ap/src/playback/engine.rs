//! Playback coordinator
//!
//! Owns the catalog, the audio streamer and the motion scheduler. A session
//! starts both workers from one shared start instant; neither waits on the
//! other. At most one session runs at a time and a second start is rejected
//! with `Busy`.
//!
//! ```text
//! Idle --next--> Selected --start_playing--> Playing --cancel/finish--> Selected
//! ```

use crate::audio::{AudioStreamer, PcmFormat, PcmSink, StreamReport, StreamerSettings};
use crate::config::TomlConfig;
use crate::error::{Error, Result};
use crate::motion::{ActuatorLines, MotionReport, MotionScheduler, MotionSettings};
use crate::playback::catalog::{Catalog, Mode, Song};
use bmbb_common::script::load_script;
use bmbb_common::time;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What `current()` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrentPolicy {
    /// The selected song, playing or not
    #[default]
    Selection,
    /// The playing song, nothing while idle
    WhilePlaying,
}

/// Engine construction parameters
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub format: PcmFormat,
    pub streamer: StreamerSettings,
    pub motion: MotionSettings,
    pub calibration_ms: i64,
    pub current_policy: CurrentPolicy,
}

impl From<&TomlConfig> for EngineOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            format: config.pcm_format(),
            streamer: config.streamer_settings(),
            motion: config.motion_settings(),
            calibration_ms: config.motion.calibration_offset_ms,
            current_policy: config.playback.current_policy,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

/// Results of both workers of one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub audio: Option<StreamReport>,
    pub motion: Option<MotionReport>,
}

/// Collect both worker outcomes, keeping the first failure
fn merge(
    audio: Option<Result<StreamReport>>,
    motion: Option<Result<MotionReport>>,
) -> Result<SessionReport> {
    let mut report = SessionReport::default();
    let mut failure = None;

    match audio {
        Some(Ok(r)) => report.audio = Some(r),
        Some(Err(e)) => failure = Some(e),
        None => {}
    }
    match motion {
        Some(Ok(r)) => report.motion = Some(r),
        Some(Err(e)) => {
            if failure.is_some() {
                warn!("Motion worker also failed: {}", e);
            } else {
                failure = Some(e);
            }
        }
        None => {}
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// Playback coordinator
pub struct PlaybackEngine {
    catalog: Catalog,
    streamer: AudioStreamer,
    scheduler: MotionScheduler,
    calibration_ms: i64,
    policy: CurrentPolicy,
    /// Song of the latest session
    playing: Option<PathBuf>,
}

impl PlaybackEngine {
    /// Build the engine and configure the output device.
    ///
    /// A device that rejects the format is logged, not fatal: every later
    /// `start_playing` then fails fast with `ConfigFailed`.
    ///
    /// # Errors
    /// - `Actuator` if the lines cannot be driven to rest
    pub fn new(
        sink: Box<dyn PcmSink>,
        lines: Box<dyn ActuatorLines>,
        options: EngineOptions,
    ) -> Result<Self> {
        let scheduler = MotionScheduler::new(lines, options.motion)?;
        let mut streamer = AudioStreamer::new(sink, options.streamer);
        if let Err(e) = streamer.configure(options.format) {
            error!("Audio output configuration failed: {}", e);
        }

        info!(
            "Playback engine ready (calibration {}ms, current policy {:?})",
            options.calibration_ms, options.current_policy
        );

        Ok(Self {
            catalog: Catalog::new(),
            streamer,
            scheduler,
            calibration_ms: options.calibration_ms,
            policy: options.current_policy,
            playing: None,
        })
    }

    /// Parse `instruction_path` and append the song to the songs list
    pub fn add(&mut self, audio_path: &Path, instruction_path: &Path) -> Result<()> {
        self.add_to(Mode::Songs, audio_path, instruction_path)
    }

    /// Parse `instruction_path` and append the song to `mode`'s list.
    ///
    /// Nothing is added if the instruction file cannot be read.
    pub fn add_to(&mut self, mode: Mode, audio_path: &Path, instruction_path: &Path) -> Result<()> {
        let instructions = load_script(instruction_path, self.calibration_ms)?;
        self.catalog.push(mode, Song::new(audio_path, instructions));
        Ok(())
    }

    /// Advance the selection; does not touch playback
    pub fn next(&mut self) -> Option<&Path> {
        let path = self.catalog.advance().map(|song| song.audio_path.as_path());
        debug!("Selected {:?}", path);
        path
    }

    /// Current song according to the configured policy
    pub fn current(&self) -> Option<&Path> {
        match self.policy {
            CurrentPolicy::Selection => self.catalog.current_path(),
            CurrentPolicy::WhilePlaying if self.is_playing() => self.playing.as_deref(),
            CurrentPolicy::WhilePlaying => None,
        }
    }

    /// Start a session for the selected song.
    ///
    /// # Errors
    /// - `NotSelected` if nothing is selected
    /// - `Busy` while either worker of a previous session runs
    /// - any `play` failure of the audio streamer (no worker is left running)
    pub async fn start_playing(&mut self) -> Result<PathBuf> {
        let song = self.catalog.current().cloned().ok_or(Error::NotSelected)?;
        if self.is_playing() {
            return Err(Error::Busy("a session is already playing".to_string()));
        }

        let start = time::now();
        self.streamer.play(&song.audio_path, start)?;
        if let Err(e) = self.scheduler.start(Arc::clone(&song.instructions), start) {
            if let Some(Err(cancel_err)) = self.streamer.cancel().await {
                warn!("Audio cancel after motion start failure: {}", cancel_err);
            }
            return Err(e);
        }

        info!(
            "Playing {} with {} instructions",
            song.audio_path.display(),
            song.instructions.len()
        );
        self.playing = Some(song.audio_path.clone());
        Ok(song.audio_path)
    }

    /// Cancel both workers and wait until they have exited.
    ///
    /// A no-op returning an empty report when nothing was started.
    pub async fn cancel_current(&mut self) -> Result<SessionReport> {
        let audio = self.streamer.cancel().await;
        let motion = self.scheduler.cancel().await;
        if audio.is_some() || motion.is_some() {
            info!("Session cancelled");
        }
        merge(audio, motion)
    }

    /// Wait for both workers of the current session to finish on their own
    pub async fn wait_idle(&mut self) -> Result<SessionReport> {
        let audio = self.streamer.wait().await;
        let motion = self.scheduler.wait().await;
        merge(audio, motion)
    }

    /// True while either worker is running
    pub fn is_playing(&self) -> bool {
        self.streamer.is_busy() || self.scheduler.is_busy()
    }

    /// Switch between songs and jokes, clearing the selection
    pub fn toggle_mode(&mut self) -> Mode {
        let mode = self.catalog.toggle_mode();
        info!("Mode switched to {}", mode);
        mode
    }

    pub fn mode(&self) -> Mode {
        self.catalog.mode()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// True once the output device accepted its configuration
    pub fn audio_ready(&self) -> bool {
        self.streamer.format().is_some()
    }
}

//! Recording test doubles for the output sink and actuator lines

use bmbb_ap::audio::{PcmFormat, PcmSink, Trigger, WriteMode};
use bmbb_ap::motion::{ActuatorLines, Line};
use bmbb_ap::{Error, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One call received by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Configure {
        sample_rate: u32,
        block_bytes: usize,
        queue_blocks: usize,
    },
    Write {
        mode: WriteMode,
        len: usize,
    },
    Trigger(Trigger),
}

/// Sink that accepts everything instantly and records each call
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
    reject_configure: bool,
    fail_blocking_writes: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose device refuses every configuration
    pub fn rejecting() -> Self {
        Self {
            reject_configure: true,
            ..Self::default()
        }
    }

    /// A sink that takes the pre-fill but fails every blocking write
    pub fn failing_writes() -> Self {
        Self {
            fail_blocking_writes: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(WriteMode, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Write { mode, len } => Some((mode, len)),
                _ => None,
            })
            .collect()
    }

    pub fn triggers(&self) -> Vec<Trigger> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Trigger(t) => Some(t),
                _ => None,
            })
            .collect()
    }
}

impl PcmSink for RecordingSink {
    fn configure(
        &mut self,
        format: &PcmFormat,
        block_bytes: usize,
        queue_blocks: usize,
    ) -> Result<()> {
        if self.reject_configure {
            return Err(Error::ConfigFailed("device rejected format".to_string()));
        }
        self.events.lock().unwrap().push(SinkEvent::Configure {
            sample_rate: format.sample_rate,
            block_bytes,
            queue_blocks,
        });
        Ok(())
    }

    fn write(&mut self, block: &[u8], mode: WriteMode) -> Result<()> {
        if self.fail_blocking_writes && mode == WriteMode::Blocking {
            return Err(Error::AudioOutput("device write failed".to_string()));
        }
        self.events.lock().unwrap().push(SinkEvent::Write {
            mode,
            len: block.len(),
        });
        Ok(())
    }

    fn trigger(&mut self, trigger: Trigger) -> Result<()> {
        self.events.lock().unwrap().push(SinkEvent::Trigger(trigger));
        Ok(())
    }

    fn name(&self) -> String {
        "recording".to_string()
    }
}

/// One line transition with its tokio-clock offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub line: Line,
    pub active: bool,
    pub at: Duration,
}

impl LineEvent {
    pub fn at_ms(&self) -> u128 {
        self.at.as_millis()
    }
}

/// Lines recording every transition relative to their creation instant
#[derive(Clone)]
pub struct RecordingLines {
    events: Arc<Mutex<Vec<LineEvent>>>,
    origin: Instant,
}

impl RecordingLines {
    /// Must be created inside a tokio runtime
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            origin: Instant::now(),
        }
    }

    pub fn events(&self) -> Vec<LineEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Forget the transitions recorded so far (e.g. the initial rest)
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Transitions of one line
    pub fn of(&self, line: Line) -> Vec<LineEvent> {
        self.events().into_iter().filter(|e| e.line == line).collect()
    }
}

impl ActuatorLines for RecordingLines {
    fn set(&mut self, line: Line, active: bool) -> Result<()> {
        self.events.lock().unwrap().push(LineEvent {
            line,
            active,
            at: self.origin.elapsed(),
        });
        Ok(())
    }
}

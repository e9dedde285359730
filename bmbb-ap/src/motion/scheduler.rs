//! Actuator scheduler
//!
//! Replays a song's instructions against the session start instant. Each
//! instruction sleeps until `start + offset_ms` (already-due instructions,
//! including negative offsets, fire immediately) and then drives the
//! actuator lines. Instructions run strictly in stored order; they are not
//! re-sorted.

use crate::error::{Error, Result};
use crate::motion::lines::{release_all, ActuatorLines, Line};
use crate::worker::Worker;
use bmbb_common::time::{deadline_after, elapsed_ms};
use bmbb_common::{Instruction, Movement};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

type SharedLines = Arc<Mutex<Box<dyn ActuatorLines>>>;

/// How a motion run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEnd {
    /// Every instruction was dispatched
    Exhausted,
    /// Cancellation observed before the sequence ended
    Cancelled,
}

/// Outcome of one motion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionReport {
    pub dispatched: usize,
    pub total: usize,
    pub end: MotionEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct MotionSettings {
    /// Hold time of MOUTH and TAIL pulses
    pub settle: Duration,
    /// Drive every line inactive when a run is cancelled
    pub release_on_cancel: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            release_on_cancel: true,
        }
    }
}

fn drive(lines: &Mutex<Box<dyn ActuatorLines>>, steps: &[(Line, bool)]) -> Result<()> {
    let mut lines = lines
        .lock()
        .map_err(|_| Error::Internal("actuator lines lock poisoned".to_string()))?;
    for &(line, active) in steps {
        lines.set(line, active)?;
    }
    Ok(())
}

fn rest(lines: &Mutex<Box<dyn ActuatorLines>>) -> Result<()> {
    let mut lines = lines
        .lock()
        .map_err(|_| Error::Internal("actuator lines lock poisoned".to_string()))?;
    release_all(lines.as_mut())
}

/// Single-instance instruction player
pub struct MotionScheduler {
    lines: SharedLines,
    settings: MotionSettings,
    worker: Option<Worker<Result<MotionReport>>>,
}

impl MotionScheduler {
    /// Take ownership of the lines and drive them all inactive
    pub fn new(lines: Box<dyn ActuatorLines>, settings: MotionSettings) -> Result<Self> {
        let lines: SharedLines = Arc::new(Mutex::new(lines));
        rest(&lines)?;
        debug!("Actuator lines initialised to rest");
        Ok(Self {
            lines,
            settings,
            worker: None,
        })
    }

    /// Launch a run of `instructions` against `start`.
    ///
    /// # Errors
    /// - `Busy` if the previous run has not completed
    pub fn start(&mut self, instructions: Arc<[Instruction]>, start: Instant) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy("motion run in progress".to_string()));
        }
        self.worker = None;

        let lines = Arc::clone(&self.lines);
        let settings = self.settings;
        debug!("Starting motion run of {} instructions", instructions.len());
        self.worker = Some(Worker::spawn("motion", move |token| {
            run_motion(lines, instructions, start, settings, token)
        }));
        Ok(())
    }

    /// Non-blocking liveness check
    pub fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_running())
    }

    /// Cancel the current run and wait for it to exit
    pub async fn cancel(&mut self) -> Option<Result<MotionReport>> {
        let worker = self.worker.take()?;
        Some(worker.cancel_and_join().await.and_then(|r| r))
    }

    /// Wait for the current run to finish on its own
    pub async fn wait(&mut self) -> Option<Result<MotionReport>> {
        let result = self.worker.as_mut()?.wait().await;
        self.worker = None;
        Some(result.and_then(|r| r))
    }
}

/// Sleep for `hold` unless cancelled first; true if the hold completed
async fn hold(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

/// Drive one instruction. Returns false if a hold was cut short.
async fn act(
    lines: &Mutex<Box<dyn ActuatorLines>>,
    kind: Movement,
    settle: Duration,
    token: &CancellationToken,
) -> Result<bool> {
    match kind {
        Movement::Head => {
            drive(lines, &[(Line::Body1, false), (Line::Body0, true)])?;
            Ok(true)
        }
        Movement::Mouth => {
            drive(lines, &[(Line::Mouth0, false), (Line::Mouth1, true)])?;
            let held = hold(settle, token).await;
            drive(lines, &[(Line::Mouth1, false)])?;
            Ok(held)
        }
        Movement::Tail => {
            drive(lines, &[(Line::Body0, false), (Line::Body1, true)])?;
            let held = hold(settle, token).await;
            drive(lines, &[(Line::Body1, false)])?;
            Ok(held)
        }
        Movement::Release => {
            drive(lines, &[(Line::Body0, false), (Line::Body1, false)])?;
            Ok(true)
        }
    }
}

async fn run_motion(
    lines: SharedLines,
    instructions: Arc<[Instruction]>,
    start: Instant,
    settings: MotionSettings,
    token: CancellationToken,
) -> Result<MotionReport> {
    let total = instructions.len();
    let mut dispatched = 0;
    let mut end = MotionEnd::Exhausted;

    for instruction in instructions.iter() {
        let deadline = deadline_after(start, instruction.offset_ms);
        let due = tokio::select! {
            biased;
            _ = token.cancelled() => false,
            _ = sleep_until(deadline) => true,
        };
        if !due || token.is_cancelled() {
            end = MotionEnd::Cancelled;
            break;
        }

        trace!(
            "{} due at {}ms, firing at {}ms",
            instruction.kind,
            instruction.offset_ms,
            elapsed_ms(start)
        );
        let completed = match act(&lines, instruction.kind, settings.settle, &token).await {
            Ok(completed) => completed,
            Err(e) => {
                error!("Actuator failure on {}: {}", instruction.kind, e);
                if let Err(rest_err) = rest(&lines) {
                    warn!("Failed to release actuator lines: {}", rest_err);
                }
                return Err(e);
            }
        };
        dispatched += 1;
        if !completed {
            end = MotionEnd::Cancelled;
            break;
        }
    }

    if end == MotionEnd::Cancelled && settings.release_on_cancel {
        rest(&lines)?;
    }
    info!(
        "Motion run ended ({:?}): {}/{} instructions",
        end, dispatched, total
    );
    Ok(MotionReport {
        dispatched,
        total,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::lines::TraceLines;

    #[tokio::test(start_paused = true)]
    async fn test_empty_run_exhausts_immediately() {
        let mut scheduler =
            MotionScheduler::new(Box::new(TraceLines::new()), MotionSettings::default()).unwrap();
        scheduler.start(Arc::from(Vec::new()), Instant::now()).unwrap();
        let report = scheduler.wait().await.unwrap().unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.end, MotionEnd::Exhausted);
        assert!(!scheduler.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_busy() {
        let mut scheduler =
            MotionScheduler::new(Box::new(TraceLines::new()), MotionSettings::default()).unwrap();
        let script: Arc<[Instruction]> = Arc::from(vec![Instruction::new(Movement::Head, 5000)]);
        scheduler.start(Arc::clone(&script), Instant::now()).unwrap();
        assert!(matches!(
            scheduler.start(script, Instant::now()),
            Err(Error::Busy(_))
        ));

        let report = scheduler.cancel().await.unwrap().unwrap();
        assert_eq!(report.end, MotionEnd::Cancelled);
        assert_eq!(report.dispatched, 0);
    }

    #[tokio::test]
    async fn test_wait_without_run_is_none() {
        let mut scheduler =
            MotionScheduler::new(Box::new(TraceLines::new()), MotionSettings::default()).unwrap();
        assert!(scheduler.wait().await.is_none());
        assert!(scheduler.cancel().await.is_none());
    }
}

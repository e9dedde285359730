//! PCM output sink interface
//!
//! The streamer talks to the audio hardware through [`PcmSink`]: configure
//! once, write whole blocks, and start or drop the output clock. Two
//! implementations ship with the player:
//!
//! - [`crate::audio::output::CpalSink`]: a real output device via cpal
//! - [`PacedSink`]: a headless device that consumes samples in real time

use crate::audio::types::PcmFormat;
use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// How a block write may wait for room in the device queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail instead of waiting (pre-fill before the clock starts)
    NonBlocking,
    /// Wait until the device has consumed enough to accept the block
    Blocking,
}

/// Output clock control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Start consuming queued samples
    Start,
    /// Play out everything queued, then stop the clock
    Drain,
    /// Stop the clock and discard anything still queued
    Drop,
}

/// Audio output device accepting PCM blocks
pub trait PcmSink: Send {
    /// Configure the device for `format`, queueing at most `queue_blocks`
    /// blocks of `block_bytes` bytes.
    ///
    /// # Errors
    /// - `ConfigFailed` if the device cannot run at exactly these parameters
    fn configure(&mut self, format: &PcmFormat, block_bytes: usize, queue_blocks: usize)
        -> Result<()>;

    /// Queue one block of little-endian PCM bytes
    fn write(&mut self, block: &[u8], mode: WriteMode) -> Result<()>;

    /// Start, drain or drop the output clock
    fn trigger(&mut self, trigger: Trigger) -> Result<()>;

    /// Human readable device name for logs
    fn name(&self) -> String;
}

/// Headless sink consuming samples at the configured real-time rate.
///
/// Blocking writes sleep until the simulated device has drained enough of
/// its queue, which reproduces the pacing of a real output without audio
/// hardware.
pub struct PacedSink {
    format: Option<PcmFormat>,
    capacity_bytes: u64,
    write_timeout: Duration,
    /// Bytes accepted since the last drop
    written: u64,
    /// Clock start, `None` while stopped
    started_at: Option<Instant>,
}

impl PacedSink {
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            format: None,
            capacity_bytes: 0,
            write_timeout,
            written: 0,
            started_at: None,
        }
    }

    fn consumed(&self, format: &PcmFormat) -> u64 {
        match self.started_at {
            Some(start) => {
                let elapsed_us = start.elapsed().as_micros() as u64;
                (elapsed_us.saturating_mul(format.bytes_per_second()) / 1_000_000).min(self.written)
            }
            None => 0,
        }
    }

    fn queued(&self, format: &PcmFormat) -> u64 {
        self.written - self.consumed(format)
    }
}

impl PcmSink for PacedSink {
    fn configure(
        &mut self,
        format: &PcmFormat,
        block_bytes: usize,
        queue_blocks: usize,
    ) -> Result<()> {
        if format.sample_rate == 0 || format.frame_bytes() == 0 {
            return Err(Error::ConfigFailed(format!("unusable format {}", format)));
        }
        self.format = Some(*format);
        self.capacity_bytes = (block_bytes * queue_blocks) as u64;
        self.written = 0;
        self.started_at = None;
        debug!(
            "Paced sink configured: {}, queue {} bytes",
            format, self.capacity_bytes
        );
        Ok(())
    }

    fn write(&mut self, block: &[u8], mode: WriteMode) -> Result<()> {
        let format = self
            .format
            .ok_or_else(|| Error::ConfigFailed("paced sink not configured".to_string()))?;
        let len = block.len() as u64;
        if len > self.capacity_bytes {
            return Err(Error::AudioOutput(format!(
                "block of {} bytes exceeds device queue of {} bytes",
                len, self.capacity_bytes
            )));
        }

        let deadline = Instant::now() + self.write_timeout;
        while self.queued(&format) + len > self.capacity_bytes {
            if mode == WriteMode::NonBlocking {
                return Err(Error::AudioOutput("device queue full".to_string()));
            }
            if self.started_at.is_none() || Instant::now() >= deadline {
                return Err(Error::AudioOutput(format!(
                    "write timed out after {:?}",
                    self.write_timeout
                )));
            }
            let overflow = self.queued(&format) + len - self.capacity_bytes;
            let wait = format.duration_of(overflow).max(Duration::from_millis(1));
            std::thread::sleep(wait.min(deadline.saturating_duration_since(Instant::now())));
        }

        self.written += len;
        trace!("Paced sink accepted {} bytes", len);
        Ok(())
    }

    fn trigger(&mut self, trigger: Trigger) -> Result<()> {
        match trigger {
            Trigger::Start => {
                if self.started_at.is_none() {
                    self.started_at = Some(Instant::now());
                }
            }
            Trigger::Drain => {
                if let Some(format) = self.format {
                    if self.started_at.is_some() {
                        std::thread::sleep(format.duration_of(self.queued(&format)));
                    }
                }
                self.started_at = None;
                self.written = 0;
            }
            Trigger::Drop => {
                self.started_at = None;
                self.written = 0;
            }
        }
        debug!("Paced sink trigger {:?}", trigger);
        Ok(())
    }

    fn name(&self) -> String {
        "paced".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(queue_blocks: usize) -> (PacedSink, usize) {
        let format = PcmFormat::mono_16(8000);
        let block = format.block_bytes();
        let mut sink = PacedSink::new(Duration::from_millis(500));
        sink.configure(&format, block, queue_blocks).unwrap();
        (sink, block)
    }

    #[test]
    fn test_write_before_configure_fails() {
        let mut sink = PacedSink::new(Duration::from_millis(10));
        assert!(matches!(
            sink.write(&[0u8; 4], WriteMode::Blocking),
            Err(Error::ConfigFailed(_))
        ));
    }

    #[test]
    fn test_prefill_fits_without_clock() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        sink.write(&data, WriteMode::NonBlocking).unwrap();
        sink.write(&data, WriteMode::NonBlocking).unwrap();
    }

    #[test]
    fn test_non_blocking_write_fails_when_full() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        for _ in 0..4 {
            sink.write(&data, WriteMode::NonBlocking).unwrap();
        }
        assert!(matches!(
            sink.write(&data, WriteMode::NonBlocking),
            Err(Error::AudioOutput(_))
        ));
    }

    #[test]
    fn test_blocking_write_without_clock_times_out() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        for _ in 0..4 {
            sink.write(&data, WriteMode::NonBlocking).unwrap();
        }
        assert!(sink.write(&data, WriteMode::Blocking).is_err());
    }

    #[test]
    fn test_blocking_write_is_paced_by_clock() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        for _ in 0..4 {
            sink.write(&data, WriteMode::NonBlocking).unwrap();
        }
        sink.trigger(Trigger::Start).unwrap();

        let started = Instant::now();
        sink.write(&data, WriteMode::Blocking).unwrap();
        // One block (100ms) had to drain first
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_drain_waits_for_queue() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        sink.write(&data, WriteMode::NonBlocking).unwrap();
        sink.trigger(Trigger::Start).unwrap();

        let started = Instant::now();
        sink.trigger(Trigger::Drain).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_drop_empties_queue() {
        let (mut sink, block) = configured(4);
        let data = vec![0u8; block];
        for _ in 0..4 {
            sink.write(&data, WriteMode::NonBlocking).unwrap();
        }
        sink.trigger(Trigger::Drop).unwrap();
        sink.write(&data, WriteMode::NonBlocking).unwrap();
    }
}

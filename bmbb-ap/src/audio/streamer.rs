//! Audio streamer
//!
//! Streams one WAV file at a time to a [`PcmSink`] in ~100ms blocks taken
//! from a fixed [`BlockPool`]. Each playback runs in two phases:
//!
//! 1. [`BlockStream::prefill`]: non-blocking writes of the first blocks, then
//!    the device clock is started
//! 2. [`BlockStream::stream`]: blocking writes paced by the device until the
//!    payload ends or the cancellation token fires
//!
//! Whatever the outcome, the device clock is stopped and the file closed
//! before the worker exits.

use crate::audio::pool::{BlockHandle, BlockPool};
use crate::audio::sink::{PcmSink, Trigger, WriteMode};
use crate::audio::types::{PcmFormat, SUPPORTED_BIT_DEPTH, SUPPORTED_CHANNELS};
use crate::audio::wav::WavHeader;
use crate::error::{Error, Result};
use crate::worker::Worker;
use bmbb_common::io::read_full;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Short read of the payload
    EndOfStream,
    /// Cancellation observed at a block boundary
    Cancelled,
}

/// Outcome of one playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub path: PathBuf,
    /// Blocks handed to the device (pre-fill included)
    pub blocks: usize,
    pub bytes: u64,
    pub end: StreamEnd,
}

/// Pool sizing for the streamer
#[derive(Debug, Clone, Copy)]
pub struct StreamerSettings {
    /// Blocks written before the clock starts (>= 2)
    pub initial_blocks: usize,
    /// Total pool size (>= initial_blocks + 2)
    pub block_count: usize,
}

impl Default for StreamerSettings {
    fn default() -> Self {
        Self {
            initial_blocks: 2,
            block_count: 4,
        }
    }
}

/// One playback's view of the device and pool
pub struct BlockStream<'a, R> {
    sink: &'a mut dyn PcmSink,
    pool: &'a mut BlockPool,
    reader: R,
    blocks: usize,
    bytes: u64,
    exhausted: bool,
}

impl<'a, R: Read> BlockStream<'a, R> {
    pub fn new(sink: &'a mut dyn PcmSink, pool: &'a mut BlockPool, reader: R) -> Self {
        Self {
            sink,
            pool,
            reader,
            blocks: 0,
            bytes: 0,
            exhausted: false,
        }
    }

    /// Read the next block from the payload, `None` at end of stream
    fn fill_next(&mut self) -> Result<Option<BlockHandle>> {
        if self.exhausted {
            return Ok(None);
        }
        let handle = self.pool.acquire()?;
        let read = match read_full(&mut self.reader, self.pool.buffer_mut(&handle)) {
            Ok(read) => read,
            Err(e) => {
                self.pool.release(handle);
                return Err(e.into());
            }
        };
        if read < self.pool.block_size() {
            self.exhausted = true;
        }
        if read == 0 {
            self.pool.release(handle);
            return Ok(None);
        }
        self.pool.set_len(&handle, read);
        Ok(Some(handle))
    }

    fn send(&mut self, handle: BlockHandle, mode: WriteMode) -> Result<()> {
        let len = self.pool.filled(&handle).len();
        match self.sink.write(self.pool.filled(&handle), mode) {
            Ok(()) => {
                self.pool.submit(handle);
                self.blocks += 1;
                self.bytes += len as u64;
                Ok(())
            }
            Err(e) => {
                self.pool.release(handle);
                Err(e)
            }
        }
    }

    /// Write up to `count` blocks without waiting, then start the clock.
    ///
    /// Returns the number of blocks pre-filled.
    pub fn prefill(&mut self, count: usize) -> Result<usize> {
        let mut written = 0;
        while written < count {
            match self.fill_next()? {
                Some(handle) => self.send(handle, WriteMode::NonBlocking)?,
                None => break,
            }
            written += 1;
        }
        self.sink.trigger(Trigger::Start)?;
        // Let the clock start take effect before demand-paced writes
        std::thread::yield_now();
        debug!("Pre-filled {} blocks, clock started", written);
        Ok(written)
    }

    /// Stream the rest of the payload, checking `token` once per block
    pub fn stream(&mut self, token: &CancellationToken) -> Result<StreamEnd> {
        loop {
            if token.is_cancelled() {
                return Ok(StreamEnd::Cancelled);
            }
            match self.fill_next()? {
                Some(handle) => self.send(handle, WriteMode::Blocking)?,
                None => return Ok(StreamEnd::EndOfStream),
            }
        }
    }

    /// Stop the clock and retire every block. Runs on every exit path.
    pub fn finish(&mut self, end: Option<StreamEnd>) -> Result<()> {
        let trigger = match end {
            Some(StreamEnd::EndOfStream) => Trigger::Drain,
            _ => Trigger::Drop,
        };
        let stopped = self.sink.trigger(trigger);
        self.pool.retire_all();
        stopped
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Device plus the pool sized for it
struct Output {
    sink: Box<dyn PcmSink>,
    pool: Option<BlockPool>,
}

fn lock_output(output: &Mutex<Output>) -> Result<std::sync::MutexGuard<'_, Output>> {
    output
        .lock()
        .map_err(|_| Error::Internal("audio output lock poisoned".to_string()))
}

/// Single-instance WAV streamer
pub struct AudioStreamer {
    output: Arc<Mutex<Output>>,
    format: Option<PcmFormat>,
    settings: StreamerSettings,
    worker: Option<Worker<Result<StreamReport>>>,
}

impl AudioStreamer {
    pub fn new(sink: Box<dyn PcmSink>, settings: StreamerSettings) -> Self {
        Self {
            output: Arc::new(Mutex::new(Output { sink, pool: None })),
            format: None,
            settings,
            worker: None,
        }
    }

    /// Configure the device and allocate the block pool.
    ///
    /// Idempotent for an unchanged format. Only mono 16-bit PCM is
    /// supported.
    ///
    /// # Errors
    /// - `ConfigFailed` for another profile, an undersized pool or a device
    ///   that rejects the parameters
    /// - `Busy` while a playback is running
    pub fn configure(&mut self, format: PcmFormat) -> Result<()> {
        if self.format == Some(format) {
            return Ok(());
        }
        if self.is_busy() {
            return Err(Error::Busy("cannot reconfigure during playback".to_string()));
        }
        self.format = None;

        if format.bit_depth != SUPPORTED_BIT_DEPTH || format.channels != SUPPORTED_CHANNELS {
            return Err(Error::ConfigFailed(format!(
                "unsupported profile {}, need {}-bit mono",
                format, SUPPORTED_BIT_DEPTH
            )));
        }
        if self.settings.initial_blocks < 2
            || self.settings.block_count < self.settings.initial_blocks + 2
        {
            return Err(Error::ConfigFailed(format!(
                "{} blocks cannot cover {} pre-fill blocks plus two in flight",
                self.settings.block_count, self.settings.initial_blocks
            )));
        }

        let block_bytes = format.block_bytes();
        let mut output = lock_output(&self.output)?;
        output.pool = None;
        let pool = BlockPool::new(self.settings.block_count, block_bytes)?;
        output
            .sink
            .configure(&format, block_bytes, self.settings.block_count)?;
        output.pool = Some(pool);
        info!(
            "Audio streamer configured on {}: {}, {} blocks of {} bytes",
            output.sink.name(),
            format,
            self.settings.block_count,
            block_bytes
        );
        drop(output);

        self.format = Some(format);
        Ok(())
    }

    pub fn format(&self) -> Option<PcmFormat> {
        self.format
    }

    /// Start streaming `path` on a blocking worker.
    ///
    /// The header is read and validated before the worker is spawned, so a
    /// mismatching file never reaches the device.
    ///
    /// # Errors
    /// - `Busy` if the previous playback has not completed
    /// - `ConfigFailed` if the device was never configured
    /// - `NotFound` / `OpenFailed` / `Truncated` / `FormatMismatch` for the file
    pub fn play(&mut self, path: &Path, session_start: Instant) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy("audio playback in progress".to_string()));
        }
        let format = self
            .format
            .ok_or_else(|| Error::ConfigFailed("audio output is not configured".to_string()))?;

        let mut file = File::open(path).map_err(|e| Error::open_failed(path, e))?;
        let header = WavHeader::read_from(&mut file)?;
        header.log_fields(path);
        header.validate(&format)?;

        if let Some(previous) = self.worker.take() {
            debug!("Discarding finished {} worker", previous.name());
        }

        let reader = file.take(u64::from(header.data_size));
        let output = Arc::clone(&self.output);
        let initial_blocks = self.settings.initial_blocks;
        let path = path.to_path_buf();

        info!(
            "Streaming {} ({} bytes, {:?})",
            path.display(),
            header.data_size,
            format.duration_of(u64::from(header.data_size))
        );

        self.worker = Some(Worker::spawn_blocking("audio", move |token| {
            let result = run_stream(&output, reader, initial_blocks, &token, path.clone());
            match &result {
                Ok(report) => info!(
                    "Audio for {} ended ({:?}) after {} blocks, {}ms into session",
                    report.path.display(),
                    report.end,
                    report.blocks,
                    session_start.elapsed().as_millis()
                ),
                Err(e) => error!("Audio streaming of {} failed: {}", path.display(), e),
            }
            result
        }));
        Ok(())
    }

    /// Non-blocking liveness check
    pub fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_running())
    }

    /// Cancel the running playback and wait for it to exit.
    ///
    /// Returns `None` if no playback was started since the last join.
    pub async fn cancel(&mut self) -> Option<Result<StreamReport>> {
        let worker = self.worker.take()?;
        Some(worker.cancel_and_join().await.and_then(|r| r))
    }

    /// Wait for the current playback to finish on its own
    pub async fn wait(&mut self) -> Option<Result<StreamReport>> {
        let result = self.worker.as_mut()?.wait().await;
        self.worker = None;
        Some(result.and_then(|r| r))
    }
}

/// Worker body: both phases, then unconditional teardown
fn run_stream<R: Read>(
    output: &Mutex<Output>,
    reader: R,
    initial_blocks: usize,
    token: &CancellationToken,
    path: PathBuf,
) -> Result<StreamReport> {
    let mut guard = lock_output(output)?;
    let Output { sink, pool } = &mut *guard;
    let pool = pool
        .as_mut()
        .ok_or_else(|| Error::ConfigFailed("block pool not allocated".to_string()))?;

    let mut stream = BlockStream::new(sink.as_mut(), pool, reader);
    let outcome = stream
        .prefill(initial_blocks)
        .and_then(|_| stream.stream(token));

    let end = outcome.as_ref().ok().copied();
    let stopped = stream.finish(end);
    let report = StreamReport {
        path,
        blocks: stream.blocks(),
        bytes: stream.bytes(),
        end: end.unwrap_or(StreamEnd::Cancelled),
    };
    drop(stream);

    match (outcome, stopped) {
        (Ok(_), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), stopped) => {
            if let Err(stop_err) = stopped {
                warn!("Failed to stop audio output after error: {}", stop_err);
            }
            Err(e)
        }
    }
}

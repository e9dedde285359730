//! Audio output using cpal
//!
//! cpal streams are not `Send` on every host, so the stream lives on its own
//! thread and is driven through a small command channel. Samples travel
//! through a [`SampleRing`]; the callback duplicates each mono sample to every
//! device channel and converts it to the device sample format.

use crate::audio::ring::SampleRing;
use crate::audio::sink::{PcmSink, Trigger, WriteMode};
use crate::audio::types::PcmFormat;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval of a blocking write waiting for ring space
const WRITE_POLL: Duration = Duration::from_millis(2);

/// Fill interleaved device frames from the ring, `scratch.len()` frames at a
/// time, duplicating each mono sample across `channels`
fn fill_frames<T>(data: &mut [T], channels: usize, scratch: &mut [i16], ring: &SampleRing)
where
    T: Sample + FromSample<i16>,
{
    for chunk in data.chunks_mut(channels * scratch.len()) {
        let frames = chunk.len() / channels;
        ring.pop_into(&mut scratch[..frames]);

        for (frame, &sample) in chunk.chunks_mut(channels).zip(&scratch[..frames]) {
            let value = T::from_sample(sample);
            for out in frame.iter_mut() {
                *out = value;
            }
        }
    }
}

enum Command {
    Play(mpsc::Sender<Result<()>>),
    Pause(mpsc::Sender<Result<()>>),
    Shutdown,
}

/// Handle to the thread owning the cpal stream
struct StreamThread {
    commands: mpsc::Sender<Command>,
    handle: Option<JoinHandle<()>>,
    device_name: String,
}

impl StreamThread {
    fn request(&self, make: fn(mpsc::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| Error::AudioOutput("audio thread has exited".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::AudioOutput("audio thread dropped reply".to_string()))?
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

/// cpal backed [`PcmSink`]
pub struct CpalSink {
    requested_device: Option<String>,
    write_timeout: Duration,
    ring: Option<SampleRing>,
    thread: Option<StreamThread>,
    /// Reused little-endian decode buffer
    scratch: Vec<i16>,
}

impl CpalSink {
    /// Create a sink for the named device (None = default device).
    ///
    /// The device is opened by [`PcmSink::configure`].
    pub fn new(device_name: Option<String>, write_timeout: Duration) -> Self {
        Self {
            requested_device: device_name,
            write_timeout,
            ring: None,
            thread: None,
            scratch: Vec::new(),
        }
    }

    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    fn open_device(device_name: Option<&str>) -> Result<Device> {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let mut devices = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

            if let Some(dev) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                info!("Found requested audio device: {}", name);
                return Ok(dev);
            }
            warn!("Requested device '{}' not found, falling back to default device", name);
        }

        let dev = host
            .default_output_device()
            .ok_or_else(|| Error::ConfigFailed("No default output device found".to_string()))?;
        info!(
            "Using default audio device: {}",
            dev.name().unwrap_or_else(|_| "Unknown".to_string())
        );
        Ok(dev)
    }

    /// Find a device configuration running at exactly `sample_rate`.
    ///
    /// Prefers integer samples and the fewest channels.
    fn exact_config(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
        let rank = |format: SampleFormat| match format {
            SampleFormat::I16 => 0,
            SampleFormat::F32 => 1,
            SampleFormat::U16 => 2,
            _ => 3,
        };

        let best = device
            .supported_output_configs()
            .map_err(|e| Error::ConfigFailed(format!("Failed to get device configs: {}", e)))?
            .filter(|c| {
                c.min_sample_rate().0 <= sample_rate
                    && c.max_sample_rate().0 >= sample_rate
                    && rank(c.sample_format()) < 3
            })
            .min_by_key(|c| (rank(c.sample_format()), c.channels()))
            .ok_or_else(|| {
                Error::ConfigFailed(format!("device cannot play at exactly {} Hz", sample_rate))
            })?;

        let sample_format = best.sample_format();
        let config = best.with_sample_rate(cpal::SampleRate(sample_rate)).config();
        Ok((config, sample_format))
    }

    fn build_stream<T>(device: &Device, config: &StreamConfig, ring: SampleRing) -> Result<Stream>
    where
        T: SizedSample + FromSample<i16>,
    {
        let channels = usize::from(config.channels.max(1));
        // Sized once here; the callback never allocates
        let mut mono = vec![0i16; ring.capacity().max(1)];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    fill_frames(data, channels, &mut mono, &ring);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::ConfigFailed(format!("Failed to build stream: {}", e)))
    }

    /// Body of the stream thread: open, report readiness, then obey commands
    fn run_stream(
        device_name: Option<String>,
        sample_rate: u32,
        ring: SampleRing,
        ready: mpsc::Sender<Result<String>>,
        commands: mpsc::Receiver<Command>,
    ) {
        let opened = Self::open_device(device_name.as_deref()).and_then(|device| {
            let (config, sample_format) = Self::exact_config(&device, sample_rate)?;
            debug!(
                "Audio config: sample_rate={}, channels={}, format={:?}",
                config.sample_rate.0, config.channels, sample_format
            );
            let stream = match sample_format {
                SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, ring)?,
                SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, ring)?,
                SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, ring)?,
                other => {
                    return Err(Error::ConfigFailed(format!(
                        "Unsupported sample format: {:?}",
                        other
                    )))
                }
            };
            // Some hosts start streams on creation
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
            Ok((stream, name))
        });

        let stream = match opened {
            Ok((stream, name)) => {
                let _ = ready.send(Ok(name));
                stream
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        while let Ok(command) = commands.recv() {
            match command {
                Command::Play(reply) => {
                    let _ = reply.send(
                        stream
                            .play()
                            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e))),
                    );
                }
                Command::Pause(reply) => {
                    let _ = reply.send(
                        stream
                            .pause()
                            .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e))),
                    );
                }
                Command::Shutdown => break,
            }
        }
        debug!("Audio output thread exiting");
    }

    /// Poll until the callback has consumed every queued sample
    fn wait_until_played(&self) -> Result<()> {
        let ring = self.ring()?;
        let deadline = Instant::now() + self.write_timeout * 2;
        while !ring.is_empty()? {
            if Instant::now() >= deadline {
                warn!("Audio output did not drain in time, dropping remainder");
                ring.clear()?;
                break;
            }
            std::thread::sleep(WRITE_POLL);
        }
        Ok(())
    }

    fn ring(&self) -> Result<&SampleRing> {
        self.ring
            .as_ref()
            .ok_or_else(|| Error::ConfigFailed("audio output not configured".to_string()))
    }

    fn thread(&self) -> Result<&StreamThread> {
        self.thread
            .as_ref()
            .ok_or_else(|| Error::ConfigFailed("audio output not configured".to_string()))
    }
}

impl PcmSink for CpalSink {
    fn configure(
        &mut self,
        format: &PcmFormat,
        block_bytes: usize,
        queue_blocks: usize,
    ) -> Result<()> {
        if let Some(mut thread) = self.thread.take() {
            thread.shutdown();
        }

        let capacity = block_bytes / format.bytes_per_sample().max(1) * queue_blocks;
        let ring = SampleRing::new(capacity);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (command_tx, command_rx) = mpsc::channel();

        let device_name = self.requested_device.clone();
        let sample_rate = format.sample_rate;
        let thread_ring = ring.clone();
        let handle = std::thread::Builder::new()
            .name("bmbb-audio-out".to_string())
            .spawn(move || Self::run_stream(device_name, sample_rate, thread_ring, ready_tx, command_rx))
            .map_err(|e| Error::ConfigFailed(format!("Failed to spawn audio thread: {}", e)))?;

        let device_name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(Error::ConfigFailed("audio thread exited during setup".to_string()));
            }
        };

        info!(
            "Audio output ready on {}: {}, queue {} samples",
            device_name, format, capacity
        );
        self.scratch = Vec::with_capacity(block_bytes / 2);
        self.ring = Some(ring);
        self.thread = Some(StreamThread {
            commands: command_tx,
            handle: Some(handle),
            device_name,
        });
        Ok(())
    }

    fn write(&mut self, block: &[u8], mode: WriteMode) -> Result<()> {
        let ring = self.ring()?.clone();

        self.scratch.clear();
        self.scratch.extend(
            block
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
        );

        if mode == WriteMode::NonBlocking && ring.free_space()? < self.scratch.len() {
            return Err(Error::AudioOutput("device queue full".to_string()));
        }

        let deadline = Instant::now() + self.write_timeout;
        let mut remaining = &self.scratch[..];
        loop {
            let pushed = ring.push(remaining)?;
            remaining = &remaining[pushed..];
            if remaining.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::AudioOutput(format!(
                    "write timed out after {:?}",
                    self.write_timeout
                )));
            }
            std::thread::sleep(WRITE_POLL);
        }
    }

    fn trigger(&mut self, trigger: Trigger) -> Result<()> {
        match trigger {
            Trigger::Start => self.thread()?.request(Command::Play)?,
            Trigger::Drain => {
                self.wait_until_played()?;
                self.thread()?.request(Command::Pause)?;
            }
            Trigger::Drop => {
                self.thread()?.request(Command::Pause)?;
                self.ring()?.clear()?;
            }
        }
        debug!("Audio output trigger {:?}", trigger);
        Ok(())
    }

    fn name(&self) -> String {
        match &self.thread {
            Some(thread) => thread.device_name.clone(),
            None => self
                .requested_device
                .clone()
                .unwrap_or_else(|| "default".to_string()),
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if let Some(mut thread) = self.thread.take() {
            thread.shutdown();
        }
    }
}

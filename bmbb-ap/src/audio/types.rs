//! Core audio data types
//!
//! The player streams raw little-endian signed PCM. The only supported
//! profile is mono, 16 bits per sample, at one fixed rate chosen at start-up.

use std::time::Duration;

/// Blocks per second of audio (one block = ~100ms)
pub const BLOCKS_PER_SECOND: u32 = 10;

/// Required bits per sample
pub const SUPPORTED_BIT_DEPTH: u16 = 16;

/// Required channel count
pub const SUPPORTED_CHANNELS: u16 = 1;

/// PCM stream parameters the output device is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Frames per second
    pub sample_rate: u32,

    /// Bits per sample (always 16)
    pub bit_depth: u16,

    /// Interleaved channels (always 1)
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, bit_depth: u16, channels: u16) -> Self {
        Self {
            sample_rate,
            bit_depth,
            channels,
        }
    }

    /// Mono 16-bit at the given rate
    pub fn mono_16(sample_rate: u32) -> Self {
        Self::new(sample_rate, SUPPORTED_BIT_DEPTH, SUPPORTED_CHANNELS)
    }

    /// Bytes in one sample of one channel
    pub fn bytes_per_sample(&self) -> usize {
        usize::from(self.bit_depth / 8)
    }

    /// Bytes in one frame (all channels)
    pub fn frame_bytes(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.channels)
    }

    /// Samples (all channels) in one ~100ms block
    pub fn samples_per_block(&self) -> usize {
        (self.sample_rate / BLOCKS_PER_SECOND) as usize * usize::from(self.channels)
    }

    /// Size in bytes of one block
    pub fn block_bytes(&self) -> usize {
        self.samples_per_block() * self.bytes_per_sample()
    }

    /// Bytes consumed by the device per second
    pub fn bytes_per_second(&self) -> u64 {
        u64::from(self.sample_rate) * self.frame_bytes() as u64
    }

    /// Playback time of `bytes` of payload
    pub fn duration_of(&self, bytes: u64) -> Duration {
        let per_second = self.bytes_per_second().max(1);
        Duration::from_micros(bytes.saturating_mul(1_000_000) / per_second)
    }
}

impl std::fmt::Display for PcmFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {}-bit, {} channel(s)",
            self.sample_rate, self.bit_depth, self.channels
        )
    }
}

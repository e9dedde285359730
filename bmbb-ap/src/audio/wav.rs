//! Fixed-layout WAV header
//!
//! Songs are plain PCM WAV files with the canonical 44-byte header:
//!
//! ```text
//! [RIFF chunk]  "RIFF" | file size - 8 | "WAVE"
//! [fmt chunk]   "fmt " | 16 | format | channels | rate | bytes/sec | block align | bits
//! [data chunk]  "data" | payload size
//! ```
//!
//! followed by little-endian samples. The header is validated against the
//! configured [`PcmFormat`] before a single sample reaches the device.

use crate::audio::types::PcmFormat;
use crate::error::{Error, Result};
use bmbb_common::io::read_full;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 44;

/// `audio_format` value for integer PCM
pub const FORMAT_PCM: u16 = 1;

const RIFF: [u8; 4] = *b"RIFF";
const WAVE: [u8; 4] = *b"WAVE";
const FMT: [u8; 4] = *b"fmt ";
const DATA: [u8; 4] = *b"data";
const FMT_CHUNK_LEN: u32 = 16;

/// Decoded WAV header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub file_type_id: [u8; 4],
    pub file_size: u32,
    pub file_format_id: [u8; 4],
    pub format_chunk_id: [u8; 4],
    pub format_chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_chunk_id: [u8; 4],
    pub data_size: u32,
}

fn tag(bytes: &[u8; HEADER_LEN], at: usize) -> [u8; 4] {
    [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]
}

fn le_u16(bytes: &[u8; HEADER_LEN], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_u32(bytes: &[u8; HEADER_LEN], at: usize) -> u32 {
    u32::from_le_bytes(tag(bytes, at))
}

impl WavHeader {
    /// Build the header a well-formed file of `format` with `data_size`
    /// payload bytes would carry
    pub fn for_format(format: &PcmFormat, data_size: u32) -> Self {
        Self {
            file_type_id: RIFF,
            file_size: data_size.saturating_add(HEADER_LEN as u32 - 8),
            file_format_id: WAVE,
            format_chunk_id: FMT,
            format_chunk_size: FMT_CHUNK_LEN,
            audio_format: FORMAT_PCM,
            channels: format.channels,
            sample_rate: format.sample_rate,
            bytes_per_sec: format.bytes_per_second() as u32,
            block_align: format.frame_bytes() as u16,
            bits_per_sample: format.bit_depth,
            data_chunk_id: DATA,
            data_size,
        }
    }

    /// Decode the raw header layout. No validation.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            file_type_id: tag(bytes, 0),
            file_size: le_u32(bytes, 4),
            file_format_id: tag(bytes, 8),
            format_chunk_id: tag(bytes, 12),
            format_chunk_size: le_u32(bytes, 16),
            audio_format: le_u16(bytes, 20),
            channels: le_u16(bytes, 22),
            sample_rate: le_u32(bytes, 24),
            bytes_per_sec: le_u32(bytes, 28),
            block_align: le_u16(bytes, 32),
            bits_per_sample: le_u16(bytes, 34),
            data_chunk_id: tag(bytes, 36),
            data_size: le_u32(bytes, 40),
        }
    }

    /// Encode back to the on-disk layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.file_type_id);
        out[4..8].copy_from_slice(&self.file_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.file_format_id);
        out[12..16].copy_from_slice(&self.format_chunk_id);
        out[16..20].copy_from_slice(&self.format_chunk_size.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.bytes_per_sec.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(&self.data_chunk_id);
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Read the header from the start of a stream.
    ///
    /// # Errors
    /// - `Truncated` when fewer than 44 bytes are available
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_LEN];
        let len = read_full(reader, &mut bytes)?;
        if len < HEADER_LEN {
            return Err(Error::Truncated {
                expected: HEADER_LEN,
                actual: len,
            });
        }
        Ok(Self::from_bytes(&bytes))
    }

    /// Check the header describes exactly `format`.
    ///
    /// # Errors
    /// - `FormatMismatch` naming the first offending field
    pub fn validate(&self, format: &PcmFormat) -> Result<()> {
        if self.file_type_id != RIFF || self.file_format_id != WAVE {
            return Err(Error::FormatMismatch("not a RIFF/WAVE file".to_string()));
        }
        if self.format_chunk_id != FMT || self.format_chunk_size != FMT_CHUNK_LEN {
            return Err(Error::FormatMismatch(format!(
                "unexpected format chunk {:?} of {} bytes",
                String::from_utf8_lossy(&self.format_chunk_id),
                self.format_chunk_size
            )));
        }
        if self.data_chunk_id != DATA {
            return Err(Error::FormatMismatch(format!(
                "expected data chunk, found {:?}",
                String::from_utf8_lossy(&self.data_chunk_id)
            )));
        }
        if self.audio_format != FORMAT_PCM {
            return Err(Error::FormatMismatch(format!(
                "audio format {} is not integer PCM",
                self.audio_format
            )));
        }
        if self.channels != format.channels {
            return Err(Error::FormatMismatch(format!(
                "{} channels, expected {}",
                self.channels, format.channels
            )));
        }
        if self.sample_rate != format.sample_rate {
            return Err(Error::FormatMismatch(format!(
                "{} Hz, expected {} Hz",
                self.sample_rate, format.sample_rate
            )));
        }
        if self.bits_per_sample != format.bit_depth {
            return Err(Error::FormatMismatch(format!(
                "{} bits per sample, expected {}",
                self.bits_per_sample, format.bit_depth
            )));
        }
        Ok(())
    }

    /// Dump every field at debug level
    pub fn log_fields(&self, path: &Path) {
        debug!("Wav file data for {}:", path.display());
        debug!("\tfile_type_id={:?}", String::from_utf8_lossy(&self.file_type_id));
        debug!("\tfile_size={}", self.file_size);
        debug!("\tfile_format_id={:?}", String::from_utf8_lossy(&self.file_format_id));
        debug!("\tformat_chunk_id={:?}", String::from_utf8_lossy(&self.format_chunk_id));
        debug!("\tformat_chunk_size={}", self.format_chunk_size);
        debug!("\taudio_format={}", self.audio_format);
        debug!("\tchannels={}", self.channels);
        debug!("\tsample_rate={}", self.sample_rate);
        debug!("\tbytes_per_sec={}", self.bytes_per_sec);
        debug!("\tblock_align={}", self.block_align);
        debug!("\tbits_per_sample={}", self.bits_per_sample);
        debug!("\tdata_chunk_id={:?}", String::from_utf8_lossy(&self.data_chunk_id));
        debug!("\tdata_size={}", self.data_size);
    }
}

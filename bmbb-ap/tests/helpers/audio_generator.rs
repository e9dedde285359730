//! WAV fixture generation
//!
//! hound writes the canonical 44-byte header for 16-bit PCM, which is the
//! only layout the player accepts.

use hound::{WavSpec, WavWriter};
use std::path::Path;

/// Sample rate of the reference deployment
pub const TEST_SAMPLE_RATE: u32 = 44100;

fn generate_wav(
    path: &Path,
    channels: u16,
    sample_rate: u32,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (u64::from(sample_rate) * duration_ms) / 1000;

    // Sawtooth so blocks are distinguishable
    for frame in 0..total_frames {
        let sample = ((frame % 200) as i16 - 100) * 50;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Mono 16-bit WAV at `sample_rate`
pub fn generate_mono_wav(path: &Path, sample_rate: u32, duration_ms: u64) -> Result<(), hound::Error> {
    generate_wav(path, 1, sample_rate, duration_ms)
}

/// Stereo 16-bit WAV at the reference rate
pub fn generate_stereo_wav(path: &Path, duration_ms: u64) -> Result<(), hound::Error> {
    generate_wav(path, 2, TEST_SAMPLE_RATE, duration_ms)
}

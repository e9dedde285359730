//! Audio streaming pipeline: WAV header, block pool, sinks and the streamer

pub mod output;
pub mod pool;
pub mod ring;
pub mod sink;
pub mod streamer;
pub mod types;
pub mod wav;

pub use output::CpalSink;
pub use sink::{PacedSink, PcmSink, Trigger, WriteMode};
pub use streamer::{AudioStreamer, StreamEnd, StreamReport, StreamerSettings};
pub use types::PcmFormat;

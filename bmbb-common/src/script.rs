//! Movement instruction scripts
//!
//! Each song's `.DAT` file is a sequence of fixed-width 8-byte records:
//!
//! ```text
//! [kind:1][offset_ms:6 ASCII digits, zero padded][\n:1]
//! ```
//!
//! `M030500\n` opens the mouth 30.5 seconds into the song. There is no header,
//! trailer or checksum. Kinds are `H` (head), `M` (mouth), `T` (tail) and `R`
//! (release).
//!
//! # Termination
//!
//! Parsing stops at the first record that cannot be read in full, whose last
//! byte is not a line feed, whose kind is unknown, or whose timestamp is not
//! exactly six digits. Everything before that record is kept. Only a failure
//! to read the source at all is an error.
//!
//! # Calibration
//!
//! The audio output lags the moment samples are handed to the device, so every
//! parsed offset is shifted earlier by a fixed calibration amount. Offsets may
//! therefore be negative.

use crate::io::read_full;
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Size of one instruction record in bytes
pub const RECORD_LEN: usize = 8;

/// Number of timestamp digits in a record
pub const TIMESTAMP_DIGITS: usize = 6;

/// Calibration subtracted from every offset (measured output latency)
pub const DEFAULT_CALIBRATION_MS: i64 = 200;

/// Actuator movement requested by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Head,
    Mouth,
    Tail,
    Release,
}

impl Movement {
    /// Decode a record's kind tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'H' => Some(Movement::Head),
            b'M' => Some(Movement::Mouth),
            b'T' => Some(Movement::Tail),
            b'R' => Some(Movement::Release),
            _ => None,
        }
    }

    /// Tag byte used in the file format
    pub fn tag(self) -> u8 {
        match self {
            Movement::Head => b'H',
            Movement::Mouth => b'M',
            Movement::Tail => b'T',
            Movement::Release => b'R',
        }
    }
}

impl fmt::Display for Movement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Movement::Head => write!(f, "head"),
            Movement::Mouth => write!(f, "mouth"),
            Movement::Tail => write!(f, "tail"),
            Movement::Release => write!(f, "release"),
        }
    }
}

/// One timed actuator command.
///
/// `offset_ms` is relative to the song start, after calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub kind: Movement,
    pub offset_ms: i64,
}

impl Instruction {
    pub fn new(kind: Movement, offset_ms: i64) -> Self {
        Self { kind, offset_ms }
    }
}

/// Why a [`ScriptReader`] stopped producing instructions
#[derive(Debug)]
pub enum StopReason {
    /// Source ended exactly on a record boundary
    EndOfData,
    /// Fewer than 8 bytes were left
    ShortRecord(usize),
    /// Byte 7 of the record was not a line feed
    MissingLineFeed(u8),
    /// Kind tag outside `H`, `M`, `T`, `R`
    UnknownKind(u8),
    /// Timestamp field was not six ASCII digits
    BadTimestamp([u8; TIMESTAMP_DIGITS]),
    /// The source could not be read
    Io(std::io::Error),
}

impl StopReason {
    /// True when the stop was caused by malformed data rather than a clean end
    pub fn is_malformed(&self) -> bool {
        !matches!(self, StopReason::EndOfData | StopReason::Io(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfData => write!(f, "end of data"),
            StopReason::ShortRecord(len) => write!(f, "trailing fragment of {} bytes", len),
            StopReason::MissingLineFeed(byte) => {
                write!(f, "record terminator 0x{:02x} is not a line feed", byte)
            }
            StopReason::UnknownKind(tag) => write!(f, "unknown instruction kind 0x{:02x}", tag),
            StopReason::BadTimestamp(digits) => {
                write!(f, "malformed timestamp {:?}", String::from_utf8_lossy(digits))
            }
            StopReason::Io(e) => write!(f, "read error: {}", e),
        }
    }
}

/// Decode one complete record.
pub fn decode_record(
    record: &[u8; RECORD_LEN],
    calibration_ms: i64,
) -> std::result::Result<Instruction, StopReason> {
    if record[RECORD_LEN - 1] != b'\n' {
        return Err(StopReason::MissingLineFeed(record[RECORD_LEN - 1]));
    }

    let kind = Movement::from_tag(record[0]).ok_or(StopReason::UnknownKind(record[0]))?;

    let mut digits = [0u8; TIMESTAMP_DIGITS];
    digits.copy_from_slice(&record[1..1 + TIMESTAMP_DIGITS]);
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(StopReason::BadTimestamp(digits));
    }
    let millis = digits
        .iter()
        .fold(0i64, |acc, d| acc * 10 + i64::from(d - b'0'));

    Ok(Instruction::new(kind, millis - calibration_ms))
}

/// Lazy, single-pass reader over an instruction script.
///
/// Yields instructions in file order until the first short or malformed
/// record; [`ScriptReader::stop_reason`] then says why it stopped.
pub struct ScriptReader<R> {
    reader: R,
    calibration_ms: i64,
    records: usize,
    stop: Option<StopReason>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(reader: R, calibration_ms: i64) -> Self {
        Self {
            reader,
            calibration_ms,
            records: 0,
            stop: None,
        }
    }

    /// Reason parsing ended, once the iterator has returned `None`
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    /// Number of instructions produced so far
    pub fn records_read(&self) -> usize {
        self.records
    }

    fn next_record(&mut self) -> std::result::Result<Instruction, StopReason> {
        let mut record = [0u8; RECORD_LEN];
        let len = read_full(&mut self.reader, &mut record).map_err(StopReason::Io)?;
        match len {
            0 => Err(StopReason::EndOfData),
            RECORD_LEN => decode_record(&record, self.calibration_ms),
            partial => Err(StopReason::ShortRecord(partial)),
        }
    }
}

impl<R: Read> Iterator for ScriptReader<R> {
    type Item = Instruction;

    fn next(&mut self) -> Option<Instruction> {
        if self.stop.is_some() {
            return None;
        }
        match self.next_record() {
            Ok(instruction) => {
                self.records += 1;
                Some(instruction)
            }
            Err(reason) => {
                self.stop = Some(reason);
                None
            }
        }
    }
}

/// Parse a whole script eagerly.
///
/// Malformed or truncated trailing data ends the script early and is only
/// logged. A read failure fails the whole parse.
pub fn parse_script<R: Read>(reader: R, calibration_ms: i64) -> Result<Vec<Instruction>> {
    let mut script = ScriptReader::new(reader, calibration_ms);
    let instructions: Vec<Instruction> = script.by_ref().collect();

    match script.stop {
        Some(StopReason::Io(e)) => Err(Error::Io(e)),
        Some(ref reason) if reason.is_malformed() => {
            warn!(
                "Instruction script stopped after {} records: {}",
                instructions.len(),
                reason
            );
            Ok(instructions)
        }
        _ => Ok(instructions),
    }
}

/// Open and parse an instruction file
pub fn load_script(path: &Path, calibration_ms: i64) -> Result<Vec<Instruction>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;

    let instructions = parse_script(BufReader::new(file), calibration_ms)?;
    debug!(
        "Parsed {} instructions from {}",
        instructions.len(),
        path.display()
    );
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(kind: u8, millis: u32) -> Vec<u8> {
        let mut bytes = vec![kind];
        bytes.extend_from_slice(format!("{:06}", millis).as_bytes());
        bytes.push(b'\n');
        bytes
    }

    #[test]
    fn test_parses_all_kinds_in_file_order() {
        let mut data = Vec::new();
        data.extend(record(b'H', 1000));
        data.extend(record(b'M', 30500));
        data.extend(record(b'T', 2000));
        data.extend(record(b'R', 999999));

        let parsed = parse_script(Cursor::new(data), 0).unwrap();
        assert_eq!(
            parsed,
            vec![
                Instruction::new(Movement::Head, 1000),
                Instruction::new(Movement::Mouth, 30500),
                Instruction::new(Movement::Tail, 2000),
                Instruction::new(Movement::Release, 999999),
            ]
        );
    }

    #[test]
    fn test_calibration_is_subtracted() {
        let parsed = parse_script(Cursor::new(record(b'M', 1000)), DEFAULT_CALIBRATION_MS).unwrap();
        assert_eq!(parsed[0].offset_ms, 800);
    }

    #[test]
    fn test_calibration_can_go_negative() {
        let parsed = parse_script(Cursor::new(record(b'H', 50)), 200).unwrap();
        assert_eq!(parsed[0].offset_ms, -150);
    }

    #[test]
    fn test_empty_source_is_empty_script() {
        let parsed = parse_script(Cursor::new(Vec::new()), 200).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_trailing_fragment_is_discarded() {
        let mut data = Vec::new();
        for i in 0..10 {
            data.extend(record(b'M', i * 100));
        }
        data.extend_from_slice(b"M0012");

        let mut reader = ScriptReader::new(Cursor::new(data), 0);
        let parsed: Vec<_> = reader.by_ref().collect();
        assert_eq!(parsed.len(), 10);
        assert!(matches!(reader.stop_reason(), Some(StopReason::ShortRecord(5))));
    }

    #[test]
    fn test_missing_line_feed_stops_before_record() {
        let mut data = Vec::new();
        data.extend(record(b'H', 100));
        data.extend(record(b'M', 200));
        data.extend_from_slice(b"T000300\r\n");
        data.extend(record(b'R', 400));

        let mut reader = ScriptReader::new(Cursor::new(data), 0);
        let parsed: Vec<_> = reader.by_ref().collect();
        assert_eq!(parsed.len(), 2);
        assert!(matches!(
            reader.stop_reason(),
            Some(StopReason::MissingLineFeed(b'\r'))
        ));
    }

    #[test]
    fn test_unknown_kind_stops_parse() {
        let mut data = record(b'M', 100);
        data.extend(record(b'X', 200));
        data.extend(record(b'M', 300));

        let mut reader = ScriptReader::new(Cursor::new(data), 0);
        assert_eq!(reader.by_ref().count(), 1);
        assert!(matches!(reader.stop_reason(), Some(StopReason::UnknownKind(b'X'))));
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_non_digit_timestamp_stops_parse() {
        let mut data = record(b'M', 100);
        data.extend_from_slice(b"M12 456\n");

        let mut reader = ScriptReader::new(Cursor::new(data), 0);
        assert_eq!(reader.by_ref().count(), 1);
        assert!(matches!(reader.stop_reason(), Some(StopReason::BadTimestamp(_))));
    }

    #[test]
    fn test_seven_digit_timestamp_is_rejected() {
        // Wider timestamps shift the line feed out of byte 7
        let data = b"M0001000\n".to_vec();
        let parsed = parse_script(Cursor::new(data), 0).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_reader_does_not_restart_after_stop() {
        let mut data = record(b'H', 1);
        data.extend_from_slice(b"??");
        let mut reader = ScriptReader::new(Cursor::new(data), 0);
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 1);
    }

    #[test]
    fn test_clean_end_is_not_malformed() {
        let mut reader = ScriptReader::new(Cursor::new(record(b'R', 5)), 0);
        assert_eq!(reader.by_ref().count(), 1);
        let reason = reader.stop_reason().unwrap();
        assert!(matches!(reason, StopReason::EndOfData));
        assert!(!reason.is_malformed());
    }

    #[test]
    fn test_load_script_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("SONG.DAT");
        match load_script(&missing, 0) {
            Err(Error::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_load_script_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SONG.DAT");
        let mut data = record(b'M', 1000);
        data.extend(record(b'R', 1100));
        std::fs::write(&path, data).unwrap();

        let parsed = load_script(&path, 200).unwrap();
        assert_eq!(
            parsed,
            vec![
                Instruction::new(Movement::Mouth, 800),
                Instruction::new(Movement::Release, 900),
            ]
        );
    }

    #[test]
    fn test_movement_tags() {
        for kind in [Movement::Head, Movement::Mouth, Movement::Tail, Movement::Release] {
            assert_eq!(Movement::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(Movement::from_tag(b'h'), None);
    }
}

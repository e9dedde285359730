//! Instruction file fixtures

use std::path::Path;

/// Write `(tag, raw_ms)` records in the 8-byte on-disk layout, followed by
/// `trailer` verbatim
pub fn write_script(path: &Path, records: &[(char, u32)], trailer: &[u8]) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(records.len() * 8 + trailer.len());
    for (tag, ms) in records {
        bytes.extend_from_slice(format!("{}{:06}\n", tag, ms).as_bytes());
    }
    bytes.extend_from_slice(trailer);
    std::fs::write(path, bytes)
}

//! Song discovery on the storage root
//!
//! Layout accepted under the root folder:
//!
//! ```text
//! <root>/SONGS/track1.wav  <root>/SONGS/track1.dat
//! <root>/JOKES/joke1.WAV   <root>/JOKES/joke1.DAT
//! ```
//!
//! Sub-directory names are matched case-insensitively. Without either
//! sub-directory, the root itself holds the songs. Each WAV needs a
//! same-stem `.dat` instruction file or it is skipped.

use crate::error::{Error, Result};
use crate::playback::Mode;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One playable pair found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub mode: Mode,
    pub audio_path: PathBuf,
    pub instruction_path: PathBuf,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Immediate children of `dir`, in file-name order
fn children(dir: &Path) -> Vec<walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing entry: {}", e);
                None
            }
        })
        .collect()
}

/// Same-stem instruction file next to `audio`
fn instruction_file_for(audio: &Path) -> Option<PathBuf> {
    ["dat", "DAT"]
        .iter()
        .map(|ext| audio.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Pair every WAV in `dir` with its instruction file
fn scan_dir(dir: &Path, mode: Mode) -> Vec<Discovered> {
    let mut found = Vec::new();
    for entry in children(dir) {
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, "wav") {
            continue;
        }
        match instruction_file_for(path) {
            Some(instruction_path) => found.push(Discovered {
                mode,
                audio_path: path.to_path_buf(),
                instruction_path,
            }),
            None => warn!("No instruction file for {}, skipping", path.display()),
        }
    }
    debug!("{} {} in {}", found.len(), mode, dir.display());
    found
}

/// Find all (mode, audio, instructions) triples under `root`
pub fn discover(root: &Path) -> Result<Vec<Discovered>> {
    if !root.is_dir() {
        return Err(Error::NotFound(root.to_path_buf()));
    }

    let mut songs_dir = None;
    let mut jokes_dir = None;
    for entry in children(root) {
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.eq_ignore_ascii_case("songs") {
            songs_dir = Some(entry.path().to_path_buf());
        } else if name.eq_ignore_ascii_case("jokes") {
            jokes_dir = Some(entry.path().to_path_buf());
        }
    }

    let mut found = Vec::new();
    if songs_dir.is_none() && jokes_dir.is_none() {
        found.extend(scan_dir(root, Mode::Songs));
    } else {
        if let Some(dir) = songs_dir {
            found.extend(scan_dir(&dir, Mode::Songs));
        }
        if let Some(dir) = jokes_dir {
            found.extend(scan_dir(&dir, Mode::Jokes));
        }
    }

    info!("Discovered {} playable files under {}", found.len(), root.display());
    Ok(found)
}

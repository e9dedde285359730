//! Song catalog and selection cursor
//!
//! Two append-only lists (songs and jokes) in discovery order, plus a cursor
//! into the active one. The cursor is a plain index, bounds-checked on every
//! read.

use bmbb_common::Instruction;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A playable track with its motion script
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub audio_path: PathBuf,
    /// Shared with the motion worker for the length of a session
    pub instructions: Arc<[Instruction]>,
}

impl Song {
    pub fn new(audio_path: impl Into<PathBuf>, instructions: Vec<Instruction>) -> Self {
        Self {
            audio_path: audio_path.into(),
            instructions: Arc::from(instructions),
        }
    }
}

/// Catalog partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Songs,
    Jokes,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Songs => Mode::Jokes,
            Mode::Jokes => Mode::Songs,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Songs => f.write_str("songs"),
            Mode::Jokes => f.write_str("jokes"),
        }
    }
}

/// Ordered song lists with a selection cursor
#[derive(Debug)]
pub struct Catalog {
    songs: Vec<Song>,
    jokes: Vec<Song>,
    mode: Mode,
    cursor: Option<usize>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            songs: Vec::new(),
            jokes: Vec::new(),
            mode: Mode::Songs,
            cursor: None,
        }
    }

    fn list(&self, mode: Mode) -> &[Song] {
        match mode {
            Mode::Songs => &self.songs,
            Mode::Jokes => &self.jokes,
        }
    }

    /// Append to a mode's list
    pub fn push(&mut self, mode: Mode, song: Song) {
        debug!("Catalog {}: added {}", mode, song.audio_path.display());
        match mode {
            Mode::Songs => self.songs.push(song),
            Mode::Jokes => self.jokes.push(song),
        }
    }

    /// Songs of the active mode
    pub fn active(&self) -> &[Song] {
        self.list(self.mode)
    }

    pub fn songs(&self, mode: Mode) -> &[Song] {
        self.list(mode)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode and clear the cursor
    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.cursor = None;
        self.mode
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Selected song, if the cursor points into the active list
    pub fn current(&self) -> Option<&Song> {
        self.cursor.and_then(|index| self.active().get(index))
    }

    /// Advance the cursor with wrap-around; `None` on an empty list
    pub fn advance(&mut self) -> Option<&Song> {
        let len = self.active().len();
        if len == 0 {
            self.cursor = None;
            return None;
        }
        let next = match self.cursor {
            Some(index) if index + 1 < len => index + 1,
            _ => 0,
        };
        self.cursor = Some(next);
        self.active().get(next)
    }

    /// Audio path of the selected song
    pub fn current_path(&self) -> Option<&Path> {
        self.current().map(|song| song.audio_path.as_path())
    }

    pub fn len(&self) -> usize {
        self.songs.len() + self.jokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

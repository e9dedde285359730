//! Line-oriented command surface
//!
//! Each input line is one command; replies are plain text for the terminal.
//! `press` mimics the figure's push button: stop whatever plays, move to the
//! next song, play it.

use crate::error::{Error, Result};
use crate::playback::{PlaybackEngine, SessionReport};
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::warn;

/// Help text listing every command
pub const HELP: &str = "\
commands:
  next     select the next song
  play     play the selected song
  cancel   stop the current session
  current  show the current song
  press    cancel, next, play (push button)
  mode     toggle between songs and jokes
  list     list the songs of the active mode
  status   show mode, selection and playback state
  wait     wait for the current session to finish
  quit     stop playback and exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Play,
    Cancel,
    Current,
    Press,
    Mode,
    List,
    Status,
    Wait,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "next" | "n" => Ok(Command::Next),
            "play" | "p" => Ok(Command::Play),
            "cancel" | "stop" | "c" => Ok(Command::Cancel),
            "current" => Ok(Command::Current),
            "press" | "button" | "b" => Ok(Command::Press),
            "mode" | "m" => Ok(Command::Mode),
            "list" | "ls" => Ok(Command::List),
            "status" | "s" => Ok(Command::Status),
            "wait" | "w" => Ok(Command::Wait),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(Error::Config(format!("unknown command '{}'", other))),
        }
    }
}

fn describe(report: &SessionReport) -> String {
    let mut text = String::new();
    if let Some(audio) = &report.audio {
        let _ = write!(
            text,
            "audio: {} blocks, {} bytes, {:?}",
            audio.blocks, audio.bytes, audio.end
        );
    }
    if let Some(motion) = &report.motion {
        if !text.is_empty() {
            text.push_str("; ");
        }
        let _ = write!(
            text,
            "motion: {}/{} instructions, {:?}",
            motion.dispatched, motion.total, motion.end
        );
    }
    if text.is_empty() {
        text.push_str("nothing was playing");
    }
    text
}

fn or_none(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Run one command against the engine and return the reply text
pub async fn execute(engine: &mut PlaybackEngine, command: Command) -> Result<String> {
    match command {
        Command::Next => Ok(or_none(engine.next())),
        Command::Play => {
            let path = engine.start_playing().await?;
            Ok(format!("playing {}", path.display()))
        }
        Command::Cancel => Ok(describe(&engine.cancel_current().await?)),
        Command::Current => Ok(or_none(engine.current())),
        Command::Press => {
            // A failed previous session is logged, not returned
            if let Err(e) = engine.cancel_current().await {
                warn!("Previous session ended with an error: {}", e);
            }
            if engine.next().is_none() {
                return Ok(format!("no {} to play", engine.mode()));
            }
            let path = engine.start_playing().await?;
            Ok(format!("playing {}", path.display()))
        }
        Command::Mode => Ok(format!("mode: {}", engine.toggle_mode())),
        Command::List => {
            let catalog = engine.catalog();
            let mut text = format!("{} ({}):", catalog.mode(), catalog.active().len());
            for (index, song) in catalog.active().iter().enumerate() {
                let marker = if catalog.cursor() == Some(index) { '*' } else { ' ' };
                let _ = write!(
                    text,
                    "\n{} {:>3} {} ({} instructions)",
                    marker,
                    index + 1,
                    song.audio_path.display(),
                    song.instructions.len()
                );
            }
            Ok(text)
        }
        Command::Status => Ok(format!(
            "mode: {}, selected: {}, playing: {}, audio: {}",
            engine.mode(),
            or_none(engine.catalog().current_path()),
            engine.is_playing(),
            if engine.audio_ready() { "ready" } else { "unconfigured" }
        )),
        Command::Wait => Ok(describe(&engine.wait_idle().await?)),
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(describe(&engine.cancel_current().await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("next".parse::<Command>().unwrap(), Command::Next);
        assert_eq!("  PLAY \n".parse::<Command>().unwrap(), Command::Play);
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!("button".parse::<Command>().unwrap(), Command::Press);
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn test_describe_empty_report() {
        assert_eq!(describe(&SessionReport::default()), "nothing was playing");
    }
}

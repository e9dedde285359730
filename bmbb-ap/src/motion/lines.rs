//! Actuator output lines
//!
//! The figure has two motors, each driven by a pair of opposing lines:
//!
//! | Line     | Effect                 |
//! |----------|------------------------|
//! | `Mouth0` | mouth motor, closing   |
//! | `Mouth1` | mouth motor, opening   |
//! | `Body0`  | body motor, head out   |
//! | `Body1`  | body motor, tail flap  |
//!
//! Never drive both lines of a pair at once.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// One actuator line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    Mouth0,
    Mouth1,
    Body0,
    Body1,
}

impl Line {
    pub const ALL: [Line; 4] = [Line::Mouth0, Line::Mouth1, Line::Body0, Line::Body1];
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Line::Mouth0 => "mouth0",
            Line::Mouth1 => "mouth1",
            Line::Body0 => "body0",
            Line::Body1 => "body1",
        };
        f.write_str(name)
    }
}

/// "Set line active/inactive" primitive
pub trait ActuatorLines: Send {
    fn set(&mut self, line: Line, active: bool) -> Result<()>;
}

/// Drive every line inactive (rest state)
pub fn release_all(lines: &mut dyn ActuatorLines) -> Result<()> {
    for line in Line::ALL {
        lines.set(line, false)?;
    }
    Ok(())
}

/// Lines that only log their transitions
#[derive(Debug, Default)]
pub struct TraceLines {
    state: [bool; 4],
}

impl TraceLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, line: Line) -> bool {
        self.state[line as usize]
    }
}

impl ActuatorLines for TraceLines {
    fn set(&mut self, line: Line, active: bool) -> Result<()> {
        self.state[line as usize] = active;
        trace!("{} -> {}", line, if active { "on" } else { "off" });
        Ok(())
    }
}

/// GPIO pin numbers per line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PinMap {
    #[serde(default = "default_mouth0")]
    pub mouth0: u32,
    #[serde(default = "default_mouth1")]
    pub mouth1: u32,
    #[serde(default = "default_body0")]
    pub body0: u32,
    #[serde(default = "default_body1")]
    pub body1: u32,
}

fn default_mouth0() -> u32 {
    17
}

fn default_mouth1() -> u32 {
    27
}

fn default_body0() -> u32 {
    22
}

fn default_body1() -> u32 {
    23
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            mouth0: default_mouth0(),
            mouth1: default_mouth1(),
            body0: default_body0(),
            body1: default_body1(),
        }
    }
}

impl PinMap {
    pub fn pin(&self, line: Line) -> u32 {
        match line {
            Line::Mouth0 => self.mouth0,
            Line::Mouth1 => self.mouth1,
            Line::Body0 => self.body0,
            Line::Body1 => self.body1,
        }
    }
}

/// Lines backed by the sysfs GPIO interface (`<root>/gpio<N>/value`)
pub struct SysfsLines {
    values: [PathBuf; 4],
}

impl SysfsLines {
    /// Export each pin if needed and set it as an output.
    ///
    /// # Errors
    /// - `Actuator` if a sysfs file cannot be written
    pub fn open(gpio_root: &Path, pins: &PinMap) -> Result<Self> {
        for line in Line::ALL {
            let pin = pins.pin(line);
            let dir = gpio_root.join(format!("gpio{}", pin));
            if !dir.exists() {
                write_attr(&gpio_root.join("export"), &pin.to_string())?;
            }
            write_attr(&dir.join("direction"), "out")?;
            debug!("GPIO {} ready for {}", pin, line);
        }
        info!("Actuator lines on {}", gpio_root.display());

        let value = |line: Line| gpio_root.join(format!("gpio{}", pins.pin(line))).join("value");
        Ok(Self {
            values: Line::ALL.map(value),
        })
    }
}

fn write_attr(path: &Path, value: &str) -> Result<()> {
    fs::write(path, value)
        .map_err(|e| Error::Actuator(format!("failed to write {}: {}", path.display(), e)))
}

impl ActuatorLines for SysfsLines {
    fn set(&mut self, line: Line, active: bool) -> Result<()> {
        trace!("{} -> {}", line, if active { "on" } else { "off" });
        write_attr(&self.values[line as usize], if active { "1" } else { "0" })
    }
}

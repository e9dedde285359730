//! Actuator lines and the instruction scheduler

pub mod lines;
pub mod scheduler;

pub use lines::{ActuatorLines, Line, PinMap, SysfsLines, TraceLines};
pub use scheduler::{MotionEnd, MotionReport, MotionScheduler, MotionSettings};

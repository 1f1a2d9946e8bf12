//! Motion primitives.
//!
//! Open-loop helpers that turn a high-level request into one protocol
//! command, optionally sleeping for the expected duration. Nothing here reads
//! feedback; callers that need closed-loop behaviour combine these with pose
//! or frame readers and [`crate::control::Pid`].
//!
//! Primitives are written against [`CommandSink`](crate::client::CommandSink),
//! so they run the same on a live session or a recording sink in tests. There
//! is no locking between primitives: callers sequence their own motion.

mod actuators;
mod chassis;
mod timing;

pub use actuators::{Actuators, LightColour};
pub use chassis::Chassis;
pub use timing::{calculate_move_time, calculate_turn_time};

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SetuError};

/// How a positive protocol `z` angle turns the robot.
///
/// The controller's convention is fixed per platform and has to be configured;
/// [`Chassis::turn`] refuses to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YawSign {
    ClockwisePositive,
    CounterClockwisePositive,
}

impl YawSign {
    /// Protocol angle for a turn of `degrees` in `rotation`.
    pub fn protocol_angle(self, rotation: Rotation, degrees: f64) -> f64 {
        match (self, rotation) {
            (YawSign::ClockwisePositive, Rotation::Clockwise)
            | (YawSign::CounterClockwisePositive, Rotation::CounterClockwise) => degrees,
            _ => -degrees,
        }
    }
}

/// Turn direction as seen from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

fn require_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SetuError::InvalidParameter(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}

/// Resolve an optional speed request against an axis limit.
fn resolve_speed(requested: Option<f64>, limit: f64) -> Result<f64> {
    if !(limit.is_finite() && limit > 0.0) {
        return Err(SetuError::InvalidParameter(format!(
            "speed limit must be positive, got {}",
            limit
        )));
    }
    match requested {
        None => Ok(limit),
        Some(speed) => {
            let speed = require_finite("speed", speed)?;
            if speed <= 0.0 {
                return Err(SetuError::InvalidParameter(format!(
                    "speed must be positive, got {}",
                    speed
                )));
            }
            Ok(speed.min(limit))
        }
    }
}

/// Travel time plus settle buffer, or an error when it does not fit a
/// `Duration`.
fn expected_duration(seconds: f64, settle: Duration) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .and_then(|travel| travel.checked_add(settle))
        .ok_or_else(|| SetuError::InvalidParameter(format!("motion would take {} s", seconds)))
}

//! Arm, gripper, LED and camera templates.
//!
//! Each primitive sends a fixed command and then sleeps for the actuator
//! settle time. There is no completion feedback from the controller.

use std::thread;
use std::time::Duration;

use crate::client::CommandSink;
use crate::config::MotionConfig;
use crate::error::{Result, SetuError};
use crate::protocol::{Command, commands};

use super::require_finite;

/// Arm pose that folds the arm back to its origin
const ARM_ORIGIN: (f64, f64) = (-500.0, -500.0);
/// Arm offset that points the camera straight ahead
const ARM_CAMERA_FORWARD: (f64, f64) = (10.0, 20.0);
/// Arm offset that tilts the camera at the floor in front of the gripper
const ARM_CAMERA_GROUND: (f64, f64) = (210.0, 64.0);

/// Solid colours for [`Actuators::flash_light`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightColour {
    Red,
    Green,
    Blue,
    White,
    Rgb(u8, u8, u8),
}

impl LightColour {
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            LightColour::Red => (255, 0, 0),
            LightColour::Green => (0, 255, 0),
            LightColour::Blue => (0, 0, 255),
            LightColour::White => (255, 255, 255),
            LightColour::Rgb(r, g, b) => (r, g, b),
        }
    }
}

/// Arm, gripper, LED and camera control through a command sink.
pub struct Actuators<'a> {
    sink: &'a dyn CommandSink,
    settle: Duration,
}

impl<'a> Actuators<'a> {
    pub fn new(sink: &'a dyn CommandSink, config: &MotionConfig) -> Self {
        Self {
            sink,
            settle: Duration::from_millis(config.actuator_settle_ms),
        }
    }

    fn send_and_settle(&self, command: Command) -> Result<()> {
        self.sink.send(&command)?;
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        Ok(())
    }

    fn arm_move(&self, (x, y): (f64, f64)) -> Result<()> {
        self.send_and_settle(
            Command::new("robotic_arm")
                .arg("move")
                .arg("x")
                .num(x)
                .arg("y")
                .num(y),
        )
    }

    /// Fold the arm back to its origin.
    pub fn reset_arm(&self) -> Result<()> {
        self.arm_move(ARM_ORIGIN)
    }

    pub fn arm_camera_forward(&self) -> Result<()> {
        self.arm_move(ARM_CAMERA_FORWARD)
    }

    pub fn arm_camera_ground(&self) -> Result<()> {
        self.arm_move(ARM_CAMERA_GROUND)
    }

    /// Move the arm end to an absolute position (millimetres).
    pub fn arm_move_to(&self, x: f64, y: f64) -> Result<()> {
        let x = require_finite("x", x)?;
        let y = require_finite("y", y)?;
        self.send_and_settle(
            Command::new("robotic_arm")
                .arg("moveto")
                .arg("x")
                .num(x)
                .arg("y")
                .num(y),
        )
    }

    pub fn arm_recenter(&self) -> Result<()> {
        self.send_and_settle(Command::new("robotic_arm").arg("recenter"))
    }

    pub fn arm_stop(&self) -> Result<()> {
        self.sink.send(&Command::new("robotic_arm").arg("stop"))
    }

    pub fn open_gripper(&self) -> Result<()> {
        self.send_and_settle(gripper("open"))
    }

    pub fn close_gripper(&self) -> Result<()> {
        self.send_and_settle(gripper("close"))
    }

    /// Show `colour` for one settle period, then return to white.
    pub fn flash_light(&self, colour: LightColour) -> Result<()> {
        let (r, g, b) = colour.rgb();
        self.send_and_settle(commands::led_solid(r, g, b))?;
        self.sink.send(&commands::led_reset())
    }

    /// Set the camera exposure level, e.g. `high`.
    pub fn camera_exposure(&self, level: &str) -> Result<()> {
        let level = level.trim();
        if level.is_empty() || level.contains(char::is_whitespace) || level.contains(';') {
            return Err(SetuError::InvalidParameter(format!(
                "invalid exposure level {:?}",
                level
            )));
        }
        self.sink
            .send(&Command::new("camera").arg("exposure").arg(level))
    }
}

fn gripper(action: &str) -> Command {
    Command::new("robotic_gripper").arg(action).arg(1)
}

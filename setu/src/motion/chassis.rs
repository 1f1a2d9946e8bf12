//! Chassis translation, rotation and velocity commands.
//!
//! Callers describe motion in the camera frame: `x` is lateral (image right)
//! and `y` is forward. The chassis frame has `x` forward and `y` lateral, so
//! the two axes swap on the wire.

use std::thread;
use std::time::Duration;

use crate::client::CommandSink;
use crate::config::MotionConfig;
use crate::error::{Result, SetuError};
use crate::protocol::Command;

use super::{
    Rotation, calculate_move_time, calculate_turn_time, expected_duration, require_finite,
    resolve_speed,
};

/// Velocity percentages are clamped to this magnitude
const MAX_PERCENT: f64 = 100.0;

/// Chassis motion driven through a command sink.
pub struct Chassis<'a> {
    sink: &'a dyn CommandSink,
    config: &'a MotionConfig,
}

impl<'a> Chassis<'a> {
    pub fn new(sink: &'a dyn CommandSink, config: &'a MotionConfig) -> Self {
        Self { sink, config }
    }

    fn settle_buffer(&self) -> Duration {
        Duration::from_millis(self.config.settle_buffer_ms)
    }

    /// Translate by `x` metres lateral and `y` metres forward.
    ///
    /// `speed` defaults to and is clamped at the linear limit. Returns the
    /// expected duration (travel time plus settle buffer); with `wait` the
    /// call sleeps for it.
    pub fn move_by(&self, x: f64, y: f64, wait: bool, speed: Option<f64>) -> Result<Duration> {
        let x = require_finite("x", x)?;
        let y = require_finite("y", y)?;
        let speed = resolve_speed(speed, self.config.linear_speed_limit)?;

        let command = Command::new("chassis")
            .arg("move")
            .arg("x")
            .num(y)
            .arg("y")
            .num(x)
            .arg("vxy")
            .num(speed);
        let expected = expected_duration(calculate_move_time(x, y, speed), self.settle_buffer())?;
        self.sink.send(&command)?;

        if wait {
            thread::sleep(expected);
        }
        Ok(expected)
    }

    /// Turn `degrees` in `rotation` using the configured yaw sign.
    ///
    /// Fails with a configuration error when no yaw sign is set.
    pub fn turn(
        &self,
        rotation: Rotation,
        degrees: f64,
        wait: bool,
        speed: Option<f64>,
    ) -> Result<Duration> {
        let sign = self.config.yaw_sign.ok_or_else(|| {
            SetuError::Config("motion.yaw_sign must be set to turn by direction".into())
        })?;
        let degrees = require_finite("degrees", degrees)?;
        self.turn_raw(sign.protocol_angle(rotation, degrees), wait, speed)
    }

    /// Send a protocol yaw angle as-is. No wraparound: 370 stays 370.
    pub fn turn_raw(&self, angle: f64, wait: bool, speed: Option<f64>) -> Result<Duration> {
        let angle = require_finite("angle", angle)?;
        let speed = resolve_speed(speed, self.config.turn_speed_limit)?;

        let command = Command::new("chassis")
            .arg("move")
            .arg("z")
            .num(angle)
            .arg("vz")
            .num(speed);
        let expected = expected_duration(calculate_turn_time(angle, speed), self.settle_buffer())?;
        self.sink.send(&command)?;

        if wait {
            thread::sleep(expected);
        }
        Ok(expected)
    }

    /// Continuous velocity as percentages of the axis limits: `x` lateral,
    /// `y` forward, `z` yaw. Each is clamped to [-100, 100].
    pub fn set_velocity(&self, x: f64, y: f64, z: f64) -> Result<()> {
        let x = require_finite("x", x)?.clamp(-MAX_PERCENT, MAX_PERCENT);
        let y = require_finite("y", y)?.clamp(-MAX_PERCENT, MAX_PERCENT);
        let z = require_finite("z", z)?.clamp(-MAX_PERCENT, MAX_PERCENT);

        let linear = self.config.linear_speed_limit;
        let turn = self.config.turn_speed_limit;

        let command = Command::new("chassis")
            .arg("speed")
            .arg("x")
            .num(y * linear / MAX_PERCENT)
            .arg("y")
            .num(x * linear / MAX_PERCENT)
            .arg("z")
            .num(z * turn / MAX_PERCENT);
        self.sink.send(&command)
    }

    /// Zero velocity on every axis.
    pub fn brake(&self) -> Result<()> {
        self.set_velocity(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::YawSign;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl CommandSink for RecordingSink {
        fn send(&self, command: &Command) -> Result<()> {
            self.0.lock().push(command.to_string());
            Ok(())
        }
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    #[test]
    fn test_move_swaps_axes_and_clamps_speed() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        let expected = chassis.move_by(0.3, 0.4, false, Some(2.0)).unwrap();
        assert_eq!(sink.sent(), vec!["chassis move x 0.4 y 0.3 vxy 0.3;"]);

        // 0.5 m at 0.3 m/s plus 0.5 s settle
        let secs = expected.as_secs_f64();
        assert!((secs - (0.5 / 0.3 + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_move_rejects_non_finite() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        assert!(matches!(
            chassis.move_by(f64::NAN, 0.0, false, None),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(matches!(
            chassis.move_by(0.0, 1.0, false, Some(-0.1)),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_unrepresentable_duration_is_rejected_before_sending() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        assert!(matches!(
            chassis.move_by(1e300, 0.0, false, None),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(matches!(
            chassis.move_by(1e300, 1e300, false, None),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(matches!(
            chassis.turn_raw(1e21, false, None),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_zero_speed_limit_is_rejected() {
        let sink = RecordingSink::default();
        let config = MotionConfig {
            linear_speed_limit: 0.0,
            ..MotionConfig::default()
        };
        let chassis = Chassis::new(&sink, &config);

        assert!(matches!(
            chassis.move_by(0.0, 1.0, false, None),
            Err(SetuError::InvalidParameter(_))
        ));
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_turn_requires_yaw_sign() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        let result = chassis.turn(Rotation::Clockwise, 90.0, false, None);
        assert!(matches!(result, Err(SetuError::Config(_))));
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_turn_with_yaw_sign() {
        let sink = RecordingSink::default();
        let config = MotionConfig {
            yaw_sign: Some(YawSign::CounterClockwisePositive),
            ..MotionConfig::default()
        };
        let chassis = Chassis::new(&sink, &config);

        let expected = chassis.turn(Rotation::Clockwise, 20.0, false, None).unwrap();
        assert_eq!(sink.sent(), vec!["chassis move z -20 vz 10;"]);
        assert_eq!(expected, Duration::from_millis(2500));
    }

    #[test]
    fn test_turn_raw_has_no_wraparound() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        chassis.turn_raw(370.0, false, Some(45.0)).unwrap();
        assert_eq!(sink.sent(), vec!["chassis move z 370 vz 10;"]);
    }

    #[test]
    fn test_velocity_is_clamped() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        chassis.set_velocity(150.0, -200.0, 0.0).unwrap();
        chassis.set_velocity(100.0, -100.0, 0.0).unwrap();
        let sent = sink.sent();
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[0], "chassis speed x -0.3 y 0.3 z 0;");
    }

    #[test]
    fn test_brake() {
        let sink = RecordingSink::default();
        let config = MotionConfig::default();
        let chassis = Chassis::new(&sink, &config);

        chassis.brake().unwrap();
        assert_eq!(sink.sent(), vec!["chassis speed x 0 y 0 z 0;"]);
    }
}

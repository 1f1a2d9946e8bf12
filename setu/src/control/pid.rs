//! Discrete PID controller.
//!
//! ```text
//! e        = setpoint - measurement
//! integral = integral + e * dt
//! output   = kp * e + ki * integral + kd * (e - previous_error) / dt
//! ```
//!
//! No anti-windup and no output clamping; callers bound the output for their
//! actuator. The previous error starts at zero, so the first update after
//! construction or [`Pid::reset`] includes a derivative kick of `kd * e / dt`.

use serde::Deserialize;

use crate::error::{Result, SetuError};

/// Controller gains
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// PID controller state.
#[derive(Debug, Clone)]
pub struct Pid {
    setpoint: f64,
    gains: PidGains,
    integral: f64,
    previous_error: f64,
}

impl Pid {
    pub fn new(setpoint: f64, gains: PidGains) -> Self {
        Self {
            setpoint,
            gains,
            integral: 0.0,
            previous_error: 0.0,
        }
    }

    /// Advance the controller by `dt` seconds and return its output.
    ///
    /// `dt` must be finite and positive; otherwise the state is left
    /// untouched and `InvalidParameter` is returned.
    pub fn update(&mut self, measurement: f64, dt: f64) -> Result<f64> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SetuError::InvalidParameter(format!(
                "dt must be finite and positive, got {}",
                dt
            )));
        }
        if !measurement.is_finite() {
            return Err(SetuError::InvalidParameter(format!(
                "measurement must be finite, got {}",
                measurement
            )));
        }

        let error = self.setpoint - measurement;
        self.integral += error * dt;
        let derivative = (error - self.previous_error) / dt;
        self.previous_error = error;

        Ok(self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative)
    }

    /// Clear the integral and previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    /// Change the target. Accumulated state is kept.
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn previous_error(&self) -> f64 {
        self.previous_error
    }
}

//! Lateral centering on a detected target.
//!
//! Keeps a target horizontally centred in the camera image by driving the
//! chassis sideways. The error is the target centre's horizontal offset from
//! the image centre, normalised to [-1, 1] by the half width; the PID output
//! is read directly as a lateral velocity percentage.

use crate::error::{Result, SetuError};
use crate::vision::BoundingBox;

use super::pid::{Pid, PidGains};

/// Centering loop state.
#[derive(Debug, Clone)]
pub struct LateralCentering {
    pid: Pid,
    dead_band_px: f64,
    max_percent: f64,
}

impl LateralCentering {
    /// `dead_band_px`: offsets within this many pixels count as centred.
    /// `max_percent`: output clamp, at most 100.
    pub fn new(gains: PidGains, dead_band_px: f64, max_percent: f64) -> Result<Self> {
        if !dead_band_px.is_finite() || dead_band_px < 0.0 {
            return Err(SetuError::InvalidParameter(format!(
                "dead band must be non-negative, got {}",
                dead_band_px
            )));
        }
        if !max_percent.is_finite() || max_percent <= 0.0 {
            return Err(SetuError::InvalidParameter(format!(
                "output clamp must be positive, got {}",
                max_percent
            )));
        }
        Ok(Self {
            pid: Pid::new(0.0, gains),
            dead_band_px,
            max_percent: max_percent.min(100.0),
        })
    }

    /// Lateral velocity percentage for `target` seen in a frame `frame_width`
    /// pixels wide. Positive means move right.
    ///
    /// Inside the dead band the output is 0 and the PID state is cleared so a
    /// stale integral does not push the robot off target again.
    pub fn update(&mut self, target: &BoundingBox, frame_width: u32, dt: f64) -> Result<f64> {
        if frame_width == 0 {
            return Err(SetuError::InvalidParameter("frame width is zero".into()));
        }
        let half_width = f64::from(frame_width) / 2.0;
        let (center_x, _) = target.center();
        let offset_px = center_x - half_width;

        if offset_px.abs() <= self.dead_band_px {
            self.pid.reset();
            return Ok(0.0);
        }

        // Setpoint is 0, so the PID error is -offset; negate to steer toward it
        let output = -self.pid.update(offset_px / half_width, dt)?;
        Ok(output.clamp(-self.max_percent, self.max_percent))
    }

    pub fn reset(&mut self) {
        self.pid.reset();
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }
}

//! Closed-loop control.
//!
//! - [`Pid`]: discrete PID regulator
//! - [`LateralCentering`]: PID on a target's horizontal pixel offset

mod centering;
mod pid;

pub use centering::LateralCentering;
pub use pid::{Pid, PidGains};

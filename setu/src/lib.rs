//! Setu - command, telemetry and video link for a text-protocol robot
//!
//! A [`Session`] holds one control connection to the robot controller and
//! runs three worker threads next to it:
//!
//! - Control reader: acknowledgements on the TCP control stream
//! - Telemetry: chassis position/attitude pushes over UDP, kept as a [`Pose`]
//! - Video: H.264 decoded by `ffmpeg` into the latest [`Frame`]
//!
//! Motion primitives ([`motion`]) and the PID controller ([`control`]) turn
//! pose and detections into commands sent through the session.

pub mod client;
pub mod config;
pub mod control;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod motion;
pub mod protocol;
pub mod session;
pub mod shared;
pub mod teleop;
pub mod threads;
pub mod video;
pub mod vision;

// Re-export commonly used types
pub use client::CommandSink;
pub use config::SetuConfig;
pub use endpoint::{Endpoint, Ports};
pub use error::{Result, SetuError, SetuError as Error};
pub use protocol::{Command, TelemetryRecord};
pub use session::{Session, SessionState};
pub use shared::Pose;
pub use video::Frame;

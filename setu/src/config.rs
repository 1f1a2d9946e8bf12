//! Configuration loading for Setu

use crate::endpoint::{self, Endpoint, Ports};
use crate::error::{Result, SetuError};
use crate::motion::YawSign;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SetuConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Network connection settings
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Controller IP address. When absent the address is learned from the
    /// discovery broadcast.
    #[serde(default)]
    pub robot_ip: Option<String>,

    #[serde(default = "default_control_port")]
    pub control_port: u16,

    #[serde(default = "default_push_port")]
    pub push_port: u16,

    #[serde(default = "default_video_port")]
    pub video_port: u16,

    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// Discovery timeout in milliseconds (absent: wait forever)
    #[serde(default)]
    pub discovery_timeout_ms: Option<u64>,

    /// TCP connect timeout in milliseconds (default: 5000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Time allowed for the `command` handshake acknowledgement (default: 3000)
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

/// Telemetry subscription settings
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Position push rate in Hz (default: 20)
    #[serde(default = "default_push_freq")]
    pub position_freq: u32,

    /// Attitude push rate in Hz (default: 20)
    #[serde(default = "default_push_freq")]
    pub attitude_freq: u32,
}

/// Video stream settings
#[derive(Clone, Debug, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Decoder executable
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// Decoded frame width in pixels (default: 1280)
    #[serde(default = "default_width")]
    pub width: u32,

    /// Decoded frame height in pixels (default: 720)
    #[serde(default = "default_height")]
    pub height: u32,

    /// Delay between `stream on` and opening the decoder (default: 500)
    #[serde(default = "default_startup_delay")]
    pub startup_delay_ms: u64,
}

/// Motion primitive limits
#[derive(Clone, Debug, Deserialize)]
pub struct MotionConfig {
    /// Maximum linear speed in m/s (default: 0.3)
    #[serde(default = "default_linear_limit")]
    pub linear_speed_limit: f64,

    /// Maximum turn speed in deg/s (default: 10)
    #[serde(default = "default_turn_limit")]
    pub turn_speed_limit: f64,

    /// Settling time added to every waited move or turn (default: 500)
    #[serde(default = "default_settle_buffer")]
    pub settle_buffer_ms: u64,

    /// Sleep after arm, gripper and LED templates (default: 1000)
    #[serde(default = "default_actuator_settle")]
    pub actuator_settle_ms: u64,

    /// Which sign the controller uses for clockwise rotation. Not defaulted:
    /// `turn` refuses to run until this is set.
    #[serde(default)]
    pub yaw_sign: Option<YawSign>,
}

/// Session lifecycle settings
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Upper bound on waiting for workers during close (default: 2000)
    #[serde(default = "default_join_timeout")]
    pub join_timeout_ms: u64,

    /// Socket poll interval used by the workers to notice shutdown (default: 100)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Acknowledgements buffered for `send_and_wait` (default: 32)
    #[serde(default = "default_ack_queue_depth")]
    pub ack_queue_depth: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            robot_ip: None,
            control_port: default_control_port(),
            push_port: default_push_port(),
            video_port: default_video_port(),
            discovery_port: default_discovery_port(),
            discovery_timeout_ms: None,
            connect_timeout_ms: default_connect_timeout(),
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            position_freq: default_push_freq(),
            attitude_freq: default_push_freq(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg_path: default_ffmpeg(),
            width: default_width(),
            height: default_height(),
            startup_delay_ms: default_startup_delay(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            linear_speed_limit: default_linear_limit(),
            turn_speed_limit: default_turn_limit(),
            settle_buffer_ms: default_settle_buffer(),
            actuator_settle_ms: default_actuator_settle(),
            yaw_sign: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: default_join_timeout(),
            poll_interval_ms: default_poll_interval(),
            ack_queue_depth: default_ack_queue_depth(),
        }
    }
}

// Default value functions
fn default_control_port() -> u16 {
    endpoint::CONTROL_PORT
}
fn default_push_port() -> u16 {
    endpoint::PUSH_PORT
}
fn default_video_port() -> u16 {
    endpoint::VIDEO_PORT
}
fn default_discovery_port() -> u16 {
    endpoint::DISCOVERY_PORT
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_handshake_timeout() -> u64 {
    3000
}
fn default_push_freq() -> u32 {
    20
}
fn default_true() -> bool {
    true
}
fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_startup_delay() -> u64 {
    500
}
fn default_linear_limit() -> f64 {
    0.3
}
fn default_turn_limit() -> f64 {
    10.0
}
fn default_settle_buffer() -> u64 {
    500
}
fn default_actuator_settle() -> u64 {
    1000
}
fn default_join_timeout() -> u64 {
    2000
}
fn default_poll_interval() -> u64 {
    100
}
fn default_ack_queue_depth() -> usize {
    32
}

impl SetuConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SetuError::Config(format!("Failed to read config file: {}", e)))?;
        let config: SetuConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the link cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.motion.linear_speed_limit > 0.0) || !(self.motion.turn_speed_limit > 0.0) {
            return Err(SetuError::Config(
                "motion speed limits must be positive".into(),
            ));
        }
        if self.session.poll_interval_ms == 0 {
            return Err(SetuError::Config("poll_interval_ms must be non-zero".into()));
        }
        if self.session.join_timeout_ms == 0 {
            return Err(SetuError::Config("join_timeout_ms must be non-zero".into()));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(SetuError::Config("connect_timeout_ms must be non-zero".into()));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(SetuError::Config("video frame size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn ports(&self) -> Ports {
        Ports {
            control: self.connection.control_port,
            push: self.connection.push_port,
            video: self.connection.video_port,
            discovery: self.connection.discovery_port,
        }
    }

    /// Endpoint from the configured robot IP, if one is set.
    pub fn endpoint(&self) -> Result<Option<Endpoint>> {
        match &self.connection.robot_ip {
            Some(ip) => {
                let ip: IpAddr = ip
                    .parse()
                    .map_err(|e| SetuError::Config(format!("Invalid robot_ip {}: {}", ip, e)))?;
                Ok(Some(Endpoint::new(ip, self.ports())))
            }
            None => Ok(None),
        }
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.connection.discovery_timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.handshake_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.session.join_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.session.poll_interval_ms)
    }
}

//! Controller address and its well-known port set.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Video stream port (H.264 over TCP)
pub const VIDEO_PORT: u16 = 40921;
/// Audio stream port (reserved, unused)
pub const AUDIO_PORT: u16 = 40922;
/// Text command port (TCP, bidirectional)
pub const CONTROL_PORT: u16 = 40923;
/// Telemetry push port (UDP, controller -> client)
pub const PUSH_PORT: u16 = 40924;
/// Event port (reserved, unused)
pub const EVENT_PORT: u16 = 40925;
/// Address announcement broadcast port (UDP)
pub const DISCOVERY_PORT: u16 = 40926;

/// Port numbers used by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ports {
    pub control: u16,
    pub push: u16,
    pub video: u16,
    pub discovery: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Self {
            control: CONTROL_PORT,
            push: PUSH_PORT,
            video: VIDEO_PORT,
            discovery: DISCOVERY_PORT,
        }
    }
}

/// Resolved controller endpoint. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    ip: IpAddr,
    ports: Ports,
}

impl Endpoint {
    pub fn new(ip: IpAddr, ports: Ports) -> Self {
        Self { ip, ports }
    }

    /// Endpoint on the well-known ports.
    pub fn with_default_ports(ip: IpAddr) -> Self {
        Self::new(ip, Ports::default())
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn ports(&self) -> Ports {
        self.ports
    }

    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.ports.control)
    }

    /// URI handed to the video decoder.
    pub fn video_uri(&self) -> String {
        format!("tcp://{}", SocketAddr::new(self.ip, self.ports.video))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_default_ports_are_well_known() {
        let ports = Ports::default();
        assert_eq!(ports.control, 40923);
        assert_eq!(ports.push, 40924);
        assert_eq!(ports.video, 40921);
        assert_eq!(ports.discovery, 40926);
    }

    #[test]
    fn test_addresses() {
        let ep = Endpoint::with_default_ports(IpAddr::V4(Ipv4Addr::new(192, 168, 2, 1)));
        assert_eq!(ep.control_addr().to_string(), "192.168.2.1:40923");
        assert_eq!(ep.video_uri(), "tcp://192.168.2.1:40921");
    }
}

//! Controller discovery.
//!
//! The controller periodically broadcasts a short announcement on the
//! discovery port. The sender address of the first datagram is the
//! controller's IP.

use crate::endpoint::{Endpoint, Ports};
use crate::error::{Result, SetuError};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::time::Duration;

/// Announcement buffer size
const ANNOUNCEMENT_BUFFER_SIZE: usize = 1024;

/// Block until one announcement arrives on `ports.discovery`, or `timeout`
/// elapses. `None` waits indefinitely.
pub fn discover(ports: Ports, timeout: Option<Duration>) -> Result<Endpoint> {
    if timeout == Some(Duration::ZERO) {
        return Err(SetuError::InvalidParameter(
            "discovery timeout must be non-zero".into(),
        ));
    }

    let bind_addr = format!("0.0.0.0:{}", ports.discovery);
    let socket = UdpSocket::bind(&bind_addr)?;
    socket.set_read_timeout(timeout)?;

    tracing::info!(
        "Listening for controller broadcast on {} (timeout: {:?})",
        bind_addr,
        timeout
    );

    let mut buffer = [0u8; ANNOUNCEMENT_BUFFER_SIZE];
    match socket.recv_from(&mut buffer) {
        Ok((len, sender)) => {
            tracing::info!(
                "Broadcast from {}: {:?}",
                sender,
                String::from_utf8_lossy(&buffer[..len])
            );
            Ok(Endpoint::new(sender.ip(), ports))
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
            Err(SetuError::DiscoveryTimeout)
        }
        Err(e) => Err(SetuError::Socket(e)),
    }
}

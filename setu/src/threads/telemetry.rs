//! Telemetry worker: chassis pushes into the shared pose.
//!
//! The controller sends push datagrams to the client's push port after the
//! subscription command. Records update the pose in arrival order; malformed
//! records are logged and dropped.

use std::io::ErrorKind;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crate::client::CommandSink;
use crate::protocol::{Command, decode_push};
use crate::shared::{SharedPose, StopSignal};

/// Largest push datagram we expect
const PUSH_BUFFER_SIZE: usize = 2048;

/// Telemetry worker state and logic.
pub struct TelemetryWorker {
    socket: UdpSocket,
    /// Datagrams from any other address are ignored
    controller_ip: Option<IpAddr>,
    pose: Arc<SharedPose>,
    stop: Arc<StopSignal>,
    sink: Arc<dyn CommandSink>,
    subscription: Command,
    poll_interval: Duration,
    records_applied: u64,
}

impl TelemetryWorker {
    pub fn new(
        socket: UdpSocket,
        controller_ip: Option<IpAddr>,
        pose: Arc<SharedPose>,
        stop: Arc<StopSignal>,
        sink: Arc<dyn CommandSink>,
        subscription: Command,
        poll_interval: Duration,
    ) -> Self {
        Self {
            socket,
            controller_ip,
            pose,
            stop,
            sink,
            subscription,
            poll_interval,
            records_applied: 0,
        }
    }

    /// Subscribe, then apply pushes until the stop signal fires.
    pub fn run(&mut self) {
        if let Err(e) = self.sink.send(&self.subscription) {
            tracing::error!("Telemetry subscription failed: {}", e);
        }

        if let Err(e) = self.socket.set_read_timeout(Some(self.poll_interval)) {
            tracing::warn!("Failed to set telemetry read timeout: {}", e);
        }

        let mut buffer = [0u8; PUSH_BUFFER_SIZE];

        while !self.stop.is_stopped() {
            match self.socket.recv_from(&mut buffer) {
                Ok((len, sender)) => {
                    if let Some(ip) = self.controller_ip
                        && sender.ip() != ip
                    {
                        tracing::trace!("Ignoring push from {}", sender);
                        continue;
                    }
                    let datagram = String::from_utf8_lossy(&buffer[..len]);
                    self.apply(&datagram);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    // ICMP unreachable from an earlier send surfaces here on some platforms
                    if e.kind() == ErrorKind::ConnectionRefused {
                        continue;
                    }
                    tracing::error!("Telemetry receive failed: {}", e);
                    break;
                }
            }
        }

        tracing::debug!(
            "Telemetry worker exiting after {} records",
            self.records_applied
        );
    }

    fn apply(&mut self, datagram: &str) {
        for record in decode_push(datagram) {
            match record {
                Ok(record) => {
                    self.pose.apply(record);
                    self.records_applied += 1;
                }
                Err(e) => tracing::warn!("Dropping telemetry: {}", e),
            }
        }
    }
}

//! Control connection to the robot controller.
//!
//! Commands are written as whole frames under a lock so concurrent senders
//! never interleave bytes on the wire.

use crate::error::{Result, SetuError};
use crate::protocol::{Command, FrameSplitter, commands};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::{Duration, Instant};

/// Handshake acknowledgement sent by the controller
const HANDSHAKE_ACK: &str = "ok";

/// Read buffer for acknowledgements
pub(crate) const ACK_BUFFER_SIZE: usize = 1024;

/// Anything that can transmit a command to the robot.
pub trait CommandSink: Send + Sync {
    fn send(&self, command: &Command) -> Result<()>;
}

/// TCP control-stream client
#[derive(Debug)]
pub struct ControlClient {
    peer: SocketAddr,
    writer: Mutex<TcpStream>,
}

impl ControlClient {
    /// Connect with timeout
    pub fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(timeout))?;

        tracing::info!("Control connection established to {}", addr);

        Ok(Self {
            peer: addr,
            writer: Mutex::new(stream),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Enter SDK mode: send `command` and wait for its acknowledgement.
    ///
    /// Fails if the controller closes the stream, answers with anything other
    /// than `ok`, or stays silent for `timeout`.
    pub fn handshake(&self, timeout: Duration) -> Result<()> {
        let mut reader = self.reader()?;
        self.send(&commands::enter_sdk())?;

        let deadline = Instant::now() + timeout;
        let mut splitter = FrameSplitter::new();
        let mut buffer = [0u8; ACK_BUFFER_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SetuError::AckTimeout);
            }
            reader.set_read_timeout(Some(remaining))?;

            let len = match reader.read(&mut buffer) {
                Ok(0) => {
                    return Err(SetuError::Socket(std::io::Error::new(
                        ErrorKind::ConnectionAborted,
                        "controller closed the connection during handshake",
                    )));
                }
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Err(SetuError::AckTimeout);
                }
                Err(e) => return Err(SetuError::Socket(e)),
            };

            let mut frames = splitter.push(&buffer[..len]).into_iter();
            if let Some(ack) = frames.next() {
                for extra in frames {
                    tracing::debug!("Received: {}", extra);
                }
                if ack == HANDSHAKE_ACK {
                    tracing::info!("Handshake acknowledged by {}", self.peer);
                    return Ok(());
                }
                return Err(SetuError::Protocol(format!("Handshake rejected: {}", ack)));
            }
        }
    }

    /// Independent handle on the stream for the acknowledgement reader.
    pub fn reader(&self) -> Result<TcpStream> {
        Ok(self.writer.lock().try_clone()?)
    }

    /// Shut down both directions; unblocks any reader.
    pub fn shutdown(&self) -> Result<()> {
        self.writer.lock().shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl CommandSink for ControlClient {
    fn send(&self, command: &Command) -> Result<()> {
        let frame = command.encode();
        let mut stream = self.writer.lock();
        if let Err(e) = stream.write_all(&frame).and_then(|()| stream.flush()) {
            // A partial frame may be on the wire; nothing may follow it
            tracing::error!("Write of {} failed, closing control stream: {}", command, e);
            if let Err(shutdown) = stream.shutdown(Shutdown::Both) {
                tracing::debug!("Control socket shutdown: {}", shutdown);
            }
            return Err(SetuError::Socket(e));
        }
        drop(stream);

        tracing::debug!("Sent: {}", command);
        Ok(())
    }
}

//! Control reader: drains acknowledgements from the control stream.

use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};

use crate::client::ACK_BUFFER_SIZE;
use crate::protocol::FrameSplitter;
use crate::shared::StopSignal;

/// Control reader state and logic.
pub struct ControlReader {
    stream: TcpStream,
    stop: Arc<StopSignal>,
    acks: Sender<String>,
    poll_interval: Duration,
    splitter: FrameSplitter,
}

impl ControlReader {
    pub fn new(
        stream: TcpStream,
        stop: Arc<StopSignal>,
        acks: Sender<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            stream,
            stop,
            acks,
            poll_interval,
            splitter: FrameSplitter::new(),
        }
    }

    /// Run until the stop signal fires or the controller closes the stream.
    pub fn run(&mut self) {
        if let Err(e) = self.stream.set_read_timeout(Some(self.poll_interval)) {
            tracing::warn!("Failed to set control read timeout: {}", e);
        }

        let mut buffer = [0u8; ACK_BUFFER_SIZE];

        while !self.stop.is_stopped() {
            match self.stream.read(&mut buffer) {
                Ok(0) => {
                    if !self.stop.is_stopped() {
                        tracing::warn!("Controller closed the control connection");
                    }
                    break;
                }
                Ok(len) => {
                    for ack in self.splitter.push(&buffer[..len]) {
                        self.dispatch(ack);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    if !self.stop.is_stopped() {
                        tracing::error!("Control read failed: {}", e);
                    }
                    break;
                }
            }
        }

        tracing::debug!("Control reader exiting");
    }

    fn dispatch(&self, ack: String) {
        tracing::info!("Received: {}", ack);
        match self.acks.try_send(ack) {
            Ok(()) => {}
            Err(TrySendError::Full(ack)) => {
                tracing::trace!("Acknowledgement queue full, dropping {:?}", ack);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io::Write;
    use std::net::TcpListener;

    fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn test_forwards_acks_and_ends_on_peer_close() {
        let (client, mut server) = pair();
        let (tx, rx) = bounded(8);
        let stop = Arc::new(StopSignal::new());
        let mut reader = ControlReader::new(client, stop, tx, Duration::from_millis(20));
        let handle = std::thread::spawn(move || reader.run());

        server.write_all(b"ok;err").unwrap();
        server.write_all(b"or;").unwrap();
        drop(server);

        handle.join().unwrap();
        let acks: Vec<String> = rx.try_iter().collect();
        assert_eq!(acks, vec!["ok", "error"]);
    }

    #[test]
    fn test_stops_on_signal() {
        let (client, _server) = pair();
        let (tx, _rx) = bounded(8);
        let stop = Arc::new(StopSignal::new());
        let mut reader =
            ControlReader::new(client, Arc::clone(&stop), tx, Duration::from_millis(20));
        let handle = std::thread::spawn(move || reader.run());

        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (client, mut server) = pair();
        let (tx, rx) = bounded(1);
        let stop = Arc::new(StopSignal::new());
        let mut reader = ControlReader::new(client, stop, tx, Duration::from_millis(20));
        let handle = std::thread::spawn(move || reader.run());

        server.write_all(b"ok;ok;ok;").unwrap();
        drop(server);

        handle.join().unwrap();
        assert_eq!(rx.try_iter().count(), 1);
    }
}

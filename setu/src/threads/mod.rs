//! Channel worker threads.
//!
//! Each session runs three workers, one per transport:
//! - Control reader: acknowledgements on the control stream
//! - Telemetry: chassis position/attitude pushes, updates the shared pose
//! - Video: decoded frames, updates the shared frame slot
//!
//! Every worker signals completion through a channel when its thread exits
//! (panics included), which lets `Session::close` wait with a deadline instead
//! of an unbounded `join`.

mod control;
mod telemetry;
mod video;

pub use control::ControlReader;
pub use telemetry::TelemetryWorker;
pub use video::{InterruptSlot, VideoWorker};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Handle on a running worker thread.
pub struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

/// Fires the completion channel when dropped, so it also runs on unwind.
struct DoneGuard(Sender<()>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

impl Worker {
    /// Spawn a named worker thread.
    pub fn spawn<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = bounded(1);
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            let _guard = DoneGuard(done_tx);
            body();
        })?;

        tracing::debug!("Started {} worker", name);

        Ok(Self {
            name,
            handle,
            done: done_rx,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until `deadline` for the worker to finish, then join it.
    /// Returns `false` if it was still running; the thread is then detached.
    pub fn join_until(self, deadline: Instant) -> bool {
        match self.done.recv_deadline(deadline) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::error!("{} worker panicked", self.name);
                } else {
                    tracing::debug!("{} worker stopped", self.name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "{} worker did not stop before the deadline; detaching it",
                    self.name
                );
                false
            }
        }
    }
}

/// Join every worker against one shared deadline. Returns the number of
/// workers that failed to stop in time.
pub fn join_all(workers: Vec<Worker>, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    workers
        .into_iter()
        .map(|worker| worker.join_until(deadline))
        .filter(|stopped| !stopped)
        .count()
}

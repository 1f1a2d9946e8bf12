//! Video worker: enables streaming and publishes decoded frames.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::CommandSink;
use crate::endpoint::Endpoint;
use crate::protocol::commands;
use crate::shared::{FrameSlot, StopSignal};
use crate::video::{FrameSourceOpener, Interrupt};

/// Where the running source's interrupter is parked so `close` can reach it.
pub type InterruptSlot = Arc<Mutex<Option<Arc<dyn Interrupt>>>>;

/// Video worker state and logic.
pub struct VideoWorker {
    endpoint: Endpoint,
    sink: Arc<dyn CommandSink>,
    opener: Arc<dyn FrameSourceOpener>,
    slot: Arc<FrameSlot>,
    stop: Arc<StopSignal>,
    interrupt: InterruptSlot,
    startup_delay: Duration,
}

impl VideoWorker {
    pub fn new(
        endpoint: Endpoint,
        sink: Arc<dyn CommandSink>,
        opener: Arc<dyn FrameSourceOpener>,
        slot: Arc<FrameSlot>,
        stop: Arc<StopSignal>,
        interrupt: InterruptSlot,
        startup_delay: Duration,
    ) -> Self {
        Self {
            endpoint,
            sink,
            opener,
            slot,
            stop,
            interrupt,
            startup_delay,
        }
    }

    /// Stream frames until stopped or the source ends. No reconnect.
    pub fn run(&mut self) {
        if let Err(e) = self.sink.send(&commands::stream_on()) {
            tracing::error!("Failed to enable video stream: {}", e);
            return;
        }

        // Give the controller time to start its encoder
        if !self.stop.sleep(self.startup_delay) {
            return;
        }

        let mut source = match self.opener.open(&self.endpoint) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Failed to open video source: {}", e);
                return;
            }
        };

        *self.interrupt.lock() = Some(source.interrupter());
        // close() may have fired between open and registration
        if self.stop.is_stopped() {
            self.interrupt.lock().take();
            return;
        }

        tracing::info!("Video stream open");
        let mut frames: u64 = 0;

        while !self.stop.is_stopped() {
            match source.read_frame() {
                Ok(Some(frame)) => {
                    self.slot.publish(frame);
                    frames += 1;
                }
                Ok(None) => {
                    if !self.stop.is_stopped() {
                        tracing::warn!("Video stream ended after {} frames", frames);
                    }
                    break;
                }
                Err(e) => {
                    if !self.stop.is_stopped() {
                        tracing::error!("Video stream failed after {} frames: {}", frames, e);
                    }
                    break;
                }
            }
        }

        self.interrupt.lock().take();
        tracing::debug!("Video worker exiting after {} frames", frames);
    }
}

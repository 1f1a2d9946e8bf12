//! State shared between the session and its worker threads.
//!
//! - Pose: written by the telemetry worker, read by anyone
//! - Frame slot: written by the video worker, read by anyone
//! - Stop signal: fired by `Session::close`, observed by every worker

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::protocol::TelemetryRecord;
use crate::video::Frame;

/// Robot pose relative to the session start: metres and degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    /// Apply one record. Position and attitude are independent fields:
    /// the last record of each kind wins.
    pub fn apply(&mut self, record: TelemetryRecord) {
        match record {
            TelemetryRecord::Position { x, y } => {
                self.x = x;
                self.y = y;
            }
            TelemetryRecord::Attitude { yaw } => self.yaw = yaw,
        }
    }
}

/// Lock-guarded pose so a reader never sees x from one record and y from
/// another. x/y and yaw may still come from different instants.
#[derive(Debug, Default)]
pub struct SharedPose {
    pose: Mutex<Pose>,
}

impl SharedPose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Pose {
        *self.pose.lock()
    }

    pub fn apply(&self, record: TelemetryRecord) {
        self.pose.lock().apply(record);
    }
}

#[derive(Default)]
struct SlotInner {
    frame: Option<Arc<Frame>>,
    fresh: bool,
}

/// Single-slot holder for the latest video frame.
///
/// Publishing replaces the previous frame; there is never a backlog. The
/// freshness flag is updated together with the frame under one lock.
#[derive(Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    published: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new frame, mark it fresh and wake waiters.
    pub fn publish(&self, frame: Frame) {
        let mut inner = self.inner.lock();
        inner.frame = Some(Arc::new(frame));
        inner.fresh = true;
        drop(inner);
        self.published.notify_all();
    }

    /// Latest frame without touching the freshness flag.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.inner.lock().frame.clone()
    }

    pub fn has_fresh(&self) -> bool {
        self.inner.lock().fresh
    }

    /// Read-and-clear: the latest frame if it has not been taken yet.
    pub fn take_fresh(&self) -> Option<Arc<Frame>> {
        let mut inner = self.inner.lock();
        if inner.fresh {
            inner.fresh = false;
            inner.frame.clone()
        } else {
            None
        }
    }

    /// Block until a fresh frame is published or `timeout` elapses.
    pub fn wait_fresh(&self, timeout: Duration) -> Option<Arc<Frame>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        while !inner.fresh {
            if self.published.wait_until(&mut inner, deadline).timed_out() {
                break;
            }
        }
        if inner.fresh {
            inner.fresh = false;
            inner.frame.clone()
        } else {
            None
        }
    }
}

/// Cancellation token shared by the session and its workers.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    changed: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.changed.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if the full
    /// duration elapsed without a stop.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.changed.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        !*stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, RgbImage::new(4, 2))
    }

    #[test]
    fn test_pose_last_write_wins_per_field() {
        let pose = SharedPose::new();
        pose.apply(TelemetryRecord::Position { x: 1.0, y: 2.0 });
        pose.apply(TelemetryRecord::Attitude { yaw: 45.0 });
        pose.apply(TelemetryRecord::Position { x: 3.0, y: 4.0 });
        assert_eq!(pose.get(), Pose::new(3.0, 4.0, 45.0));
    }

    #[test]
    fn test_take_fresh_clears_flag() {
        let slot = FrameSlot::new();
        assert!(slot.take_fresh().is_none());

        slot.publish(frame(1));
        assert!(slot.has_fresh());
        assert_eq!(slot.take_fresh().unwrap().seq(), 1);
        assert!(!slot.has_fresh());
        assert!(slot.take_fresh().is_none());
        // The frame itself is kept
        assert_eq!(slot.latest().unwrap().seq(), 1);
    }

    #[test]
    fn test_only_latest_frame_kept() {
        let slot = FrameSlot::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        slot.publish(frame(3));
        assert_eq!(slot.take_fresh().unwrap().seq(), 3);
        assert!(slot.take_fresh().is_none());
    }

    #[test]
    fn test_wait_fresh_wakes_on_publish() {
        let slot = Arc::new(FrameSlot::new());
        let publisher = {
            let slot = Arc::clone(&slot);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                slot.publish(frame(7));
            })
        };
        let got = slot.wait_fresh(Duration::from_secs(5));
        assert_eq!(got.unwrap().seq(), 7);
        publisher.join().unwrap();
    }

    #[test]
    fn test_wait_fresh_times_out() {
        let slot = FrameSlot::new();
        let start = Instant::now();
        assert!(slot.wait_fresh(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_stop_interrupts_sleep() {
        let signal = Arc::new(StopSignal::new());
        let stopper = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                signal.stop();
            })
        };
        let start = Instant::now();
        assert!(!signal.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(signal.is_stopped());
        stopper.join().unwrap();
    }

    #[test]
    fn test_sleep_completes_without_stop() {
        let signal = StopSignal::new();
        assert!(signal.sleep(Duration::from_millis(10)));
    }
}

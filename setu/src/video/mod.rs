//! Video frames and the decoder seam.
//!
//! The controller streams H.264 on the video port. Decoding is delegated to a
//! [`FrameSource`]; the default one runs an `ffmpeg` subprocess that turns the
//! stream into raw RGB frames.

mod ffmpeg;

pub use ffmpeg::{FfmpegOpener, FfmpegSource};

use crate::endpoint::Endpoint;
use crate::error::{Result, SetuError};
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    seq: u64,
    captured_at: Instant,
    image: RgbImage,
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self {
            seq,
            captured_at: Instant::now(),
            image,
        }
    }

    /// Position of this frame in its stream, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// Write the frame as a PNG file.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| SetuError::Video(format!("Failed to save {}: {}", path.display(), e)))
    }
}

/// Unblocks a source that is waiting inside `read_frame`.
pub trait Interrupt: Send + Sync {
    fn interrupt(&self);
}

/// A continuous source of decoded frames.
pub trait FrameSource: Send {
    /// Block until the next frame. `Ok(None)` means the stream ended.
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Handle that makes a blocked `read_frame` return promptly.
    fn interrupter(&self) -> Arc<dyn Interrupt>;
}

/// Opens a [`FrameSource`] for a controller once streaming is enabled.
pub trait FrameSourceOpener: Send + Sync {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn FrameSource>>;
}

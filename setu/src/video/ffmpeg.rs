//! `ffmpeg` subprocess decoder.
//!
//! ffmpeg connects to the controller's video port itself and writes fixed-size
//! RGB24 frames to stdout, so a frame is exactly `width * height * 3` bytes.

use super::{Frame, FrameSource, FrameSourceOpener, Interrupt};
use crate::config::VideoConfig;
use crate::endpoint::Endpoint;
use crate::error::{Result, SetuError};
use image::RgbImage;
use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::Arc;

/// Spawns one ffmpeg decoder per session.
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg_path: String,
    width: u32,
    height: u32,
}

impl FfmpegOpener {
    pub fn new(ffmpeg_path: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            width,
            height,
        }
    }

    pub fn from_config(config: &VideoConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.width, config.height)
    }

    fn args(&self, endpoint: &Endpoint) -> Vec<String> {
        vec![
            "-loglevel".into(),
            "error".into(),
            "-fflags".into(),
            "nobuffer".into(),
            "-flags".into(),
            "low_delay".into(),
            "-i".into(),
            endpoint.video_uri(),
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-".into(),
        ]
    }
}

impl FrameSourceOpener for FfmpegOpener {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn FrameSource>> {
        let args = self.args(endpoint);
        tracing::debug!("Starting {} {:?}", self.ffmpeg_path, args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                SetuError::Video(format!("Failed to spawn {}: {}", self.ffmpeg_path, e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SetuError::Video("Failed to capture decoder stdout".into()))?;

        tracing::info!(
            "Video decoder started for {} ({}x{})",
            endpoint.video_uri(),
            self.width,
            self.height
        );

        Ok(Box::new(FfmpegSource {
            child: Arc::new(Mutex::new(child)),
            stdout,
            width: self.width,
            height: self.height,
            next_seq: 0,
            buffer: vec![0u8; frame_len(self.width, self.height)],
        }))
    }
}

fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Raw RGB frames read from a running ffmpeg process.
pub struct FfmpegSource {
    child: Arc<Mutex<Child>>,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    next_seq: u64,
    buffer: Vec<u8>,
}

impl FrameSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.stdout.read_exact(&mut self.buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(SetuError::Video(format!("Decoder read failed: {}", e))),
        }

        let image = RgbImage::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| SetuError::Video("Frame buffer size mismatch".into()))?;
        let frame = Frame::new(self.next_seq, image);
        self.next_seq += 1;
        Ok(Some(frame))
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        Arc::new(ChildKiller(Arc::clone(&self.child)))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let mut child = self.child.lock();
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Killing the decoder closes its stdout, ending a blocked read with EOF.
struct ChildKiller(Arc<Mutex<Child>>);

impl Interrupt for ChildKiller {
    fn interrupt(&self) {
        if let Err(e) = self.0.lock().kill() {
            tracing::debug!("Decoder kill: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Ports;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_decoder_arguments() {
        let opener = FfmpegOpener::new("ffmpeg", 640, 360);
        let ep = Endpoint::new(IpAddr::V4(Ipv4Addr::new(192, 168, 2, 1)), Ports::default());
        let args = opener.args(&ep);
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "tcp://192.168.2.1:40921");
        assert!(args.contains(&"scale=640:360".to_string()));
        assert!(args.contains(&"rgb24".to_string()));
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(1280, 720), 2_764_800);
    }

    #[test]
    fn test_missing_decoder_is_video_error() {
        let opener = FfmpegOpener::new("/nonexistent/setu-ffmpeg", 16, 16);
        let ep = Endpoint::with_default_ports(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(matches!(opener.open(&ep), Err(SetuError::Video(_))));
    }
}

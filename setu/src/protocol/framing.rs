//! Splits a byte stream into `;`-terminated frames.

use super::command::TERMINATOR;

/// Default upper bound on a single unterminated frame
const DEFAULT_MAX_FRAME: usize = 4096;

/// Accumulates stream reads and yields complete frames.
///
/// TCP gives no message boundaries, so an acknowledgement may arrive split
/// across reads or several may arrive in one read.
#[derive(Debug)]
pub struct FrameSplitter {
    pending: Vec<u8>,
    max_frame: usize,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            pending: Vec::with_capacity(256),
            max_frame,
        }
    }

    /// Feed bytes, returning every frame completed by them (trimmed, without
    /// the terminator, empty frames skipped).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        for &byte in bytes {
            if byte == TERMINATOR as u8 {
                let frame = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                if !frame.is_empty() {
                    frames.push(frame);
                }
            } else {
                self.pending.push(byte);
            }
        }

        if self.pending.len() > self.max_frame {
            tracing::warn!(
                "Discarding {} bytes of unterminated data",
                self.pending.len()
            );
            self.pending.clear();
        }

        frames
    }

    /// Bytes waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

//! Detection types and the collaborator seams for perception.
//!
//! Models live outside this crate. A [`Detector`] turns a frame into scored
//! boxes; a [`CategoryExtractor`] turns free text into wanted categories. The
//! helpers here pick targets out of detector output.

use std::collections::BTreeSet;

use crate::error::{Result, SetuError};
use crate::video::Frame;

/// Axis-aligned box in pixel coordinates, `min` corner inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Integer crop rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let finite = [x_min, y_min, x_max, y_max].iter().all(|v| v.is_finite());
        if !finite || x_max < x_min || y_max < y_min {
            return Err(SetuError::InvalidParameter(format!(
                "invalid box ({}, {}) - ({}, {})",
                x_min, y_min, x_max, y_max
            )));
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Grow the box by `margin` times the frame size on every side, clamp it
    /// to the frame and round to whole pixels. `None` if nothing is left.
    pub fn expanded_clamped(
        &self,
        margin: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<CropRect> {
        let (w, h) = (f64::from(frame_width), f64::from(frame_height));
        let (dx, dy) = (margin * w, margin * h);

        let x1 = (self.x_min - dx).max(0.0).round();
        let y1 = (self.y_min - dy).max(0.0).round();
        let x2 = (self.x_max + dx).min(w).round();
        let y2 = (self.y_max + dy).min(h).round();

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(CropRect {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }
}

/// One scored detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub category: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Object detector run on decoded frames.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Maps a free-text request to the categories it mentions.
pub trait CategoryExtractor {
    fn extract(&self, text: &str) -> BTreeSet<String>;
}

/// Detections whose category is wanted and whose confidence reaches
/// `min_confidence`.
pub fn filter_detections<'a>(
    detections: &'a [Detection],
    wanted: &'a BTreeSet<String>,
    min_confidence: f64,
) -> impl Iterator<Item = &'a Detection> + 'a {
    detections
        .iter()
        .filter(move |d| d.confidence >= min_confidence && wanted.contains(&d.category))
}

/// Highest-confidence detection; the first one wins ties. NaN scores are
/// never chosen over a real score.
pub fn most_confident<'a, I>(detections: I) -> Option<&'a Detection>
where
    I: IntoIterator<Item = &'a Detection>,
{
    let mut best: Option<&Detection> = None;
    for detection in detections {
        if detection.confidence.is_nan() {
            continue;
        }
        match best {
            Some(b) if detection.confidence <= b.confidence => {}
            _ => best = Some(detection),
        }
    }
    best
}

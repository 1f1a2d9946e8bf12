//! Push telemetry decoding.

use super::command::TERMINATOR;
use crate::error::{Result, SetuError};

/// Token index of the x coordinate in `chassis push position <x> <y> ...`
const POSITION_X: usize = 3;
const POSITION_Y: usize = 4;
/// Token index of yaw in `chassis push attitude <pitch> <roll> <yaw>`
const ATTITUDE_YAW: usize = 5;

/// One decoded telemetry record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryRecord {
    /// Metres relative to the pose at session start
    Position { x: f64, y: f64 },
    /// Degrees
    Attitude { yaw: f64 },
}

/// Decode one telemetry line.
///
/// Lines of an unknown shape yield `Ok(None)`; they are expected (the
/// controller pushes other topics too) and are not an error. A known shape
/// with a missing or non-numeric field is a protocol error.
pub fn decode_telemetry(line: &str) -> Result<Option<TelemetryRecord>> {
    let body = line.trim().trim_end_matches(TERMINATOR);
    let tokens: Vec<&str> = body.split_whitespace().collect();

    if tokens.len() < 3 || tokens[0] != "chassis" || tokens[1] != "push" {
        return Ok(None);
    }

    match tokens[2] {
        "position" => {
            let x = field(&tokens, POSITION_X, line)?;
            let y = field(&tokens, POSITION_Y, line)?;
            Ok(Some(TelemetryRecord::Position { x, y }))
        }
        "attitude" => {
            let yaw = field(&tokens, ATTITUDE_YAW, line)?;
            Ok(Some(TelemetryRecord::Attitude { yaw }))
        }
        _ => Ok(None),
    }
}

/// Decode a whole push datagram.
///
/// With several topics subscribed the controller packs them into one
/// datagram, and only the first segment carries the `chassis push` prefix:
///
/// ```text
/// chassis push position 0.1 0.2 ; attitude 0 0 45 ;
/// ```
pub fn decode_push(datagram: &str) -> Vec<Result<TelemetryRecord>> {
    let mut records = Vec::new();
    for segment in datagram.split(TERMINATOR) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let decoded = if segment.starts_with("chassis ") {
            decode_telemetry(segment)
        } else {
            decode_telemetry(&format!("chassis push {}", segment))
        };
        match decoded {
            Ok(Some(record)) => records.push(Ok(record)),
            Ok(None) => {}
            Err(e) => records.push(Err(e)),
        }
    }
    records
}

fn field(tokens: &[&str], index: usize, line: &str) -> Result<f64> {
    let token = tokens.get(index).ok_or_else(|| {
        SetuError::Protocol(format!("Missing field {} in telemetry {:?}", index, line))
    })?;
    token.parse::<f64>().map_err(|e| {
        SetuError::Protocol(format!("Bad number {:?} in telemetry {:?}: {}", token, line, e))
    })
}

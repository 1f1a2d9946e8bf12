//! Expected durations of open-loop moves.

/// Seconds to travel `(x, y)` metres at `speed` m/s.
pub fn calculate_move_time(x: f64, y: f64, speed: f64) -> f64 {
    x.hypot(y) / speed
}

/// Seconds to turn `angle` degrees at `speed` degrees/s.
pub fn calculate_turn_time(angle: f64, speed: f64) -> f64 {
    angle.abs() / speed
}

//! Session-level commands.

use super::Command;

/// Enter SDK mode; must be the first command on a new control connection.
pub fn enter_sdk() -> Command {
    Command::new("command")
}

pub fn quit() -> Command {
    Command::new("quit")
}

pub fn stream_on() -> Command {
    Command::new("stream").arg("on")
}

pub fn stream_off() -> Command {
    Command::new("stream").arg("off")
}

/// Subscribe to chassis position and attitude pushes at the given rates (Hz).
pub fn subscribe_chassis(position_hz: u32, attitude_hz: u32) -> Command {
    Command::new("chassis")
        .arg("push")
        .arg("position")
        .arg("on")
        .arg("pfreq")
        .arg(position_hz)
        .arg("attitude")
        .arg("on")
        .arg("afreq")
        .arg(attitude_hz)
}

/// Set every chassis LED to a solid colour.
pub fn led_solid(r: u8, g: u8, b: u8) -> Command {
    Command::new("led")
        .arg("control")
        .arg("comp")
        .arg("bottom_all")
        .arg("r")
        .arg(r)
        .arg("g")
        .arg(g)
        .arg("b")
        .arg(b)
        .arg("effect")
        .arg("solid")
}

/// Idle lighting applied after connecting.
pub fn led_reset() -> Command {
    led_solid(255, 255, 255)
}

//! Keyboard teleoperation bindings.
//!
//! Each key maps to a single short command: small chassis steps, arm moves
//! and gripper actions. The mapping is pure so any input loop can drive it.

use crate::protocol::Command;

/// Chassis step per key press in metres
const STEP_M: f64 = 0.2;
/// Yaw step per key press in degrees
const STEP_DEG: f64 = 5.0;

/// Arm pose for picking from the floor
const ARM_PICK: (f64, f64) = (210.0, 44.0);
/// Arm pose for carrying
const ARM_CARRY: (f64, f64) = (92.0, 90.0);

/// Key bindings as `(key, description)` pairs, in display order.
pub const BINDINGS: &[(char, &str)] = &[
    ('w', "forward"),
    ('s', "backward"),
    ('a', "left"),
    ('d', "right"),
    ('q', "turn left"),
    ('e', "turn right"),
    ('r', "arm recenter"),
    ('x', "arm stop"),
    ('c', "arm to pick pose"),
    ('z', "arm to carry pose"),
    ('f', "gripper open"),
    ('g', "gripper close"),
];

fn chassis_step(axis: &str, amount: f64) -> Command {
    Command::new("chassis").arg("move").arg(axis).num(amount)
}

fn arm_to((x, y): (f64, f64)) -> Command {
    Command::new("robotic_arm")
        .arg("moveto")
        .arg("x")
        .num(x)
        .arg("y")
        .num(y)
}

/// Command bound to `key`, if any. Keys are case-insensitive.
pub fn command_for_key(key: char) -> Option<Command> {
    let command = match key.to_ascii_lowercase() {
        'w' => chassis_step("x", STEP_M),
        's' => chassis_step("x", -STEP_M),
        'a' => chassis_step("y", -STEP_M),
        'd' => chassis_step("y", STEP_M),
        'q' => chassis_step("z", -STEP_DEG),
        'e' => chassis_step("z", STEP_DEG),
        'r' => Command::new("robotic_arm").arg("recenter"),
        'x' => Command::new("robotic_arm").arg("stop"),
        'c' => arm_to(ARM_PICK),
        'z' => arm_to(ARM_CARRY),
        'f' => Command::new("robotic_gripper").arg("open").arg(1),
        'g' => Command::new("robotic_gripper").arg("close").arg(1),
        _ => return None,
    };
    Some(command)
}

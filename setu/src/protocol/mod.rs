//! Text command protocol.
//!
//! # Wire Format
//!
//! Every instruction is a single line of space-separated tokens terminated by
//! `;`, written as one TCP send on the control port:
//!
//! ```text
//! chassis move x 0.5 y 0 vxy 0.3;
//! ```
//!
//! The controller answers asynchronously on the same stream with free-form,
//! `;`-terminated text (`ok;`, `error;`, ...). Telemetry arrives on the push
//! port as UDP datagrams with the same framing:
//!
//! ```text
//! chassis push position 0.12 -0.03 ;
//! chassis push attitude 0.1 -0.2 45.0 ;
//! ```

mod command;
pub mod commands;
mod framing;
mod telemetry;

pub use command::{Command, TERMINATOR, decode_command, encode};
pub use framing::FrameSplitter;
pub use telemetry::{TelemetryRecord, decode_push, decode_telemetry};

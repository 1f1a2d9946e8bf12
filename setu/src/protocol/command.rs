//! Command encoding and decoding.

use crate::error::{Result, SetuError};
use std::fmt;

/// Command terminator
pub const TERMINATOR: char = ';';

/// One protocol instruction as an ordered list of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    tokens: Vec<String>,
}

impl Command {
    /// Start a command with its leading keyword.
    pub fn new(head: impl fmt::Display) -> Self {
        Self {
            tokens: vec![head.to_string()],
        }
    }

    /// Build a command from a space-separated line such as `"stream on"`.
    pub fn from_line(line: &str) -> Self {
        Self {
            tokens: line
                .trim()
                .trim_end_matches(TERMINATOR)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: fmt::Display,
    {
        Self {
            tokens: tokens.into_iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Append a token.
    pub fn arg(mut self, token: impl fmt::Display) -> Self {
        self.tokens.push(token.to_string());
        self
    }

    /// Append a numeric token. Negative zero is written as `0`.
    pub fn num(mut self, value: f64) -> Self {
        let value = if value == 0.0 { 0.0 } else { value };
        self.tokens.push(value.to_string());
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Encoded frame, terminator included.
    pub fn encode(&self) -> Vec<u8> {
        encode(&self.tokens)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tokens.join(" "), TERMINATOR)
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Command::from_line(line)
    }
}

/// Join tokens with single spaces, append the terminator, encode as UTF-8.
pub fn encode<T: fmt::Display>(tokens: &[T]) -> Vec<u8> {
    let mut line = tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    line.push(TERMINATOR);
    line.into_bytes()
}

/// Recover the tokens of one encoded command frame.
pub fn decode_command(bytes: &[u8]) -> Result<Vec<String>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| SetuError::Protocol(format!("Command is not valid UTF-8: {}", e)))?;
    let body = text
        .trim_end()
        .strip_suffix(TERMINATOR)
        .ok_or_else(|| SetuError::Protocol(format!("Missing terminator in {:?}", text)))?;
    Ok(body.split_whitespace().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_joins_and_terminates() {
        assert_eq!(encode(&["command"]), b"command;".to_vec());
        let cmd = Command::new("chassis")
            .arg("move")
            .arg("x")
            .num(0.5)
            .arg("vxy")
            .num(0.3);
        assert_eq!(cmd.encode(), b"chassis move x 0.5 vxy 0.3;".to_vec());
        assert_eq!(cmd.to_string(), "chassis move x 0.5 vxy 0.3;");
    }

    #[test]
    fn test_round_trip() {
        let samples: Vec<Vec<String>> = vec![
            vec!["command".into()],
            vec!["stream".into(), "off".into()],
            vec!["chassis".into(), "speed".into(), "x".into(), "-0.15".into()],
            vec!["robotic_arm".into(), "move".into(), "x".into(), "-500".into()],
        ];
        for tokens in samples {
            assert_eq!(decode_command(&encode(&tokens)).unwrap(), tokens);
        }
    }

    #[test]
    fn test_number_formatting() {
        let cmd = Command::new("chassis").num(-0.0).num(100.0).num(0.06);
        assert_eq!(cmd.tokens(), &["chassis", "0", "100", "0.06"]);
    }

    #[test]
    fn test_from_line() {
        let cmd = Command::from_line("  robotic_gripper open 1; ");
        assert_eq!(cmd.tokens(), &["robotic_gripper", "open", "1"]);
        assert_eq!(Command::from("stream on").encode(), b"stream on;".to_vec());
    }

    #[test]
    fn test_decode_rejects_unterminated() {
        assert!(matches!(
            decode_command(b"stream on"),
            Err(SetuError::Protocol(_))
        ));
        assert!(matches!(
            decode_command(&[0xff, 0xfe, b';']),
            Err(SetuError::Protocol(_))
        ));
    }
}

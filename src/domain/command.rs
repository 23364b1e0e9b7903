//! Movement command vocabulary shared by the WebSocket and REST transports.
//!
//! [`Command`] is the closed set of directives the vehicle understands and
//! [`Speed`] is the bounded intensity sent alongside it. Both transports
//! accept exactly these values.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Directional command sent to the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Drive forward.
    Forward,
    /// Drive backward.
    Backward,
    /// Turn left.
    Left,
    /// Turn right.
    Right,
    /// Stop all motors.
    Stop,
}

impl Command {
    /// All commands, in wire order.
    pub const ALL: [Self; 5] = [
        Self::Forward,
        Self::Backward,
        Self::Left,
        Self::Right,
        Self::Stop,
    ];

    /// Returns the wire name of this command.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| LinkError::InvalidCommand(s.to_string()))
    }
}

/// Motor intensity in the range `0..=255`.
///
/// The range is enforced by the inner `u8`, so any `Speed` is valid on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Speed(u8);

impl Speed {
    /// Full stop intensity.
    pub const MIN: Self = Self(0);
    /// Maximum intensity.
    pub const MAX: Self = Self(u8::MAX);

    /// Creates a speed from a raw byte.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Returns the raw intensity.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(150)
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for Speed {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for Speed {
    type Error = LinkError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| LinkError::InvalidSpeed(value))
    }
}

impl FromStr for Speed {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| LinkError::InvalidRequest(format!("speed is not an integer: {s}")))?;
        Self::try_from(value)
    }
}

/// A single command frame as written to the WebSocket.
///
/// ```json
/// { "command": "forward", "speed": 200, "timestamp": 1718000000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    /// Directive to execute.
    pub command: Command,
    /// Motor intensity.
    pub speed: Speed,
    /// Emission time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl OutboundCommand {
    /// Builds a command stamped with the current time.
    #[must_use]
    pub fn now(command: Command, speed: Speed) -> Self {
        Self {
            command,
            speed,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        let Ok(cmd) = " Forward ".parse::<Command>() else {
            panic!("expected forward to parse");
        };
        assert_eq!(cmd, Command::Forward);
        assert!("sideways".parse::<Command>().is_err());
    }

    #[test]
    fn wire_names_match_serde() {
        for cmd in Command::ALL {
            let json = serde_json::to_string(&cmd).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", cmd.as_str()));
        }
    }

    #[test]
    fn speed_rejects_out_of_range() {
        assert!(Speed::try_from(256_i64).is_err());
        assert!(Speed::try_from(-1_i64).is_err());
        assert_eq!(Speed::try_from(255_i64).ok(), Some(Speed::MAX));
        assert!("abc".parse::<Speed>().is_err());
    }

    #[test]
    fn outbound_command_shape() {
        let cmd = OutboundCommand::now(Command::Left, Speed::new(200));
        let value = serde_json::to_value(&cmd).unwrap_or_default();
        assert_eq!(value["command"], "left");
        assert_eq!(value["speed"], 200);
        assert!(value["timestamp"].as_i64().unwrap_or_default() > 0);
        let Some(obj) = value.as_object() else {
            panic!("expected a JSON object");
        };
        assert_eq!(obj.len(), 3);
    }
}

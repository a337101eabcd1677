//! Command model shared between the gateway and auxiliary binaries.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Discriminant of a command, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Arm,
    Takeoff,
    Goto,
    Land,
    Disarm,
}

impl CommandKind {
    /// Wire tag for this command
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Arm => "arm",
            CommandKind::Takeoff => "takeoff",
            CommandKind::Goto => "goto",
            CommandKind::Land => "land",
            CommandKind::Disarm => "disarm",
        }
    }

    /// Parse a wire tag; `None` for anything outside the recognized set
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "arm" => Some(CommandKind::Arm),
            "takeoff" => Some(CommandKind::Takeoff),
            "goto" => Some(CommandKind::Goto),
            "land" => Some(CommandKind::Land),
            "disarm" => Some(CommandKind::Disarm),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated command with its typed parameters.
///
/// Produced by the validator; parameters are guaranteed finite and
/// within the configured envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Arm,
    Takeoff { alt: f64 },
    Goto { lat: f64, lon: f64, alt: f64 },
    Land,
    Disarm,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Arm => CommandKind::Arm,
            Command::Takeoff { .. } => CommandKind::Takeoff,
            Command::Goto { .. } => CommandKind::Goto,
            Command::Land => CommandKind::Land,
            Command::Disarm => CommandKind::Disarm,
        }
    }

    /// Parameter object for the outbound wire form
    pub fn params(&self) -> Value {
        match self {
            Command::Arm | Command::Land | Command::Disarm => json!({}),
            Command::Takeoff { alt } => json!({ "alt": alt }),
            Command::Goto { lat, lon, alt } => json!({ "lat": lat, "lon": lon, "alt": alt }),
        }
    }
}

/// Outbound wire form: the only artifact that crosses the forwarding
/// boundary. Created fresh per accepted message, never retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCommand {
    pub ts_ms: u64,
    pub cmd: String,
    pub params: Value,
}

impl WireCommand {
    /// Build the wire form of an accepted command, stamped at forward time
    pub fn new(command: &Command, ts_ms: u64) -> Self {
        Self {
            ts_ms,
            cmd: command.kind().as_str().to_string(),
            params: command.params(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for kind in [
            CommandKind::Arm,
            CommandKind::Takeoff,
            CommandKind::Goto,
            CommandKind::Land,
            CommandKind::Disarm,
        ] {
            assert_eq!(CommandKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(CommandKind::from_tag("launch"), None);
        assert_eq!(CommandKind::from_tag("ARM"), None);
    }

    #[test]
    fn test_params_shape() {
        assert_eq!(Command::Arm.params(), json!({}));
        assert_eq!(Command::Takeoff { alt: 12.5 }.params(), json!({ "alt": 12.5 }));

        let goto = Command::Goto { lat: 47.0, lon: 8.0, alt: 30.0 };
        assert_eq!(goto.params(), json!({ "lat": 47.0, "lon": 8.0, "alt": 30.0 }));
    }

    #[test]
    fn test_wire_command_serialization() {
        let wire = WireCommand::new(&Command::Takeoff { alt: 20.0 }, 1_700_000_000_123);
        let value = serde_json::to_value(&wire).expect("serialize failed");

        assert_eq!(value["ts_ms"], json!(1_700_000_000_123u64));
        assert_eq!(value["cmd"], json!("takeoff"));
        assert_eq!(value["params"], json!({ "alt": 20.0 }));
    }
}

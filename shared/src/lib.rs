//! Skygate Shared Domain Types
//!
//! This crate provides the command model, geofence envelope, mission
//! sequence state machine and MQTT packet codec shared between the
//! gateway and its auxiliary binaries.

pub mod codec;
pub mod command;
pub mod geofence;
pub mod state_machine;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use command::{Command, CommandKind, WireCommand};
pub use geofence::{Geofence, GeofenceError};
pub use state_machine::{MissionPhase, SequenceStateMachine};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_advances() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 0);
    }
}

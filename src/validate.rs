//! Command validator
//!
//! Composes the shape, tag, sequence and parameter/geofence checks into
//! a single accept/reject decision. Stages short-circuit in a fixed
//! order so a payload failing several ways always reports the same
//! reason.

use serde_json::{Map, Value};
use skygate_shared::{Command, CommandKind, Geofence, SequenceStateMachine};
use thiserror::Error;

/// Why a command was rejected.
///
/// Every variant is a per-message error: logged, counted and dropped
/// without affecting mission phase.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("payload not a JSON object")]
    MalformedPayload,

    #[error("unknown cmd '{0}'")]
    UnknownCommand(String),

    #[error("sequence violation: {0}")]
    SequenceViolation(&'static str),

    #[error("{0}")]
    ParameterRange(String),

    #[error("{0}")]
    GeofenceViolation(String),
}

/// Validates inbound payloads against the geofence and mission sequence.
///
/// Reads the sequence state but never applies transitions; applying is
/// the orchestrator's job once forwarding is attempted.
pub struct CommandValidator {
    geofence: Geofence,
}

impl CommandValidator {
    pub fn new(geofence: Geofence) -> Self {
        Self { geofence }
    }

    pub fn validate(
        &self,
        payload: &Value,
        seq: &SequenceStateMachine,
    ) -> Result<Command, ValidationError> {
        let obj = payload.as_object().ok_or(ValidationError::MalformedPayload)?;

        let kind = match obj.get("cmd").and_then(Value::as_str) {
            Some(tag) => CommandKind::from_tag(tag)
                .ok_or_else(|| ValidationError::UnknownCommand(tag.to_string()))?,
            None => {
                let shown = obj.get("cmd").map(Value::to_string).unwrap_or_default();
                return Err(ValidationError::UnknownCommand(shown));
            }
        };

        if let Some(reason) = seq.check(kind) {
            return Err(ValidationError::SequenceViolation(reason));
        }

        match kind {
            CommandKind::Arm => Ok(Command::Arm),
            CommandKind::Land => Ok(Command::Land),
            CommandKind::Disarm => Ok(Command::Disarm),

            CommandKind::Takeoff => {
                let alt = require_finite(obj, "alt", "takeoff")?;
                self.check_altitude("takeoff", alt)?;
                Ok(Command::Takeoff { alt })
            }

            CommandKind::Goto => {
                let lat = require_finite(obj, "lat", "goto")?;
                let lon = require_finite(obj, "lon", "goto")?;
                let alt = require_finite(obj, "alt", "goto")?;
                self.check_altitude("goto", alt)?;

                let dist = self.geofence.distance_from_center_m(lat, lon);
                if dist > self.geofence.radius_m() {
                    return Err(ValidationError::GeofenceViolation(format!(
                        "goto target {:.1}m outside geofence radius {}m",
                        dist,
                        self.geofence.radius_m()
                    )));
                }

                Ok(Command::Goto { lat, lon, alt })
            }
        }
    }

    fn check_altitude(&self, cmd: &str, alt: f64) -> Result<(), ValidationError> {
        if !self.geofence.altitude_within(alt) {
            return Err(ValidationError::ParameterRange(format!(
                "{cmd}.alt {alt}m outside [{}, {}]m",
                self.geofence.min_altitude_m(),
                self.geofence.max_altitude_m()
            )));
        }
        Ok(())
    }
}

fn require_finite(
    obj: &Map<String, Value>,
    field: &str,
    cmd: &str,
) -> Result<f64, ValidationError> {
    let value = obj
        .get(field)
        .ok_or_else(|| ValidationError::ParameterRange(format!("{cmd} missing field '{field}'")))?;
    finite_f64(value)
        .ok_or_else(|| ValidationError::ParameterRange(format!("{cmd}.{field} must be a finite number")))
}

/// Numeric and finite; other JSON types are never coerced
fn finite_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|f| f.is_finite())
}

//! Gateway configuration, loaded from a TOML file.
//!
//! Endpoint sections fall back to development defaults; the geofence
//! section is required in full and its invariants are checked before any
//! pipeline activity starts.

use serde::Deserialize;
use skygate_shared::{Geofence, GeofenceError};
use std::path::Path;
use thiserror::Error;

/// Fatal startup errors from the configuration layer
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid geofence: {0}")]
    Geofence(#[from] GeofenceError),
}

/// MQTT connection details and the command topic to subscribe to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub topic: String,
    pub keepalive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".into(),
            port: 1888,
            topic: "mission/drone/1/command".into(),
            keepalive_secs: 30,
        }
    }
}

/// Destination for forwarded commands
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5001,
        }
    }
}

/// Geofence bounds as written in the config file.
///
/// Every key is required; a missing key is a parse error and an invariant
/// violation surfaces when the [`Geofence`] value is built.
#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: f64,
    pub max_altitude_m: f64,
    pub min_altitude_m: f64,
}

impl GeofenceConfig {
    pub fn build(&self) -> Result<Geofence, GeofenceError> {
        Geofence::new(
            self.center_lat,
            self.center_lon,
            self.radius_m,
            self.max_altitude_m,
            self.min_altitude_m,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub udp: UdpConfig,
    pub geofence: GeofenceConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        // Surface geofence invariant violations before startup continues
        config.geofence.build()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [mqtt]
            broker = "broker.local"
            port = 1883
            topic = "mission/drone/7/command"
            keepalive_secs = 60

            [udp]
            host = "10.0.0.2"
            port = 6001

            [geofence]
            center_lat = 47.0
            center_lon = 8.0
            radius_m = 500.0
            max_altitude_m = 50.0
            min_altitude_m = 0.0

            [log]
            level = "debug"
        "#;

        let config: Config = toml::from_str(raw).expect("parse failed");
        assert_eq!(config.mqtt.broker, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.udp.port, 6001);
        assert_eq!(config.log.level, "debug");
        assert!(config.geofence.build().is_ok());
    }

    #[test]
    fn test_endpoint_defaults() {
        let raw = r#"
            [geofence]
            center_lat = 0.0
            center_lon = 0.0
            radius_m = 100.0
            max_altitude_m = 50.0
            min_altitude_m = 0.0
        "#;

        let config: Config = toml::from_str(raw).expect("parse failed");
        assert_eq!(config.mqtt.broker, "localhost");
        assert_eq!(config.mqtt.port, 1888);
        assert_eq!(config.mqtt.topic, "mission/drone/1/command");
        assert_eq!(config.udp.host, "127.0.0.1");
        assert_eq!(config.udp.port, 5001);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_missing_geofence_key_is_fatal() {
        let raw = r#"
            [geofence]
            center_lat = 0.0
            center_lon = 0.0
            radius_m = 100.0
            max_altitude_m = 50.0
        "#;

        assert!(toml::from_str::<Config>(raw).is_err());
    }

    #[test]
    fn test_missing_geofence_section_is_fatal() {
        assert!(toml::from_str::<Config>("[mqtt]\nport = 1883\n").is_err());
    }

    #[test]
    fn test_inverted_altitude_band_is_fatal() {
        let raw = r#"
            [geofence]
            center_lat = 0.0
            center_lon = 0.0
            radius_m = 100.0
            max_altitude_m = 10.0
            min_altitude_m = 20.0
        "#;

        let config: Config = toml::from_str(raw).expect("parse failed");
        assert!(config.geofence.build().is_err());
    }
}

//! MQTT subscriber client (QoS 0) feeding the gateway pipeline

mod client;

pub use client::{MqttClient, MqttClientConfig, MqttEvent};

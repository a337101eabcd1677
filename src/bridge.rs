//! Pipeline orchestrator
//!
//! Drains subscriber events in order, routes each message through the
//! validator, applies accepted commands to the sequence state machine,
//! forwards the normalized command and keeps the metrics current. A
//! separate periodic task reports the counters; it never touches the
//! pipeline.

use crate::forward::Forwarder;
use crate::metrics::Metrics;
use crate::mqtt::MqttEvent;
use crate::validate::CommandValidator;
use serde_json::Value;
use skygate_shared::{now_ms, MissionPhase, SequenceStateMachine, WireCommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Interval between status lines
const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Wires the subscriber, validator, state machine, forwarder and metrics
/// into the per-message pipeline.
pub struct Bridge<F: Forwarder> {
    validator: CommandValidator,
    sequence: SequenceStateMachine,
    metrics: Arc<Metrics>,
    forwarder: F,
}

impl<F: Forwarder> Bridge<F> {
    pub fn new(validator: CommandValidator, metrics: Arc<Metrics>, forwarder: F) -> Self {
        Self {
            validator,
            sequence: SequenceStateMachine::new(),
            metrics,
            forwarder,
        }
    }

    /// Current mission phase
    pub fn phase(&self) -> MissionPhase {
        self.sequence.phase()
    }

    /// Drain subscriber events until the channel closes.
    ///
    /// The single consumer here is what keeps message handling in
    /// delivery order; no parallel fan-out happens in front of the
    /// sequence state machine or the forwarder.
    pub async fn run(&mut self, mut events: mpsc::Receiver<MqttEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                MqttEvent::Connected => {
                    info!("Subscriber session established");
                }
                MqttEvent::Disconnected { reason } => {
                    self.metrics.incr_reconnects();
                    warn!("Unexpected MQTT disconnect ({}). Will auto-reconnect.", reason);
                }
                MqttEvent::Message { topic, payload } => {
                    debug!("MQTT message on {}: {} bytes", topic, payload.len());
                    self.handle_message(&payload).await;
                }
            }
        }
    }

    /// Per-message pipeline: parse, validate, apply, timestamp, forward
    pub async fn handle_message(&mut self, raw: &[u8]) {
        self.metrics.incr_recv();

        let payload: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(e) => {
                self.metrics.incr_invalid();
                self.metrics.incr_errors();
                error!("Malformed JSON: {}", e);
                return;
            }
        };

        let command = match self.validator.validate(&payload, &self.sequence) {
            Ok(command) => command,
            Err(e) => {
                self.metrics.incr_invalid();
                warn!(
                    "Invalid command: {} - {}",
                    payload.get("cmd").map(|v| v.to_string()).unwrap_or_default(),
                    e
                );
                return;
            }
        };

        // The mission phase advances before the send is attempted; a
        // failed send is counted but does not roll the phase back.
        self.sequence.apply(command.kind());

        let wire = WireCommand::new(&command, now_ms());
        let data = match serde_json::to_vec(&wire) {
            Ok(data) => data,
            Err(e) => {
                self.metrics.incr_errors();
                error!("Failed to encode outbound command: {}", e);
                return;
            }
        };

        match self.forwarder.send(&data).await {
            Ok(()) => {
                self.metrics.incr_valid();
                self.metrics.incr_sent();
                info!(
                    "Forwarded to {}: {} {}",
                    self.forwarder.destination(),
                    wire.cmd,
                    wire.params
                );
            }
            Err(e) => {
                self.metrics.incr_errors();
                error!("UDP send failed: {}", e);
            }
        }
    }
}

/// Spawn the periodic status reporter. Purely observational: it reads
/// the metrics and writes one line to stdout per interval.
pub fn spawn_status_reporter(metrics: Arc<Metrics>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(STATUS_INTERVAL);
        ticker.tick().await; // First tick completes immediately

        loop {
            ticker.tick().await;
            println!("[{}] Status: {}", now_ms(), metrics.snapshot());
        }
    })
}

mod bridge;
mod config;
mod forward;
mod metrics;
mod mqtt;
mod validate;

use anyhow::{Context, Result};
use bridge::Bridge;
use config::Config;
use forward::UdpForwarder;
use metrics::Metrics;
use mqtt::{MqttClient, MqttClientConfig};
use std::sync::Arc;
use std::time::Duration;
use validate::CommandValidator;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: skygate <config.toml>")?;
    let config =
        Config::load(&path).with_context(|| format!("failed to load config '{}'", path))?;

    // Initialize tracing; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone())),
        )
        .init();

    let geofence = config.geofence.build()?;

    info!(
        "Starting gateway ... UDP -> {}:{} | MQTT topic={}",
        config.udp.host, config.udp.port, config.mqtt.topic
    );

    let forwarder = UdpForwarder::bind(&config.udp.host, config.udp.port)
        .await
        .context("failed to open UDP forwarding socket")?;

    let metrics = Arc::new(Metrics::new());
    let reporter = bridge::spawn_status_reporter(metrics.clone());

    let (client, events) = MqttClient::start(MqttClientConfig {
        broker: config.mqtt.broker.clone(),
        port: config.mqtt.port,
        topic: config.mqtt.topic.clone(),
        keepalive: Duration::from_secs(config.mqtt.keepalive_secs as u64),
        ..Default::default()
    });

    let mut bridge = Bridge::new(CommandValidator::new(geofence), metrics.clone(), forwarder);

    tokio::select! {
        _ = bridge.run(events) => {
            // The subscriber channel only closes when the client dies
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, shutting down ...");
        }
    }

    // Stop ingestion first, then the reporter; handles drop with main
    client.shutdown().await;
    reporter.abort();
    info!("Gateway stopped.");

    Ok(())
}

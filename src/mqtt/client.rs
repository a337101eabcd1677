//! MQTT subscriber with a persistent connection and automatic reconnection
//!
//! A background task owns the TCP session: CONNECT/CONNACK handshake,
//! topic subscription, keepalive pings and packet reads. Session loss is
//! reported as an event and healed with exponential backoff; the consumer
//! never sees the transport.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use skygate_shared::codec::{self, Packet, PacketDecoder};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

/// Events emitted by the subscriber client
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// Session established and the command topic subscribed
    Connected,
    /// Session lost unexpectedly; the client reconnects with backoff
    Disconnected { reason: String },
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: Bytes },
}

/// Configuration for the subscriber client
#[derive(Debug, Clone)]
pub struct MqttClientConfig {
    /// Broker host
    pub broker: String,
    /// Broker port
    pub port: u16,
    /// Command topic to subscribe to on every (re)connect
    pub topic: String,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Keepalive interval (PINGREQ cadence)
    pub keepalive: Duration,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection and handshake timeout
    pub connect_timeout: Duration,
}

impl Default for MqttClientConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".into(),
            port: 1888,
            topic: "mission/drone/1/command".into(),
            client_id: format!("skygate-{}", std::process::id()),
            keepalive: Duration::from_secs(30),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to the background subscriber task
pub struct MqttClient {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl MqttClient {
    /// Start the client; events arrive on the returned receiver
    pub fn start(config: MqttClientConfig) -> (Self, mpsc::Receiver<MqttEvent>) {
        let (event_tx, event_rx) = mpsc::channel::<MqttEvent>(100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            connection_loop(config, event_tx, shutdown_rx).await;
        });

        (Self { shutdown_tx, task }, event_rx)
    }

    /// Disconnect gracefully and stop the background task, time-bounded
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = timeout(Duration::from_secs(2), self.task).await;
    }
}

/// Main connection loop with reconnection logic
async fn connection_loop(
    config: MqttClientConfig,
    event_tx: mpsc::Sender<MqttEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let addr = format!("{}:{}", config.broker, config.port);
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay; // Reset delay

                match run_session(stream, &config, &event_tx, &mut shutdown_rx).await {
                    Ok(()) => break, // Clean shutdown
                    Err(reason) => {
                        let _ = event_tx
                            .send(MqttEvent::Disconnected {
                                reason: reason.to_string(),
                            })
                            .await;
                    }
                }
            }
            Ok(Err(e)) => {
                warn!("MQTT connect to {} failed: {}", addr, e);
            }
            Err(_) => {
                warn!("MQTT connect to {} timed out", addr);
            }
        }

        // Wait before reconnecting, unless shutdown arrives first
        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }

        // Exponential backoff
        reconnect_delay = std::cmp::min(reconnect_delay * 2, config.max_reconnect_delay);
    }

    debug!("MQTT connection loop stopped");
}

/// Drive one session to completion.
///
/// Returns `Ok(())` only on clean shutdown; any session failure comes
/// back as the disconnect reason.
async fn run_session(
    stream: TcpStream,
    config: &MqttClientConfig,
    event_tx: &mpsc::Sender<MqttEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = PacketDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    // CONNECT / CONNACK handshake
    let connect = Packet::Connect {
        client_id: config.client_id.clone(),
        keepalive_secs: config.keepalive.as_secs().min(u16::MAX as u64) as u16,
    };
    writer.write_all(&codec::encode(&connect)?).await?;

    let connack = timeout(
        config.connect_timeout,
        read_packet(&mut reader, &mut decoder, &mut read_buf),
    )
    .await
    .map_err(|_| anyhow!("CONNACK timed out"))??;
    match connack {
        Packet::Connack { return_code: 0, .. } => {}
        Packet::Connack { return_code, .. } => {
            return Err(anyhow!("broker refused connection (rc={})", return_code));
        }
        other => return Err(anyhow!("expected CONNACK, got {:?}", other)),
    }
    info!("Connected to MQTT {}:{}", config.broker, config.port);

    // SUBSCRIBE / SUBACK for the command topic
    let subscribe = Packet::Subscribe {
        packet_id: 1,
        topic: config.topic.clone(),
    };
    writer.write_all(&codec::encode(&subscribe)?).await?;

    let suback = timeout(
        config.connect_timeout,
        read_packet(&mut reader, &mut decoder, &mut read_buf),
    )
    .await
    .map_err(|_| anyhow!("SUBACK timed out"))??;
    match suback {
        // Granted QoS 0-2; 0x80 is the broker's failure code
        Packet::Suback { return_code, .. } if return_code <= 2 => {}
        Packet::Suback { return_code, .. } => {
            return Err(anyhow!("subscription refused (rc=0x{:02x})", return_code));
        }
        other => return Err(anyhow!("expected SUBACK, got {:?}", other)),
    }
    info!("Subscribed to topic: {}", config.topic);

    let _ = event_tx.send(MqttEvent::Connected).await;

    let mut keepalive = interval(config.keepalive);
    keepalive.tick().await; // First tick completes immediately

    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                writer.write_all(&codec::encode(&Packet::Pingreq)?).await?;
            }

            result = reader.read(&mut read_buf) => {
                match result {
                    Ok(0) => return Err(anyhow!("broker closed connection")),
                    Ok(n) => {
                        decoder.extend(&read_buf[..n]);
                        while let Some(packet) = decoder.decode_next()? {
                            handle_packet(packet, event_tx).await;
                        }
                    }
                    Err(e) => return Err(anyhow!("read error: {}", e)),
                }
            }

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    // Best-effort DISCONNECT; the session is over either way
                    let _ = writer.write_all(&codec::encode(&Packet::Disconnect)?).await;
                    return Ok(());
                }
            }
        }
    }
}

/// Read until one complete packet is decoded
async fn read_packet(
    reader: &mut OwnedReadHalf,
    decoder: &mut PacketDecoder,
    read_buf: &mut [u8],
) -> Result<Packet> {
    loop {
        if let Some(packet) = decoder.decode_next()? {
            return Ok(packet);
        }
        let n = reader.read(read_buf).await?;
        if n == 0 {
            return Err(anyhow!("broker closed connection"));
        }
        decoder.extend(&read_buf[..n]);
    }
}

async fn handle_packet(packet: Packet, event_tx: &mpsc::Sender<MqttEvent>) {
    match packet {
        Packet::Publish { topic, payload } => {
            let _ = event_tx.send(MqttEvent::Message { topic, payload }).await;
        }
        Packet::Pingresp => debug!("PINGRESP"),
        other => debug!("Ignoring packet: {:?}", other),
    }
}

//! Forwarder seam for the outbound datagram transport

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::UdpSocket;

/// Best-effort sender for normalized commands.
///
/// No retry, no delivery acknowledgment; a failed send is reported to
/// the caller and the datagram is lost.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Send one datagram
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Destination description for logging
    fn destination(&self) -> String;
}

#[async_trait]
impl<F: Forwarder + ?Sized> Forwarder for Arc<F> {
    async fn send(&self, data: &[u8]) -> Result<()> {
        (**self).send(data).await
    }

    fn destination(&self) -> String {
        (**self).destination()
    }
}

/// UDP datagram forwarder
pub struct UdpForwarder {
    socket: UdpSocket,
    target: String,
}

impl UdpForwarder {
    /// Bind a local socket for sending to `host:port`
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            socket,
            target: format!("{}:{}", host, port),
        })
    }
}

#[async_trait]
impl Forwarder for UdpForwarder {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.socket.send_to(data, &self.target).await?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.target.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_forwarder_delivers() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
        let port = receiver.local_addr().expect("no local addr").port();

        let forwarder = UdpForwarder::bind("127.0.0.1", port).await.expect("bind failed");
        forwarder.send(b"{\"cmd\":\"arm\"}").await.expect("send failed");

        let mut buf = [0u8; 64];
        let (n, _) = receiver.recv_from(&mut buf).await.expect("recv failed");
        assert_eq!(&buf[..n], b"{\"cmd\":\"arm\"}");
        assert_eq!(forwarder.destination(), format!("127.0.0.1:{port}"));
    }
}

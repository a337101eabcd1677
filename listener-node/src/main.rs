//! Simulated drone UDP receiver: prints each incoming datagram with a
//! timestamp and, with `--ack`, replies `{"ack":true}` to the sender.

use skygate_shared::now_ms;
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut bind = "0.0.0.0:5001".to_string();
    let mut ack = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--ack" => ack = true,
            other => bind = other.to_string(),
        }
    }

    let socket = UdpSocket::bind(&bind).await?;
    println!("[listener-node] Listening on {}", bind);

    let mut buf = vec![0u8; 65535];
    loop {
        let (n, addr) = socket.recv_from(&mut buf).await?;
        println!(
            "[{}] From {}: {}",
            now_ms(),
            addr,
            String::from_utf8_lossy(&buf[..n])
        );
        if ack {
            socket.send_to(b"{\"ack\":true}", addr).await?;
        }
    }
}

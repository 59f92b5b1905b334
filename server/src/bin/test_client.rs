//! Manual probe: pings a server, joins, clicks a few cells and leaves.

use shared::{decode, encode, encode_keep_alive, Frame, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    server: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("-> {:?}", packet);
    socket.send_to(&encode(packet)?, server).await?;
    Ok(())
}

/// Prints everything that arrives within `window`.
async fn drain(socket: &UdpSocket, buf: &mut [u8], window: Duration) {
    while let Ok(Ok((len, _))) = timeout(window, socket.recv_from(buf)).await {
        match decode(&buf[..len]) {
            Ok(Frame::KeepAlive) => println!("<- KeepAlive"),
            Ok(Frame::Packet(packet)) => println!("<- {:?}", packet),
            Err(e) => println!("<- undecodable datagram: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:4000".to_string())
        .parse()?;
    let name = std::env::args().nth(2).unwrap_or_else(|| "Probe".to_string());

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Probe socket bound to {}", socket.local_addr()?);
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    send(&socket, &Packet::Ping, server).await?;
    drain(&socket, &mut buf, Duration::from_millis(500)).await;

    send(&socket, &Packet::Join { name }, server).await?;
    drain(&socket, &mut buf, Duration::from_millis(500)).await;

    for i in 0..5 {
        send(&socket, &Packet::Click { x: i, y: i }, server).await?;
        socket.send_to(&encode_keep_alive(), server).await?;
        drain(&socket, &mut buf, Duration::from_millis(200)).await;
        sleep(Duration::from_millis(300)).await;
    }

    send(&socket, &Packet::Leave, server).await?;
    drain(&socket, &mut buf, Duration::from_millis(500)).await;
    Ok(())
}

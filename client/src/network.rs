use crate::game::ClientGameState;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{decode, encode, encode_keep_alive, Frame, Packet, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, timeout, Instant, Interval};

/// How often a keep-alive is sent while joined.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Server silence after which the client gives up.
pub const SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// What a server reported in reply to a ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub addr: SocketAddr,
    pub version: u32,
    pub name: String,
    pub players: u32,
    pub max_players: u32,
    pub latency: Duration,
}

/// Pings `server` and waits up to `wait` for its `Pong`.
pub async fn discover(
    server: SocketAddr,
    wait: Duration,
) -> Result<ServerInfo, Box<dyn std::error::Error>> {
    let socket = UdpSocket::bind(local_bind_addr(server)).await?;
    let sent_at = Instant::now();
    socket.send_to(&encode(&Packet::Ping)?, server).await?;

    let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
    let deadline = sent_at + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (len, from) = timeout(remaining, socket.recv_from(&mut buffer))
            .await
            .map_err(|_| format!("no reply from {} within {:?}", server, wait))??;
        if from != server {
            continue;
        }
        if let Ok(Frame::Packet(Packet::Pong {
            version,
            server_name,
            players,
            max_players,
        })) = decode(&buffer[..len])
        {
            return Ok(ServerInfo {
                addr: server,
                version,
                name: server_name,
                players,
                max_players,
                latency: sent_at.elapsed(),
            });
        }
    }
}

fn local_bind_addr(server: SocketAddr) -> &'static str {
    if server.is_ipv6() {
        "[::]:0"
    } else {
        "0.0.0.0:0"
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Headless client: joins, keeps the session alive and optionally plays.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    click_interval: Option<Duration>,
    server_timeout: Duration,
    last_heard: Instant,
    rng: StdRng,

    pub game_state: ClientGameState,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: impl Into<String>,
        click_interval: Option<Duration>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let socket = UdpSocket::bind(local_bind_addr(server_addr)).await?;

        Ok(Client {
            socket,
            server_addr,
            name: name.into(),
            click_interval,
            server_timeout: SERVER_TIMEOUT,
            last_heard: Instant::now(),
            rng: StdRng::from_entropy(),
            game_state: ClientGameState::new(),
        })
    }

    pub fn with_server_timeout(mut self, server_timeout: Duration) -> Self {
        self.server_timeout = server_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.socket.local_addr()?)
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_datagram(&mut self, datagram: &[u8]) {
        self.last_heard = Instant::now();
        match decode(datagram) {
            Ok(Frame::KeepAlive) => {}
            Ok(Frame::Packet(packet)) => {
                if !self.game_state.apply(&packet) {
                    debug!("Ignoring {} packet", packet.kind());
                }
            }
            Err(e) => warn!("Dropping datagram from server: {}", e),
        }
    }

    /// Claims a random unclaimed cell and wiggles the cursor over it.
    async fn play_turn(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.game_state.can_click() {
            return Ok(());
        }
        let Some(cell) = self.game_state.unclaimed_cells().choose(&mut self.rng).copied() else {
            return Ok(());
        };

        if let Some(board) = self.game_state.board.as_ref() {
            let jitter: f32 = self.rng.gen_range(0.0..0.5);
            let x = ((cell.x as f32 + 0.25 + jitter) / board.width() as f32).min(1.0);
            let y = ((cell.y as f32 + 0.25 + jitter) / board.height() as f32).min(1.0);
            self.send_packet(&Packet::CursorMove { x, y }).await?;
        }
        self.send_packet(&Packet::Click {
            x: cell.x,
            y: cell.y,
        })
        .await
    }

    /// Joins the server and runs until kicked, timed out or interrupted.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Joining {} as {}", self.server_addr, self.name);
        self.send_packet(&Packet::Join {
            name: self.name.clone(),
        })
        .await?;
        self.last_heard = Instant::now();

        let mut keep_alive = interval(KEEP_ALIVE_INTERVAL);
        let mut clicks = self.click_interval.map(interval);
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) if from == self.server_addr => {
                            self.handle_datagram(&buffer[..len]);
                            if self.game_state.kicked.is_some() {
                                break;
                            }
                        }
                        Ok((_, from)) => debug!("Ignoring datagram from {}", from),
                        Err(e) => error!("Error receiving datagram: {}", e),
                    }
                },

                _ = keep_alive.tick() => {
                    if self.last_heard.elapsed() > self.server_timeout {
                        warn!("Server stopped responding");
                        break;
                    }
                    self.socket.send_to(&encode_keep_alive(), self.server_addr).await?;
                },

                _ = next_tick(&mut clicks) => {
                    if let Err(e) = self.play_turn().await {
                        error!("Error sending click: {}", e);
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                },
            }
        }

        if self.game_state.kicked.is_none() {
            let _ = self.send_packet(&Packet::Leave).await;
        }

        Ok(())
    }
}

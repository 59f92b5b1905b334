//! Server network layer handling UDP communication and the actor loop

use crate::commands::{CommandRegistry, Issuer};
use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::error::ServerError;
use crate::scheduler::Scheduler;
use crate::stats::StatsManager;
use log::{debug, error, info, warn};
use shared::{decode, encode, encode_keep_alive, DecodeError, Frame, Packet, MAX_DATAGRAM_SIZE};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Capacity of each sender worker's queue.
const SENDER_QUEUE_SIZE: usize = 256;

/// Messages sent to the actor loop
#[derive(Debug)]
pub enum ServerMessage {
    FrameReceived {
        frame: Frame,
        addr: SocketAddr,
    },
    /// Runs a liveness sweep and signals `done` once it has finished.
    Sweep {
        done: oneshot::Sender<()>,
    },
    Console {
        line: String,
    },
    Shutdown,
}

/// Messages sent from the actor loop to the sender
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    KeepAlive { addr: SocketAddr },
}

/// Cloneable control handle for a running server.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    /// Asks the server to stop. Returns false if it has already stopped.
    pub fn shutdown(&self) -> bool {
        self.server_tx.send(ServerMessage::Shutdown).is_ok()
    }

    /// Feeds a console command line to the server.
    pub fn console(&self, line: impl Into<String>) -> bool {
        self.server_tx
            .send(ServerMessage::Console { line: line.into() })
            .is_ok()
    }
}

/// Game server bound to a UDP socket
pub struct Server {
    socket: Arc<UdpSocket>,
    context: ServerContext,
    scheduler: Scheduler,
    sweep_interval: Duration,
    sender_workers: usize,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
        stats: Box<dyn StatsManager>,
    ) -> Result<Self, ServerError> {
        config.validate()?;

        let addr = config.bind_addr();
        let socket = UdpSocket::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("{} listening on {}", config.name, socket.local_addr()?);

        let commands = Arc::new(CommandRegistry::with_builtins()?);
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket: Arc::new(socket),
            sweep_interval: config.sweep_interval,
            sender_workers: config.sender_workers,
            context: ServerContext::new(config, stats, commands, game_tx),
            scheduler: Scheduler::new(),
            server_tx,
            server_rx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                let received = tokio::select! {
                    result = socket.recv_from(&mut buffer) => result,
                    _ = server_tx.closed() => {
                        debug!("Main loop closed, receiver stopping");
                        break;
                    }
                };

                match received {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(frame) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::FrameReceived { frame, addr })
                            {
                                error!("Failed to send frame to main loop: {}", e);
                                break;
                            }
                        }
                        Err(DecodeError::UnknownPacketType(name)) => {
                            info!("Unknown packet type {:?} from {}", name, addr);
                        }
                        Err(e) => {
                            warn!("Dropping datagram from {}: {}", addr, e);
                        }
                    },
                    Err(e) if is_transient(&e) => {
                        warn!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    Err(e) => {
                        error!("Socket receive failed, receiver stopping: {}", e);
                        break;
                    }
                }
            }
        })
    }

    /// Spawns the sender dispatcher and its worker pool
    ///
    /// Datagrams for one address always go to the same worker, so they leave
    /// in the order they were queued. The dispatcher finishes once every
    /// worker has drained its queue.
    fn spawn_network_sender(&mut self) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let worker_count = self.sender_workers.max(1);
        let mut game_rx = match self.game_rx.take() {
            Some(rx) => rx,
            None => mpsc::unbounded_channel().1,
        };

        tokio::spawn(async move {
            let mut queues = Vec::with_capacity(worker_count);
            let mut workers = Vec::with_capacity(worker_count);
            for _ in 0..worker_count {
                let (tx, rx) = mpsc::channel(SENDER_QUEUE_SIZE);
                queues.push(tx);
                workers.push(Self::spawn_sender_worker(Arc::clone(&socket), rx));
            }

            while let Some(message) = game_rx.recv().await {
                let (addr, datagram) = match message {
                    GameMessage::SendPacket { packet, addr } => match encode(&packet) {
                        Ok(datagram) => (addr, datagram),
                        Err(e) => {
                            warn!("Failed to encode packet for {}: {}", addr, e);
                            continue;
                        }
                    },
                    GameMessage::KeepAlive { addr } => (addr, encode_keep_alive()),
                };

                let queue = &queues[shard_for(addr, worker_count)];
                if let Err(e) = queue.send((addr, datagram)).await {
                    error!("Sender worker stopped: {}", e);
                    break;
                }
            }

            drop(queues);
            for worker in workers {
                let _ = worker.await;
            }
        })
    }

    fn spawn_sender_worker(
        socket: Arc<UdpSocket>,
        mut rx: mpsc::Receiver<(SocketAddr, Vec<u8>)>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some((addr, datagram)) = rx.recv().await {
                if let Err(e) = socket.send_to(&datagram, addr).await {
                    debug!("Failed to send to {}: {}", addr, e);
                }
            }
        })
    }

    /// Schedules the liveness sweep with a fixed delay between runs
    fn spawn_sweeper(&mut self) {
        let server_tx = self.server_tx.clone();

        self.scheduler.add_task(self.sweep_interval, move || {
            let server_tx = server_tx.clone();
            async move {
                let (done, finished) = oneshot::channel();
                if server_tx.send(ServerMessage::Sweep { done }).is_err() {
                    return false;
                }
                finished.await.is_ok()
            }
        });
    }

    /// Main server loop. Returns once a shutdown has been requested.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let receiver = self.spawn_network_receiver();
        let sender = self.spawn_network_sender();
        self.spawn_sweeper();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::FrameReceived { frame, addr } => {
                    self.context.handle_frame(frame, addr, Instant::now());
                }
                ServerMessage::Sweep { done } => {
                    let removed = self.context.sweep(Instant::now());
                    if removed > 0 {
                        debug!("Sweep removed {} session(s)", removed);
                    }
                    let _ = done.send(());
                }
                ServerMessage::Console { line } => {
                    let reply = self.context.run_command(Issuer::Console, &line);
                    info!("{}", reply);
                }
                ServerMessage::Shutdown => break,
            }
        }

        info!("Server shutting down");
        self.scheduler.shutdown();

        // Closing the actor channel also stops the receiver.
        self.server_rx.close();
        let mut context = self.context;
        context.shutdown();
        drop(context);

        if let Err(e) = sender.await {
            error!("Sender task failed: {}", e);
        }
        if let Err(e) = receiver.await {
            error!("Receiver task failed: {}", e);
        }
        Ok(())
    }
}

/// Receive errors worth retrying. ICMP port-unreachable replies surface as
/// resets or refusals on some platforms.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Picks the sender worker for a destination address.
pub fn shard_for(addr: SocketAddr, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    addr.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

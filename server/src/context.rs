//! Server state owned by the actor loop.
//!
//! `ServerContext` holds the session table, the match state, the stats hook
//! and the command registry. Every incoming frame, sweep and console line is
//! handled here, one at a time, and ends with a flush that hands queued
//! packets to the sender.

use crate::client_manager::ClientManager;
use crate::commands::{CommandRegistry, Issuer};
use crate::config::ServerConfig;
use crate::error::ConfigError;
use crate::game::{Dispatch, Game, MatchSummary};
use crate::network::GameMessage;
use crate::stats::StatsManager;
use log::{debug, error, info, warn};
use shared::{Cell, Frame, Packet, PlayerInfo, MAX_TEXT_LEN, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Left,
    TimedOut,
    Kicked(String),
    ServerClosed,
}

impl DisconnectReason {
    pub fn message(&self) -> String {
        match self {
            DisconnectReason::Left => "left the game".to_string(),
            DisconnectReason::TimedOut => "timed out".to_string(),
            DisconnectReason::Kicked(reason) => truncate_text(reason.clone()),
            DisconnectReason::ServerClosed => "Server closed".to_string(),
        }
    }

    /// Whether the removed address is told with a `Kick`.
    fn notifies_client(&self) -> bool {
        !matches!(self, DisconnectReason::Left)
    }
}

pub struct ServerContext {
    pub config: ServerConfig,
    pub clients: ClientManager,
    pub game: Game,
    stats: Box<dyn StatsManager>,
    commands: Arc<CommandRegistry>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ServerContext {
    pub fn new(
        config: ServerConfig,
        stats: Box<dyn StatsManager>,
        commands: Arc<CommandRegistry>,
        game_tx: mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        Self {
            clients: ClientManager::new(config.max_players),
            game: Game::new(config.board_size, config.min_players),
            config,
            stats,
            commands,
            game_tx,
        }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Handles one decoded datagram from `addr`.
    pub fn handle_frame(&mut self, frame: Frame, addr: SocketAddr, now: Instant) {
        match frame {
            Frame::KeepAlive => {
                self.clients.touch(addr, now);
                self.send_keep_alive(addr);
            }
            Frame::Packet(packet) => self.handle_packet(packet, addr, now),
        }
        self.flush();
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr, now: Instant) {
        let bound = self.clients.touch(addr, now);

        match (packet, bound) {
            (Packet::Ping, _) => {
                let pong = self.pong();
                self.send_now(addr, pong);
            }
            (Packet::Join { name }, None) => self.handle_join(&name, addr, now),
            (Packet::Join { .. }, Some(player_id)) => {
                debug!("Ignoring Join from {}, already bound to player {}", addr, player_id);
            }
            (packet, None) => {
                debug!("Dropping {} from unknown address {}", packet.kind(), addr);
            }
            (Packet::Click { x, y }, Some(player_id)) => self.click(player_id, Cell::new(x, y)),
            (Packet::CursorMove { x, y }, Some(player_id)) => {
                self.game.move_cursor(player_id, x, y);
            }
            (Packet::Leave, Some(_)) => {
                self.disconnect(addr, DisconnectReason::Left);
            }
            (Packet::Command { line }, Some(player_id)) => {
                let reply = self.run_command(Issuer::Player(player_id), &line);
                debug!("Player {} ran {:?}: {}", player_id, line, reply);
            }
            (packet, Some(player_id)) => {
                debug!(
                    "Player {} sent unexpected {} packet",
                    player_id,
                    packet.kind()
                );
            }
        }
    }

    fn handle_join(&mut self, name: &str, addr: SocketAddr, now: Instant) {
        match self
            .clients
            .accept_join(name, addr, now, self.stats.as_mut())
        {
            Ok(player) => self.game.join(player),
            Err(rejection) => {
                info!("Rejected join {:?} from {}: {}", name, addr, rejection);
                self.send_now(
                    addr,
                    Packet::Kick {
                        reason: rejection.to_string(),
                    },
                );
            }
        }
    }

    fn click(&mut self, player_id: u32, cell: Cell) {
        let delta = self.game.click(player_id, cell);
        if delta.is_empty() {
            return;
        }
        debug!("Player {} captured {} cell(s)", player_id, delta.len());
        if self.game.board().map_or(false, |board| board.is_full()) {
            self.end_match();
        }
    }

    /// Removes the session at `addr` and tells everyone else.
    ///
    /// Returns false if no session was bound to `addr`.
    pub fn disconnect(&mut self, addr: SocketAddr, reason: DisconnectReason) -> bool {
        let removed = self.remove_session(addr, reason);
        if removed {
            self.persist_stats();
        }
        removed
    }

    fn remove_session(&mut self, addr: SocketAddr, reason: DisconnectReason) -> bool {
        let Some(session) = self.clients.remove(addr) else {
            return false;
        };
        let message = reason.message();
        info!(
            "Player {} ({}) disconnected: {}",
            session.player_id, session.name, message
        );

        if let Some(player) = self.game.leave(session.player_id, &message) {
            self.save_stats(&player);
        }
        if reason.notifies_client() {
            self.send_now(addr, Packet::Kick { reason: message });
        }
        true
    }

    /// Disconnects every session that has been silent for longer than the timeout.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.clients.timed_out(now, self.config.timeout);
        let removed = self.disconnect_each(expired, DisconnectReason::TimedOut);
        self.flush();
        removed
    }

    /// Disconnects each address in a snapshot, skipping any already removed.
    fn disconnect_each(&mut self, addrs: Vec<SocketAddr>, reason: DisconnectReason) -> usize {
        let removed = addrs
            .into_iter()
            .filter(|addr| self.remove_session(*addr, reason.clone()))
            .count();
        if removed > 0 {
            self.persist_stats();
        }
        removed
    }

    /// Routes pending game dispatches into session queues, then drains the queues.
    pub fn flush(&mut self) {
        for dispatch in self.game.take_dispatches() {
            match dispatch {
                Dispatch::Reply { player_id, packet } => {
                    if !self.clients.send_later(player_id, packet) {
                        debug!("Dropping reply for departed player {}", player_id);
                    }
                }
                Dispatch::Broadcast { except, packet } => {
                    self.clients.broadcast_later(&packet, except);
                }
            }
        }

        for (addr, packet) in self.clients.drain_outbound() {
            self.send_now(addr, packet);
        }
    }

    /// Hands a packet straight to the sender, bypassing session queues.
    pub fn send_now(&self, addr: SocketAddr, packet: Packet) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for {}: {}", addr, e);
        }
    }

    fn send_keep_alive(&self, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::KeepAlive { addr }) {
            error!("Failed to queue keep-alive for {}: {}", addr, e);
        }
    }

    pub fn pong(&self) -> Packet {
        Packet::Pong {
            version: PROTOCOL_VERSION,
            server_name: self.config.name.clone(),
            players: self.clients.len() as u32,
            max_players: self.config.max_players as u32,
        }
    }

    pub fn start_match(&mut self) -> Result<bool, ConfigError> {
        self.game.start()
    }

    /// Ends the running match, saves everyone's stats and announces the result.
    pub fn end_match(&mut self) -> Option<MatchSummary> {
        let summary = self.game.stop()?;

        let players: Vec<PlayerInfo> = self.game.players().cloned().collect();
        for player in &players {
            self.save_stats(player);
        }
        self.persist_stats();

        let text = match summary
            .winner
            .and_then(|id| self.game.player(id))
            .map(|player| (player.name.clone(), summary.scores.get(&player.id)))
        {
            Some((name, Some(score))) => format!("{} won with {} cells!", name, score),
            _ => "The game ended in a draw.".to_string(),
        };
        info!("{}", text);
        self.clients.broadcast_later(&Packet::Message { text }, None);

        Some(summary)
    }

    /// Runs a command line and returns the reply text.
    ///
    /// Players also get the reply as a `Message`.
    pub fn run_command(&mut self, issuer: Issuer, line: &str) -> String {
        let registry = Arc::clone(&self.commands);
        let reply = match registry.dispatch(self, issuer, line) {
            Ok(reply) => reply,
            Err(e) => e.to_string(),
        };
        let reply = truncate_text(reply);

        if let Issuer::Player(player_id) = issuer {
            if let Some(addr) = self.clients.addr_of(player_id) {
                self.send_now(
                    addr,
                    Packet::Message {
                        text: reply.clone(),
                    },
                );
            }
        }
        self.flush();
        reply
    }

    /// Kicks every session and flushes stats.
    pub fn shutdown(&mut self) {
        let addrs = self.clients.session_addrs();
        self.disconnect_each(addrs, DisconnectReason::ServerClosed);
        self.flush();
        self.persist_stats();
    }

    fn persist_stats(&mut self) {
        if let Err(e) = self.stats.flush() {
            warn!("Failed to flush stats: {}", e);
        }
    }

    fn save_stats(&mut self, player: &PlayerInfo) {
        if let Err(e) = self.stats.save(&player.name, &player.stats) {
            warn!("Failed to save stats for {}: {}", player.name, e);
        }
    }
}

fn truncate_text(mut text: String) -> String {
    if text.len() > MAX_TEXT_LEN {
        let mut end = MAX_TEXT_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

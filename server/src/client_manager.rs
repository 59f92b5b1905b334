//! Session tracking for connected players.
//!
//! This module owns the server-side view of who is connected:
//! - Session lifecycle (join, leave, timeout)
//! - Name validation and disambiguation on join
//! - Per-session outbound queues drained by the network layer
//!
//! A session is keyed by the remote address it joined from. Everything here
//! runs on the server actor, so no locking is involved.

use crate::stats::StatsManager;
use log::info;
use shared::{validate_name, Color, NameError, Packet, PlayerInfo, MAX_NAME_LEN};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Live binding between a network address and a player identity
#[derive(Debug)]
pub struct Session {
    pub player_id: u32,
    pub name: String,
    /// Address the session joined from; never changes
    pub addr: SocketAddr,
    /// Last time any datagram arrived from this address, keep-alives included
    pub last_packet_received: Instant,
    outbound: VecDeque<Packet>,
}

impl Session {
    pub fn new(player_id: u32, name: String, addr: SocketAddr, now: Instant) -> Self {
        Self {
            player_id,
            name,
            addr,
            last_packet_received: now,
            outbound: VecDeque::new(),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_packet_received = now;
    }

    /// True once the session has been silent for strictly longer than `timeout`.
    pub fn is_timed_out(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_packet_received) > timeout
    }

    /// Queues a packet for the next drain step.
    pub fn send_later(&mut self, packet: Packet) {
        self.outbound.push_back(packet);
    }

    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    fn drain(&mut self) -> impl Iterator<Item = Packet> + '_ {
        self.outbound.drain(..)
    }
}

/// Why a join request was refused. The message is sent back in a `Kick`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinRejection {
    #[error("The server is not accepting new players right now.")]
    JoinsDisabled,
    #[error("The server is full.")]
    ServerFull,
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error("That name is already taken.")]
    NameUnavailable,
}

/// Registry of active sessions
///
/// Enforces the player limit, hands out monotonically increasing player ids
/// and keeps names unique among active sessions.
pub struct ClientManager {
    sessions: HashMap<SocketAddr, Session>,
    by_player: HashMap<u32, SocketAddr>,
    next_player_id: u32,
    max_players: usize,
    accepting: bool,
}

impl ClientManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            by_player: HashMap::new(),
            next_player_id: 0,
            max_players,
            accepting: true,
        }
    }

    pub fn resolve(&self, addr: SocketAddr) -> Option<&Session> {
        self.sessions.get(&addr)
    }

    pub fn resolve_mut(&mut self, addr: SocketAddr) -> Option<&mut Session> {
        self.sessions.get_mut(&addr)
    }

    pub fn addr_of(&self, player_id: u32) -> Option<SocketAddr> {
        self.by_player.get(&player_id).copied()
    }

    /// Looks a session up by player name, ignoring ASCII case
    pub fn find_by_name(&self, name: &str) -> Option<&Session> {
        self.sessions
            .values()
            .find(|session| session.name.eq_ignore_ascii_case(name))
    }

    /// Refreshes the liveness clock of the session at `addr`.
    ///
    /// Returns the bound player id, or None for an unknown address.
    pub fn touch(&mut self, addr: SocketAddr, now: Instant) -> Option<u32> {
        let session = self.sessions.get_mut(&addr)?;
        session.touch(now);
        Some(session.player_id)
    }

    /// Validates a join request and binds a new session to `addr`
    ///
    /// Checks run in order: joins enabled, capacity, name rules. A name that
    /// collides with an active one gets `_` appended until it is free; the
    /// loop gives up once the candidate reaches the maximum name length.
    /// Nothing is created when the request is rejected.
    pub fn accept_join(
        &mut self,
        name: &str,
        addr: SocketAddr,
        now: Instant,
        stats: &mut dyn StatsManager,
    ) -> Result<PlayerInfo, JoinRejection> {
        if !self.accepting {
            return Err(JoinRejection::JoinsDisabled);
        }
        if self.sessions.len() >= self.max_players {
            return Err(JoinRejection::ServerFull);
        }
        validate_name(name)?;
        let name = self
            .available_name(name)
            .ok_or(JoinRejection::NameUnavailable)?;

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        let player = PlayerInfo::new(
            player_id,
            name.clone(),
            Color::for_player(player_id),
            stats.load(&name),
        );

        info!("Player {} ({}) joined from {}", player_id, name, addr);
        self.sessions
            .insert(addr, Session::new(player_id, name, addr, now));
        self.by_player.insert(player_id, addr);

        Ok(player)
    }

    fn available_name(&self, requested: &str) -> Option<String> {
        let mut candidate = requested.to_string();
        while self.find_by_name(&candidate).is_some() {
            if candidate.chars().count() >= MAX_NAME_LEN {
                return None;
            }
            candidate.push('_');
        }
        Some(candidate)
    }

    /// Removes the session bound to `addr`, dropping anything still queued for it.
    pub fn remove(&mut self, addr: SocketAddr) -> Option<Session> {
        let session = self.sessions.remove(&addr)?;
        self.by_player.remove(&session.player_id);
        info!("Player {} ({}) removed", session.player_id, session.name);
        Some(session)
    }

    /// Snapshot of the addresses whose sessions have timed out.
    pub fn timed_out(&self, now: Instant, timeout: Duration) -> Vec<SocketAddr> {
        let mut expired: Vec<SocketAddr> = self
            .sessions
            .values()
            .filter(|session| session.is_timed_out(timeout, now))
            .map(|session| session.addr)
            .collect();
        expired.sort();
        expired
    }

    /// Queues a packet for one player. Returns false if they are not connected.
    pub fn send_later(&mut self, player_id: u32, packet: Packet) -> bool {
        let Some(addr) = self.by_player.get(&player_id) else {
            return false;
        };
        match self.sessions.get_mut(addr) {
            Some(session) => {
                session.send_later(packet);
                true
            }
            None => false,
        }
    }

    /// Queues a packet for every session, optionally skipping one player.
    pub fn broadcast_later(&mut self, packet: &Packet, except: Option<u32>) {
        for session in self.sessions.values_mut() {
            if Some(session.player_id) != except {
                session.send_later(packet.clone());
            }
        }
    }

    /// Takes every queued packet, in queue order per session.
    pub fn drain_outbound(&mut self) -> Vec<(SocketAddr, Packet)> {
        let mut drained = Vec::new();
        for session in self.sessions.values_mut() {
            let addr = session.addr;
            drained.extend(session.drain().map(|packet| (addr, packet)));
        }
        drained
    }

    pub fn session_addrs(&self) -> Vec<SocketAddr> {
        self.sessions.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn set_accepting(&mut self, accepting: bool) {
        self.accepting = accepting;
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }
}

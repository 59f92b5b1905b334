use crate::error::{check_board_size, ConfigError};
use log::{debug, info};
use shared::{Board, Cell, Packet, Phase, PlayerInfo};
use std::collections::{BTreeMap, BTreeSet};

/// Outgoing packet produced by a state transition, addressed by player id.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Reply { player_id: u32, packet: Packet },
    Broadcast { except: Option<u32>, packet: Packet },
}

/// Result of a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    /// Owned cells per roster member at the end of the match.
    pub scores: BTreeMap<u32, usize>,
    /// Unique highest non-zero score, if there is one.
    pub winner: Option<u32>,
}

/// Authoritative match state: phase, board lock, roster and board.
#[derive(Debug)]
pub struct Game {
    phase: Phase,
    board: Option<Board>,
    board_locked: bool,
    roster: BTreeMap<u32, PlayerInfo>,
    active: BTreeSet<u32>,
    min_players: Option<usize>,
    outbox: Vec<Dispatch>,
}

impl Game {
    pub fn new(board_size: Option<(u32, u32)>, min_players: Option<usize>) -> Self {
        Self {
            phase: Phase::Lobby,
            board: board_size.map(|(width, height)| Board::new(width, height)),
            board_locked: false,
            roster: BTreeMap::new(),
            active: BTreeSet::new(),
            min_players,
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.board_locked
    }

    pub fn player(&self, player_id: u32) -> Option<&PlayerInfo> {
        self.roster.get(&player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerInfo> {
        self.roster.values()
    }

    pub fn player_count(&self) -> usize {
        self.roster.len()
    }

    /// Whether the player may place cells in the current match.
    pub fn is_active(&self, player_id: u32) -> bool {
        self.active.contains(&player_id)
    }

    pub fn take_dispatches(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    fn reply(&mut self, player_id: u32, packet: Packet) {
        self.outbox.push(Dispatch::Reply { player_id, packet });
    }

    fn broadcast(&mut self, except: Option<u32>, packet: Packet) {
        self.outbox.push(Dispatch::Broadcast { except, packet });
    }

    fn phase_change(&self) -> Packet {
        Packet::PhaseChange {
            phase: self.phase,
            board_locked: self.board_locked,
        }
    }

    /// Adds a freshly accepted player and brings them up to date.
    ///
    /// A player joining a running, unlocked match plays right away; anyone
    /// else watches until the next start.
    pub fn join(&mut self, player: PlayerInfo) {
        let player_id = player.id;
        let spectator = !(self.phase == Phase::InGame && !self.board_locked);
        if !spectator {
            self.active.insert(player_id);
        }
        self.roster.insert(player_id, player.clone());

        let welcome = Packet::Welcome {
            player_id,
            players: self.roster.values().cloned().collect(),
            phase: self.phase,
            board_locked: self.board_locked,
            spectator,
            board: self.board.as_ref().map(|b| (b.width(), b.height())),
        };
        self.reply(player_id, welcome);

        let owned = self
            .board
            .as_ref()
            .map(|board| board.cells_by_owner())
            .unwrap_or_default();
        for (owner, cells) in owned {
            for packet in Packet::board_updates(owner, &cells) {
                self.reply(player_id, packet);
            }
        }

        self.broadcast(Some(player_id), Packet::PlayerJoined { player });

        let threshold_reached = self
            .min_players
            .map_or(false, |min| self.roster.len() >= min);
        if self.phase == Phase::Lobby && threshold_reached && self.board.is_some() {
            info!("Player threshold reached, starting the match");
            if let Err(e) = self.start() {
                debug!("Automatic start failed: {}", e);
            }
        }
    }

    /// Removes a player from the roster. Their cells keep their owner.
    pub fn leave(&mut self, player_id: u32, reason: &str) -> Option<PlayerInfo> {
        let player = self.roster.remove(&player_id)?;
        self.active.remove(&player_id);
        self.broadcast(
            None,
            Packet::PlayerLeft {
                player_id,
                reason: reason.to_string(),
            },
        );
        Some(player)
    }

    /// Lobby to InGame. Returns Ok(false) if a match is already running.
    ///
    /// A board left full by the previous match is cleared first.
    pub fn start(&mut self) -> Result<bool, ConfigError> {
        if self.phase == Phase::InGame {
            return Ok(false);
        }
        let board = self.board.as_mut().ok_or(ConfigError::BoardNotConfigured)?;
        if board.is_full() {
            board.clear();
            let reset = Packet::BoardReset {
                width: board.width(),
                height: board.height(),
            };
            self.broadcast(None, reset);
        }

        self.phase = Phase::InGame;
        self.board_locked = false;
        self.active = self.roster.keys().copied().collect();
        info!("Match started with {} player(s)", self.active.len());

        let change = self.phase_change();
        self.broadcast(None, change);
        Ok(true)
    }

    /// InGame to Lobby. Scores the board and records stats on every roster member.
    pub fn stop(&mut self) -> Option<MatchSummary> {
        if self.phase == Phase::Lobby {
            return None;
        }
        self.phase = Phase::Lobby;
        self.active.clear();

        let owned = self
            .board
            .as_ref()
            .map(|board| board.scores())
            .unwrap_or_default();
        let scores: BTreeMap<u32, usize> = self
            .roster
            .keys()
            .map(|id| (*id, owned.get(id).copied().unwrap_or(0)))
            .collect();

        let best = scores.values().copied().max().unwrap_or(0);
        let leaders: Vec<u32> = scores
            .iter()
            .filter(|(_, score)| **score == best)
            .map(|(id, _)| *id)
            .collect();
        let winner = match leaders.as_slice() {
            [id] if best > 0 => Some(*id),
            _ => None,
        };

        for (id, player) in self.roster.iter_mut() {
            player.stats.games_played += 1;
            player.stats.cells_captured += scores.get(id).copied().unwrap_or(0) as u64;
            if winner == Some(*id) {
                player.stats.wins += 1;
            }
        }

        info!("Match ended, winner: {:?}", winner);
        let change = self.phase_change();
        self.broadcast(None, change);
        Some(MatchSummary { scores, winner })
    }

    /// Clears all ownership and keeps the dimensions.
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        let board = self.board.as_mut().ok_or(ConfigError::BoardNotConfigured)?;
        board.clear();
        let reset = Packet::BoardReset {
            width: board.width(),
            height: board.height(),
        };
        self.broadcast(None, reset);
        Ok(())
    }

    /// Changes the board dimensions, clearing all ownership.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        check_board_size(width, height)?;
        match self.board.as_mut() {
            Some(board) => board.resize(width, height),
            None => self.board = Some(Board::new(width, height)),
        }
        info!("Board resized to {}x{}", width, height);
        self.broadcast(None, Packet::BoardReset { width, height });
        Ok(())
    }

    /// Returns true if the lock state changed.
    pub fn set_locked(&mut self, locked: bool) -> bool {
        if self.board_locked == locked {
            return false;
        }
        self.board_locked = locked;
        let change = self.phase_change();
        self.broadcast(None, change);
        true
    }

    /// Places a cell for an active player during an unlocked match.
    ///
    /// Returns the captured cells; empty when the click was not legal or did
    /// nothing. Ending the match on a full board is left to the caller.
    pub fn click(&mut self, player_id: u32, cell: Cell) -> Vec<Cell> {
        if self.phase != Phase::InGame || self.board_locked || !self.active.contains(&player_id)
        {
            debug!("Ignoring click from player {} at {:?}", player_id, cell);
            return Vec::new();
        }
        let Some(board) = self.board.as_mut() else {
            return Vec::new();
        };

        let delta = board.capture(player_id, cell);
        for packet in Packet::board_updates(player_id, &delta) {
            self.broadcast(None, packet);
        }
        delta
    }

    /// Returns false for an unknown player.
    pub fn move_cursor(&mut self, player_id: u32, x: f32, y: f32) -> bool {
        let Some(player) = self.roster.get_mut(&player_id) else {
            return false;
        };
        player.set_cursor(x, y);
        let update = Packet::CursorUpdate {
            player_id,
            x: player.cursor_x,
            y: player.cursor_y,
        };
        self.broadcast(Some(player_id), update);
        true
    }
}

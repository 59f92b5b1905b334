use log::{debug, info, warn};
use shared::{Board, Cell, Packet, Phase, PlayerInfo};
use std::collections::BTreeMap;

/// Local mirror of the server's match state, built only from server packets.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub player_id: Option<u32>,
    pub players: BTreeMap<u32, PlayerInfo>,
    pub board: Option<Board>,
    pub phase: Phase,
    pub board_locked: bool,
    pub spectator: bool,
    pub last_message: Option<String>,
    /// Reason given by the server when it dropped us.
    pub kicked: Option<String>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_joined(&self) -> bool {
        self.player_id.is_some() && self.kicked.is_none()
    }

    pub fn local_player(&self) -> Option<&PlayerInfo> {
        self.player_id.and_then(|id| self.players.get(&id))
    }

    /// Whether a click from us would currently be accepted.
    pub fn can_click(&self) -> bool {
        self.is_joined()
            && self.phase == Phase::InGame
            && !self.board_locked
            && !self.spectator
            && self.board.as_ref().map_or(false, |board| !board.is_full())
    }

    pub fn unclaimed_cells(&self) -> Vec<Cell> {
        self.board
            .as_ref()
            .map(|board| board.unclaimed_cells())
            .unwrap_or_default()
    }

    /// Applies one server packet. Returns false for packets that carry no state.
    pub fn apply(&mut self, packet: &Packet) -> bool {
        match packet {
            Packet::Welcome {
                player_id,
                players,
                phase,
                board_locked,
                spectator,
                board,
            } => {
                info!("Joined as player {}", player_id);
                self.player_id = Some(*player_id);
                self.players = players.iter().map(|p| (p.id, p.clone())).collect();
                self.phase = *phase;
                self.board_locked = *board_locked;
                self.spectator = *spectator;
                self.board = board.map(|(width, height)| Board::new(width, height));
                self.kicked = None;
            }
            Packet::PlayerJoined { player } => {
                self.players.insert(player.id, player.clone());
            }
            Packet::PlayerLeft { player_id, reason } => {
                if let Some(player) = self.players.remove(player_id) {
                    info!("{} left: {}", player.name, reason);
                }
            }
            Packet::CursorUpdate { player_id, x, y } => {
                if let Some(player) = self.players.get_mut(player_id) {
                    player.set_cursor(*x, *y);
                }
            }
            Packet::BoardUpdate { player_id, cells } => match self.board.as_mut() {
                Some(board) => {
                    let changed = board.apply(*player_id, cells);
                    if changed != cells.len() {
                        debug!(
                            "{} of {} cells from player {} were out of range",
                            cells.len() - changed,
                            cells.len(),
                            player_id
                        );
                    }
                }
                None => warn!("Board update received before the board size"),
            },
            Packet::BoardReset { width, height } => {
                self.board = Some(Board::new(*width, *height));
            }
            Packet::PhaseChange {
                phase,
                board_locked,
            } => {
                if self.phase == Phase::Lobby && *phase == Phase::InGame {
                    self.spectator = false;
                }
                self.phase = *phase;
                self.board_locked = *board_locked;
            }
            Packet::Message { text } => {
                info!("Server: {}", text);
                self.last_message = Some(text.clone());
            }
            Packet::Kick { reason } => {
                warn!("Kicked: {}", reason);
                self.kicked = Some(reason.clone());
            }
            _ => return false,
        }
        true
    }
}

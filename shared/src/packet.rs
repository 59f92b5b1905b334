use crate::board::Cell;
use crate::player::PlayerInfo;
use crate::MAX_CELLS_PER_UPDATE;
use serde::{Deserialize, Serialize};

/// Server-wide match phase.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Lobby,
    InGame,
}

/// Every message that can travel in a datagram, apart from the keep-alive marker.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    // Client to server
    Join {
        name: String,
    },
    Click {
        x: u32,
        y: u32,
    },
    CursorMove {
        x: f32,
        y: f32,
    },
    Ping,
    Leave,
    Command {
        line: String,
    },

    // Server to client
    Pong {
        version: u32,
        server_name: String,
        players: u32,
        max_players: u32,
    },
    Kick {
        reason: String,
    },
    Welcome {
        player_id: u32,
        players: Vec<PlayerInfo>,
        phase: Phase,
        board_locked: bool,
        spectator: bool,
        board: Option<(u32, u32)>,
    },
    PlayerJoined {
        player: PlayerInfo,
    },
    PlayerLeft {
        player_id: u32,
        reason: String,
    },
    CursorUpdate {
        player_id: u32,
        x: f32,
        y: f32,
    },
    BoardUpdate {
        player_id: u32,
        cells: Vec<Cell>,
    },
    BoardReset {
        width: u32,
        height: u32,
    },
    PhaseChange {
        phase: Phase,
        board_locked: bool,
    },
    Message {
        text: String,
    },
}

/// Registry tag for each packet type; the tag's name is what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Join,
    Click,
    CursorMove,
    Ping,
    Leave,
    Command,
    Pong,
    Kick,
    Welcome,
    PlayerJoined,
    PlayerLeft,
    CursorUpdate,
    BoardUpdate,
    BoardReset,
    PhaseChange,
    Message,
}

impl PacketKind {
    pub const ALL: [PacketKind; 16] = [
        PacketKind::Join,
        PacketKind::Click,
        PacketKind::CursorMove,
        PacketKind::Ping,
        PacketKind::Leave,
        PacketKind::Command,
        PacketKind::Pong,
        PacketKind::Kick,
        PacketKind::Welcome,
        PacketKind::PlayerJoined,
        PacketKind::PlayerLeft,
        PacketKind::CursorUpdate,
        PacketKind::BoardUpdate,
        PacketKind::BoardReset,
        PacketKind::PhaseChange,
        PacketKind::Message,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PacketKind::Join => "Join",
            PacketKind::Click => "Click",
            PacketKind::CursorMove => "CursorMove",
            PacketKind::Ping => "Ping",
            PacketKind::Leave => "Leave",
            PacketKind::Command => "Command",
            PacketKind::Pong => "Pong",
            PacketKind::Kick => "Kick",
            PacketKind::Welcome => "Welcome",
            PacketKind::PlayerJoined => "PlayerJoined",
            PacketKind::PlayerLeft => "PlayerLeft",
            PacketKind::CursorUpdate => "CursorUpdate",
            PacketKind::BoardUpdate => "BoardUpdate",
            PacketKind::BoardReset => "BoardReset",
            PacketKind::PhaseChange => "PhaseChange",
            PacketKind::Message => "Message",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Join { .. } => PacketKind::Join,
            Packet::Click { .. } => PacketKind::Click,
            Packet::CursorMove { .. } => PacketKind::CursorMove,
            Packet::Ping => PacketKind::Ping,
            Packet::Leave => PacketKind::Leave,
            Packet::Command { .. } => PacketKind::Command,
            Packet::Pong { .. } => PacketKind::Pong,
            Packet::Kick { .. } => PacketKind::Kick,
            Packet::Welcome { .. } => PacketKind::Welcome,
            Packet::PlayerJoined { .. } => PacketKind::PlayerJoined,
            Packet::PlayerLeft { .. } => PacketKind::PlayerLeft,
            Packet::CursorUpdate { .. } => PacketKind::CursorUpdate,
            Packet::BoardUpdate { .. } => PacketKind::BoardUpdate,
            Packet::BoardReset { .. } => PacketKind::BoardReset,
            Packet::PhaseChange { .. } => PacketKind::PhaseChange,
            Packet::Message { .. } => PacketKind::Message,
        }
    }

    /// Splits a board delta into `BoardUpdate` packets small enough for one datagram each.
    pub fn board_updates(player_id: u32, cells: &[Cell]) -> Vec<Packet> {
        cells
            .chunks(MAX_CELLS_PER_UPDATE)
            .map(|chunk| Packet::BoardUpdate {
                player_id,
                cells: chunk.to_vec(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_unique() {
        for (i, a) in PacketKind::ALL.iter().enumerate() {
            for b in &PacketKind::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_kind_lookup() {
        for kind in PacketKind::ALL {
            assert_eq!(PacketKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(PacketKind::from_name("KeepAlive"), None);
        assert_eq!(PacketKind::from_name("join"), None);
    }

    #[test]
    fn test_packet_kind() {
        assert_eq!(Packet::Ping.kind(), PacketKind::Ping);
        assert_eq!(Packet::Click { x: 1, y: 2 }.kind(), PacketKind::Click);
        assert_eq!(
            Packet::Kick {
                reason: "bye".to_string()
            }
            .kind()
            .to_string(),
            "Kick"
        );
    }

    #[test]
    fn test_board_updates_are_chunked() {
        let cells: Vec<Cell> = (0..1100).map(|i| Cell::new(i % 40, i / 40)).collect();
        let packets = Packet::board_updates(7, &cells);

        assert_eq!(packets.len(), 3);
        let mut total = 0;
        for packet in &packets {
            match packet {
                Packet::BoardUpdate { player_id, cells } => {
                    assert_eq!(*player_id, 7);
                    assert!(cells.len() <= MAX_CELLS_PER_UPDATE);
                    total += cells.len();
                }
                _ => panic!("Wrong packet type"),
            }
        }
        assert_eq!(total, 1100);
    }

    #[test]
    fn test_empty_delta_yields_no_updates() {
        assert!(Packet::board_updates(0, &[]).is_empty());
    }
}

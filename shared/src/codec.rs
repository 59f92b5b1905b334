//! Datagram codec.
//!
//! A datagram is a type name header followed by that type's payload:
//!
//! ```text
//! u16 big-endian length | UTF-8 type name | bincode payload
//! ```
//!
//! The payload is the bincode encoding of the packet's fields as a tuple, in
//! declaration order; field-less packets carry no payload. The keep-alive
//! marker is a bare header named `KeepAlive` and is recognized before the
//! registry lookup.

use crate::packet::{Packet, PacketKind, Phase};
use crate::player::PlayerInfo;
use crate::{
    Cell, KEEP_ALIVE, MAX_CELLS_PER_UPDATE, MAX_DATAGRAM_SIZE, MAX_ROSTER_LEN, MAX_TEXT_LEN,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// A decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    KeepAlive,
    Packet(Packet),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed datagram header: {0}")]
    MalformedHeader(&'static str),
    #[error("unknown packet type {0:?}")]
    UnknownPacketType(String),
    #[error("malformed {kind} payload: {reason}")]
    MalformedPayload { kind: PacketKind, reason: String },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize {kind} payload: {source}")]
    Serialize {
        kind: PacketKind,
        #[source]
        source: bincode::Error,
    },
    #[error("{kind} packet has a field out of range: {reason}")]
    OutOfRange { kind: PacketKind, reason: String },
    #[error("{kind} packet is {size} bytes, over the {max} byte datagram limit")]
    Oversized {
        kind: PacketKind,
        size: usize,
        max: usize,
    },
}

/// Serializes a packet into a single datagram.
pub fn encode(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
    let kind = packet.kind();
    check_ranges(packet).map_err(|reason| EncodeError::OutOfRange { kind, reason })?;

    let mut datagram = header(kind.name());
    match packet {
        Packet::Join { name } => write(kind, &mut datagram, &(name,))?,
        Packet::Click { x, y } => write(kind, &mut datagram, &(x, y))?,
        Packet::CursorMove { x, y } => write(kind, &mut datagram, &(x, y))?,
        Packet::Ping | Packet::Leave => {}
        Packet::Command { line } => write(kind, &mut datagram, &(line,))?,
        Packet::Pong {
            version,
            server_name,
            players,
            max_players,
        } => write(
            kind,
            &mut datagram,
            &(version, server_name, players, max_players),
        )?,
        Packet::Kick { reason } => write(kind, &mut datagram, &(reason,))?,
        Packet::Welcome {
            player_id,
            players,
            phase,
            board_locked,
            spectator,
            board,
        } => write(
            kind,
            &mut datagram,
            &(player_id, players, phase, board_locked, spectator, board),
        )?,
        Packet::PlayerJoined { player } => write(kind, &mut datagram, &(player,))?,
        Packet::PlayerLeft { player_id, reason } => {
            write(kind, &mut datagram, &(player_id, reason))?
        }
        Packet::CursorUpdate { player_id, x, y } => {
            write(kind, &mut datagram, &(player_id, x, y))?
        }
        Packet::BoardUpdate { player_id, cells } => {
            write(kind, &mut datagram, &(player_id, cells))?
        }
        Packet::BoardReset { width, height } => write(kind, &mut datagram, &(width, height))?,
        Packet::PhaseChange {
            phase,
            board_locked,
        } => write(kind, &mut datagram, &(phase, board_locked))?,
        Packet::Message { text } => write(kind, &mut datagram, &(text,))?,
    }

    if datagram.len() > MAX_DATAGRAM_SIZE {
        return Err(EncodeError::Oversized {
            kind,
            size: datagram.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(datagram)
}

/// The keep-alive marker datagram.
pub fn encode_keep_alive() -> Vec<u8> {
    header(KEEP_ALIVE)
}

/// Parses a datagram. Errors only ever concern this one datagram.
pub fn decode(datagram: &[u8]) -> Result<Frame, DecodeError> {
    let (name, payload) = split_header(datagram)?;
    if name == KEEP_ALIVE {
        return Ok(Frame::KeepAlive);
    }

    let kind = PacketKind::from_name(name)
        .ok_or_else(|| DecodeError::UnknownPacketType(name.to_string()))?;
    let packet = decode_payload(kind, payload)?;
    check_ranges(&packet).map_err(|reason| DecodeError::MalformedPayload { kind, reason })?;

    Ok(Frame::Packet(packet))
}

fn header(name: &str) -> Vec<u8> {
    let bytes = name.as_bytes();
    let mut datagram = Vec::with_capacity(2 + bytes.len());
    datagram.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    datagram.extend_from_slice(bytes);
    datagram
}

fn split_header(datagram: &[u8]) -> Result<(&str, &[u8]), DecodeError> {
    if datagram.len() < 2 {
        return Err(DecodeError::MalformedHeader("missing type name length"));
    }
    let len = u16::from_be_bytes([datagram[0], datagram[1]]) as usize;
    let rest = &datagram[2..];
    if rest.len() < len {
        return Err(DecodeError::MalformedHeader("truncated type name"));
    }
    let name = std::str::from_utf8(&rest[..len])
        .map_err(|_| DecodeError::MalformedHeader("type name is not valid UTF-8"))?;
    Ok((name, &rest[len..]))
}

fn write<T: Serialize>(kind: PacketKind, out: &mut Vec<u8>, value: &T) -> Result<(), EncodeError> {
    bincode::serialize_into(out, value).map_err(|source| EncodeError::Serialize { kind, source })
}

fn read<T: DeserializeOwned>(kind: PacketKind, payload: &[u8]) -> Result<T, DecodeError> {
    bincode::deserialize(payload).map_err(|e| DecodeError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

fn decode_payload(kind: PacketKind, payload: &[u8]) -> Result<Packet, DecodeError> {
    let packet = match kind {
        PacketKind::Join => {
            let (name,): (String,) = read(kind, payload)?;
            Packet::Join { name }
        }
        PacketKind::Click => {
            let (x, y): (u32, u32) = read(kind, payload)?;
            Packet::Click { x, y }
        }
        PacketKind::CursorMove => {
            let (x, y): (f32, f32) = read(kind, payload)?;
            Packet::CursorMove { x, y }
        }
        PacketKind::Ping => Packet::Ping,
        PacketKind::Leave => Packet::Leave,
        PacketKind::Command => {
            let (line,): (String,) = read(kind, payload)?;
            Packet::Command { line }
        }
        PacketKind::Pong => {
            let (version, server_name, players, max_players): (u32, String, u32, u32) =
                read(kind, payload)?;
            Packet::Pong {
                version,
                server_name,
                players,
                max_players,
            }
        }
        PacketKind::Kick => {
            let (reason,): (String,) = read(kind, payload)?;
            Packet::Kick { reason }
        }
        PacketKind::Welcome => {
            let (player_id, players, phase, board_locked, spectator, board): (
                u32,
                Vec<PlayerInfo>,
                Phase,
                bool,
                bool,
                Option<(u32, u32)>,
            ) = read(kind, payload)?;
            Packet::Welcome {
                player_id,
                players,
                phase,
                board_locked,
                spectator,
                board,
            }
        }
        PacketKind::PlayerJoined => {
            let (player,): (PlayerInfo,) = read(kind, payload)?;
            Packet::PlayerJoined { player }
        }
        PacketKind::PlayerLeft => {
            let (player_id, reason): (u32, String) = read(kind, payload)?;
            Packet::PlayerLeft { player_id, reason }
        }
        PacketKind::CursorUpdate => {
            let (player_id, x, y): (u32, f32, f32) = read(kind, payload)?;
            Packet::CursorUpdate { player_id, x, y }
        }
        PacketKind::BoardUpdate => {
            let (player_id, cells): (u32, Vec<Cell>) = read(kind, payload)?;
            Packet::BoardUpdate { player_id, cells }
        }
        PacketKind::BoardReset => {
            let (width, height): (u32, u32) = read(kind, payload)?;
            Packet::BoardReset { width, height }
        }
        PacketKind::PhaseChange => {
            let (phase, board_locked): (Phase, bool) = read(kind, payload)?;
            Packet::PhaseChange {
                phase,
                board_locked,
            }
        }
        PacketKind::Message => {
            let (text,): (String,) = read(kind, payload)?;
            Packet::Message { text }
        }
    };
    Ok(packet)
}

/// Declared ranges that the payload schema alone cannot express.
fn check_ranges(packet: &Packet) -> Result<(), String> {
    match packet {
        Packet::Join { name } => check_text("name", name),
        Packet::Command { line } => check_text("line", line),
        Packet::Pong { server_name, .. } => check_text("server name", server_name),
        Packet::Kick { reason } | Packet::PlayerLeft { reason, .. } => {
            check_text("reason", reason)
        }
        Packet::Message { text } => check_text("text", text),
        Packet::CursorMove { x, y } | Packet::CursorUpdate { x, y, .. } => {
            check_unit("x", *x)?;
            check_unit("y", *y)
        }
        Packet::BoardUpdate { cells, .. } if cells.len() > MAX_CELLS_PER_UPDATE => Err(format!(
            "{} cells exceeds the limit of {}",
            cells.len(),
            MAX_CELLS_PER_UPDATE
        )),
        Packet::Welcome { players, .. } => {
            if players.len() > MAX_ROSTER_LEN {
                return Err(format!(
                    "roster of {} exceeds the limit of {}",
                    players.len(),
                    MAX_ROSTER_LEN
                ));
            }
            players
                .iter()
                .try_for_each(|player| check_player(player))
        }
        Packet::PlayerJoined { player } => check_player(player),
        _ => Ok(()),
    }
}

fn check_player(player: &PlayerInfo) -> Result<(), String> {
    check_text("player name", &player.name)?;
    check_unit("cursor x", player.cursor_x)?;
    check_unit("cursor y", player.cursor_y)
}

fn check_text(field: &str, value: &str) -> Result<(), String> {
    if value.len() > MAX_TEXT_LEN {
        return Err(format!(
            "{field} is {} bytes, limit is {MAX_TEXT_LEN}",
            value.len()
        ));
    }
    Ok(())
}

fn check_unit(field: &str, value: f32) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{field} = {value} is outside [0, 1]"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{Color, PlayerStats};

    fn roundtrip(packet: Packet) {
        let datagram = encode(&packet).unwrap();
        assert!(datagram.len() <= MAX_DATAGRAM_SIZE);
        let decoded = decode(&datagram).unwrap();
        assert_eq!(decoded, Frame::Packet(packet));
    }

    fn player(id: u32, name: &str) -> PlayerInfo {
        PlayerInfo::new(id, name, Color::for_player(id), PlayerStats::default())
    }

    #[test]
    fn test_wire_layout() {
        let datagram = encode(&Packet::Click { x: 2, y: 3 }).unwrap();

        assert_eq!(&datagram[..2], &[0, 5]);
        assert_eq!(&datagram[2..7], b"Click");
        assert_eq!(&datagram[7..], &[2, 0, 0, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_roundtrip_client_packets() {
        roundtrip(Packet::Join {
            name: String::new(),
        });
        roundtrip(Packet::Join {
            name: "ABCDEFGHIJKLMNOPQRST".to_string(),
        });
        roundtrip(Packet::Join {
            name: "x".repeat(MAX_TEXT_LEN),
        });
        roundtrip(Packet::Click { x: 0, y: 0 });
        roundtrip(Packet::Click { x: 4, y: 4 });
        roundtrip(Packet::Click {
            x: u32::MAX,
            y: u32::MAX,
        });
        roundtrip(Packet::CursorMove { x: 0.0, y: 1.0 });
        roundtrip(Packet::CursorMove { x: 0.5, y: 0.25 });
        roundtrip(Packet::Ping);
        roundtrip(Packet::Leave);
        roundtrip(Packet::Command {
            line: "/boardsize 8 6".to_string(),
        });
    }

    #[test]
    fn test_roundtrip_server_packets() {
        roundtrip(Packet::Pong {
            version: crate::PROTOCOL_VERSION,
            server_name: "TrapGame Server".to_string(),
            players: 0,
            max_players: 16,
        });
        roundtrip(Packet::Kick {
            reason: "timed out".to_string(),
        });
        roundtrip(Packet::Welcome {
            player_id: 1,
            players: vec![player(0, "Alice"), player(1, "Alice_")],
            phase: Phase::InGame,
            board_locked: false,
            spectator: true,
            board: Some((5, 5)),
        });
        roundtrip(Packet::Welcome {
            player_id: 0,
            players: vec![],
            phase: Phase::Lobby,
            board_locked: true,
            spectator: true,
            board: None,
        });
        roundtrip(Packet::PlayerJoined {
            player: player(3, "Carol"),
        });
        roundtrip(Packet::PlayerLeft {
            player_id: 3,
            reason: "left the game".to_string(),
        });
        roundtrip(Packet::CursorUpdate {
            player_id: 2,
            x: 1.0,
            y: 0.0,
        });
        roundtrip(Packet::BoardUpdate {
            player_id: 0,
            cells: vec![Cell::new(0, 0), Cell::new(7, 5)],
        });
        roundtrip(Packet::BoardUpdate {
            player_id: 1,
            cells: (0..MAX_CELLS_PER_UPDATE as u32)
                .map(|i| Cell::new(i % 32, i / 32))
                .collect(),
        });
        roundtrip(Packet::BoardReset {
            width: 8,
            height: 6,
        });
        roundtrip(Packet::PhaseChange {
            phase: Phase::Lobby,
            board_locked: true,
        });
        roundtrip(Packet::Message {
            text: String::new(),
        });
    }

    #[test]
    fn test_keep_alive_frame() {
        let datagram = encode_keep_alive();
        assert_eq!(&datagram[2..], KEEP_ALIVE.as_bytes());
        assert_eq!(decode(&datagram).unwrap(), Frame::KeepAlive);

        // Trailing bytes after the marker are ignored.
        let mut padded = datagram.clone();
        padded.extend_from_slice(&[1, 2, 3]);
        assert_eq!(decode(&padded).unwrap(), Frame::KeepAlive);
    }

    #[test]
    fn test_unknown_packet_type() {
        let mut datagram = header("Teleport");
        datagram.extend_from_slice(&[0, 0, 0, 0]);

        assert_eq!(
            decode(&datagram),
            Err(DecodeError::UnknownPacketType("Teleport".to_string()))
        );
    }

    #[test]
    fn test_malformed_header() {
        assert!(matches!(
            decode(&[]),
            Err(DecodeError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(&[0]),
            Err(DecodeError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(&[0, 9, b'J', b'o']),
            Err(DecodeError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(&[0, 2, 0xC3, 0x28]),
            Err(DecodeError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let datagram = encode(&Packet::Click { x: 1, y: 1 }).unwrap();
        let truncated = &datagram[..datagram.len() - 2];

        assert!(matches!(
            decode(truncated),
            Err(DecodeError::MalformedPayload {
                kind: PacketKind::Click,
                ..
            })
        ));

        let join = encode(&Packet::Join {
            name: "Alice".to_string(),
        })
        .unwrap();
        assert!(matches!(
            decode(&join[..join.len() - 1]),
            Err(DecodeError::MalformedPayload {
                kind: PacketKind::Join,
                ..
            })
        ));
    }

    #[test]
    fn test_out_of_range_cursor_is_rejected() {
        let mut datagram = header("CursorMove");
        bincode::serialize_into(&mut datagram, &(1.5f32, 0.5f32)).unwrap();
        assert!(matches!(
            decode(&datagram),
            Err(DecodeError::MalformedPayload {
                kind: PacketKind::CursorMove,
                ..
            })
        ));

        let mut datagram = header("CursorMove");
        bincode::serialize_into(&mut datagram, &(f32::NAN, 0.5f32)).unwrap();
        assert!(decode(&datagram).is_err());

        assert!(matches!(
            encode(&Packet::CursorMove { x: -0.1, y: 0.0 }),
            Err(EncodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_overlong_text_is_rejected() {
        let mut datagram = header("Join");
        bincode::serialize_into(&mut datagram, &("y".repeat(MAX_TEXT_LEN + 1),)).unwrap();
        assert!(matches!(
            decode(&datagram),
            Err(DecodeError::MalformedPayload {
                kind: PacketKind::Join,
                ..
            })
        ));
    }

    #[test]
    fn test_oversized_board_update_is_rejected() {
        let cells: Vec<Cell> = (0..MAX_CELLS_PER_UPDATE as u32 + 1)
            .map(|i| Cell::new(i, 0))
            .collect();
        let err = encode(&Packet::BoardUpdate {
            player_id: 0,
            cells,
        })
        .unwrap_err();
        assert!(matches!(err, EncodeError::OutOfRange { .. }));
    }

    #[test]
    fn test_corrupted_length_prefix_in_payload() {
        // A Join whose string length claims far more bytes than exist.
        let mut datagram = header("Join");
        datagram.extend_from_slice(&u64::MAX.to_le_bytes());
        datagram.extend_from_slice(b"abc");
        assert!(decode(&datagram).is_err());
    }
}

//! Types and rules shared by the TrapGame server and client.
//!
//! Everything that has to behave identically on both ends of the wire lives
//! here: the packet set and its codec, player identity, and the board capture
//! engine. The server applies board operations authoritatively and the client
//! applies the deltas it is sent, so both sides use the same `Board` type.

pub mod board;
pub mod codec;
pub mod packet;
pub mod player;

pub use board::{Board, Cell};
pub use codec::{decode, encode, encode_keep_alive, DecodeError, EncodeError, Frame};
pub use packet::{Packet, PacketKind, Phase};
pub use player::{validate_name, Color, NameError, PlayerInfo, PlayerStats};

/// Protocol version reported in `Pong` replies.
pub const PROTOCOL_VERSION: u32 = 1;

/// Type name of the keep-alive marker frame.
pub const KEEP_ALIVE: &str = "KeepAlive";

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 20;

/// Largest datagram either side will send or accept.
pub const MAX_DATAGRAM_SIZE: usize = 8 * 1024;

/// Upper bound on any string field carried by a packet, in bytes.
pub const MAX_TEXT_LEN: usize = 256;

/// Upper bound on the number of cells carried by one `BoardUpdate`.
pub const MAX_CELLS_PER_UPDATE: usize = 512;

/// Upper bound on the roster carried by a `Welcome`.
pub const MAX_ROSTER_LEN: usize = 256;

/// Largest accepted board width or height.
pub const MAX_BOARD_DIMENSION: u32 = 256;

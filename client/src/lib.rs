//! # TrapGame Client Library
//!
//! Headless client for a TrapGame server. Rendering and input widgets live
//! elsewhere; this crate covers the protocol side of a client and a simple
//! bot that can stand in for a player.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! `ClientGameState` mirrors the server's roster, board, phase and lock flag.
//! It is only ever changed by server packets, and board deltas go through
//! the same `shared::Board` the server uses, so both sides agree cell for
//! cell.
//!
//! ### Network Module (`network`)
//! - `discover` pings a server and reports its name and player count
//! - `Client::run` joins, sends a keep-alive every 5 seconds, gives up after
//!   30 seconds without hearing from the server and leaves on exit
//! - With a click interval set, the client plays by claiming a random
//!   unclaimed cell whenever the server would accept a click
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{discover, Client};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let info = discover("127.0.0.1:4000".parse()?, Duration::from_secs(2)).await?;
//!     println!("{}: {}/{} players", info.name, info.players, info.max_players);
//!
//!     let mut client = Client::new("127.0.0.1:4000", "Bot", Some(Duration::from_secs(1))).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod network;

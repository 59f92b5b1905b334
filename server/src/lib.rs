//! # TrapGame Server Library
//!
//! Authoritative server for TrapGame, a real-time multiplayer board game in
//! which players claim cells and capture any area they wall off. A single UDP
//! socket serves every client; each client that joins becomes a session keyed
//! by its network address.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Handles the lifecycle of every session:
//! - Join validation, name disambiguation and player id assignment
//! - Keep-alive echoes and timeout sweeps
//! - Explicit leaves, kicks and shutdown notices
//!
//! ### Match State
//! The server decides which moves are legal. Clicks are only accepted while a
//! match is running, the board is unlocked and the player is taking part.
//! Captures are computed here with the same board engine the client uses, and
//! the resulting deltas are broadcast to everyone.
//!
//! ### Administration
//! Operators and the local console drive the match with slash commands:
//! `/boardsize`, `/start`, `/stop`, `/reset`, `/lock`, `/unlock`, `/kick`,
//! `/players` and `/joins`.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Actor
//! One task owns all mutable state (`context::ServerContext`). Network
//! receive, timeout sweeps and console input reach it as messages on one
//! channel and are handled sequentially, so no locks are needed.
//!
//! ### Sharded Sender Pool
//! Outgoing packets are encoded by a dispatcher and sent by a fixed number of
//! workers. Each destination address always maps to the same worker, which
//! keeps per-session ordering while bounding concurrency.
//!
//! ## Module Organization
//!
//! - `client_manager`: sessions, join rules and outbound queues
//! - `game`: lobby/in-game state machine and scoring
//! - `commands`: command trait, registry and built-in commands
//! - `context`: packet handling and dispatch routing
//! - `network`: UDP tasks and the actor loop
//! - `scheduler`: fixed-delay background tasks
//! - `stats`: player statistics load/save hook
//! - `config`, `error`: configuration and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::stats::MemoryStats;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 4000,
//!         ..Default::default()
//!     };
//!     let server = Server::bind(config, Box::new(MemoryStats::new())).await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         tokio::signal::ctrl_c().await.ok();
//!         handle.shutdown();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod game;
pub mod network;
pub mod scheduler;
pub mod stats;

//! # Chess Session Server Library
//!
//! This library provides the authoritative server for a networked two-player
//! chess session. It accepts TCP connections, keeps them alive, validates
//! moves against the rules of chess and pushes full board snapshots to every
//! participant.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server owns the only real board. Clients send move intents; the server
//! checks turn ownership and legality, applies accepted moves and broadcasts
//! the resulting position. Rejected moves are dropped without a reply.
//!
//! ### Connection Management
//! Handles the complete lifecycle of connections:
//! - Acceptance and id assignment (ids `0` and `1` play, later ids spectate)
//! - Ping-based liveness and HANG on shutdown or timeout
//! - Pruning of dead connections and capacity limits
//!
//! ### Game Records
//! Every accepted move rewrites a JSON record of the game in the matches
//! directory so an interrupted session can still be reviewed.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick Loop
//! All sockets are non-blocking and serviced from one loop. A tick polls the
//! registry, hands connection events and frames to the session in ascending
//! connection order and flushes the session's outgoing messages. Nothing is
//! shared between threads, so there are no locks.
//!
//! ### Pluggable Rules
//! The session talks to the board through [`rules::RulesEngine`], so any
//! conforming engine can be substituted.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Accepting, pruning, polling and message fan-out.
//!
//! ### Session Module (`session`)
//! Status transitions, move handling, nicknames and resignation.
//!
//! ### Network Module (`network`)
//! The [`network::ChessServer`] driver and its async run loop.
//!
//! ### Record Module (`record`)
//! Serializable game record, record keys and sinks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{ChessServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let mut server = ChessServer::bind(&config)?;
//!
//!     // Ticks until Ctrl+C, then announces the shutdown and hangs up
//!     server.run(config.tick_duration).await?;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod record;
pub mod registry;
pub mod rules;
pub mod session;

//! # Chess Client Library
//!
//! This library provides the client side of a networked two-player chess
//! session. It connects to the authoritative server, keeps the connection
//! alive, mirrors the pushed session state and renders it as text.
//!
//! ## Architecture Overview
//!
//! The client holds no authority over the game. The server pushes the full
//! board after every accepted move, so the client simply replaces its copy
//! and redraws. Moves typed by the player are checked against the last
//! received position first, which saves a round trip for obvious mistakes,
//! but the server has the final word.
//!
//! ### Liveness
//! The underlying [`shared::Connection`] pings the server every few seconds
//! and hangs up when the server stays silent for too long. Calling
//! [`network::ChessClient::update`] regularly is all that is needed.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! [`game::ClientSessionView`], the local mirror of the session:
//! - Status, side and board replaced wholesale on every push
//! - Write-once game outcome
//! - Opponent move hints and move/capture cues
//!
//! ### Input Module (`input`)
//! Parsing of typed commands such as `e2e4`, `resign` or `quit`.
//!
//! ### Network Module (`network`)
//! [`network::ChessClient`] for the protocol and [`network::Client`] for the
//! interactive terminal loop.
//!
//! ### Rendering Module (`rendering`)
//! Text board from the player's perspective, status and hint lines.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{ChessClient, Client};
//! use shared::ConnectionConfig;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let chess = ChessClient::connect("127.0.0.1:1337", "newbie", ConnectionConfig::default())?;
//!     let mut client = Client::new(chess);
//!
//!     // Reads commands from stdin until the game is over
//!     client.run(Duration::from_millis(50)).await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;

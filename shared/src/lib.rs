//! # Shared Session Library
//!
//! Everything both ends of a chess session need to talk to each other: the
//! wire format, the message catalogue, connection liveness and the rules of
//! chess.
//!
//! ## Wire Format
//!
//! The byte stream is a sequence of frames, each `LEN ++ id ++ payload` with
//! `LEN` a little-endian `u32` counting the id byte plus the payload. Strings
//! inside payloads carry their own 4-byte little-endian length. See
//! [`codec`] for framing and [`protocol`] for the individual messages.
//!
//! ## Connections
//!
//! A [`Connection`] wraps one non-blocking stream and is polled from the
//! owner's tick loop. It pings its peer every five seconds and hangs up when
//! the peer has been silent for ten. Streams are abstracted behind
//! [`Transport`] so tests can run on in-memory pipes and a manual
//! [`Clock`](clock::Clock).
//!
//! ## Rules
//!
//! [`chess::Board`] implements standard chess: legal move generation
//! including castling, en passant and promotion, outcome detection and EPD
//! serialization of positions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use shared::{Connection, ConnectionConfig, Message};
//!
//! fn main() -> Result<(), shared::NetError> {
//!     let mut connection = Connection::connect("127.0.0.1:1337", ConnectionConfig::default())?;
//!     connection.send(&Message::SetNick("alice".to_string()))?;
//!
//!     while connection.is_connected() {
//!         for frame in connection.poll() {
//!             if let Ok(message) = Message::decode(&frame) {
//!                 println!("{:?}", message);
//!             }
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(100));
//!     }
//!     Ok(())
//! }
//! ```

pub mod chess;
pub mod clock;
pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod transport;

pub use codec::{Frame, FrameDecoder};
pub use connection::{Connection, ConnectionConfig};
pub use error::{FenError, NetError, ProtocolError};
pub use protocol::{
    ConnectionId, Message, Move, Outcome, OutcomeKind, PieceKind, Side, Status,
};
pub use transport::Transport;

/// Port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 1337;

/// Longest nickname kept by the server, in characters.
pub const MAX_NICK_CHARS: usize = 32;

//! Error types shared by the transport and session layers.

/// Malformed or hostile input observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The length prefix exceeds the configured maximum frame size.
    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: u32, max: u32 },

    /// A length prefix of zero leaves no room for the id byte.
    #[error("frame length is zero")]
    EmptyFrame,

    /// A payload ended before all of its fields could be read.
    #[error("payload truncated: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },

    /// A string field did not contain valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// The frame id is not part of the protocol.
    #[error("unknown packet id {0}")]
    UnknownPacket(u8),

    /// A field carried a value outside of its domain.
    #[error("invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u8 },
}

/// A FEN or EPD string that does not describe a position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("expected at least 4 fields, found {0}")]
    MissingFields(usize),

    #[error("invalid piece placement: {0}")]
    Placement(String),

    #[error("invalid side to move: {0}")]
    Turn(String),

    #[error("invalid castling field: {0}")]
    Castling(String),

    #[error("invalid en passant square: {0}")]
    EnPassant(String),

    #[error("invalid move counter: {0}")]
    Counter(String),
}

/// Errors surfaced by connections and registries.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An API call was made on a connection that is already closed.
    #[error("connection is not connected")]
    NotConnected,

    /// A move was out of turn or rejected by the rules engine.
    #[error("illegal move from {from} to {to}")]
    IllegalMove { from: u8, to: u8 },

    /// Binding, connecting or accepting failed while establishing a session.
    #[error("could not establish connection with {addr}: {source}")]
    Connectivity {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl NetError {
    pub fn connectivity(addr: impl ToString, source: std::io::Error) -> Self {
        NetError::Connectivity {
            addr: addr.to_string(),
            source,
        }
    }
}

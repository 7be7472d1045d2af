//! Application messages carried inside frames, and the small value types
//! they are built from.

use crate::codec::Frame;
use crate::error::ProtocolError;

pub const PACKET_PING: u8 = 0;
pub const PACKET_HANG: u8 = 1;
pub const PACKET_STATUS: u8 = 2;
pub const PACKET_SET_NICK: u8 = 3;
pub const PACKET_PLAYER_INFO: u8 = 4;
pub const PACKET_SIDE: u8 = 5;
pub const PACKET_BOARD: u8 = 6;
pub const PACKET_GIVE_UP: u8 = 7;
pub const PACKET_MOVE: u8 = 8;
pub const PACKET_GAME_OUTCOME: u8 = 9;
pub const PACKET_CLIENT_MOVE_INFO: u8 = 10;
pub const PACKET_CLIENT_TAKEN_INFO: u8 = 11;

/// Winner byte used on the wire when an outcome has no winner.
pub const NO_WINNER: u8 = 255;

/// Server-assigned connection identifier. Ids 0 and 1 own the two sides.
pub type ConnectionId = u32;

/// Authoritative session status as broadcast by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    WaitingForPlayers = 0,
    Playing = 1,
    GameEnded = 2,
    GameEndedPlayerLeft = 3,
    ServerStopped = 4,
}

impl Status {
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Status::WaitingForPlayers),
            1 => Ok(Status::Playing),
            2 => Ok(Status::GameEnded),
            3 => Ok(Status::GameEndedPlayerLeft),
            4 => Ok(Status::ServerStopped),
            _ => Err(ProtocolError::InvalidValue {
                field: "status",
                value,
            }),
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Forward-only transition graph. `ServerStopped` is reachable from every
    /// other status and leads nowhere.
    pub fn can_transition_to(self, next: Status) -> bool {
        use Status::*;
        match (self, next) {
            (ServerStopped, _) => false,
            (_, ServerStopped) => true,
            (WaitingForPlayers, Playing) => true,
            (Playing, GameEnded) | (Playing, GameEndedPlayerLeft) => true,
            _ => false,
        }
    }
}

/// One of the two player roles. White moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    White = 0,
    Black = 1,
}

impl Side {
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Side::White),
            1 => Ok(Side::Black),
            _ => Err(ProtocolError::InvalidValue {
                field: "side",
                value,
            }),
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// The side owned by a connection, if that connection is a player.
    pub fn for_connection(id: ConnectionId) -> Option<Side> {
        match id {
            0 => Some(Side::White),
            1 => Some(Side::Black),
            _ => None,
        }
    }

    pub fn connection_id(self) -> ConnectionId {
        self as ConnectionId
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceKind {
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(PieceKind::Pawn),
            2 => Ok(PieceKind::Knight),
            3 => Ok(PieceKind::Bishop),
            4 => Ok(PieceKind::Rook),
            5 => Ok(PieceKind::Queen),
            6 => Ok(PieceKind::King),
            _ => Err(ProtocolError::InvalidValue {
                field: "piece kind",
                value,
            }),
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }

    /// Lowercase algebraic letter (`p`, `n`, `b`, `r`, `q`, `k`).
    pub fn symbol(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutcomeKind {
    Checkmate = 1,
    Stalemate = 2,
    InsufficientMaterial = 3,
    SeventyFiveMoves = 4,
    Repetition = 5,
    Resignation = 11,
}

impl OutcomeKind {
    pub fn from_wire(value: u8) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(OutcomeKind::Checkmate),
            2 => Ok(OutcomeKind::Stalemate),
            3 => Ok(OutcomeKind::InsufficientMaterial),
            4 => Ok(OutcomeKind::SeventyFiveMoves),
            5 => Ok(OutcomeKind::Repetition),
            11 => Ok(OutcomeKind::Resignation),
            _ => Err(ProtocolError::InvalidValue {
                field: "termination kind",
                value,
            }),
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

/// Terminal result of a session. Never changes once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub winner: Option<Side>,
}

impl Outcome {
    pub fn decisive(kind: OutcomeKind, winner: Side) -> Self {
        Self {
            kind,
            winner: Some(winner),
        }
    }

    pub fn draw(kind: OutcomeKind) -> Self {
        Self { kind, winner: None }
    }

    pub fn resignation(resigning: Side) -> Self {
        Self::decisive(OutcomeKind::Resignation, resigning.opponent())
    }

    /// Result string as used in game records: `1-0`, `0-1` or `1/2-1/2`.
    pub fn result_tag(&self) -> &'static str {
        match self.winner {
            Some(Side::White) => "1-0",
            Some(Side::Black) => "0-1",
            None => "1/2-1/2",
        }
    }
}

/// A move between two square indices (`a1 = 0` .. `h8 = 63`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: u8, to: u8) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, kind: PieceKind) -> Self {
        self.promotion = Some(kind);
        self
    }
}

/// Every message understood by server and client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Ping,
    Hang,
    Status(Status),
    SetNick(String),
    PlayerInfo { connection_id: u8, nick: String },
    Side(Side),
    Board { is_capture: bool, state: String },
    GiveUp,
    Move { from: u8, to: u8 },
    GameOutcome(Outcome),
    ClientMoveInfo { from: u8, to: u8 },
    ClientTakenInfo(PieceKind),
}

impl Message {
    pub fn id(&self) -> u8 {
        match self {
            Message::Ping => PACKET_PING,
            Message::Hang => PACKET_HANG,
            Message::Status(_) => PACKET_STATUS,
            Message::SetNick(_) => PACKET_SET_NICK,
            Message::PlayerInfo { .. } => PACKET_PLAYER_INFO,
            Message::Side(_) => PACKET_SIDE,
            Message::Board { .. } => PACKET_BOARD,
            Message::GiveUp => PACKET_GIVE_UP,
            Message::Move { .. } => PACKET_MOVE,
            Message::GameOutcome(_) => PACKET_GAME_OUTCOME,
            Message::ClientMoveInfo { .. } => PACKET_CLIENT_MOVE_INFO,
            Message::ClientTakenInfo(_) => PACKET_CLIENT_TAKEN_INFO,
        }
    }

    pub fn to_frame(&self) -> Frame {
        let mut payload = Vec::new();
        match self {
            Message::Ping | Message::Hang | Message::GiveUp => {}
            Message::Status(status) => payload.push(status.to_wire()),
            Message::SetNick(nick) => write_string(&mut payload, nick),
            Message::PlayerInfo {
                connection_id,
                nick,
            } => {
                payload.push(*connection_id);
                write_string(&mut payload, nick);
            }
            Message::Side(side) => payload.push(side.to_wire()),
            Message::Board { is_capture, state } => {
                payload.push(u8::from(*is_capture));
                write_string(&mut payload, state);
            }
            Message::Move { from, to } | Message::ClientMoveInfo { from, to } => {
                payload.push(*from);
                payload.push(*to);
            }
            Message::GameOutcome(outcome) => {
                payload.push(outcome.kind.to_wire());
                payload.push(outcome.winner.map_or(NO_WINNER, Side::to_wire));
            }
            Message::ClientTakenInfo(kind) => payload.push(kind.to_wire()),
        }
        Frame::new(self.id(), payload)
    }

    /// Full wire encoding including the length prefix.
    pub fn encode(&self) -> Vec<u8> {
        self.to_frame().encode()
    }

    /// Interprets a frame. Trailing bytes after the last field are ignored.
    pub fn decode(frame: &Frame) -> Result<Message, ProtocolError> {
        let mut reader = PayloadReader::new(&frame.payload);
        let message = match frame.id {
            PACKET_PING => Message::Ping,
            PACKET_HANG => Message::Hang,
            PACKET_STATUS => Message::Status(Status::from_wire(reader.u8()?)?),
            PACKET_SET_NICK => Message::SetNick(reader.string()?),
            PACKET_PLAYER_INFO => Message::PlayerInfo {
                connection_id: reader.u8()?,
                nick: reader.string()?,
            },
            PACKET_SIDE => Message::Side(Side::from_wire(reader.u8()?)?),
            PACKET_BOARD => Message::Board {
                is_capture: reader.u8()? != 0,
                state: reader.string()?,
            },
            PACKET_GIVE_UP => Message::GiveUp,
            PACKET_MOVE => Message::Move {
                from: reader.u8()?,
                to: reader.u8()?,
            },
            PACKET_GAME_OUTCOME => {
                let kind = OutcomeKind::from_wire(reader.u8()?)?;
                let winner = match reader.u8()? {
                    NO_WINNER => None,
                    value => Some(Side::from_wire(value)?),
                };
                Message::GameOutcome(Outcome { kind, winner })
            }
            PACKET_CLIENT_MOVE_INFO => Message::ClientMoveInfo {
                from: reader.u8()?,
                to: reader.u8()?,
            },
            PACKET_CLIENT_TAKEN_INFO => {
                Message::ClientTakenInfo(PieceKind::from_wire(reader.u8()?)?)
            }
            other => return Err(ProtocolError::UnknownPacket(other)),
        };
        Ok(message)
    }
}

impl From<&Message> for Frame {
    fn from(message: &Message) -> Self {
        message.to_frame()
    }
}

impl TryFrom<&Frame> for Message {
    type Error = ProtocolError;

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        Message::decode(frame)
    }
}

/// Appends a 4-byte little-endian length followed by the UTF-8 bytes.
pub fn write_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Reads a length-prefixed string, returning it with the bytes consumed.
pub fn read_string(buf: &[u8]) -> Result<(String, usize), ProtocolError> {
    let mut reader = PayloadReader::new(buf);
    let value = reader.string()?;
    Ok((value, reader.pos))
}

struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(ProtocolError::Truncated {
                needed: n,
                available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(self.take(4)?);
        let len = u32::from_le_bytes(prefix) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameDecoder;

    fn roundtrip(message: Message) {
        let mut decoder = FrameDecoder::default();
        let frames = decoder.feed(&message.encode()).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(Message::decode(&frames[0]).unwrap(), message);
    }

    #[test]
    fn test_message_roundtrips() {
        roundtrip(Message::Ping);
        roundtrip(Message::Status(Status::GameEndedPlayerLeft));
        roundtrip(Message::SetNick("Magnus".to_string()));
        roundtrip(Message::PlayerInfo {
            connection_id: 1,
            nick: "Jürgen".to_string(),
        });
        roundtrip(Message::Board {
            is_capture: true,
            state: "8/8/8/8/8/8/8/K6k w - -".to_string(),
        });
        roundtrip(Message::GameOutcome(Outcome::draw(OutcomeKind::Stalemate)));
        roundtrip(Message::GameOutcome(Outcome::resignation(Side::Black)));
        roundtrip(Message::ClientTakenInfo(PieceKind::Queen));
    }

    #[test]
    fn test_move_payload_layout() {
        let frame = Message::Move { from: 12, to: 28 }.to_frame();
        assert_eq!(frame.id, PACKET_MOVE);
        assert_eq!(frame.payload, vec![12, 28]);
    }

    #[test]
    fn test_string_uses_four_byte_prefix() {
        let frame = Message::SetNick("abc".to_string()).to_frame();
        assert_eq!(frame.payload, vec![3, 0, 0, 0, b'a', b'b', b'c']);

        let (value, consumed) = read_string(&frame.payload).unwrap();
        assert_eq!(value, "abc");
        assert_eq!(consumed, 7);
    }

    #[test]
    fn test_outcome_winner_encoding() {
        let frame = Message::GameOutcome(Outcome::resignation(Side::Black)).to_frame();
        assert_eq!(frame.payload, vec![11, 0]);

        let frame = Message::GameOutcome(Outcome::draw(OutcomeKind::Repetition)).to_frame();
        assert_eq!(frame.payload, vec![5, NO_WINNER]);
    }

    #[test]
    fn test_truncated_payload_is_rejected() {
        let frame = Frame::new(PACKET_MOVE, vec![12]);
        assert_eq!(
            Message::decode(&frame),
            Err(ProtocolError::Truncated {
                needed: 1,
                available: 0
            })
        );

        let frame = Frame::new(PACKET_SET_NICK, vec![10, 0, 0, 0, b'a']);
        assert!(matches!(
            Message::decode(&frame),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert_eq!(
            Message::decode(&Frame::new(PACKET_STATUS, vec![9])),
            Err(ProtocolError::InvalidValue {
                field: "status",
                value: 9
            })
        );
        assert_eq!(
            Message::decode(&Frame::empty(42)),
            Err(ProtocolError::UnknownPacket(42))
        );
        assert_eq!(
            Message::decode(&Frame::new(PACKET_SET_NICK, vec![1, 0, 0, 0, 0xff])),
            Err(ProtocolError::InvalidUtf8)
        );
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        use Status::*;
        assert!(WaitingForPlayers.can_transition_to(Playing));
        assert!(Playing.can_transition_to(GameEnded));
        assert!(Playing.can_transition_to(GameEndedPlayerLeft));
        assert!(GameEnded.can_transition_to(ServerStopped));
        assert!(WaitingForPlayers.can_transition_to(ServerStopped));

        assert!(!Playing.can_transition_to(WaitingForPlayers));
        assert!(!GameEnded.can_transition_to(GameEndedPlayerLeft));
        assert!(!GameEndedPlayerLeft.can_transition_to(Playing));
        assert!(!ServerStopped.can_transition_to(ServerStopped));
        assert!(!WaitingForPlayers.can_transition_to(GameEnded));
    }

    #[test]
    fn test_side_ownership() {
        assert_eq!(Side::for_connection(0), Some(Side::White));
        assert_eq!(Side::for_connection(1), Some(Side::Black));
        assert_eq!(Side::for_connection(2), None);
        assert_eq!(Side::Black.connection_id(), 1);
        assert_eq!(Side::White.opponent(), Side::Black);
    }
}

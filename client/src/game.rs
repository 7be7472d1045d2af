//! Client-side view of the session, rebuilt from server pushes.
//!
//! The server is authoritative: every push replaces the corresponding piece
//! of local state wholesale, so applying the same message twice is harmless.

use log::debug;
use shared::chess::{last_rank, rank_of, Board};
use shared::{Frame, Message, Move, Outcome, PieceKind, Side, Status};

/// What the client shows as the session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// No live connection to the server.
    NotConnected,
    Session(Status),
}

/// Sound-style cue for the most recent board change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Move,
    Capture,
}

#[derive(Debug, Clone)]
pub struct ClientSessionView {
    status: DisplayStatus,
    side: Option<Side>,
    board: Option<String>,
    white_name: String,
    black_name: String,
    outcome: Option<Outcome>,
    opponent_move: Option<(u8, u8)>,
    taken: Option<PieceKind>,
    cue: Option<Cue>,
}

impl Default for ClientSessionView {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSessionView {
    pub fn new() -> Self {
        Self {
            status: DisplayStatus::NotConnected,
            side: None,
            board: None,
            white_name: "White".to_string(),
            black_name: "Black".to_string(),
            outcome: None,
            opponent_move: None,
            taken: None,
            cue: None,
        }
    }

    pub fn status(&self) -> DisplayStatus {
        self.status
    }

    /// The side this client plays. `None` for spectators.
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    /// The side the board is drawn from; spectators watch from White.
    pub fn perspective(&self) -> Side {
        self.side.unwrap_or(Side::White)
    }

    /// Latest position as received, in EPD.
    pub fn board(&self) -> Option<&str> {
        self.board.as_deref()
    }

    pub fn parsed_board(&self) -> Option<Board> {
        Board::from_epd(self.board.as_deref()?).ok()
    }

    pub fn player_name(&self, side: Side) -> &str {
        match side {
            Side::White => &self.white_name,
            Side::Black => &self.black_name,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Last move announced by the server on the opponent's behalf.
    pub fn opponent_move(&self) -> Option<(u8, u8)> {
        self.opponent_move
    }

    /// Piece the opponent took with their last move.
    pub fn taken(&self) -> Option<PieceKind> {
        self.taken
    }

    /// Returns and clears the pending cue.
    pub fn take_cue(&mut self) -> Option<Cue> {
        self.cue.take()
    }

    /// Applies one poll result. `None` means the connection is gone.
    pub fn apply_frames(&mut self, frames: Option<&[Frame]>) {
        let frames = match frames {
            Some(frames) => frames,
            None => {
                self.status = DisplayStatus::NotConnected;
                return;
            }
        };
        for frame in frames {
            match Message::decode(frame) {
                Ok(message) => self.apply(&message),
                Err(e) => debug!("Ignoring undecodable frame {}: {}", frame.id, e),
            }
        }
    }

    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::Status(status) => self.status = DisplayStatus::Session(*status),
            Message::Board { is_capture, state } => {
                if let Some(previous) = &self.board {
                    if previous != state {
                        self.cue = Some(if *is_capture { Cue::Capture } else { Cue::Move });
                    }
                }
                self.board = Some(state.clone());
            }
            Message::Side(side) => self.side = Some(*side),
            Message::PlayerInfo {
                connection_id,
                nick,
            } => match Side::for_connection(u32::from(*connection_id)) {
                Some(Side::White) => self.white_name = nick.clone(),
                Some(Side::Black) => self.black_name = nick.clone(),
                None => {}
            },
            Message::GameOutcome(outcome) => {
                if self.outcome.is_none() {
                    self.outcome = Some(*outcome);
                }
            }
            Message::ClientMoveInfo { from, to } => self.opponent_move = Some((*from, *to)),
            Message::ClientTakenInfo(kind) => self.taken = Some(*kind),
            _ => {}
        }
    }

    /// Clears the opponent hints once the local player starts a move.
    pub fn local_move_started(&mut self) {
        self.opponent_move = None;
        self.taken = None;
    }

    /// Side to move in the last received position.
    pub fn turn(&self) -> Option<Side> {
        self.parsed_board().map(|board| board.turn())
    }

    pub fn is_my_turn(&self) -> bool {
        self.status == DisplayStatus::Session(Status::Playing)
            && self.side.is_some()
            && self.turn() == self.side
    }

    /// Whether the server would accept `from -> to` from this client,
    /// judged on the last received position.
    pub fn can_move(&self, from: u8, to: u8) -> bool {
        if !self.is_my_turn() {
            return false;
        }
        let board = match self.parsed_board() {
            Some(board) => board,
            None => return false,
        };
        let mut mv = Move::new(from, to);
        if let Some(piece) = board.piece_at(from) {
            if piece.kind == PieceKind::Pawn && rank_of(to) == last_rank(piece.side) {
                mv = mv.with_promotion(PieceKind::Queen);
            }
        }
        board.is_legal(&mv)
    }
}

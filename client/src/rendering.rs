//! Text rendering of the session view
//!
//! Produces plain strings so the caller decides where they go. The board is
//! drawn from the local player's perspective: White sees rank 8 at the top,
//! Black sees rank 1 at the top.

use crate::game::{ClientSessionView, DisplayStatus};
use shared::chess::{square_name, Board};
use shared::{Outcome, OutcomeKind, PieceKind, Side, Status};
use std::fmt::Write;

pub struct Renderer {
    /// Marks the opponent's last move on the board
    pub highlight_last_move: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            highlight_last_move: true,
        }
    }

    /// Full screen: players, board, status and hints
    pub fn render(&self, view: &ClientSessionView) -> String {
        let mut out = String::new();
        let bottom = view.perspective();
        let top = bottom.opponent();

        let _ = writeln!(out, "  {} ({})", view.player_name(top), side_name(top));
        match view.parsed_board() {
            Some(board) => out.push_str(&self.render_board(&board, view)),
            None => out.push_str("  (no board yet)\n"),
        }
        let _ = writeln!(
            out,
            "  {} ({})",
            view.player_name(bottom),
            side_name(bottom)
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", status_line(view));
        if let Some(hint) = hint_line(view) {
            let _ = writeln!(out, "{}", hint);
        }
        out
    }

    pub fn render_board(&self, board: &Board, view: &ClientSessionView) -> String {
        let flipped = view.perspective() == Side::Black;
        let marked = if self.highlight_last_move {
            view.opponent_move()
        } else {
            None
        };

        let ranks: Vec<u8> = if flipped {
            (0..8).collect()
        } else {
            (0..8).rev().collect()
        };
        let files: Vec<u8> = if flipped {
            (0..8).rev().collect()
        } else {
            (0..8).collect()
        };

        let mut out = String::new();
        for &rank in &ranks {
            let _ = write!(out, "{} ", rank + 1);
            for &file in &files {
                let square = rank * 8 + file;
                let symbol = board.piece_at(square).map_or('.', |p| p.symbol());
                let is_marked = marked.map_or(false, |(from, to)| square == from || square == to);
                if is_marked {
                    let _ = write!(out, "[{}]", symbol);
                } else {
                    let _ = write!(out, " {} ", symbol);
                }
            }
            out.push('\n');
        }
        out.push_str("  ");
        for &file in &files {
            let _ = write!(out, " {} ", (b'a' + file) as char);
        }
        out.push('\n');
        out
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::White => "white",
        Side::Black => "black",
    }
}

pub fn status_line(view: &ClientSessionView) -> String {
    match view.status() {
        DisplayStatus::NotConnected => "Not connected to the server".to_string(),
        DisplayStatus::Session(Status::WaitingForPlayers) => "Waiting for an opponent...".to_string(),
        DisplayStatus::Session(Status::Playing) => {
            if view.is_my_turn() {
                "Your move".to_string()
            } else {
                match (view.side(), view.turn()) {
                    (Some(side), _) => format!("Waiting for {}", view.player_name(side.opponent())),
                    (None, Some(turn)) => format!("{} to move", view.player_name(turn)),
                    (None, None) => "Game in progress".to_string(),
                }
            }
        }
        DisplayStatus::Session(Status::GameEnded) => match view.outcome() {
            Some(outcome) => outcome_text(&outcome, view),
            None => "Game over".to_string(),
        },
        DisplayStatus::Session(Status::GameEndedPlayerLeft) => {
            "Your opponent left the game".to_string()
        }
        DisplayStatus::Session(Status::ServerStopped) => "The server was stopped".to_string(),
    }
}

pub fn outcome_text(outcome: &Outcome, view: &ClientSessionView) -> String {
    let reason = match outcome.kind {
        OutcomeKind::Checkmate => "checkmate",
        OutcomeKind::Stalemate => "stalemate",
        OutcomeKind::InsufficientMaterial => "insufficient material",
        OutcomeKind::SeventyFiveMoves => "the seventy-five move rule",
        OutcomeKind::Repetition => "fivefold repetition",
        OutcomeKind::Resignation => "resignation",
    };
    match outcome.winner {
        Some(winner) if Some(winner) == view.side() => format!("You won by {} ({})", reason, outcome.result_tag()),
        Some(winner) => format!(
            "{} won by {} ({})",
            view.player_name(winner),
            reason,
            outcome.result_tag()
        ),
        None => format!("Draw by {} ({})", reason, outcome.result_tag()),
    }
}

pub fn hint_line(view: &ClientSessionView) -> Option<String> {
    let (from, to) = view.opponent_move()?;
    let mover = match (view.side(), view.turn()) {
        (Some(side), _) => side.opponent(),
        (None, Some(turn)) => turn.opponent(),
        (None, None) => return None,
    };
    let mut line = format!(
        "{} played {}-{}",
        view.player_name(mover),
        square_name(from),
        square_name(to)
    );
    if let Some(kind) = view.taken() {
        let owner = if view.side().is_some() { "your" } else { "a" };
        let _ = write!(line, ", taking {} {}", owner, piece_name(kind));
    }
    Some(line)
}

fn piece_name(kind: PieceKind) -> &'static str {
    match kind {
        PieceKind::Pawn => "pawn",
        PieceKind::Knight => "knight",
        PieceKind::Bishop => "bishop",
        PieceKind::Rook => "rook",
        PieceKind::Queen => "queen",
        PieceKind::King => "king",
    }
}

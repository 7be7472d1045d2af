//! The operations the session needs from a chess rules engine.

use shared::chess::{Board, Piece, Square};
use shared::{Move, NetError, Outcome, Side};

/// A position the session can query and advance.
///
/// [`Board`] is the production implementation; tests may substitute their own.
pub trait RulesEngine {
    /// Side whose move it is.
    fn turn(&self) -> Side;

    fn piece_at(&self, square: Square) -> Option<Piece>;

    fn is_legal(&self, mv: &Move) -> bool;

    fn is_capture(&self, mv: &Move) -> bool;

    fn is_en_passant(&self, mv: &Move) -> bool;

    /// Applies a move previously accepted by [`RulesEngine::is_legal`].
    fn push(&mut self, mv: Move) -> Result<(), NetError>;

    fn outcome(&self) -> Option<Outcome>;

    /// Serialized position sent to clients in BOARD frames.
    fn snapshot(&self) -> String;
}

impl RulesEngine for Board {
    fn turn(&self) -> Side {
        Board::turn(self)
    }

    fn piece_at(&self, square: Square) -> Option<Piece> {
        Board::piece_at(self, square)
    }

    fn is_legal(&self, mv: &Move) -> bool {
        Board::is_legal(self, mv)
    }

    fn is_capture(&self, mv: &Move) -> bool {
        Board::is_capture(self, mv)
    }

    fn is_en_passant(&self, mv: &Move) -> bool {
        Board::is_en_passant(self, mv)
    }

    fn push(&mut self, mv: Move) -> Result<(), NetError> {
        Board::push(self, mv)
    }

    fn outcome(&self) -> Option<Outcome> {
        Board::outcome(self)
    }

    fn snapshot(&self) -> String {
        self.to_epd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advance<R: RulesEngine>(rules: &mut R, mv: Move) -> bool {
        if !rules.is_legal(&mv) {
            return false;
        }
        rules.push(mv).is_ok()
    }

    #[test]
    fn test_board_as_rules_engine() {
        let mut board = Board::new();
        assert_eq!(RulesEngine::turn(&board), Side::White);
        assert!(advance(&mut board, Move::new(12, 28)));
        assert!(!advance(&mut board, Move::new(12, 20)));
        assert_eq!(RulesEngine::turn(&board), Side::Black);
        assert_eq!(
            board.snapshot(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -"
        );
    }

    #[test]
    fn test_engine_reports_capture() {
        let mut board = Board::new();
        for mv in [Move::new(12, 28), Move::new(51, 35)] {
            assert!(advance(&mut board, mv));
        }
        let capture = Move::new(28, 35);
        assert!(RulesEngine::is_capture(&board, &capture));
        assert!(!RulesEngine::is_en_passant(&board, &capture));
        assert_eq!(RulesEngine::outcome(&board), None);
    }
}

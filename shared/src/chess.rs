//! Standard chess rules: move generation, legality, outcome detection and
//! EPD/FEN serialization.
//!
//! Squares are indexed `a1 = 0, b1 = 1, .., h8 = 63`. The board keeps the
//! positions seen since the last pawn move or capture so fivefold
//! repetition can be detected.

use crate::error::{FenError, NetError};
use crate::protocol::{Move, Outcome, OutcomeKind, PieceKind, Side};
use std::fmt;

pub type Square = u8;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];
const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const ROOK_DIRECTIONS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRECTIONS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const PROMOTION_KINDS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

/// Halfmoves without pawn move or capture after which the game is drawn.
const SEVENTY_FIVE_MOVE_PLIES: u32 = 150;
const FIVEFOLD: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub kind: PieceKind,
    pub side: Side,
}

impl Piece {
    pub fn new(kind: PieceKind, side: Side) -> Self {
        Self { kind, side }
    }

    /// FEN letter: uppercase for white, lowercase for black.
    pub fn symbol(self) -> char {
        match self.side {
            Side::White => self.kind.symbol().to_ascii_uppercase(),
            Side::Black => self.kind.symbol(),
        }
    }

    pub fn from_symbol(c: char) -> Option<Self> {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let kind = PieceKind::from_symbol(c)?;
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        Some(Self { kind, side })
    }
}

pub fn file_of(square: Square) -> u8 {
    square % 8
}

pub fn rank_of(square: Square) -> u8 {
    square / 8
}

/// Algebraic name such as `e4`.
pub fn square_name(square: Square) -> String {
    format!("{}{}", char::from(b'a' + file_of(square)), rank_of(square) + 1)
}

pub fn parse_square(name: &str) -> Option<Square> {
    let bytes = name.as_bytes();
    if bytes.len() != 2 {
        return None;
    }
    let file = bytes[0].checked_sub(b'a').filter(|f| *f < 8)?;
    let rank = bytes[1].checked_sub(b'1').filter(|r| *r < 8)?;
    Some(rank * 8 + file)
}

/// The rank a pawn of `side` promotes on.
pub fn last_rank(side: Side) -> u8 {
    match side {
        Side::White => 7,
        Side::Black => 0,
    }
}

fn offset(square: Square, file_delta: i8, rank_delta: i8) -> Option<Square> {
    let file = file_of(square) as i8 + file_delta;
    let rank = rank_of(square) as i8 + rank_delta;
    if (0..8).contains(&file) && (0..8).contains(&rank) {
        Some((rank * 8 + file) as Square)
    } else {
        None
    }
}

impl Move {
    /// Parses UCI notation: `e2e4`, or `e7e8q` with a promotion letter.
    pub fn from_uci(text: &str) -> Option<Move> {
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return None;
        }
        let from = parse_square(&text[0..2])?;
        let to = parse_square(&text[2..4])?;
        let mv = Move::new(from, to);
        match text[4..].chars().next() {
            None => Some(mv),
            Some(c) => match PieceKind::from_symbol(c)? {
                PieceKind::Pawn | PieceKind::King => None,
                kind => Some(mv.with_promotion(kind)),
            },
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", square_name(self.from), square_name(self.to))?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.symbol())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl CastlingRights {
    pub fn all() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }

    fn for_side(&self, side: Side) -> (bool, bool) {
        match side {
            Side::White => (self.white_king_side, self.white_queen_side),
            Side::Black => (self.black_king_side, self.black_queen_side),
        }
    }

    /// Drops every right that depends on a piece standing on `square`.
    fn touch(&mut self, square: Square) {
        match square {
            0 => self.white_queen_side = false,
            4 => {
                self.white_king_side = false;
                self.white_queen_side = false;
            }
            7 => self.white_king_side = false,
            56 => self.black_queen_side = false,
            60 => {
                self.black_king_side = false;
                self.black_queen_side = false;
            }
            63 => self.black_king_side = false,
            _ => {}
        }
    }

    fn parse(field: &str) -> Result<Self, FenError> {
        let mut rights = CastlingRights::default();
        if field == "-" {
            return Ok(rights);
        }
        for c in field.chars() {
            match c {
                'K' => rights.white_king_side = true,
                'Q' => rights.white_queen_side = true,
                'k' => rights.black_king_side = true,
                'q' => rights.black_queen_side = true,
                _ => return Err(FenError::Castling(field.to_string())),
            }
        }
        Ok(rights)
    }
}

impl fmt::Display for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.white_king_side, 'K'),
            (self.white_queen_side, 'Q'),
            (self.black_king_side, 'k'),
            (self.black_queen_side, 'q'),
        ];
        let mut any = false;
        for (set, c) in flags {
            if set {
                write!(f, "{}", c)?;
                any = true;
            }
        }
        if !any {
            write!(f, "-")?;
        }
        Ok(())
    }
}

type Squares = [Option<Piece>; 64];

/// A chess position plus the state needed to judge its legal continuations.
#[derive(Debug, Clone)]
pub struct Board {
    squares: Squares,
    turn: Side,
    castling: CastlingRights,
    ep_square: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Position keys since the last irreversible move, current one last.
    history: Vec<String>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// The standard starting position.
    pub fn new() -> Self {
        let mut squares: Squares = [None; 64];
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for (file, kind) in back_rank.into_iter().enumerate() {
            squares[file] = Some(Piece::new(kind, Side::White));
            squares[8 + file] = Some(Piece::new(PieceKind::Pawn, Side::White));
            squares[48 + file] = Some(Piece::new(PieceKind::Pawn, Side::Black));
            squares[56 + file] = Some(Piece::new(kind, Side::Black));
        }
        Self::from_parts(squares, Side::White, CastlingRights::all(), None, 0, 1)
    }

    fn from_parts(
        squares: Squares,
        turn: Side,
        castling: CastlingRights,
        ep_square: Option<Square>,
        halfmove_clock: u32,
        fullmove_number: u32,
    ) -> Self {
        let mut board = Self {
            squares,
            turn,
            castling,
            ep_square,
            halfmove_clock,
            fullmove_number,
            history: Vec::new(),
        };
        let key = board.to_epd();
        board.history.push(key);
        board
    }

    /// Parses a full FEN. The two move counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingFields(fields.len()));
        }
        let halfmove = match fields.get(4) {
            Some(text) => text
                .parse()
                .map_err(|_| FenError::Counter(text.to_string()))?,
            None => 0,
        };
        let fullmove = match fields.get(5) {
            Some(text) => text
                .parse()
                .map_err(|_| FenError::Counter(text.to_string()))?,
            None => 1,
        };
        Self::from_fields(&fields[..4], halfmove, fullmove)
    }

    /// Parses the four position fields of an EPD. Any operations after them
    /// are ignored.
    pub fn from_epd(epd: &str) -> Result<Self, FenError> {
        let fields: Vec<&str> = epd.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(FenError::MissingFields(fields.len()));
        }
        Self::from_fields(&fields[..4], 0, 1)
    }

    fn from_fields(fields: &[&str], halfmove: u32, fullmove: u32) -> Result<Self, FenError> {
        let squares = parse_placement(fields[0])?;
        let turn = match fields[1] {
            "w" => Side::White,
            "b" => Side::Black,
            other => return Err(FenError::Turn(other.to_string())),
        };
        let castling = CastlingRights::parse(fields[2])?;
        let ep_square = match fields[3] {
            "-" => None,
            name => match parse_square(name) {
                Some(square) if rank_of(square) == 2 || rank_of(square) == 5 => Some(square),
                _ => return Err(FenError::EnPassant(name.to_string())),
            },
        };
        Ok(Self::from_parts(
            squares, turn, castling, ep_square, halfmove, fullmove,
        ))
    }

    pub fn turn(&self) -> Side {
        self.turn
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares.get(square as usize).copied().flatten()
    }

    pub fn castling_rights(&self) -> CastlingRights {
        self.castling
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = self.pseudo_legal_moves();
        moves.retain(|mv| self.keeps_king_safe(mv));
        moves
    }

    pub fn is_legal(&self, mv: &Move) -> bool {
        self.legal_moves().contains(mv)
    }

    pub fn is_en_passant(&self, mv: &Move) -> bool {
        Some(mv.to) == self.ep_square
            && file_of(mv.from) != file_of(mv.to)
            && self.piece_at(mv.to).is_none()
            && matches!(self.piece_at(mv.from), Some(p) if p.kind == PieceKind::Pawn)
    }

    /// True if `mv` takes an opponent piece, en passant included.
    pub fn is_capture(&self, mv: &Move) -> bool {
        let moving = match self.piece_at(mv.from) {
            Some(piece) => piece.side,
            None => return false,
        };
        match self.piece_at(mv.to) {
            Some(target) => target.side != moving,
            None => self.is_en_passant(mv),
        }
    }

    /// The kind of piece `mv` would take, if any.
    pub fn captured_kind(&self, mv: &Move) -> Option<PieceKind> {
        if self.is_en_passant(mv) {
            return Some(PieceKind::Pawn);
        }
        if self.is_capture(mv) {
            return self.piece_at(mv.to).map(|p| p.kind);
        }
        None
    }

    pub fn is_check(&self) -> bool {
        match king_square(&self.squares, self.turn) {
            Some(king) => attacked(&self.squares, king, self.turn.opponent()),
            None => false,
        }
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_check() && self.legal_moves().is_empty()
    }

    pub fn is_stalemate(&self) -> bool {
        !self.is_check() && self.legal_moves().is_empty()
    }

    pub fn is_insufficient_material(&self) -> bool {
        self.has_insufficient_material(Side::White) && self.has_insufficient_material(Side::Black)
    }

    pub fn is_seventyfive_moves(&self) -> bool {
        self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES && !self.legal_moves().is_empty()
    }

    pub fn is_fivefold_repetition(&self) -> bool {
        match self.history.last() {
            Some(current) => self.history.iter().filter(|key| *key == current).count() >= FIVEFOLD,
            None => false,
        }
    }

    /// Terminal result of the position, checked in the order checkmate,
    /// insufficient material, stalemate, seventy-five moves, fivefold
    /// repetition.
    pub fn outcome(&self) -> Option<Outcome> {
        let has_moves = !self.legal_moves().is_empty();
        if !has_moves && self.is_check() {
            return Some(Outcome::decisive(
                OutcomeKind::Checkmate,
                self.turn.opponent(),
            ));
        }
        if self.is_insufficient_material() {
            return Some(Outcome::draw(OutcomeKind::InsufficientMaterial));
        }
        if !has_moves {
            return Some(Outcome::draw(OutcomeKind::Stalemate));
        }
        if self.halfmove_clock >= SEVENTY_FIVE_MOVE_PLIES {
            return Some(Outcome::draw(OutcomeKind::SeventyFiveMoves));
        }
        if self.is_fivefold_repetition() {
            return Some(Outcome::draw(OutcomeKind::Repetition));
        }
        None
    }

    /// Plays a legal move.
    pub fn push(&mut self, mv: Move) -> Result<(), NetError> {
        let piece = match self.piece_at(mv.from) {
            Some(piece) if self.is_legal(&mv) => piece,
            _ => {
                return Err(NetError::IllegalMove {
                    from: mv.from,
                    to: mv.to,
                })
            }
        };

        let zeroing = piece.kind == PieceKind::Pawn || self.is_capture(&mv);
        self.squares = self.squares_after(&mv);
        self.castling.touch(mv.from);
        self.castling.touch(mv.to);
        self.ep_square = if piece.kind == PieceKind::Pawn && mv.from.abs_diff(mv.to) == 16 {
            Some((mv.from + mv.to) / 2)
        } else {
            None
        };
        self.halfmove_clock = if zeroing {
            0
        } else {
            self.halfmove_clock + 1
        };
        if self.turn == Side::Black {
            self.fullmove_number += 1;
        }
        self.turn = self.turn.opponent();

        if zeroing {
            self.history.clear();
        }
        let key = self.to_epd();
        self.history.push(key);
        Ok(())
    }

    /// Placement, side to move, castling rights and en passant square. The
    /// en passant square is only written when a legal capture onto it exists.
    pub fn to_epd(&self) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..8u8).rev() {
            let mut empty = 0u8;
            for file in 0..8u8 {
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.symbol());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out.push(' ');
        out.push(match self.turn {
            Side::White => 'w',
            Side::Black => 'b',
        });
        out.push(' ');
        out.push_str(&self.castling.to_string());
        out.push(' ');
        match self.legal_ep_square() {
            Some(square) => out.push_str(&square_name(square)),
            None => out.push('-'),
        }
        out
    }

    pub fn to_fen(&self) -> String {
        format!(
            "{} {} {}",
            self.to_epd(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    fn legal_ep_square(&self) -> Option<Square> {
        let ep = self.ep_square?;
        let capture_possible = self
            .legal_moves()
            .iter()
            .any(|mv| mv.to == ep && self.is_en_passant(mv));
        capture_possible.then_some(ep)
    }

    fn has_insufficient_material(&self, side: Side) -> bool {
        let own: Vec<PieceKind> = self
            .pieces()
            .filter(|(_, p)| p.side == side)
            .map(|(_, p)| p.kind)
            .collect();
        if own
            .iter()
            .any(|k| matches!(k, PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen))
        {
            return false;
        }
        if own.contains(&PieceKind::Knight) {
            let opponent_only_kings_and_queens = self
                .pieces()
                .filter(|(_, p)| p.side != side)
                .all(|(_, p)| matches!(p.kind, PieceKind::King | PieceKind::Queen));
            return own.len() <= 2 && opponent_only_kings_and_queens;
        }
        if own.contains(&PieceKind::Bishop) {
            let mut bishop_colors = self
                .pieces()
                .filter(|(_, p)| p.kind == PieceKind::Bishop)
                .map(|(sq, _)| (file_of(sq) + rank_of(sq)) % 2);
            let first = bishop_colors.next();
            let same_color = bishop_colors.all(|color| Some(color) == first);
            let pawns_or_knights = self
                .pieces()
                .any(|(_, p)| matches!(p.kind, PieceKind::Pawn | PieceKind::Knight));
            return same_color && !pawns_or_knights;
        }
        true
    }

    fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        self.squares
            .iter()
            .enumerate()
            .filter_map(|(sq, piece)| piece.map(|p| (sq as Square, p)))
    }

    fn keeps_king_safe(&self, mv: &Move) -> bool {
        let squares = self.squares_after(mv);
        match king_square(&squares, self.turn) {
            Some(king) => !attacked(&squares, king, self.turn.opponent()),
            None => true,
        }
    }

    /// Piece placement after `mv`, assuming it is at least pseudo-legal.
    fn squares_after(&self, mv: &Move) -> Squares {
        let mut squares = self.squares;
        let en_passant = self.is_en_passant(mv);
        let piece = squares[mv.from as usize].take();

        if en_passant {
            let captured = rank_of(mv.from) * 8 + file_of(mv.to);
            squares[captured as usize] = None;
        }
        if let Some(p) = piece {
            if p.kind == PieceKind::King && file_of(mv.from).abs_diff(file_of(mv.to)) == 2 {
                let base = rank_of(mv.from) * 8;
                let (rook_from, rook_to) = if file_of(mv.to) == 6 {
                    (base + 7, base + 5)
                } else {
                    (base, base + 3)
                };
                squares[rook_to as usize] = squares[rook_from as usize].take();
            }
        }

        squares[mv.to as usize] = match (piece, mv.promotion) {
            (Some(p), Some(kind)) => Some(Piece::new(kind, p.side)),
            (piece, None) => piece,
            (None, Some(_)) => None,
        };
        squares
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(48);
        for (from, piece) in self.pieces() {
            if piece.side != self.turn {
                continue;
            }
            match piece.kind {
                PieceKind::Pawn => self.pawn_moves(from, &mut moves),
                PieceKind::Knight => self.step_moves(from, &KNIGHT_STEPS, &mut moves),
                PieceKind::Bishop => self.slide_moves(from, &BISHOP_DIRECTIONS, &mut moves),
                PieceKind::Rook => self.slide_moves(from, &ROOK_DIRECTIONS, &mut moves),
                PieceKind::Queen => {
                    self.slide_moves(from, &ROOK_DIRECTIONS, &mut moves);
                    self.slide_moves(from, &BISHOP_DIRECTIONS, &mut moves);
                }
                PieceKind::King => {
                    self.step_moves(from, &KING_STEPS, &mut moves);
                    self.castling_moves(from, &mut moves);
                }
            }
        }
        moves
    }

    fn is_own(&self, square: Square) -> bool {
        matches!(self.piece_at(square), Some(p) if p.side == self.turn)
    }

    fn step_moves(&self, from: Square, steps: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(df, dr) in steps {
            if let Some(to) = offset(from, df, dr) {
                if !self.is_own(to) {
                    moves.push(Move::new(from, to));
                }
            }
        }
    }

    fn slide_moves(&self, from: Square, directions: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(df, dr) in directions {
            let mut current = from;
            while let Some(to) = offset(current, df, dr) {
                match self.piece_at(to) {
                    None => moves.push(Move::new(from, to)),
                    Some(p) => {
                        if p.side != self.turn {
                            moves.push(Move::new(from, to));
                        }
                        break;
                    }
                }
                current = to;
            }
        }
    }

    fn pawn_moves(&self, from: Square, moves: &mut Vec<Move>) {
        let (forward, start_rank) = match self.turn {
            Side::White => (1, 1),
            Side::Black => (-1, 6),
        };
        let promotion_rank = last_rank(self.turn);

        if let Some(one) = offset(from, 0, forward) {
            if self.piece_at(one).is_none() {
                push_pawn_move(from, one, promotion_rank, moves);
                if rank_of(from) == start_rank {
                    if let Some(two) = offset(from, 0, 2 * forward) {
                        if self.piece_at(two).is_none() {
                            moves.push(Move::new(from, two));
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            if let Some(to) = offset(from, df, forward) {
                match self.piece_at(to) {
                    Some(target) if target.side != self.turn => {
                        push_pawn_move(from, to, promotion_rank, moves)
                    }
                    None if Some(to) == self.ep_square => moves.push(Move::new(from, to)),
                    _ => {}
                }
            }
        }
    }

    fn castling_moves(&self, from: Square, moves: &mut Vec<Move>) {
        let base = match self.turn {
            Side::White => 0,
            Side::Black => 56,
        };
        if from != base + 4 {
            return;
        }
        let enemy = self.turn.opponent();
        if attacked(&self.squares, from, enemy) {
            return;
        }
        let own_rook = |square: Square| {
            self.piece_at(square) == Some(Piece::new(PieceKind::Rook, self.turn))
        };
        let empty = |square: Square| self.piece_at(square).is_none();
        let safe = |square: Square| !attacked(&self.squares, square, enemy);

        let (king_side, queen_side) = self.castling.for_side(self.turn);
        if king_side
            && own_rook(base + 7)
            && empty(base + 5)
            && empty(base + 6)
            && safe(base + 5)
            && safe(base + 6)
        {
            moves.push(Move::new(from, base + 6));
        }
        if queen_side
            && own_rook(base)
            && empty(base + 1)
            && empty(base + 2)
            && empty(base + 3)
            && safe(base + 3)
            && safe(base + 2)
        {
            moves.push(Move::new(from, base + 2));
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            for file in 0..8u8 {
                if file > 0 {
                    write!(f, " ")?;
                }
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => write!(f, "{}", piece.symbol())?,
                    None => write!(f, ".")?,
                }
            }
            if rank > 0 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

fn push_pawn_move(from: Square, to: Square, promotion_rank: u8, moves: &mut Vec<Move>) {
    if rank_of(to) == promotion_rank {
        for kind in PROMOTION_KINDS {
            moves.push(Move::new(from, to).with_promotion(kind));
        }
    } else {
        moves.push(Move::new(from, to));
    }
}

fn parse_placement(field: &str) -> Result<Squares, FenError> {
    let invalid = || FenError::Placement(field.to_string());
    let ranks: Vec<&str> = field.split('/').collect();
    if ranks.len() != 8 {
        return Err(invalid());
    }

    let mut squares: Squares = [None; 64];
    for (i, text) in ranks.iter().enumerate() {
        let rank = 7 - i;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(skip) = c.to_digit(10) {
                if !(1..=8).contains(&skip) {
                    return Err(invalid());
                }
                file += skip as usize;
            } else {
                let piece = Piece::from_symbol(c).ok_or_else(invalid)?;
                if file >= 8 {
                    return Err(invalid());
                }
                squares[rank * 8 + file] = Some(piece);
                file += 1;
            }
            if file > 8 {
                return Err(invalid());
            }
        }
        if file != 8 {
            return Err(invalid());
        }
    }
    Ok(squares)
}

fn king_square(squares: &Squares, side: Side) -> Option<Square> {
    squares
        .iter()
        .position(|p| *p == Some(Piece::new(PieceKind::King, side)))
        .map(|sq| sq as Square)
}

/// Whether any piece of `by` attacks `target`.
fn attacked(squares: &Squares, target: Square, by: Side) -> bool {
    let holds = |square: Square, kinds: &[PieceKind]| {
        matches!(squares[square as usize], Some(p) if p.side == by && kinds.contains(&p.kind))
    };

    let pawn_rank_delta = match by {
        Side::White => -1,
        Side::Black => 1,
    };
    for df in [-1, 1] {
        if let Some(sq) = offset(target, df, pawn_rank_delta) {
            if holds(sq, &[PieceKind::Pawn]) {
                return true;
            }
        }
    }

    let steppers = [
        (&KNIGHT_STEPS, PieceKind::Knight),
        (&KING_STEPS, PieceKind::King),
    ];
    for (steps, kind) in steppers {
        for &(df, dr) in steps.iter() {
            if let Some(sq) = offset(target, df, dr) {
                if holds(sq, &[kind]) {
                    return true;
                }
            }
        }
    }

    let sliders = [
        (&ROOK_DIRECTIONS, PieceKind::Rook),
        (&BISHOP_DIRECTIONS, PieceKind::Bishop),
    ];
    for (directions, kind) in sliders {
        for &(df, dr) in directions.iter() {
            let mut current = target;
            while let Some(sq) = offset(current, df, dr) {
                if squares[sq as usize].is_some() {
                    if holds(sq, &[kind, PieceKind::Queen]) {
                        return true;
                    }
                    break;
                }
                current = sq;
            }
        }
    }
    false
}

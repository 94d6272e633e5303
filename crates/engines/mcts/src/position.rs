//! Chess position as seen by the search.
//!
//! Wraps a `cozy_chess::Board` together with the hashes of the positions
//! played since the last capture or pawn move, which is all that is needed
//! to recognise repetitions.

use cozy_chess::{Board, Color, File, Move, Piece, Square};
use mcts_core::{GameState, TerminalStatus};

use crate::PositionError;

#[derive(Debug, Clone)]
pub struct ChessPosition {
    board: Board,
    /// Hashes of earlier positions, oldest first, cleared on irreversible moves.
    history: Vec<u64>,
}

impl Default for ChessPosition {
    fn default() -> Self {
        Self::startpos()
    }
}

impl ChessPosition {
    pub fn startpos() -> Self {
        Self::from_board(Board::default())
    }

    pub fn from_board(board: Board) -> Self {
        Self {
            board,
            history: Vec::new(),
        }
    }

    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let board = Board::from_fen(fen.trim(), false)
            .map_err(|_| PositionError::InvalidFen(fen.to_string()))?;
        Ok(Self::from_board(board))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn in_check(&self) -> bool {
        !self.board.checkers().is_empty()
    }

    /// Play a move that is known to be legal.
    pub fn play(&mut self, mv: Move) {
        let previous = self.board.hash();
        self.board.play_unchecked(mv);
        if self.board.halfmove_clock() == 0 {
            self.history.clear();
        } else {
            self.history.push(previous);
        }
    }

    /// Play a move given in UCI notation (`e2e4`, `e1g1`, `e7e8q`).
    pub fn play_uci(&mut self, text: &str) -> Result<(), PositionError> {
        let mv = self
            .parse_uci_move(text)
            .ok_or_else(|| PositionError::IllegalMove(text.to_string()))?;
        self.play(mv);
        Ok(())
    }

    /// Find the legal move written as `text` in UCI notation.
    pub fn parse_uci_move(&self, text: &str) -> Option<Move> {
        let text = text.trim();
        self.legal_moves()
            .into_iter()
            .find(|&mv| self.move_to_uci(mv) == text)
    }

    /// UCI notation for `mv`. Castling is written as the king's two-square
    /// step rather than king-takes-rook.
    pub fn move_to_uci(&self, mv: Move) -> String {
        let mut to = mv.to;
        let castles = self.board.piece_on(mv.from) == Some(Piece::King)
            && self.board.color_on(mv.to) == Some(self.board.side_to_move());
        if castles {
            let file = if mv.to.file() > mv.from.file() {
                File::G
            } else {
                File::C
            };
            to = Square::new(file, mv.from.rank());
        }

        let mut text = format!("{}{}", mv.from, to);
        if let Some(piece) = mv.promotion {
            text.push(char::from(piece));
        }
        text
    }

    /// How many times the current position occurred before.
    pub fn repetitions(&self) -> usize {
        let hash = self.board.hash();
        self.history.iter().filter(|&&h| h == hash).count()
    }

    fn has_legal_move(&self) -> bool {
        let mut found = false;
        self.board.generate_moves(|_| {
            found = true;
            true
        });
        found
    }

    /// Neither side can deliver mate: bare kings, or a single minor piece.
    pub fn insufficient_material(&self) -> bool {
        let heavy = self.board.pieces(Piece::Pawn)
            | self.board.pieces(Piece::Rook)
            | self.board.pieces(Piece::Queen);
        if !heavy.is_empty() {
            return false;
        }
        let minors = self.board.pieces(Piece::Knight) | self.board.pieces(Piece::Bishop);
        minors.len() <= 1
    }
}

impl GameState for ChessPosition {
    type Move = Move;

    fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.board.generate_moves(|piece_moves| {
            moves.extend(piece_moves);
            false
        });
        moves
    }

    fn apply(&self, mv: Move) -> Self {
        let mut next = self.clone();
        next.play(mv);
        next
    }

    fn fingerprint(&self) -> u64 {
        self.board.hash()
    }

    fn terminal_status(&self) -> TerminalStatus {
        if !self.has_legal_move() {
            return if self.in_check() {
                TerminalStatus::Loss
            } else {
                TerminalStatus::Draw
            };
        }
        if self.board.halfmove_clock() >= 100
            || self.repetitions() >= 2
            || self.insufficient_material()
        {
            return TerminalStatus::Draw;
        }
        TerminalStatus::Ongoing
    }
}

#[cfg(test)]
#[path = "position_tests.rs"]
mod position_tests;

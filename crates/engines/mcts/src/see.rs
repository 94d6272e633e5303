//! One-ply static exchange estimate for captures.
//!
//! `gain = value(captured)`, minus the value of the piece left on the
//! destination if the opponent attacks that square after the capture. Only
//! the first recapture is considered, so this is a cheap filter rather than a
//! full exchange evaluator.

use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_pawn_attacks, get_rook_moves, Board,
    Color, Move, Piece, Rank, Square,
};
use serde::{Deserialize, Serialize};

use crate::eval::piece_value;

/// Piece removed by `mv`, if it captures an enemy piece.
///
/// Castling (king onto its own rook) and moves from an empty square are not
/// captures. En passant captures the pawn behind the destination.
pub fn captured_piece(board: &Board, mv: Move) -> Option<Piece> {
    let us = board.side_to_move();
    match board.color_on(mv.to) {
        Some(color) if color != us => board.piece_on(mv.to),
        Some(_) => None,
        None => {
            let is_pawn = board.piece_on(mv.from) == Some(Piece::Pawn)
                && board.color_on(mv.from) == Some(us);
            let ep_square = board
                .en_passant()
                .map(|file| Square::new(file, en_passant_rank(us)));
            (is_pawn && ep_square == Some(mv.to)).then_some(Piece::Pawn)
        }
    }
}

fn en_passant_rank(us: Color) -> Rank {
    match us {
        Color::White => Rank::Sixth,
        Color::Black => Rank::Third,
    }
}

/// Whether any piece of `by` attacks `square`.
pub fn is_attacked(board: &Board, square: Square, by: Color) -> bool {
    let occupied = board.occupied();
    let theirs = board.colors(by);
    let queens = board.pieces(Piece::Queen);

    let pawns = board.pieces(Piece::Pawn) & theirs;
    let knights = board.pieces(Piece::Knight) & theirs;
    let kings = board.pieces(Piece::King) & theirs;
    let diagonal = (board.pieces(Piece::Bishop) | queens) & theirs;
    let straight = (board.pieces(Piece::Rook) | queens) & theirs;

    !(get_pawn_attacks(square, !by) & pawns).is_empty()
        || !(get_knight_moves(square) & knights).is_empty()
        || !(get_king_moves(square) & kings).is_empty()
        || !(get_bishop_moves(square, occupied) & diagonal).is_empty()
        || !(get_rook_moves(square, occupied) & straight).is_empty()
}

/// Estimated material change in centipawns for the side playing `mv`.
///
/// Returns 0 for anything that is not a legal capture.
pub fn see_gain(board: &Board, mv: Move) -> i32 {
    let Some(captured) = captured_piece(board, mv) else {
        return 0;
    };
    if !board.is_legal(mv) {
        return 0;
    }

    let mut gain = piece_value(captured);
    let mut after = board.clone();
    after.play_unchecked(mv);
    if is_attacked(&after, mv.to, after.side_to_move()) {
        // A promotion puts the new piece at risk, not the pawn.
        if let Some(piece) = after.piece_on(mv.to) {
            gain -= piece_value(piece);
        }
    }
    gain
}

/// Classifies captures by their [`see_gain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSafety {
    /// Captures with a gain below this are unsafe.
    pub threshold: i32,
}

impl Default for CaptureSafety {
    fn default() -> Self {
        Self { threshold: -50 }
    }
}

impl CaptureSafety {
    pub fn new(threshold: i32) -> Self {
        Self { threshold }
    }

    pub fn is_safe(&self, board: &Board, mv: Move) -> bool {
        see_gain(board, mv) >= self.threshold
    }

    /// A capture that is expected to lose material.
    pub fn is_unsafe_capture(&self, board: &Board, mv: Move) -> bool {
        captured_piece(board, mv).is_some() && !self.is_safe(board, mv)
    }
}

#[cfg(test)]
#[path = "see_tests.rs"]
mod see_tests;

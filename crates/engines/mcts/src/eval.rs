//! Static evaluation: material, piece placement and mobility.

use cozy_chess::{
    get_bishop_moves, get_king_moves, get_knight_moves, get_rook_moves, BitBoard, Board, Color,
    Piece, Square,
};
use mcts_core::{Estimate, EvalError, ValueEstimator};

use crate::position::ChessPosition;

/// Material values in centipawns, indexed by `Piece as usize`.
/// Order: Pawn, Knight, Bishop, Rook, Queen, King
const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 0];

/// Centipawn value of a piece. The king is worth 0: it is never traded.
#[inline]
pub fn piece_value(piece: Piece) -> i32 {
    PIECE_VALUES[piece as usize]
}

/// Bonus for centralisation, by distance from the board centre.
const CENTER_BONUS: [i32; 4] = [20, 10, 5, 0];

const MOBILITY_WEIGHT: i32 = 4;

/// Pawns gain this much per rank advanced.
const PAWN_ADVANCE: i32 = 6;

fn center_distance(square: Square) -> usize {
    let file = square.file() as i32;
    let rank = square.rank() as i32;
    let df = (2 * file - 7).abs() / 2;
    let dr = (2 * rank - 7).abs() / 2;
    df.max(dr) as usize
}

fn relative_rank(square: Square, color: Color) -> i32 {
    match color {
        Color::White => square.rank() as i32,
        Color::Black => 7 - square.rank() as i32,
    }
}

fn attacks(piece: Piece, square: Square, occupied: BitBoard) -> BitBoard {
    match piece {
        Piece::Knight => get_knight_moves(square),
        Piece::Bishop => get_bishop_moves(square, occupied),
        Piece::Rook => get_rook_moves(square, occupied),
        Piece::Queen => get_bishop_moves(square, occupied) | get_rook_moves(square, occupied),
        Piece::King => get_king_moves(square),
        Piece::Pawn => BitBoard::EMPTY,
    }
}

fn side_score(board: &Board, color: Color) -> i32 {
    let ours = board.colors(color);
    let occupied = board.occupied();
    let mut score = 0;

    for &piece in &Piece::ALL {
        for square in board.pieces(piece) & ours {
            score += piece_value(piece);
            match piece {
                Piece::Pawn => score += PAWN_ADVANCE * (relative_rank(square, color) - 1),
                // The king stays home until the endgame.
                Piece::King => {}
                _ => {
                    score += CENTER_BONUS[center_distance(square)];
                    let reach = attacks(piece, square, occupied) & !ours;
                    score += MOBILITY_WEIGHT * reach.len() as i32;
                }
            }
        }
    }
    score
}

/// Evaluates the position from the side-to-move's perspective, in
/// centipawns.
pub fn evaluate(board: &Board) -> i32 {
    let us = board.side_to_move();
    side_score(board, us) - side_score(board, !us)
}

/// Leaf evaluator used by the search. Scores are unbounded centipawns; the
/// search squashes them with its `value_scale`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEvaluator;

impl ValueEstimator<ChessPosition> for StaticEvaluator {
    fn estimate(&self, position: &ChessPosition) -> Result<Estimate, EvalError> {
        Ok(Estimate::Raw(evaluate(position.board()) as f32))
    }
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod eval_tests;

//! Contracts between the search and the game it searches.
//!
//! The search never interprets moves or positions itself. It only needs to
//! enumerate moves, apply them, recognise finished games, correlate
//! positions across calls (fingerprint) and ask for priors and values.

use std::fmt::Debug;

use crate::error::EvalError;

/// Game result seen from the side to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminalStatus {
    /// The game continues.
    Ongoing,
    /// The side to move has won.
    Win,
    /// The side to move has lost (e.g. it is checkmated).
    Loss,
    /// Drawn by the game's rules (stalemate, repetition, ...).
    Draw,
}

/// A two-player, perfect-information game position.
///
/// Positions are treated as immutable values: [`GameState::apply`] returns
/// the successor instead of mutating in place.
pub trait GameState: Clone + Send + Sync {
    type Move: Copy + Eq + Debug + Send + Sync;

    /// All legal moves, in a stable enumeration order.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// Position after playing `mv`, which must be one of [`Self::legal_moves`].
    fn apply(&self, mv: Self::Move) -> Self;

    /// Stable hash of the position, used to correlate searches across moves.
    fn fingerprint(&self) -> u64;

    /// Whether the game is over, from the side to move's point of view.
    fn terminal_status(&self) -> TerminalStatus;
}

/// Maps a position and its legal moves to a probability distribution.
pub trait PriorPolicy<G: GameState> {
    /// One prior per move, same order as `moves`, summing to 1.
    fn priors(&self, position: &G, moves: &[G::Move]) -> Result<Vec<f32>, EvalError>;

    /// Removes moves that should never enter the tree.
    ///
    /// Called before [`PriorPolicy::priors`] on every expansion. The default
    /// keeps every legal move.
    fn filter_moves(&self, _position: &G, _moves: &mut Vec<G::Move>) {}
}

/// Value of a position for the side to move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Estimate {
    /// Already in [-1, 1].
    Value(f32),
    /// Unbounded score (e.g. centipawns); the engine squashes it with
    /// `tanh(score / value_scale)`.
    Raw(f32),
}

/// Scores a position from the side to move's perspective.
pub trait ValueEstimator<G: GameState> {
    fn estimate(&self, position: &G) -> Result<Estimate, EvalError>;
}

/// Equal prior for every move. Also the fallback when a policy misbehaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPolicy;

impl<G: GameState> PriorPolicy<G> for UniformPolicy {
    fn priors(&self, _position: &G, moves: &[G::Move]) -> Result<Vec<f32>, EvalError> {
        Ok(uniform(moves.len()))
    }
}

pub(crate) fn uniform(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f32; n]
}

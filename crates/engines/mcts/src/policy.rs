//! Heuristic move priors for chess.
//!
//! Each move gets a score from cheap features (material won, promotion,
//! centralisation, giving check) and the priors are a softmax over those
//! scores. Captures that the one-ply exchange estimate marks as losing are
//! either discounted or removed, depending on [`CaptureFilter`].

use cozy_chess::{Board, Move, Piece};
use mcts_core::{EvalError, PriorPolicy};
use serde::{Deserialize, Serialize};

use crate::eval::piece_value;
use crate::position::ChessPosition;
use crate::see::{captured_piece, see_gain, CaptureSafety};

/// How losing captures are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFilter {
    /// Keep them, with their prior multiplied by `unsafe_discount`.
    #[default]
    Soft,
    /// Never expand them.
    Hard,
    Off,
}

impl std::str::FromStr for CaptureFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "hard" => Ok(Self::Hard),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown capture filter: {other}")),
        }
    }
}

impl std::fmt::Display for CaptureFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Soft => "soft",
            Self::Hard => "hard",
            Self::Off => "off",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub capture_filter: CaptureFilter,
    /// Captures with a lower exchange estimate (centipawns) are unsafe.
    pub see_threshold: i32,
    /// Prior multiplier for unsafe captures in soft mode.
    pub unsafe_discount: f32,
    /// Softmax temperature in centipawns. Higher flattens the priors.
    pub softmax_temperature: f32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            capture_filter: CaptureFilter::Soft,
            see_threshold: CaptureSafety::default().threshold,
            unsafe_discount: 0.1,
            softmax_temperature: 150.0,
        }
    }
}

const CENTER_TARGET: i32 = 15;
const CHECK_BONUS: i32 = 40;

#[derive(Debug, Clone, Default)]
pub struct HeuristicPolicy {
    config: PolicyConfig,
}

impl HeuristicPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PolicyConfig) {
        self.config = config;
    }

    fn safety(&self) -> CaptureSafety {
        CaptureSafety::new(self.config.see_threshold)
    }

    /// Heuristic score of `mv` in centipawns.
    pub fn score(&self, board: &Board, mv: Move) -> i32 {
        let mut score = 0;

        if captured_piece(board, mv).is_some() {
            score += see_gain(board, mv).max(0);
            // Prefer taking with the cheaper piece.
            score += board.piece_on(mv.from).map_or(0, |p| 10 - piece_value(p) / 100);
        }
        if let Some(promotion) = mv.promotion {
            score += piece_value(promotion) - piece_value(Piece::Pawn);
        }

        let (file, rank) = (mv.to.file() as i32, mv.to.rank() as i32);
        if (2..=5).contains(&file) && (2..=5).contains(&rank) {
            score += CENTER_TARGET;
        }

        let mut after = board.clone();
        after.play_unchecked(mv);
        if !after.checkers().is_empty() {
            score += CHECK_BONUS;
        }
        score
    }
}

impl PriorPolicy<ChessPosition> for HeuristicPolicy {
    fn priors(&self, position: &ChessPosition, moves: &[Move]) -> Result<Vec<f32>, EvalError> {
        let temperature = self.config.softmax_temperature;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(EvalError::InvalidInput(format!(
                "softmax temperature must be > 0, got {temperature}"
            )));
        }

        let board = position.board();
        let scores: Vec<f32> = moves
            .iter()
            .map(|&mv| self.score(board, mv) as f32 / temperature)
            .collect();
        let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mut priors: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();

        if self.config.capture_filter == CaptureFilter::Soft {
            let safety = self.safety();
            for (prior, &mv) in priors.iter_mut().zip(moves) {
                if safety.is_unsafe_capture(board, mv) {
                    *prior *= self.config.unsafe_discount;
                }
            }
        }

        let sum: f32 = priors.iter().sum();
        if sum > 0.0 {
            for prior in &mut priors {
                *prior /= sum;
            }
        }
        Ok(priors)
    }

    fn filter_moves(&self, position: &ChessPosition, moves: &mut Vec<Move>) {
        if self.config.capture_filter == CaptureFilter::Hard {
            let safety = self.safety();
            moves.retain(|&mv| !safety.is_unsafe_capture(position.board(), mv));
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;

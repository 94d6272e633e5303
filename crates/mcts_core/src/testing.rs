//! Small deterministic game used by the unit tests.
//!
//! The root mover picks one of `root_values.len()` first moves; every later
//! position offers `fanout` moves and never ends unless a depth limit or a
//! mating first move is configured. The value of a line depends only on its
//! first move.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::EvalError;
use crate::game::{Estimate, GameState, PriorPolicy, TerminalStatus, ValueEstimator};

#[derive(Debug)]
pub struct Rules {
    /// Value of each first move for the root mover.
    pub root_values: Vec<f32>,
    pub fanout: u8,
    /// Positions this many plies deep are drawn.
    pub depth_limit: Option<usize>,
    /// First move that checkmates the opponent immediately.
    pub mating_move: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ToyState {
    pub path: Vec<u8>,
    pub rules: Arc<Rules>,
}

impl ToyState {
    pub fn new(root_values: &[f32]) -> Self {
        Self::with_rules(Rules {
            root_values: root_values.to_vec(),
            fanout: 1,
            depth_limit: None,
            mating_move: None,
        })
    }

    pub fn with_rules(rules: Rules) -> Self {
        Self {
            path: Vec::new(),
            rules: Arc::new(rules),
        }
    }

    /// Every position below the root offers two moves.
    pub fn branching(root_values: &[f32]) -> Self {
        Self::with_rules(Rules {
            root_values: root_values.to_vec(),
            fanout: 2,
            depth_limit: None,
            mating_move: None,
        })
    }

    /// Root with no legal moves that is not recognised as finished.
    pub fn stuck() -> Self {
        Self::new(&[])
    }
}

impl GameState for ToyState {
    type Move = u8;

    fn legal_moves(&self) -> Vec<u8> {
        if self.terminal_status() != TerminalStatus::Ongoing {
            return Vec::new();
        }
        let count = if self.path.is_empty() {
            self.rules.root_values.len() as u8
        } else {
            self.rules.fanout
        };
        (0..count).collect()
    }

    fn apply(&self, mv: u8) -> Self {
        let mut path = self.path.clone();
        path.push(mv);
        Self {
            path,
            rules: Arc::clone(&self.rules),
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for value in &self.rules.root_values {
            value.to_bits().hash(&mut hasher);
        }
        self.rules.fanout.hash(&mut hasher);
        self.path.hash(&mut hasher);
        hasher.finish()
    }

    fn terminal_status(&self) -> TerminalStatus {
        if self.path.len() == 1 && self.rules.mating_move == Some(self.path[0]) {
            return TerminalStatus::Loss;
        }
        match self.rules.depth_limit {
            Some(limit) if self.path.len() >= limit => TerminalStatus::Draw,
            _ => TerminalStatus::Ongoing,
        }
    }
}

/// Exact value of the line for the side to move.
#[derive(Debug, Default)]
pub struct ToyEstimator {
    pub calls: AtomicUsize,
}

impl ValueEstimator<ToyState> for ToyEstimator {
    fn estimate(&self, position: &ToyState) -> Result<Estimate, EvalError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let Some(&first) = position.path.first() else {
            return Ok(Estimate::Value(0.0));
        };
        let value = position.rules.root_values[first as usize];
        if position.path.len() % 2 == 0 {
            Ok(Estimate::Value(value))
        } else {
            Ok(Estimate::Value(-value))
        }
    }
}

/// Always returns the same estimate.
#[derive(Debug, Clone, Copy)]
pub struct ConstEstimator(pub Estimate);

impl ValueEstimator<ToyState> for ConstEstimator {
    fn estimate(&self, _position: &ToyState) -> Result<Estimate, EvalError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEstimator;

impl ValueEstimator<ToyState> for FailingEstimator {
    fn estimate(&self, _position: &ToyState) -> Result<Estimate, EvalError> {
        Err(EvalError::Failed("estimator offline".to_string()))
    }
}

/// Returns `weights` (truncated or padded with zeros) without normalising.
#[derive(Debug, Clone, Default)]
pub struct WeightedPolicy {
    pub weights: Vec<f32>,
}

impl PriorPolicy<ToyState> for WeightedPolicy {
    fn priors(&self, _position: &ToyState, moves: &[u8]) -> Result<Vec<f32>, EvalError> {
        Ok(moves
            .iter()
            .map(|&mv| self.weights.get(mv as usize).copied().unwrap_or(0.0))
            .collect())
    }
}

/// Returns the wrong number of priors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortPolicy;

impl PriorPolicy<ToyState> for ShortPolicy {
    fn priors(&self, _position: &ToyState, moves: &[u8]) -> Result<Vec<f32>, EvalError> {
        Ok(vec![1.0; moves.len().saturating_sub(1)])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPolicy;

impl PriorPolicy<ToyState> for FailingPolicy {
    fn priors(&self, _position: &ToyState, _moves: &[u8]) -> Result<Vec<f32>, EvalError> {
        Err(EvalError::InvalidInput("no network loaded".to_string()))
    }
}

/// Uniform priors, but drops every move listed in `banned`.
#[derive(Debug, Clone, Default)]
pub struct BanningPolicy {
    pub banned: Vec<u8>,
}

impl PriorPolicy<ToyState> for BanningPolicy {
    fn priors(&self, _position: &ToyState, moves: &[u8]) -> Result<Vec<f32>, EvalError> {
        Ok(crate::game::uniform(moves.len()))
    }

    fn filter_moves(&self, _position: &ToyState, moves: &mut Vec<u8>) {
        moves.retain(|mv| !self.banned.contains(mv));
    }
}

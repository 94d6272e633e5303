//! PUCT Monte Carlo Tree Search core.
//!
//! The search is generic over the game: anything implementing [`GameState`]
//! can be searched, with move priors supplied by a [`PriorPolicy`] and leaf
//! values by a [`ValueEstimator`]. Chess plugs in from the `mcts_engine` crate.
//!
//! # Architecture
//!
//! - [`SearchTree`]: arena of [`Node`]s, selection, expansion, backpropagation
//! - [`SearchEngine`]: owns the tree across moves, runs the simulation loop
//!   under a [`SearchBudget`], applies root noise and picks the final move
//! - [`MctsConfig`]: explicit tuning passed in at construction (TOML loadable)

pub mod budget;
pub mod config;
pub mod error;
pub mod game;
pub mod node;
pub mod noise;
pub mod search;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use budget::{SearchBudget, StopReason, StopSignal};
pub use config::{load_toml, MctsConfig};
pub use error::{ConfigError, EvalError, SearchError};
pub use game::{Estimate, GameState, PriorPolicy, TerminalStatus, UniformPolicy, ValueEstimator};
pub use node::{Node, NodeId};
pub use noise::{blend_root_noise, sample_by_visits, sample_noise};
pub use search::{SearchEngine, SearchOutcome, SearchProgress, SearchStats};
pub use tree::SearchTree;

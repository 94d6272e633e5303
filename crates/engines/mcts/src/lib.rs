//! MCTS chess engine.
//!
//! Plugs chess into the generic `mcts_core` search:
//! - [`ChessPosition`]: `cozy_chess::Board` plus repetition history
//! - [`HeuristicPolicy`]: softmax priors with a one-ply capture-safety filter
//! - [`StaticEvaluator`]: material, placement and mobility, in centipawns
//! - [`MctsEngine`]: the search behind a UCI-style interface

pub mod eval;
pub mod policy;
pub mod position;
pub mod see;

use std::path::Path;
use std::time::Duration;

use cozy_chess::Move;
use mcts_core::{
    ConfigError, GameState, MctsConfig, SearchBudget, SearchEngine, SearchError, SearchProgress,
    StopReason, StopSignal, TerminalStatus,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use eval::{evaluate, piece_value, StaticEvaluator};
pub use policy::{CaptureFilter, HeuristicPolicy, PolicyConfig};
pub use position::ChessPosition;
pub use see::{captured_piece, is_attacked, see_gain, CaptureSafety};

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    #[error("illegal move: {0}")]
    IllegalMove(String),
}

/// Full engine configuration, loadable from TOML:
///
/// ```toml
/// [search]
/// c_puct = 1.5
/// batch_size = 4
///
/// [policy]
/// capture_filter = "hard"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: MctsConfig,
    pub policy: PolicyConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        let discount = self.policy.unsafe_discount;
        if !(discount.is_finite() && (0.0..=1.0).contains(&discount)) {
            return Err(ConfigError::Invalid {
                field: "unsafe_discount",
                reason: "must be within [0, 1]",
            });
        }
        let temperature = self.policy.softmax_temperature;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(ConfigError::Invalid {
                field: "softmax_temperature",
                reason: "must be finite and > 0",
            });
        }
        Ok(())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = mcts_core::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Limits for one move, as given by a UCI `go` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub move_time: Option<Duration>,
    pub simulations: Option<u64>,
}

/// Moves assumed left in the game when the clock gives no `movestogo`.
const DEFAULT_MOVES_TO_GO: u32 = 30;

/// Kept back from the clock for communication lag.
const MOVE_OVERHEAD: Duration = Duration::from_millis(50);

impl SearchLimits {
    pub fn time(move_time: Duration) -> Self {
        Self {
            move_time: Some(move_time),
            simulations: None,
        }
    }

    pub fn simulations(n: u64) -> Self {
        Self {
            move_time: None,
            simulations: Some(n),
        }
    }

    /// Run until stopped.
    pub fn infinite() -> Self {
        Self::simulations(u64::MAX)
    }

    /// Share of the remaining clock to spend on this move.
    pub fn from_clock(remaining: Duration, increment: Duration, moves_to_go: Option<u32>) -> Self {
        let moves = moves_to_go.unwrap_or(DEFAULT_MOVES_TO_GO).max(1);
        let budget = remaining / moves + increment * 3 / 4;
        let ceiling = remaining.saturating_sub(MOVE_OVERHEAD);
        Self::time(budget.min(ceiling).max(Duration::from_millis(1)))
    }

    fn budget(&self, stop: &StopSignal) -> SearchBudget {
        let mut budget = match self.move_time {
            Some(move_time) => SearchBudget::movetime(move_time),
            None => SearchBudget::default(),
        };
        if let Some(n) = self.simulations {
            budget = budget.with_simulations(n);
        }
        budget.with_stop(stop.clone())
    }
}

/// Result of [`MctsEngine::search`].
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The best move found (None if no legal moves)
    pub best_move: Option<Move>,
    /// `best_move` in UCI notation.
    pub best_move_uci: Option<String>,
    /// Evaluation in centipawns from the side to move's perspective.
    pub score: i32,
    /// Moves to mate when the expected line ends in checkmate, see
    /// [`mate_distance`].
    pub mate: Option<i32>,
    pub simulations: u64,
    pub nodes: u64,
    /// Expected line, UCI notation.
    pub principal_variation: Vec<String>,
    /// Whether the search was ended by a stop request.
    pub stopped: bool,
    /// Whether the tree from the previous search was reused.
    pub reused: bool,
}

/// Centipawns equivalent of a search value, inverting `tanh(cp / scale)`.
pub fn value_to_centipawns(value: f32, scale: f32) -> i32 {
    let v = value.clamp(-0.999, 0.999);
    (v.atanh() * scale).round() as i32
}

/// Full moves until `line`, played from `position`, ends in checkmate.
/// Positive when the side to move gives mate, negative when it is mated,
/// 0 when `position` itself is checkmate. `None` if the line is illegal or
/// does not end in mate.
pub fn mate_distance(position: &ChessPosition, line: &[Move]) -> Option<i32> {
    let mut current = position.clone();
    for &mv in line {
        if !current.board().is_legal(mv) {
            return None;
        }
        current.play(mv);
    }
    if current.terminal_status() != TerminalStatus::Loss {
        return None;
    }
    let plies = line.len() as i32;
    Some(if plies % 2 == 1 {
        (plies + 1) / 2
    } else {
        -plies / 2
    })
}

/// Writes `line`, played from `position`, in UCI notation. Stops at the
/// first move that is not legal.
pub fn line_to_uci(position: &ChessPosition, line: &[Move]) -> Vec<String> {
    let mut current = position.clone();
    let mut out = Vec::with_capacity(line.len());
    for &mv in line {
        if !current.board().is_legal(mv) {
            break;
        }
        out.push(current.move_to_uci(mv));
        current.play(mv);
    }
    out
}

type ChessSearch = SearchEngine<ChessPosition, HeuristicPolicy, StaticEvaluator>;

/// PUCT chess engine. Keeps its tree between moves of the same game.
pub struct MctsEngine {
    search: ChessSearch,
    stop: StopSignal,
}

impl MctsEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let policy = HeuristicPolicy::new(config.policy);
        let search = SearchEngine::new(config.search, policy, StaticEvaluator)?;
        Ok(Self {
            search,
            stop: StopSignal::new(),
        })
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            search: self.search.config().clone(),
            policy: self.search.policy().config().clone(),
        }
    }

    /// Shared flag that ends the running search. It is not re-armed by
    /// [`MctsEngine::search`]; call [`StopSignal::reset`] before starting.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn search(
        &mut self,
        position: &ChessPosition,
        limits: SearchLimits,
    ) -> Result<SearchResult, SearchError> {
        self.search_with_info(position, limits, |_| {})
    }

    /// Like [`MctsEngine::search`], reporting progress along the way.
    pub fn search_with_info<F>(
        &mut self,
        position: &ChessPosition,
        limits: SearchLimits,
        on_info: F,
    ) -> Result<SearchResult, SearchError>
    where
        F: FnMut(&SearchProgress<Move>),
    {
        let budget = limits.budget(&self.stop);
        let outcome = self.search.search_with_progress(position, &budget, on_info)?;
        let scale = self.search.config().value_scale;

        Ok(SearchResult {
            best_move: outcome.best_move,
            best_move_uci: outcome.best_move.map(|mv| position.move_to_uci(mv)),
            score: value_to_centipawns(outcome.value, scale),
            mate: mate_distance(position, &outcome.principal_variation),
            simulations: outcome.simulations,
            nodes: outcome.nodes_visited,
            principal_variation: line_to_uci(position, &outcome.principal_variation),
            stopped: outcome.stop_reason == StopReason::Stopped,
            reused: outcome.reused,
        })
    }

    /// Drop the search tree.
    pub fn new_game(&mut self) {
        self.search.reset();
    }

    /// Apply a UCI option. Returns false if the name is unknown or the value
    /// is rejected.
    pub fn set_option(&mut self, name: &str, value: &str) -> bool {
        let mut config = self.config();
        let value = value.trim();
        let parsed = match name.to_ascii_lowercase().as_str() {
            "cpuct" => value.parse().map(|v| config.search.c_puct = v).is_ok(),
            "temperature" => value.parse().map(|v| config.search.temperature = v).is_ok(),
            "batchsize" => value.parse().map(|v| config.search.batch_size = v).is_ok(),
            "noiseepsilon" => value.parse().map(|v| config.search.noise_epsilon = v).is_ok(),
            "noisealpha" => value.parse().map(|v| config.search.noise_alpha = v).is_ok(),
            "reusedepth" => value.parse().map(|v| config.search.reuse_depth = v).is_ok(),
            "valuescale" => value.parse().map(|v| config.search.value_scale = v).is_ok(),
            "seed" => value.parse().map(|v| config.search.seed = Some(v)).is_ok(),
            "capturefilter" => value
                .parse()
                .map(|v| config.policy.capture_filter = v)
                .is_ok(),
            "seethreshold" => value.parse().map(|v| config.policy.see_threshold = v).is_ok(),
            "unsafediscount" => value
                .parse()
                .map(|v| config.policy.unsafe_discount = v)
                .is_ok(),
            _ => return false,
        };
        if !parsed || config.validate().is_err() {
            debug!(name, value, "rejected option value");
            return false;
        }

        self.search.policy_mut().set_config(config.policy);
        self.search.set_config(config.search).is_ok()
    }

    pub fn name(&self) -> &str {
        "MCTS v0.1"
    }

    pub fn author(&self) -> &str {
        "ML-chess"
    }
}

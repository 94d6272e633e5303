//! PUCT search driver.
//!
//! [`SearchEngine`] owns the tree between calls, runs simulations until the
//! [`SearchBudget`] is spent and picks the move to play. One simulation is:
//!
//! 1. select a path from the root by `Q + U`, charging virtual loss on it
//! 2. resolve the leaf: terminal value, or expand (once it has enough
//!    visits) and ask the estimator for a value
//! 3. backpropagate the value, flipping its sign once per ply
//!
//! With `batch_size > 1` several leaves are selected before any is resolved,
//! and resolution runs on the rayon pool. Tree mutation always happens on
//! the calling thread, in selection order.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::budget::{SearchBudget, StopReason};
use crate::config::MctsConfig;
use crate::error::{ConfigError, EvalError, SearchError};
use crate::game::{uniform, Estimate, GameState, PriorPolicy, TerminalStatus, ValueEstimator};
use crate::node::{Node, NodeId};
use crate::noise::{blend_root_noise, sample_by_visits, sample_noise};
use crate::tree::SearchTree;

/// Values slightly outside [-1, 1] are accepted and clamped.
const VALUE_TOLERANCE: f32 = 1e-4;

/// Diagnostics counters for one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Nodes expanded (children created).
    pub expansions: u64,
    /// Expansions that used uniform priors because the policy misbehaved.
    pub prior_fallbacks: u64,
    /// Leaf evaluations replaced by the neutral value.
    pub value_fallbacks: u64,
    /// In-flight selections that landed on a leaf already in the batch.
    pub collisions: u64,
}

/// Periodic report while a search runs.
#[derive(Debug, Clone)]
pub struct SearchProgress<M> {
    pub simulations: u64,
    pub elapsed_ms: u64,
    /// Sum of selection path lengths so far.
    pub nodes_visited: u64,
    pub nodes_per_second: u64,
    pub best_move: Option<M>,
    pub principal_variation: Vec<M>,
}

/// Result of [`SearchEngine::search`].
#[derive(Debug, Clone)]
pub struct SearchOutcome<M> {
    /// `None` when the root has no legal move.
    pub best_move: Option<M>,
    /// Expected value of `best_move` for the side to move, in [-1, 1].
    pub value: f32,
    pub simulations: u64,
    pub nodes_visited: u64,
    pub elapsed: Duration,
    pub principal_variation: Vec<M>,
    /// Root children and their visit counts, in enumeration order.
    pub visits: Vec<(M, u32)>,
    pub stop_reason: StopReason,
    /// Whether the search continued from the previous tree.
    pub reused: bool,
    pub stats: SearchStats,
}

/// Children and priors produced for a node.
struct Expansion<M> {
    moves: Vec<M>,
    priors: Vec<f32>,
    prior_fallback: bool,
}

/// Everything a simulation learned about its leaf, computed without
/// touching the tree.
struct LeafEval<M> {
    /// Side to move at the leaf.
    value: f32,
    /// The leaf turned out to be a finished game worth `value`.
    terminal: bool,
    expansion: Option<Expansion<M>>,
    value_fallback: bool,
}

struct Pending {
    path: Vec<NodeId>,
}

impl Pending {
    fn leaf(&self) -> NodeId {
        // Paths always start at the root.
        self.path[self.path.len() - 1]
    }
}

/// MCTS engine generic over the game, the prior policy and the value
/// estimator.
pub struct SearchEngine<G: GameState, P, V> {
    config: MctsConfig,
    policy: P,
    estimator: V,
    tree: Option<SearchTree<G>>,
    rng: StdRng,
}

impl<G, P, V> SearchEngine<G, P, V>
where
    G: GameState,
    P: PriorPolicy<G> + Sync,
    V: ValueEstimator<G> + Sync,
{
    pub fn new(config: MctsConfig, policy: P, estimator: V) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = make_rng(config.seed);
        Ok(Self {
            config,
            policy,
            estimator,
            tree: None,
            rng,
        })
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Replace the configuration. The tree is kept; a new seed reseeds.
    pub fn set_config(&mut self, config: MctsConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if config.seed != self.config.seed {
            self.rng = make_rng(config.seed);
        }
        self.config = config;
        Ok(())
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn estimator(&self) -> &V {
        &self.estimator
    }

    /// Tree left by the last search, if any.
    pub fn tree(&self) -> Option<&SearchTree<G>> {
        self.tree.as_ref()
    }

    /// Forget the tree (e.g. on a new game).
    pub fn reset(&mut self) {
        self.tree = None;
    }

    pub fn search(
        &mut self,
        position: &G,
        budget: &SearchBudget,
    ) -> Result<SearchOutcome<G::Move>, SearchError> {
        self.search_with_progress(position, budget, |_| {})
    }

    /// Search `position` until `budget` runs out, calling `on_progress` every
    /// `progress_interval` simulations and once at the end.
    pub fn search_with_progress<F>(
        &mut self,
        position: &G,
        budget: &SearchBudget,
        mut on_progress: F,
    ) -> Result<SearchOutcome<G::Move>, SearchError>
    where
        F: FnMut(&SearchProgress<G::Move>),
    {
        if !budget.is_bounded() {
            return Err(SearchError::UnboundedBudget);
        }
        let start = Instant::now();
        let mut stats = SearchStats::default();

        let root_moves = position.legal_moves();
        if root_moves.is_empty() {
            debug!("root has no legal moves");
            self.tree = None;
            return Ok(SearchOutcome {
                best_move: None,
                value: self.config.terminal_value(position.terminal_status()),
                simulations: 0,
                nodes_visited: 0,
                elapsed: start.elapsed(),
                principal_variation: Vec::new(),
                visits: Vec::new(),
                stop_reason: StopReason::SimulationLimit,
                reused: false,
                stats,
            });
        }

        let (mut tree, reused) = self.take_tree(position);
        if reused && tree.root_node().expanded {
            self.apply_root_noise(&mut tree);
        }

        // A forced move needs no search beyond one simulation.
        let forced = root_moves.len() == 1;
        let exhausted = |simulations: u64| {
            budget.exhausted(simulations).or_else(|| {
                (forced && simulations >= 1).then_some(StopReason::SimulationLimit)
            })
        };

        debug!(
            reused,
            tree_size = tree.len(),
            batch_size = self.config.batch_size,
            "starting search"
        );

        let mut simulations = 0u64;
        let mut nodes_visited = 0u64;
        let interval = self.config.progress_interval;

        let stop_reason = loop {
            if let Some(reason) = exhausted(simulations) {
                break reason;
            }

            let batch = self.select_batch(&mut tree, simulations, &exhausted, &mut stats);
            let results = self.resolve_batch(&tree, &batch);

            for (pending, eval) in batch.iter().zip(results) {
                self.apply_result(&mut tree, pending, eval, &mut stats);
                simulations += 1;
                nodes_visited += pending.path.len() as u64;

                if interval > 0 && simulations % interval == 0 {
                    on_progress(&progress(&tree, simulations, nodes_visited, start.elapsed()));
                }
            }
        };

        let elapsed = start.elapsed();
        let mut report = progress(&tree, simulations, nodes_visited, elapsed);

        let best = self.choose_child(&tree);
        let value = match best.map(|id| tree.get(id)) {
            Some(child) if child.visit_count > 0 => child.mean_value(),
            _ => -tree.root_node().mean_value(),
        };
        let mut best_move = best.and_then(|id| tree.get(id).mv);
        let mut principal_variation = tree.principal_variation();
        if best_move.is_none() && !tree.root_node().expanded {
            // Budget ran out before the root was expanded. The stored root
            // stays unexpanded; the move comes from the priors alone.
            best_move = self.highest_prior_move(&tree, &mut stats);
            principal_variation = best_move.into_iter().collect();
            report.best_move = best_move;
            report.principal_variation = principal_variation.clone();
        }
        on_progress(&report);

        info!(
            simulations,
            nodes = tree.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            value,
            ?stop_reason,
            "search finished"
        );

        let outcome = SearchOutcome {
            best_move,
            value,
            simulations,
            nodes_visited,
            elapsed,
            principal_variation,
            visits: tree.root_visits(),
            stop_reason,
            reused,
            stats,
        };
        self.tree = Some(tree);
        Ok(outcome)
    }

    /// Move choice on the current tree: most visited at temperature 0,
    /// otherwise sampled by visit count.
    pub fn select_move(&mut self) -> Option<G::Move> {
        let tree = self.tree.take()?;
        let mv = self.choose_child(&tree).and_then(|id| tree.get(id).mv);
        self.tree = Some(tree);
        mv
    }

    fn choose_child(&mut self, tree: &SearchTree<G>) -> Option<NodeId> {
        let root = tree.root_node();
        let visits: Vec<u32> = root
            .children
            .iter()
            .map(|&id| tree.get(id).visit_count)
            .collect();
        if visits.iter().all(|&n| n == 0) {
            return tree.best_child(tree.root());
        }
        sample_by_visits(&visits, self.config.temperature, &mut self.rng)
            .map(|i| root.children[i])
    }

    /// Continue from the previous tree if `position` is in it, otherwise
    /// start over.
    fn take_tree(&mut self, position: &G) -> (SearchTree<G>, bool) {
        let depth = self.config.reuse_depth;
        if let Some(mut tree) = self.tree.take() {
            if depth > 0 {
                if let Some(id) = tree.find(position.fingerprint(), depth) {
                    tree.promote(id);
                    tree.set_root_position(position.clone());
                    debug!(
                        visits = tree.root_node().visit_count,
                        nodes = tree.len(),
                        "reusing search tree"
                    );
                    return (tree, true);
                }
            }
            debug!("position not in previous tree, rebuilding");
        }
        (SearchTree::new(position.clone()), false)
    }

    /// Blend fresh noise into the root priors, starting from the clean
    /// policy priors so noise never accumulates across searches.
    fn apply_root_noise(&mut self, tree: &mut SearchTree<G>) {
        let base = tree.root_base_priors();
        if !self.config.noise_enabled() {
            tree.set_root_priors(&base);
            return;
        }
        let noise = sample_noise(&mut self.rng, base.len(), self.config.noise_alpha);
        let blended = blend_root_noise(&base, &noise, self.config.noise_epsilon);
        tree.set_root_priors(&blended);
    }

    fn select_batch(
        &self,
        tree: &mut SearchTree<G>,
        done: u64,
        exhausted: &impl Fn(u64) -> Option<StopReason>,
        stats: &mut SearchStats,
    ) -> Vec<Pending> {
        let mut batch: Vec<Pending> = Vec::with_capacity(self.config.batch_size);
        while batch.len() < self.config.batch_size {
            if !batch.is_empty() && exhausted(done + batch.len() as u64).is_some() {
                break;
            }
            let path = tree.select_path(self.config.c_puct, self.config.virtual_loss);
            let pending = Pending { path };
            let leaf = pending.leaf();
            if batch.iter().any(|p| p.leaf() == leaf) {
                stats.collisions += 1;
            }
            tree.materialize(leaf);
            tree.apply_virtual_loss(&pending.path);
            batch.push(pending);
        }
        if batch.len() > 1 {
            trace!(size = batch.len(), "selected leaf batch");
        }
        batch
    }

    fn resolve_batch(&self, tree: &SearchTree<G>, batch: &[Pending]) -> Vec<LeafEval<G::Move>> {
        let root = tree.root();
        if batch.len() == 1 {
            return batch
                .iter()
                .map(|p| self.resolve_leaf(tree.get(p.leaf()), p.leaf() == root))
                .collect();
        }
        batch
            .par_iter()
            .map(|p| self.resolve_leaf(tree.get(p.leaf()), p.leaf() == root))
            .collect()
    }

    fn resolve_leaf(&self, node: &Node<G>, is_root: bool) -> LeafEval<G::Move> {
        if node.terminal {
            return LeafEval {
                value: node.terminal_value,
                terminal: true,
                expansion: None,
                value_fallback: false,
            };
        }
        let Some(position) = node.position.as_ref() else {
            warn!("leaf position unavailable, using neutral value");
            return LeafEval {
                value: 0.0,
                terminal: false,
                expansion: None,
                value_fallback: true,
            };
        };

        if !is_root {
            let status = position.terminal_status();
            if status != TerminalStatus::Ongoing {
                return LeafEval {
                    value: self.config.terminal_value(status),
                    terminal: true,
                    expansion: None,
                    value_fallback: false,
                };
            }
        }

        let mut expansion = None;
        if !node.expanded && node.visit_count >= self.config.min_visits_for_expansion {
            match self.build_expansion(position) {
                Some(built) => expansion = Some(built),
                None => {
                    return LeafEval {
                        value: self.config.loss_value,
                        terminal: true,
                        expansion: None,
                        value_fallback: false,
                    }
                }
            }
        }

        let (value, value_fallback) = self.checked_value(self.estimator.estimate(position));
        LeafEval {
            value,
            terminal: false,
            expansion,
            value_fallback,
        }
    }

    /// Filtered moves and validated priors. `None` if there is no legal move.
    fn build_expansion(&self, position: &G) -> Option<Expansion<G::Move>> {
        let mut moves = position.legal_moves();
        if moves.is_empty() {
            return None;
        }
        let mut filtered = moves.clone();
        self.policy.filter_moves(position, &mut filtered);
        if !filtered.is_empty() {
            moves = filtered;
        }

        let (priors, prior_fallback) = self.checked_priors(position, &moves);
        Some(Expansion {
            moves,
            priors,
            prior_fallback,
        })
    }

    fn checked_priors(&self, position: &G, moves: &[G::Move]) -> (Vec<f32>, bool) {
        let priors = match self.policy.priors(position, moves) {
            Ok(priors) => priors,
            Err(err) => {
                warn!(error = %err, "prior policy failed, using uniform priors");
                return (uniform(moves.len()), true);
            }
        };
        if priors.len() != moves.len() {
            warn!(
                expected = moves.len(),
                got = priors.len(),
                "prior policy returned wrong number of priors, using uniform priors"
            );
            return (uniform(moves.len()), true);
        }
        if priors.iter().any(|p| !p.is_finite() || *p < 0.0) {
            warn!("prior policy returned invalid priors, using uniform priors");
            return (uniform(moves.len()), true);
        }
        let sum: f32 = priors.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            warn!(sum, "prior policy returned zero mass, using uniform priors");
            return (uniform(moves.len()), true);
        }
        (priors.into_iter().map(|p| p / sum).collect(), false)
    }

    fn checked_value(&self, estimate: Result<Estimate, EvalError>) -> (f32, bool) {
        match estimate {
            Ok(Estimate::Value(v)) if v.is_finite() && v.abs() <= 1.0 + VALUE_TOLERANCE => {
                (v.clamp(-1.0, 1.0), false)
            }
            Ok(Estimate::Raw(score)) if score.is_finite() => {
                ((score / self.config.value_scale).tanh(), false)
            }
            Ok(other) => {
                warn!(estimate = ?other, "value estimate out of range, using neutral value");
                (0.0, true)
            }
            Err(err) => {
                warn!(error = %err, "value estimator failed, using neutral value");
                (0.0, true)
            }
        }
    }

    fn apply_result(
        &mut self,
        tree: &mut SearchTree<G>,
        pending: &Pending,
        eval: LeafEval<G::Move>,
        stats: &mut SearchStats,
    ) {
        let leaf = pending.leaf();
        tree.remove_virtual_loss(&pending.path);

        if eval.terminal && !tree.get(leaf).terminal {
            tree.mark_terminal(leaf, eval.value);
        }
        if let Some(expansion) = eval.expansion {
            // An earlier simulation of the same batch may have expanded it.
            if !tree.get(leaf).expanded {
                tree.expand(leaf, &expansion.moves, &expansion.priors);
                stats.expansions += 1;
                if expansion.prior_fallback {
                    stats.prior_fallbacks += 1;
                }
                if leaf == tree.root() {
                    self.apply_root_noise(tree);
                }
            }
        }
        if eval.value_fallback {
            stats.value_fallbacks += 1;
        }

        tree.backpropagate(&pending.path, eval.value);
    }

    /// Best move by prior for an unexpanded root, without touching the tree.
    fn highest_prior_move(
        &self,
        tree: &SearchTree<G>,
        stats: &mut SearchStats,
    ) -> Option<G::Move> {
        let expansion = tree
            .root_position()
            .and_then(|position| self.build_expansion(position))?;
        if expansion.prior_fallback {
            stats.prior_fallbacks += 1;
        }
        let mut best: Option<(G::Move, f32)> = None;
        for (&mv, &prior) in expansion.moves.iter().zip(&expansion.priors) {
            if best.map_or(true, |(_, top)| prior > top) {
                best = Some((mv, prior));
            }
        }
        best.map(|(mv, _)| mv)
    }
}

fn progress<G: GameState>(
    tree: &SearchTree<G>,
    simulations: u64,
    nodes_visited: u64,
    elapsed: Duration,
) -> SearchProgress<G::Move> {
    let secs = elapsed.as_secs_f64();
    let nodes_per_second = if secs > 0.0 {
        (nodes_visited as f64 / secs) as u64
    } else {
        0
    };
    SearchProgress {
        simulations,
        elapsed_ms: elapsed.as_millis() as u64,
        nodes_visited,
        nodes_per_second,
        best_move: tree.best_child(tree.root()).and_then(|id| tree.get(id).mv),
        principal_variation: tree.principal_variation(),
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod search_tests;

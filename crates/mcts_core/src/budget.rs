//! Search budgets and cooperative cancellation.
//!
//! A budget bounds a search by wall-clock deadline, by simulation count, or
//! both. The [`StopSignal`] lets another thread (e.g. a UCI `stop` command)
//! end the search early. All conditions are checked between simulations; a
//! simulation that has started always finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared stop flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every search holding this signal to stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Re-arm the signal before starting a new search.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    /// Fast atomic load, suitable for calling every simulation.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }
}

/// Why a search loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Deadline,
    SimulationLimit,
    Stopped,
}

/// Limits for a single search call.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    /// Absolute wall-clock time at which the search must stop.
    pub deadline: Option<Instant>,
    /// Maximum number of simulations.
    pub max_simulations: Option<u64>,
    /// External stop request.
    pub stop: StopSignal,
}

impl SearchBudget {
    /// Run exactly `n` simulations unless stopped earlier.
    pub fn simulations(n: u64) -> Self {
        Self {
            max_simulations: Some(n),
            ..Self::default()
        }
    }

    /// Search for `move_time`, starting now.
    pub fn movetime(move_time: Duration) -> Self {
        Self::deadline(Instant::now() + move_time)
    }

    pub fn deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    pub fn with_simulations(mut self, n: u64) -> Self {
        self.max_simulations = Some(n);
        self
    }

    pub fn with_stop(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// A budget with neither a deadline nor a simulation limit never ends.
    pub fn is_bounded(&self) -> bool {
        self.deadline.is_some() || self.max_simulations.is_some()
    }

    /// Checked at the top of every simulation.
    pub fn exhausted(&self, simulations: u64) -> Option<StopReason> {
        if self.stop.is_stopped() {
            return Some(StopReason::Stopped);
        }
        if let Some(max) = self.max_simulations {
            if simulations >= max {
                return Some(StopReason::SimulationLimit);
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(StopReason::Deadline);
            }
        }
        None
    }

    /// Time left before the deadline (None if there is no deadline).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod budget_tests;

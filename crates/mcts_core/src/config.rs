//! Search configuration.
//!
//! A config value is handed to the engine at construction time; nothing is
//! global, so engines running side by side can be tuned independently.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::game::TerminalStatus;

/// Tuning parameters for PUCT search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Exploration constant in `U = c_puct * P * sqrt(N_parent) / (1 + N)`.
    pub c_puct: f32,

    /// Value charged per in-flight traversal when computing Q.
    pub virtual_loss: f32,

    /// A leaf is expanded once it has been visited this many times.
    /// 1 means: evaluate on the first visit, expand on the second.
    pub min_visits_for_expansion: u32,

    /// Fraction of root prior replaced by exploration noise (0 disables).
    pub noise_epsilon: f32,

    /// Concentration of the root noise. Smaller values give spikier noise.
    pub noise_alpha: f32,

    /// Final move selection: 0 picks the most visited move, higher values
    /// sample proportionally to `visits^(1/temperature)`.
    pub temperature: f32,

    /// Value of a position whose side to move has lost.
    pub loss_value: f32,

    /// Value of a drawn position (contempt can be expressed here).
    pub draw_value: f32,

    /// Divisor applied before `tanh` to unbounded estimator scores.
    pub value_scale: f32,

    /// Number of leaves selected before they are evaluated together.
    pub batch_size: usize,

    /// Progress is reported every this many simulations (0 disables).
    pub progress_interval: u64,

    /// How many plies below the previous root a new position is looked up
    /// for tree reuse (0 always rebuilds).
    pub reuse_depth: usize,

    /// Seed for noise and move sampling. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: 1.5,
            virtual_loss: 1.0,
            min_visits_for_expansion: 1,
            noise_epsilon: 0.25,
            noise_alpha: 0.3,
            temperature: 0.0,
            loss_value: -1.0,
            draw_value: 0.0,
            value_scale: 400.0,
            batch_size: 1,
            progress_interval: 100,
            reuse_depth: 2,
            seed: None,
        }
    }
}

impl MctsConfig {
    /// Config for analysis and match play: no noise, greedy final choice.
    pub fn for_evaluation() -> Self {
        Self {
            noise_epsilon: 0.0,
            temperature: 0.0,
            ..Self::default()
        }
    }

    /// Deterministic config for tests.
    pub fn for_testing() -> Self {
        Self {
            noise_epsilon: 0.0,
            temperature: 0.0,
            progress_interval: 0,
            seed: Some(0),
            ..Self::default()
        }
    }

    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_noise(mut self, epsilon: f32, alpha: f32) -> Self {
        self.noise_epsilon = epsilon;
        self.noise_alpha = alpha;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_min_visits_for_expansion(mut self, visits: u32) -> Self {
        self.min_visits_for_expansion = visits;
        self
    }

    pub fn with_reuse_depth(mut self, depth: usize) -> Self {
        self.reuse_depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Whether root noise is blended into the priors.
    pub fn noise_enabled(&self) -> bool {
        self.noise_epsilon > 0.0
    }

    /// Leaf value for a finished game, side-to-move perspective.
    pub fn terminal_value(&self, status: TerminalStatus) -> f32 {
        match status {
            TerminalStatus::Loss => self.loss_value,
            TerminalStatus::Win => -self.loss_value,
            TerminalStatus::Draw | TerminalStatus::Ongoing => self.draw_value,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        }

        if !(self.c_puct.is_finite() && self.c_puct > 0.0) {
            return invalid("c_puct", "must be finite and > 0");
        }
        if !(self.virtual_loss.is_finite() && self.virtual_loss >= 0.0) {
            return invalid("virtual_loss", "must be finite and >= 0");
        }
        if !(self.noise_epsilon.is_finite() && (0.0..=1.0).contains(&self.noise_epsilon)) {
            return invalid("noise_epsilon", "must be within [0, 1]");
        }
        if self.noise_enabled() && !(self.noise_alpha.is_finite() && self.noise_alpha > 0.0) {
            return invalid("noise_alpha", "must be finite and > 0 when noise is enabled");
        }
        if !(self.temperature.is_finite() && self.temperature >= 0.0) {
            return invalid("temperature", "must be finite and >= 0");
        }
        if !(self.loss_value.is_finite() && (-1.0..=0.0).contains(&self.loss_value)) {
            return invalid("loss_value", "must be within [-1, 0]");
        }
        if !(self.draw_value.is_finite() && (-1.0..=1.0).contains(&self.draw_value)) {
            return invalid("draw_value", "must be within [-1, 1]");
        }
        if !(self.value_scale.is_finite() && self.value_scale > 0.0) {
            return invalid("value_scale", "must be finite and > 0");
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be > 0");
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Read any serde-deserialisable config from a TOML file.
pub fn load_toml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;

//! Error types shared by the search core.

use thiserror::Error;

/// Configuration could not be loaded or failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Errors returned synchronously by [`crate::SearchEngine::search`].
///
/// Runtime evaluation problems are never surfaced here: they are recovered
/// inside the search and counted in [`crate::SearchStats`].
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search budget needs a deadline or a simulation limit")]
    UnboundedBudget,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Failure reported by a prior policy or value estimator.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("evaluation failed: {0}")]
    Failed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

//! Error types for credential resolution

use std::fmt;
use std::path::PathBuf;

use crate::source::StrategyKind;

/// Why a single strategy did not produce a credential.
///
/// None of these stop the chain; the resolver records them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("not configured")]
    NotConfigured,

    #[error("{0}")]
    Failed(String),

    #[error("token file {} not found; interactive authentication required (run `google-sheets-mcp login`)", .0.display())]
    TokenFileMissing(PathBuf),
}

impl From<google_auth::Error> for StrategyError {
    fn from(e: google_auth::Error) -> Self {
        StrategyError::Failed(e.to_string())
    }
}

/// One strategy's result, kept for the terminal diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    pub strategy: StrategyKind,
    pub error: StrategyError,
}

impl fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {}: {}",
            self.strategy.position(),
            self.strategy.label(),
            self.error
        )
    }
}

/// Errors from credential resolution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("all authentication methods failed; configure credentials ({})", summarize(.attempts))]
    AuthExhausted { attempts: Vec<StrategyAttempt> },
}

fn summarize(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias for resolution.
pub type Result<T> = std::result::Result<T, Error>;

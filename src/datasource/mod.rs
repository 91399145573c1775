//! Match-result sources: fetching battle logs and turning them into match results.

use async_trait::async_trait;
use thiserror::Error;

pub mod battle_log;
pub mod http;
pub mod mock;

pub use battle_log::{parse_battle_log, ParsedBattle, UnitLine};
pub use http::HttpReplaySource;
pub use mock::MockReplaySource;

/// Source of raw battle logs, addressed by replay URL.
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait ReplaySource: Send + Sync {
    /// Fetch the plain-text battle log behind `replay_url`.
    async fn fetch_log(&self, replay_url: &str) -> Result<String, ReplayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("rate limited")]
    RateLimited,
    #[error("malformed battle log: {0}")]
    Parse(String),
    #[error("battle log does not fit match: {0}")]
    Mismatch(String),
}

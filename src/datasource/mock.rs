//! Mock replay source for testing without network calls.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ReplayError, ReplaySource};

/// Serves predefined battle logs keyed by replay URL.
#[derive(Debug, Clone, Default)]
pub struct MockReplaySource {
    logs: HashMap<String, String>,
}

impl MockReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `log` for `replay_url`.
    pub fn with_log(mut self, replay_url: impl Into<String>, log: impl Into<String>) -> Self {
        self.logs.insert(replay_url.into(), log.into());
        self
    }
}

#[async_trait]
impl ReplaySource for MockReplaySource {
    async fn fetch_log(&self, replay_url: &str) -> Result<String, ReplayError> {
        self.logs
            .get(replay_url)
            .cloned()
            .ok_or_else(|| ReplayError::Http {
                status: 404,
                message: format!("no replay at {}", replay_url),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_serves_known_logs_only() {
        let mock = MockReplaySource::new().with_log("https://replay/1", "|win|Ash");
        assert_eq!(mock.fetch_log("https://replay/1").await.unwrap(), "|win|Ash");

        let err = mock.fetch_log("https://replay/2").await.unwrap_err();
        assert!(matches!(err, ReplayError::Http { status: 404, .. }));
    }
}

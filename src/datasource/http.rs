//! HTTP replay fetcher.

use std::time::Duration;

use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use tracing::debug;

use super::{ReplayError, ReplaySource};

/// Fetches `<replay>.log` documents from a replay server.
#[derive(Debug, Clone)]
pub struct HttpReplaySource {
    client: Client,
    max_elapsed: Duration,
}

impl HttpReplaySource {
    /// `timeout` bounds each request and the total retry window.
    pub fn new(timeout: Duration) -> Result<Self, ReplayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            max_elapsed: timeout,
        })
    }

    /// The raw log lives next to the replay page with a `.log` suffix.
    pub fn log_url(replay_url: &str) -> String {
        let trimmed = replay_url.trim();
        let base = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        if base.ends_with(".log") {
            base.to_string()
        } else {
            format!("{}.log", base)
        }
    }
}

#[async_trait]
impl ReplaySource for HttpReplaySource {
    async fn fetch_log(&self, replay_url: &str) -> Result<String, ReplayError> {
        let url = Self::log_url(replay_url);
        debug!(url = %url, "Fetching battle log");

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ReplayError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ReplayError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ReplayError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ReplayError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(ReplayError::Network(e.to_string())))
        })
        .await
    }
}

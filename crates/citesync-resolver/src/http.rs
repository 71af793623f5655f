use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{ResolveError, Result};

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// HTTP client that keeps a minimum spacing between its own requests.
///
/// The spacing state belongs to the instance, so two sources never wait on
/// each other. Every request is sent once; retrying is the coordinator's job.
pub struct RateLimitedClient {
    client: reqwest::Client,
    source_name: String,
    min_interval: Duration,
    timeout: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitedClient {
    pub fn new(
        source_name: &str,
        min_interval: Duration,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            source_name: source_name.to_string(),
            min_interval,
            timeout,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    /// Send one GET and map the response status onto [`ResolveError`].
    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        self.wait_for_rate_limit().await;
        debug!(source = %self.source_name, %url, "GET");

        let resp = match self.client.get(url).headers(headers).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Err(ResolveError::Timeout(self.timeout.as_millis() as u64));
            }
            Err(e) => return Err(ResolveError::Http(e)),
        };

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Err(ResolveError::RateLimit(self.source_name.clone(), wait))
            }
            StatusCode::NOT_FOUND => Err(ResolveError::NotFound(url.to_string())),
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                Err(ResolveError::ApiError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
            _ => resp.text().await.map_err(ResolveError::Http),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get_json_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_json_with_headers<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<T> {
        let text = self.get_with_headers(url, headers).await?;
        serde_json::from_str(&text).map_err(|e| ResolveError::Parse(e.to_string()))
    }
}

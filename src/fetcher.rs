use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{ScrapeError, TransientFetchFailure};
use crate::notify::Notifier;

const USER_AGENT: &str = concat!("hero_roles/", env!("CARGO_PKG_VERSION"));

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one GET. `Err` means no usable response arrived at all.
    async fn get(&self, url: &str) -> Result<Reply, String>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Reply, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(Reply { status, body })
    }
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Attempt budget and backoff base. Delay before retry `n` is `base * n²`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_limit: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_mul(attempt))
    }
}

pub struct Fetcher<T, S, N> {
    transport: T,
    sleeper: S,
    notifier: N,
    policy: RetryPolicy,
}

impl<T: Transport, S: Sleeper, N: Notifier> Fetcher<T, S, N> {
    pub fn new(transport: T, sleeper: S, notifier: N, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            notifier,
            policy,
        }
    }

    /// GET `base_url + path`, retrying failed attempts with quadratic backoff.
    /// When the budget runs out the failure is escalated through the notifier
    /// and `FetchExhausted` is returned.
    pub async fn fetch(
        &self,
        base_url: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        let url = format!("{}{}", base_url, path);
        let limit = self.policy.retry_limit.max(1);
        let mut attempt = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let outcome = tokio::select! {
                r = self.transport.get(&url) => r,
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            };

            let failure = match outcome {
                Ok(reply) if reply.is_success() => {
                    info!("Fetched {} ({} bytes)", url, reply.body.len());
                    return Ok(reply.body);
                }
                Ok(reply) => TransientFetchFailure::UnsuccessfulResponse {
                    status: reply.status,
                },
                Err(e) => TransientFetchFailure::Transport(e),
            };

            attempt += 1;
            if attempt >= limit {
                self.escalate(&url, attempt, &failure).await;
                return Err(ScrapeError::FetchExhausted {
                    url,
                    attempts: attempt,
                    last: failure,
                });
            }

            let backoff = self.policy.backoff(attempt);
            warn!(
                "Fetch of {} failed (attempt {}/{}): {}; backing off {:.1}s",
                url,
                attempt,
                limit,
                failure,
                backoff.as_secs_f64()
            );

            tokio::select! {
                _ = self.sleeper.sleep(backoff) => {}
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            }
        }
    }

    async fn escalate(&self, url: &str, attempts: u32, failure: &TransientFetchFailure) {
        error!("Giving up on {} after {} attempts: {}", url, attempts, failure);

        let subject = format!("Hero role scrape failed: {}", failure.class());
        let body = format!(
            "Querying {} failed {} times in a row.\nLast failure: {}\n",
            url, attempts, failure
        );
        if !self.notifier.notify(&subject, &body).await {
            warn!("Failure notification for {} was not delivered", url);
        }
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::RemoteError;

/// Exponential backoff timing: `min(base * 2^attempt, cap)` plus jitter in `[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(32),
            jitter: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// The delay before retry number `attempt + 1`, without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// [`delay`](Self::delay) plus a uniformly random jitter.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay(attempt);
        if self.jitter.is_zero() {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..self.jitter.as_secs_f64());
        delay + Duration::from_secs_f64(jitter)
    }
}

/// Failures the executor knows how to classify.
pub trait Retryable: Sized {
    /// True if waiting and trying again may succeed.
    fn is_transient(&self) -> bool;

    /// The same failure, annotated with how many retries were spent on it.
    fn gave_up(self, retries: u32, attempts: u32) -> Self;
}

impl Retryable for RemoteError {
    fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    fn gave_up(mut self, retries: u32, attempts: u32) -> Self {
        self.message = format!(
            "gave up after {retries} retries ({attempts} attempts): {}",
            self.message
        );
        self
    }
}

/// Something that can wait. Swapped out in tests to observe the delays.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Runs operations, retrying transient failures with exponential backoff.
#[derive(Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Wait out the backoff delay for `attempt` (jitter included).
    pub async fn pause(&self, attempt: u32) {
        self.sleeper.sleep(self.policy.jittered_delay(attempt)).await;
    }

    /// Run `operation` until it succeeds, fails permanently, or has been
    /// retried `max_retries` times. Negative limits mean no retries.
    pub async fn run<T, E, F, Fut>(&self, max_retries: i64, mut operation: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_retries = u32::try_from(max_retries.max(0)).unwrap_or(u32::MAX);
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_retries => {
                    return Err(e.gave_up(attempt, attempt + 1));
                }
                Err(e) => {
                    let delay = self.policy.jittered_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying: {e}"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backoff")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

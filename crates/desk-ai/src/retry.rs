//! Bounded exponential backoff with jitter for collaborator calls

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::providers::{AnswerGenerator, Classifier, Embedder, TaskDecomposer};
use crate::{AnswerRequest, Classification, Embedding, Error, Result, SplitTask};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Upper bound of the uniform random delay added to each backoff
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// A config that never waits, for tests and offline tools
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Calculate delay for a given attempt (0-indexed), without jitter.
    ///
    /// Multipliers below 1.0 (or NaN) are treated as 1.0 so delays never shrink.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.max(1.0);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier.powi(attempt as i32);
        // f64::min drops a NaN operand, leaving the cap
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    /// Backoff for an attempt plus uniform jitter, honoring a server-provided retry-after
    pub fn delay_for_error(&self, attempt: u32, error: &Error) -> Duration {
        let mut delay = self.delay_for_attempt(attempt);
        if let Error::RateLimited {
            retry_after: Some(secs),
        } = error
        {
            delay = delay.max(Duration::from_secs(*secs).min(self.max_delay));
        }
        let jitter = self.jitter.as_secs_f64();
        if jitter > 0.0 {
            delay += Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=jitter));
        }
        delay
    }
}

/// Run `call` until it succeeds, fails with a non-transient error, or retries run out
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < config.max_retries && e.is_retryable() {
                    let delay = config.delay_for_error(attempt, &e);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation,
                        attempt + 1,
                        config.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(e);
            }
        }
    }
}

/// Wraps any collaborator so each call goes through [`with_retry`]
pub struct Retrying<C> {
    inner: C,
    config: RetryConfig,
}

impl<C> Retrying<C> {
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: Classifier> Classifier for Retrying<C> {
    async fn classify(&self, text: &str) -> Result<Classification> {
        with_retry(&self.config, "classify", move || self.inner.classify(text)).await
    }
}

#[async_trait]
impl<C: TaskDecomposer> TaskDecomposer for Retrying<C> {
    async fn split(&self, text: &str) -> Result<Vec<SplitTask>> {
        with_retry(&self.config, "split", move || self.inner.split(text)).await
    }
}

#[async_trait]
impl<C: AnswerGenerator> AnswerGenerator for Retrying<C> {
    async fn answer(&self, request: &AnswerRequest) -> Result<String> {
        with_retry(&self.config, "answer", move || self.inner.answer(request)).await
    }
}

#[async_trait]
impl<C: Embedder> Embedder for Retrying<C> {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        with_retry(&self.config, "embed", move || self.inner.embed(text)).await
    }
}

//! Retry policy and executor.
//!
//! Retries a fallible async operation against exponential backoff with
//! cryptographically-seeded jitter, classifying errors by downcasting to
//! [`PluginError`] and checking category + a configurable allow-list of
//! retryable codes.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backoff::calculate_base_delay;
use crate::error::{Code, PluginError};
use crate::jitter::{apply_jitter, CryptoUniformSource, UniformSource};
use crate::sleeper::{Sleeper, TokioSleeper};

/// `{MaxRetries, BaseDelay, MaxDelay, Multiplier, JitterFactor, RetryableErrors}`.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
    retryable_errors: HashSet<Code>,
    sleeper: Arc<dyn Sleeper>,
    jitter_source: Arc<dyn UniformSource>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("multiplier", &self.multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .field("retryable_errors", &self.retryable_errors)
            .finish()
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("max_retries must be > 0 (got {0})")]
    InvalidMaxRetries(usize),
    #[error("multiplier must be > 1.0 (got {0})")]
    InvalidMultiplier(String),
    #[error("jitter_factor must be in [0, 0.5] (got {0})")]
    InvalidJitterFactor(String),
    #[error("base_delay must be <= max_delay")]
    BaseDelayExceedsMaxDelay,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// `{MaxRetries=3, BaseDelay=100ms, MaxDelay=10s, Multiplier=2.0, JitterFactor=0.1}`,
    /// retrying every transient code.
    pub fn default_policy() -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(3)
            .unwrap()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .unwrap()
            .multiplier(2.0)
            .unwrap()
            .jitter_factor(0.1)
            .unwrap()
            .build()
            .expect("default_policy is internally valid")
    }

    /// Fewer, slower retries: `{MaxRetries=2, BaseDelay=500ms, MaxDelay=30s, Multiplier=3.0, JitterFactor=0.2}`.
    pub fn conservative() -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(2)
            .unwrap()
            .base_delay(Duration::from_millis(500))
            .max_delay(Duration::from_secs(30))
            .unwrap()
            .multiplier(3.0)
            .unwrap()
            .jitter_factor(0.2)
            .unwrap()
            .build()
            .expect("conservative is internally valid")
    }

    /// More, faster retries: `{MaxRetries=5, BaseDelay=50ms, MaxDelay=5s, Multiplier=1.5, JitterFactor=0.3}`.
    pub fn aggressive() -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(5)
            .unwrap()
            .base_delay(Duration::from_millis(50))
            .max_delay(Duration::from_secs(5))
            .unwrap()
            .multiplier(1.5)
            .unwrap()
            .jitter_factor(0.3)
            .unwrap()
            .build()
            .expect("aggressive is internally valid")
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// `min(base_delay * multiplier^attempt, max_delay)` with jitter applied.
    fn calculate_delay(&self, attempt: usize) -> Duration {
        let base = calculate_base_delay(self.base_delay, self.multiplier, self.max_delay, attempt);
        apply_jitter(base, self.jitter_factor, self.jitter_source.as_ref())
    }

    /// `attempt < MaxRetries`, `err`'s category is transient, and its code is
    /// in `RetryableErrors`.
    pub fn should_retry(&self, err: &PluginError, attempt: usize) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        err.is_transient() && self.retryable_errors.contains(&err.code)
    }

    /// Runs `operation` under this policy, honoring `cancellation` during the
    /// inter-attempt sleep. On cancellation returns [`RetryOutcome::Cancelled`]
    /// rather than the last operation error.
    pub async fn execute<T, Fut, Op>(
        &self,
        cancellation: &CancellationToken,
        mut operation: Op,
    ) -> Result<T, RetryOutcome>
    where
        Fut: Future<Output = Result<T, PluginError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        for attempt in 0..=self.max_retries {
            if cancellation.is_cancelled() {
                return Err(RetryOutcome::Cancelled);
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // Cancellation observed mid-operation always wins over
                    // the operation's own error, even on the final attempt.
                    if cancellation.is_cancelled() {
                        return Err(RetryOutcome::Cancelled);
                    }
                    if !self.should_retry(&err, attempt) {
                        return Err(RetryOutcome::Failed(err));
                    }
                    if attempt == self.max_retries {
                        return Err(RetryOutcome::Failed(err));
                    }

                    let delay = self.calculate_delay(attempt);
                    tracing::debug!(attempt, ?delay, "retry: sleeping before next attempt");

                    tokio::select! {
                        _ = cancellation.cancelled() => return Err(RetryOutcome::Cancelled),
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
            }
        }

        unreachable!("retry loop always returns within max_retries + 1 attempts")
    }
}

/// Result of [`RetryPolicy::execute`]: the wrapped operation's own error, or
/// cancellation observed while waiting between attempts.
#[derive(Debug)]
pub enum RetryOutcome {
    Failed(PluginError),
    Cancelled,
}

impl std::fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryOutcome::Failed(e) => write!(f, "{}", e),
            RetryOutcome::Cancelled => write!(f, "retry cancelled"),
        }
    }
}

impl std::error::Error for RetryOutcome {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetryOutcome::Failed(e) => Some(e),
            RetryOutcome::Cancelled => None,
        }
    }
}

pub struct RetryPolicyBuilder {
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_factor: f64,
    retryable_errors: HashSet<Code>,
    sleeper: Arc<dyn Sleeper>,
    jitter_source: Arc<dyn UniformSource>,
}

fn default_retryable_errors() -> HashSet<Code> {
    [Code::NetworkTimeout, Code::ServiceUnavailable, Code::RateLimited, Code::TemporaryFailure, Code::CircuitOpen]
        .into_iter()
        .collect()
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
            retryable_errors: default_retryable_errors(),
            sleeper: Arc::new(TokioSleeper),
            jitter_source: Arc::new(CryptoUniformSource),
        }
    }

    pub fn max_retries(mut self, max_retries: usize) -> Result<Self, BuildError> {
        if max_retries == 0 {
            return Err(BuildError::InvalidMaxRetries(max_retries));
        }
        self.max_retries = max_retries;
        Ok(self)
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Result<Self, BuildError> {
        self.max_delay = max_delay;
        Ok(self)
    }

    pub fn multiplier(mut self, multiplier: f64) -> Result<Self, BuildError> {
        if !(multiplier > 1.0) {
            return Err(BuildError::InvalidMultiplier(multiplier.to_string()));
        }
        self.multiplier = multiplier;
        Ok(self)
    }

    pub fn jitter_factor(mut self, jitter_factor: f64) -> Result<Self, BuildError> {
        if !(0.0..=0.5).contains(&jitter_factor) {
            return Err(BuildError::InvalidJitterFactor(jitter_factor.to_string()));
        }
        self.jitter_factor = jitter_factor;
        Ok(self)
    }

    pub fn retryable_errors(mut self, codes: impl IntoIterator<Item = Code>) -> Self {
        self.retryable_errors = codes.into_iter().collect();
        self
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_jitter_source<S: UniformSource + 'static>(mut self, source: S) -> Self {
        self.jitter_source = Arc::new(source);
        self
    }

    pub fn build(self) -> Result<RetryPolicy, BuildError> {
        if self.base_delay > self.max_delay {
            return Err(BuildError::BaseDelayExceedsMaxDelay);
        }
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            multiplier: self.multiplier,
            jitter_factor: self.jitter_factor,
            retryable_errors: self.retryable_errors,
            sleeper: self.sleeper,
            jitter_source: self.jitter_source,
        })
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jitter::FixedSource;
    use crate::sleeper::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn no_jitter_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .unwrap()
            .base_delay(Duration::from_millis(10))
            .max_delay(Duration::from_secs(1))
            .unwrap()
            .multiplier(2.0)
            .unwrap()
            .jitter_factor(0.0)
            .unwrap()
            .with_sleeper(InstantSleeper)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let policy = no_jitter_policy(3);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, PluginError>(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let policy = no_jitter_policy(5);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(PluginError::new(Code::ServiceUnavailable, "down"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_retries_plus_one_attempts() {
        let policy = no_jitter_policy(3);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
                }
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Failed(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let policy = no_jitter_policy(5);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PluginError::new(Code::ResourceNotFound, "gone"))
                }
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Failed(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_code_outside_allow_list_is_not_retried() {
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .unwrap()
            .jitter_factor(0.0)
            .unwrap()
            .retryable_errors([Code::RateLimited])
            .with_sleeper(InstantSleeper)
            .build()
            .unwrap();
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backoff_is_applied_between_attempts() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .unwrap()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .unwrap()
            .multiplier(2.0)
            .unwrap()
            .jitter_factor(0.0)
            .unwrap()
            .with_sleeper(sleeper.clone())
            .build()
            .unwrap();
        let token = CancellationToken::new();
        let _ = policy
            .execute(&token, || async {
                Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
            })
            .await;
        assert_eq!(sleeper.calls(), 3);
        assert_eq!(sleeper.call_at(0).unwrap(), Duration::from_millis(100));
        assert_eq!(sleeper.call_at(1).unwrap(), Duration::from_millis(200));
        assert_eq!(sleeper.call_at(2).unwrap(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn jitter_source_is_consulted() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(1)
            .unwrap()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .unwrap()
            .multiplier(2.0)
            .unwrap()
            .jitter_factor(0.3)
            .unwrap()
            .with_sleeper(sleeper.clone())
            .with_jitter_source(FixedSource(1.0))
            .build()
            .unwrap();
        let token = CancellationToken::new();
        let _ = policy
            .execute(&token, || async {
                Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
            })
            .await;
        assert_eq!(sleeper.call_at(0).unwrap(), Duration::from_millis(130));
    }

    #[tokio::test]
    async fn cancellation_returns_cancelled_not_last_error() {
        let policy = no_jitter_policy(5);
        let token = CancellationToken::new();
        token.cancel();
        let result = policy
            .execute(&token, || async {
                Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_observed_during_final_attempt_is_not_downgraded_to_failed() {
        let policy = no_jitter_policy(1);
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let t = token.clone();
        let result = policy
            .execute(&token, || {
                let c = c.clone();
                let t = t.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    if attempt == 1 {
                        // Mirrors the timeout wrapper observing cancellation
                        // mid-flight and surfacing it as a transient error.
                        t.cancel();
                    }
                    Err::<(), _>(PluginError::new(Code::ServiceUnavailable, "down"))
                }
            })
            .await;
        assert!(matches!(result, Err(RetryOutcome::Cancelled)), "got {result:?}");
        assert_eq!(counter.load(Ordering::SeqCst), 2, "both attempts (0 and max_retries=1) ran");
    }
}

//! Composes retry and timeout: `retry(attempt { timeoutWrapper(fn) })`.
//!
//! Retry sees timeout failures as retryable transient errors, since
//! [`execute_with_timeout`] synthesizes a `NETWORK_TIMEOUT` [`PluginError`] on
//! deadline — the same error shape an operation would return on its own.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::PluginError;
use crate::retry::{RetryOutcome, RetryPolicy};
use crate::timeout::{execute_with_timeout, TimeoutConfig, TimeoutOutcome};

#[derive(Clone)]
pub struct TimeoutAwareRetry {
    retry: RetryPolicy,
    timeout: Arc<TimeoutConfig>,
}

/// Outcome of [`TimeoutAwareRetry::execute`]: the final attempt's operation
/// error, or cancellation observed anywhere in the composed pipeline.
#[derive(Debug)]
pub enum ComposedOutcome {
    Failed(PluginError),
    Cancelled,
}

impl std::fmt::Display for ComposedOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComposedOutcome::Failed(e) => write!(f, "{}", e),
            ComposedOutcome::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ComposedOutcome {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ComposedOutcome::Failed(e) => Some(e),
            ComposedOutcome::Cancelled => None,
        }
    }
}

impl TimeoutAwareRetry {
    pub fn new(retry: RetryPolicy, timeout: TimeoutConfig) -> Self {
        Self { retry, timeout: Arc::new(timeout) }
    }

    pub async fn execute<T, Fut, Op>(
        &self,
        cancellation: &CancellationToken,
        method: &str,
        mut operation: Op,
    ) -> Result<T, ComposedOutcome>
    where
        T: Send,
        Fut: Future<Output = Result<T, PluginError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let timeout = self.timeout.clone();
        let result = self
            .retry
            .execute(cancellation, || {
                let timeout = timeout.clone();
                let fut = operation();
                async move {
                    match execute_with_timeout(&timeout, cancellation, method, move || fut).await {
                        Ok(v) => Ok(v),
                        Err(TimeoutOutcome::Failed(e)) | Err(TimeoutOutcome::TimedOut(e)) => Err(e),
                        Err(TimeoutOutcome::Cancelled) => {
                            Err(PluginError::new(crate::error::Code::ServiceUnavailable, "cancelled"))
                        }
                    }
                }
            })
            .await;

        match result {
            Ok(v) => Ok(v),
            Err(RetryOutcome::Cancelled) => Err(ComposedOutcome::Cancelled),
            Err(RetryOutcome::Failed(e)) => Err(ComposedOutcome::Failed(e)),
        }
    }
}

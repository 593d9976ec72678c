//! Timeout wrapper bounding async operation duration, composable with retry.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{timeout_error, PluginError};

/// Timeouts must lie in this range.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("timeout for {method:?} must lie in [{min:?}, {max:?}] (got {got:?})")]
    OutOfRange { method: Option<String>, got: Duration, min: Duration, max: Duration },
    #[error("global_timeout {global:?} must be >= every method timeout (largest is {largest:?})")]
    GlobalBelowMethodTimeout { global: Duration, largest: Duration },
}

/// Per-method timeouts plus a `GlobalTimeout` that bounds every method without
/// an explicit override.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    global_timeout: Duration,
    method_timeouts: HashMap<String, Duration>,
}

fn validate_bound(method: Option<&str>, d: Duration) -> Result<(), BuildError> {
    if d < MIN_TIMEOUT || d > MAX_TIMEOUT {
        return Err(BuildError::OutOfRange {
            method: method.map(str::to_string),
            got: d,
            min: MIN_TIMEOUT,
            max: MAX_TIMEOUT,
        });
    }
    Ok(())
}

impl TimeoutConfig {
    pub fn builder(global_timeout: Duration) -> Result<TimeoutConfigBuilder, BuildError> {
        TimeoutConfigBuilder::new(global_timeout)
    }

    /// `GlobalTimeout = 30s`, no per-method overrides.
    pub fn default_config() -> Self {
        Self::builder(Duration::from_secs(30)).unwrap().build().unwrap()
    }

    /// `GlobalTimeout = 5s`.
    pub fn fast() -> Self {
        Self::builder(Duration::from_secs(5)).unwrap().build().unwrap()
    }

    /// `GlobalTimeout = 120s`.
    pub fn slow() -> Self {
        Self::builder(Duration::from_secs(120)).unwrap().build().unwrap()
    }

    pub fn global_timeout(&self) -> Duration {
        self.global_timeout
    }

    /// The effective timeout for `method`: its override if configured,
    /// otherwise `GlobalTimeout`.
    pub fn timeout_for(&self, method: &str) -> Duration {
        self.method_timeouts.get(method).copied().unwrap_or(self.global_timeout)
    }
}

pub struct TimeoutConfigBuilder {
    global_timeout: Duration,
    method_timeouts: HashMap<String, Duration>,
}

impl TimeoutConfigBuilder {
    fn new(global_timeout: Duration) -> Result<Self, BuildError> {
        validate_bound(None, global_timeout)?;
        Ok(Self { global_timeout, method_timeouts: HashMap::new() })
    }

    pub fn with_method_timeout(mut self, method: impl Into<String>, timeout: Duration) -> Result<Self, BuildError> {
        let method = method.into();
        validate_bound(Some(&method), timeout)?;
        self.method_timeouts.insert(method, timeout);
        Ok(self)
    }

    pub fn build(self) -> Result<TimeoutConfig, BuildError> {
        if let Some((method, largest)) =
            self.method_timeouts.iter().max_by_key(|(_, d)| **d).map(|(m, d)| (m.clone(), *d))
        {
            if largest > self.global_timeout {
                let _ = method;
                return Err(BuildError::GlobalBelowMethodTimeout { global: self.global_timeout, largest });
            }
        }
        Ok(TimeoutConfig { global_timeout: self.global_timeout, method_timeouts: self.method_timeouts })
    }
}

/// Result of [`execute_with_timeout`]: the operation's own error, a
/// synthesized deadline error, or external cancellation.
#[derive(Debug)]
pub enum TimeoutOutcome {
    Failed(PluginError),
    TimedOut(PluginError),
    Cancelled,
}

impl std::fmt::Display for TimeoutOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutOutcome::Failed(e) => write!(f, "{}", e),
            TimeoutOutcome::TimedOut(e) => write!(f, "{}", e),
            TimeoutOutcome::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for TimeoutOutcome {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimeoutOutcome::Failed(e) | TimeoutOutcome::TimedOut(e) => Some(e),
            TimeoutOutcome::Cancelled => None,
        }
    }
}

/// Run `operation` bounded by `config`'s timeout for `method`, honoring
/// external cancellation.
pub async fn execute_with_timeout<T, Fut, Op>(
    config: &TimeoutConfig,
    cancellation: &CancellationToken,
    method: &str,
    operation: Op,
) -> Result<T, TimeoutOutcome>
where
    Fut: Future<Output = Result<T, PluginError>> + Send,
    Op: FnOnce() -> Fut + Send,
{
    if cancellation.is_cancelled() {
        return Err(TimeoutOutcome::Cancelled);
    }

    let duration = config.timeout_for(method);
    tokio::select! {
        _ = cancellation.cancelled() => Err(TimeoutOutcome::Cancelled),
        result = operation() => result.map_err(TimeoutOutcome::Failed),
        _ = tokio::time::sleep(duration) => Err(TimeoutOutcome::TimedOut(timeout_error(method))),
    }
}

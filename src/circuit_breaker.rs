//! State-machine circuit breaker with lock-free atomics and volume-gated
//! evaluation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{circuit_open_error, PluginError};

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// `{FailureThreshold, RecoveryTimeout, SuccessThreshold, RequestVolumeThreshold,
/// FailureRateThreshold, ConsecutiveFailureLimit}`.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub recovery_timeout: Duration,
    pub success_threshold: usize,
    pub request_volume_threshold: usize,
    pub failure_rate_threshold: f64,
    pub consecutive_failure_limit: usize,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("failure_rate_threshold must be in [0, 1] (got {0})")]
    InvalidFailureRateThreshold(String),
}

impl CircuitBreakerConfig {
    /// `{FailureThreshold=5, RecoveryTimeout=30s, SuccessThreshold=2,
    /// RequestVolumeThreshold=10, FailureRateThreshold=0.5,
    /// ConsecutiveFailureLimit=5}`.
    pub fn default_config() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
            request_volume_threshold: 10,
            failure_rate_threshold: 0.5,
            consecutive_failure_limit: 5,
        }
    }

    /// Never opens: thresholds set to `usize::MAX` / `1.0` so evaluation
    /// never fires.
    pub fn disabled() -> Self {
        Self {
            failure_threshold: usize::MAX,
            recovery_timeout: Duration::from_secs(0),
            success_threshold: 0,
            request_volume_threshold: usize::MAX,
            failure_rate_threshold: 1.0,
            consecutive_failure_limit: usize::MAX,
        }
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if !(0.0..=1.0).contains(&self.failure_rate_threshold) {
            return Err(BuildError::InvalidFailureRateThreshold(self.failure_rate_threshold.to_string()));
        }
        Ok(())
    }
}

/// Point-in-time view of a breaker's counters.
#[derive(Debug, Clone, Copy)]
pub struct Metrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub state_transitions: u64,
}

fn pack(total: u32, failed: u32) -> u64 {
    ((total as u64) << 32) | failed as u64
}

fn unpack(packed: u64) -> (u32, u32) {
    ((packed >> 32) as u32, (packed & 0xffff_ffff) as u32)
}

fn millis_to_timestamp(millis: u64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

struct CircuitBreakerState {
    state: AtomicU8,
    /// `(total_requests: u32) << 32 | (failed_requests: u32)`, so a single
    /// `load` always observes a consistent pair for `FailureRate`.
    packed_counts: AtomicU64,
    consecutive_failures: AtomicU64,
    opened_at_millis: AtomicU64,
    half_open_successes: AtomicUsize,
    state_transitions: AtomicU64,
    last_failure_epoch_millis: AtomicU64,
    last_success_epoch_millis: AtomicU64,
}

impl CircuitBreakerState {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            packed_counts: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            opened_at_millis: AtomicU64::new(0),
            half_open_successes: AtomicUsize::new(0),
            state_transitions: AtomicU64::new(0),
            last_failure_epoch_millis: AtomicU64::new(0),
            last_success_epoch_millis: AtomicU64::new(0),
        }
    }
}

#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    state: Arc<CircuitBreakerState>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerPolicy {
    pub fn new(config: CircuitBreakerConfig) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(CircuitBreakerState::new()),
            config,
            clock: Arc::new(MonotonicClock::default()),
        })
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> CircuitState {
        match self.state.state.load(Ordering::Acquire) {
            STATE_CLOSED => CircuitState::Closed,
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            s => unreachable!("invalid circuit breaker state byte: {s}"),
        }
    }

    pub fn metrics(&self) -> Metrics {
        let (total, failed) = unpack(self.state.packed_counts.load(Ordering::Acquire));
        Metrics {
            total_requests: total as u64,
            successful_requests: (total - failed) as u64,
            failed_requests: failed as u64,
            consecutive_failures: self.state.consecutive_failures.load(Ordering::Acquire),
            last_failure_time: millis_to_timestamp(self.state.last_failure_epoch_millis.load(Ordering::Acquire)),
            last_success_time: millis_to_timestamp(self.state.last_success_epoch_millis.load(Ordering::Acquire)),
            state_transitions: self.state.state_transitions.load(Ordering::Acquire),
        }
    }

    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, PluginError>
    where
        Fut: Future<Output = Result<T, PluginError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        loop {
            let current = self.state.state.load(Ordering::Acquire);
            match current {
                STATE_OPEN => {
                    let opened_at = self.state.opened_at_millis.load(Ordering::Acquire);
                    let elapsed = self.clock.now_millis().saturating_sub(opened_at);
                    if elapsed < self.config.recovery_timeout.as_millis() as u64 {
                        return Err(circuit_open_error(self.config.recovery_timeout));
                    }
                    match self.state.state.compare_exchange(
                        STATE_OPEN,
                        STATE_HALF_OPEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            self.state.half_open_successes.store(0, Ordering::Release);
                            self.state.state_transitions.fetch_add(1, Ordering::AcqRel);
                            tracing::info!("circuit breaker: open -> half-open");
                            break;
                        }
                        Err(_) => continue,
                    }
                }
                STATE_HALF_OPEN | STATE_CLOSED => break,
                s => unreachable!("invalid circuit breaker state byte: {s}"),
            }
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success(),
            Err(_) => self.on_failure(),
        }
        result
    }

    fn record_success_counters(&self) {
        loop {
            let old = self.state.packed_counts.load(Ordering::Acquire);
            let (total, failed) = unpack(old);
            let new = pack(total.saturating_add(1), failed);
            if self
                .state
                .packed_counts
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        self.state.consecutive_failures.store(0, Ordering::Release);
        self.state.last_success_epoch_millis.store(now_epoch_millis(), Ordering::Release);
    }

    fn record_failure_counters(&self) {
        loop {
            let old = self.state.packed_counts.load(Ordering::Acquire);
            let (total, failed) = unpack(old);
            let new = pack(total.saturating_add(1), failed.saturating_add(1));
            if self
                .state
                .packed_counts
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
        self.state.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        self.state.last_failure_epoch_millis.store(now_epoch_millis(), Ordering::Release);
    }

    fn on_success(&self) {
        self.record_success_counters();
        let current = self.state.state.load(Ordering::Acquire);
        if current == STATE_HALF_OPEN {
            let successes = self.state.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
            if successes >= self.config.success_threshold
                && self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
            {
                self.reset_rolling_counters();
                self.state.state_transitions.fetch_add(1, Ordering::AcqRel);
                tracing::info!("circuit breaker: half-open -> closed");
            }
        }
    }

    fn on_failure(&self) {
        self.record_failure_counters();
        let current = self.state.state.load(Ordering::Acquire);
        match current {
            STATE_HALF_OPEN => {
                if self
                    .state
                    .state
                    .compare_exchange(STATE_HALF_OPEN, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.state.opened_at_millis.store(self.clock.now_millis(), Ordering::Release);
                    self.state.state_transitions.fetch_add(1, Ordering::AcqRel);
                    tracing::warn!("circuit breaker: half-open test failed -> open");
                }
            }
            STATE_CLOSED => {
                if self.should_open() && self.try_open() {
                    tracing::error!("circuit breaker: closed -> open");
                }
            }
            _ => {}
        }
    }

    /// No-op until `TotalRequests >= RequestVolumeThreshold`; then open if
    /// any configured trigger condition holds.
    fn should_open(&self) -> bool {
        let (total, failed) = unpack(self.state.packed_counts.load(Ordering::Acquire));
        if (total as usize) < self.config.request_volume_threshold {
            return false;
        }
        let consecutive = self.state.consecutive_failures.load(Ordering::Acquire);
        let failure_rate = failed as f64 / total.max(1) as f64;
        consecutive as usize >= self.config.consecutive_failure_limit
            || (failed as usize) >= self.config.failure_threshold
            || failure_rate >= self.config.failure_rate_threshold
    }

    fn try_open(&self) -> bool {
        if self
            .state
            .state
            .compare_exchange(STATE_CLOSED, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.state.opened_at_millis.store(self.clock.now_millis(), Ordering::Release);
            self.state.state_transitions.fetch_add(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    /// Reset rolling counters on entering Closed; `StateTransitions` and the
    /// last-seen timestamps are preserved.
    fn reset_rolling_counters(&self) {
        self.state.packed_counts.store(0, Ordering::Release);
        self.state.consecutive_failures.store(0, Ordering::Release);
        self.state.half_open_successes.store(0, Ordering::Release);
    }
}

fn now_epoch_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

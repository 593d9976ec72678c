//! End-to-end coverage of the reliability primitives through the public API:
//! circuit breaker volume-gated opening, and retry composed with timeout.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use focus_jsonld::{
    CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState, Code, ComposedOutcome, PluginError,
    RetryPolicy, TimeoutAwareRetry, TimeoutConfig,
};

#[tokio::test]
async fn circuit_opens_after_failure_rate_threshold_and_rejects_with_retry_after() {
    let config = CircuitBreakerConfig {
        request_volume_threshold: 10,
        failure_threshold: 5,
        failure_rate_threshold: 0.5,
        ..CircuitBreakerConfig::default_config()
    };
    let breaker = CircuitBreakerPolicy::new(config).unwrap();

    for i in 0..10 {
        let should_fail = i < 5;
        let _ = breaker
            .execute(|| async move {
                if should_fail {
                    Err(PluginError::new(Code::ServiceUnavailable, "down"))
                } else {
                    Ok(())
                }
            })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let rejected = breaker.execute(|| async { Ok::<_, PluginError>(()) }).await;
    let err = rejected.unwrap_err();
    assert_eq!(err.code, Code::CircuitOpen);
    assert!(err.is_transient());
    assert_eq!(err.retry_after, Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn retry_composed_with_timeout_recovers_from_transient_failures() {
    let retry = RetryPolicy::builder()
        .max_retries(3)
        .unwrap()
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
        .unwrap()
        .multiplier(2.0)
        .unwrap()
        .jitter_factor(0.0)
        .unwrap()
        .build()
        .unwrap();
    let timeout = TimeoutConfig::builder(Duration::from_secs(5)).unwrap().build().unwrap();
    let composed = TimeoutAwareRetry::new(retry, timeout);

    let attempts = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();
    let a = attempts.clone();
    let result = composed
        .execute(&token, "fetch_cost_records", move || {
            let a = a.clone();
            async move {
                let attempt = a.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(PluginError::new(Code::ServiceUnavailable, "still warming up"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retry_gives_up_on_a_permanent_error_without_retrying() {
    let retry = RetryPolicy::builder()
        .max_retries(3)
        .unwrap()
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
        .unwrap()
        .multiplier(2.0)
        .unwrap()
        .jitter_factor(0.0)
        .unwrap()
        .build()
        .unwrap();
    let timeout = TimeoutConfig::builder(Duration::from_secs(5)).unwrap().build().unwrap();
    let composed = TimeoutAwareRetry::new(retry, timeout);

    let attempts = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();
    let a = attempts.clone();
    let result = composed
        .execute(&token, "fetch_cost_records", move || {
            let a = a.clone();
            async move {
                a.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PluginError::new(Code::InvalidResource, "malformed resource id"))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1, "permanent errors must not be retried");
}

#[tokio::test]
async fn cancellation_during_final_attempts_timeout_wait_is_not_downgraded_to_failed() {
    let retry = RetryPolicy::builder()
        .max_retries(1)
        .unwrap()
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(10))
        .unwrap()
        .multiplier(2.0)
        .unwrap()
        .jitter_factor(0.0)
        .unwrap()
        .build()
        .unwrap();
    let timeout = TimeoutConfig::builder(Duration::from_secs(5)).unwrap().build().unwrap();
    let composed = TimeoutAwareRetry::new(retry, timeout);

    let attempts = Arc::new(AtomicUsize::new(0));
    let token = CancellationToken::new();
    let a = attempts.clone();
    let t = token.clone();
    let result = composed
        .execute(&token, "fetch_cost_records", move || {
            let a = a.clone();
            let t = t.clone();
            async move {
                let attempt = a.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    return Err(PluginError::new(Code::ServiceUnavailable, "still warming up"));
                }
                // Final attempt: cancellation fires while this operation is
                // still in flight, racing the timeout wrapper's select.
                t.cancel();
                std::future::pending::<()>().await;
                unreachable!()
            }
        })
        .await;

    assert!(
        matches!(result, Err(ComposedOutcome::Cancelled)),
        "cancellation observed during the final attempt's wait must surface as Cancelled, not Failed: {result:?}"
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 2, "both attempts (0 and max_retries=1) ran");
}

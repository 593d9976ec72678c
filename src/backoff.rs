//! Exponential backoff delay calculation for retry policies.

use std::time::Duration;

/// `min(base_delay * multiplier^attempt, max_delay)`, pre-jitter.
///
/// `attempt` is 0-indexed (the first retry, after the initial attempt,
/// passes `attempt = 0`). `multiplier` must be `> 1.0`; callers validate
/// this at policy construction, not here.
pub fn calculate_base_delay(
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    attempt: usize,
) -> Duration {
    let scaled = base_delay.as_secs_f64() * multiplier.powi(attempt as i32);
    if !scaled.is_finite() || scaled < 0.0 {
        return max_delay;
    }
    Duration::from_secs_f64(scaled).min(max_delay)
}

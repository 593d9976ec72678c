//! Cryptographically-seeded jitter source for retry backoff.
//!
//! Formula: `jittered = delay + delay * jitter_factor * (2r - 1)`, where
//! `r` is drawn uniformly from `[0, 1)` with 53-bit precision from a
//! crypto-seeded source, clamped to be non-negative. `r == 0.5` reproduces the
//! unjittered delay; `r` near 0 or 1 swings the delay down or up by up to
//! `jitter_factor` of itself.

use std::time::Duration;

/// Abstraction over the uniform-in-`[0,1)` source backing jitter, so tests
/// can inject a deterministic value (mirrors the `Sleeper`/`Clock`
/// dependency-injection pattern used elsewhere in this crate).
pub trait UniformSource: Send + Sync + std::fmt::Debug {
    /// Draw a uniform value in `[0, 1)`.
    fn next_unit(&self) -> f64;
}

/// Production source: OS-provided CSPRNG. Falls back to `0.5` (no jitter
/// skew) if the OS source fails, rather than panicking.
#[derive(Debug, Default, Clone, Copy)]
pub struct CryptoUniformSource;

impl UniformSource for CryptoUniformSource {
    fn next_unit(&self) -> f64 {
        let mut buf = [0u8; 8];
        match getrandom::getrandom(&mut buf) {
            // Use the top 53 bits for a uniform f64 in [0, 1), matching
            // IEEE-754 double mantissa precision.
            Ok(()) => {
                let bits = u64::from_le_bytes(buf);
                ((bits >> 11) as f64) * (1.0 / (1u64 << 53) as f64)
            }
            Err(_) => 0.5,
        }
    }
}

/// Fixed-value source for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub f64);

impl UniformSource for FixedSource {
    fn next_unit(&self) -> f64 {
        self.0
    }
}

/// Apply jitter to `delay` using the formula above, clamped non-negative.
pub fn apply_jitter(delay: Duration, jitter_factor: f64, source: &dyn UniformSource) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }
    let r = source.next_unit().clamp(0.0, 1.0);
    let base = delay.as_secs_f64();
    let skew = base * jitter_factor * (2.0 * r - 1.0);
    let jittered = (base + skew).max(0.0);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_reproduces_unjittered_delay() {
        let delay = Duration::from_millis(1000);
        let out = apply_jitter(delay, 0.3, &FixedSource(0.5));
        assert_eq!(out, delay);
    }

    #[test]
    fn zero_draw_skews_down_by_jitter_factor() {
        let delay = Duration::from_millis(1000);
        let out = apply_jitter(delay, 0.3, &FixedSource(0.0));
        assert_eq!(out, Duration::from_millis(700));
    }

    #[test]
    fn one_draw_skews_up_by_jitter_factor() {
        let delay = Duration::from_millis(1000);
        let out = apply_jitter(delay, 0.3, &FixedSource(1.0));
        assert_eq!(out, Duration::from_millis(1300));
    }

    #[test]
    fn zero_jitter_factor_is_identity() {
        let delay = Duration::from_millis(500);
        let out = apply_jitter(delay, 0.0, &FixedSource(0.9));
        assert_eq!(out, delay);
    }

    #[test]
    fn result_never_negative() {
        let delay = Duration::from_millis(10);
        let out = apply_jitter(delay, 0.5, &FixedSource(0.0));
        assert!(out.as_secs_f64() >= 0.0);
    }

    #[test]
    fn crypto_source_produces_values_in_unit_range() {
        let source = CryptoUniformSource;
        for _ in 0..100 {
            let r = source.next_unit();
            assert!((0.0..1.0).contains(&r));
        }
    }
}

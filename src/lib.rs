#![forbid(unsafe_code)]

//! JSON-LD serialization and reliability primitives for the FinOps Open
//! Cost and Usage Specification (FOCUS).
//!
//! ## Features
//!
//! - **JSON-LD serialization** of FOCUS cost records and commitments, with
//!   a customizable `@context`, deterministic content-addressed `@id`, and
//!   streaming with bounded memory and cooperative cancellation.
//! - **Growth projections** (linear/exponential) with overflow pre-detection.
//! - **Retry policies** with exponential backoff and cryptographically
//!   seeded jitter.
//! - **Circuit breakers** with half-open state recovery.
//! - **Timeout wrapper** integrated with `tokio`, composable with retry.
//!
//! ## Quick Start
//!
//! ```rust
//! use focus_jsonld::jsonld::{Context, FocusCostRecord, SerializerOptions, Serializer};
//!
//! let serializer = Serializer::new(Context::new(), SerializerOptions::default())
//!     .expect("default options name no user-id field to validate");
//! let record = FocusCostRecord {
//!     billing_account_id: "acct-123".to_string(),
//!     resource_id: "res-456".to_string(),
//!     billing_currency: "USD".to_string(),
//!     billed_cost: 12.5,
//!     ..Default::default()
//! };
//! let doc = serializer.serialize_record(Some(&record)).expect("non-nil record");
//! assert_eq!(doc["@type"], "focus:FocusCostRecord");
//! ```

mod backoff;
mod circuit_breaker;
mod clock;
mod error;
mod growth;
mod jitter;
pub mod jsonld;
mod retry;
mod sleeper;
mod stack;
mod timeout;

pub use backoff::calculate_base_delay;
pub use circuit_breaker::{
    CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState, Metrics,
    BuildError as CircuitBreakerBuildError,
};
pub use clock::{Clock, MonotonicClock};
pub use error::{
    circuit_open_error, format_error_message, timeout_error, Category, Code, MessageParams,
    PluginError,
};
pub use growth::{
    apply_exponential_growth, apply_growth, apply_linear_growth, check_growth_warnings,
    check_growth_warnings_with_cost, check_overflow_risk, project_cost_safely,
    resolve_growth_params, resolve_growth_type, validate_growth_params, GrowthError, GrowthParams,
    GrowthType, GrowthWarning, WarningCode,
};
pub use jitter::{apply_jitter, CryptoUniformSource, FixedSource, UniformSource};
pub use retry::{RetryOutcome, RetryPolicy, RetryPolicyBuilder, BuildError as RetryBuildError};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use stack::{ComposedOutcome, TimeoutAwareRetry};
pub use timeout::{
    execute_with_timeout, TimeoutConfig, TimeoutConfigBuilder, TimeoutOutcome,
    BuildError as TimeoutBuildError,
};

pub mod prelude;

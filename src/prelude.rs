//! Convenient re-exports for common `focus-jsonld` types.
pub use crate::{
    jsonld::{
        Context, FocusCostRecord, IdentityGenerator, RecordSource, SerializeError, Serializer,
        SerializerOptions, StreamError, StreamResult,
    },
    CircuitBreakerConfig, CircuitBreakerPolicy, Code, PluginError, RetryPolicy, TimeoutAwareRetry,
    TimeoutConfig,
};

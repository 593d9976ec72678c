//! Typed error taxonomy for the reliability layer.
//!
//! Every error a plugin RPC can surface carries a [`Code`] from a closed set,
//! a [`Category`] that determines default retryability, a rendered message,
//! and optional structured details. Downcasting a boxed error back to
//! [`PluginError`] is how callers classify failures for retry/circuit-breaker
//! decisions.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Closed set of reliability-layer error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    // Transient
    NetworkTimeout,
    ServiceUnavailable,
    RateLimited,
    TemporaryFailure,
    CircuitOpen,
    // Permanent
    InvalidResource,
    ResourceNotFound,
    InvalidTimeRange,
    UnsupportedRegion,
    PermissionDenied,
    DataCorruption,
    // Configuration
    InvalidCredentials,
    MissingApiKey,
    InvalidEndpoint,
    InvalidProvider,
    PluginNotConfigured,
}

/// Category a [`Code`] belongs to; determines default retryability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Transient,
    Permanent,
    Configuration,
}

impl Code {
    /// Category this code belongs to. Total over the known code set.
    pub fn category(self) -> Category {
        use Code::*;
        match self {
            NetworkTimeout | ServiceUnavailable | RateLimited | TemporaryFailure
            | CircuitOpen => Category::Transient,
            InvalidResource | ResourceNotFound | InvalidTimeRange | UnsupportedRegion
            | PermissionDenied | DataCorruption => Category::Permanent,
            InvalidCredentials | MissingApiKey | InvalidEndpoint | InvalidProvider
            | PluginNotConfigured => Category::Configuration,
        }
    }

    /// Default retryability implied by category: transient = true, else false.
    pub fn default_retryable(self) -> bool {
        matches!(self.category(), Category::Transient)
    }

    /// Canonical message template with named placeholders, filled in by
    /// [`format_error_message`].
    pub fn template(self) -> &'static str {
        use Code::*;
        match self {
            NetworkTimeout => "network timeout during {operation}",
            ServiceUnavailable => "service unavailable during {operation}",
            RateLimited => "rate limited during {operation}, retry after {retry_after}",
            TemporaryFailure => "temporary failure during {operation}: {details}",
            CircuitOpen => "circuit open for {operation}, retry after {retry_after}",
            InvalidResource => "invalid {resource_type} resource: {resource_id}",
            ResourceNotFound => "{resource_type} not found: {resource_id}",
            InvalidTimeRange => "invalid time range for {operation}: {details}",
            UnsupportedRegion => "unsupported region: {region}",
            PermissionDenied => "permission denied for {operation}",
            DataCorruption => "data corruption detected in {resource_type}: {resource_id}",
            InvalidCredentials => "invalid credentials for {operation}",
            MissingApiKey => "missing API key for {operation}",
            InvalidEndpoint => "invalid endpoint for {operation}: {details}",
            InvalidProvider => "invalid provider for {operation}: {details}",
            PluginNotConfigured => "plugin not configured: {details}",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Named placeholders accepted by [`format_error_message`].
#[derive(Debug, Clone, Default)]
pub struct MessageParams<'a> {
    pub operation: Option<&'a str>,
    pub resource_type: Option<&'a str>,
    pub resource_id: Option<&'a str>,
    pub region: Option<&'a str>,
    pub retry_after: Option<Duration>,
    pub details: Option<&'a str>,
}

/// Fill a code's canonical template with the supplied parameters. Unfilled
/// placeholders are rendered as `<unknown>` rather than left dangling.
pub fn format_error_message(code: Code, params: &MessageParams<'_>) -> String {
    let mut msg = code.template().to_string();
    let retry_after = params
        .retry_after
        .map(|d| format!("{:?}", d))
        .unwrap_or_else(|| "<unknown>".to_string());
    let subs: [(&str, &str); 6] = [
        ("{operation}", params.operation.unwrap_or("<unknown>")),
        ("{resource_type}", params.resource_type.unwrap_or("<unknown>")),
        ("{resource_id}", params.resource_id.unwrap_or("<unknown>")),
        ("{region}", params.region.unwrap_or("<unknown>")),
        ("{retry_after}", retry_after.as_str()),
        ("{details}", params.details.unwrap_or("<unknown>")),
    ];
    for (placeholder, value) in subs {
        msg = msg.replace(placeholder, value);
    }
    msg
}

/// A reliability-layer error: code, category, rendered message, structured
/// details, timestamp, retryability, and optional retry-after hint.
#[derive(Debug, Clone)]
pub struct PluginError {
    pub code: Code,
    pub category: Category,
    pub message: String,
    pub details: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
    source: Option<std::sync::Arc<dyn std::error::Error + Send + Sync>>,
}

impl PluginError {
    /// Construct from a code and rendered message, applying the code's
    /// default category/retryability.
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        let category = code.category();
        let retryable = code.default_retryable();
        Self {
            code,
            category,
            message: message.into(),
            details: HashMap::new(),
            timestamp: Utc::now(),
            retryable,
            retry_after: None,
            source: None,
        }
    }

    /// Construct from a code and template params, filling the canonical message.
    pub fn from_template(code: Code, params: &MessageParams<'_>) -> Self {
        let mut err = Self::new(code, format_error_message(code, params));
        if matches!(err.category, Category::Transient) {
            err.retry_after = params.retry_after;
        }
        err
    }

    pub fn with_details(mut self, details: HashMap<String, String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(std::sync::Arc::new(source));
        self
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.category, Category::Transient)
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self.category, Category::Permanent)
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self.category, Category::Configuration)
    }

    /// Advisory mapping to a canonical RPC status name. Returned as a string
    /// since the wire RPC service definitions are out of scope.
    pub fn transport_status(&self) -> &'static str {
        use Code::*;
        match self.code {
            NetworkTimeout | ServiceUnavailable | TemporaryFailure | CircuitOpen => "Unavailable",
            RateLimited => "ResourceExhausted",
            InvalidResource | InvalidTimeRange => "InvalidArgument",
            ResourceNotFound => "NotFound",
            PermissionDenied | InvalidCredentials => "PermissionDenied",
            UnsupportedRegion | InvalidProvider => "Unimplemented",
            DataCorruption => "DataLoss",
            MissingApiKey | InvalidEndpoint | PluginNotConfigured => "FailedPrecondition",
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for PluginError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Synthesize the transient `CIRCUIT_OPEN` error a breaker returns when it
/// rejects a call.
pub fn circuit_open_error(recovery_timeout: Duration) -> PluginError {
    PluginError::from_template(
        Code::CircuitOpen,
        &MessageParams {
            operation: Some("circuit_breaker"),
            retry_after: Some(recovery_timeout),
            ..Default::default()
        },
    )
    .with_retry_after(recovery_timeout)
}

/// Synthesize the transient `NETWORK_TIMEOUT` error the timeout wrapper
/// returns on deadline.
pub fn timeout_error(method: &str) -> PluginError {
    PluginError::from_template(
        Code::NetworkTimeout,
        &MessageParams { operation: Some(method), ..Default::default() },
    )
}

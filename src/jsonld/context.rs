//! JSON-LD `@context` configuration.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

pub const SCHEMA_ORG_IRI: &str = "https://schema.org/";
pub const DEFAULT_FOCUS_NAMESPACE: &str = "https://focus.finops.org/v1#";
pub const XSD_IRI: &str = "http://www.w3.org/2001/XMLSchema#";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("remote context url {0:?} does not parse as an absolute URL")]
    NotAbsolute(String),
    #[error("remote context url {0:?} has scheme {1:?}, must be http or https")]
    UnsupportedScheme(String, String),
    #[error("remote context url {0:?} has no host")]
    MissingHost(String),
}

/// A JSON-LD `@context` configuration. `With*` methods are copy-on-write:
/// each returns a new `Context`, leaving the receiver untouched.
#[derive(Debug, Clone)]
pub struct Context {
    schema_org: bool,
    focus_namespace: String,
    custom_mappings: BTreeMap<String, String>,
    remote_contexts: Vec<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            schema_org: true,
            focus_namespace: DEFAULT_FOCUS_NAMESPACE.to_string(),
            custom_mappings: BTreeMap::new(),
            remote_contexts: Vec::new(),
        }
    }

    pub fn with_schema_org(&self, enabled: bool) -> Self {
        let mut next = self.clone();
        next.schema_org = enabled;
        next
    }

    pub fn with_focus_namespace(&self, iri: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.focus_namespace = iri.into();
        next
    }

    /// Overrides any default prefix of the same key.
    pub fn with_custom_mapping(&self, term: impl Into<String>, iri: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.custom_mappings.insert(term.into(), iri.into());
        next
    }

    /// Appends a remote context URL. Order is preserved; duplicates are allowed.
    pub fn with_remote_context(&self, url: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.remote_contexts.push(url.into());
        next
    }

    /// Remote URLs must parse as absolute `http`/`https` URLs with a non-empty host.
    pub fn validate(&self) -> Result<(), ContextError> {
        for raw in &self.remote_contexts {
            let parsed = Url::parse(raw).map_err(|_| ContextError::NotAbsolute(raw.clone()))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ContextError::UnsupportedScheme(raw.clone(), parsed.scheme().to_string()));
            }
            if parsed.host_str().map(str::is_empty).unwrap_or(true) {
                return Err(ContextError::MissingHost(raw.clone()));
            }
        }
        Ok(())
    }

    fn inline_object(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if self.schema_org {
            obj.insert("schema".to_string(), json!(SCHEMA_ORG_IRI));
        }
        obj.insert("focus".to_string(), json!(self.focus_namespace));
        obj.insert("xsd".to_string(), json!(XSD_IRI));
        for (term, iri) in &self.custom_mappings {
            obj.insert(term.clone(), json!(iri));
        }
        Value::Object(obj)
    }

    /// Produces the `@context` value: an inline object when there are no
    /// remote contexts, otherwise `[remote..., inlineObject]`.
    pub fn build(&self) -> Value {
        if self.remote_contexts.is_empty() {
            return self.inline_object();
        }
        let mut arr: Vec<Value> = self.remote_contexts.iter().map(|u| json!(u)).collect();
        arr.push(self.inline_object());
        Value::Array(arr)
    }
}

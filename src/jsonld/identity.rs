//! Deterministic content-addressed identity.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::record::{ContractCommitment, FocusCostRecord};

pub const DEFAULT_COST_PREFIX: &str = "urn:focus:cost:";
pub const COMMITMENT_PREFIX: &str = "urn:focus:commitment:";

const RECOGNIZED_COST_USER_ID_FIELDS: &[&str] = &["invoice_id", "resource_id"];
const RECOGNIZED_COMMITMENT_USER_ID_FIELDS: &[&str] = &["contract_commitment_id", "contract_id"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{field:?} is not a recognized user-id field for {kind}; expected one of {recognized:?}")]
    UnrecognizedUserIdField { kind: &'static str, field: String, recognized: &'static [&'static str] },
}

/// SHA-256 composite identity generator, the default variant of the
/// `{Generate, GenerateCommitment}` capability set.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    prefix: String,
    user_id_field: Option<String>,
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self { prefix: DEFAULT_COST_PREFIX.to_string(), user_id_field: None }
    }
}

impl IdentityGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Validated at construction, never at generation time: an unrecognized
    /// field name is a caller bug, not a runtime condition to retry past.
    pub fn with_user_id_field(mut self, field: impl Into<String>) -> Result<Self, IdentityError> {
        let field = field.into();
        if !RECOGNIZED_COST_USER_ID_FIELDS.contains(&field.as_str()) {
            return Err(IdentityError::UnrecognizedUserIdField {
                kind: "cost record",
                field,
                recognized: RECOGNIZED_COST_USER_ID_FIELDS,
            });
        }
        self.user_id_field = Some(field);
        Ok(self)
    }

    pub fn with_commitment_user_id_field(mut self, field: impl Into<String>) -> Result<Self, IdentityError> {
        let field = field.into();
        if !RECOGNIZED_COMMITMENT_USER_ID_FIELDS.contains(&field.as_str()) {
            return Err(IdentityError::UnrecognizedUserIdField {
                kind: "commitment",
                field,
                recognized: RECOGNIZED_COMMITMENT_USER_ID_FIELDS,
            });
        }
        self.user_id_field = Some(field);
        Ok(self)
    }

    fn user_field_value(&self, record: &FocusCostRecord) -> Option<String> {
        match self.user_id_field.as_deref() {
            Some("invoice_id") if !record.invoice_id.is_empty() => Some(record.invoice_id.clone()),
            Some("resource_id") if !record.resource_id.is_empty() => Some(record.resource_id.clone()),
            _ => None,
        }
    }

    fn commitment_user_field_value(&self, commitment: &ContractCommitment) -> Option<String> {
        match self.user_id_field.as_deref() {
            Some("contract_commitment_id") if !commitment.contract_commitment_id.is_empty() => {
                Some(commitment.contract_commitment_id.clone())
            }
            Some("contract_id") if !commitment.contract_id.is_empty() => Some(commitment.contract_id.clone()),
            _ => None,
        }
    }

    /// `None` stands in for a nil record (there is no `Option<&FocusCostRecord>`
    /// overload in this API; callers pass `None` explicitly for that case).
    pub fn generate(&self, record: Option<&FocusCostRecord>) -> String {
        let record = match record {
            Some(r) => r,
            None => return format!("{}nil-record", self.prefix),
        };
        if let Some(value) = self.user_field_value(record) {
            return format!("{}{}", self.prefix, value);
        }
        let period_start = record
            .charge_period_start
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"));
        let composite = format!(
            "{}|{}|{}",
            record.billing_account_id,
            period_start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            record.resource_id
        );
        let digest = Sha256::digest(composite.as_bytes());
        format!("{}{}", self.prefix, hex::encode(digest))
    }

    pub fn generate_commitment(&self, commitment: Option<&ContractCommitment>) -> String {
        let commitment = match commitment {
            Some(c) => c,
            None => return format!("{}nil-commitment", COMMITMENT_PREFIX),
        };
        if let Some(value) = self.commitment_user_field_value(commitment) {
            return format!("{}{}", COMMITMENT_PREFIX, value);
        }
        if commitment.contract_commitment_id.is_empty() {
            return format!("{}empty-commitment-id", COMMITMENT_PREFIX);
        }
        let digest = Sha256::digest(commitment.contract_commitment_id.as_bytes());
        format!("{}{}", COMMITMENT_PREFIX, hex::encode(digest))
    }
}

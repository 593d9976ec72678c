//! Cost record and commitment shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// FOCUS `ChargeCategory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeCategory {
    Unspecified,
    Usage,
    Purchase,
    Tax,
    Credit,
    Adjustment,
}

impl Default for ChargeCategory {
    fn default() -> Self {
        ChargeCategory::Unspecified
    }
}

impl ChargeCategory {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ChargeCategory::Unspecified => "Unspecified",
            ChargeCategory::Usage => "Usage",
            ChargeCategory::Purchase => "Purchase",
            ChargeCategory::Tax => "Tax",
            ChargeCategory::Credit => "Credit",
            ChargeCategory::Adjustment => "Adjustment",
        }
    }
}

/// FOCUS `ChargeClass`, optional (a record may have none).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeClass {
    Correction,
}

impl ChargeClass {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ChargeClass::Correction => "Correction",
        }
    }
}

/// FOCUS `ChargeFrequency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeFrequency {
    Unspecified,
    OneTime,
    Recurring,
    UsageBased,
}

impl Default for ChargeFrequency {
    fn default() -> Self {
        ChargeFrequency::Unspecified
    }
}

impl ChargeFrequency {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            ChargeFrequency::Unspecified => "Unspecified",
            ChargeFrequency::OneTime => "One-Time",
            ChargeFrequency::Recurring => "Recurring",
            ChargeFrequency::UsageBased => "Usage-Based",
        }
    }
}

/// A monetary value paired with its currency, the serializer's
/// `schema:MonetaryAmount` object source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: f64,
    pub currency: String,
}

impl Money {
    pub fn new(value: f64, currency: impl Into<String>) -> Self {
        Self { value, currency: currency.into() }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0.0
    }
}

/// A single FOCUS cost line, the unit the serializer and identity
/// generator both operate over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FocusCostRecord {
    pub billing_account_id: String,
    pub billing_account_name: String,
    pub sub_account_id: String,
    pub sub_account_name: String,

    pub billing_period_start: Option<DateTime<Utc>>,
    pub billing_period_end: Option<DateTime<Utc>>,
    pub charge_period_start: Option<DateTime<Utc>>,
    pub charge_period_end: Option<DateTime<Utc>>,

    pub billing_currency: String,
    pub pricing_currency: String,

    pub charge_category: ChargeCategory,
    pub charge_class: Option<ChargeClass>,
    pub charge_frequency: ChargeFrequency,

    pub pricing_quantity: f64,
    pub pricing_unit: String,
    pub list_unit_price: f64,
    pub contracted_unit_price: f64,

    pub service_category: String,
    pub service_name: String,
    pub service_subcategory: String,
    pub resource_id: String,
    pub resource_name: String,
    pub resource_type: String,
    pub region_id: String,
    pub region_name: String,
    pub availability_zone: String,
    pub sku_id: String,
    pub sku_price_id: String,

    pub billed_cost: f64,
    pub list_cost: f64,
    pub effective_cost: f64,
    pub contracted_cost: f64,

    pub consumed_quantity: f64,
    pub consumed_unit: String,

    pub commitment_discount_id: String,
    pub commitment_discount_type: String,
    pub commitment_discount_category: String,
    pub commitment_discount_name: String,
    pub commitment_discount_status: String,

    pub capacity_reservation_id: String,
    pub capacity_reservation_status: String,

    pub invoice_id: String,
    pub invoice_issuer_name: String,

    pub tags: BTreeMap<String, String>,
    pub extended_columns: BTreeMap<String, String>,

    pub allocated_cost: f64,
    pub allocated_quantity: f64,
    pub allocation_method: Option<String>,
    pub allocated_tags: BTreeMap<String, String>,

    /// Deprecated, superseded by `service_provider_name`. Kept so records
    /// written against the older field name still round-trip.
    pub provider_name: String,
    /// Deprecated, superseded by `host_provider_name`.
    pub publisher: String,
    pub service_provider_name: String,
    pub host_provider_name: String,
}

/// A single contracted spend commitment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractCommitment {
    pub contract_commitment_id: String,
    pub contract_id: String,
    pub commitment_type: String,
    pub commitment_amount: f64,
    pub commitment_currency: String,
    pub commitment_start: Option<DateTime<Utc>>,
    pub commitment_end: Option<DateTime<Utc>>,
    pub utilized_amount: f64,
    pub remaining_amount: f64,
    pub status: String,
}

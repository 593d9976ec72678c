//! Single-record JSON-LD serialization.
//!
//! Documents are hand-built `serde_json::Value` trees rather than derived
//! via `#[derive(Serialize)]`: field emission is runtime-conditional
//! (omit-empty, enum canonical-vs-IRI, cost-as-object-vs-bare-number) in a
//! way a derived `Serialize` impl can't express without a custom impl that
//! would end up doing the same thing by hand anyway.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::context::Context;
use super::identity::{IdentityError, IdentityGenerator};
use super::options::{DateFormat, SerializerOptions};
use super::record::{ChargeCategory, ChargeFrequency, ContractCommitment, FocusCostRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("cannot serialize a nil cost record")]
    NilRecord,
    #[error("cannot serialize a nil commitment")]
    NilCommitment,
}

pub struct Serializer {
    context: Context,
    options: SerializerOptions,
    identity: IdentityGenerator,
}

impl Serializer {
    /// Fails at construction, never at serialization time, if
    /// `options.user_id_field` names a field outside the recognized set.
    pub fn new(context: Context, options: SerializerOptions) -> Result<Self, IdentityError> {
        let mut identity = IdentityGenerator::new().with_prefix(options.id_prefix.clone());
        if let Some(field) = &options.user_id_field {
            identity = identity.with_user_id_field(field.clone())?;
        }
        Ok(Self { context, options, identity })
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    pub fn serialize_record(&self, record: Option<&FocusCostRecord>) -> Result<Value, SerializeError> {
        let record = record.ok_or(SerializeError::NilRecord)?;
        let mut obj = Map::new();
        obj.insert("@context".to_string(), self.context.build());
        obj.insert("@type".to_string(), json!("focus:FocusCostRecord"));
        obj.insert("@id".to_string(), json!(self.identity.generate(Some(record))));

        let opts = &self.options;
        let omit = opts.omit_empty_fields;

        string_field(&mut obj, "billingAccountId", &record.billing_account_id, omit);
        string_field(&mut obj, "billingAccountName", &record.billing_account_name, omit);
        string_field(&mut obj, "subAccountId", &record.sub_account_id, omit);
        string_field(&mut obj, "subAccountName", &record.sub_account_name, omit);

        timestamp_field(&mut obj, "billingPeriodStart", record.billing_period_start, omit);
        timestamp_field(&mut obj, "billingPeriodEnd", record.billing_period_end, omit);
        timestamp_field(&mut obj, "chargePeriodStart", record.charge_period_start, omit);
        timestamp_field(&mut obj, "chargePeriodEnd", record.charge_period_end, omit);

        string_field(&mut obj, "billingCurrency", &record.billing_currency, omit);
        string_field(&mut obj, "pricingCurrency", &record.pricing_currency, omit);

        charge_category_field(&mut obj, "chargeCategory", record.charge_category, opts);
        if let Some(class) = record.charge_class {
            obj.insert("chargeClass".to_string(), json!(class.canonical_name()));
        }
        charge_frequency_field(&mut obj, "chargeFrequency", record.charge_frequency, opts);

        float_field(&mut obj, "pricingQuantity", record.pricing_quantity, omit);
        string_field(&mut obj, "pricingUnit", &record.pricing_unit, omit);
        float_field(&mut obj, "listUnitPrice", record.list_unit_price, omit);
        float_field(&mut obj, "contractedUnitPrice", record.contracted_unit_price, omit);

        string_field(&mut obj, "serviceCategory", &record.service_category, omit);
        string_field(&mut obj, "serviceName", &record.service_name, omit);
        string_field(&mut obj, "serviceSubcategory", &record.service_subcategory, omit);
        string_field(&mut obj, "resourceId", &record.resource_id, omit);
        string_field(&mut obj, "resourceName", &record.resource_name, omit);
        string_field(&mut obj, "resourceType", &record.resource_type, omit);
        string_field(&mut obj, "regionId", &record.region_id, omit);
        string_field(&mut obj, "regionName", &record.region_name, omit);
        string_field(&mut obj, "availabilityZone", &record.availability_zone, omit);
        string_field(&mut obj, "skuId", &record.sku_id, omit);
        string_field(&mut obj, "skuPriceId", &record.sku_price_id, omit);

        cost_field(&mut obj, "billedCost", record.billed_cost, &record.billing_currency, omit);
        cost_field(&mut obj, "listCost", record.list_cost, &record.billing_currency, omit);
        cost_field(&mut obj, "effectiveCost", record.effective_cost, &record.billing_currency, omit);
        cost_field(&mut obj, "contractedCost", record.contracted_cost, &record.billing_currency, omit);

        float_field(&mut obj, "consumedQuantity", record.consumed_quantity, omit);
        string_field(&mut obj, "consumedUnit", &record.consumed_unit, omit);

        string_field(&mut obj, "commitmentDiscountId", &record.commitment_discount_id, omit);
        string_field(&mut obj, "commitmentDiscountType", &record.commitment_discount_type, omit);
        string_field(&mut obj, "commitmentDiscountCategory", &record.commitment_discount_category, omit);
        string_field(&mut obj, "commitmentDiscountName", &record.commitment_discount_name, omit);
        string_field(&mut obj, "commitmentDiscountStatus", &record.commitment_discount_status, omit);

        string_field(&mut obj, "capacityReservationId", &record.capacity_reservation_id, omit);
        string_field(&mut obj, "capacityReservationStatus", &record.capacity_reservation_status, omit);

        string_field(&mut obj, "invoiceId", &record.invoice_id, omit);
        string_field(&mut obj, "invoiceIssuerName", &record.invoice_issuer_name, omit);

        map_field(&mut obj, "tags", &record.tags, omit);
        map_field(&mut obj, "extendedColumns", &record.extended_columns, omit);

        cost_field(&mut obj, "allocatedCost", record.allocated_cost, &record.billing_currency, omit);
        float_field(&mut obj, "allocatedQuantity", record.allocated_quantity, omit);
        if let Some(method) = &record.allocation_method {
            string_field(&mut obj, "allocationMethod", method, omit);
        }
        map_field(&mut obj, "allocatedTags", &record.allocated_tags, omit);

        if opts.include_deprecated {
            string_field(&mut obj, "providerName", &record.provider_name, omit);
            string_field(&mut obj, "publisher", &record.publisher, omit);
        }
        string_field(&mut obj, "serviceProviderName", &record.service_provider_name, omit);
        string_field(&mut obj, "hostProviderName", &record.host_provider_name, omit);

        Ok(Value::Object(obj))
    }

    pub fn serialize_commitment(&self, commitment: Option<&ContractCommitment>) -> Result<Value, SerializeError> {
        let commitment = commitment.ok_or(SerializeError::NilCommitment)?;
        let mut obj = Map::new();
        obj.insert("@context".to_string(), self.context.build());
        obj.insert("@type".to_string(), json!("focus:ContractCommitment"));
        obj.insert("@id".to_string(), json!(self.identity.generate_commitment(Some(commitment))));

        let omit = self.options.omit_empty_fields;
        string_field(&mut obj, "contractCommitmentId", &commitment.contract_commitment_id, omit);
        string_field(&mut obj, "contractId", &commitment.contract_id, omit);
        string_field(&mut obj, "commitmentType", &commitment.commitment_type, omit);
        cost_field(&mut obj, "commitmentAmount", commitment.commitment_amount, &commitment.commitment_currency, omit);
        string_field(&mut obj, "commitmentCurrency", &commitment.commitment_currency, omit);
        timestamp_field(&mut obj, "commitmentStart", commitment.commitment_start, omit);
        timestamp_field(&mut obj, "commitmentEnd", commitment.commitment_end, omit);
        float_field(&mut obj, "utilizedAmount", commitment.utilized_amount, omit);
        float_field(&mut obj, "remainingAmount", commitment.remaining_amount, omit);
        string_field(&mut obj, "status", &commitment.status, omit);

        Ok(Value::Object(obj))
    }

    /// Renders a document to its final JSON string, honoring `prettyPrint`.
    pub fn to_json_string(&self, doc: &Value) -> serde_json::Result<String> {
        if self.options.pretty_print {
            serde_json::to_string_pretty(doc)
        } else {
            serde_json::to_string(doc)
        }
    }
}

fn string_field(obj: &mut Map<String, Value>, key: &str, value: &str, omit_empty: bool) {
    if !omit_empty || !value.is_empty() {
        obj.insert(key.to_string(), json!(value));
    }
}

fn float_field(obj: &mut Map<String, Value>, key: &str, value: f64, omit_empty: bool) {
    if !omit_empty || value != 0.0 {
        obj.insert(key.to_string(), json!(value));
    }
}

fn timestamp_field(obj: &mut Map<String, Value>, key: &str, value: Option<DateTime<Utc>>, omit_empty: bool) {
    match (value, omit_empty) {
        (Some(dt), _) => {
            obj.insert(key.to_string(), json!(format_timestamp(dt, DateFormat::Rfc3339)));
        }
        (None, false) => {
            obj.insert(key.to_string(), Value::Null);
        }
        (None, true) => {}
    }
}

fn format_timestamp(dt: DateTime<Utc>, format: DateFormat) -> String {
    match format {
        DateFormat::Rfc3339 => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    }
}

/// A non-zero cost paired with a currency code becomes a `schema:MonetaryAmount`
/// object; otherwise it's a bare number subject to omit-empty.
fn cost_field(obj: &mut Map<String, Value>, key: &str, value: f64, currency: &str, omit_empty: bool) {
    if value != 0.0 && !currency.is_empty() {
        obj.insert(
            key.to_string(),
            json!({ "@type": "schema:MonetaryAmount", "value": value, "currency": currency }),
        );
    } else if !omit_empty || value != 0.0 {
        obj.insert(key.to_string(), json!(value));
    }
}

fn map_field(obj: &mut Map<String, Value>, key: &str, value: &std::collections::BTreeMap<String, String>, omit_empty: bool) {
    if !omit_empty || !value.is_empty() {
        let mut nested = Map::new();
        for (k, v) in value {
            nested.insert(k.clone(), json!(v));
        }
        obj.insert(key.to_string(), Value::Object(nested));
    }
}

fn charge_category_field(obj: &mut Map<String, Value>, key: &str, category: ChargeCategory, opts: &SerializerOptions) {
    if category == ChargeCategory::Unspecified {
        if !opts.omit_empty_fields {
            obj.insert(key.to_string(), json!(category.canonical_name()));
        }
        return;
    }
    let rendered = if opts.use_iri_enums {
        format!("focus:{}", category.canonical_name())
    } else {
        category.canonical_name().to_string()
    };
    obj.insert(key.to_string(), json!(rendered));
}

fn charge_frequency_field(obj: &mut Map<String, Value>, key: &str, frequency: ChargeFrequency, opts: &SerializerOptions) {
    if frequency == ChargeFrequency::Unspecified {
        if !opts.omit_empty_fields {
            obj.insert(key.to_string(), json!(frequency.canonical_name()));
        }
        return;
    }
    let rendered = if opts.use_iri_enums {
        format!("focus:{}", frequency.canonical_name().replace('-', ""))
    } else {
        frequency.canonical_name().to_string()
    };
    obj.insert(key.to_string(), json!(rendered));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonld::context::Context;

    fn record() -> FocusCostRecord {
        FocusCostRecord {
            billing_account_id: "acct-1".to_string(),
            charge_period_start: Some("2025-06-01T00:00:00Z".parse().unwrap()),
            resource_id: "res-1".to_string(),
            billing_currency: "USD".to_string(),
            billed_cost: 42.5,
            charge_category: ChargeCategory::Usage,
            tags: [("team".to_string(), "platform".to_string())].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn nil_record_is_an_error() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        assert!(matches!(serializer.serialize_record(None), Err(SerializeError::NilRecord)));
    }

    #[test]
    fn top_level_keys_present() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert_eq!(doc["@type"], "focus:FocusCostRecord");
        assert!(doc["@id"].as_str().unwrap().starts_with("urn:focus:cost:"));
        assert!(doc["@context"].is_object());
    }

    #[test]
    fn nonzero_cost_with_currency_becomes_monetary_amount_object() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert_eq!(doc["billedCost"]["@type"], "schema:MonetaryAmount");
        assert_eq!(doc["billedCost"]["value"], 42.5);
        assert_eq!(doc["billedCost"]["currency"], "USD");
    }

    #[test]
    fn zero_cost_is_bare_number_and_omitted_when_zero() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert!(doc.get("listCost").is_none());
    }

    #[test]
    fn empty_strings_omitted_by_default() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert!(doc.get("resourceName").is_none());
    }

    #[test]
    fn empty_strings_kept_when_omit_disabled() {
        let opts = SerializerOptions::builder().omit_empty_fields(false).build();
        let serializer = Serializer::new(Context::new(), opts).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert_eq!(doc["resourceName"], "");
    }

    #[test]
    fn tags_map_is_nested_object() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert_eq!(doc["tags"]["team"], "platform");
    }

    #[test]
    fn unspecified_charge_category_omitted_by_default() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let mut r = record();
        r.charge_category = ChargeCategory::Unspecified;
        let doc = serializer.serialize_record(Some(&r)).unwrap();
        assert!(doc.get("chargeCategory").is_none());
    }

    #[test]
    fn iri_enum_mode_prefixes_focus() {
        let opts = SerializerOptions::builder().use_iri_enums(true).build();
        let serializer = Serializer::new(Context::new(), opts).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        assert_eq!(doc["chargeCategory"], "focus:Usage");
    }

    #[test]
    fn deprecated_fields_included_by_default() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let mut r = record();
        r.provider_name = "legacy-aws".to_string();
        let doc = serializer.serialize_record(Some(&r)).unwrap();
        assert_eq!(doc["providerName"], "legacy-aws");
    }

    #[test]
    fn deprecated_fields_excluded_when_disabled() {
        let opts = SerializerOptions::builder().include_deprecated(false).build();
        let serializer = Serializer::new(Context::new(), opts).unwrap();
        let mut r = record();
        r.provider_name = "legacy-aws".to_string();
        let doc = serializer.serialize_record(Some(&r)).unwrap();
        assert!(doc.get("providerName").is_none());
    }

    #[test]
    fn user_id_field_override_applies_to_identity() {
        let opts = SerializerOptions::builder().user_id_field("invoice_id").build();
        let serializer = Serializer::new(Context::new(), opts).unwrap();
        let mut r = record();
        r.invoice_id = "INV-2025-001".to_string();
        let doc = serializer.serialize_record(Some(&r)).unwrap();
        assert_eq!(doc["@id"], "urn:focus:cost:INV-2025-001");
    }

    #[test]
    fn commitment_serialization_uses_commitment_type_and_prefix() {
        let serializer = Serializer::new(Context::new(), SerializerOptions::default()).unwrap();
        let commitment = ContractCommitment { contract_commitment_id: "cc-1".to_string(), ..Default::default() };
        let doc = serializer.serialize_commitment(Some(&commitment)).unwrap();
        assert_eq!(doc["@type"], "focus:ContractCommitment");
        assert!(doc["@id"].as_str().unwrap().starts_with("urn:focus:commitment:"));
    }

    #[test]
    fn pretty_print_produces_indented_output() {
        let opts = SerializerOptions::builder().build();
        let serializer = Serializer::new(Context::new(), opts).unwrap();
        let doc = serializer.serialize_record(Some(&record())).unwrap();
        let compact = serializer.to_json_string(&doc).unwrap();
        assert!(!compact.contains('\n'));
    }
}

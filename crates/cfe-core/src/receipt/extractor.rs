//! Field extraction over recovered receipt text.

use tracing::{debug, trace};

use super::rules::FIELD_RULES;
use crate::models::receipt::{ExtractedFields, ReceiptField};

/// Fields identifying the service; at least one must be present.
const IDENTITY_FIELDS: [ReceiptField; 3] = [
    ReceiptField::ServiceNumber,
    ReceiptField::AccountNumber,
    ReceiptField::MeterNumber,
];

/// Consumption fields; at least one must be present.
const CONSUMPTION_FIELDS: [ReceiptField; 2] =
    [ReceiptField::ConsumptionKwh, ReceiptField::PreviousConsumption];

/// Billing fields; at least one must be present.
const BILLING_FIELDS: [ReceiptField; 2] = [ReceiptField::CurrentAmount, ReceiptField::TariffType];

/// Apply every field rule to `text`.
///
/// A field is present only when its pattern matched and the capture parsed;
/// fields that fail are omitted rather than stored empty.
pub fn extract_fields(text: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::new();

    for rule in FIELD_RULES.iter() {
        match rule.apply(text) {
            Some(value) => {
                trace!(field = %rule.field, value = %value, "Field matched");
                fields.insert(rule.field, value);
            }
            None => trace!(field = %rule.field, "Field not found"),
        }
    }

    debug!(
        found = fields.len(),
        total = FIELD_RULES.len(),
        "Extracted receipt fields"
    );
    fields
}

/// Minimum-viability gate: identity, consumption and billing information
/// must each be represented by at least one field.
pub fn is_usable_extraction(fields: &ExtractedFields) -> bool {
    let any = |group: &[ReceiptField]| group.iter().any(|f| fields.has(*f));
    any(&IDENTITY_FIELDS) && any(&CONSUMPTION_FIELDS) && any(&BILLING_FIELDS)
}

//! Field rule table: one pattern and one value parser per receipt field.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use super::patterns::*;
use crate::models::receipt::{FieldValue, ReceiptField};

/// How a captured string becomes a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueParser {
    /// Trimmed, internal whitespace collapsed.
    Text,
    /// Trimmed and uppercased (tariff codes).
    Code,
    /// Locale-aware number.
    Number,
    /// Kept as the captured string.
    Date,
}

impl ValueParser {
    pub fn parse(self, raw: &str) -> Option<FieldValue> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        match self {
            ValueParser::Text => Some(FieldValue::Text(
                trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
            )),
            ValueParser::Code => Some(FieldValue::Text(trimmed.to_uppercase())),
            ValueParser::Number => parse_locale_number(trimmed).map(FieldValue::Number),
            ValueParser::Date => Some(FieldValue::Text(trimmed.to_string())),
        }
    }
}

/// Extraction rule for one field. The value is capture group 1 of the first match.
pub struct FieldRule {
    pub field: ReceiptField,
    pub pattern: &'static Regex,
    pub parser: ValueParser,
}

lazy_static! {
    pub static ref FIELD_RULES: Vec<FieldRule> = vec![
        FieldRule { field: ReceiptField::ServiceNumber, pattern: &*SERVICE_NUMBER, parser: ValueParser::Text },
        FieldRule { field: ReceiptField::AccountNumber, pattern: &*ACCOUNT_NUMBER, parser: ValueParser::Text },
        FieldRule { field: ReceiptField::ClientName, pattern: &*CLIENT_NAME, parser: ValueParser::Text },
        FieldRule { field: ReceiptField::Address, pattern: &*ADDRESS, parser: ValueParser::Text },
        FieldRule { field: ReceiptField::CurrentConsumption, pattern: &*CURRENT_CONSUMPTION, parser: ValueParser::Number },
        FieldRule { field: ReceiptField::PreviousConsumption, pattern: &*PREVIOUS_CONSUMPTION, parser: ValueParser::Number },
        FieldRule { field: ReceiptField::ConsumptionKwh, pattern: &*CONSUMPTION_KWH, parser: ValueParser::Number },
        FieldRule { field: ReceiptField::CurrentAmount, pattern: &*CURRENT_AMOUNT, parser: ValueParser::Number },
        FieldRule { field: ReceiptField::TariffType, pattern: &*TARIFF_TYPE, parser: ValueParser::Code },
        FieldRule { field: ReceiptField::IssueDate, pattern: &*ISSUE_DATE, parser: ValueParser::Date },
        FieldRule { field: ReceiptField::DueDate, pattern: &*DUE_DATE, parser: ValueParser::Date },
        FieldRule { field: ReceiptField::MeterNumber, pattern: &*METER_NUMBER, parser: ValueParser::Text },
    ];
}

impl FieldRule {
    /// Apply the rule to text, yielding a value when the pattern matches and parses.
    pub fn apply(&self, text: &str) -> Option<FieldValue> {
        let captured = self.pattern.captures(text)?.get(1)?;
        self.parser.parse(captured.as_str())
    }
}

/// Parse a number written with either `,` or `.` as the decimal separator.
///
/// Handles "1,250.50", "1.250,50", "1,250" (thousands) and "245,5" (decimal).
pub fn parse_locale_number(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if is_thousands_grouped(&cleaned, ',') => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => {
            if is_thousands_grouped(&cleaned, '.') {
                cleaned.replace('.', "")
            } else {
                return None;
            }
        }
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

/// True when every group after the first has exactly three digits.
fn is_thousands_grouped(s: &str, separator: char) -> bool {
    let mut groups = s.trim_start_matches('-').split(separator);
    let head_ok = groups
        .next()
        .is_some_and(|head| !head.is_empty() && head.len() <= 3);
    head_ok && groups.all(|group| group.len() == 3)
}

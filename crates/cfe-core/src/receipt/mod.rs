//! CFE receipt analysis: text recovery, confidence scoring and field extraction.

pub mod analyzer;
pub mod confidence;
pub mod extractor;
pub mod patterns;
pub mod rules;

pub use analyzer::{ReceiptAnalyzer, RecoveredText};
pub use confidence::score_confidence;
pub use extractor::{extract_fields, is_usable_extraction};
pub use rules::{FIELD_RULES, FieldRule, ValueParser, parse_locale_number};

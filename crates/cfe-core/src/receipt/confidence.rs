//! Heuristic trustworthiness score for recovered text.

use regex::Regex;

use super::patterns::{ANY_DATE, CURRENCY_AMOUNT, KWH_MENTION, SERVICE_LABEL, TARIFF_TOKEN};

/// Weight of the structural-marker component.
const PATTERN_WEIGHT: f64 = 0.6;
/// Weight of the text-length component.
const LENGTH_WEIGHT: f64 = 0.4;
/// Character count at which the length component saturates.
const SATURATION_CHARS: f64 = 1000.0;

fn markers() -> [&'static Regex; 5] {
    [
        &*SERVICE_LABEL,
        &*KWH_MENTION,
        &*CURRENCY_AMOUNT,
        &*ANY_DATE,
        &*TARIFF_TOKEN,
    ]
}

/// Score text in `[0, 1]` from structural markers and length.
///
/// `0.6 * (markers found / 5) + 0.4 * min(chars / 1000, 1)`. Empty or
/// whitespace-only text scores 0.
pub fn score_confidence(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let markers = markers();
    let found = markers.iter().filter(|re| re.is_match(text)).count();
    let pattern_score = found as f64 / markers.len() as f64;
    let length_score = (text.chars().count() as f64 / SATURATION_CHARS).min(1.0);

    PATTERN_WEIGHT * pattern_score + LENGTH_WEIGHT * length_score
}

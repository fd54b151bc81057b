//! Field rule evaluation

use chrono::NaiveDate;
use serde_json::Value as JsonValue;
use validator::{ValidateEmail, ValidateLength, ValidateRange};

use super::ValidationContext;
use crate::models::{is_blank, FieldMap, FieldRule, FieldSpec};

/// Text form of a scalar, as a user typed it.
fn as_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn as_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(value: &JsonValue) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn range_message(label: &str, min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{} must be between {} and {}", label, min, max),
        (Some(min), None) => format!("{} must be at least {}", label, min),
        (None, Some(max)) => format!("{} must be at most {}", label, max),
        (None, None) => format!("{} must be a number", label),
    }
}

/// First failing rule of `spec` against `record`, as a user-facing message.
///
/// `siblings` are the field specs of the same record, used to label
/// cross-field messages.
pub fn check_field(
    spec: &FieldSpec,
    record: &FieldMap,
    siblings: &[FieldSpec],
    ctx: &ValidationContext,
) -> Option<String> {
    let label = spec.label.as_str();
    let raw = record.get(&spec.key);

    if is_blank(raw) {
        return spec
            .rules
            .iter()
            .any(|r| matches!(r, FieldRule::Required))
            .then(|| format!("{} is required", label));
    }
    let value = raw?;

    for rule in &spec.rules {
        let failure = match rule {
            FieldRule::Required => None,
            FieldRule::MinLength(min) => (!as_text(value).validate_length(Some(*min), None, None))
                .then(|| format!("{} must be at least {} characters", label, min)),
            FieldRule::MaxLength(max) => (!as_text(value).validate_length(None, Some(*max), None))
                .then(|| format!("{} must be at most {} characters", label, max)),
            FieldRule::Pattern { regex, message } => {
                (!regex.is_match(&as_text(value))).then(|| message.clone())
            }
            FieldRule::Email => (!as_text(value).validate_email())
                .then(|| format!("{} must be a valid email address", label)),
            FieldRule::Range { min, max } => match as_number(value) {
                Some(n) if n.validate_range(*min, *max, None, None) => None,
                Some(_) => Some(range_message(label, *min, *max)),
                None => Some(format!("{} must be a number", label)),
            },
            FieldRule::Date => parse_date(value)
                .is_none()
                .then(|| format!("{} must be a date (YYYY-MM-DD)", label)),
            FieldRule::NotBeforeToday => match parse_date(value) {
                Some(date) if date < ctx.today => {
                    Some(format!("{} must not be before today", label))
                }
                Some(_) => None,
                None => Some(format!("{} must be a date (YYYY-MM-DD)", label)),
            },
            FieldRule::NotBefore { other } => {
                let other_date = record.get(other).and_then(parse_date);
                match (parse_date(value), other_date) {
                    (Some(date), Some(other_date)) if date < other_date => {
                        let other_label = siblings
                            .iter()
                            .find(|s| &s.key == other)
                            .map(|s| s.label.as_str())
                            .unwrap_or(other.as_str());
                        Some(format!("{} must not be before {}", label, other_label))
                    }
                    (None, _) => Some(format!("{} must be a date (YYYY-MM-DD)", label)),
                    _ => None,
                }
            }
        };

        if failure.is_some() {
            return failure;
        }
    }

    None
}

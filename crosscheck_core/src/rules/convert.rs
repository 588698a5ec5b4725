//! Value converters for transformation rules: unit conversions and
//! date/clock reformatting. Every converter is lenient; a value it cannot
//! interpret yields None and the rule simply does not fire.

use crate::models::rule::TransformFn;
use chrono::{NaiveDate, NaiveTime};

/// Apply a named converter to a raw value.
pub fn apply(function: TransformFn, params: &serde_json::Value, value: &str) -> Option<String> {
    match function {
        TransformFn::FeetInchesToInches => feet_inches_to_inches(value).map(|n| n.to_string()),
        TransformFn::InchesToFeetInches => inches_to_feet_inches(value),
        TransformFn::PoundsToKilograms => pounds_to_kilograms(value),
        TransformFn::KilogramsToPounds => kilograms_to_pounds(value),
        TransformFn::DateFormat => reformat_date(value, params),
        TransformFn::ClockFormat => reformat_clock(value, params),
    }
}

/// Parse a height like "6-2", "6'2", "6' 2\"" or "6 2" into total inches.
pub fn feet_inches_to_inches(value: &str) -> Option<u32> {
    let cleaned: String = value
        .chars()
        .map(|c| if c.is_ascii_digit() { c } else { ' ' })
        .collect();
    let mut parts = cleaned.split_whitespace();
    let feet: u32 = parts.next()?.parse().ok()?;
    let inches: u32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || inches >= 12 {
        return None;
    }
    Some(feet * 12 + inches)
}

/// Render total inches as "F-I", the roster convention.
pub fn inches_to_feet_inches(value: &str) -> Option<String> {
    let total: u32 = value.trim().parse().ok()?;
    Some(format!("{}-{}", total / 12, total % 12))
}

fn parse_scalar(value: &str) -> Option<f64> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// "205" or "205 lbs" -> kilograms, rounded to the nearest whole number.
pub fn pounds_to_kilograms(value: &str) -> Option<String> {
    let lb = parse_scalar(value)?;
    Some(((lb * 0.453_592_37).round() as i64).to_string())
}

/// "93" or "93 kg" -> pounds, rounded to the nearest whole number.
pub fn kilograms_to_pounds(value: &str) -> Option<String> {
    let kg = parse_scalar(value)?;
    Some(((kg / 0.453_592_37).round() as i64).to_string())
}

/// Known schedule-date formats tried when a rule supplies no `from`.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%b %d, %Y", "%B %d, %Y"];

/// Reformat a date. Params: `{"from": "<strftime>", "to": "<strftime>"}`;
/// `from` optional, `to` defaults to ISO.
pub fn reformat_date(value: &str, params: &serde_json::Value) -> Option<String> {
    let to = params["to"].as_str().unwrap_or("%Y-%m-%d");
    let trimmed = value.trim();
    let date = match params["from"].as_str() {
        Some(from) => NaiveDate::parse_from_str(trimmed, from).ok()?,
        None => DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())?,
    };
    Some(date.format(to).to_string())
}

const CLOCK_FORMATS: &[&str] = &["%l:%M %p", "%I:%M %p", "%H:%M", "%l %p"];

/// Reformat a tip-off/kickoff time, e.g. "7:00 PM" <-> "19:00". Params:
/// `{"to": "<strftime>"}`, default 24-hour.
pub fn reformat_clock(value: &str, params: &serde_json::Value) -> Option<String> {
    let to = params["to"].as_str().unwrap_or("%H:%M");
    let trimmed = value.trim();
    let time = CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())?;
    Some(time.format(to).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_height_parsing_variants() {
        assert_eq!(feet_inches_to_inches("6-2"), Some(74));
        assert_eq!(feet_inches_to_inches("6'2"), Some(74));
        assert_eq!(feet_inches_to_inches("6' 2\""), Some(74));
        assert_eq!(feet_inches_to_inches("6"), Some(72));
        assert_eq!(feet_inches_to_inches("6-13"), None);
        assert_eq!(feet_inches_to_inches("tall"), None);
    }

    #[test]
    fn test_height_roundtrip() {
        assert_eq!(inches_to_feet_inches("74").as_deref(), Some("6-2"));
        assert_eq!(inches_to_feet_inches("72").as_deref(), Some("6-0"));
    }

    #[test]
    fn test_weight_conversion() {
        assert_eq!(pounds_to_kilograms("205").as_deref(), Some("93"));
        assert_eq!(kilograms_to_pounds("93 kg").as_deref(), Some("205"));
        assert_eq!(pounds_to_kilograms("heavy"), None);
    }

    #[test]
    fn test_date_reformat_with_known_formats() {
        let params = json!({});
        assert_eq!(
            reformat_date("01/10/2026", &params).as_deref(),
            Some("2026-01-10")
        );
        assert_eq!(
            reformat_date("Jan 10, 2026", &params).as_deref(),
            Some("2026-01-10")
        );
        assert_eq!(reformat_date("sometime soon", &params), None);
    }

    #[test]
    fn test_date_reformat_explicit_from() {
        let params = json!({"from": "%d.%m.%Y", "to": "%m/%d/%Y"});
        assert_eq!(
            reformat_date("10.01.2026", &params).as_deref(),
            Some("01/10/2026")
        );
    }

    #[test]
    fn test_clock_reformat() {
        let params = json!({});
        assert_eq!(reformat_clock("7:00 PM", &params).as_deref(), Some("19:00"));
        assert_eq!(reformat_clock("19:00", &params).as_deref(), Some("19:00"));
        assert_eq!(reformat_clock("TBA", &params), None);
    }
}

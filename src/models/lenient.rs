//! Tolerant decoders for gateway records.
//!
//! The gateway is a spreadsheet script, so cells come back loosely typed:
//! numbers as strings, blank cells as `""`, dates either as plain dates or as
//! full timestamps, and the step list sometimes double-encoded as a string.

use chrono::{DateTime, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serializer};
use serde_json::Value;

use super::product::Step;

/// Text cell: strings pass through, numbers and booleans are rendered, null is empty.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    })
}

/// Quantity cell: anything that is not a finite non-negative number decodes as 0.
pub fn quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(quantity_from_value).unwrap_or(0))
}

pub(crate) fn quantity_from_value(value: &Value) -> u64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(true) => Some(1.0),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
        _ => 0,
    }
}

/// Date cell: `YYYY-MM-DD`, an RFC 3339 timestamp, or blank.
pub fn date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

/// Parses the date formats the gateway is known to emit.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }
    // Anything else that starts with a plain date, e.g. "2026-03-01 00:00:00".
    trimmed
        .get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Step list: an array, a string holding an array, or blank.
pub fn steps<'de, D>(deserializer: D) -> Result<Vec<Step>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let array = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if !s.trim().is_empty() => {
            match serde_json::from_str::<Value>(&s) {
                Ok(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    };
    Ok(array.into_iter().filter_map(step_from_value).collect())
}

fn step_from_value(value: Value) -> Option<Step> {
    match value {
        Value::Object(map) => {
            let name = match map.get("name") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let done = match map.get("done") {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
                Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
                _ => false,
            };
            Some(Step { name, done })
        }
        Value::String(name) => Some(Step { name, done: false }),
        _ => None,
    }
}

/// Writes an optional date as `YYYY-MM-DD`, or `""` when absent.
pub fn serialize_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        None => serializer.serialize_str(""),
    }
}

/// Date field of a partial update, present on the wire: `""` or null clears
/// the date, anything else must parse. Pair with `#[serde(default)]` so an
/// absent field stays `None`.
pub fn date_change<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(Some(None)),
        Value::String(s) if s.trim().is_empty() => Ok(Some(None)),
        Value::String(s) => parse_date(&s)
            .map(|date| Some(Some(date)))
            .ok_or_else(|| de::Error::custom(format!("invalid date '{}'", s))),
        other => Err(de::Error::custom(format!("expected a date string, got {}", other))),
    }
}

/// Writes a date change: a cleared date goes out as `""`.
pub fn serialize_date_change<S>(
    change: &Option<Option<NaiveDate>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match change {
        Some(date) => serialize_date(date, serializer),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantity_accepts_strings_and_rejects_garbage() {
        assert_eq!(quantity_from_value(&json!(12)), 12);
        assert_eq!(quantity_from_value(&json!("40")), 40);
        assert_eq!(quantity_from_value(&json!(" 7.9 ")), 7);
        assert_eq!(quantity_from_value(&json!("")), 0);
        assert_eq!(quantity_from_value(&json!("abc")), 0);
        assert_eq!(quantity_from_value(&json!(-3)), 0);
        assert_eq!(quantity_from_value(&Value::Null), 0);
    }

    #[test]
    fn parse_date_handles_gateway_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 1);
        assert_eq!(parse_date("2026-03-01"), expected);
        assert_eq!(parse_date("2026-03-01T00:00:00.000Z"), expected);
        assert_eq!(parse_date("2026-03-01T05:30:00+05:30"), expected);
        assert_eq!(parse_date("2026-03-01 00:00:00"), expected);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("soon"), None);
    }
}

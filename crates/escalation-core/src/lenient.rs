//! Tolerant decoding of loosely typed document fields.
//!
//! Incident collections are written by several producers: the ticketing system exports
//! reference fields as `{"display_value": ..}`, MongoDB relaxed extended JSON wraps ids
//! and dates as `{"$oid": ..}` / `{"$date": ..}`, and some writers store numbers where
//! others store strings. Everything funnels through [`text`] and [`timestamp`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Array(_) => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => {
            if map.contains_key("$date") {
                return timestamp(value).map(format_timestamp);
            }
            [
                "display_value",
                "value",
                "$oid",
                "$numberLong",
                "$numberInt",
                "$numberDouble",
                "name",
            ]
            .iter()
            .find_map(|key| map.get(*key).and_then(text))
        }
    }
}

pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return timestamp(inner);
            }
            map.get("$numberLong")
                .and_then(text)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(from_millis)
        }
        _ => None,
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }
    raw.parse::<i64>().ok().and_then(from_millis)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extended-JSON date wrapper, the shape both the JSON store and MongoDB understand.
pub fn date_value(ts: DateTime<Utc>) -> Value {
    serde_json::json!({ "$date": format_timestamp(ts) })
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn de_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_unwraps_reference_and_extended_json_shapes() {
        assert_eq!(text(&json!("  Network ")), Some("Network".to_string()));
        assert_eq!(text(&json!("")), None);
        assert_eq!(text(&json!(2)), Some("2".to_string()));
        let reference = json!({"display_value": "Service Desk", "link": "https://x"});
        assert_eq!(text(&reference), Some("Service Desk".to_string()));
        assert_eq!(
            text(&json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"})),
            Some("65a1f0c2e4b0a1b2c3d4e5f6".to_string())
        );
        assert_eq!(
            text(&json!({"$date": "2024-03-01T10:00:00Z"})),
            Some("2024-03-01T10:00:00.000Z".to_string())
        );
        assert_eq!(text(&json!(["a"])), None);
    }

    #[test]
    fn timestamp_accepts_every_producer_format() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single();
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z"), expected);
        assert_eq!(parse_timestamp("2024-03-01T15:30:00+05:30"), expected);
        assert_eq!(parse_timestamp("2024-03-01 10:00:00"), expected);
        assert_eq!(parse_timestamp("2024-03-01T10:00:00.000"), expected);
        assert_eq!(timestamp(&json!(1_709_287_200_000_i64)), expected);
        assert_eq!(
            timestamp(&json!({"$date": {"$numberLong": "1709287200000"}})),
            expected
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}

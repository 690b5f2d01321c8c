//! Default payloads and key-by-key override merging.

use chrono::{DateTime, FixedOffset};
use proto::Payload;
use serde_json::Value;

use crate::client::ClientConfig;

/// Merges layers left to right; a key in a later layer replaces the same key
/// from any earlier one. Nested objects are replaced, not merged.
pub fn layered(layers: &[&Payload]) -> Payload {
    let mut merged = Payload::new();
    for layer in layers {
        for (key, value) in layer.iter() {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// `{start_date, end_date, currency, locale}` for a reservation pull.
pub fn reservation_defaults(
    config: &ClientConfig,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Payload {
    let mut defaults = Payload::new();
    defaults.insert("start_date".into(), Value::String(start.to_rfc3339()));
    defaults.insert("end_date".into(), Value::String(end.to_rfc3339()));
    defaults.insert("currency".into(), Value::String(config.currency.clone()));
    defaults.insert("locale".into(), Value::String(config.locale.clone()));
    defaults
}

/// `{timezone, currency}` for an availability push.
pub fn availability_defaults(config: &ClientConfig) -> Payload {
    let mut defaults = Payload::new();
    defaults.insert("timezone".into(), Value::String(config.timezone.clone()));
    defaults.insert("currency".into(), Value::String(config.currency.clone()));
    defaults
}

/// `{currency}` for a rates push.
pub fn rate_defaults(config: &ClientConfig) -> Payload {
    let mut defaults = Payload::new();
    defaults.insert("currency".into(), Value::String(config.currency.clone()));
    defaults
}

/// Flattens a payload into query pairs. Strings are sent raw, null is
/// dropped, anything else is sent as compact JSON.
pub fn query_pairs(payload: &Payload) -> Vec<(String, String)> {
    payload
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(s) => Some((key.clone(), s.clone())),
            other => Some((key.clone(), other.to_string())),
        })
        .collect()
}

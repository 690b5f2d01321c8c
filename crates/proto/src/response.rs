use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON object used for request payloads, options and envelope meta.
pub type Payload = serde_json::Map<String, Value>;

/// Uniform result envelope returned by every channel operation.
///
/// No channel-specific field ever lives at the top level; raw channel bodies
/// go in `data`, diagnostics in `meta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelResponse {
    pub success: bool,
    pub message: String,
    /// Raw channel payload. An empty object when nothing was returned.
    pub data: Value,
    /// Diagnostic context (`timestamp`, `status`, `exception`, ...).
    pub meta: Payload,
}

impl ChannelResponse {
    /// Creates a success envelope carrying `data`.
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self::build(true, message.into(), data)
    }

    /// Creates a failure envelope with empty data.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::build(false, message.into(), empty_data())
    }

    fn build(success: bool, message: String, data: Value) -> Self {
        let mut meta = Payload::new();
        meta.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Self {
            success,
            message,
            data: if data.is_null() { empty_data() } else { data },
            meta,
        }
    }

    /// Replaces the data payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = if data.is_null() { empty_data() } else { data };
        self
    }

    /// Adds one diagnostic entry to `meta`.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// HTTP status recorded in meta, if a response was received.
    pub fn status(&self) -> Option<u16> {
        self.meta
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
    }

    /// Transport exception text recorded in meta.
    pub fn exception(&self) -> Option<&str> {
        self.meta.get("exception").and_then(Value::as_str)
    }
}

fn empty_data() -> Value {
    Value::Object(Payload::new())
}

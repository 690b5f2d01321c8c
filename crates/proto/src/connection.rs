use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target environment of a channel API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Live channel API.
    Production,
    /// Channel test/sandbox API.
    Sandbox,
}

impl Environment {
    /// Maps the connection sandbox flag to an environment.
    pub fn from_sandbox_flag(uses_sandbox: bool) -> Self {
        if uses_sandbox {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    /// Key used under `base_urls` in the registry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tenant's binding to one channel.
///
/// Owned by the persistence layer; the integration layer only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConnection {
    /// Persistence identifier, also used as the client cache key.
    pub id: String,
    /// Owning organization.
    #[serde(default)]
    pub organization_id: String,
    /// Target channel name (e.g. `airbnb`).
    pub channel: String,
    /// Channel-specific secrets (client id/secret, API key, ...).
    #[serde(default)]
    pub credentials: HashMap<String, String>,
    /// Per-connection overrides (`timeout`, `connect_timeout`, `headers`, ...).
    #[serde(default)]
    pub settings: serde_json::Map<String, Value>,
    /// Selects the sandbox environment when set.
    #[serde(default)]
    pub uses_sandbox: bool,
    /// Overrides the registry base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Last out-of-band modification (credential rotation etc.).
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ChannelConnection {
    /// Creates a bare connection for `channel`.
    pub fn new(id: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            ..Self::default()
        }
    }

    /// Environment selected by `uses_sandbox`.
    pub fn environment(&self) -> Environment {
        Environment::from_sandbox_flag(self.uses_sandbox)
    }

    /// Returns a non-blank credential value.
    pub fn credential(&self, field: &str) -> Option<&str> {
        non_blank(self.credentials.get(field).map(String::as_str))
    }

    /// Returns a non-blank identifier-like setting. Numbers are rendered as
    /// their decimal text, so `hotel_id = 4471` and `hotel_id = "4471"` match.
    pub fn setting_string(&self, key: &str) -> Option<String> {
        match self.settings.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Returns a numeric setting, accepting numeric strings.
    pub fn setting_u64(&self, key: &str) -> Option<u64> {
        match self.settings.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Custom outbound headers from `settings.headers`.
    pub fn custom_headers(&self) -> Vec<(String, String)> {
        let Some(Value::Object(headers)) = self.settings.get("headers") else {
            return Vec::new();
        };
        headers
            .iter()
            .filter_map(|(name, value)| match value {
                Value::String(s) => Some((name.clone(), s.clone())),
                Value::Number(_) | Value::Bool(_) => Some((name.clone(), value.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Locale override, if set.
    pub fn locale(&self) -> Option<&str> {
        non_blank(self.locale.as_deref())
    }

    /// Currency override, if set.
    pub fn currency(&self) -> Option<&str> {
        non_blank(self.currency.as_deref())
    }

    /// Timezone override, if set.
    pub fn timezone(&self) -> Option<&str> {
        non_blank(self.timezone.as_deref())
    }

    /// Base URL override, if set.
    pub fn api_base_url(&self) -> Option<&str> {
        non_blank(self.api_base_url.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

//! Process-level credential fallbacks.

use std::collections::HashMap;

use proto::CredentialsError;

/// Snapshot of channel credentials taken once from the environment.
///
/// Keys follow `<CHANNEL>_<FIELD>` in upper case, e.g. `AIRBNB_CLIENT_ID`.
#[derive(Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<String, String>,
}

impl CredentialStore {
    /// Captures the current process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Builds a store from arbitrary `(name, value)` pairs.
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(_, v)| !v.trim().is_empty())
                .collect(),
        }
    }

    /// Variable name holding `field` for `channel`.
    pub fn env_key(channel: &str, field: &str) -> String {
        let normalize = |s: &str| {
            s.chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        };
        format!("{}_{}", normalize(channel), normalize(field))
    }

    /// Looks up a fallback credential.
    pub fn get(&self, channel: &str, field: &str) -> Option<&str> {
        self.entries
            .get(&Self::env_key(channel, field))
            .map(String::as_str)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Credential material resolved for one client.
#[derive(Clone, Default)]
pub struct ResolvedCredentials {
    channel: String,
    values: HashMap<String, String>,
}

impl ResolvedCredentials {
    pub(crate) fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            values: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, field: &str, value: &str) {
        self.values.insert(field.to_string(), value.to_string());
    }

    /// Returns a mandatory field or `MissingCredentials`.
    pub fn require(&self, field: &str) -> Result<&str, CredentialsError> {
        self.values
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| CredentialsError::MissingCredentials {
                channel: self.channel.clone(),
                field: field.to_string(),
            })
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<&str> = self.values.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("ResolvedCredentials")
            .field("channel", &self.channel)
            .field("fields", &fields)
            .finish()
    }
}

//! Process-wide, read-only channel configuration.
//!
//! Loaded once at startup from TOML. `${VAR}` placeholders and the
//! `CHANNEL_SYNC_*` default overrides are resolved at load time; later
//! environment changes are not observed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proto::{ConfigurationError, Environment};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Advisory request ceilings. Not enforced by this crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_per_hour: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_connections: Option<u32>,
}

/// Inbound webhook settings consumed by the webhook verifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Header carrying the body signature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_header: Option<String>,
}

/// Static settings for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// environment → base URL.
    #[serde(default)]
    pub base_urls: BTreeMap<String, String>,
    /// logical operation → path.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub rate_limits: RateLimits,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub supported_locales: Vec<String>,
    #[serde(default)]
    pub supported_currencies: Vec<String>,
}

impl ChannelConfig {
    /// Base URL for `environment`, ignoring blank values.
    pub fn base_url(&self, environment: Environment) -> Option<&str> {
        self.base_urls
            .get(environment.as_str())
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Path mapped to a logical endpoint name, ignoring blank values.
    pub fn endpoint(&self, logical: &str) -> Option<&str> {
        self.endpoints
            .get(logical)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Name of the webhook signature header, if configured.
    pub fn signature_header(&self) -> Option<&str> {
        self.webhook
            .signature_header
            .as_deref()
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns `true` when `locale` is accepted (or no list is declared).
    pub fn supports_locale(&self, locale: &str) -> bool {
        self.supported_locales.is_empty()
            || self
                .supported_locales
                .iter()
                .any(|l| l.eq_ignore_ascii_case(locale))
    }

    /// Returns `true` when `currency` is accepted (or no list is declared).
    pub fn supports_currency(&self, currency: &str) -> bool {
        self.supported_currencies.is_empty()
            || self
                .supported_currencies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(currency))
    }
}

/// Process-level defaults applied when a connection carries no override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Value of the `X-Source-System` header.
    #[serde(default = "default_source_system")]
    pub source_system: String,
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_source_system() -> String {
    "channel-sync".to_string()
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            currency: default_currency(),
            timezone: default_timezone(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            source_system: default_source_system(),
        }
    }
}

/// On-disk shape of the registry file.
#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    channels: HashMap<String, ChannelConfig>,
}

/// Immutable snapshot of every channel's configuration.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    defaults: Defaults,
    channels: HashMap<String, Arc<ChannelConfig>>,
    /// JSON view of each channel table for dotted lookups.
    views: HashMap<String, Value>,
}

impl ChannelRegistry {
    /// Creates an empty registry with the given defaults.
    pub fn new(defaults: Defaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Adds or replaces one channel. Used to assemble fixture registries.
    pub fn with_channel(mut self, name: impl Into<String>, config: ChannelConfig) -> Self {
        self.insert(name.into(), config);
        self
    }

    fn insert(&mut self, name: String, config: ChannelConfig) {
        let view = serde_json::to_value(&config).unwrap_or(Value::Null);
        self.views.insert(name.clone(), view);
        self.channels.insert(name, Arc::new(config));
    }

    /// Loads the registry from an explicit path or the fallback locations,
    /// resolving placeholders and default overrides from the process env.
    ///
    /// Lookup order: `path`, `./channels.toml`, `~/.channel-sync/channels.toml`.
    /// With no file at all the registry is empty.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let config_path = path.map(Path::to_path_buf).or_else(default_registry_path);
        debug!(path = ?config_path, "Registry file resolved");

        let lookup = |name: &str| std::env::var(name).ok();
        let mut registry = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str_with(&content, lookup)?
            }
            None => Self::default(),
        };
        registry.apply_env_overrides(lookup);

        debug!(
            channels = registry.channels.len(),
            locale = %registry.defaults.locale,
            currency = %registry.defaults.currency,
            "Registry loaded"
        );
        Ok(registry)
    }

    /// Parses registry TOML, resolving `${VAR}` from the process env.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        Self::from_toml_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parses registry TOML, resolving `${VAR}` through `lookup`.
    pub fn from_toml_str_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut doc: toml::Value =
            toml::from_str(content).map_err(|e| ConfigurationError::Toml(e.to_string()))?;
        interpolate_value(&mut doc, &lookup);
        let file: RegistryFile = doc
            .try_into()
            .map_err(|e: toml::de::Error| ConfigurationError::Toml(e.to_string()))?;

        let mut registry = Self::new(file.defaults);
        for (name, config) in file.channels {
            registry.insert(name, config);
        }
        Ok(registry)
    }

    /// Applies `CHANNEL_SYNC_*` overrides to the defaults table.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, var: &str| {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *target = value;
            }
        };
        set(&mut self.defaults.locale, "CHANNEL_SYNC_LOCALE");
        set(&mut self.defaults.currency, "CHANNEL_SYNC_CURRENCY");
        set(&mut self.defaults.timezone, "CHANNEL_SYNC_TIMEZONE");

        for (var, target) in [
            ("CHANNEL_SYNC_TIMEOUT_SECS", &mut self.defaults.timeout_secs),
            (
                "CHANNEL_SYNC_CONNECT_TIMEOUT_SECS",
                &mut self.defaults.connect_timeout_secs,
            ),
        ] {
            if let Some(raw) = lookup(var) {
                match raw.trim().parse::<u64>() {
                    Ok(secs) => *target = secs,
                    Err(e) => warn!(var, value = %raw, "Ignoring invalid override: {e}"),
                }
            }
        }
    }

    /// Process-level defaults.
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Typed config for `channel`.
    pub fn channel(&self, channel: &str) -> Option<Arc<ChannelConfig>> {
        self.channels.get(channel).cloned()
    }

    /// Configured channel names, sorted.
    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Dotted-path lookup into a channel's table (e.g. `base_urls.sandbox`).
    ///
    /// Returns `default` when the channel or any path segment is absent.
    /// Never fails; callers decide whether a missing value is fatal.
    pub fn get(&self, channel: &str, key: &str, default: Value) -> Value {
        let Some(mut node) = self.views.get(channel) else {
            return default;
        };
        for segment in key.split('.') {
            match node.get(segment) {
                Some(next) => node = next,
                None => return default,
            }
        }
        node.clone()
    }

    /// String-valued [`get`](Self::get), ignoring blank strings.
    pub fn get_str(&self, channel: &str, key: &str) -> Option<String> {
        match self.get(channel, key, Value::Null) {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }
}

fn default_registry_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?.join("channels.toml");
    if cwd.exists() {
        return Some(cwd);
    }
    let home = std::env::var("HOME").ok()?;
    let home_config = PathBuf::from(home)
        .join(".channel-sync")
        .join("channels.toml");
    if home_config.exists() {
        return Some(home_config);
    }
    None
}

fn interpolate_value(value: &mut toml::Value, lookup: &impl Fn(&str) -> Option<String>) {
    match value {
        toml::Value::String(s) if s.contains("${") => *s = interpolate(s, lookup),
        toml::Value::Array(items) => items
            .iter_mut()
            .for_each(|item| interpolate_value(item, lookup)),
        toml::Value::Table(table) => table
            .iter_mut()
            .for_each(|(_, item)| interpolate_value(item, lookup)),
        _ => {}
    }
}

/// Replaces `${NAME}` occurrences; unset variables become empty strings.
fn interpolate(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        out.push_str(&lookup(name).unwrap_or_default());
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

//! Connection file loading and argument parsing helpers.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use proto::{ChannelConnection, ConfigurationError, Payload};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Connections the CLI can operate on.
///
/// ```toml
/// [[connections]]
/// id = "villa-rosa-airbnb"
/// channel = "airbnb"
/// uses_sandbox = true
/// currency = "EUR"
///
/// [connections.credentials]
/// client_id = "..."
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ConnectionsFile {
    #[serde(default)]
    pub connections: Vec<ChannelConnection>,
}

impl ConnectionsFile {
    /// Loads connections from an explicit path or the fallback locations.
    ///
    /// Lookup order: `path`, `./connections.toml`,
    /// `~/.channel-sync/connections.toml`. With no file the list is empty.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let file_path = path.map(Path::to_path_buf).or_else(default_connections_path);
        debug!(path = ?file_path, "Connections file resolved");

        let Some(file_path) = file_path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(&file_path)?;
        let file = Self::from_toml_str(&content)?;
        debug!(connections = file.connections.len(), "Connections loaded");
        Ok(file)
    }

    /// Parses connections TOML. Native TOML datetimes (`updated_at =
    /// 2025-05-01T12:00:00Z`) are accepted alongside quoted RFC 3339 strings.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        let mut doc: toml::Value =
            toml::from_str(content).map_err(|e| ConfigurationError::Toml(e.to_string()))?;
        datetimes_to_strings(&mut doc);
        doc.try_into()
            .map_err(|e: toml::de::Error| ConfigurationError::Toml(e.to_string()))
    }

    /// Looks up a connection by id.
    pub fn find(&self, id: &str) -> Result<&ChannelConnection, ConfigurationError> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| ConfigurationError::InvalidValue {
                field: "connection".to_string(),
                reason: format!("no connection with id `{id}`"),
            })
    }
}

fn datetimes_to_strings(value: &mut toml::Value) {
    match value {
        toml::Value::Datetime(dt) => *value = toml::Value::String(dt.to_string()),
        toml::Value::Array(items) => items.iter_mut().for_each(datetimes_to_strings),
        toml::Value::Table(table) => table
            .iter_mut()
            .for_each(|(_, item)| datetimes_to_strings(item)),
        _ => {}
    }
}

fn default_connections_path() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?.join("connections.toml");
    if cwd.exists() {
        return Some(cwd);
    }
    let home = std::env::var("HOME").ok()?;
    let home_file = PathBuf::from(home)
        .join(".channel-sync")
        .join("connections.toml");
    if home_file.exists() {
        return Some(home_file);
    }
    None
}

/// Reads a JSON object from `path` for use as a push payload.
pub fn load_payload(path: &Path) -> Result<Payload, ConfigurationError> {
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigurationError::InvalidValue {
            field: path.display().to_string(),
            reason: "payload must be a JSON object".to_string(),
        }),
        Err(e) => Err(ConfigurationError::InvalidValue {
            field: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Parses a `key=value` option. Values that parse as JSON keep their type,
/// everything else is a string.
pub fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parses an RFC 3339 timestamp argument.
pub fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(raw).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}

/// Collects parsed options into a payload; later keys win.
pub fn options_payload(options: Vec<(String, Value)>) -> Payload {
    options.into_iter().collect()
}

//! Builds channel clients from connections.
//!
//! Resolution order for every value: connection override, then the
//! process-level store (credentials) or registry defaults (settings).
//! Building performs no network I/O.

use std::sync::Arc;
use std::time::Duration;

use proto::{
    ChannelConnection, ChannelError, ConfigurationError, CredentialsError, Environment,
};
use reqwest::header::{HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::airbnb::{self, AirbnbClient};
use crate::auth::AuthStrategy;
use crate::booking::{self, BookingClient};
use crate::client::{ChannelClient, ClientConfig};
use crate::credentials::{CredentialStore, ResolvedCredentials};
use crate::expedia::{self, ExpediaClient};
use crate::http::ChannelHttp;
use crate::registry::{ChannelConfig, ChannelRegistry};
use crate::reporter::{ErrorReporter, TracingReporter};
use crate::transport::{HttpTransport, ReqwestTransport};

/// Adapters known to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Airbnb,
    Booking,
    Expedia,
}

impl AdapterKind {
    /// Maps a connection channel name to an adapter.
    pub fn from_channel(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            airbnb::CHANNEL => Some(Self::Airbnb),
            booking::CHANNEL | "booking.com" | "booking_com" => Some(Self::Booking),
            expedia::CHANNEL => Some(Self::Expedia),
            _ => None,
        }
    }

    /// Canonical registry key.
    pub fn channel(self) -> &'static str {
        match self {
            Self::Airbnb => airbnb::CHANNEL,
            Self::Booking => booking::CHANNEL,
            Self::Expedia => expedia::CHANNEL,
        }
    }

    pub fn required_credentials(self) -> &'static [&'static str] {
        match self {
            Self::Airbnb => airbnb::REQUIRED_CREDENTIALS,
            Self::Booking => booking::REQUIRED_CREDENTIALS,
            Self::Expedia => expedia::REQUIRED_CREDENTIALS,
        }
    }

    fn auth(self, credentials: &ResolvedCredentials) -> Result<AuthStrategy, CredentialsError> {
        match self {
            Self::Airbnb => airbnb::auth(credentials),
            Self::Booking => booking::auth(credentials),
            Self::Expedia => expedia::auth(credentials),
        }
    }

    fn build(self, http: ChannelHttp, connection: &ChannelConnection) -> Arc<dyn ChannelClient> {
        match self {
            Self::Airbnb => Arc::new(AirbnbClient::new(http)),
            Self::Booking => Arc::new(BookingClient::new(
                http,
                connection.setting_string("hotel_id"),
            )),
            Self::Expedia => Arc::new(ExpediaClient::new(
                http,
                connection.setting_string("property_id"),
            )),
        }
    }
}

/// Canonical registry key for `name`, resolving aliases such as
/// `booking.com`. Unknown names are returned unchanged.
pub fn canonical_channel(name: &str) -> &str {
    AdapterKind::from_channel(name).map_or(name, |kind| kind.channel())
}

/// Builds immutable clients from connections and the injected stores.
#[derive(Clone)]
pub struct ClientFactory {
    registry: Arc<ChannelRegistry>,
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    reporter: Arc<dyn ErrorReporter>,
}

impl ClientFactory {
    /// Factory using the reqwest transport and tracing reporter.
    pub fn new(registry: Arc<ChannelRegistry>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            registry,
            credentials,
            transport: Arc::new(ReqwestTransport::new()),
            reporter: Arc::new(TracingReporter),
        }
    }

    /// Replaces the HTTP transport.
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replaces the observability sink.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Builds a channel-specific client for `connection`.
    ///
    /// Fails with a configuration or credentials error before any request
    /// could be made.
    pub fn build_client(
        &self,
        connection: &ChannelConnection,
    ) -> Result<Arc<dyn ChannelClient>, ChannelError> {
        let kind = AdapterKind::from_channel(&connection.channel).ok_or_else(|| {
            ConfigurationError::UnsupportedChannel(connection.channel.clone())
        })?;
        let channel = kind.channel();
        let environment = connection.environment();
        let channel_config = self.registry.channel(channel).unwrap_or_default();

        let base_url = resolve_base_url(connection, &channel_config, channel, environment)?;
        let credentials = self.resolve_credentials(kind, connection)?;
        let auth = kind.auth(&credentials)?;
        let config = self.resolve_config(channel, environment, connection, &channel_config)?;

        debug!(
            channel,
            connection = %connection.id,
            environment = %environment,
            base_url = %base_url,
            auth = auth.scheme(),
            "Channel client built"
        );

        let http = ChannelHttp::new(
            config,
            base_url,
            auth,
            channel_config,
            self.transport.clone(),
            self.reporter.clone(),
        );
        Ok(kind.build(http, connection))
    }

    fn resolve_credentials(
        &self,
        kind: AdapterKind,
        connection: &ChannelConnection,
    ) -> Result<ResolvedCredentials, CredentialsError> {
        let channel = kind.channel();
        let mut resolved = ResolvedCredentials::new(channel);
        for field in kind.required_credentials() {
            let value = connection
                .credential(field)
                .or_else(|| self.credentials.get(channel, field))
                .ok_or_else(|| CredentialsError::MissingCredentials {
                    channel: channel.to_string(),
                    field: (*field).to_string(),
                })?;
            resolved.insert(field, value);
        }
        Ok(resolved)
    }

    fn resolve_config(
        &self,
        channel: &str,
        environment: Environment,
        connection: &ChannelConnection,
        channel_config: &ChannelConfig,
    ) -> Result<ClientConfig, ConfigurationError> {
        let defaults = self.registry.defaults();
        let headers = connection.custom_headers();
        validate_headers(channel, &headers)?;

        let config = ClientConfig {
            channel: channel.to_string(),
            environment,
            timeout: non_zero_secs(
                channel,
                "timeout",
                connection
                    .setting_u64("timeout")
                    .unwrap_or(defaults.timeout_secs),
            )?,
            connect_timeout: non_zero_secs(
                channel,
                "connect_timeout",
                connection
                    .setting_u64("connect_timeout")
                    .unwrap_or(defaults.connect_timeout_secs),
            )?,
            headers,
            locale: connection
                .locale()
                .unwrap_or(defaults.locale.as_str())
                .to_string(),
            currency: connection
                .currency()
                .unwrap_or(defaults.currency.as_str())
                .to_string(),
            timezone: connection
                .timezone()
                .unwrap_or(defaults.timezone.as_str())
                .to_string(),
            source_system: defaults.source_system.clone(),
        };

        if !channel_config.supports_locale(&config.locale) {
            warn!(channel, locale = %config.locale, "Locale not listed as supported by channel");
        }
        if !channel_config.supports_currency(&config.currency) {
            warn!(channel, currency = %config.currency, "Currency not listed as supported by channel");
        }
        Ok(config)
    }
}

fn validate_headers(channel: &str, headers: &[(String, String)]) -> Result<(), ConfigurationError> {
    for (name, value) in headers {
        let invalid = |reason: String| ConfigurationError::InvalidValue {
            field: format!("{channel}.settings.headers.{name}"),
            reason,
        };
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(())
}

/// Zero is rejected; reqwest treats it as an immediate timeout.
fn non_zero_secs(channel: &str, key: &str, secs: u64) -> Result<Duration, ConfigurationError> {
    if secs == 0 {
        return Err(ConfigurationError::InvalidValue {
            field: format!("{channel}.{key}"),
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn resolve_base_url(
    connection: &ChannelConnection,
    channel_config: &ChannelConfig,
    channel: &str,
    environment: Environment,
) -> Result<String, ConfigurationError> {
    connection
        .api_base_url()
        .or_else(|| channel_config.base_url(environment))
        .map(|url| url.trim_end_matches('/').to_string())
        .ok_or_else(|| ConfigurationError::MissingConfiguration {
            channel: channel.to_string(),
            key: format!("base_urls.{environment}"),
        })
}

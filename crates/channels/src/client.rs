//! The channel-agnostic client contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use proto::{ChannelError, ChannelResponse, ConfigurationError, Environment, Payload};
use reqwest::Url;

/// Settings snapshot merged at build time. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub channel: String,
    pub environment: Environment,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Connection-level custom headers; these win over standard headers.
    pub headers: Vec<(String, String)>,
    pub locale: String,
    pub currency: String,
    pub timezone: String,
    pub source_system: String,
}

/// Operations every channel adapter provides.
///
/// Runtime failures (transport errors, non-2xx statuses) come back as
/// `Ok` failure envelopes. `Err` means a setup defect such as an
/// unconfigured endpoint, detected before any request is sent.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Resolved settings for this client.
    fn config(&self) -> &ClientConfig;

    /// Base URL without trailing slash.
    fn base_url(&self) -> &str;

    /// Resolves a logical endpoint (`reservations`, `rates`, ...) to a URL.
    fn resolve_endpoint(&self, logical: &str) -> Result<Url, ConfigurationError>;

    /// Lightweight GET against the channel health endpoint.
    async fn test_connection(&self) -> Result<ChannelResponse, ChannelError>;

    /// GET reservations in `[start, end]`. `options` override the default
    /// query keys.
    async fn pull_reservations(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError>;

    /// POST availability. Body precedence: defaults < `payload` < `options`.
    async fn push_availability(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError>;

    /// POST rates. Body precedence: defaults < `payload` < `options`.
    async fn push_rates(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError>;

    /// Channel name.
    fn channel(&self) -> &str {
        &self.config().channel
    }
}

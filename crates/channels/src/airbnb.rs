//! Airbnb channel adapter.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use proto::{ChannelError, ChannelResponse, ConfigurationError, CredentialsError, Payload};
use reqwest::Url;
use tracing::info;

use crate::auth::AuthStrategy;
use crate::client::{ChannelClient, ClientConfig};
use crate::credentials::ResolvedCredentials;
use crate::http::ChannelHttp;
use crate::payload::{availability_defaults, layered, rate_defaults, reservation_defaults};

/// Registry key for this channel.
pub const CHANNEL: &str = "airbnb";

/// Credential fields that must resolve before a client is built.
pub const REQUIRED_CREDENTIALS: &[&str] = &["client_id", "client_secret"];

/// Airbnb uses HTTP Basic auth built from the client id and secret.
pub fn auth(credentials: &ResolvedCredentials) -> Result<AuthStrategy, CredentialsError> {
    Ok(AuthStrategy::basic(
        credentials.require("client_id")?,
        credentials.require("client_secret")?,
    ))
}

/// Airbnb client.
pub struct AirbnbClient {
    http: ChannelHttp,
}

impl AirbnbClient {
    pub fn new(http: ChannelHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChannelClient for AirbnbClient {
    fn config(&self) -> &ClientConfig {
        self.http.config()
    }

    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn resolve_endpoint(&self, logical: &str) -> Result<Url, ConfigurationError> {
        self.http.endpoint_url(logical)
    }

    async fn test_connection(&self) -> Result<ChannelResponse, ChannelError> {
        let resp = self
            .http
            .get("test_connection", &Payload::new(), "Airbnb connection successful")
            .await?;
        info!(success = resp.success, "Airbnb connection test finished");
        Ok(resp)
    }

    async fn pull_reservations(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = reservation_defaults(self.config(), start, end);
        let query = layered(&[&defaults, &options]);
        self.http
            .get("reservations", &query, "Airbnb reservations retrieved")
            .await
    }

    async fn push_availability(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = availability_defaults(self.config());
        let body = layered(&[&defaults, &payload, &options]);
        self.http
            .post("availability", &body, "Airbnb availability updated")
            .await
    }

    async fn push_rates(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = rate_defaults(self.config());
        let body = layered(&[&defaults, &payload, &options]);
        self.http.post("rates", &body, "Airbnb rates updated").await
    }
}

//! Expedia channel adapter (bearer token auth).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use proto::{ChannelError, ChannelResponse, ConfigurationError, CredentialsError, Payload};
use reqwest::Url;
use serde_json::Value;
use tracing::info;

use crate::auth::AuthStrategy;
use crate::client::{ChannelClient, ClientConfig};
use crate::credentials::ResolvedCredentials;
use crate::http::ChannelHttp;
use crate::payload::{availability_defaults, layered, rate_defaults, reservation_defaults};

pub const CHANNEL: &str = "expedia";

pub const REQUIRED_CREDENTIALS: &[&str] = &["access_token"];

pub fn auth(credentials: &ResolvedCredentials) -> Result<AuthStrategy, CredentialsError> {
    Ok(AuthStrategy::bearer(credentials.require("access_token")?))
}

/// Expedia client. A `property_id` setting scopes reservation pulls.
pub struct ExpediaClient {
    http: ChannelHttp,
    property_id: Option<String>,
}

impl ExpediaClient {
    pub fn new(http: ChannelHttp, property_id: Option<String>) -> Self {
        Self { http, property_id }
    }
}

#[async_trait]
impl ChannelClient for ExpediaClient {
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
            .get("test_connection", &Payload::new(), "Expedia connection successful")
            .await?;
        info!(success = resp.success, "Expedia connection test finished");
        Ok(resp)
    }

    async fn pull_reservations(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let mut defaults = reservation_defaults(self.config(), start, end);
        if let Some(property_id) = &self.property_id {
            defaults.insert("property_id".into(), Value::String(property_id.clone()));
        }
        let query = layered(&[&defaults, &options]);
        self.http
            .get("reservations", &query, "Expedia reservations retrieved")
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
            .post("availability", &body, "Expedia availability updated")
            .await
    }

    async fn push_rates(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = rate_defaults(self.config());
        let body = layered(&[&defaults, &payload, &options]);
        self.http.post("rates", &body, "Expedia rates updated").await
    }
}

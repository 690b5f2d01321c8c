//! Booking.com channel adapter.
//!
//! Requests are HMAC-signed. When the connection carries a `hotel_id`
//! setting it is added to every push body as the lowest-precedence default.

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

pub const CHANNEL: &str = "booking";

pub const REQUIRED_CREDENTIALS: &[&str] = &["api_key", "api_secret"];

pub fn auth(credentials: &ResolvedCredentials) -> Result<AuthStrategy, CredentialsError> {
    Ok(AuthStrategy::hmac(
        credentials.require("api_key")?,
        credentials.require("api_secret")?,
    ))
}

/// Booking.com client.
pub struct BookingClient {
    http: ChannelHttp,
    hotel_id: Option<String>,
}

impl BookingClient {
    pub fn new(http: ChannelHttp, hotel_id: Option<String>) -> Self {
        Self { http, hotel_id }
    }

    fn with_hotel(&self, mut defaults: Payload) -> Payload {
        if let Some(hotel_id) = &self.hotel_id {
            defaults.insert("hotel_id".into(), Value::String(hotel_id.clone()));
        }
        defaults
    }
}

#[async_trait]
impl ChannelClient for BookingClient {
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
            .get(
                "test_connection",
                &Payload::new(),
                "Booking.com connection successful",
            )
            .await?;
        info!(success = resp.success, "Booking.com connection test finished");
        Ok(resp)
    }

    async fn pull_reservations(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = self.with_hotel(reservation_defaults(self.config(), start, end));
        let query = layered(&[&defaults, &options]);
        self.http
            .get("reservations", &query, "Booking.com reservations retrieved")
            .await
    }

    async fn push_availability(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = self.with_hotel(availability_defaults(self.config()));
        let body = layered(&[&defaults, &payload, &options]);
        self.http
            .post("availability", &body, "Booking.com availability updated")
            .await
    }

    async fn push_rates(
        &self,
        payload: Payload,
        options: Payload,
    ) -> Result<ChannelResponse, ChannelError> {
        let defaults = self.with_hotel(rate_defaults(self.config()));
        let body = layered(&[&defaults, &payload, &options]);
        self.http
            .post("rates", &body, "Booking.com rates updated")
            .await
    }
}

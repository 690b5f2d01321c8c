//! Shared request plumbing used by every adapter.
//!
//! Adapters only decide the endpoint, payload shape and auth strategy; this
//! module does endpoint resolution, header shaping, transport failure
//! reporting and envelope conversion.

use std::sync::Arc;

use chrono::Utc;
use proto::{ChannelError, ChannelResponse, ConfigurationError, Payload, TransportError};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthStrategy;
use crate::client::ClientConfig;
use crate::payload::query_pairs;
use crate::registry::ChannelConfig;
use crate::reporter::{ErrorReporter, TransportIncident};
use crate::transport::{HttpTransport, Method, OutboundRequest, TransportResponse};

const BODY_PREVIEW_CHARS: usize = 500;

/// Immutable per-client invocation helper.
pub struct ChannelHttp {
    config: ClientConfig,
    base_url: String,
    auth: AuthStrategy,
    channel_config: Arc<ChannelConfig>,
    transport: Arc<dyn HttpTransport>,
    reporter: Arc<dyn ErrorReporter>,
}

impl ChannelHttp {
    pub fn new(
        config: ClientConfig,
        base_url: impl Into<String>,
        auth: AuthStrategy,
        channel_config: Arc<ChannelConfig>,
        transport: Arc<dyn HttpTransport>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            channel_config,
            transport,
            reporter,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthStrategy {
        &self.auth
    }

    /// `base_url` + configured path for `logical`.
    pub fn endpoint_url(&self, logical: &str) -> Result<Url, ConfigurationError> {
        let path = self.channel_config.endpoint(logical).ok_or_else(|| {
            ConfigurationError::UnconfiguredEndpoint {
                channel: self.config.channel.clone(),
                endpoint: logical.to_string(),
            }
        })?;
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ConfigurationError::InvalidValue {
            field: format!("{}.endpoints.{logical}", self.config.channel),
            reason: format!("'{joined}' is not a valid URL: {e}"),
        })
    }

    /// GET `logical` with `query` as the query string.
    pub async fn get(
        &self,
        logical: &str,
        query: &Payload,
        success_message: &str,
    ) -> Result<ChannelResponse, ChannelError> {
        let mut url = self.endpoint_url(logical)?;
        let pairs = query_pairs(query);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let request = self.build_request(Method::Get, url, None)?;
        Ok(self.dispatch(logical, request, success_message).await)
    }

    /// POST `body` as JSON to `logical`.
    pub async fn post(
        &self,
        logical: &str,
        body: &Payload,
        success_message: &str,
    ) -> Result<ChannelResponse, ChannelError> {
        let url = self.endpoint_url(logical)?;
        let body = serde_json::to_string(body).map_err(|e| ConfigurationError::InvalidValue {
            field: format!("{}.{logical}.body", self.config.channel),
            reason: e.to_string(),
        })?;
        let request = self.build_request(Method::Post, url, Some(body))?;
        Ok(self.dispatch(logical, request, success_message).await)
    }

    fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<OutboundRequest, ChannelError> {
        let mut request =
            OutboundRequest::new(method, url, self.config.timeout, self.config.connect_timeout);
        request.body = body;

        request.set_header("Accept", "application/json");
        request.set_header("Content-Type", "application/json");
        request.set_header("X-Channel-Environment", self.config.environment.as_str());
        request.set_header("X-Source-System", self.config.source_system.as_str());
        request.set_header("X-Request-Id", Uuid::new_v4().to_string());
        for (name, value) in &self.config.headers {
            request.set_header(name.as_str(), value.as_str());
        }

        self.auth
            .apply(&mut request, Utc::now().timestamp(), &self.config.channel)?;
        Ok(request)
    }

    async fn dispatch(
        &self,
        logical: &str,
        request: OutboundRequest,
        success_message: &str,
    ) -> ChannelResponse {
        let request_id = request.header("X-Request-Id").unwrap_or_default().to_string();
        debug!(
            channel = %self.config.channel,
            environment = %self.config.environment,
            endpoint = logical,
            method = request.method.as_str(),
            request_id = %request_id,
            "Sending channel request"
        );

        let response = match self.transport.send(request).await {
            Ok(response) => self.interpret(response, success_message),
            Err(err) => self.transport_failure(logical, &request_id, err),
        };
        response
            .with_meta("channel", self.config.channel.clone())
            .with_meta("environment", self.config.environment.as_str())
            .with_meta("request_id", request_id)
    }

    fn interpret(&self, response: TransportResponse, success_message: &str) -> ChannelResponse {
        let TransportResponse { status, body } = response;
        let parsed = parse_body(&body);

        if (200..300).contains(&status) {
            let data = match parsed {
                Some(value) => value,
                None if body.trim().is_empty() => Value::Null,
                None => Value::String(body),
            };
            return ChannelResponse::success(success_message, data).with_meta("status", status);
        }

        warn!(
            channel = %self.config.channel,
            status,
            "Channel returned non-success status"
        );
        let message = format!("{} returned HTTP {status}", self.config.channel);
        let envelope = ChannelResponse::failure(message).with_meta("status", status);
        match parsed {
            Some(value) => envelope.with_data(value),
            None if body.trim().is_empty() => envelope,
            None => envelope.with_meta("body", preview(&body)),
        }
    }

    fn transport_failure(
        &self,
        logical: &str,
        request_id: &str,
        error: TransportError,
    ) -> ChannelResponse {
        self.reporter.report(&TransportIncident {
            channel: self.config.channel.clone(),
            environment: self.config.environment,
            endpoint: logical.to_string(),
            request_id: request_id.to_string(),
            error: error.clone(),
        });
        ChannelResponse::failure(format!("{} request failed: {error}", self.config.channel))
            .with_meta("exception", error.to_string())
    }
}

fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    serde_json::from_str(body).ok()
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        CapturingReporter, SpyTransport, client_config, fixture_channel_config,
    };
    use serde_json::json;

    fn http(transport: Arc<SpyTransport>, reporter: Arc<CapturingReporter>) -> ChannelHttp {
        let mut config = client_config("airbnb");
        config.headers = vec![("x-source-system".into(), "pms-eu".into())];
        ChannelHttp::new(
            config,
            "https://api.example/v2/",
            AuthStrategy::bearer("tok"),
            Arc::new(fixture_channel_config("https://api.example/v2")),
            transport,
            reporter,
        )
    }

    #[test]
    fn endpoint_url_strips_trailing_slash() {
        let http = http(SpyTransport::ok(200, "{}"), CapturingReporter::new());
        assert_eq!(http.base_url(), "https://api.example/v2");
        assert_eq!(
            http.endpoint_url("reservations").unwrap().as_str(),
            "https://api.example/v2/reservations"
        );
    }

    #[tokio::test]
    async fn unconfigured_endpoint_fails_before_sending() {
        let spy = SpyTransport::ok(200, "{}");
        let http = http(spy.clone(), CapturingReporter::new());
        let err = http
            .get("room_inventory", &Payload::new(), "ok")
            .await
            .expect_err("unconfigured");
        assert!(matches!(
            err,
            ChannelError::Configuration(ConfigurationError::UnconfiguredEndpoint { .. })
        ));
        assert_eq!(spy.calls(), 0);
    }

    #[tokio::test]
    async fn custom_headers_win_and_auth_is_applied() {
        let spy = SpyTransport::ok(200, r#"{"status":"ok"}"#);
        let http = http(spy.clone(), CapturingReporter::new());
        let resp = http
            .get("test_connection", &Payload::new(), "Connection successful")
            .await
            .unwrap();

        assert!(resp.success);
        let sent = spy.last().expect("request recorded");
        assert_eq!(sent.header("Accept"), Some("application/json"));
        assert_eq!(sent.header("X-Source-System"), Some("pms-eu"));
        assert_eq!(sent.header("X-Channel-Environment"), Some("sandbox"));
        assert_eq!(sent.header("Authorization"), Some("Bearer tok"));
        assert_eq!(sent.timeout, http.config().timeout);
        assert_eq!(sent.connect_timeout, http.config().connect_timeout);
        assert_eq!(
            resp.meta["request_id"],
            json!(sent.header("X-Request-Id").unwrap())
        );
    }

    #[tokio::test]
    async fn non_json_error_body_is_previewed_in_meta() {
        let long_body = "x".repeat(BODY_PREVIEW_CHARS + 50);
        let http = http(SpyTransport::ok(502, &long_body), CapturingReporter::new());
        let resp = http.get("test_connection", &Payload::new(), "ok").await.unwrap();

        assert!(!resp.success);
        assert!(resp.message.contains("502"));
        assert_eq!(resp.data, json!({}));
        assert_eq!(
            resp.meta["body"].as_str().map(str::len),
            Some(BODY_PREVIEW_CHARS)
        );
    }

    #[tokio::test]
    async fn transport_errors_are_reported_and_enveloped() {
        let reporter = CapturingReporter::new();
        let spy = SpyTransport::failing(TransportError::Timeout("connect timed out".into()));
        let http = http(spy, reporter.clone());
        let resp = http
            .post("rates", &Payload::new(), "ok")
            .await
            .expect("no setup error");

        assert!(!resp.success);
        assert_eq!(resp.exception(), Some("Timed out: connect timed out"));
        let incidents = reporter.incidents();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].endpoint, "rates");
        assert_eq!(incidents[0].channel, "airbnb");
    }

    #[tokio::test]
    async fn plain_text_success_body_is_kept_as_string() {
        let http = http(SpyTransport::ok(200, "pong"), CapturingReporter::new());
        let resp = http.get("test_connection", &Payload::new(), "ok").await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.data, json!("pong"));
        assert_eq!(resp.status(), Some(200));
    }
}

//! Subcommand handlers.
//!
//! Each handler returns the JSON document to print and whether every channel
//! call in it succeeded. Setup errors for single-connection commands are
//! returned as `Err`; batch commands record them per connection instead.

use std::sync::Arc;

use channels::webhook::{WebhookError, verify_webhook_signature};
use channels::{
    ChannelClient, ChannelRegistry, ClientCache, ClientFactory, RetryPolicy, canonical_channel,
    retry_idempotent,
};
use chrono::{DateTime, FixedOffset};
use futures_util::future::join_all;
use proto::{ChannelConnection, ChannelError, ChannelResponse, Payload};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};
use tracing::{info, warn};

/// Printed document plus overall success.
#[derive(Debug)]
pub struct Outcome {
    pub output: Value,
    pub success: bool,
}

impl Outcome {
    fn from_response(response: &ChannelResponse) -> Self {
        Self {
            output: envelope_json(response),
            success: response.success,
        }
    }
}

fn envelope_json(response: &ChannelResponse) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

/// Which push operation a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Availability,
    Rates,
}

impl PushKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Availability => "push_availability",
            Self::Rates => "push_rates",
        }
    }
}

/// Shared state for one CLI invocation.
pub struct Runner {
    factory: ClientFactory,
    cache: ClientCache,
}

impl Runner {
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            cache: ClientCache::new(),
        }
    }

    fn client(&self, connection: &ChannelConnection) -> Result<Arc<dyn ChannelClient>, ChannelError> {
        self.cache.get_or_build(&self.factory, connection)
    }

    /// `testConnection`, retried while the failure is transient.
    pub async fn test(
        &self,
        connection: &ChannelConnection,
        policy: &RetryPolicy,
    ) -> Result<Outcome, ChannelError> {
        let client = self.client(connection)?;
        let response = retry_idempotent(policy, || client.test_connection()).await?;
        info!(
            connection = %connection.id,
            success = response.success,
            "Connection test finished"
        );
        Ok(Outcome::from_response(&response))
    }

    /// `pullReservations`, retried while the failure is transient.
    pub async fn pull(
        &self,
        connection: &ChannelConnection,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        options: &Payload,
        policy: &RetryPolicy,
    ) -> Result<Outcome, ChannelError> {
        if end < start {
            warn!(connection = %connection.id, "End date precedes start date");
        }
        let client = self.client(connection)?;
        let response =
            retry_idempotent(policy, || client.pull_reservations(start, end, options.clone()))
                .await?;
        Ok(Outcome::from_response(&response))
    }

    /// Runs one push against every connection concurrently. A failing
    /// connection does not stop the others. Pushes are never retried.
    pub async fn push(
        &self,
        kind: PushKind,
        connections: &[&ChannelConnection],
        payload: &Payload,
        options: &Payload,
    ) -> Outcome {
        let calls = connections.iter().map(|connection| async move {
            let result = match self.client(connection) {
                Ok(client) => match kind {
                    PushKind::Availability => {
                        client
                            .push_availability(payload.clone(), options.clone())
                            .await
                    }
                    PushKind::Rates => client.push_rates(payload.clone(), options.clone()).await,
                },
                Err(e) => Err(e),
            };
            (connection.id.clone(), result)
        });

        let mut success = true;
        let mut results = Vec::with_capacity(connections.len());
        for (id, result) in join_all(calls).await {
            match result {
                Ok(response) => {
                    success &= response.success;
                    results.push(json!({ "connection": id, "response": envelope_json(&response) }));
                }
                Err(e) => {
                    warn!(connection = %id, operation = kind.as_str(), "Setup failed: {e}");
                    success = false;
                    results.push(json!({ "connection": id, "error": e.to_string() }));
                }
            }
        }

        Outcome {
            output: json!({ "operation": kind.as_str(), "results": results }),
            success,
        }
    }
}

/// Configured channels with their environments, endpoints and advisory
/// rate limits.
pub fn list_channels(registry: &ChannelRegistry) -> Outcome {
    let channels: Vec<Value> = registry
        .channel_names()
        .into_iter()
        .filter_map(|name| {
            let config = registry.channel(name)?;
            Some(json!({
                "name": name,
                "environments": config.base_urls,
                "endpoints": config.endpoints,
                "rate_limits": config.rate_limits,
                "webhook_signature_header": config.signature_header(),
                "supported_locales": config.supported_locales,
                "supported_currencies": config.supported_currencies,
            }))
        })
        .collect();

    Outcome {
        output: json!({
            "defaults": registry.defaults(),
            "channels": channels,
        }),
        success: true,
    }
}

/// Verifies `signature` over `body` as if it arrived in the channel's
/// configured signature header.
pub fn verify_webhook(
    registry: &ChannelRegistry,
    channel: &str,
    secret: &str,
    signature: &str,
    body: &[u8],
) -> Outcome {
    let result = signature_headers(registry, channel, signature)
        .and_then(|headers| verify_webhook_signature(registry, channel, &headers, body, secret));

    match result {
        Ok(()) => Outcome {
            output: json!({ "channel": channel, "verified": true }),
            success: true,
        },
        Err(e) => Outcome {
            output: json!({ "channel": channel, "verified": false, "error": e.to_string() }),
            success: false,
        },
    }
}

fn signature_headers(
    registry: &ChannelRegistry,
    channel: &str,
    signature: &str,
) -> Result<HeaderMap, WebhookError> {
    let name = registry
        .get_str(canonical_channel(channel), "webhook.signature_header")
        .ok_or_else(|| WebhookError::Unconfigured(channel.to_string()))?;
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| WebhookError::Malformed(e.to_string()))?;
    let value =
        HeaderValue::from_str(signature).map_err(|e| WebhookError::Malformed(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use channels::webhook::sign_body;
    use channels::{ChannelConfig, CredentialStore, Defaults};

    fn registry() -> ChannelRegistry {
        let mut airbnb = ChannelConfig::default();
        airbnb
            .base_urls
            .insert("production".into(), "http://127.0.0.1:1".into());
        airbnb.endpoints.insert("rates".into(), "/rates".into());
        airbnb.endpoints.insert("test_connection".into(), "/ping".into());
        airbnb.rate_limits.requests_per_minute = Some(60);
        airbnb.webhook.signature_header = Some("X-Airbnb-Signature".into());
        ChannelRegistry::new(Defaults::default()).with_channel("airbnb", airbnb)
    }

    fn runner() -> Runner {
        Runner::new(ClientFactory::new(
            Arc::new(registry()),
            Arc::new(CredentialStore::from_vars([
                ("AIRBNB_CLIENT_ID", "id"),
                ("AIRBNB_CLIENT_SECRET", "secret"),
            ])),
        ))
    }

    #[test]
    fn lists_channels_with_rate_limits() {
        let outcome = list_channels(&registry());
        assert!(outcome.success);
        let airbnb = &outcome.output["channels"][0];
        assert_eq!(airbnb["name"], json!("airbnb"));
        assert_eq!(airbnb["rate_limits"]["requests_per_minute"], json!(60));
        assert_eq!(airbnb["webhook_signature_header"], json!("X-Airbnb-Signature"));
        assert_eq!(outcome.output["defaults"]["currency"], json!("USD"));
    }

    #[test]
    fn verifies_webhook_through_configured_header() {
        let body = br#"{"event":"reservation.created"}"#;
        let signature = sign_body("whsec", body).expect("sign");

        let ok = verify_webhook(&registry(), "airbnb", "whsec", &signature, body);
        assert!(ok.success);
        assert_eq!(ok.output["verified"], json!(true));

        let bad = verify_webhook(&registry(), "airbnb", "other", &signature, body);
        assert!(!bad.success);
        assert_eq!(bad.output["verified"], json!(false));

        let unconfigured = verify_webhook(&registry(), "expedia", "whsec", &signature, body);
        assert!(!unconfigured.success);
    }

    #[tokio::test]
    async fn batch_push_records_setup_errors_and_failures_per_connection() {
        let runner = runner();
        let airbnb = ChannelConnection::new("rosa-airbnb", "airbnb");
        let vrbo = ChannelConnection::new("rosa-vrbo", "vrbo");
        let mut payload = Payload::new();
        payload.insert("rate".into(), json!(120));

        let outcome = runner
            .push(PushKind::Rates, &[&airbnb, &vrbo], &payload, &Payload::new())
            .await;

        assert!(!outcome.success);
        let results = outcome.output["results"].as_array().expect("results");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["connection"], json!("rosa-airbnb"));
        assert_eq!(results[0]["response"]["success"], json!(false));
        assert!(results[0]["response"]["meta"]["exception"].is_string());
        assert_eq!(results[1]["connection"], json!("rosa-vrbo"));
        assert!(results[1]["error"].as_str().unwrap_or_default().contains("vrbo"));
    }

    #[tokio::test]
    async fn test_command_returns_setup_error_for_missing_credentials() {
        let runner = Runner::new(ClientFactory::new(
            Arc::new(registry()),
            Arc::new(CredentialStore::default()),
        ));
        let conn = ChannelConnection::new("rosa-airbnb", "airbnb");
        let result = runner.test(&conn, &RetryPolicy::none()).await;
        assert!(matches!(result, Err(ChannelError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_command_reports_attempts() {
        let runner = runner();
        let conn = ChannelConnection::new("rosa-airbnb", "airbnb");
        let outcome = runner
            .test(&conn, &RetryPolicy::none())
            .await
            .expect("no setup error");
        assert!(!outcome.success);
        assert_eq!(outcome.output["meta"]["attempts"], json!(1));
    }
}

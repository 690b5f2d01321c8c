use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use proto::{Environment, TransportError};

use crate::client::ClientConfig;
use crate::registry::{ChannelConfig, ChannelRegistry, Defaults};
use crate::reporter::{ErrorReporter, TransportIncident};
use crate::transport::{HttpTransport, OutboundRequest, TransportResponse};

/// Transport that records every request and replays one canned outcome.
pub(crate) struct SpyTransport {
    outcome: Result<TransportResponse, TransportError>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl SpyTransport {
    pub(crate) fn ok(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            outcome: Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn failing(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Err(error),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Option<OutboundRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// JSON body of the last request.
    pub(crate) fn last_body(&self) -> serde_json::Value {
        let body = self.last().and_then(|r| r.body).unwrap_or_default();
        serde_json::from_str(&body).unwrap()
    }

    /// Query pairs of the last request.
    pub(crate) fn last_query(&self) -> Vec<(String, String)> {
        self.last()
            .map(|r| {
                r.url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpTransport for SpyTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.outcome.clone()
    }
}

/// Reporter that keeps every incident for assertions.
#[derive(Default)]
pub(crate) struct CapturingReporter {
    incidents: Mutex<Vec<TransportIncident>>,
}

impl CapturingReporter {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn incidents(&self) -> Vec<TransportIncident> {
        self.incidents.lock().unwrap().clone()
    }
}

impl ErrorReporter for CapturingReporter {
    fn report(&self, incident: &TransportIncident) {
        self.incidents.lock().unwrap().push(incident.clone());
    }
}

pub(crate) fn client_config(channel: &str) -> ClientConfig {
    ClientConfig {
        channel: channel.to_string(),
        environment: Environment::Sandbox,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        headers: Vec::new(),
        locale: "en-GB".to_string(),
        currency: "GBP".to_string(),
        timezone: "Europe/London".to_string(),
        source_system: "channel-sync".to_string(),
    }
}

/// Channel config with every contract endpoint except `room_inventory`.
pub(crate) fn fixture_channel_config(base_url: &str) -> ChannelConfig {
    let mut config = ChannelConfig::default();
    config
        .base_urls
        .insert("sandbox".to_string(), base_url.to_string());
    config
        .base_urls
        .insert("production".to_string(), base_url.to_string());
    for (name, path) in [
        ("test_connection", "/ping"),
        ("reservations", "/reservations"),
        ("availability", "/availability"),
        ("rates", "/rates"),
    ] {
        config.endpoints.insert(name.to_string(), path.to_string());
    }
    config.webhook.signature_header = Some("X-Signature".to_string());
    config
}

/// Registry with airbnb, booking and expedia all pointing at `base_url`.
pub(crate) fn fixture_registry(base_url: &str) -> ChannelRegistry {
    let defaults = Defaults {
        locale: "en-GB".to_string(),
        currency: "GBP".to_string(),
        timezone: "Europe/London".to_string(),
        ..Defaults::default()
    };
    ChannelRegistry::new(defaults)
        .with_channel("airbnb", fixture_channel_config(base_url))
        .with_channel("booking", fixture_channel_config(base_url))
        .with_channel("expedia", fixture_channel_config(base_url))
}

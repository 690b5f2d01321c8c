//! HTTP transport seam between adapters and the network.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use proto::TransportError;
use reqwest::Url;
use tracing::debug;

/// HTTP verbs used by the channel contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A fully shaped request, auth already applied.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body for POST requests.
    pub body: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl OutboundRequest {
    /// Creates a request with no headers or body.
    pub fn new(method: Method, url: Url, timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout,
            connect_timeout,
        }
    }

    /// Sets a header, replacing any existing value case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path plus query string, as signed by HMAC auth.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{q}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }
}

/// Raw response as seen by the invocation helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and returns the raw response.
///
/// Implementations must map every network-level failure into
/// [`TransportError`] and never panic.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// Production transport backed by `reqwest`.
///
/// reqwest fixes the connect timeout per client, so one client is kept per
/// distinct connect timeout; the request timeout is applied per request.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: DashMap<Duration, reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&self, connect_timeout: Duration) -> Result<reqwest::Client, TransportError> {
        if let Some(client) = self.clients.get(&connect_timeout) {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(describe(&e)))?;
        self.clients.insert(connect_timeout, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(request.connect_timeout)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = client
            .request(method, request.url.clone())
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        debug!(status, url = %request.url, "Channel response received");
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(describe(&e)))?;
        Ok(TransportResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    let text = describe(&err);
    if err.is_timeout() {
        TransportError::Timeout(text)
    } else if err.is_connect() {
        TransportError::Connect(text)
    } else {
        TransportError::Request(text)
    }
}

/// Flattens the error source chain; reqwest's top-level message alone hides
/// the DNS/TLS/IO cause.
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

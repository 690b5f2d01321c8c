//! Observability sink for transport failures.

use proto::{Environment, TransportError};
use tracing::error;

/// One transport failure, captured before it is folded into an envelope.
#[derive(Debug, Clone)]
pub struct TransportIncident {
    pub channel: String,
    pub environment: Environment,
    /// Logical endpoint name (`reservations`, `rates`, ...).
    pub endpoint: String,
    pub request_id: String,
    pub error: TransportError,
}

/// Sink for transport incidents. The host application provides the
/// concrete error tracker; [`TracingReporter`] is the default.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, incident: &TransportIncident);
}

/// Emits incidents as `tracing` error events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, incident: &TransportIncident) {
        error!(
            channel = %incident.channel,
            environment = %incident.environment,
            endpoint = %incident.endpoint,
            request_id = %incident.request_id,
            "Channel transport failure: {}",
            incident.error
        );
    }
}

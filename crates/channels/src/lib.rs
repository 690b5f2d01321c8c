//! Channel integration layer: registry, client contract and per-channel
//! adapters over heterogeneous booking-channel APIs.

pub mod airbnb;
pub mod auth;
pub mod booking;
pub mod cache;
pub mod client;
pub mod credentials;
pub mod expedia;
pub mod factory;
pub mod http;
pub mod payload;
pub mod registry;
pub mod reporter;
pub mod retry;
pub mod transport;
pub mod webhook;

#[cfg(test)]
mod test_support;

/// Airbnb adapter implementation.
pub use airbnb::AirbnbClient;
/// Authentication scheme applied by adapters.
pub use auth::AuthStrategy;
/// Booking.com adapter implementation.
pub use booking::BookingClient;
/// Per-connection client cache.
pub use cache::ClientCache;
/// Contract implemented by all channel adapters.
pub use client::{ChannelClient, ClientConfig};
/// Process-level credential fallbacks.
pub use credentials::CredentialStore;
/// Expedia adapter implementation.
pub use expedia::ExpediaClient;
/// Client construction from connections.
pub use factory::{AdapterKind, ClientFactory, canonical_channel};
/// Static per-channel configuration.
pub use registry::{ChannelConfig, ChannelRegistry, Defaults, RateLimits};
/// Observability sink for transport failures.
pub use reporter::{ErrorReporter, TracingReporter, TransportIncident};
/// Caller-level retry for idempotent operations.
pub use retry::{RetryPolicy, retry_idempotent};
/// HTTP transport seam.
pub use transport::{HttpTransport, OutboundRequest, ReqwestTransport, TransportResponse};

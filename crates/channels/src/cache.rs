//! Per-connection client cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use proto::{ChannelConnection, ChannelError};
use tracing::debug;

use crate::client::ChannelClient;
use crate::factory::ClientFactory;

struct CachedClient {
    /// `updated_at` of the connection the client was built from.
    stamp: Option<DateTime<Utc>>,
    client: Arc<dyn ChannelClient>,
}

/// Caches built clients by connection id.
///
/// An entry is rebuilt when the connection's `updated_at` changes, and can be
/// dropped explicitly after an out-of-band credential rotation.
#[derive(Default)]
pub struct ClientCache {
    clients: DashMap<String, CachedClient>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached client for `connection` or builds and caches one.
    pub fn get_or_build(
        &self,
        factory: &ClientFactory,
        connection: &ChannelConnection,
    ) -> Result<Arc<dyn ChannelClient>, ChannelError> {
        if let Some(entry) = self.clients.get(&connection.id)
            && entry.stamp == connection.updated_at
        {
            return Ok(entry.client.clone());
        }

        let client = factory.build_client(connection)?;
        debug!(connection = %connection.id, channel = %connection.channel, "Caching channel client");
        self.clients.insert(
            connection.id.clone(),
            CachedClient {
                stamp: connection.updated_at,
                client: client.clone(),
            },
        );
        Ok(client)
    }

    /// Drops the client for `connection_id`. Returns whether one was cached.
    pub fn invalidate(&self, connection_id: &str) -> bool {
        self.clients.remove(connection_id).is_some()
    }

    pub fn clear(&self) {
        self.clients.clear();
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::test_support::{SpyTransport, fixture_registry};
    use chrono::TimeZone;

    fn factory() -> ClientFactory {
        ClientFactory::new(
            Arc::new(fixture_registry("https://channel.example")),
            Arc::new(CredentialStore::from_vars([("EXPEDIA_ACCESS_TOKEN", "tok")])),
        )
        .with_transport(SpyTransport::ok(200, "{}"))
    }

    #[test]
    fn reuses_client_until_invalidated() {
        let cache = ClientCache::new();
        let factory = factory();
        let conn = ChannelConnection::new("c1", "expedia");

        let first = cache.get_or_build(&factory, &conn).expect("build");
        let second = cache.get_or_build(&factory, &conn).expect("cached");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        assert!(cache.invalidate("c1"));
        assert!(!cache.invalidate("c1"));
        let third = cache.get_or_build(&factory, &conn).expect("rebuild");
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn rebuilds_when_connection_was_updated() {
        let cache = ClientCache::new();
        let factory = factory();
        let mut conn = ChannelConnection::new("c1", "expedia");
        let first = cache.get_or_build(&factory, &conn).expect("build");

        conn.updated_at = Some(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap());
        conn.currency = Some("EUR".to_string());
        let second = cache.get_or_build(&factory, &conn).expect("rebuild");
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().currency, "EUR");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn build_errors_are_not_cached() {
        let cache = ClientCache::new();
        let conn = ChannelConnection::new("c2", "airbnb");
        assert!(cache.get_or_build(&factory(), &conn).is_err());
        assert!(cache.is_empty());
    }
}

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::discovery::{scoring, DiscoveryProvider};
use crate::models::search::SearchRequest;
use crate::models::server::{Server, ServerStatus};

pub const MEMORY_PROVIDER_NAME: &str = "memory";

/// In-memory registration table
///
/// Backs the router's explicit `register`/`unregister` operations. Entries
/// are keyed by lowercased server name; writes replace or remove a whole
/// entry at once, so readers never see a half-written server.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    servers: DashMap<String, Server>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a server, stamping it as freshly registered.
    pub fn register(&self, mut server: Server) -> Server {
        server.provider = MEMORY_PROVIDER_NAME.to_string();
        server.status = ServerStatus::Registered;
        server.last_update_time = Utc::now();

        tracing::info!(server = %server.name, endpoint = %server.endpoint, "Registered server");
        self.servers.insert(server.key(), server.clone());
        server
    }

    /// Removes a server immediately. Returns false if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.servers.remove(&name.to_lowercase()).is_some();
        if removed {
            tracing::info!(server = %name, "Unregistered server");
        } else {
            tracing::warn!(server = %name, "Attempted to unregister unknown server");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Server> {
        self.servers
            .get(&name.to_lowercase())
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    fn snapshot(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self
            .servers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }
}

#[async_trait]
impl DiscoveryProvider for MemoryProvider {
    async fn search(&self, request: &SearchRequest) -> Vec<Server> {
        scoring::rank(self.snapshot(), request)
    }

    fn provider_name(&self) -> String {
        MEMORY_PROVIDER_NAME.to_string()
    }
}

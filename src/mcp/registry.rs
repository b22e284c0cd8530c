//! Aggregated server registry
//!
//! Fans out to every configured [`DiscoveryProvider`] concurrently and merges
//! what they report. The merged view lives in a `DashMap` keyed by lowercased
//! server name, so concurrent readers never see a half-written entry.

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::{DiscoveryProvider, MemoryProvider};
use crate::error::{Result, RouterError};
use crate::models::search::SearchRequest;
use crate::models::server::Server;

/// Registry of backend servers across all discovery providers
///
/// The local [`MemoryProvider`] is always first in provider order, so
/// explicit registrations take precedence in `get_by_name`/`find_by_tool`.
pub struct ServerRegistry {
    local: Arc<MemoryProvider>,
    providers: Vec<Arc<dyn DiscoveryProvider>>,
    provider_timeout: Duration,
    view: DashMap<String, Server>,
}

pub type SharedRegistry = Arc<ServerRegistry>;

impl ServerRegistry {
    /// Creates a registry holding only the local in-memory provider
    pub fn new(provider_timeout: Duration) -> Self {
        let local = Arc::new(MemoryProvider::new());
        Self {
            providers: vec![local.clone() as Arc<dyn DiscoveryProvider>],
            local,
            provider_timeout,
            view: DashMap::new(),
        }
    }

    /// Appends a provider; providers are consulted in the order added
    pub fn with_provider(mut self, provider: Arc<dyn DiscoveryProvider>) -> Self {
        tracing::info!(provider = %provider.provider_name(), "Added discovery provider");
        self.providers.push(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.provider_name()).collect()
    }

    /// Queries every provider concurrently, in registration order
    ///
    /// A provider that exceeds `provider_timeout` contributes nothing. Its
    /// branch is dropped, the others are unaffected.
    async fn poll(&self, request: &SearchRequest) -> Vec<Vec<Server>> {
        let branches = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            async move {
                let name = provider.provider_name();
                match tokio::time::timeout(self.provider_timeout, provider.search(request)).await {
                    Ok(servers) => {
                        tracing::debug!(provider = %name, count = servers.len(), "Provider answered");
                        servers
                    }
                    Err(_) => {
                        tracing::warn!(
                            provider = %name,
                            timeout_ms = self.provider_timeout.as_millis() as u64,
                            "Provider search timed out"
                        );
                        Vec::new()
                    }
                }
            }
        });

        join_all(branches).await
    }

    /// Lists every known server, one entry per name
    ///
    /// When several providers report the same name the most recently updated
    /// record wins; on a tie the earlier provider wins. Refreshes the merged
    /// view as a side effect.
    pub async fn list_all(&self) -> Vec<Server> {
        let merged = merge_latest(self.poll(&SearchRequest::all()).await);

        let keys: Vec<String> = merged.iter().map(Server::key).collect();
        for server in &merged {
            self.view.insert(server.key(), server.clone());
        }
        self.view.retain(|key, _| keys.contains(key));

        merged
    }

    /// Ranked search across providers
    ///
    /// Duplicate names keep their highest-scoring record. The combined list
    /// is re-sorted and truncated to the request's limit.
    pub async fn search(&self, request: &SearchRequest) -> Vec<Server> {
        let mut best: Vec<Server> = Vec::new();
        for server in self.poll(request).await.into_iter().flatten() {
            match best.iter_mut().find(|s| s.has_name(&server.name)) {
                Some(existing) if server.relevance_score > existing.relevance_score => {
                    *existing = server
                }
                Some(_) => {}
                None => best.push(server),
            }
        }

        if request.is_empty() {
            return best;
        }
        crate::discovery::scoring::filter_and_sort(best, request)
    }

    /// First server named `name` (case-insensitive) in provider order
    pub async fn get_by_name(&self, name: &str) -> Option<Server> {
        self.poll(&SearchRequest::all())
            .await
            .into_iter()
            .flatten()
            .find(|server| server.has_name(name))
    }

    /// First server declaring `tool_name` (case-insensitive) in provider order
    pub async fn find_by_tool(&self, tool_name: &str) -> Option<Server> {
        self.poll(&SearchRequest::all())
            .await
            .into_iter()
            .flatten()
            .find(|server| server.offers_tool(tool_name))
    }

    /// Registers a server with the local provider
    ///
    /// # Returns
    ///
    /// * `Ok(Server)` - the stored record
    /// * `Err(RouterError::Validation)` - blank name or unusable endpoint
    pub fn register(&self, server: Server) -> Result<Server> {
        if server.name.trim().is_empty() {
            return Err(RouterError::Validation("server name is required".to_string()));
        }
        if !server.has_usable_endpoint() {
            return Err(RouterError::Validation(format!(
                "server {} has no usable endpoint",
                server.name
            )));
        }

        let stored = self.local.register(server);
        self.view.insert(stored.key(), stored.clone());
        Ok(stored)
    }

    /// Removes a locally registered server; false if it was not registered
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.local.unregister(name);
        if removed {
            self.view.remove(&name.to_lowercase());
        }
        removed
    }

    /// Merged view as of the last `list_all` or registration
    pub fn cached(&self) -> Vec<Server> {
        let mut servers: Vec<Server> = self.view.iter().map(|e| e.value().clone()).collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        servers
    }
}

/// Flattens provider results, keeping the newest record per name
fn merge_latest(results: Vec<Vec<Server>>) -> Vec<Server> {
    let mut merged: Vec<Server> = Vec::new();
    for server in results.into_iter().flatten() {
        match merged.iter_mut().find(|s| s.has_name(&server.name)) {
            Some(existing) if server.last_update_time > existing.last_update_time => {
                *existing = server
            }
            Some(_) => {}
            None => merged.push(server),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::MockDiscoveryProvider;
    use crate::models::server::TransportType;
    use crate::models::tool::Tool;
    use chrono::{TimeZone, Utc};

    fn server(name: &str, tools: &[&str]) -> Server {
        Server::new(name, "localhost:9000", TransportType::Synchronous)
            .with_tools(tools.iter().map(|t| Tool::new(*t, "")).collect())
    }

    fn provider_returning(name: &'static str, servers: Vec<Server>) -> Arc<dyn DiscoveryProvider> {
        let mut mock = MockDiscoveryProvider::new();
        mock.expect_provider_name().return_const(name.to_string());
        mock.expect_search().returning(move |_| {
            let servers = servers.clone();
            Box::pin(async move { servers })
        });
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_failing_provider_contributes_nothing() {
        let registry = ServerRegistry::new(Duration::from_secs(1))
            .with_provider(provider_returning("a", vec![server("s1", &["t1"])]))
            .with_provider(provider_returning("b", vec![]));

        let servers = registry.list_all().await;

        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "s1");
        assert_eq!(registry.find_by_tool("T1").await.unwrap().name, "s1");
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        struct Stalled;

        #[async_trait::async_trait]
        impl DiscoveryProvider for Stalled {
            async fn search(&self, _request: &SearchRequest) -> Vec<Server> {
                futures::future::pending().await
            }

            fn provider_name(&self) -> String {
                "stalled".to_string()
            }
        }

        let registry = ServerRegistry::new(Duration::from_millis(50))
            .with_provider(Arc::new(Stalled))
            .with_provider(provider_returning("a", vec![server("s1", &[])]));

        let servers = registry.list_all().await;
        assert_eq!(servers.len(), 1);
    }

    #[tokio::test]
    async fn test_newest_duplicate_wins_in_list_all() {
        let mut old = server("dup", &["old"]);
        old.last_update_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut new = server("DUP", &["new"]);
        new.last_update_time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let registry = ServerRegistry::new(Duration::from_secs(1))
            .with_provider(provider_returning("a", vec![old]))
            .with_provider(provider_returning("b", vec![new]));

        let servers = registry.list_all().await;

        assert_eq!(servers.len(), 1);
        assert!(servers[0].offers_tool("new"));
        // lookups keep provider order
        assert!(registry.get_by_name("dup").await.unwrap().offers_tool("old"));
    }

    #[tokio::test]
    async fn test_local_registration_takes_precedence() {
        let registry = ServerRegistry::new(Duration::from_secs(1))
            .with_provider(provider_returning("a", vec![server("s1", &["remote"])]));

        registry.register(server("s1", &["local"])).unwrap();

        let found = registry.get_by_name("S1").await.unwrap();
        assert!(found.offers_tool("local"));
        assert_eq!(registry.cached().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_descriptor() {
        let registry = ServerRegistry::new(Duration::from_secs(1));

        let err = registry
            .register(Server::new("s1", "", TransportType::Synchronous))
            .unwrap_err();
        assert!(matches!(err, RouterError::Validation(_)));

        let err = registry
            .register(Server::new(" ", "localhost:1", TransportType::Synchronous))
            .unwrap_err();
        assert!(matches!(err, RouterError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unregister_removes_from_view() {
        let registry = ServerRegistry::new(Duration::from_secs(1));
        registry.register(server("s1", &[])).unwrap();

        assert!(registry.unregister("s1"));
        assert!(registry.cached().is_empty());
        assert!(registry.get_by_name("s1").await.is_none());
        assert!(!registry.unregister("s1"));
    }

    #[tokio::test]
    async fn test_search_keeps_best_score_per_name() {
        let mut low = server("s1", &[]);
        low.relevance_score = 0.2;
        let mut high = server("s1", &[]);
        high.relevance_score = 0.9;

        let registry = ServerRegistry::new(Duration::from_secs(1))
            .with_provider(provider_returning("a", vec![low]))
            .with_provider(provider_returning("b", vec![high]));

        let results = registry
            .search(&SearchRequest::for_task("anything"))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].relevance_score, 0.9);
    }
}

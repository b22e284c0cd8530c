use serde_json::Value;
use std::sync::Arc;

use crate::config::RouterConfig;
use crate::discovery::naming_provider::NamingConfig;
use crate::discovery::{CatalogProvider, NamingProvider};
use crate::error::Result;
use crate::mcp::bridge::{ProtocolBridge, Transport};
use crate::mcp::dispatcher::ToolDispatcher;
use crate::mcp::registry::{ServerRegistry, SharedRegistry};
use crate::models::health::{BatchHealthRecord, CheckedCall, HealthRecord, RegistrationCheck};
use crate::models::search::SearchRequest;
use crate::models::server::Server;
use crate::models::tool::ServerTool;
use crate::services::health_service::HealthService;
use crate::services::retry_policy::RetryPolicy;

/// Router-facing API consumed by the HTTP surface and the CLI
pub struct RouterService {
    registry: SharedRegistry,
    dispatcher: Arc<ToolDispatcher>,
    health: HealthService,
}

impl RouterService {
    pub fn new(registry: SharedRegistry, transport: Arc<dyn Transport>, config: &RouterConfig) -> Self {
        let dispatcher = Arc::new(ToolDispatcher::new(
            registry.clone(),
            transport,
            RetryPolicy::from_settings(&config.retry),
        ));
        let health = HealthService::new(
            dispatcher.clone(),
            config.paths.health.clone(),
            config.health_timeout,
        );

        Self {
            registry,
            dispatcher,
            health,
        }
    }

    /// Wires providers and transports from configuration
    ///
    /// The local registration table is always present; the naming and
    /// catalog providers are added only when their addresses are set.
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut registry = ServerRegistry::new(config.provider_timeout);

        if let Some(addr) = &config.naming_server_addr {
            let naming = NamingConfig {
                server_addr: addr.clone(),
                group: config.naming_group.clone(),
                services: config.naming_services.clone(),
                timeout: config.provider_timeout,
            };
            registry = registry.with_provider(Arc::new(NamingProvider::new(naming)));
        }

        if let Some(url) = &config.catalog_api_url {
            registry = registry.with_provider(Arc::new(CatalogProvider::new(
                url.clone(),
                config.provider_timeout,
            )));
        }

        Self::new(
            Arc::new(registry),
            Arc::new(ProtocolBridge::from_config(config)),
            config,
        )
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub async fn list_servers(&self) -> Vec<Server> {
        self.registry.list_all().await
    }

    pub async fn search(&self, request: &SearchRequest) -> Vec<Server> {
        self.registry.search(request).await
    }

    pub fn register(&self, server: Server) -> Result<Server> {
        self.registry.register(server)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.registry.unregister(name)
    }

    pub async fn invoke(
        &self,
        server_name: Option<&str>,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value> {
        self.dispatcher.invoke(tool_name, arguments, server_name).await
    }

    pub async fn list_tools(&self, server_name: Option<&str>) -> Result<Vec<ServerTool>> {
        self.dispatcher.list_tools(server_name).await
    }

    pub async fn check_health(&self, tool_name: &str) -> HealthRecord {
        self.health.check_tool_health(tool_name).await
    }

    pub async fn check_all_health(&self) -> BatchHealthRecord {
        self.health.check_all_tools_health().await
    }

    pub async fn verify_registration(&self, tool_name: &str) -> RegistrationCheck {
        self.health.verify_registration(tool_name).await
    }

    pub async fn call_with_health_check(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> CheckedCall {
        self.health
            .call_with_health_check(server_name, tool_name, arguments)
            .await
    }
}

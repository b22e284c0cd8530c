//! Discovery through a naming/service registry
//!
//! Tool servers publish themselves as service instances in a registry group.
//! Instance metadata carries the server's description, version, transport
//! and (optionally) a JSON array of tools. When the metadata has no tools,
//! they are read from the config entry `tools.<server>` in group `MCP_TOOLS`.
//!
//! Endpoints used (registry open HTTP API):
//!
//! - `GET /nacos/v1/ns/service/list?pageNo=N&pageSize=100&groupName=..` (paged)
//! - `GET /nacos/v1/ns/instance/list?serviceName=..&groupName=..`
//! - `GET /nacos/v1/cs/configs?dataId=tools.<server>&group=MCP_TOOLS`

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::discovery::{scoring, DiscoveryProvider};
use crate::models::search::SearchRequest;
use crate::models::server::{Server, ServerStatus, TransportType};
use crate::models::tool::Tool;

pub const NAMING_PROVIDER_NAME: &str = "naming";
pub const DEFAULT_GROUP: &str = "MCP_SERVER_GROUP";
pub const TOOLS_CONFIG_GROUP: &str = "MCP_TOOLS";

const SERVICE_PAGE_SIZE: u32 = 100;
const MAX_SERVICE_PAGES: u32 = 50;

#[derive(Debug, thiserror::Error)]
enum NamingError {
    #[error("Registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Registry returned {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Base URL of the registry, e.g. `http://127.0.0.1:8848`
    pub server_addr: String,
    pub group: String,
    /// Services to query; empty means every service in the group
    pub services: Vec<String>,
    pub timeout: Duration,
}

impl NamingConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            group: DEFAULT_GROUP.to_string(),
            services: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }
}

#[derive(Debug, Deserialize)]
struct ServiceList {
    #[serde(default)]
    count: usize,
    #[serde(default)]
    doms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct InstanceList {
    #[serde(default)]
    hosts: Vec<Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instance {
    ip: String,
    port: u16,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_true")]
    healthy: bool,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

pub struct NamingProvider {
    client: reqwest::Client,
    config: NamingConfig,
}

impl NamingProvider {
    pub fn new(config: NamingConfig) -> Self {
        let client = match reqwest::Client::builder().timeout(config.timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(provider = NAMING_PROVIDER_NAME, error = %e, "Falling back to a client without timeout");
                reqwest::Client::new()
            }
        };

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_addr.trim_end_matches('/'), path)
    }

    async fn service_names(&self) -> Result<Vec<String>, NamingError> {
        if !self.config.services.is_empty() {
            return Ok(self.config.services.clone());
        }

        let mut names = Vec::new();
        let mut page_no: u32 = 1;
        loop {
            let page = self.service_page(page_no).await?;
            let fetched = page.doms.len();
            names.extend(page.doms);

            if fetched == 0 || fetched < SERVICE_PAGE_SIZE as usize || names.len() >= page.count {
                break;
            }
            if page_no >= MAX_SERVICE_PAGES {
                tracing::warn!(
                    provider = NAMING_PROVIDER_NAME,
                    listed = names.len(),
                    total = page.count,
                    "Service list truncated"
                );
                break;
            }
            page_no += 1;
        }

        Ok(names)
    }

    async fn service_page(&self, page_no: u32) -> Result<ServiceList, NamingError> {
        let page_no = page_no.to_string();
        let page_size = SERVICE_PAGE_SIZE.to_string();
        let response = self
            .client
            .get(self.url("/nacos/v1/ns/service/list"))
            .query(&[
                ("pageNo", page_no.as_str()),
                ("pageSize", page_size.as_str()),
                ("groupName", self.config.group.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NamingError::Status(response.status()));
        }

        Ok(response.json::<ServiceList>().await?)
    }

    async fn instances(&self, service: &str) -> Result<Vec<Instance>, NamingError> {
        let response = self
            .client
            .get(self.url("/nacos/v1/ns/instance/list"))
            .query(&[
                ("serviceName", service),
                ("groupName", self.config.group.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NamingError::Status(response.status()));
        }

        Ok(response.json::<InstanceList>().await?.hosts)
    }

    /// Reads the published tool list for a server; absent or malformed → empty.
    async fn published_tools(&self, server_name: &str) -> Vec<Tool> {
        let data_id = format!("tools.{}", server_name);
        let response = self
            .client
            .get(self.url("/nacos/v1/cs/configs"))
            .query(&[("dataId", data_id.as_str()), ("group", TOOLS_CONFIG_GROUP)])
            .send()
            .await;

        let body = match response {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            Ok(resp) => {
                tracing::debug!(server = %server_name, status = %resp.status(), "No tools config published");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(server = %server_name, error = %e, "Failed to load tools config");
                return Vec::new();
            }
        };

        parse_tools(server_name, &body)
    }

    async fn load_service(&self, service: &str) -> Option<Server> {
        let instances = match self.instances(service).await {
            Ok(instances) => instances,
            Err(e) => {
                tracing::warn!(provider = NAMING_PROVIDER_NAME, service = %service, error = %e, "Failed to list instances");
                return None;
            }
        };

        let instance = instances
            .iter()
            .find(|i| i.enabled && i.healthy)
            .or_else(|| instances.first())?;

        let mut server = to_server(service, instance)?;
        if server.tools.is_empty() {
            server.tools = self.published_tools(&server.name).await;
        }
        Some(server)
    }

    async fn try_search(&self, request: &SearchRequest) -> Result<Vec<Server>, NamingError> {
        let services = self.service_names().await?;
        tracing::debug!(provider = NAMING_PROVIDER_NAME, count = services.len(), "Querying registry services");

        let loaded = join_all(services.iter().map(|service| self.load_service(service))).await;
        let servers: Vec<Server> = loaded.into_iter().flatten().collect();

        Ok(scoring::rank(servers, request))
    }
}

#[async_trait]
impl DiscoveryProvider for NamingProvider {
    async fn search(&self, request: &SearchRequest) -> Vec<Server> {
        match self.try_search(request).await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(provider = NAMING_PROVIDER_NAME, error = %e, "Registry search failed");
                Vec::new()
            }
        }
    }

    fn provider_name(&self) -> String {
        NAMING_PROVIDER_NAME.to_string()
    }
}

/// Registries prefix service names with their group (`GROUP@@name`).
fn strip_group(service: &str) -> &str {
    service.rsplit("@@").next().unwrap_or(service)
}

fn to_server(service: &str, instance: &Instance) -> Option<Server> {
    let metadata = &instance.metadata;
    let name = metadata
        .get("serverName")
        .or_else(|| metadata.get("name"))
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| strip_group(service).to_string());

    let transport_label = metadata
        .get("transportType")
        .map(String::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("sse");

    let Some(transport_type) = TransportType::parse(transport_label) else {
        tracing::warn!(server = %name, transport = %transport_label, "Skipping instance with unsupported transport");
        return None;
    };

    let context_path = metadata
        .get("context-path")
        .map(|p| p.trim_end_matches('/'))
        .unwrap_or("");

    let tools = metadata
        .get("tools")
        .map(|json| parse_tools(&name, json))
        .unwrap_or_default();

    Some(Server {
        description: metadata.get("description").cloned().unwrap_or_default(),
        version: metadata.get("version").cloned(),
        endpoint: format!("http://{}:{}{}", instance.ip, instance.port, context_path),
        transport_type,
        tools,
        status: if instance.enabled {
            ServerStatus::Connected
        } else {
            ServerStatus::Disconnected
        },
        relevance_score: 0.0,
        provider: NAMING_PROVIDER_NAME.to_string(),
        last_update_time: Utc::now(),
        name,
    })
}

fn parse_tools(server_name: &str, json: &str) -> Vec<Tool> {
    if json.trim().is_empty() {
        return Vec::new();
    }

    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::warn!(server = %server_name, error = %e, "Failed to parse tools JSON");
        Vec::new()
    })
}

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::discovery::{scoring, DiscoveryProvider};
use crate::models::search::SearchRequest;
use crate::models::server::{Server, ServerStatus, TransportType};
use crate::models::tool::Tool;

pub const CATALOG_PROVIDER_NAME: &str = "catalog";

/// Remote catalog of tool servers
///
/// The catalog does its own ranking: each result carries a `score`, which
/// becomes the server's relevance before `minSimilarity`/`limit` apply.
pub struct CatalogProvider {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct CatalogQuery<'a> {
    query: &'a str,
    keywords: Vec<String>,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    results: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntry {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    transport_type: String,
    #[serde(default)]
    endpoint: String,
    #[serde(default)]
    tools: Vec<Tool>,
    #[serde(default)]
    score: f64,
}

impl CatalogProvider {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(provider = CATALOG_PROVIDER_NAME, error = %e, "Falling back to a client without timeout");
                reqwest::Client::new()
            }
        };

        Self {
            client,
            api_url: api_url.into(),
        }
    }

    async fn query(&self, request: &SearchRequest) -> Result<Vec<CatalogEntry>, reqwest::Error> {
        let query = request.query().unwrap_or_default();
        let body = CatalogQuery {
            query: &query,
            keywords: request.normalized_keywords(),
            limit: request.effective_limit(),
        };

        let response = self
            .client
            .post(format!("{}/search", self.api_url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<CatalogResponse>().await?.results)
    }
}

#[async_trait]
impl DiscoveryProvider for CatalogProvider {
    async fn search(&self, request: &SearchRequest) -> Vec<Server> {
        let entries = match self.query(request).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(provider = CATALOG_PROVIDER_NAME, error = %e, "Catalog search failed");
                return Vec::new();
            }
        };

        let servers: Vec<Server> = entries.into_iter().filter_map(to_server).collect();
        if request.is_empty() {
            return servers;
        }
        scoring::filter_and_sort(servers, request)
    }

    fn provider_name(&self) -> String {
        CATALOG_PROVIDER_NAME.to_string()
    }
}

fn to_server(entry: CatalogEntry) -> Option<Server> {
    let Some(transport_type) = TransportType::parse(&entry.transport_type) else {
        tracing::debug!(server = %entry.name, transport = %entry.transport_type, "Skipping catalog entry with unsupported transport");
        return None;
    };

    Some(Server {
        name: entry.name,
        description: entry.description,
        version: entry.version,
        endpoint: entry.endpoint,
        transport_type,
        tools: entry.tools,
        status: ServerStatus::Registered,
        relevance_score: entry.score,
        provider: CATALOG_PROVIDER_NAME.to_string(),
        last_update_time: Utc::now(),
    })
}

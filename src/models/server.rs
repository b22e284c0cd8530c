use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::tool::Tool;

/// Wire protocol a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportType {
    /// One HTTP request carries the call, its response carries the result
    #[serde(alias = "sync", alias = "http", alias = "streamable-http")]
    Synchronous,
    /// Calls are pushed over a side channel, results arrive on a long-lived stream
    #[serde(alias = "sse", alias = "event_stream")]
    EventStream,
}

impl TransportType {
    /// Parses the loose transport labels used by registries and catalogs.
    ///
    /// Returns `None` for transports the router cannot bridge (e.g. `stdio`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "synchronous" | "sync" | "http" | "streamable-http" => Some(Self::Synchronous),
            "event-stream" | "event_stream" | "sse" => Some(Self::EventStream),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous",
            Self::EventStream => "event-stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    Registered,
    Connected,
    Healthy,
    Disconnected,
    #[default]
    Unknown,
}

impl ServerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Connected => "CONNECTED",
            Self::Healthy => "HEALTHY",
            Self::Disconnected => "DISCONNECTED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// A backend tool server as reported by a discovery provider
///
/// `name` is the identity key. Providers may report the same name with
/// different contents; the registry resolves such collisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub endpoint: String,
    pub transport_type: TransportType,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub relevance_score: f64,
    /// Name of the provider that reported this record
    #[serde(default)]
    pub provider: String,
    #[serde(default = "Utc::now")]
    pub last_update_time: DateTime<Utc>,
}

impl Server {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        transport_type: TransportType,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: None,
            endpoint: endpoint.into(),
            transport_type,
            tools: Vec::new(),
            status: ServerStatus::Registered,
            relevance_score: 0.0,
            provider: String::new(),
            last_update_time: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_status(mut self, status: ServerStatus) -> Self {
        self.status = status;
        self
    }

    /// Registry key: names compare case-insensitively
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn find_tool(&self, tool_name: &str) -> Option<&Tool> {
        self.tools
            .iter()
            .find(|tool| tool.name.eq_ignore_ascii_case(tool_name))
    }

    pub fn offers_tool(&self, tool_name: &str) -> bool {
        self.find_tool(tool_name).is_some()
    }

    /// True when the endpoint can be turned into a request URL
    pub fn has_usable_endpoint(&self) -> bool {
        let endpoint = self.endpoint.trim();
        !endpoint.is_empty() && !endpoint.chars().any(char::is_whitespace)
    }

    /// Joins the endpoint with a path, adding `http://` to bare `host:port` endpoints.
    pub fn url_for(&self, path: &str) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };

        if path.is_empty() {
            base
        } else if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

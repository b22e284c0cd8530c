use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::StructuredError;

pub const STATUS_UP: &str = "UP";
pub const STATUS_DOWN: &str = "DOWN";
pub const STATUS_ERROR: &str = "ERROR";
pub const STATUS_NOT_FOUND: &str = "NOT_FOUND";
pub const STATUS_REGISTERED: &str = "REGISTERED";

/// Result of probing one tool
///
/// Recomputed on every check; never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub healthy: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthRecord {
    pub fn up(tool_name: &str, server_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            server_name: Some(server_name.to_string()),
            healthy: true,
            status: STATUS_UP.to_string(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn unhealthy(
        tool_name: &str,
        server_name: Option<&str>,
        status: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            server_name: server_name.map(str::to_string),
            healthy: false,
            status: status.to_string(),
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Same check outcome, attributed to another tool of the same server
    pub fn for_tool(&self, tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchHealthRecord {
    pub total_tools: usize,
    pub healthy_tools: usize,
    pub unhealthy_tools: usize,
    pub health_percentage: f64,
    pub overall_healthy: bool,
    pub tools: Vec<HealthRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BatchHealthRecord {
    pub fn from_records(tools: Vec<HealthRecord>) -> Self {
        let total_tools = tools.len();
        let healthy_tools = tools.iter().filter(|r| r.healthy).count();
        let health_percentage = if total_tools == 0 {
            0.0
        } else {
            healthy_tools as f64 * 100.0 / total_tools as f64
        };

        Self {
            total_tools,
            healthy_tools,
            unhealthy_tools: total_tools - healthy_tools,
            health_percentage,
            overall_healthy: total_tools > 0 && healthy_tools == total_tools,
            tools,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Zeroed record for when the health source could not be consulted at all
    pub fn zeroed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_records(Vec::new())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCheck {
    pub tool_name: String,
    pub registered: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a verify-then-call invocation
///
/// The health record is always attached, whether or not the call ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckedCall {
    pub success: bool,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StructuredError>,
    pub health_checked: bool,
    pub health_status: HealthRecord,
    pub timestamp: DateTime<Utc>,
}

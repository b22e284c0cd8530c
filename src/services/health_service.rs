use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{sanitize_message, RouterError};
use crate::mcp::dispatcher::ToolDispatcher;
use crate::mcp::registry::SharedRegistry;
use crate::models::health::{
    BatchHealthRecord, CheckedCall, HealthRecord, RegistrationCheck, STATUS_DOWN, STATUS_ERROR,
    STATUS_NOT_FOUND, STATUS_REGISTERED,
};
use crate::models::server::Server;

/// Health checks and registration checks
///
/// Nothing here returns an error: every failure becomes a negative record.
pub struct HealthService {
    dispatcher: Arc<ToolDispatcher>,
    client: reqwest::Client,
    health_path: String,
    timeout: Duration,
}

impl HealthService {
    pub fn new(dispatcher: Arc<ToolDispatcher>, health_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dispatcher,
            client: reqwest::Client::new(),
            health_path: health_path.into(),
            timeout,
        }
    }

    fn registry(&self) -> &SharedRegistry {
        self.dispatcher.registry()
    }

    /// Requests `GET <endpoint><health-path>` on behalf of `tool_name`
    ///
    /// 2xx is healthy unless the body reports `"status": "DOWN"`.
    async fn check_server(&self, server: &Server, tool_name: &str) -> HealthRecord {
        if !server.has_usable_endpoint() {
            return HealthRecord::unhealthy(
                tool_name,
                Some(&server.name),
                STATUS_ERROR,
                "server has no usable endpoint",
            );
        }

        let url = server.url_for(&self.health_path);
        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = RouterError::from_reqwest(e, "health check", self.timeout);
                tracing::warn!(server = %server.name, tool = %tool_name, error = %err, "Health check failed");
                return HealthRecord::unhealthy(
                    tool_name,
                    Some(&server.name),
                    STATUS_ERROR,
                    sanitize_message(&err.to_string()),
                );
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(server = %server.name, status = %status, "Health endpoint reported failure");
            return HealthRecord::unhealthy(
                tool_name,
                Some(&server.name),
                STATUS_DOWN,
                format!("health endpoint returned {}", status),
            );
        }

        let reported = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("status").and_then(Value::as_str).map(str::to_uppercase));

        if reported.as_deref() == Some(STATUS_DOWN) {
            return HealthRecord::unhealthy(
                tool_name,
                Some(&server.name),
                STATUS_DOWN,
                "backend reported DOWN",
            );
        }

        HealthRecord::up(tool_name, &server.name)
    }

    pub async fn check_tool_health(&self, tool_name: &str) -> HealthRecord {
        match self.registry().find_by_tool(tool_name).await {
            Some(server) => self.check_server(&server, tool_name).await,
            None => HealthRecord::unhealthy(
                tool_name,
                None,
                STATUS_NOT_FOUND,
                format!("tool {} is not registered", tool_name),
            ),
        }
    }

    /// Checks every server once, concurrently, and reports per declared tool
    pub async fn check_all_tools_health(&self) -> BatchHealthRecord {
        let servers = self.registry().list_all().await;
        if servers.is_empty() {
            return BatchHealthRecord::zeroed("no servers discovered");
        }

        let outcomes = join_all(servers.iter().map(|server| self.check_server(server, &server.name))).await;

        let records = servers
            .iter()
            .zip(outcomes)
            .flat_map(|(server, outcome)| {
                server
                    .tools
                    .iter()
                    .map(|tool| outcome.for_tool(&tool.name))
                    .collect::<Vec<_>>()
            })
            .collect();

        let batch = BatchHealthRecord::from_records(records);
        tracing::info!(
            total = batch.total_tools,
            healthy = batch.healthy_tools,
            percentage = batch.health_percentage,
            "Batch health check"
        );
        batch
    }

    /// Reports whether any server declares `tool_name`; absence is not an error
    pub async fn verify_registration(&self, tool_name: &str) -> RegistrationCheck {
        match self.registry().find_by_tool(tool_name).await {
            Some(server) => RegistrationCheck {
                tool_name: tool_name.to_string(),
                registered: true,
                status: STATUS_REGISTERED.to_string(),
                server_name: Some(server.name),
                error: None,
                timestamp: Utc::now(),
            },
            None => RegistrationCheck {
                tool_name: tool_name.to_string(),
                registered: false,
                status: STATUS_NOT_FOUND.to_string(),
                server_name: None,
                error: Some(format!("tool {} is not registered", tool_name)),
                timestamp: Utc::now(),
            },
        }
    }

    /// Probes the named server, then invokes only if it is healthy
    pub async fn call_with_health_check(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Value,
    ) -> CheckedCall {
        let health = match self.registry().get_by_name(server_name).await {
            Some(server) => self.check_server(&server, tool_name).await,
            None => HealthRecord::unhealthy(
                tool_name,
                Some(server_name),
                STATUS_NOT_FOUND,
                format!("server {} is not registered", server_name),
            ),
        };

        if !health.healthy {
            tracing::warn!(server = %server_name, tool = %tool_name, status = %health.status, "Skipping call to unhealthy tool");
            let error = RouterError::ServiceUnavailable(format!(
                "tool {} failed health check: {}",
                tool_name,
                health.error.as_deref().unwrap_or(&health.status)
            ));
            return CheckedCall {
                success: false,
                tool_name: tool_name.to_string(),
                server_name: Some(server_name.to_string()),
                result: None,
                error: Some(error.to_structured(Some(tool_name))),
                health_checked: true,
                health_status: health,
                timestamp: Utc::now(),
            };
        }

        let outcome = self
            .dispatcher
            .invoke(tool_name, arguments, Some(server_name))
            .await;

        let (success, result, error) = match outcome {
            Ok(value) => (true, Some(value), None),
            Err(e) => (false, None, Some(e.to_structured(Some(tool_name)))),
        };

        CheckedCall {
            success,
            tool_name: tool_name.to_string(),
            server_name: Some(server_name.to_string()),
            result,
            error,
            health_checked: true,
            health_status: health,
            timestamp: Utc::now(),
        }
    }
}

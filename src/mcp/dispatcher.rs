//! Tool dispatch: resolve a server, build an envelope, send it
//!
//! ```text
//! invoke(tool, args, server?)
//!   -> registry.get_by_name / find_by_tool   (NotFound, never retried)
//!   -> endpoint check                        (ServiceUnavailable, never retried)
//!   -> CallEnvelope{fresh id, tools/call}
//!   -> transport.send                        (retried per RetryPolicy)
//!   -> result payload, untouched
//! ```

use futures::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, RouterError};
use crate::mcp::bridge::Transport;
use crate::mcp::registry::SharedRegistry;
use crate::models::envelope::{CallEnvelope, ReplyEnvelope};
use crate::models::server::Server;
use crate::models::tool::{ServerTool, Tool};
use crate::services::retry_policy::RetryPolicy;

/// Process-wide source of envelope ids
///
/// Ids start at 1 and are strictly increasing; concurrent callers never
/// receive the same id.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

pub struct ToolDispatcher {
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    ids: RequestIdGenerator,
    retry: RetryPolicy,
}

impl ToolDispatcher {
    pub fn new(registry: SharedRegistry, transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            registry,
            transport,
            ids: RequestIdGenerator::new(),
            retry,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Finds the server that should handle `tool_name`
    ///
    /// Returns the server and the tool name as that server declares it, so
    /// the envelope carries the backend's own casing. A server declaring no
    /// tools is trusted to have it and gets the caller's name unchanged.
    /// With an explicit server name, a server that declares tools must
    /// declare this one.
    pub async fn resolve(
        &self,
        tool_name: &str,
        server_name: Option<&str>,
    ) -> Result<(Server, String)> {
        let server = match server_name {
            Some(name) => {
                let server = self
                    .registry
                    .get_by_name(name)
                    .await
                    .ok_or_else(|| RouterError::NotFound(format!("server {}", name)))?;

                if !server.tools.is_empty() && !server.offers_tool(tool_name) {
                    return Err(RouterError::NotFound(format!(
                        "tool {} on server {}",
                        tool_name, server.name
                    )));
                }
                server
            }
            None => self
                .registry
                .find_by_tool(tool_name)
                .await
                .ok_or_else(|| RouterError::NotFound(format!("no server offers tool {}", tool_name)))?,
        };

        let declared = server
            .find_tool(tool_name)
            .map(|tool| tool.name.clone())
            .unwrap_or_else(|| tool_name.to_string());
        Ok((server, declared))
    }

    /// Invokes `tool_name` and returns the backend's result payload unchanged
    ///
    /// # Arguments
    ///
    /// * `tool_name` - tool to call, matched case-insensitively
    /// * `arguments` - JSON object, or null for no arguments
    /// * `server_name` - pin the call to this server instead of searching
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: Value,
        server_name: Option<&str>,
    ) -> Result<Value> {
        let tool_name = tool_name.trim();
        if tool_name.is_empty() {
            return Err(RouterError::Validation("tool name is required".to_string()));
        }
        if !(arguments.is_object() || arguments.is_null()) {
            return Err(RouterError::Validation(
                "arguments must be a JSON object".to_string(),
            ));
        }

        let (server, tool_name) = self.resolve(tool_name, server_name).await?;
        ensure_endpoint(&server)?;

        let tool_name = tool_name.as_str();
        let label = format!("tools/call {}", tool_name);
        self.retry
            .run(&label, |attempt| {
                let envelope = CallEnvelope::tools_call(self.ids.next_id(), tool_name, arguments.clone());
                let server = &server;
                async move {
                    tracing::info!(
                        server = %server.name,
                        tool = %tool_name,
                        id = envelope.id,
                        attempt,
                        "Invoking tool"
                    );
                    let reply = self.transport.send(server, &envelope).await?;
                    into_result(reply)
                }
            })
            .await
    }

    /// Lists tools of one server, or of every known server
    ///
    /// Each server is asked with `tools/list`; when that fails the tools it
    /// declared at discovery are used instead.
    pub async fn list_tools(&self, server_name: Option<&str>) -> Result<Vec<ServerTool>> {
        let servers = match server_name {
            Some(name) => vec![self
                .registry
                .get_by_name(name)
                .await
                .ok_or_else(|| RouterError::NotFound(format!("server {}", name)))?],
            None => self.registry.list_all().await,
        };

        let listed = join_all(servers.iter().map(|server| self.tools_of(server))).await;

        let mut tools = Vec::new();
        for (server, result) in servers.iter().zip(listed) {
            let server_tools = match result {
                Ok(remote) => remote,
                Err(e) if server_name.is_some() && server.tools.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(server = %server.name, error = %e, "tools/list failed, using declared tools");
                    server.tools.clone()
                }
            };
            tools.extend(server_tools.into_iter().map(|tool| ServerTool {
                server_name: server.name.clone(),
                tool,
            }));
        }
        Ok(tools)
    }

    async fn tools_of(&self, server: &Server) -> Result<Vec<Tool>> {
        ensure_endpoint(server)?;

        let envelope = CallEnvelope::tools_list(self.ids.next_id());
        let reply = self.transport.send(server, &envelope).await?;
        let result = into_result(reply)?;

        let listed = match result {
            Value::Object(mut map) => map.remove("tools").unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        serde_json::from_value(listed).map_err(|e| {
            RouterError::Transport(format!("tools/list: malformed reply from {}: {}", server.name, e))
        })
    }
}

fn ensure_endpoint(server: &Server) -> Result<()> {
    if server.has_usable_endpoint() {
        Ok(())
    } else {
        Err(RouterError::ServiceUnavailable(format!(
            "server {} has no usable endpoint",
            server.name
        )))
    }
}

fn into_result(reply: ReplyEnvelope) -> Result<Value> {
    match reply.error {
        Some(error) => Err(RouterError::from_rpc(&error)),
        None => Ok(reply.result.unwrap_or(Value::Null)),
    }
}

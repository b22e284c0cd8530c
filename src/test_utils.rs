pub mod test_helpers {
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::RouterConfig;
    use crate::mcp::bridge::ProtocolBridge;
    use crate::mcp::registry::ServerRegistry;
    use crate::models::server::{Server, TransportType};
    use crate::models::tool::Tool;
    use crate::services::router_service::RouterService;

    /// Config with short bounds and near-instant retries
    pub fn test_config() -> RouterConfig {
        let mut config = RouterConfig::default();
        config.provider_timeout = Duration::from_millis(500);
        config.call_timeout = Duration::from_secs(2);
        config.stream_open_timeout = Duration::from_secs(2);
        config.stream_session_timeout = Duration::from_millis(500);
        config.health_timeout = Duration::from_secs(1);
        config.retry.base_delay = Duration::from_millis(1);
        config.retry.max_delay = Duration::from_millis(5);
        config
    }

    /// Router over an empty registry, talking real HTTP
    pub fn test_router(config: &RouterConfig) -> RouterService {
        RouterService::new(
            Arc::new(ServerRegistry::new(config.provider_timeout)),
            Arc::new(ProtocolBridge::from_config(config)),
            config,
        )
    }

    /// Server with the given tools at `endpoint`
    pub fn sample_server(name: &str, endpoint: &str, transport: TransportType, tools: &[&str]) -> Server {
        Server::new(name, endpoint, transport)
            .with_description(format!("{} test server", name))
            .with_tools(
                tools
                    .iter()
                    .map(|t| {
                        Tool::new(*t, format!("{} tool", t))
                            .with_input_schema(json!({"type": "object"}))
                    })
                    .collect(),
            )
    }

    /// Encodes payloads as an SSE body, one `message` frame each
    pub fn sse_body(payloads: &[Value]) -> String {
        let mut body = String::from("event: endpoint\ndata: /mcp/message\n\n");
        for payload in payloads {
            body.push_str("event: message\n");
            body.push_str(&format!("data: {}\n\n", payload));
        }
        body
    }
}

use async_trait::async_trait;
use mcprouter::discovery::naming_provider::NamingConfig;
use mcprouter::discovery::{DiscoveryProvider, NamingProvider};
use mcprouter::mcp::{ProtocolBridge, ServerRegistry};
use mcprouter::models::{SearchRequest, Server, ServerStatus, TransportType};
use mcprouter::services::RouterService;
use mcprouter::test_utils::test_helpers::{sample_server, test_config};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Provider with a fixed answer
struct StaticProvider {
    name: &'static str,
    servers: Vec<Server>,
}

#[async_trait]
impl DiscoveryProvider for StaticProvider {
    async fn search(&self, _request: &SearchRequest) -> Vec<Server> {
        self.servers.clone()
    }

    fn provider_name(&self) -> String {
        self.name.to_string()
    }
}

/// Provider that hangs, as a broken remote source would
struct HangingProvider;

#[async_trait]
impl DiscoveryProvider for HangingProvider {
    async fn search(&self, _request: &SearchRequest) -> Vec<Server> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        vec![Server::new("never", "localhost:1", TransportType::Synchronous)]
    }

    fn provider_name(&self) -> String {
        "hanging".to_string()
    }
}

#[tokio::test]
async fn test_list_all_is_union_of_healthy_providers() {
    let registry = ServerRegistry::new(Duration::from_millis(100))
        .with_provider(Arc::new(StaticProvider {
            name: "a",
            servers: vec![
                sample_server("s1", "localhost:1", TransportType::Synchronous, &["t1"]),
                sample_server("s2", "localhost:2", TransportType::Synchronous, &["t2"]),
            ],
        }))
        .with_provider(Arc::new(HangingProvider))
        .with_provider(Arc::new(StaticProvider {
            name: "c",
            servers: vec![sample_server("s3", "localhost:3", TransportType::EventStream, &[])],
        }));

    let started = std::time::Instant::now();
    let mut names: Vec<String> = registry.list_all().await.into_iter().map(|s| s.name).collect();
    names.sort();

    assert_eq!(names, vec!["s1", "s2", "s3"]);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_failed_provider_still_allows_dispatch() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"name": "t1", "arguments": {}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "result": {"ok": true}})))
        .expect(1)
        .mount(&backend)
        .await;

    let config = test_config();
    let registry = ServerRegistry::new(config.provider_timeout)
        .with_provider(Arc::new(StaticProvider {
            name: "a",
            servers: vec![sample_server("S1", &backend.uri(), TransportType::Synchronous, &["t1"])],
        }))
        .with_provider(Arc::new(StaticProvider {
            name: "b",
            servers: vec![],
        }));

    let router = RouterService::new(
        Arc::new(registry),
        Arc::new(ProtocolBridge::from_config(&config)),
        &config,
    );

    let servers = router.list_servers().await;
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].name, "S1");

    let result = router.invoke(None, "t1", json!({})).await.unwrap();
    assert_eq!(result, json!({"ok": true}));
}

#[tokio::test]
async fn test_naming_provider_reads_instances_and_tools_config() {
    let naming = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/nacos/v1/ns/service/list"))
        .and(query_param("groupName", "MCP_SERVER_GROUP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2,
            "doms": ["mcp-server-v2", "mcp-server-v3"]
        })))
        .mount(&naming)
        .await;

    Mock::given(method("GET"))
        .and(path("/nacos/v1/ns/instance/list"))
        .and(query_param("serviceName", "mcp-server-v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{
                "ip": "10.0.0.2",
                "port": 8061,
                "healthy": true,
                "enabled": true,
                "metadata": {
                    "name": "mcp-server-v2",
                    "description": "Person management",
                    "transportType": "sse",
                    "tools": "[{\"name\":\"getAllPersons\",\"description\":\"All persons\"}]"
                }
            }]
        })))
        .mount(&naming)
        .await;

    Mock::given(method("GET"))
        .and(path("/nacos/v1/ns/instance/list"))
        .and(query_param("serviceName", "mcp-server-v3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{
                "ip": "10.0.0.3",
                "port": 8062,
                "enabled": false,
                "metadata": {"transportType": "http"}
            }]
        })))
        .mount(&naming)
        .await;

    Mock::given(method("GET"))
        .and(path("/nacos/v1/cs/configs"))
        .and(query_param("dataId", "tools.mcp-server-v3"))
        .and(query_param("group", "MCP_TOOLS"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"name":"addPerson","description":"Add a person"}]"#,
        ))
        .mount(&naming)
        .await;

    let provider = NamingProvider::new(NamingConfig::new(naming.uri()));
    let mut servers = provider.search(&SearchRequest::all()).await;
    servers.sort_by(|a, b| a.name.cmp(&b.name));

    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0].endpoint, "http://10.0.0.2:8061");
    assert_eq!(servers[0].transport_type, TransportType::EventStream);
    assert_eq!(servers[0].status, ServerStatus::Connected);
    assert!(servers[0].offers_tool("getAllPersons"));

    assert_eq!(servers[1].name, "mcp-server-v3");
    assert_eq!(servers[1].status, ServerStatus::Disconnected);
    assert!(servers[1].offers_tool("addperson"));
}

#[tokio::test]
async fn test_naming_provider_unreachable_is_empty() {
    let provider = NamingProvider::new(NamingConfig {
        timeout: Duration::from_millis(200),
        ..NamingConfig::new("http://127.0.0.1:1")
    });

    assert!(provider.search(&SearchRequest::all()).await.is_empty());
}

#[tokio::test]
async fn test_naming_provider_ranks_by_query() {
    let naming = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nacos/v1/ns/instance/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hosts": [{
                "ip": "10.0.0.2",
                "port": 8061,
                "metadata": {"description": "Person management", "tools": "[]"}
            }]
        })))
        .mount(&naming)
        .await;
    Mock::given(method("GET"))
        .and(path("/nacos/v1/cs/configs"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&naming)
        .await;

    let provider = NamingProvider::new(
        NamingConfig::new(naming.uri()).with_services(vec!["person-server".to_string()]),
    );

    let hits = provider
        .search(&SearchRequest::for_task("person").with_min_similarity(1.0))
        .await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].relevance_score, 1.5);

    let misses = provider
        .search(&SearchRequest::for_task("weather").with_min_similarity(0.5))
        .await;
    assert!(misses.is_empty());
}

#[tokio::test]
async fn test_register_then_unregister_through_router() {
    let config = test_config();
    let router = mcprouter::test_utils::test_helpers::test_router(&config);

    router
        .register(sample_server("local", "localhost:9100", TransportType::Synchronous, &["echo"]))
        .unwrap();
    assert_eq!(router.list_servers().await.len(), 1);
    assert!(router.verify_registration("ECHO").await.registered);

    assert!(router.unregister("LOCAL"));
    assert!(router.list_servers().await.is_empty());
    assert!(!router.verify_registration("echo").await.registered);
}

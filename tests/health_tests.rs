use mcprouter::error::ErrorCategory;
use mcprouter::models::health::{STATUS_DOWN, STATUS_ERROR, STATUS_NOT_FOUND, STATUS_UP};
use mcprouter::models::TransportType;
use mcprouter::services::RouterService;
use mcprouter::test_utils::test_helpers::{sample_server, test_config, test_router};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn backend_with_health(template: ResponseTemplate) -> MockServer {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(template)
        .mount(&backend)
        .await;
    backend
}

fn router_with(servers: Vec<mcprouter::models::Server>) -> RouterService {
    let router = test_router(&test_config());
    for server in servers {
        router.register(server).unwrap();
    }
    router
}

#[tokio::test]
async fn test_tool_health_up() {
    let backend =
        backend_with_health(ResponseTemplate::new(200).set_body_json(json!({"status": "UP"}))).await;
    let router = router_with(vec![sample_server(
        "persons",
        &backend.uri(),
        TransportType::Synchronous,
        &["getAllPersons"],
    )]);

    let record = router.check_health("getAllPersons").await;

    assert!(record.healthy);
    assert_eq!(record.status, STATUS_UP);
    assert_eq!(record.server_name.as_deref(), Some("persons"));
}

#[tokio::test]
async fn test_tool_health_down_on_error_status_or_body() {
    let failing = backend_with_health(ResponseTemplate::new(500)).await;
    let reporting_down =
        backend_with_health(ResponseTemplate::new(200).set_body_json(json!({"status": "down"}))).await;

    let router = router_with(vec![
        sample_server("failing", &failing.uri(), TransportType::Synchronous, &["a"]),
        sample_server("reporting", &reporting_down.uri(), TransportType::Synchronous, &["b"]),
    ]);

    let a = router.check_health("a").await;
    assert!(!a.healthy);
    assert_eq!(a.status, STATUS_DOWN);

    let b = router.check_health("b").await;
    assert!(!b.healthy);
    assert_eq!(b.status, STATUS_DOWN);
}

#[tokio::test]
async fn test_tool_health_unreachable_and_unknown() {
    let router = router_with(vec![sample_server(
        "gone",
        "127.0.0.1:1",
        TransportType::Synchronous,
        &["t1"],
    )]);

    let unreachable = router.check_health("t1").await;
    assert!(!unreachable.healthy);
    assert_eq!(unreachable.status, STATUS_ERROR);
    assert!(unreachable.error.is_some());

    let unknown = router.check_health("nope").await;
    assert!(!unknown.healthy);
    assert_eq!(unknown.status, STATUS_NOT_FOUND);
    assert!(unknown.server_name.is_none());
}

#[tokio::test]
async fn test_batch_health_percentages() {
    let up = backend_with_health(ResponseTemplate::new(200)).await;
    let router = router_with(vec![
        sample_server("up", &up.uri(), TransportType::Synchronous, &["a", "b", "c"]),
        sample_server("gone", "127.0.0.1:1", TransportType::EventStream, &["d"]),
    ]);

    let batch = router.check_all_health().await;

    assert_eq!(batch.total_tools, 4);
    assert_eq!(batch.healthy_tools, 3);
    assert_eq!(batch.unhealthy_tools, 1);
    assert!((batch.health_percentage - 75.0).abs() < 1e-9);
    assert!(!batch.overall_healthy);
    assert!(batch.tools.iter().any(|r| r.tool_name == "d" && !r.healthy));
}

#[tokio::test]
async fn test_batch_health_without_servers_is_zeroed() {
    let router = router_with(vec![]);

    let batch = router.check_all_health().await;

    assert_eq!(batch.total_tools, 0);
    assert_eq!(batch.health_percentage, 0.0);
    assert!(!batch.overall_healthy);
    assert!(batch.error.is_some());
}

#[tokio::test]
async fn test_verify_registration() {
    let router = router_with(vec![sample_server(
        "persons",
        "localhost:9001",
        TransportType::Synchronous,
        &["getPersonById"],
    )]);

    let found = router.verify_registration("getPersonById").await;
    assert!(found.registered);
    assert_eq!(found.server_name.as_deref(), Some("persons"));

    let missing = router.verify_registration("deletePerson").await;
    assert!(!missing.registered);
    assert_eq!(missing.status, STATUS_NOT_FOUND);
}

#[tokio::test]
async fn test_checked_call_skips_unhealthy_backend() {
    let backend = backend_with_health(ResponseTemplate::new(503)).await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "result": "ran"})))
        .expect(0)
        .mount(&backend)
        .await;

    let router = router_with(vec![sample_server(
        "persons",
        &backend.uri(),
        TransportType::Synchronous,
        &["getAllPersons"],
    )]);

    let outcome = router
        .call_with_health_check("persons", "getAllPersons", json!({}))
        .await;

    assert!(!outcome.success);
    assert!(outcome.health_checked);
    assert!(!outcome.health_status.healthy);
    assert!(outcome.result.is_none());
    let error = outcome.error.unwrap();
    assert_eq!(error.category, ErrorCategory::ServiceUnavailable);
    assert_eq!(error.tool_name.as_deref(), Some("getAllPersons"));
}

#[tokio::test]
async fn test_checked_call_runs_on_healthy_backend() {
    let backend = backend_with_health(ResponseTemplate::new(200)).await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "result": ["alice"]})))
        .expect(1)
        .mount(&backend)
        .await;

    let router = router_with(vec![sample_server(
        "persons",
        &backend.uri(),
        TransportType::Synchronous,
        &["getAllPersons"],
    )]);

    let outcome = router
        .call_with_health_check("persons", "getAllPersons", json!({}))
        .await;

    assert!(outcome.success);
    assert!(outcome.health_status.healthy);
    assert_eq!(outcome.result, Some(json!(["alice"])));
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_checked_call_unknown_server() {
    let router = router_with(vec![]);

    let outcome = router.call_with_health_check("ghost", "t1", json!({})).await;

    assert!(!outcome.success);
    assert_eq!(outcome.health_status.status, STATUS_NOT_FOUND);
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RouterError;
use crate::models::search::SearchRequest;
use crate::models::server::Server;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub server_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResponse {
    pub success: bool,
    pub tool_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub result: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Server>,
    pub total_results: usize,
}

#[derive(Debug, Deserialize)]
pub struct ToolsQuery {
    pub server: Option<String>,
}

/// Builds the router's HTTP surface
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(service_health))
        .route("/api/mcp/health", get(router_health))
        .route("/api/mcp/health/batch", get(batch_health))
        .route("/api/mcp/servers", get(list_servers))
        .route("/api/mcp/search", post(search_servers))
        .route("/api/mcp/register", post(register_server))
        .route("/api/mcp/unregister/{name}", delete(unregister_server))
        .route("/api/mcp/tools", get(list_tools))
        .route("/api/mcp/tools/call", post(call_tool))
        .route("/api/mcp/tools/{tool}/health", get(tool_health))
        .route("/api/mcp/tools/{tool}/verify", get(verify_tool))
        .route("/api/mcp/servers/{server}/tools/{tool}", post(call_server_tool))
        .route(
            "/api/mcp/servers/{server}/tools/{tool}/checked",
            post(call_server_tool_checked),
        )
        .with_state(state)
}

/// Error response carrying the tool name in its structured body
fn tool_error(error: RouterError, tool_name: &str) -> Response {
    tracing::warn!(tool = %tool_name, error = %error, "Tool call failed");
    (error.status_code(), Json(error.to_structured(Some(tool_name)))).into_response()
}

/// GET /health - liveness of the router process
pub async fn service_health() -> Json<Value> {
    Json(json!({
        "status": "UP",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/mcp/health - providers and cached view, without polling
pub async fn router_health(State(state): State<AppState>) -> Json<Value> {
    let registry = state.router.registry();
    Json(json!({
        "status": "UP",
        "providers": registry.provider_names(),
        "cachedServers": registry.cached().len(),
        "timestamp": Utc::now(),
    }))
}

/// GET /api/mcp/servers - every known server, deduplicated by name
pub async fn list_servers(State(state): State<AppState>) -> Json<Vec<Server>> {
    Json(state.router.list_servers().await)
}

/// POST /api/mcp/search - ranked search across providers
///
/// # Request Body
///
/// ```json
/// {"taskDescription": "person", "keywords": ["crud"], "limit": 5, "minSimilarity": 0.5}
/// ```
pub async fn search_servers(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let results = state.router.search(&request).await;
    Json(SearchResponse {
        total_results: results.len(),
        results,
    })
}

/// POST /api/mcp/register - add a server to the local registration table
///
/// ## Errors
/// - 400 Bad Request: blank name or unusable endpoint
pub async fn register_server(
    State(state): State<AppState>,
    Json(server): Json<Server>,
) -> Result<(StatusCode, Json<Server>), RouterError> {
    let stored = state.router.register(server)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// DELETE /api/mcp/unregister/{name}
pub async fn unregister_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, RouterError> {
    if !state.router.unregister(&name) {
        return Err(RouterError::NotFound(format!("server {}", name)));
    }
    Ok(Json(json!({ "unregistered": true, "name": name })))
}

/// GET /api/mcp/tools?server={name} - tools of one server, or of all
pub async fn list_tools(
    State(state): State<AppState>,
    Query(query): Query<ToolsQuery>,
) -> Response {
    match state.router.list_tools(query.server.as_deref()).await {
        Ok(tools) => Json(tools).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/mcp/tools/call - resolve and invoke a tool
///
/// # Request Body
///
/// ```json
/// {"toolName": "getPersonById", "arguments": {"id": 1}, "serverName": "mcp-server-v2"}
/// ```
///
/// `serverName` is optional; without it the first server declaring the
/// tool is used.
pub async fn call_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolCallRequest>,
) -> Response {
    let server_name = request.server_name.as_deref();
    match state
        .router
        .invoke(server_name, &request.tool_name, request.arguments.clone())
        .await
    {
        Ok(result) => Json(ToolCallResponse {
            success: true,
            tool_name: request.tool_name.clone(),
            server_name: request.server_name.clone(),
            result,
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(e) => tool_error(e, &request.tool_name),
    }
}

/// POST /api/mcp/servers/{server}/tools/{tool} - invoke on a named server
///
/// The body, when present, is the arguments object.
pub async fn call_server_tool(
    State(state): State<AppState>,
    Path((server, tool)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> Response {
    let arguments = body.map(|Json(v)| v).unwrap_or(Value::Null);
    match state.router.invoke(Some(&server), &tool, arguments).await {
        Ok(result) => Json(ToolCallResponse {
            success: true,
            tool_name: tool,
            server_name: Some(server),
            result,
            timestamp: Utc::now(),
        })
        .into_response(),
        Err(e) => tool_error(e, &tool),
    }
}

/// POST /api/mcp/servers/{server}/tools/{tool}/checked - verify-then-call
///
/// Always 200; the body says whether the call ran and carries the health
/// record either way.
pub async fn call_server_tool_checked(
    State(state): State<AppState>,
    Path((server, tool)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> Response {
    let arguments = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let outcome = state
        .router
        .call_with_health_check(&server, &tool, arguments)
        .await;
    Json(outcome).into_response()
}

/// GET /api/mcp/tools/{tool}/health
pub async fn tool_health(State(state): State<AppState>, Path(tool): Path<String>) -> Response {
    Json(state.router.check_health(&tool).await).into_response()
}

/// GET /api/mcp/health/batch
pub async fn batch_health(State(state): State<AppState>) -> Response {
    Json(state.router.check_all_health().await).into_response()
}

/// GET /api/mcp/tools/{tool}/verify
pub async fn verify_tool(State(state): State<AppState>, Path(tool): Path<String>) -> Response {
    Json(state.router.verify_registration(&tool).await).into_response()
}

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use secrecy::ExposeSecret;
use tower_http::cors::CorsLayer;

use lifelog_client::LifelogClient;
use lifelog_core::api::LifelogApi;
use lifelog_core::auth::ApiKey;
use lifelog_core::ids::SessionId;
use lifelog_core::lifelog::LifelogQuery;

use crate::auth::{self, KeySource, API_KEY_HEADER};
use crate::session::SessionMap;
use crate::{SERVER_NAME, SERVER_VERSION};

/// Shared state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionMap>,
    pub upstream_base_url: String,
}

/// Build the axum router: health and probe endpoints, the four
/// connection-establishing patterns, permissive CORS, and a usage document
/// for everything else.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sse", any(connect))
        .route("/mcp", any(connect))
        .route("/{key}/sse", any(connect_with_path_key))
        .route("/{key}/mcp", any(connect_with_path_key))
        .route("/test/{key}", get(test_probe))
        .fallback(usage)
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Connection establishment with the key in query, custom header, or
/// bearer form. These entry endpoints reject a missing key outright rather
/// than spinning up unauthenticated session state.
async fn connect(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    let path = request.uri().path().to_string();
    let Some((key, source)) = auth::resolve_api_key(&path, &query, request.headers()) else {
        return bad_request(
            "Missing API key",
            "Provide your lifelog API key in the URL path: /{API_KEY}/sse \
             or as a query parameter: /sse?api_key=YOUR_API_KEY",
        );
    };
    forward_to_session(state, key, source, request).await
}

/// Connection establishment with the key as a path segment. Only path keys
/// get shape validation; other sources stay opaque.
async fn connect_with_path_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
    request: Request,
) -> Response {
    if !auth::is_uuid_key(&key) {
        return bad_request(
            "Invalid API key format",
            "API key should be in UUID format (e.g., 53d7793f-2e9f-4db2-883c-1cd490eeba5b)",
        );
    }
    forward_to_session(state, ApiKey::new(key), KeySource::Path, request).await
}

async fn forward_to_session(
    state: AppState,
    key: ApiKey,
    source: KeySource,
    request: Request,
) -> Response {
    // Fresh identifier per connection, never derived from the credential,
    // so concurrent connections with the same key never collide.
    let session_id = SessionId::generate();
    tracing::info!(session_id = %session_id, source = ?source, "establishing session");
    let actor = state.sessions.get_or_create(&session_id, Some(key.clone()));

    // Re-inject the resolved credential as a synthetic header so the actor
    // never has to re-parse the original URL.
    let (mut parts, body) = request.into_parts();
    match HeaderValue::from_str(key.0.expose_secret()) {
        Ok(value) => {
            parts.headers.insert(API_KEY_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(session_id = %session_id, "credential not header-safe, relying on constructor key");
        }
    }
    actor.fetch(&parts.headers, body).await
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "server": SERVER_NAME,
        "version": SERVER_VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// One-shot upstream connectivity probe with a throwaway client.
async fn test_probe(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if !auth::is_uuid_key(&key) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Invalid API key format",
                "usage": "GET /test/{API_KEY}",
            })),
        )
            .into_response();
    }
    Json(run_probe(&state.upstream_base_url, ApiKey::new(key)).await).into_response()
}

async fn run_probe(base_url: &str, key: ApiKey) -> serde_json::Value {
    let client = match LifelogClient::with_base_url(key, base_url) {
        Ok(client) => client,
        Err(e) => return serde_json::json!({ "success": false, "error": e.to_string() }),
    };
    let query = LifelogQuery {
        limit: Some(1),
        ..Default::default()
    };
    match client.get_lifelogs(&query).await {
        Ok(page) => serde_json::json!({
            "success": true,
            "data": {
                "count": page.count,
                "hasLifelogs": !page.lifelogs.is_empty(),
                "firstLifelog": page.lifelogs.first().map(|l| l.title.clone())
                    .unwrap_or_else(|| "No lifelogs".to_string()),
            }
        }),
        Err(e) => serde_json::json!({ "success": false, "error": e.to_string() }),
    }
}

/// Static usage document for unmatched paths.
async fn usage() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": SERVER_NAME,
        "version": SERVER_VERSION,
        "description": "Remote MCP server for the lifelog API",
        "endpoints": {
            "sse (recommended)": "/{YOUR_API_KEY}/sse",
            "sse (legacy)": "/sse?api_key=YOUR_API_KEY",
            "health": "/health",
        },
        "usage": "Connect your MCP client to /{YOUR_API_KEY}/sse or /sse?api_key=YOUR_API_KEY",
        "example": "/53d7793f-2e9f-4db2-883c-1cd490eeba5b/sse",
    }))
}

fn bad_request(error: &str, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": error, "message": message })),
    )
        .into_response()
}

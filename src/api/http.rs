//! HTTP API server.
//!
//! Every node exposes `/get`, `/health`, and `/status`. A leader additionally
//! exposes `/set`; a follower additionally exposes `/replicate`. Role
//! mismatches (`/set` on a follower, `/replicate` on a leader) are rejected
//! with 403 rather than routed away, per the external interface contract.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::{NodeConfig, Role};
use crate::replication::Replicator;
use crate::store::Store;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: NodeConfig,
    pub store: Store,
    /// Present only on a leader.
    pub replicator: Option<Replicator>,
    pub started_at: Instant,
}

/// HTTP API server wrapping an [`AppState`].
pub struct HttpServer {
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: NodeConfig) -> Self {
        let replicator = match config.role {
            Role::Leader => Some(Replicator::new(&config)),
            Role::Follower => None,
        };

        let state = Arc::new(AppState {
            config,
            store: Store::new(),
            replicator,
            started_at: Instant::now(),
        });

        Self { state }
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    fn router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/set", post(handle_set))
            .route("/get", get(handle_get).post(handle_get_post))
            .route("/replicate", post(handle_replicate))
            .route("/health", get(handle_health))
            .route("/status", get(handle_status))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(&self) -> crate::Result<()> {
        let app = Self::router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(&self.state.config.listen_address).await?;
        tracing::info!(
            address = %self.state.config.listen_address,
            role = %self.state.config.role,
            "kvrepl listening"
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::Error::Network(format!("HTTP server error: {e}")))?;

        Ok(())
    }

    /// Bind to an OS-assigned port and serve in the background. Used by
    /// end-to-end tests that need a real socket for the leader's outbound
    /// replication RPCs to land on.
    #[cfg(test)]
    pub async fn start_ephemeral(&self) -> crate::Result<std::net::SocketAddr> {
        let app = Self::router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(addr)
    }
}

// ============ Request/response bodies ============

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    key: Option<String>,
}

// ============ Handlers ============

/// A 400 response with a uniform `{"success":false,"error":...}` body. Used
/// for both malformed-JSON and missing-required-field cases, so the wire
/// status is 400 per the external interface contract rather than axum's
/// default 422 for struct-deserialization rejections on a missing field.
fn bad_request(error: impl Into<String>) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "error": error.into()})),
    )
        .into_response()
}

/// Pull a required string field out of a loosely-typed JSON body, rejecting
/// with 400 (not axum's default 422) if it is absent or not a string.
fn required_str_field<'a>(
    body: &'a serde_json::Value,
    field: &str,
) -> Result<&'a str, axum::response::Response> {
    body.get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad_request(format!("missing or invalid '{field}' field")))
}

async fn handle_set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if state.config.role != Role::Leader {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"success": false, "error": "not the leader"})),
        )
            .into_response();
    }

    let key = match required_str_field(&body, "key") {
        Ok(key) => key.to_string(),
        Err(response) => return response,
    };
    let value = match required_str_field(&body, "value") {
        Ok(value) => value.to_string(),
        Err(response) => return response,
    };

    if key.is_empty() {
        return bad_request("key must not be empty");
    }

    // Request entry: measured from here so the leader's reported
    // total_latency_ms covers local commit plus fan-out, per the data model.
    let request_start = Instant::now();

    // Local commit happens-before fan-out: the leader's own state is the
    // source of truth for any read that follows this response.
    state.store.put(key.clone(), value.clone()).await;

    let replicator = state
        .replicator
        .as_ref()
        .expect("leader role always carries a Replicator");
    let result = replicator.replicate(&key, &value, request_start).await;

    if result.accepted {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "key": key,
                "value": value,
                "replicas": result.replica_count,
                "required": result.required,
                "latency_ms": result.total_latency_ms,
                "avg_replication_latency_ms": result.average_latency_ms,
                "replication_latencies": result.per_peer_latencies_ms,
            })),
        )
            .into_response()
    } else {
        // No rollback: the leader has already committed locally even though
        // quorum was not reached.
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": "Quorum not reached",
                "key": key,
                "value": value,
                "replicas": result.replica_count,
                "required": result.required,
                "latency_ms": result.total_latency_ms,
                "avg_replication_latency_ms": result.average_latency_ms,
                "replication_latencies": result.per_peer_latencies_ms,
            })),
        )
            .into_response()
    }
}

async fn handle_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetQuery>,
) -> impl IntoResponse {
    let key = match query.key {
        Some(key) => key,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"success": false, "error": "missing 'key' query parameter"})),
            )
                .into_response();
        }
    };
    read_key(&state, key).await
}

async fn handle_get_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let key = match required_str_field(&body, "key") {
        Ok(key) => key.to_string(),
        Err(response) => return response,
    };
    read_key(&state, key).await
}

async fn read_key(state: &AppState, key: String) -> axum::response::Response {
    match state.store.get(&key).await {
        Some(value) => Json(json!({
            "success": true,
            "key": key,
            "value": value,
            "node_type": state.config.role.as_str(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "key": key,
                "node_type": state.config.role.as_str(),
            })),
        )
            .into_response(),
    }
}

async fn handle_replicate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if state.config.role != Role::Follower {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"success": false, "error": "not a follower"})),
        )
            .into_response();
    }

    let key = match required_str_field(&body, "key") {
        Ok(key) => key.to_string(),
        Err(response) => return response,
    };
    let value = match required_str_field(&body, "value") {
        Ok(value) => value.to_string(),
        Err(response) => return response,
    };

    state.store.put(key, value).await;
    Json(json!({"success": true})).into_response()
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "node_type": state.config.role.as_str(),
    }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let keys = state.store.snapshot().await;
    let mut body = json!({
        "node_type": state.config.role.as_str(),
        "key_count": keys.len(),
        "keys": keys,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    if state.config.role == Role::Leader {
        body["write_quorum"] = json!(state.config.write_quorum);
        body["peer_count"] = json!(state.config.peers.len());
    }

    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn follower_config() -> NodeConfig {
        NodeConfig {
            role: Role::Follower,
            listen_address: "0.0.0.0:0".into(),
            peers: vec![],
            write_quorum: 0,
            min_delay_ms: 0,
            max_delay_ms: 0,
            replicate_timeout_ms: 200,
        }
    }

    fn leader_config() -> NodeConfig {
        NodeConfig {
            role: Role::Leader,
            listen_address: "0.0.0.0:0".into(),
            peers: vec![],
            write_quorum: 0,
            min_delay_ms: 0,
            max_delay_ms: 0,
            replicate_timeout_ms: 200,
        }
    }

    #[tokio::test]
    async fn set_on_follower_is_forbidden() {
        let server = HttpServer::new(follower_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"a","value":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn replicate_on_leader_is_forbidden() {
        let server = HttpServer::new(leader_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/replicate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"a","value":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn get_on_absent_key_returns_404() {
        let server = HttpServer::new(leader_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/get?key=ghost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn degenerate_leader_with_no_peers_accepts_writes() {
        let server = HttpServer::new(leader_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"a","value":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn replicate_on_follower_applies_write() {
        let server = HttpServer::new(follower_config());
        let state = server.state();
        let app = HttpServer::router(Arc::clone(&state));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/replicate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"a","value":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.get("a").await, Some("1".to_string()));
    }

    #[tokio::test]
    async fn set_missing_value_field_is_bad_request_not_422() {
        let server = HttpServer::new(leader_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"a"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn replicate_missing_key_field_is_bad_request() {
        let server = HttpServer::new(follower_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/replicate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"value":"1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_post_missing_key_field_is_bad_request() {
        let server = HttpServer::new(leader_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/get")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_node_type() {
        let server = HttpServer::new(follower_config());
        let app = HttpServer::router(server.state());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

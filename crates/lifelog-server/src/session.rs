use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use lifelog_client::LifelogClient;
use lifelog_core::auth::ApiKey;
use lifelog_core::errors::UpstreamError;
use lifelog_core::ids::SessionId;
use lifelog_core::tools::{CallToolResult, ToolError};

use crate::auth::API_KEY_HEADER;
use crate::rpc::{self, CallToolParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::tools::ToolRegistry;
use crate::transport::{FrameSender, LineDecoder};

/// How long a bodyless connection stays open before the transport closes it.
pub const EMPTY_BODY_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs shared by every actor the session map creates.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub upstream_base_url: String,
    pub empty_body_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: lifelog_client::DEFAULT_BASE_URL.to_string(),
            empty_body_timeout: EMPTY_BODY_TIMEOUT,
        }
    }
}

/// Session auth progresses one way. A key can arrive after construction but
/// before initialization; once initialize has run, the outcome is final:
/// the client is never rebuilt, and a keyless session stays unauthenticated.
enum AuthState {
    Uninitialized { stashed_key: Option<ApiKey> },
    Authenticated { registry: Arc<ToolRegistry> },
}

struct Inner {
    state: AuthState,
    initialized: bool,
    poisoned: bool,
    read_task: Option<JoinHandle<()>>,
}

/// One logical connection's isolated state: credential, data client, tool
/// registry, and streaming transport. Holds no framing logic itself; that
/// lives in the transport module.
pub struct SessionActor {
    id: SessionId,
    config: SessionConfig,
    inner: Mutex<Inner>,
    last_active: AtomicU64,
}

impl SessionActor {
    pub fn new(id: SessionId, config: SessionConfig, ctx_key: Option<ApiKey>) -> Self {
        Self {
            id,
            config,
            inner: Mutex::new(Inner {
                state: AuthState::Uninitialized {
                    stashed_key: ctx_key,
                },
                initialized: false,
                poisoned: false,
                read_task: None,
            }),
            last_active: AtomicU64::new(now_secs()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(
            self.inner.lock().await.state,
            AuthState::Authenticated { .. }
        )
    }

    fn touch(&self) {
        self.last_active.store(now_secs(), Ordering::Relaxed);
    }

    /// Seconds since the last fetch or dispatched message.
    pub fn idle_secs(&self) -> u64 {
        now_secs().saturating_sub(self.last_active.load(Ordering::Relaxed))
    }

    /// Stash a credential that arrived after construction. Only effective
    /// before the one-shot initialize; afterwards the auth outcome is final.
    fn record_key(&self, inner: &mut Inner, key: ApiKey) {
        if inner.initialized {
            tracing::debug!(session_id = %self.id, "credential arrived after initialization, ignoring");
            return;
        }
        match &mut inner.state {
            AuthState::Uninitialized { stashed_key } => {
                if stashed_key.is_none() {
                    *stashed_key = Some(key);
                }
            }
            AuthState::Authenticated { .. } => {
                tracing::debug!(session_id = %self.id, "session already authenticated, ignoring credential");
            }
        }
    }

    /// One-shot initialization: build the data client and register the tools
    /// if a key is known, otherwise leave the registry unpopulated.
    fn ensure_initialized(&self, inner: &mut Inner) -> Result<(), UpstreamError> {
        if inner.initialized {
            return Ok(());
        }
        inner.initialized = true;

        let key = match &mut inner.state {
            AuthState::Uninitialized { stashed_key } => stashed_key.take(),
            AuthState::Authenticated { .. } => return Ok(()),
        };
        match key {
            Some(key) => {
                let client = Arc::new(LifelogClient::with_base_url(
                    key,
                    &self.config.upstream_base_url,
                )?);
                let registry = Arc::new(ToolRegistry::with_lifelog_tools(client));
                inner.state = AuthState::Authenticated { registry };
                tracing::info!(session_id = %self.id, "session authenticated, tools registered");
            }
            None => {
                tracing::warn!(session_id = %self.id, "no API key available, session stays unauthenticated");
            }
        }
        Ok(())
    }

    /// Serve one streaming exchange: record any late credential, run the
    /// one-shot initialize, then bridge inbound frames to dispatch and
    /// dispatch results to outbound frames.
    pub async fn fetch(self: &Arc<Self>, headers: &HeaderMap, body: Body) -> Response {
        self.touch();
        let mut inner = self.inner.lock().await;

        if inner.poisoned {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session unavailable",
                "Session initialization failed; reconnect to obtain a new session",
            );
        }

        if let Some(key) = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|k| !k.is_empty())
        {
            self.record_key(&mut inner, ApiKey::new(key));
        }

        if let Err(e) = self.ensure_initialized(&mut inner) {
            inner.poisoned = true;
            tracing::error!(session_id = %self.id, error = %e, "session initialization failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                "Failed to initialize session",
            );
        }

        let registry = match &inner.state {
            AuthState::Authenticated { registry } => Some(Arc::clone(registry)),
            AuthState::Uninitialized { .. } => None,
        };

        let (sender, outbound) = FrameSender::channel(self.id.as_str());
        let actor = Arc::clone(self);
        let inbound = body.into_data_stream();
        let task = tokio::spawn(async move {
            actor.read_loop(inbound, sender, registry).await;
        });
        // The handle is retained so teardown can observe and stop the loop.
        if let Some(old) = inner.read_task.replace(task) {
            if !old.is_finished() {
                tracing::debug!(session_id = %self.id, "superseding an unfinished read loop");
            }
        }
        drop(inner);

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            Body::from_stream(outbound),
        )
            .into_response()
    }

    /// Consume the inbound byte stream line by line, spawning one dispatch
    /// per message without awaiting it, so results may complete out of
    /// order. The write side closes exactly once, on every exit path.
    async fn read_loop<S>(
        self: Arc<Self>,
        inbound: S,
        sender: FrameSender,
        registry: Option<Arc<ToolRegistry>>,
    ) where
        S: Stream<Item = Result<Bytes, axum::Error>> + Send,
    {
        let mut inbound = std::pin::pin!(inbound);
        let mut decoder = LineDecoder::new();
        let mut received_any = false;

        loop {
            match inbound.next().await {
                Some(Ok(chunk)) => {
                    received_any = true;
                    self.touch();
                    for message in decoder.push(&chunk) {
                        self.spawn_dispatch(message, sender.clone(), registry.clone());
                    }
                }
                Some(Err(e)) => {
                    tracing::debug!(session_id = %self.id, error = %e, "inbound stream error");
                    break;
                }
                None => break,
            }
        }

        if let Some(message) = decoder.finish() {
            self.spawn_dispatch(message, sender.clone(), registry.clone());
        }

        // A bodyless connect still gets a well-formed stream; close it after
        // a fixed idle window instead of hanging.
        if !received_any {
            tokio::time::sleep(self.config.empty_body_timeout).await;
        }

        sender.close().await;
        tracing::debug!(session_id = %self.id, "read loop finished");
    }

    fn spawn_dispatch(
        self: &Arc<Self>,
        message: serde_json::Value,
        sender: FrameSender,
        registry: Option<Arc<ToolRegistry>>,
    ) {
        let actor = Arc::clone(self);
        tokio::spawn(async move {
            actor.touch();
            if let Some(response) = actor.handle_message(message, registry).await {
                if !sender.send(&response) {
                    tracing::debug!(session_id = %actor.id, "result frame dropped");
                }
            }
        });
    }

    /// Route one protocol message. Returns None for notifications.
    async fn handle_message(
        &self,
        message: serde_json::Value,
        registry: Option<Arc<ToolRegistry>>,
    ) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "inbound message is not a valid request");
                return Some(JsonRpcResponse::error(None, JsonRpcError::invalid_request()));
            }
        };
        if request.is_notification() {
            return None;
        }

        let id = request.id;
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, rpc::initialize_result()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => {
                let tools = registry
                    .as_deref()
                    .map(ToolRegistry::definitions)
                    .unwrap_or_default();
                match serde_json::to_value(rpc::ListToolsResult { tools }) {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
                }
            }
            "tools/call" => self.handle_tool_call(id, request.params, registry).await,
            other => JsonRpcResponse::error(id, JsonRpcError::method_not_found(other)),
        };
        Some(response)
    }

    async fn handle_tool_call(
        &self,
        id: Option<serde_json::Value>,
        params: Option<serde_json::Value>,
        registry: Option<Arc<ToolRegistry>>,
    ) -> JsonRpcResponse {
        let params: CallToolParams =
            match serde_json::from_value(params.unwrap_or(serde_json::Value::Null)) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("invalid tools/call params: {e}")),
                    )
                }
            };

        let result = match registry {
            // Unauthenticated sessions fail the call but keep the stream open.
            None => CallToolResult::error(ToolError::NotInitialized.to_string()),
            Some(registry) => registry.dispatch(&params.name, params.arguments).await,
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(e.to_string())),
        }
    }

    /// Stop the read loop, if one is still running. Used by idle eviction;
    /// in-flight dispatches run to completion and their frames are dropped.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.read_task.take() {
            task.abort();
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (
        status,
        axum::Json(serde_json::json!({ "error": error, "message": message })),
    )
        .into_response()
}

/// All live session actors, addressed by identifier. Creation is idempotent
/// per id: addressing the same identifier twice returns the same actor.
pub struct SessionMap {
    sessions: DashMap<SessionId, Arc<SessionActor>>,
    config: SessionConfig,
    session_ttl: Duration,
}

impl SessionMap {
    pub fn new(config: SessionConfig, session_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            session_ttl,
        }
    }

    pub fn get_or_create(&self, id: &SessionId, ctx_key: Option<ApiKey>) -> Arc<SessionActor> {
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(SessionActor::new(id.clone(), self.config.clone(), ctx_key))
            })
            .clone()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Remove actors with no activity for longer than the session TTL.
    pub async fn sweep_idle(&self) -> usize {
        let ttl = self.session_ttl.as_secs();
        let expired: Vec<Arc<SessionActor>> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_secs() > ttl)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut removed = 0;
        for actor in expired {
            self.sessions.remove(actor.id());
            actor.shutdown().await;
            removed += 1;
            tracing::info!(session_id = %actor.id(), "evicted idle session");
        }
        removed
    }
}

/// Periodic idle-session sweep.
pub fn start_eviction_task(map: Arc<SessionMap>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = map.sweep_idle().await;
            if removed > 0 {
                tracing::info!(removed = removed, live = map.count(), "idle session sweep");
            }
        }
    })
}

//! Operational and transport HTTP surface (§4.7, §6, §10 A3).
//!
//! `GET /health` and `GET /stats` are plain `axum` handlers over the
//! supervisor's registry; `/haip/websocket`, `/haip/sse`, and `/haip/stream`
//! each stand up one of the three transport adapters and hand it off to a
//! freshly spawned session task.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Json, Router};
use dashmap::DashMap;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

use haip_auth::Authenticator;
use haip_session::ToolCatalog;
use haip_tools::Dispatcher;
use haip_transport::{ChunkedStreamTransport, SseTransport, Transport, WebSocketTransport};

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;
use crate::session_actor::{run_session, SessionParams};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: SessionRegistry,
    pub authenticator: Arc<dyn Authenticator>,
    pub catalog: Arc<dyn ToolCatalog>,
    pub dispatcher: Arc<Dispatcher>,
    sse_sessions: Arc<DashMap<String, Arc<SseTransport>>>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn ToolCatalog>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            authenticator,
            catalog,
            dispatcher,
            sse_sessions: Arc::new(DashMap::new()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/haip/websocket", get(websocket_upgrade))
        .route("/haip/sse", get(sse_connect).post(sse_inbound))
        .route("/haip/stream", post(chunked_stream))
        .with_state(state)
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn bearer_credential(headers: &HeaderMap, query: &TokenQuery) -> Option<String> {
    if let Some(token) = &query.token {
        return Some(token.clone());
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_connections: usize,
    total_connections: u64,
    errors: u64,
    warnings: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.registry.stats();
    Json(HealthResponse {
        status: "ok",
        uptime_secs: stats.uptime_secs,
        active_connections: stats.active_connections,
        total_connections: stats.total_connections,
        errors: stats.errors,
        warnings: stats.warnings,
    })
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.stats())
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(credential) = bearer_credential(&headers, &query) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = state.authenticator.authenticate(&credential).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if state.registry.active_connections() >= state.config.max_connections {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    ws.on_upgrade(move |socket| async move {
        let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(socket));
        spawn_session(state, principal, transport).await;
    })
}

/// Establishes the outbound SSE stream; the peer's inbound envelopes arrive
/// via separate POSTs to the same path, correlated by `token`.
async fn sse_connect(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(credential) = bearer_credential(&headers, &query) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = state.authenticator.authenticate(&credential).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if state.registry.active_connections() >= state.config.max_connections {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let sse_transport = Arc::new(SseTransport::new());
    state.sse_sessions.insert(credential.clone(), sse_transport.clone());

    let Some(outbound_rx) = sse_transport.take_outbound_stream() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let event_stream = ReceiverStream::new(outbound_rx).map(|frame| {
        let json = haip_wire::codec::encode(&frame.envelope).unwrap_or_default();
        Ok::<_, std::convert::Infallible>(Event::default().data(json))
    });

    let transport: Arc<dyn Transport> = sse_transport;
    let sse_sessions = state.sse_sessions.clone();
    tokio::spawn(async move {
        spawn_session(state, principal, transport).await;
        sse_sessions.remove(&credential);
    });

    Sse::new(event_stream)
        .keep_alive(axum::response::sse::KeepAlive::default())
        .into_response()
}

#[derive(Deserialize)]
struct SseInboundPayload {
    #[serde(flatten)]
    envelope: Option<serde_json::Value>,
    /// Present on a binary-carrying POST instead of an envelope.
    binary: Option<String>,
}

/// Handles the inbound half of the server-push stream transport: a
/// protocol-data POST carries the envelope as its JSON body; a
/// binary-carrying POST instead carries `{"binary": "<base64>"}`.
async fn sse_inbound(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let Some(credential) = bearer_credential(&headers, &query) else {
        return StatusCode::UNAUTHORIZED;
    };
    let Some(transport) = state.sse_sessions.get(&credential).map(|e| e.clone()) else {
        return StatusCode::NOT_FOUND;
    };

    let parsed: SseInboundPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(_) => return StatusCode::BAD_REQUEST,
    };

    let result = if let Some(binary) = parsed.binary {
        transport.push_binary(&binary).await
    } else if let Some(envelope_json) = parsed.envelope {
        match serde_json::from_value(envelope_json) {
            Ok(envelope) => transport.push_envelope(envelope).await,
            Err(_) => return StatusCode::BAD_REQUEST,
        }
    } else {
        return StatusCode::BAD_REQUEST;
    };

    match result {
        Ok(()) => StatusCode::ACCEPTED,
        Err(err) => {
            warn!(error = %err, "rejected SSE inbound request");
            StatusCode::BAD_REQUEST
        }
    }
}

/// The chunked streaming transport: one POST whose body is newline-delimited
/// envelope JSON, with the response the symmetric outbound stream.
async fn chunked_stream(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let Some(credential) = bearer_credential(&headers, &query) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let Some(principal) = state.authenticator.authenticate(&credential).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if state.registry.active_connections() >= state.config.max_connections {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let transport = Arc::new(ChunkedStreamTransport::new());

    let reader_transport = transport.clone();
    let mut body_stream = body.into_data_stream();
    tokio::spawn(async move {
        while let Some(chunk) = body_stream.next().await {
            match chunk {
                Ok(bytes) => {
                    if reader_transport.push_bytes(bytes).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let Some(outbound_rx) = transport.take_outbound_stream() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let line_stream = ReceiverStream::new(outbound_rx).map(|frame| {
        haip_transport::stream_post::encode_inline_frame(&frame)
            .map(|line| bytes::Bytes::from(format!("{line}\n")))
            .map_err(|_| std::io::Error::other("encode failure"))
    });

    let response_transport: Arc<dyn Transport> = transport;
    tokio::spawn(spawn_session(state, principal, response_transport));

    Response::builder()
        .status(StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(line_stream))
        .unwrap()
}

async fn spawn_session(state: AppState, principal: haip_auth::Principal, transport: Arc<dyn Transport>) {
    let session_id = Uuid::new_v4().to_string();
    let close_rx = state.registry.register(session_id.clone(), principal.id.clone());
    let params = SessionParams {
        session_id,
        config: state.config.engine.clone(),
        principal,
        catalog: state.catalog.clone(),
        transport,
        dispatcher: state.dispatcher.clone(),
        registry: state.registry.clone(),
    };
    run_session(params, close_rx).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-stream transport: requests arrive as HTTP posts, responses and
//! notifications leave as SSE `data:` lines. The first event on a stream is
//! `endpoint`, carrying the session-scoped post URL.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rpc::parse_request;
use crate::server::AcpServer;
use crate::transport::{auth, NotifyQueue};

/// Shared router state: the core plus each live stream's response channel.
pub struct SseState {
    server: Arc<AcpServer>,
    posts: tokio::sync::RwLock<HashMap<String, mpsc::Sender<Value>>>,
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    session: String,
}

/// Build the axum router for the event-stream transport.
pub fn build_router(server: Arc<AcpServer>) -> Router {
    let state = Arc::new(SseState { server, posts: tokio::sync::RwLock::new(HashMap::new()) });
    Router::new()
        .route("/events", get(events))
        .route("/rpc", post(rpc_post))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the router until shutdown.
pub async fn run(server: Arc<AcpServer>, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let shutdown = server.shutdown.clone();
    let router = build_router(server);
    tracing::info!(addr = ?listener.local_addr().ok(), "event-stream transport ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// `GET /events` — open a session-bearing SSE stream.
async fn events(State(state): State<Arc<SseState>>, headers: HeaderMap) -> Response {
    let expected = state.server.settings.auth_token.as_deref();
    // Early gate only; the session layer still requires initialize.
    if expected.is_some() && !auth::validate_bearer(&headers, expected) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let bearer = auth::bearer_token(&headers);
    let session = state.server.sessions.register(bearer).await;
    let queue = Arc::new(NotifyQueue::new(
        state.server.settings.max_pending_events,
        state.server.settings.slow_client_policy,
    ));
    session.attach_outbound(Arc::clone(&queue));

    let (resp_tx, mut resp_rx) = mpsc::channel::<Value>(64);
    state.posts.write().await.insert(session.id.clone(), resp_tx);

    let (event_tx, event_rx) = mpsc::channel::<Event>(64);
    let endpoint = Event::default().event("endpoint").data(format!("/rpc?session={}", session.id));
    if event_tx.send(endpoint).await.is_err() {
        state.server.teardown(&session).await;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    tracing::debug!(session = %session.id, "event stream opened");

    // Pump responses and notifications onto the stream. Ends when the
    // client goes away, the queue disconnects, or the session is cancelled.
    let pump_state = Arc::clone(&state);
    let pump_session = Arc::clone(&session);
    tokio::spawn(async move {
        loop {
            let value = tokio::select! {
                _ = pump_session.cancel.cancelled() => break,
                response = resp_rx.recv() => match response {
                    Some(v) => v,
                    None => break,
                },
                notification = queue.pop() => match notification {
                    Some(v) => v,
                    None => break,
                },
            };
            if event_tx.send(Event::default().data(value.to_string())).await.is_err() {
                break;
            }
        }
        pump_state.posts.write().await.remove(&pump_session.id);
        pump_state.server.teardown(&pump_session).await;
        tracing::debug!(session = %pump_session.id, "event stream closed");
    });

    let stream = ReceiverStream::new(event_rx).map(Ok::<Event, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// `POST /rpc?session=<id>` — accept a JSON-RPC request body. Always 202 for
/// a known session; the response arrives on the event stream.
async fn rpc_post(
    State(state): State<Arc<SseState>>,
    Query(query): Query<SessionQuery>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let expected = state.server.settings.auth_token.as_deref();
    if expected.is_some() && !auth::validate_bearer(&headers, expected) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Some(session) = state.server.sessions.get(&query.session).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(resp_tx) = state.posts.read().await.get(&query.session).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let server = Arc::clone(&state.server);
    tokio::spawn(async move {
        let reply = match parse_request(&body.to_string()) {
            Ok(req) => server.handle_request(&session, req).await,
            Err(e) => Some(crate::rpc::Response::err(None, e)),
        };
        if let Some(response) = reply {
            let value = serde_json::to_value(&response).unwrap_or(Value::Null);
            let _ = resp_tx.send(value).await;
        }
    });

    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;

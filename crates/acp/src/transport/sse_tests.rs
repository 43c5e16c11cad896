// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use clap::Parser;
use tower::util::ServiceExt;

use super::*;
use crate::config::Config;
use crate::test_support::{snapshot_of, spawn_ui};

fn server_with(extra: &[&str]) -> Arc<AcpServer> {
    let (bridge, _probe, _ui) = spawn_ui(snapshot_of(vec![]));
    let mut argv = vec!["fluffy-acp", "--port", "0"];
    argv.extend_from_slice(extra);
    AcpServer::new(&Config::parse_from(argv), bridge)
}

#[tokio::test]
async fn events_requires_bearer_when_token_configured() -> anyhow::Result<()> {
    let app = build_router(server_with(&["--auth-token", "secret123"]));

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/events").body(Body::empty())?)
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/events")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/events")
                .header("authorization", "Bearer secret123")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .starts_with("text/event-stream"));
    Ok(())
}

#[tokio::test]
async fn post_to_unknown_session_is_not_found() -> anyhow::Result<()> {
    let app = build_router(server_with(&[]));

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc?session=nope")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))?,
        )
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn events_without_token_is_open_when_auth_disabled() -> anyhow::Result<()> {
    let app = build_router(server_with(&[]));

    let resp = app
        .oneshot(Request::builder().uri("/events").body(Body::empty())?)
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    Ok(())
}

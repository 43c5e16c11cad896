// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};

use super::*;
use crate::config::Config;
use crate::rpc::{RequestId, RpcError};
use crate::snapshot::Snapshot;
use crate::test_support::{named_widget, snapshot_of, spawn_ui, AnyhowExt, UiProbe};
use crate::widget::Role;

fn test_config(extra: &[&str]) -> Config {
    let mut argv = vec!["fluffy-acp", "--pipe"];
    argv.extend_from_slice(extra);
    Config::parse_from(argv)
}

fn harness(initial: Snapshot, extra: &[&str]) -> (Arc<AcpServer>, UiProbe) {
    let (bridge, probe, _ui) = spawn_ui(initial);
    let server = AcpServer::new(&test_config(extra), bridge);
    (server, probe)
}

async fn call(
    server: &Arc<AcpServer>,
    session: &Arc<Session>,
    method: &str,
    params: Option<Value>,
) -> anyhow::Result<Response> {
    let req = Request {
        jsonrpc: "2.0".to_owned(),
        id: Some(RequestId::Num(1)),
        method: method.to_owned(),
        params,
    };
    server
        .handle_request(session, req)
        .await
        .ok_or_else(|| anyhow::anyhow!("expected a response for {method}"))
}

async fn call_tool(
    server: &Arc<AcpServer>,
    session: &Arc<Session>,
    name: &str,
    arguments: Value,
) -> anyhow::Result<Response> {
    call(server, session, "tools/call", Some(json!({ "name": name, "arguments": arguments })))
        .await
}

fn result_of(resp: Response) -> anyhow::Result<Value> {
    resp.result.ok_or_else(|| anyhow::anyhow!("expected result, got error: {:?}", resp.error))
}

fn error_of(resp: Response) -> anyhow::Result<RpcError> {
    resp.error.ok_or_else(|| anyhow::anyhow!("expected error, got result: {:?}", resp.result))
}

/// The envelope from a tools/call result, plus the error flag.
fn envelope_of(result: &Value) -> (&Value, bool) {
    (&result["structuredContent"], result["isError"].as_bool().unwrap_or(false))
}

fn save_buttons() -> Snapshot {
    let a = named_widget("layer0:button:0", Role::Button, "Save");
    let b = named_widget("layer0:button:1", Role::Button, "Save All");
    let c = named_widget("layer1:button:0", Role::Button, "Save");
    snapshot_of(vec![a, b, c])
}

#[tokio::test]
async fn initialize_reports_server_info() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let resp = call(
        &server,
        &session,
        "initialize",
        Some(json!({
            "protocolVersion": "2025-03-26",
            "clientInfo": { "name": "test-driver", "version": "1.0" },
            "capabilities": { "experimental": { "fluffy": { "schemaVersion": "fluffy-mcp/v1" } } },
        })),
    )
    .await?;
    let result = result_of(resp)?;
    assert_eq!(result["serverInfo"]["name"], "fluffyui");
    assert_eq!(result["capabilities"]["resources"]["subscribe"], true);
    Ok(())
}

#[tokio::test]
async fn tools_list_covers_the_catalog() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let result = result_of(call(&server, &session, "tools/list", None).await?)?;
    let tools = result["tools"].as_array().cloned().unwrap_or_default();
    assert!(tools.len() > 90, "catalog too small: {}", tools.len());

    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    for expected in [
        "snapshot",
        "find_by_label",
        "activate",
        "press_enter",
        "press_f12",
        "mouse_drag",
        "clipboard_read_primary",
        "wait_for_widget",
        "task_cancel",
        "diff",
    ] {
        assert!(names.contains(&expected), "missing tool {expected}");
    }
    Ok(())
}

#[tokio::test]
async fn ping_tool_round_trips_the_envelope() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let result = result_of(call_tool(&server, &session, "ping", json!({})).await?)?;
    let (envelope, is_error) = envelope_of(&result);
    assert!(!is_error);
    assert_eq!(envelope["_schema"], "fluffy-mcp/v1");
    assert_eq!(envelope["_tool"], "ping");
    assert_eq!(envelope["data"]["status"], "ok");
    assert!(envelope.get("error").is_none());

    // Textual and structured content carry the same envelope.
    let text = result["content"][0]["text"].as_str().unwrap_or_default();
    let parsed: Value = serde_json::from_str(text)?;
    assert_eq!(&parsed, envelope);
    Ok(())
}

#[tokio::test]
async fn ambiguous_label_resolves_to_top_layer() -> anyhow::Result<()> {
    let (server, _probe) = harness(save_buttons(), &[]);
    let session = server.sessions.register(None).await;

    let result =
        result_of(call_tool(&server, &session, "activate", json!({ "label": "Save" })).await?)?;
    let (envelope, is_error) = envelope_of(&result);
    assert!(!is_error);
    let data = &envelope["data"];
    assert_eq!(data["status"], "ambiguous");
    assert_eq!(data["resolution_reason"], "topmost_layer");
    assert_eq!(data["widget_id"], "layer1:button:0");
    assert_eq!(data["matches"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn rate_limit_kicks_in_on_the_third_ping() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &["--rate-limit", "2", "--rate-burst", "2"]);
    let session = server.sessions.register(None).await;

    result_of(call(&server, &session, "ping", None).await?)?;
    result_of(call(&server, &session, "ping", None).await?)?;

    let err = error_of(call(&server, &session, "ping", None).await?)?;
    assert_eq!(err.code, -32003);
    let data = err.data.unwrap_or_default();
    assert!(data["retry_after_ms"].as_u64().unwrap_or(0) > 0);
    assert_eq!(data["limit"], 2);
    assert_eq!(data["window_ms"], 1000);
    Ok(())
}

#[tokio::test]
async fn auth_gate_requires_initialize_with_token() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &["--auth-token", "secret123"]);
    let session = server.sessions.register(None).await;

    // Tool call before initialize.
    let err = error_of(call_tool(&server, &session, "snapshot", json!({})).await?)?;
    assert_eq!(err.code, -32001);

    // Initialize with the wrong token.
    let err = error_of(
        call(&server, &session, "initialize", Some(json!({ "auth": { "token": "wrong" } })))
            .await?,
    )?;
    assert_eq!(err.code, -32001);

    // Correct token unlocks the session.
    result_of(
        call(&server, &session, "initialize", Some(json!({ "auth": { "token": "secret123" } })))
            .await?,
    )?;
    result_of(call_tool(&server, &session, "snapshot", json!({})).await?)?;
    Ok(())
}

#[tokio::test]
async fn capacity_rejection_is_sticky() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &["--max-sessions", "1"]);
    let _first = server.sessions.register(None).await;
    let second = server.sessions.register(None).await;

    let err = error_of(call(&server, &second, "ping", None).await?)?;
    assert_eq!(err.code, -32002);
    let err = error_of(call(&server, &second, "initialize", None).await?)?;
    assert_eq!(err.code, -32002);
    Ok(())
}

#[tokio::test]
async fn check_is_idempotent_and_injects_nothing() -> anyhow::Result<()> {
    let mut notify = named_widget("layer0:checkbox:0", Role::Checkbox, "Notify");
    notify.state.checked = Some(true);
    let (server, probe) = harness(snapshot_of(vec![notify]), &[]);
    let session = server.sessions.register(None).await;

    for _ in 0..2 {
        let result =
            result_of(call_tool(&server, &session, "check", json!({ "label": "Notify" })).await?)?;
        let (envelope, is_error) = envelope_of(&result);
        assert!(!is_error);
        assert_eq!(envelope["data"]["status"], "ok");
        assert_eq!(envelope["data"]["widget_id"], "layer0:checkbox:0");
    }
    {
        let script = probe.lock();
        assert!(script.keys.is_empty(), "idempotent check must not inject keys");
        let checked =
            script.snapshot.widget("layer0:checkbox:0").and_then(|w| w.state.checked);
        assert_eq!(checked, Some(true));
    }

    // Uncheck flips the state with exactly one key press.
    let result =
        result_of(call_tool(&server, &session, "uncheck", json!({ "label": "Notify" })).await?)?;
    let (envelope, _) = envelope_of(&result);
    assert_eq!(envelope["data"]["status"], "ok");
    let script = probe.lock();
    assert_eq!(script.keys.len(), 1);
    let checked = script.snapshot.widget("layer0:checkbox:0").and_then(|w| w.state.checked);
    assert_eq!(checked, Some(false));
    Ok(())
}

#[tokio::test]
async fn envelope_error_for_unsupported_primary_selection() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let result =
        result_of(call_tool(&server, &session, "clipboard_read_primary", json!({})).await?)?;
    let (envelope, is_error) = envelope_of(&result);
    assert!(is_error);
    assert!(envelope["error"].as_str().unwrap_or_default().contains("not supported"));
    assert!(envelope.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn bad_arguments_map_to_invalid_params() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let err = error_of(call_tool(&server, &session, "get_cell", json!({ "x": "nope" })).await?)?;
    assert_eq!(err.code, -32602);

    let err = error_of(call_tool(&server, &session, "no_such_tool", json!({})).await?)?;
    assert_eq!(err.code, -32602);

    let err = error_of(call(&server, &session, "bogus/method", None).await?)?;
    assert_eq!(err.code, -32601);
    Ok(())
}

#[tokio::test]
async fn subscriptions_gate_on_capabilities() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &["--text-access", "false"]);
    let session = server.sessions.register(None).await;

    let err = error_of(
        call(
            &server,
            &session,
            "resources/subscribe",
            Some(json!({ "uri": "fluffy://screen" })),
        )
        .await?,
    )?;
    assert_eq!(err.code, -32004);
    let data = err.data.unwrap_or_default();
    assert!(data["reason"].as_str().unwrap_or_default().contains("text access"));
    assert!(data["hint"].as_str().is_some());

    // Ungated resources subscribe fine, and repeats are idempotent.
    for _ in 0..2 {
        result_of(
            call(
                &server,
                &session,
                "resources/subscribe",
                Some(json!({ "uri": "fluffy://widgets" })),
            )
            .await?,
        )?;
    }
    assert_eq!(session.subscriptions().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn resources_read_returns_contents() -> anyhow::Result<()> {
    let initial = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "Save")]);
    let (server, _probe) = harness(initial, &[]);
    let session = server.sessions.register(None).await;

    let result = result_of(
        call(&server, &session, "resources/read", Some(json!({ "uri": "fluffy://widgets" })))
            .await?,
    )?;
    assert_eq!(result["contents"][0]["uri"], "fluffy://widgets");
    assert_eq!(result["contents"][0]["mime_type"], "application/json");

    let err = error_of(
        call(&server, &session, "resources/read", Some(json!({ "uri": "fluffy://bogus" })))
            .await?,
    )?;
    assert_eq!(err.code, -32602);
    Ok(())
}

#[tokio::test]
async fn async_tools_are_gated_and_tracked() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;

    let err = error_of(
        call_tool(
            &server,
            &session,
            "wait_for_widget",
            json!({ "label": "Done", "async": true }),
        )
        .await?,
    )?;
    assert_eq!(err.code, -32007);

    let (server, _probe) = harness(snapshot_of(vec![]), &["--async-tools"]);
    let session = server.sessions.register(None).await;
    let result = result_of(
        call_tool(
            &server,
            &session,
            "wait_for_widget",
            json!({ "label": "Done", "async": true, "timeout_ms": 300 }),
        )
        .await?,
    )?;
    let (envelope, _) = envelope_of(&result);
    let task_id = envelope["data"]["task_id"].as_u64().unwrap_or(0);
    assert!(task_id > 0);

    let result =
        result_of(call_tool(&server, &session, "task_status", json!({ "id": task_id })).await?)?;
    let (envelope, _) = envelope_of(&result);
    let status = envelope["data"]["task"]["status"].as_str().unwrap_or_default().to_owned();
    assert!(
        ["pending", "running", "failed"].contains(&status.as_str()),
        "unexpected status {status}"
    );
    Ok(())
}

#[tokio::test]
async fn type_into_reaches_the_input() -> anyhow::Result<()> {
    let initial = snapshot_of(vec![named_widget("layer0:input:0", Role::Input, "Name")]);
    let (server, probe) = harness(initial, &[]);
    let session = server.sessions.register(None).await;

    let result = result_of(
        call_tool(&server, &session, "type_into", json!({ "label": "Name", "text": "ada" }))
            .await?,
    )?;
    let (envelope, is_error) = envelope_of(&result);
    assert!(!is_error);
    assert_eq!(envelope["data"]["widget_id"], "layer0:input:0");

    let script = probe.lock();
    let value = script.snapshot.widget("layer0:input:0").map(|w| w.value.clone());
    assert_eq!(value.as_deref(), Some("ada"));
    Ok(())
}

#[tokio::test]
async fn teardown_unregisters_and_cancels() -> anyhow::Result<()> {
    let (server, _probe) = harness(snapshot_of(vec![]), &[]);
    let session = server.sessions.register(None).await;
    assert_eq!(server.sessions.count().await, 1);

    let work: crate::tasks::TaskFn = Box::new(|token, _handle| {
        Box::pin(async move {
            token.cancelled().await;
            Ok(())
        })
    });
    let task = server.tasks.submit(&session.id, "hang", "", work).await.anyhow()?;

    server.teardown(&session).await;
    assert_eq!(server.sessions.count().await, 0);
    assert!(session.cancel.is_cancelled());
    assert!(
        server.tasks.get(task.id).await.is_none(),
        "teardown drops the session's task records"
    );
    Ok(())
}

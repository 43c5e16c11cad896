// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::{json, Value};

use super::*;
use crate::config::Config;
use crate::diff::diff_snapshots;
use crate::rpc::{Request, RequestId};
use crate::test_support::{named_widget, snapshot_of, spawn_ui, UiProbe};
use crate::transport::{NotifyQueue, SlowClientPolicy};
use crate::widget::Role;

fn harness(initial: Snapshot) -> (Arc<AcpServer>, UiProbe) {
    let (bridge, probe, _ui) = spawn_ui(initial);
    let config =
        Config::parse_from(["fluffy-acp", "--pipe", "--watch-interval-ms", "10"]);
    (AcpServer::new(&config, bridge), probe)
}

async fn subscribed_session(
    server: &Arc<AcpServer>,
    uris: &[&str],
) -> (Arc<Session>, Arc<NotifyQueue>) {
    let session = server.sessions.register(None).await;
    let queue = Arc::new(NotifyQueue::new(32, SlowClientPolicy::DropOldest));
    session.attach_outbound(Arc::clone(&queue));
    for uri in uris {
        session.subscribe(uri).await;
    }
    (session, queue)
}

async fn drain(queue: &NotifyQueue, window: Duration) -> Vec<Value> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        match tokio::time::timeout(deadline - now, queue.pop()).await {
            Ok(Some(value)) => out.push(value),
            _ => break,
        }
    }
    out
}

fn uris_of(notes: &[Value]) -> Vec<String> {
    notes
        .iter()
        .filter_map(|n| n["params"]["uri"].as_str().map(str::to_owned))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn focus_change_notifies_focused_subscriber_once() -> anyhow::Result<()> {
    let a = named_widget("layer0:button:0", Role::Button, "Alpha");
    let b = named_widget("layer0:button:1", Role::Button, "Beta");
    let (server, _probe) = harness(snapshot_of(vec![a, b]));
    let (session, queue) = subscribed_session(&server, &["fluffy://focused"]).await;

    // Let the watcher capture its baseline before anything changes.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(drain(&queue, Duration::from_millis(30)).await.is_empty());

    let req = Request {
        jsonrpc: "2.0".to_owned(),
        id: Some(RequestId::Num(1)),
        method: "tools/call".to_owned(),
        params: Some(json!({ "name": "focus", "arguments": { "label": "Beta" } })),
    };
    let resp = server
        .handle_request(&session, req)
        .await
        .ok_or_else(|| anyhow::anyhow!("no response"))?;
    assert!(resp.error.is_none(), "focus failed: {:?}", resp.error);

    let notes = drain(&queue, Duration::from_millis(200)).await;
    let focused: Vec<_> =
        uris_of(&notes).into_iter().filter(|u| u == "fluffy://focused").collect();
    assert_eq!(focused.len(), 1, "expected exactly one focused update, got {notes:?}");
    for note in &notes {
        assert_eq!(note["method"], "resources/updated");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn widget_id_regeneration_emits_rebind_notice() -> anyhow::Result<()> {
    let submit = named_widget("layer0:button:0:submit", Role::Button, "Submit");
    let (server, probe) = harness(snapshot_of(vec![submit]));
    let (_session, queue) = subscribed_session(&server, &["fluffy://widget/submit"]).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(drain(&queue, Duration::from_millis(30)).await.is_empty());

    // The UI regenerates ids; the same explicit base lands on a new id.
    let regenerated = snapshot_of(vec![named_widget(
        "layer0:button:1:submit#2",
        Role::Button,
        "Submit",
    )]);
    probe.lock().queued.push_back(regenerated);

    let notes = drain(&queue, Duration::from_millis(200)).await;
    let rebind = notes
        .iter()
        .find(|n| n["params"]["reason"] == "widget_id_changed")
        .ok_or_else(|| anyhow::anyhow!("no rebind notification in {notes:?}"))?;
    assert_eq!(rebind["params"]["uri"], "fluffy://widget/submit");
    assert_eq!(rebind["params"]["new_uri"], "fluffy://widget/layer0:button:1:submit#2");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clipboard_subscriber_sees_writes() -> anyhow::Result<()> {
    let (server, probe) = harness(snapshot_of(vec![]));
    let (_session, queue) = subscribed_session(&server, &["fluffy://clipboard"]).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    let _ = drain(&queue, Duration::from_millis(30)).await;

    probe.lock().clipboard = "fresh paste".to_owned();

    let notes = drain(&queue, Duration::from_millis(200)).await;
    assert!(
        uris_of(&notes).iter().any(|u| u == "fluffy://clipboard"),
        "expected clipboard update in {notes:?}"
    );
    Ok(())
}

// -- Per-URI predicate unit tests ---------------------------------------------

fn eval(
    uri: &str,
    before: &Snapshot,
    after: &Snapshot,
    clipboard_changed: bool,
) -> Option<Value> {
    let parsed = ResourceUri::parse(uri).ok()?;
    let diff = diff_snapshots(before, after);
    evaluate(&parsed, &diff, before, after, clipboard_changed)
}

#[test]
fn screen_predicate_tracks_text_only() {
    let mut before = snapshot_of(vec![]);
    before.text = Some("a".into());
    let mut after = before.clone();

    assert!(eval("fluffy://screen", &before, &after, false).is_none());
    after.text = Some("b".into());
    assert!(eval("fluffy://screen", &before, &after, false).is_some());
}

#[test]
fn widgets_predicate_ignores_pure_text_change() {
    let mut before = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "A")]);
    before.text = Some("a".into());
    let mut after = before.clone();
    after.text = Some("b".into());

    assert!(eval("fluffy://widgets", &before, &after, false).is_none());

    after.widgets[0].label = "B".into();
    assert!(eval("fluffy://widgets", &before, &after, false).is_some());
}

#[test]
fn dimensions_predicate() {
    let before = snapshot_of(vec![]);
    let mut after = before.clone();
    assert!(eval("fluffy://dimensions", &before, &after, false).is_none());

    after.dimensions = crate::snapshot::Dimensions { width: 132, height: 43 };
    assert!(eval("fluffy://dimensions", &before, &after, false).is_some());
}

#[test]
fn layer_predicate_scopes_to_its_layer() {
    let before = snapshot_of(vec![
        named_widget("layer0:button:0", Role::Button, "A"),
        named_widget("layer1:button:0", Role::Button, "B"),
    ]);
    let mut after = before.clone();
    after.widgets[1].label = "B2".into();

    assert!(eval("fluffy://layer/0", &before, &after, false).is_none());
    assert!(eval("fluffy://layer/1", &before, &after, false).is_some());
}

#[test]
fn widget_value_predicate_needs_value_change() {
    let mut input = named_widget("layer0:input:0", Role::Input, "Name");
    input.value = "a".into();
    let before = snapshot_of(vec![input]);
    let mut after = before.clone();

    // Label-only change: the value sub-resource stays quiet.
    after.widgets[0].label = "Full Name".into();
    assert!(eval("fluffy://widget/layer0:input:0/value", &before, &after, false).is_none());
    assert!(eval("fluffy://widget/layer0:input:0", &before, &after, false).is_some());

    after.widgets[0].value = "b".into();
    assert!(eval("fluffy://widget/layer0:input:0/value", &before, &after, false).is_some());
}

#[test]
fn widget_children_predicate() {
    let mut list = named_widget("layer0:list:0", Role::List, "Items");
    list.children_ids = vec!["layer0:listitem:0".into()];
    let item = named_widget("layer0:listitem:0", Role::ListItem, "One");
    let before = snapshot_of(vec![list, item]);

    let mut after = before.clone();
    after.widgets[0].children_ids.push("layer0:listitem:1".into());
    after.widgets.push(named_widget("layer0:listitem:1", Role::ListItem, "Two"));

    assert!(eval("fluffy://widget/layer0:list:0/children", &before, &after, false).is_some());
}

#[test]
fn clipboard_predicate_uses_the_flag() {
    let before = snapshot_of(vec![]);
    let after = before.clone();
    assert!(eval("fluffy://clipboard", &before, &after, false).is_none());
    assert!(eval("fluffy://clipboard", &before, &after, true).is_some());
}

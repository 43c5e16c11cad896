// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_support::{child_widget, named_widget, snapshot_of, spawn_ui, AnyhowExt};
use crate::widget::Role;

#[yare::parameterized(
    screen     = { "fluffy://screen", ResourceUri::Screen },
    widgets    = { "fluffy://widgets", ResourceUri::Widgets },
    focused    = { "fluffy://focused", ResourceUri::Focused },
    clipboard  = { "fluffy://clipboard", ResourceUri::Clipboard },
    dimensions = { "fluffy://dimensions", ResourceUri::Dimensions },
)]
fn fixed_uri_parse(raw: &str, expected: ResourceUri) -> anyhow::Result<()> {
    let parsed = ResourceUri::parse(raw).anyhow()?;
    assert_eq!(parsed, expected);
    assert_eq!(parsed.to_string(), raw);
    Ok(())
}

#[test]
fn templated_uri_parse() -> anyhow::Result<()> {
    let parsed = ResourceUri::parse("fluffy://widget/layer0:button:0").anyhow()?;
    assert_eq!(parsed, ResourceUri::Widget { id: "layer0:button:0".into(), sub: None });

    let parsed = ResourceUri::parse("fluffy://widget/submit/value").anyhow()?;
    assert_eq!(parsed, ResourceUri::Widget { id: "submit".into(), sub: Some(WidgetSub::Value) });

    let parsed = ResourceUri::parse("fluffy://layer/2").anyhow()?;
    assert_eq!(parsed, ResourceUri::Layer { index: 2 });
    Ok(())
}

#[yare::parameterized(
    wrong_scheme = { "http://widgets" },
    bad_kind     = { "fluffy://gadgets" },
    missing_id   = { "fluffy://widget" },
    bad_sub      = { "fluffy://widget/x/color" },
    bad_layer    = { "fluffy://layer/two" },
)]
fn invalid_uris_rejected(raw: &str) {
    assert!(ResourceUri::parse(raw).is_err(), "expected {raw:?} to fail");
}

fn caps(text: bool, clipboard: bool) -> crate::config::Capabilities {
    crate::config::Capabilities { text_access: text, clipboard_access: clipboard }
}

#[test]
fn gated_uris_respect_capabilities() {
    assert!(check_access(&ResourceUri::Screen, &caps(false, true)).is_err());
    assert!(check_access(&ResourceUri::Screen, &caps(true, true)).is_ok());
    assert!(check_access(&ResourceUri::Clipboard, &caps(true, false)).is_err());
    assert!(check_access(&ResourceUri::Widgets, &caps(false, false)).is_ok());
}

#[tokio::test]
async fn read_screen_returns_plain_text() -> anyhow::Result<()> {
    let (bridge, probe, _ui) = spawn_ui(snapshot_of(vec![]));
    probe.lock().text = "hello screen".to_owned();
    let cancel = CancellationToken::new();

    let content = read(&bridge, &caps(true, true), &cancel, &ResourceUri::Screen)
        .await
        .anyhow()?;
    assert_eq!(content.mime_type, "text/plain");
    assert_eq!(content.text, "hello screen");
    Ok(())
}

#[tokio::test]
async fn read_widgets_returns_snapshot_json() -> anyhow::Result<()> {
    let initial = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "Save")]);
    let (bridge, _probe, _ui) = spawn_ui(initial);
    let cancel = CancellationToken::new();

    let content = read(&bridge, &caps(true, true), &cancel, &ResourceUri::Widgets)
        .await
        .anyhow()?;
    assert_eq!(content.mime_type, "application/json");
    let value: serde_json::Value = serde_json::from_str(&content.text)?;
    assert_eq!(value["widgets"][0]["id"], "layer0:button:0");
    Ok(())
}

#[tokio::test]
async fn read_widget_value_and_children() -> anyhow::Result<()> {
    let mut list = named_widget("layer0:list:0", Role::List, "Options");
    list.children_ids = vec!["layer0:listitem:0".into()];
    let mut item = child_widget("layer0:listitem:0", Role::ListItem, "One", "layer0:list:0");
    item.value = "one".to_owned();
    let (bridge, _probe, _ui) = spawn_ui(snapshot_of(vec![list, item]));
    let cancel = CancellationToken::new();

    let uri = ResourceUri::Widget { id: "layer0:listitem:0".into(), sub: Some(WidgetSub::Value) };
    let content = read(&bridge, &caps(true, true), &cancel, &uri)
        .await
        .anyhow()?;
    assert_eq!(content.text, "one");

    let uri = ResourceUri::Widget { id: "layer0:list:0".into(), sub: Some(WidgetSub::Children) };
    let content = read(&bridge, &caps(true, true), &cancel, &uri)
        .await
        .anyhow()?;
    let value: serde_json::Value = serde_json::from_str(&content.text)?;
    assert_eq!(value[0]["id"], "layer0:listitem:0");
    Ok(())
}

#[tokio::test]
async fn read_unknown_widget_is_not_found() {
    let (bridge, _probe, _ui) = spawn_ui(snapshot_of(vec![]));
    let cancel = CancellationToken::new();

    let uri = ResourceUri::Widget { id: "missing".into(), sub: None };
    let err = read(&bridge, &caps(true, true), &cancel, &uri).await.err();
    assert_eq!(err, Some(ReadError::NotFound("widget missing".into())));
}

#[tokio::test]
async fn read_denied_without_capability() {
    let (bridge, _probe, _ui) = spawn_ui(snapshot_of(vec![]));
    let cancel = CancellationToken::new();

    let err = read(&bridge, &caps(false, true), &cancel, &ResourceUri::Screen).await.err();
    match err {
        Some(ReadError::Denied { reason, .. }) => assert!(reason.contains("text access")),
        other => assert!(other.is_some(), "expected denial, got {other:?}"),
    }
}

#[test]
fn catalog_lists_fixed_and_templated_endpoints() {
    let fixed = list_resources();
    assert_eq!(fixed.len(), 5);
    assert!(fixed.iter().any(|r| r.uri == "fluffy://screen"));

    let templates = list_templates();
    assert_eq!(templates.len(), 4);
    assert!(templates.iter().any(|t| t.uri_template == "fluffy://widget/{id}/children"));
}

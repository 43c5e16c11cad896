// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic actions: resolve a target, focus it if needed, inject the
//! minimum input that effects the verb, advance one frame.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::keys::{KeyCode, KeyEvent, MouseButton, MouseEvent};
use crate::resolve::{resolve_label, LabelQuery, MatchInfo, ResolutionReason};
use crate::snapshot::Snapshot;
use crate::widget::{Role, Widget};

use super::{capture, decode, def, ToolCtx, ToolError, ToolRegistry};

/// Target selector shared by all semantic actions: an id (full or explicit
/// base) or a label query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetArgs {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub layer: Option<u32>,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Deserialize)]
struct TypeArgs {
    #[serde(flatten)]
    target: TargetArgs,
    text: String,
}

#[derive(Debug, Deserialize)]
struct SelectOptionArgs {
    #[serde(flatten)]
    target: TargetArgs,
    option: String,
}

#[derive(Debug, Deserialize)]
struct SelectIndexArgs {
    #[serde(flatten)]
    target: TargetArgs,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ScrollByArgs {
    #[serde(flatten)]
    target: TargetArgs,
    #[serde(default)]
    dx: i32,
    #[serde(default)]
    dy: i32,
}

#[derive(Debug, Deserialize)]
struct ClickArgs {
    #[serde(flatten)]
    target: TargetArgs,
    #[serde(default)]
    button: Option<String>,
}

/// A resolved action target plus how it was chosen.
pub struct Resolved {
    pub widget: Widget,
    pub ambiguous: bool,
    pub reason: Option<ResolutionReason>,
    pub matches: Vec<MatchInfo>,
}

/// Resolve a target selector against a snapshot.
pub fn resolve_target(snapshot: &Snapshot, args: &TargetArgs) -> Result<Resolved, ToolError> {
    if let Some(ref id) = args.id {
        let widget = snapshot
            .resolve_id(id)
            .ok_or_else(|| ToolError::Failed(format!("widget not found: {id}")))?;
        return Ok(Resolved {
            widget: widget.clone(),
            ambiguous: false,
            reason: None,
            matches: Vec::new(),
        });
    }
    let label = args
        .label
        .as_deref()
        .ok_or_else(|| ToolError::InvalidArgs("either id or label is required".to_owned()))?;
    let query = LabelQuery { label, index: args.index, layer: args.layer, strict: args.strict };
    let resolution = resolve_label(snapshot, &query)?;
    Ok(Resolved {
        widget: resolution.widget.clone(),
        ambiguous: resolution.ambiguous,
        reason: Some(resolution.reason),
        matches: resolution.matches,
    })
}

/// Build the uniform action result payload.
fn action_result(resolved: &Resolved) -> Value {
    let mut out = json!({
        "status": if resolved.ambiguous { "ambiguous" } else { "ok" },
        "widget_id": resolved.widget.id,
        "resolved_to": resolved.widget.label,
    });
    if let Some(map) = out.as_object_mut() {
        if let Some(reason) = resolved.reason {
            if resolved.matches.len() > 1 {
                map.insert("resolution_reason".to_owned(), json!(reason.as_str()));
            }
        }
        if resolved.matches.len() > 1 {
            map.insert("matches".to_owned(), json!(resolved.matches));
        }
    }
    out
}

async fn ensure_focused(
    ctx: &ToolCtx<'_>,
    snapshot: &Snapshot,
    widget: &Widget,
) -> Result<(), ToolError> {
    if snapshot.focused_id.as_deref() != Some(widget.id.as_str()) {
        ctx.bridge.focus_by_id(ctx.cancel, &widget.id).await?;
    }
    Ok(())
}

fn require_enabled(widget: &Widget) -> Result<(), ToolError> {
    if widget.state.disabled {
        return Err(ToolError::Failed(format!("widget is disabled: {}", widget.id)));
    }
    Ok(())
}

/// Handler for every action that needs only a target and fixed keys.
fn semantic<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TargetArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args)?;
        let widget = &resolved.widget;
        require_enabled(widget)?;

        match ctx.tool {
            "focus" => {
                if snapshot.focused_id.as_deref() != Some(widget.id.as_str()) {
                    ctx.bridge.focus_by_id(ctx.cancel, &widget.id).await?;
                }
            }
            "activate" => {
                ensure_focused(ctx, &snapshot, widget).await?;
                let key = match widget.role {
                    Role::Checkbox | Role::Radio => KeyEvent::new(KeyCode::Char(' ')),
                    _ => KeyEvent::new(KeyCode::Enter),
                };
                ctx.bridge.send_key(ctx.cancel, key).await?;
            }
            "toggle" => {
                ensure_focused(ctx, &snapshot, widget).await?;
                ctx.bridge.send_key(ctx.cancel, KeyEvent::new(KeyCode::Char(' '))).await?;
            }
            "check" | "uncheck" => {
                let wanted = ctx.tool == "check";
                let current = widget.state.checked.ok_or_else(|| {
                    ToolError::Failed(format!("widget is not checkable: {}", widget.id))
                })?;
                ensure_focused(ctx, &snapshot, widget).await?;
                // Already in the wanted state: inject nothing.
                if current != wanted {
                    ctx.bridge.send_key(ctx.cancel, KeyEvent::new(KeyCode::Char(' '))).await?;
                }
            }
            "expand" | "collapse" => {
                let wanted = ctx.tool == "expand";
                let current = widget.state.expanded.ok_or_else(|| {
                    ToolError::Failed(format!("widget is not expandable: {}", widget.id))
                })?;
                ensure_focused(ctx, &snapshot, widget).await?;
                if current != wanted {
                    let key = if wanted { KeyCode::Right } else { KeyCode::Left };
                    ctx.bridge.send_key(ctx.cancel, KeyEvent::new(key)).await?;
                }
            }
            "clear" => {
                ensure_focused(ctx, &snapshot, widget).await?;
                ctx.bridge
                    .send_keys(
                        ctx.cancel,
                        [KeyEvent::ctrl('a'), KeyEvent::new(KeyCode::Backspace)],
                    )
                    .await?;
            }
            "scroll_to" => {
                // Focusing brings the widget into view.
                ensure_focused(ctx, &snapshot, widget).await?;
            }
            "scroll_to_top" | "scroll_to_bottom" => {
                if !widget.supports_action("scroll") {
                    return Err(ToolError::Failed(format!(
                        "widget not scrollable: {}",
                        widget.id
                    )));
                }
                ensure_focused(ctx, &snapshot, widget).await?;
                let key =
                    if ctx.tool == "scroll_to_top" { KeyCode::Home } else { KeyCode::End };
                ctx.bridge.send_key(ctx.cancel, KeyEvent::new(key)).await?;
            }
            _ => return Err(ToolError::Failed(format!("unhandled action: {}", ctx.tool))),
        }
        Ok(action_result(&resolved))
    })
}

fn blur<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        ctx.bridge.clear_focus(ctx.cancel).await?;
        Ok(json!({ "status": "ok" }))
    })
}

fn type_into<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TypeArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args.target)?;
        require_enabled(&resolved.widget)?;
        if resolved.widget.state.readonly {
            return Err(ToolError::Failed(format!("widget is readonly: {}", resolved.widget.id)));
        }
        ensure_focused(ctx, &snapshot, &resolved.widget).await?;
        let keys = args.text.chars().map(|c| KeyEvent::new(KeyCode::Char(c)));
        ctx.bridge.send_keys(ctx.cancel, keys).await?;
        Ok(action_result(&resolved))
    })
}

fn select_option<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: SelectOptionArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args.target)?;
        require_enabled(&resolved.widget)?;
        ensure_focused(ctx, &snapshot, &resolved.widget).await?;
        ctx.bridge.select_by_id(ctx.cancel, &resolved.widget.id, &args.option).await?;
        Ok(action_result(&resolved))
    })
}

fn select_index<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: SelectIndexArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args.target)?;
        require_enabled(&resolved.widget)?;

        let children = snapshot.children_of(&resolved.widget.id);
        let child = children.get(args.index).ok_or_else(|| {
            ToolError::Failed(format!(
                "index {} out of range for {} options",
                args.index,
                children.len()
            ))
        })?;
        let option = if child.label.is_empty() { child.value.clone() } else { child.label.clone() };
        ensure_focused(ctx, &snapshot, &resolved.widget).await?;
        ctx.bridge.select_by_id(ctx.cancel, &resolved.widget.id, &option).await?;
        Ok(action_result(&resolved))
    })
}

fn scroll_by<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ScrollByArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args.target)?;
        if !resolved.widget.supports_action("scroll") {
            return Err(ToolError::Failed(format!(
                "widget not scrollable: {}",
                resolved.widget.id
            )));
        }
        let (cx, cy) = resolved.widget.bounds.center();
        let delta = if args.dy != 0 { args.dy } else { args.dx };
        ctx.bridge
            .send_mouse(
                ctx.cancel,
                MouseEvent::scroll(cx.max(0) as u16, cy.max(0) as u16, delta),
            )
            .await?;
        Ok(action_result(&resolved))
    })
}

fn click_widget<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ClickArgs = decode(args)?;
        let snapshot = capture(ctx).await?;
        let resolved = resolve_target(&snapshot, &args.target)?;
        require_enabled(&resolved.widget)?;

        let button = match args.button.as_deref() {
            None => MouseButton::Left,
            Some(name) => MouseButton::parse(name)
                .ok_or_else(|| ToolError::InvalidArgs(format!("unknown button: {name}")))?,
        };
        let (cx, cy) = resolved.widget.bounds.center();
        let (x, y) = (cx.max(0) as u16, cy.max(0) as u16);
        ctx.bridge.send_mouse(ctx.cancel, MouseEvent::press(x, y, button)).await?;
        ctx.bridge.send_mouse(ctx.cancel, MouseEvent::release(x, y, button)).await?;
        Ok(action_result(&resolved))
    })
}

pub fn register(registry: &mut ToolRegistry) {
    for (name, description) in [
        ("activate", "Activate a widget (press/enter)"),
        ("focus", "Move focus to a widget"),
        ("toggle", "Toggle a checkbox or radio"),
        ("check", "Ensure a checkbox is checked"),
        ("uncheck", "Ensure a checkbox is unchecked"),
        ("expand", "Expand a tree node"),
        ("collapse", "Collapse a tree node"),
        ("clear", "Clear an input's value"),
        ("scroll_to", "Scroll a widget into view"),
        ("scroll_to_top", "Scroll a widget to its top"),
        ("scroll_to_bottom", "Scroll a widget to its bottom"),
    ] {
        registry.register(def(name, description, "target_args", semantic));
    }
    registry.register(def("blur", "Clear focus", "empty_args", blur));
    registry.register(def("type_into", "Type text into a widget", "type_args", type_into));
    registry.register(def("select_option", "Select a named option", "select_option_args", select_option));
    registry.register(def("select_index", "Select an option by index", "select_index_args", select_index));
    registry.register(def("scroll_by", "Scroll a widget by a delta", "scroll_by_args", scroll_by));
    registry.register(def("click_widget", "Click a widget's center", "click_args", click_widget));
}

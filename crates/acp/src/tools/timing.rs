// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cursor, timing/sync, resize, diff, and meta tools.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::diff::diff_snapshots;
use crate::keys::{parse_key, KeyEvent};
use crate::queue::Priority;
use crate::rpc::{PROTOCOL_VERSION, SCHEMA_VERSION};
use crate::snapshot::Snapshot;
use crate::tasks::TaskFn;

use super::{capture, decode, def, require_text, ToolCtx, ToolError, ToolRegistry};

/// Longest sleep a `wait` call may request.
const MAX_WAIT_MS: u64 = 30_000;

/// Poll cadence for `wait_for_widget`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct WaitArgs {
    ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct TickArgs {
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WaitForWidgetArgs {
    label: String,
    #[serde(default)]
    timeout_ms: Option<u64>,
    #[serde(default, rename = "async")]
    run_async: bool,
}

#[derive(Debug, Deserialize)]
struct ResizeArgs {
    width: u16,
    height: u16,
}

#[derive(Debug, Deserialize)]
struct DiffArgs {
    before: Snapshot,
}

#[derive(Debug, Deserialize)]
struct TaskIdArgs {
    id: u64,
}

/// Shared handler for text-cursor movements on the focused widget.
fn cursor_move<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let key_name = match ctx.tool {
            "cursor_to_start" => "home",
            "cursor_to_end" => "end",
            "cursor_left" => "left",
            _ => "right",
        };
        let code = parse_key(key_name)
            .ok_or_else(|| ToolError::Failed(format!("unmapped cursor tool: {}", ctx.tool)))?;
        ctx.bridge.send_key(ctx.cancel, KeyEvent::new(code)).await?;
        Ok(json!({ "status": "ok" }))
    })
}

fn wait<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: WaitArgs = decode(args)?;
        if args.ms > MAX_WAIT_MS {
            return Err(ToolError::InvalidArgs(format!(
                "wait capped at {MAX_WAIT_MS} ms, got {}",
                args.ms
            )));
        }
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(ToolError::Failed("request cancelled".to_owned()))
            }
            _ = tokio::time::sleep(Duration::from_millis(args.ms)) => {}
        }
        ctx.bridge.tick(ctx.cancel).await?;
        Ok(json!({ "status": "ok", "waited_ms": args.ms }))
    })
}

fn tick<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TickArgs = decode(args)?;
        let count = args.count.unwrap_or(1).clamp(1, 100);
        for _ in 0..count {
            ctx.bridge.tick(ctx.cancel).await?;
        }
        Ok(json!({ "status": "ok", "ticks": count }))
    })
}

fn find_label(snapshot: &Snapshot, needle: &str) -> Option<String> {
    let needle = needle.to_lowercase();
    snapshot
        .widgets
        .iter()
        .find(|w| !w.label.is_empty() && w.label.to_lowercase().contains(&needle))
        .map(|w| w.id.clone())
}

fn wait_for_widget<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: WaitForWidgetArgs = decode(args)?;
        let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(5_000).min(MAX_WAIT_MS));

        if args.run_async {
            if !ctx.settings.async_tools {
                return Err(ToolError::AsyncDisabled);
            }
            let bridge = ctx.bridge.clone();
            let label = args.label.clone();
            let work: TaskFn = Box::new(move |token, handle| {
                Box::pin(async move {
                    let deadline = tokio::time::Instant::now() + timeout;
                    loop {
                        if token.is_cancelled() {
                            return Err("cancelled".to_owned());
                        }
                        let now = tokio::time::Instant::now();
                        if now >= deadline {
                            return Err(format!("timeout waiting for widget: {label}"));
                        }
                        let elapsed_share = 100
                            - ((deadline - now).as_millis() * 100
                                / timeout.as_millis().max(1)) as u8;
                        handle.set_progress(elapsed_share.min(99));
                        if let Ok(snap) = bridge.snapshot(&token, false).await {
                            if find_label(&snap, &label).is_some() {
                                return Ok(());
                            }
                        }
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                })
            });
            let task = ctx
                .tasks
                .submit(&ctx.session.id, "wait_for_widget", format!("wait for {}", args.label), work)
                .await
                .map_err(|e| ToolError::TaskQuota(e.to_string()))?;
            return Ok(json!({ "status": "pending", "task_id": task.id }));
        }

        let started = tokio::time::Instant::now();
        loop {
            let snap = capture(ctx).await?;
            if let Some(id) = find_label(&snap, &args.label) {
                return Ok(json!({
                    "status": "found",
                    "widget_id": id,
                    "elapsed_ms": started.elapsed().as_millis() as u64,
                }));
            }
            if started.elapsed() >= timeout {
                return Err(ToolError::Failed(format!(
                    "timeout waiting for widget: {}",
                    args.label
                )));
            }
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    return Err(ToolError::Failed("request cancelled".to_owned()))
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }
    })
}

fn resize<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ResizeArgs = decode(args)?;
        if args.width == 0 || args.height == 0 {
            return Err(ToolError::InvalidArgs("width and height must be positive".to_owned()));
        }
        ctx.bridge.send_resize(ctx.cancel, args.width, args.height).await?;
        Ok(json!({ "width": args.width, "height": args.height }))
    })
}

fn diff<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: DiffArgs = decode(args)?;
        let include_text = args.before.text.is_some();
        if include_text {
            require_text(ctx)?;
        }
        let current = ctx.bridge.snapshot(ctx.cancel, include_text).await?;
        let delta = diff_snapshots(&args.before, &current);
        serde_json::to_value(&delta)
            .map_err(|e| ToolError::Failed(format!("diff serialization: {e}")))
    })
}

fn get_schema_version<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let _ = ctx;
        Ok(json!({ "schema": SCHEMA_VERSION, "protocol": PROTOCOL_VERSION }))
    })
}

fn task_status<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TaskIdArgs = decode(args)?;
        let task = ctx
            .tasks
            .get(args.id)
            .await
            .ok_or_else(|| ToolError::Failed(format!("no such task: {}", args.id)))?;
        Ok(json!({ "task": task.info() }))
    })
}

fn task_list<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let tasks = ctx.tasks.list_for_session(&ctx.session.id).await;
        Ok(json!({ "count": tasks.len(), "tasks": tasks }))
    })
}

fn task_cancel<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TaskIdArgs = decode(args)?;
        let task = ctx
            .tasks
            .get(args.id)
            .await
            .ok_or_else(|| ToolError::Failed(format!("no such task: {}", args.id)))?;
        if task.session_id != ctx.session.id {
            return Err(ToolError::Failed(format!(
                "task {} is owned by another session",
                args.id
            )));
        }
        task.cancel();
        Ok(json!({ "status": "ok", "id": args.id }))
    })
}

pub fn register(registry: &mut ToolRegistry) {
    for (name, description) in [
        ("cursor_to_start", "Move the text cursor to the start"),
        ("cursor_to_end", "Move the text cursor to the end"),
        ("cursor_left", "Move the text cursor left"),
        ("cursor_right", "Move the text cursor right"),
    ] {
        registry.register(def(name, description, "empty_args", cursor_move));
    }

    registry.register(def("wait", "Sleep, then advance one frame", "wait_args", wait));
    registry.register(def("tick", "Advance frames", "tick_args", tick));
    registry.register(def(
        "wait_for_widget",
        "Wait until a label appears",
        "wait_for_widget_args",
        wait_for_widget,
    ));
    registry.register(def("resize", "Resize the screen", "resize_args", resize));
    registry.register(def("diff", "Diff a prior snapshot against the live tree", "diff_args", diff));
    registry.register(def(
        "get_schema_version",
        "Schema and protocol versions",
        "empty_args",
        get_schema_version,
    ));
    registry.register(def("task_status", "Status of a background task", "task_id_args", task_status));
    registry.register(def("task_list", "This session's background tasks", "empty_args", task_list));
    let mut cancel_def =
        def("task_cancel", "Cancel a background task", "task_id_args", task_cancel);
    cancel_def.priority = Some(Priority::Critical);
    registry.register(cancel_def);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Introspection tools: snapshots, screen metadata, server facts.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::queue::Priority;
use crate::rpc::{PROTOCOL_VERSION, SCHEMA_VERSION};

use super::{decode, def, require_text, ToolCtx, ToolError, ToolRegistry};

#[derive(Debug, Default, Deserialize)]
struct SnapshotArgs {
    #[serde(default)]
    include_text: bool,
}

#[derive(Debug, Deserialize)]
struct RegionArgs {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
}

#[derive(Debug, Deserialize)]
struct CellArgs {
    x: u16,
    y: u16,
}

fn snapshot<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: SnapshotArgs = decode(args)?;
        if args.include_text {
            require_text(ctx)?;
        }
        let snap = ctx.bridge.snapshot(ctx.cancel, args.include_text).await?;
        serde_json::to_value(&snap)
            .map_err(|e| ToolError::Failed(format!("snapshot serialization: {e}")))
    })
}

fn snapshot_text<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_text(ctx)?;
        let text = ctx.bridge.capture_text(ctx.cancel).await?;
        Ok(json!({ "text": text }))
    })
}

fn snapshot_region<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_text(ctx)?;
        let args: RegionArgs = decode(args)?;
        let text =
            ctx.bridge.capture_region(ctx.cancel, args.x, args.y, args.width, args.height).await?;
        Ok(json!({ "x": args.x, "y": args.y, "width": args.width, "height": args.height, "text": text }))
    })
}

fn get_dimensions<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let dims = ctx.bridge.dimensions(ctx.cancel).await?;
        Ok(json!({ "width": dims.width, "height": dims.height }))
    })
}

fn get_layer_count<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let snap = super::capture(ctx).await?;
        Ok(json!({ "layer_count": snap.layer_count }))
    })
}

fn get_cell<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: CellArgs = decode(args)?;
        let cell = ctx.bridge.cell_at(ctx.cancel, args.x, args.y).await?;
        Ok(json!({ "x": args.x, "y": args.y, "cell": cell }))
    })
}

fn get_capabilities<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        Ok(json!({
            "text_access": ctx.caps.text_access,
            "clipboard_access": ctx.caps.clipboard_access,
            "async_tools": ctx.settings.async_tools,
        }))
    })
}

fn get_app_info<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        Ok(json!({
            "name": ctx.settings.app_name,
            "version": ctx.settings.app_version,
            "schema": SCHEMA_VERSION,
            "protocol": PROTOCOL_VERSION,
        }))
    })
}

fn ping<'a>(_ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move { Ok(json!({ "status": "ok" })) })
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(def("snapshot", "Capture the widget tree", "snapshot_args", snapshot));
    registry.register(def(
        "snapshot_text",
        "Capture the rendered screen text",
        "empty_args",
        snapshot_text,
    ));
    registry.register(def(
        "snapshot_region",
        "Capture rendered text from a screen region",
        "region_args",
        snapshot_region,
    ));
    registry.register(def("get_dimensions", "Screen dimensions", "empty_args", get_dimensions));
    registry.register(def("get_layer_count", "Number of layers", "empty_args", get_layer_count));
    registry.register(def("get_cell", "Read one screen cell", "cell_args", get_cell));
    registry.register(def(
        "get_capabilities",
        "Capabilities granted to this server",
        "empty_args",
        get_capabilities,
    ));
    registry.register(def("get_app_info", "Application name and version", "empty_args", get_app_info));
    let mut ping_def = def("ping", "Liveness check", "empty_args", ping);
    ping_def.priority = Some(Priority::Critical);
    registry.register(ping_def);
}

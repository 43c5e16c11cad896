// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clipboard and selection tools. All clipboard access is capability-gated.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::keys::{KeyCode, KeyEvent};

use super::{decode, def, require_clipboard, ToolCtx, ToolError, ToolRegistry};

#[derive(Debug, Deserialize)]
struct TextArgs {
    text: String,
}

fn clipboard_read<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_clipboard(ctx)?;
        let text = ctx.bridge.clipboard_read(ctx.cancel).await?;
        Ok(json!({ "text": text }))
    })
}

fn clipboard_write<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_clipboard(ctx)?;
        let args: TextArgs = decode(args)?;
        ctx.bridge.clipboard_write(ctx.cancel, &args.text).await?;
        Ok(json!({ "status": "ok" }))
    })
}

fn clipboard_clear<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_clipboard(ctx)?;
        ctx.bridge.clipboard_write(ctx.cancel, "").await?;
        Ok(json!({ "status": "ok" }))
    })
}

fn clipboard_has_text<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_clipboard(ctx)?;
        let text = ctx.bridge.clipboard_read(ctx.cancel).await?;
        Ok(json!({ "has_text": !text.is_empty() }))
    })
}

/// Primary-selection endpoints stay advertised so capability discovery is
/// stable, but they always fail with a structured envelope error.
fn clipboard_primary<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let _ = ctx;
        Err(ToolError::Failed("primary selection is not supported".to_owned()))
    })
}

/// Selection and clipboard chords delivered to the focused widget.
fn edit_chord<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let event = match ctx.tool {
            "select_all" => KeyEvent::ctrl('a'),
            "select_none" => KeyEvent::new(KeyCode::Escape),
            "copy" => KeyEvent::ctrl('c'),
            "cut" => KeyEvent::ctrl('x'),
            _ => KeyEvent::ctrl('v'),
        };
        if matches!(ctx.tool, "copy" | "cut" | "paste") {
            require_clipboard(ctx)?;
        }
        ctx.bridge.send_key(ctx.cancel, event).await?;
        Ok(json!({ "status": "ok" }))
    })
}

fn paste_text<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        require_clipboard(ctx)?;
        let args: TextArgs = decode(args)?;
        ctx.bridge.clipboard_write(ctx.cancel, &args.text).await?;
        ctx.bridge.send_key(ctx.cancel, KeyEvent::ctrl('v')).await?;
        Ok(json!({ "status": "ok" }))
    })
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(def("clipboard_read", "Read the clipboard", "empty_args", clipboard_read));
    registry.register(def("clipboard_write", "Write the clipboard", "text_args", clipboard_write));
    registry.register(def("clipboard_clear", "Clear the clipboard", "empty_args", clipboard_clear));
    registry.register(def(
        "clipboard_has_text",
        "Whether the clipboard holds text",
        "empty_args",
        clipboard_has_text,
    ));
    registry.register(def(
        "clipboard_read_primary",
        "Read the primary selection (unsupported)",
        "empty_args",
        clipboard_primary,
    ));
    registry.register(def(
        "clipboard_write_primary",
        "Write the primary selection (unsupported)",
        "text_args",
        clipboard_primary,
    ));

    for (name, description) in [
        ("select_all", "Select all in the focused widget"),
        ("select_none", "Clear the selection"),
        ("copy", "Copy the selection to the clipboard"),
        ("cut", "Cut the selection to the clipboard"),
        ("paste", "Paste from the clipboard"),
    ] {
        registry.register(def(name, description, "empty_args", edit_chord));
    }
    registry.register(def("paste_text", "Put text on the clipboard and paste it", "text_args", paste_text));
}

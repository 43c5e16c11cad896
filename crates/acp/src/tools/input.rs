// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw input tools: key presses, typed text, and mouse events. No target
//! resolution; input lands wherever the UI routes it.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::keys::{parse_chord, parse_key, KeyCode, KeyEvent, MouseButton, MouseEvent};

use super::{decode, def, ToolCtx, ToolError, ToolRegistry};

/// Key names registered as dedicated `press_<name>` tools.
const NAMED_KEYS: &[&str] = &[
    "enter", "escape", "tab", "shift_tab", "space", "backspace", "delete", "up", "down", "left",
    "right", "home", "end", "page_up", "page_down", "f1", "f2", "f3", "f4", "f5", "f6", "f7",
    "f8", "f9", "f10", "f11", "f12",
];

#[derive(Debug, Deserialize)]
struct KeyArgs {
    key: String,
}

#[derive(Debug, Deserialize)]
struct KeysArgs {
    keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChordArgs {
    #[serde(default)]
    modifiers: Vec<String>,
    key: String,
}

#[derive(Debug, Deserialize)]
struct RuneArgs {
    rune: String,
}

#[derive(Debug, Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Debug, Deserialize)]
struct MouseArgs {
    x: u16,
    y: u16,
    #[serde(default)]
    button: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DragArgs {
    from_x: u16,
    from_y: u16,
    to_x: u16,
    to_y: u16,
    #[serde(default)]
    button: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScrollArgs {
    x: u16,
    y: u16,
    delta: i32,
}

fn button_of(name: Option<&str>) -> Result<MouseButton, ToolError> {
    match name {
        None => Ok(MouseButton::Left),
        Some(name) => MouseButton::parse(name)
            .ok_or_else(|| ToolError::InvalidArgs(format!("unknown button: {name}"))),
    }
}

fn ok_status() -> Value {
    json!({ "status": "ok" })
}

fn press_key<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: KeyArgs = decode(args)?;
        let code = parse_key(&args.key)
            .ok_or_else(|| ToolError::InvalidArgs(format!("unknown key: {}", args.key)))?;
        ctx.bridge.send_key(ctx.cancel, KeyEvent::new(code)).await?;
        Ok(ok_status())
    })
}

fn press_keys<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: KeysArgs = decode(args)?;
        let mut events = Vec::with_capacity(args.keys.len());
        for key in &args.keys {
            let code = parse_key(key)
                .ok_or_else(|| ToolError::InvalidArgs(format!("unknown key: {key}")))?;
            events.push(KeyEvent::new(code));
        }
        ctx.bridge.send_keys(ctx.cancel, events).await?;
        Ok(json!({ "status": "ok", "count": args.keys.len() }))
    })
}

fn press_chord<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ChordArgs = decode(args)?;
        let event = parse_chord(&args.modifiers, &args.key).ok_or_else(|| {
            ToolError::InvalidArgs(format!(
                "unknown chord: {}+{}",
                args.modifiers.join("+"),
                args.key
            ))
        })?;
        ctx.bridge.send_key(ctx.cancel, event).await?;
        Ok(ok_status())
    })
}

fn press_rune<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: RuneArgs = decode(args)?;
        let mut chars = args.rune.chars();
        let (ch, rest) = (chars.next(), chars.next());
        let ch = match (ch, rest) {
            (Some(ch), None) => ch,
            _ => {
                return Err(ToolError::InvalidArgs(format!(
                    "rune must be a single character: {:?}",
                    args.rune
                )))
            }
        };
        ctx.bridge.send_key(ctx.cancel, KeyEvent::new(KeyCode::Char(ch))).await?;
        Ok(ok_status())
    })
}

fn type_string<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: TextArgs = decode(args)?;
        let keys = args.text.chars().map(|c| KeyEvent::new(KeyCode::Char(c)));
        ctx.bridge.send_keys(ctx.cancel, keys).await?;
        Ok(json!({ "status": "ok", "count": args.text.chars().count() }))
    })
}

/// Shared handler for the fixed `press_<name>` tools.
fn named_key<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let name = ctx.tool.strip_prefix("press_").unwrap_or(ctx.tool);
        let code = parse_key(name)
            .ok_or_else(|| ToolError::Failed(format!("unmapped key tool: {}", ctx.tool)))?;
        ctx.bridge.send_key(ctx.cancel, KeyEvent::new(code)).await?;
        Ok(ok_status())
    })
}

/// Shared handler for single mouse events (press, release, move).
fn mouse_event<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: MouseArgs = decode(args)?;
        let button = button_of(args.button.as_deref())?;
        let event = match ctx.tool {
            "mouse_press" => MouseEvent::press(args.x, args.y, button),
            "mouse_release" => MouseEvent::release(args.x, args.y, button),
            _ => MouseEvent::moved(args.x, args.y),
        };
        ctx.bridge.send_mouse(ctx.cancel, event).await?;
        Ok(ok_status())
    })
}

/// Shared handler for click variants (click, double, right).
fn mouse_click<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: MouseArgs = decode(args)?;
        let button = match ctx.tool {
            "mouse_right_click" => MouseButton::Right,
            _ => button_of(args.button.as_deref())?,
        };
        let presses = if ctx.tool == "mouse_double_click" { 2 } else { 1 };
        for _ in 0..presses {
            ctx.bridge.send_mouse(ctx.cancel, MouseEvent::press(args.x, args.y, button)).await?;
            ctx.bridge
                .send_mouse(ctx.cancel, MouseEvent::release(args.x, args.y, button))
                .await?;
        }
        Ok(ok_status())
    })
}

fn mouse_drag<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: DragArgs = decode(args)?;
        let button = button_of(args.button.as_deref())?;
        ctx.bridge
            .send_mouse(ctx.cancel, MouseEvent::press(args.from_x, args.from_y, button))
            .await?;
        ctx.bridge.send_mouse(ctx.cancel, MouseEvent::moved(args.to_x, args.to_y)).await?;
        ctx.bridge
            .send_mouse(ctx.cancel, MouseEvent::release(args.to_x, args.to_y, button))
            .await?;
        Ok(ok_status())
    })
}

fn mouse_scroll<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ScrollArgs = decode(args)?;
        ctx.bridge
            .send_mouse(ctx.cancel, MouseEvent::scroll(args.x, args.y, args.delta))
            .await?;
        Ok(ok_status())
    })
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(def("press_key", "Press a named key", "key_args", press_key));
    registry.register(def("press_keys", "Press a sequence of keys", "keys_args", press_keys));
    registry.register(def("press_chord", "Press a key with modifiers", "chord_args", press_chord));
    registry.register(def("press_rune", "Press a single character", "rune_args", press_rune));
    registry.register(def("type_string", "Type a string of characters", "text_args", type_string));

    for name in NAMED_KEYS {
        registry.register(def(
            &format!("press_{name}"),
            &format!("Press {name}"),
            "empty_args",
            named_key,
        ));
    }

    registry.register(def("mouse_press", "Press a mouse button", "mouse_args", mouse_event));
    registry.register(def("mouse_release", "Release a mouse button", "mouse_args", mouse_event));
    registry.register(def("mouse_move", "Move the mouse", "mouse_args", mouse_event));
    registry.register(def("mouse_click", "Click at a position", "mouse_args", mouse_click));
    registry.register(def("mouse_double_click", "Double-click at a position", "mouse_args", mouse_click));
    registry.register(def("mouse_right_click", "Right-click at a position", "mouse_args", mouse_click));
    registry.register(def("mouse_drag", "Drag between two positions", "drag_args", mouse_drag));
    registry.register(def("mouse_scroll", "Scroll at a position", "scroll_args", mouse_scroll));
}

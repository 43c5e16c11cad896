// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Widget queries: finders, relationship walks, property accessors, and
//! state checks. Every query operates on a fresh snapshot.

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::snapshot::Snapshot;
use crate::widget::{Role, Widget};

use super::{capture, decode, def, ToolCtx, ToolError, ToolRegistry};

#[derive(Debug, Deserialize)]
struct LabelArgs {
    label: String,
    #[serde(default)]
    layer: Option<u32>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RoleArgs {
    role: Role,
    #[serde(default)]
    layer: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct OptionalIdArgs {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueArgs {
    value: String,
}

#[derive(Debug, Deserialize)]
struct StateArgs {
    state: String,
    #[serde(default = "default_true")]
    value: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PositionArgs {
    x: i32,
    y: i32,
}

fn widgets_result(widgets: Vec<&Widget>) -> Value {
    json!({ "count": widgets.len(), "widgets": widgets })
}

fn lookup<'s>(snapshot: &'s Snapshot, id: &str) -> Result<&'s Widget, ToolError> {
    snapshot.resolve_id(id).ok_or_else(|| ToolError::Failed(format!("widget not found: {id}")))
}

fn find_by_label<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: LabelArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let needle = args.label.to_lowercase();
        let mut widgets: Vec<&Widget> = snap
            .widgets
            .iter()
            .filter(|w| !w.label.is_empty() && w.label.to_lowercase().contains(&needle))
            .filter(|w| args.layer.map_or(true, |layer| w.layer() == layer))
            .collect();
        if let Some(limit) = args.limit {
            widgets.truncate(limit);
        }
        Ok(widgets_result(widgets))
    })
}

fn find_by_role<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: RoleArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widgets: Vec<&Widget> = snap
            .widgets
            .iter()
            .filter(|w| w.role == args.role)
            .filter(|w| args.layer.map_or(true, |layer| w.layer() == layer))
            .collect();
        Ok(widgets_result(widgets))
    })
}

fn find_by_id<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: IdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        Ok(json!({ "widget": snap.resolve_id(&args.id) }))
    })
}

fn find_by_value<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: ValueArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widgets: Vec<&Widget> =
            snap.widgets.iter().filter(|w| !w.value.is_empty() && w.value.contains(&args.value)).collect();
        Ok(widgets_result(widgets))
    })
}

fn find_by_state<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: StateArgs = decode(args)?;
        let snap = capture(ctx).await?;
        // Validate the flag name before filtering so typos surface clearly.
        if crate::widget::StateSet::default().flag(&args.state).is_none() {
            return Err(ToolError::InvalidArgs(format!("unknown state flag: {}", args.state)));
        }
        let widgets: Vec<&Widget> = snap
            .widgets
            .iter()
            .filter(|w| w.state.flag(&args.state) == Some(args.value))
            .collect();
        Ok(widgets_result(widgets))
    })
}

fn find_at_position<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: PositionArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let mut widgets: Vec<&Widget> =
            snap.widgets.iter().filter(|w| w.bounds.contains(args.x, args.y)).collect();
        // Topmost layer first so index 0 is what the user sees at the point.
        widgets.sort_by_key(|w| std::cmp::Reverse(w.layer()));
        Ok(widgets_result(widgets))
    })
}

fn find_focused<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let snap = capture(ctx).await?;
        Ok(json!({ "widget": snap.focused() }))
    })
}

fn find_collection<'a>(ctx: &'a ToolCtx<'a>, _args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let snap = capture(ctx).await?;
        let widgets: Vec<&Widget> = match ctx.tool {
            "find_all" => snap.widgets.iter().collect(),
            "find_focusable" => snap.focusables(),
            _ => snap.widgets.iter().filter(|w| w.is_actionable()).collect(),
        };
        Ok(widgets_result(widgets))
    })
}

fn related<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: IdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widget = lookup(&snap, &args.id)?;
        match ctx.tool {
            "get_parent" => Ok(json!({ "widget": snap.parent_of(&widget.id) })),
            "get_children" => Ok(widgets_result(snap.children_of(&widget.id))),
            "get_siblings" => Ok(widgets_result(snap.siblings_of(&widget.id))),
            "get_descendants" => Ok(widgets_result(snap.descendants_of(&widget.id))),
            _ => Ok(widgets_result(snap.ancestors_of(&widget.id))),
        }
    })
}

fn neighbor_focusable<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: OptionalIdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let focusables = snap.focusables();
        if focusables.is_empty() {
            return Ok(json!({ "widget": Value::Null }));
        }
        let current = args.id.or_else(|| snap.focused_id.clone());
        let position = current
            .as_deref()
            .and_then(|id| focusables.iter().position(|w| w.id == id));
        let forward = ctx.tool == "get_next_focusable";
        let next = match position {
            // No reference point: start from the ends.
            None if forward => 0,
            None => focusables.len() - 1,
            Some(i) if forward => (i + 1) % focusables.len(),
            Some(i) => (i + focusables.len() - 1) % focusables.len(),
        };
        Ok(json!({ "widget": focusables[next] }))
    })
}

fn get_widget<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: IdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widget = lookup(&snap, &args.id)?;
        Ok(json!({ "widget": widget }))
    })
}

fn property<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: IdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widget = lookup(&snap, &args.id)?;
        let value = match ctx.tool {
            "get_label" => json!({ "label": widget.label }),
            "get_value" => json!({ "value": widget.value }),
            "get_bounds" => json!({ "bounds": widget.bounds }),
            _ => json!({ "actions": widget.actions }),
        };
        let mut out = json!({ "id": widget.id });
        if let (Some(out_map), Some(extra)) = (out.as_object_mut(), value.as_object()) {
            for (k, v) in extra {
                out_map.insert(k.clone(), v.clone());
            }
        }
        Ok(out)
    })
}

fn state_check<'a>(ctx: &'a ToolCtx<'a>, args: Value) -> BoxFuture<'a, Result<Value, ToolError>> {
    Box::pin(async move {
        let args: IdArgs = decode(args)?;
        let snap = capture(ctx).await?;
        let widget = lookup(&snap, &args.id)?;
        let flag = ctx.tool.strip_prefix("is_").unwrap_or(ctx.tool);
        // Tri-states also report applicability.
        let value = match flag {
            "checked" => json!({
                "id": widget.id,
                "checked": widget.state.checked.unwrap_or(false),
                "applicable": widget.state.checked.is_some(),
            }),
            "expanded" => json!({
                "id": widget.id,
                "expanded": widget.state.expanded.unwrap_or(false),
                "applicable": widget.state.expanded.is_some(),
            }),
            _ => {
                let state = widget
                    .state
                    .flag(flag)
                    .ok_or_else(|| ToolError::Failed(format!("unknown state flag: {flag}")))?;
                let mut map = serde_json::Map::new();
                map.insert("id".to_owned(), json!(widget.id));
                map.insert(flag.to_owned(), json!(state));
                Value::Object(map)
            }
        };
        Ok(value)
    })
}

pub fn register(registry: &mut ToolRegistry) {
    registry.register(def("find_by_label", "Find widgets by label substring", "label_args", find_by_label));
    registry.register(def("find_by_role", "Find widgets by role", "role_args", find_by_role));
    registry.register(def("find_by_id", "Look up a widget by id", "id_args", find_by_id));
    registry.register(def("find_by_value", "Find widgets by value substring", "value_args", find_by_value));
    registry.register(def("find_by_state", "Find widgets by state flag", "state_args", find_by_state));
    registry.register(def("find_at_position", "Find widgets at a screen position", "position_args", find_at_position));
    registry.register(def("find_focused", "The focused widget", "empty_args", find_focused));
    registry.register(def("find_all", "All widgets", "empty_args", find_collection));
    registry.register(def("find_focusable", "All focusable widgets", "empty_args", find_collection));
    registry.register(def("find_actionable", "All actionable widgets", "empty_args", find_collection));

    registry.register(def("get_children", "Direct children of a widget", "id_args", related));
    registry.register(def("get_parent", "Parent of a widget", "id_args", related));
    registry.register(def("get_siblings", "Siblings of a widget", "id_args", related));
    registry.register(def("get_descendants", "Transitive children of a widget", "id_args", related));
    registry.register(def("get_ancestors", "Parent chain of a widget", "id_args", related));
    registry.register(def("get_next_focusable", "Next widget in focus order", "optional_id_args", neighbor_focusable));
    registry.register(def("get_prev_focusable", "Previous widget in focus order", "optional_id_args", neighbor_focusable));

    registry.register(def("get_widget", "Full widget record", "id_args", get_widget));
    registry.register(def("get_label", "A widget's label", "id_args", property));
    registry.register(def("get_value", "A widget's value", "id_args", property));
    registry.register(def("get_bounds", "A widget's bounds", "id_args", property));
    registry.register(def("get_actions", "A widget's action verbs", "id_args", property));

    for name in ["is_focused", "is_disabled", "is_hidden", "is_selected", "is_checked", "is_expanded"] {
        registry.register(def(name, "Boolean state check", "id_args", state_check));
    }
}

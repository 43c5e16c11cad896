// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool catalog and dispatcher.
//!
//! Each tool is a table entry owning its own argument decoder; the registry
//! is populated at startup and frozen. Handler failures become envelope
//! errors, argument and admission failures become JSON-RPC errors.

pub mod actions;
pub mod clipboard;
pub mod input;
pub mod introspect;
pub mod query;
pub mod timing;

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::Capabilities;
use crate::error::{access_denied_data, RpcCode};
use crate::queue::Priority;
use crate::resolve::ResolveError;
use crate::rpc::{RpcError, SCHEMA_VERSION};
use crate::session::Session;
use crate::snapshot::Snapshot;
use crate::tasks::TaskManager;
use crate::ui::{BridgeError, UiBridge};

/// Static server facts handlers report through meta tools.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub app_name: String,
    pub app_version: String,
    /// Whether tools may spawn background tasks.
    pub async_tools: bool,
}

/// Everything a handler may touch for one call.
pub struct ToolCtx<'a> {
    /// Name the call was dispatched under (shared handlers key off it).
    pub tool: &'a str,
    pub session: &'a Arc<Session>,
    pub bridge: &'a UiBridge,
    pub tasks: &'a TaskManager,
    pub caps: &'a Capabilities,
    pub settings: &'a ToolSettings,
    pub cancel: &'a CancellationToken,
}

/// Handler failure modes. `Failed` becomes an envelope error; the rest map
/// to structured JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    InvalidArgs(String),
    Failed(String),
    Denied { reason: String, hint: String },
    AsyncDisabled,
    TaskQuota(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgs(msg) | Self::Failed(msg) | Self::TaskQuota(msg) => {
                f.write_str(msg)
            }
            Self::Denied { reason, .. } => write!(f, "access denied: {reason}"),
            Self::AsyncDisabled => f.write_str("async tools disabled"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<BridgeError> for ToolError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Cancelled => Self::Failed("request cancelled".to_owned()),
            other => Self::Failed(other.to_string()),
        }
    }
}

impl From<ResolveError> for ToolError {
    fn from(e: ResolveError) -> Self {
        Self::Failed(e.to_string())
    }
}

pub type Handler = for<'a> fn(&'a ToolCtx<'a>, Value) -> BoxFuture<'a, Result<Value, ToolError>>;

/// One catalog entry.
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// Tag naming the argument record this tool decodes.
    pub input_schema: &'static str,
    /// Dispatch priority override (e.g. `critical` for control tools).
    pub priority: Option<Priority>,
    pub handler: Handler,
}

/// Entry in `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: String,
}

/// Ordered, frozen-after-startup tool table.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, ToolDef>,
}

impl ToolRegistry {
    pub fn register(&mut self, def: ToolDef) {
        debug_assert!(!self.tools.contains_key(&def.name), "duplicate tool: {}", def.name);
        self.tools.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDef> {
        self.tools.get(name)
    }

    pub fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|def| ToolInfo {
                name: def.name.clone(),
                description: def.description.clone(),
                input_schema: def.input_schema.to_owned(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Assemble the full catalog.
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    introspect::register(&mut registry);
    query::register(&mut registry);
    actions::register(&mut registry);
    input::register(&mut registry);
    clipboard::register(&mut registry);
    timing::register(&mut registry);
    registry
}

/// Decode a typed argument record. Absent arguments decode like `{}` so
/// all-optional records accept calls with no `arguments` field.
pub fn decode<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { Value::Object(serde_json::Map::new()) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs(format!("invalid arguments: {e}")))
}

/// Capture a widget snapshot without rendered text.
pub(crate) async fn capture(ctx: &ToolCtx<'_>) -> Result<Snapshot, ToolError> {
    Ok(ctx.bridge.snapshot(ctx.cancel, false).await?)
}

/// Shorthand for building a catalog entry with no priority override.
pub(crate) fn def(
    name: &str,
    description: &str,
    input_schema: &'static str,
    handler: Handler,
) -> ToolDef {
    ToolDef {
        name: name.to_owned(),
        description: description.to_owned(),
        input_schema,
        priority: None,
        handler,
    }
}

pub(crate) fn require_text(ctx: &ToolCtx<'_>) -> Result<(), ToolError> {
    if ctx.caps.text_access {
        Ok(())
    } else {
        Err(ToolError::Denied {
            reason: "text access disabled".to_owned(),
            hint: "enable text access on the host".to_owned(),
        })
    }
}

pub(crate) fn require_clipboard(ctx: &ToolCtx<'_>) -> Result<(), ToolError> {
    if ctx.caps.clipboard_access {
        Ok(())
    } else {
        Err(ToolError::Denied {
            reason: "clipboard access disabled".to_owned(),
            hint: "enable clipboard access on the host".to_owned(),
        })
    }
}

pub fn envelope_ok(tool: &str, data: Value) -> Value {
    json!({ "_schema": SCHEMA_VERSION, "_tool": tool, "data": data })
}

pub fn envelope_err(tool: &str, message: &str) -> Value {
    json!({ "_schema": SCHEMA_VERSION, "_tool": tool, "error": message })
}

/// Wrap an envelope as a `tools/call` result: textual content plus the
/// structured field, with the error flag.
pub fn call_result(envelope: Value, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": envelope.to_string() }],
        "structuredContent": envelope,
        "isError": is_error,
    })
}

/// Run one tool call to a `tools/call` result or a structured RPC error.
pub async fn dispatch(
    registry: &ToolRegistry,
    ctx: &ToolCtx<'_>,
    args: Value,
) -> Result<Value, RpcError> {
    let def = registry
        .get(ctx.tool)
        .ok_or_else(|| RpcCode::InvalidParams.to_error(format!("unknown tool: {}", ctx.tool)))?;

    match (def.handler)(ctx, args).await {
        Ok(data) => Ok(call_result(envelope_ok(ctx.tool, data), false)),
        Err(ToolError::Failed(message)) => {
            Ok(call_result(envelope_err(ctx.tool, &message), true))
        }
        Err(ToolError::InvalidArgs(message)) => Err(RpcCode::InvalidParams.to_error(message)),
        Err(ToolError::Denied { reason, hint }) => Err(RpcCode::AccessDenied
            .with_data("access denied", access_denied_data(ctx.tool, &reason, &hint))),
        Err(ToolError::AsyncDisabled) => {
            Err(RpcCode::AsyncDisabled.to_error("async tools disabled"))
        }
        Err(ToolError::TaskQuota(message)) => {
            Err(RpcCode::TaskSubmitFailed.to_error(message))
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

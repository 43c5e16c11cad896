// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 message types and line parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcCode;

/// Tool/result envelope schema tag. Changing the wire shape requires a new
/// version string; there is no in-place evolution.
pub const SCHEMA_VERSION: &str = "fluffy-mcp/v1";

/// Protocol revision reported from `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier: clients may use numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    /// Absent for client-to-server notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: Option<RequestId>, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, result: Some(result), error: None }
    }

    pub fn err(id: Option<RequestId>, error: RpcError) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), id, result: None, error: Some(error) }
    }
}

/// Wire error object inside a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Server-to-client notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_owned(), method: method.into(), params: Some(params) }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parse one framed line into a request.
///
/// Malformed JSON maps to `-32700`; structurally invalid requests (wrong
/// `jsonrpc` tag, empty method) map to `-32600`.
pub fn parse_request(line: &str) -> Result<Request, RpcError> {
    let req: Request = serde_json::from_str(line)
        .map_err(|e| RpcCode::ParseError.to_error(format!("invalid JSON: {e}")))?;
    if req.jsonrpc != JSONRPC_VERSION {
        return Err(RpcCode::InvalidRequest
            .to_error(format!("unsupported jsonrpc version: {:?}", req.jsonrpc)));
    }
    if req.method.is_empty() {
        return Err(RpcCode::InvalidRequest.to_error("missing method"));
    }
    Ok(req)
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;

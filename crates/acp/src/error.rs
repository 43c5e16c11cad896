// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::rpc::RpcError;

/// Structured error codes shared across all transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcCode {
    AuthRequired,
    TooManySessions,
    RateLimited,
    AccessDenied,
    RequestTimeout,
    RequestFailed,
    AsyncDisabled,
    TaskSubmitFailed,
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
}

impl RpcCode {
    /// Numeric JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            Self::AuthRequired => -32001,
            Self::TooManySessions => -32002,
            Self::RateLimited => -32003,
            Self::AccessDenied => -32004,
            Self::RequestTimeout => -32005,
            Self::RequestFailed => -32006,
            Self::AsyncDisabled => -32007,
            Self::TaskSubmitFailed => -32008,
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::TooManySessions => "TOO_MANY_SESSIONS",
            Self::RateLimited => "RATE_LIMITED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::RequestFailed => "REQUEST_FAILED",
            Self::AsyncDisabled => "ASYNC_DISABLED",
            Self::TaskSubmitFailed => "TASK_SUBMIT_FAILED",
            Self::ParseError => "PARSE_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::MethodNotFound => "METHOD_NOT_FOUND",
            Self::InvalidParams => "INVALID_PARAMS",
            Self::Internal => "INTERNAL",
        }
    }

    /// Convert this code into a wire [`RpcError`] with the given message.
    pub fn to_error(&self, message: impl Into<String>) -> RpcError {
        RpcError { code: self.code(), message: message.into(), data: None }
    }

    /// Convert this code into a wire [`RpcError`] carrying structured data.
    pub fn with_data(&self, message: impl Into<String>, data: Value) -> RpcError {
        RpcError { code: self.code(), message: message.into(), data: Some(data) }
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data payload for `-32003` rate-limit refusals.
pub fn rate_limit_data(retry_after_ms: u64, limit: u32) -> Value {
    json!({ "retry_after_ms": retry_after_ms, "limit": limit, "window_ms": 1000 })
}

/// Data payload for `-32004` access denials.
pub fn access_denied_data(tool: &str, reason: &str, hint: &str) -> Value {
    json!({ "tool": tool, "reason": reason, "hint": hint })
}

/// Data payload for `-32005` request timeouts.
pub fn timeout_data(timeout_ms: u64) -> Value {
    json!({ "timeout_ms": timeout_ms })
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

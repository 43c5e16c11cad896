// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    auth       = { RpcCode::AuthRequired, -32001 },
    capacity   = { RpcCode::TooManySessions, -32002 },
    rate       = { RpcCode::RateLimited, -32003 },
    access     = { RpcCode::AccessDenied, -32004 },
    timeout    = { RpcCode::RequestTimeout, -32005 },
    failed     = { RpcCode::RequestFailed, -32006 },
    async_off  = { RpcCode::AsyncDisabled, -32007 },
    task       = { RpcCode::TaskSubmitFailed, -32008 },
    parse      = { RpcCode::ParseError, -32700 },
    invalid    = { RpcCode::InvalidRequest, -32600 },
    method     = { RpcCode::MethodNotFound, -32601 },
    params     = { RpcCode::InvalidParams, -32602 },
    internal   = { RpcCode::Internal, -32603 },
)]
fn numeric_codes(code: RpcCode, expected: i64) {
    assert_eq!(code.code(), expected);
}

#[test]
fn error_carries_message_and_data() {
    let err = RpcCode::RateLimited.with_data("rate limit exceeded", rate_limit_data(250, 10));
    assert_eq!(err.code, -32003);
    assert_eq!(err.message, "rate limit exceeded");
    let data = err.data.unwrap_or_default();
    assert_eq!(data["retry_after_ms"], 250);
    assert_eq!(data["limit"], 10);
    assert_eq!(data["window_ms"], 1000);
}

#[test]
fn access_denied_payload_shape() {
    let data = access_denied_data("snapshot_text", "text access disabled", "enable text access");
    assert_eq!(data["tool"], "snapshot_text");
    assert_eq!(data["reason"], "text access disabled");
    assert_eq!(data["hint"], "enable text access");
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::HeaderMap;

use crate::session::constant_time_eq;

/// Extract the bearer token from an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Validate a bearer token against the configured one.
///
/// Returns `true` when `expected` is `None` (auth disabled) or the header
/// matches in constant time. The event-stream transport uses this as an
/// early gate; the session layer re-checks at `initialize`.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let expected = match expected {
        Some(tok) => tok,
        None => return true,
    };
    match bearer_token(headers) {
        Some(token) => constant_time_eq(&token, expected),
        None => false,
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

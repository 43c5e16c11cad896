// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::transport::SlowClientPolicy;

/// Host-granted capability toggles, reported by `get_capabilities` and
/// enforced at subscription and read time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Capabilities {
    pub text_access: bool,
    pub clipboard_access: bool,
}

/// Agent control protocol server for FluffyUI applications.
#[derive(Debug, Clone, Parser)]
#[command(name = "fluffy-acp", version, about)]
pub struct Config {
    /// Serve JSON-RPC over stdin/stdout.
    #[arg(long, env = "FLUFFY_ACP_PIPE")]
    pub pipe: bool,

    /// Unix socket path for the local-socket transport.
    #[arg(long, env = "FLUFFY_ACP_SOCKET")]
    pub socket: Option<String>,

    /// HTTP port for the event-stream transport.
    #[arg(long, env = "FLUFFY_ACP_PORT")]
    pub port: Option<u16>,

    /// Host address for the event-stream transport.
    #[arg(long, env = "FLUFFY_ACP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Bearer token clients must present at initialize.
    #[arg(long, env = "FLUFFY_ACP_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Maximum concurrently registered sessions.
    #[arg(long, env = "FLUFFY_ACP_MAX_SESSIONS", default_value = "16")]
    pub max_sessions: usize,

    /// Idle session expiry in seconds (0 = disabled).
    #[arg(long, env = "FLUFFY_ACP_SESSION_TIMEOUT", default_value = "300")]
    pub session_timeout_secs: u64,

    /// Per-request deadline in milliseconds.
    #[arg(long, env = "FLUFFY_ACP_REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Per-session rate limit in requests per second (0 = disabled).
    #[arg(long, env = "FLUFFY_ACP_RATE_LIMIT", default_value = "10")]
    pub rate_limit: u32,

    /// Per-session burst capacity (0 = 2x rate).
    #[arg(long, env = "FLUFFY_ACP_RATE_BURST", default_value = "0")]
    pub rate_burst: u32,

    /// Shared request budget across sessions in requests per second
    /// (0 = disabled).
    #[arg(long, env = "FLUFFY_ACP_GLOBAL_RATE", default_value = "0")]
    pub global_rate: u32,

    /// Concurrent requests allowed per session.
    #[arg(long, env = "FLUFFY_ACP_MAX_INFLIGHT", default_value = "8")]
    pub max_inflight: u32,

    /// Request queue worker count.
    #[arg(long, env = "FLUFFY_ACP_WORKERS", default_value = "4")]
    pub workers: usize,

    /// Maximum requests waiting in the queue across all bands.
    #[arg(long, env = "FLUFFY_ACP_QUEUE_DEPTH", default_value = "256")]
    pub queue_depth: usize,

    /// Bound on each connection's notification queue.
    #[arg(long, env = "FLUFFY_ACP_MAX_PENDING_EVENTS", default_value = "100")]
    pub max_pending_events: usize,

    /// Overflow policy: drop_oldest, drop_newest, or disconnect.
    #[arg(long, env = "FLUFFY_ACP_SLOW_CLIENT_POLICY", default_value = "drop_oldest")]
    pub slow_client_policy: String,

    /// Maximum background tasks across all sessions.
    #[arg(long, env = "FLUFFY_ACP_MAX_BACKGROUND_TASKS", default_value = "16")]
    pub max_background_tasks: u32,

    /// Maximum non-terminal background tasks per session.
    #[arg(long, env = "FLUFFY_ACP_MAX_TASKS_PER_SESSION", default_value = "4")]
    pub max_tasks_per_session: u32,

    /// Allow tools that create background tasks.
    #[arg(long, env = "FLUFFY_ACP_ASYNC_TOOLS")]
    pub async_tools: bool,

    /// Grant clients access to rendered screen text.
    #[arg(long, env = "FLUFFY_ACP_TEXT_ACCESS")]
    pub text_access: Option<bool>,

    /// Grant clients access to the clipboard.
    #[arg(long, env = "FLUFFY_ACP_CLIPBOARD_ACCESS")]
    pub clipboard_access: Option<bool>,

    /// Watcher poll cadence in milliseconds.
    #[arg(long, env = "FLUFFY_ACP_WATCH_INTERVAL_MS", default_value = "100")]
    pub watch_interval_ms: u64,

    /// Log format (json or text).
    #[arg(long, env = "FLUFFY_ACP_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "FLUFFY_ACP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.pipe && self.socket.is_none() && self.port.is_none() {
            anyhow::bail!("at least one of --pipe, --socket, or --port must be specified");
        }
        if SlowClientPolicy::parse(&self.slow_client_policy).is_none() {
            anyhow::bail!("invalid slow-client policy: {}", self.slow_client_policy);
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be positive");
        }
        if self.max_sessions == 0 {
            anyhow::bail!("--max-sessions must be positive");
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watch_interval_ms.max(10))
    }

    pub fn slow_policy(&self) -> SlowClientPolicy {
        SlowClientPolicy::parse(&self.slow_client_policy).unwrap_or_default()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            text_access: self.text_access.unwrap_or(true),
            clipboard_access: self.clipboard_access.unwrap_or(true),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

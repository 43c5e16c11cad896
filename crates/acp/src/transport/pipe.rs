// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipe transport: newline-delimited JSON-RPC over stdin/stdout. One
//! connection, one session, for hosts driven by a supervising process.

use std::sync::Arc;

use crate::server::AcpServer;
use crate::transport::serve_connection;

/// Serve stdin/stdout until EOF or shutdown.
pub async fn run(server: Arc<AcpServer>) -> anyhow::Result<()> {
    let session = server.sessions.register(None).await;
    tracing::info!(session = %session.id, "pipe transport ready");
    serve_connection(server, session, tokio::io::stdin(), tokio::io::stdout()).await
}

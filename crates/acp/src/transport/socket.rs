// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-socket transport: a Unix domain socket accepting concurrent
//! connections, each owning its own session.

use std::path::Path;
use std::sync::Arc;

use tokio::net::UnixListener;

use crate::server::AcpServer;
use crate::transport::serve_connection;

/// Bind the socket, creating the parent directory (mode 0755) and replacing
/// any stale socket file.
pub fn bind(path: &Path) -> anyhow::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            let mut builder = std::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o755);
            }
            builder.create(parent)?;
        }
    }
    // Replace a stale socket left by a previous run.
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let listener = UnixListener::bind(path)?;
    tracing::info!(path = %path.display(), "socket transport ready");
    Ok(listener)
}

/// Accept connections until shutdown. Each connection is served on its own
/// task; a connection failure never affects its siblings.
pub async fn run(server: Arc<AcpServer>, listener: UnixListener) -> anyhow::Result<()> {
    let shutdown = server.shutdown.clone();
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted,
        };
        let (stream, _addr) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "socket accept failed");
                continue;
            }
        };
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let session = server.sessions.register(None).await;
            tracing::debug!(session = %session.id, "socket connection opened");
            let (reader, writer) = stream.into_split();
            if let Err(e) = serve_connection(server, session, reader, writer).await {
                tracing::debug!(error = %e, "socket connection closed with error");
            }
        });
    }
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;

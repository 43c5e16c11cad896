// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport framing shared by the pipe, socket, and event-stream servers.
//!
//! One JSON value per LF-terminated line (pipe, socket) or per SSE data
//! field. Responses are written in request-arrival order under a single
//! per-connection write mutex; notifications flow through a bounded
//! [`NotifyQueue`] governed by the slow-client policy.

pub mod auth;
pub mod pipe;
pub mod socket;
pub mod sse;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite,
    AsyncWriteExt, BufReader};
use tokio::sync::Notify;

use crate::server::AcpServer;
use crate::session::Session;

/// Hard cap on a single framed line.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// What to do when a subscriber's notification queue overflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlowClientPolicy {
    /// Discard the oldest queued notification.
    #[default]
    DropOldest,
    /// Discard the incoming notification.
    DropNewest,
    /// Close the connection and unregister the session.
    Disconnect,
}

impl SlowClientPolicy {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "drop_oldest" => Some(Self::DropOldest),
            "drop_newest" => Some(Self::DropNewest),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DropOldest => "drop_oldest",
            Self::DropNewest => "drop_newest",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Result of pushing a notification into a bounded queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    DroppedOldest,
    DroppedNewest,
    /// The disconnect policy fired; the connection is going away.
    Disconnect,
    /// No queue attached or the queue is closed.
    Dropped,
}

/// Bounded per-connection notification queue with an explicit drop policy.
pub struct NotifyQueue {
    inner: parking_lot::Mutex<VecDeque<Value>>,
    capacity: usize,
    policy: SlowClientPolicy,
    ready: Notify,
    closed: AtomicBool,
}

impl NotifyQueue {
    pub fn new(capacity: usize, policy: SlowClientPolicy) -> Self {
        Self {
            inner: parking_lot::Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            policy,
            ready: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue a notification, applying the slow-client policy on overflow.
    pub fn push(&self, value: Value) -> PushOutcome {
        if self.is_closed() {
            return PushOutcome::Dropped;
        }
        let outcome = {
            let mut queue = self.inner.lock();
            if queue.len() < self.capacity {
                queue.push_back(value);
                PushOutcome::Queued
            } else {
                match self.policy {
                    SlowClientPolicy::DropOldest => {
                        queue.pop_front();
                        queue.push_back(value);
                        PushOutcome::DroppedOldest
                    }
                    SlowClientPolicy::DropNewest => PushOutcome::DroppedNewest,
                    SlowClientPolicy::Disconnect => PushOutcome::Disconnect,
                }
            }
        };
        if outcome == PushOutcome::Disconnect {
            self.close();
        } else {
            self.ready.notify_one();
        }
        outcome
    }

    /// Dequeue the next notification; `None` once closed and drained.
    pub async fn pop(&self) -> Option<Value> {
        loop {
            let notified = self.ready.notified();
            if let Some(v) = self.inner.lock().pop_front() {
                return Some(v);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_waiters();
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Serialize one JSON value as an LF-terminated line.
pub async fn write_json_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &Value,
) -> std::io::Result<()> {
    let mut buf = serde_json::to_vec(value)?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Read one line, failing the connection when it exceeds [`MAX_LINE_BYTES`].
///
/// Returns the number of bytes consumed; zero means EOF.
pub async fn read_line_capped<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize> {
    let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64 + 1);
    let n = limited.read_until(b'\n', buf).await?;
    if buf.len() > MAX_LINE_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "line exceeds the 4 MiB frame cap",
        ));
    }
    Ok(n)
}

/// Drive one framed connection: read requests line by line, dispatch, write
/// responses in arrival order, and pump notifications from the session's
/// bounded queue. Returns when the peer closes, the session is torn down,
/// or a framing error makes the connection unusable.
pub async fn serve_connection<R, W>(
    server: Arc<AcpServer>,
    session: Arc<Session>,
    reader: R,
    writer: W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let queue = Arc::new(NotifyQueue::new(
        server.settings.max_pending_events,
        server.settings.slow_client_policy,
    ));
    session.attach_outbound(Arc::clone(&queue));

    let writer = Arc::new(tokio::sync::Mutex::new(writer));

    // Notification pump: drains the bounded queue onto the shared writer.
    // A disconnect-policy overflow closes the queue, which cancels the
    // session and stops the read loop below.
    let pump = {
        let writer = Arc::clone(&writer);
        let queue = Arc::clone(&queue);
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(value) = queue.pop().await {
                let mut w = writer.lock().await;
                if write_json_line(&mut *w, &value).await.is_err() {
                    break;
                }
            }
            session.cancel.cancel();
        })
    };

    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let result: anyhow::Result<()> = loop {
        line.clear();
        let read = tokio::select! {
            _ = session.cancel.cancelled() => break Ok(()),
            read = read_line_capped(&mut reader, &mut line) => read,
        };
        match read {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e.into()),
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(response) = server.handle_line(&session, text).await {
            let mut w = writer.lock().await;
            if let Err(e) = write_json_line(&mut *w, &response).await {
                break Err(e.into());
            }
        }
    };

    queue.close();
    pump.abort();
    server.teardown(&session).await;
    result
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

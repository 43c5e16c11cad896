// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central request queue: five priority bands, per-session concurrency
//! gating, a shared rate budget, and per-request timeouts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

use crate::error::{timeout_data, RpcCode};
use crate::limiter::TokenBucket;
use crate::rpc::RpcError;
use crate::session::{Session, SessionMode};

/// Dispatch priority, drained highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
    Background = 4,
}

impl Priority {
    pub const COUNT: usize = 5;

    /// Priority derived from the session's declared mode.
    pub fn from_mode(mode: SessionMode) -> Self {
        match mode {
            SessionMode::Interactive => Self::High,
            SessionMode::Background => Self::Low,
            SessionMode::Normal => Self::Normal,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// The work a queued request performs once a worker picks it up.
pub type Job = BoxFuture<'static, Result<Value, RpcError>>;

struct Queued {
    session: Arc<Session>,
    cancel: CancellationToken,
    deadline: Instant,
    enqueued_at: Instant,
    job: Job,
    reply: oneshot::Sender<Result<Value, RpcError>>,
}

/// Queue behavior knobs, derived from config.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub request_timeout: Duration,
    /// Shared budget across sessions; zero disables it.
    pub global_rate: u32,
    pub global_burst: u32,
    /// Maximum requests waiting across all bands.
    pub max_depth: usize,
    /// Per-session concurrent-request cap.
    pub max_inflight_per_session: u32,
}

/// Counters and latency tracking for the queue.
#[derive(Default)]
pub struct QueueMetrics {
    pub started: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub rejected: AtomicU64,
    ema_latency_ms: parking_lot::Mutex<Option<f64>>,
}

/// Point-in-time metrics view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    pub ema_latency_ms: f64,
}

impl QueueMetrics {
    /// Exponential moving average with α = 0.1; seeded by the first sample.
    fn record_latency(&self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        let mut ema = self.ema_latency_ms.lock();
        *ema = Some(match *ema {
            Some(prev) => 0.1 * sample + 0.9 * prev,
            None => sample,
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ema_latency_ms: self.ema_latency_ms.lock().unwrap_or(0.0),
        }
    }
}

/// Five-band priority queue drained by a fixed worker pool.
///
/// Workers always take from the highest non-empty band; a strictly higher
/// band is never starved by a lower one.
pub struct RequestQueue {
    bands: parking_lot::Mutex<[VecDeque<Queued>; Priority::COUNT]>,
    ready: Notify,
    global: Option<TokenBucket>,
    settings: QueueSettings,
    pub metrics: QueueMetrics,
}

impl RequestQueue {
    pub fn new(settings: QueueSettings) -> Arc<Self> {
        let global = if settings.global_rate > 0 {
            Some(TokenBucket::new(settings.global_rate, settings.global_burst))
        } else {
            None
        };
        Arc::new(Self {
            bands: parking_lot::Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            ready: Notify::new(),
            global,
            settings,
            metrics: QueueMetrics::default(),
        })
    }

    /// Start `count` workers that live until `shutdown` fires.
    pub fn spawn_workers(self: &Arc<Self>, count: usize, shutdown: CancellationToken) {
        for _ in 0..count.max(1) {
            let queue = Arc::clone(self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { queue.worker_loop(shutdown).await });
        }
    }

    fn depth(&self) -> usize {
        self.bands.lock().iter().map(VecDeque::len).sum()
    }

    /// Admit a request into the queue and wait for its result.
    ///
    /// `cancel` is the request's context token; it is fired on timeout so
    /// in-flight UI calls unwind at the next tick boundary.
    pub async fn submit(
        &self,
        session: &Arc<Session>,
        priority: Priority,
        cancel: CancellationToken,
        job: Job,
    ) -> Result<Value, RpcError> {
        let inflight = session.inflight.fetch_add(1, Ordering::AcqRel);
        if inflight >= self.settings.max_inflight_per_session {
            session.inflight.fetch_sub(1, Ordering::AcqRel);
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(RpcCode::RequestFailed.to_error("too many concurrent requests"));
        }

        let timeout = self.settings.request_timeout;
        let deadline = Instant::now() + timeout;

        // Shared budget: fairness across sessions, bounded by the deadline.
        if let Some(ref bucket) = self.global {
            if !bucket.take(deadline).await {
                session.inflight.fetch_sub(1, Ordering::AcqRel);
                self.metrics.timed_out.fetch_add(1, Ordering::Relaxed);
                return Err(RpcCode::RequestTimeout
                    .with_data("request timeout", timeout_data(timeout.as_millis() as u64)));
            }
        }

        if self.depth() >= self.settings.max_depth {
            session.inflight.fetch_sub(1, Ordering::AcqRel);
            self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(session = %session.id, "request queue full");
            return Err(RpcCode::RequestFailed.to_error("request queue full"));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut bands = self.bands.lock();
            bands[priority.index()].push_back(Queued {
                session: Arc::clone(session),
                cancel,
                deadline,
                enqueued_at: Instant::now(),
                job,
                reply: reply_tx,
            });
        }
        self.ready.notify_one();

        match reply_rx.await {
            Ok(result) => result,
            Err(_) => Err(RpcCode::Internal.to_error("request dropped during shutdown")),
        }
    }

    fn pop_highest(&self) -> Option<Queued> {
        let mut bands = self.bands.lock();
        bands.iter_mut().find_map(VecDeque::pop_front)
    }

    async fn worker_loop(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let notified = self.ready.notified();
            if shutdown.is_cancelled() {
                break;
            }
            match self.pop_highest() {
                Some(item) => {
                    // Wake a sibling in case more work is queued behind this one.
                    self.ready.notify_one();
                    self.run_one(item).await;
                }
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = notified => {}
                    }
                }
            }
        }
    }

    async fn run_one(&self, item: Queued) {
        self.metrics.started.fetch_add(1, Ordering::Relaxed);
        let timeout_ms = self.settings.request_timeout.as_millis() as u64;

        let now = Instant::now();
        let result = if item.deadline <= now {
            item.cancel.cancel();
            self.metrics.timed_out.fetch_add(1, Ordering::Relaxed);
            Err(RpcCode::RequestTimeout.with_data("request timeout", timeout_data(timeout_ms)))
        } else {
            match tokio::time::timeout(item.deadline - now, item.job).await {
                Ok(result) => {
                    if result.is_err() {
                        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
                    }
                    result
                }
                Err(_) => {
                    item.cancel.cancel();
                    self.metrics.timed_out.fetch_add(1, Ordering::Relaxed);
                    Err(RpcCode::RequestTimeout
                        .with_data("request timeout", timeout_data(timeout_ms)))
                }
            }
        };

        self.metrics.completed.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_latency(item.enqueued_at.elapsed());
        item.session.inflight.fetch_sub(1, Ordering::AcqRel);
        let _ = item.reply.send(result);
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

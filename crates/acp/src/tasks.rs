// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running jobs created by tool calls, with progress and quotas.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Serializable task view returned by the task tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shared handle to a submitted task. Progress and status are safe to read
/// and write from any task.
pub struct TaskHandle {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    /// Owning session id; empty for server-owned tasks.
    pub session_id: String,
    status: parking_lot::Mutex<TaskStatus>,
    progress: AtomicU8,
    error: parking_lot::Mutex<Option<String>>,
    cancel: CancellationToken,
}

impl TaskHandle {
    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    /// Clamp and record progress (0–100).
    pub fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::Release);
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Fire the task's cancellation token. The worker observes it at its
    /// next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            session_id: self.session_id.clone(),
            status: self.status(),
            progress: self.progress(),
            error: self.error.lock().clone(),
        }
    }
}

/// The work a task performs. Receives its own cancellation token and the
/// handle for progress reporting.
pub type TaskFn =
    Box<dyn FnOnce(CancellationToken, Arc<TaskHandle>) -> BoxFuture<'static, Result<(), String>> + Send>;

/// Why a submission was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    GlobalQuota { limit: u32 },
    SessionQuota { limit: u32 },
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GlobalQuota { limit } => {
                write!(f, "background task limit reached ({limit})")
            }
            Self::SessionQuota { limit } => {
                write!(f, "per-session background task limit reached ({limit})")
            }
        }
    }
}

impl std::error::Error for TaskError {}

#[derive(Default)]
struct ActiveCounts {
    global: u32,
    per_session: HashMap<String, u32>,
}

/// Submission quotas.
#[derive(Debug, Clone, Copy)]
pub struct TaskLimits {
    pub max_background_tasks: u32,
    pub max_tasks_per_session: u32,
}

/// Registry and executor for background tasks.
pub struct TaskManager {
    tasks: RwLock<HashMap<TaskId, Arc<TaskHandle>>>,
    counts: Arc<parking_lot::Mutex<ActiveCounts>>,
    next_id: AtomicU64,
    limits: TaskLimits,
}

impl TaskManager {
    pub fn new(limits: TaskLimits) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            counts: Arc::new(parking_lot::Mutex::new(ActiveCounts::default())),
            next_id: AtomicU64::new(1),
            limits,
        }
    }

    /// Submit a task owned by `session_id` (empty for server-owned).
    ///
    /// Quota checks and the reservation happen under one lock so concurrent
    /// submissions cannot both slip past the limit.
    pub async fn submit(
        &self,
        session_id: &str,
        name: impl Into<String>,
        description: impl Into<String>,
        work: TaskFn,
    ) -> Result<Arc<TaskHandle>, TaskError> {
        {
            let mut counts = self.counts.lock();
            if counts.global >= self.limits.max_background_tasks {
                return Err(TaskError::GlobalQuota { limit: self.limits.max_background_tasks });
            }
            if !session_id.is_empty() {
                let used = counts.per_session.get(session_id).copied().unwrap_or(0);
                if used >= self.limits.max_tasks_per_session {
                    return Err(TaskError::SessionQuota {
                        limit: self.limits.max_tasks_per_session,
                    });
                }
                *counts.per_session.entry(session_id.to_owned()).or_insert(0) += 1;
            }
            counts.global += 1;
        }

        let handle = Arc::new(TaskHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            description: description.into(),
            session_id: session_id.to_owned(),
            status: parking_lot::Mutex::new(TaskStatus::Pending),
            progress: AtomicU8::new(0),
            error: parking_lot::Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        self.tasks.write().await.insert(handle.id, Arc::clone(&handle));

        let worker_handle = Arc::clone(&handle);
        let counts = Arc::clone(&self.counts);
        tokio::spawn(async move {
            let token = worker_handle.cancel_token();
            *worker_handle.status.lock() = TaskStatus::Running;
            let work_fut = work(token.clone(), Arc::clone(&worker_handle));

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => TaskStatus::Cancelled,
                result = work_fut => match result {
                    Ok(()) => TaskStatus::Completed,
                    Err(message) => {
                        tracing::debug!(task = worker_handle.id, %message, "background task failed");
                        *worker_handle.error.lock() = Some(message);
                        TaskStatus::Failed
                    }
                },
            };
            *worker_handle.status.lock() = outcome;
            if outcome == TaskStatus::Completed {
                worker_handle.set_progress(100);
            }

            let mut counts = counts.lock();
            counts.global = counts.global.saturating_sub(1);
            if !worker_handle.session_id.is_empty() {
                if let Some(used) = counts.per_session.get_mut(&worker_handle.session_id) {
                    *used = used.saturating_sub(1);
                    if *used == 0 {
                        counts.per_session.remove(&worker_handle.session_id);
                    }
                }
            }
        });

        Ok(handle)
    }

    pub async fn get(&self, id: TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<TaskInfo> {
        let mut out: Vec<TaskInfo> =
            self.tasks.read().await.values().map(|t| t.info()).collect();
        out.sort_by_key(|t| t.id);
        out
    }

    pub async fn list_for_session(&self, session_id: &str) -> Vec<TaskInfo> {
        let mut out: Vec<TaskInfo> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.session_id == session_id)
            .map(|t| t.info())
            .collect();
        out.sort_by_key(|t| t.id);
        out
    }

    /// Cancel one task. Returns false when the id is unknown.
    pub async fn cancel(&self, id: TaskId) -> bool {
        match self.tasks.read().await.get(&id) {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    /// Session teardown: cancel every task the session owns.
    pub async fn cancel_session(&self, session_id: &str) {
        for task in self.tasks.read().await.values() {
            if task.session_id == session_id && !task.status().is_terminal() {
                task.cancel();
            }
        }
    }

    /// Session teardown: drop the session's task handles from the registry
    /// so records do not accumulate across sessions. Workers hold their own
    /// handles, so an in-flight cancellation still runs down and releases
    /// its quota.
    pub async fn remove_session(&self, session_id: &str) {
        self.tasks.write().await.retain(|_, t| t.session_id != session_id);
    }
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;

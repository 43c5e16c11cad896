// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session records and the admission checks every request passes through.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{rate_limit_data, RpcCode};
use crate::limiter::TokenBucket;
use crate::rpc::RpcError;
use crate::transport::{NotifyQueue, PushOutcome};

/// Scheduling hint a client declares at initialize time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionMode {
    Interactive,
    #[default]
    Normal,
    Background,
}

impl SessionMode {
    pub fn parse(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "interactive" => Self::Interactive,
            "background" => Self::Background,
            _ => Self::Normal,
        }
    }
}

/// One connected client. Flags are atomic so admission never takes the
/// session table lock for per-session state.
pub struct Session {
    pub id: String,
    pub created_at: Instant,
    last_seen: parking_lot::Mutex<Instant>,
    authed: AtomicBool,
    rejected: AtomicBool,
    /// SHA-256 hex digest of the token this session authenticated with.
    token_digest: parking_lot::Mutex<Option<String>>,
    /// Bearer token plumbed in by the transport (event-stream connections).
    bearer: parking_lot::Mutex<Option<String>>,
    pub limiter: Option<TokenBucket>,
    /// Requests currently admitted and not yet completed.
    pub inflight: AtomicU32,
    mode: parking_lot::Mutex<SessionMode>,
    subscriptions: RwLock<BTreeSet<String>>,
    outbound: parking_lot::Mutex<Option<Arc<NotifyQueue>>>,
    /// Cancelled on teardown; request contexts derive from it.
    pub cancel: CancellationToken,
}

impl Session {
    fn new(id: String, authed: bool, limiter: Option<TokenBucket>, bearer: Option<String>) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_seen: parking_lot::Mutex::new(Instant::now()),
            authed: AtomicBool::new(authed),
            rejected: AtomicBool::new(false),
            token_digest: parking_lot::Mutex::new(None),
            bearer: parking_lot::Mutex::new(bearer),
            limiter,
            inflight: AtomicU32::new(0),
            mode: parking_lot::Mutex::new(SessionMode::Normal),
            subscriptions: RwLock::new(BTreeSet::new()),
            outbound: parking_lot::Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn is_authed(&self) -> bool {
        self.authed.load(Ordering::Acquire)
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> SessionMode {
        *self.mode.lock()
    }

    pub fn set_mode(&self, mode: SessionMode) {
        *self.mode.lock() = mode;
    }

    pub fn bearer(&self) -> Option<String> {
        self.bearer.lock().clone()
    }

    pub fn token_digest(&self) -> Option<String> {
        self.token_digest.lock().clone()
    }

    /// Record a subscription. Returns false when already subscribed
    /// (idempotent: at most one subscription per URI).
    pub async fn subscribe(&self, uri: &str) -> bool {
        self.subscriptions.write().await.insert(uri.to_owned())
    }

    pub async fn unsubscribe(&self, uri: &str) -> bool {
        self.subscriptions.write().await.remove(uri)
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().await.iter().cloned().collect()
    }

    pub async fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions.read().await.contains(uri)
    }

    /// Attach the connection's bounded notification queue.
    pub fn attach_outbound(&self, queue: Arc<NotifyQueue>) {
        *self.outbound.lock() = Some(queue);
    }

    /// Best-effort notification delivery through the attached queue.
    pub fn notify(&self, value: serde_json::Value) -> PushOutcome {
        let queue = self.outbound.lock().clone();
        match queue {
            Some(q) => q.push(value),
            None => PushOutcome::Dropped,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("authed", &self.is_authed())
            .field("rejected", &self.is_rejected())
            .finish()
    }
}

/// Why a request was refused admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    AuthRequired,
    AuthFailed,
    SessionExpired,
    TooManySessions,
    RateLimited { retry_after_ms: u64, limit: u32 },
}

impl AdmissionError {
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::AuthRequired => RpcCode::AuthRequired.to_error("authentication required"),
            Self::AuthFailed => RpcCode::AuthRequired.to_error("authentication failed"),
            Self::SessionExpired => RpcCode::AuthRequired.to_error("session expired"),
            Self::TooManySessions => RpcCode::TooManySessions.to_error("too many sessions"),
            Self::RateLimited { retry_after_ms, limit } => RpcCode::RateLimited
                .with_data("rate limit exceeded", rate_limit_data(*retry_after_ms, *limit)),
        }
    }
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let err = self.to_rpc_error();
        write!(f, "{} ({})", err.message, err.code)
    }
}

impl std::error::Error for AdmissionError {}

/// Settings the manager enforces, derived from config.
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    pub max_sessions: usize,
    /// Zero disables idle expiry.
    pub session_timeout: Duration,
    /// Tokens per second; zero disables per-session rate limiting.
    pub rate_limit: u32,
    /// Zero selects the default burst of 2× rate.
    pub rate_burst: u32,
    pub auth_token: Option<String>,
}

/// Registry of live sessions plus the admission gate.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    settings: AdmissionSettings,
}

impl SessionManager {
    pub fn new(settings: AdmissionSettings) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), settings }
    }

    pub fn auth_configured(&self) -> bool {
        self.settings.auth_token.is_some()
    }

    /// Create and register a session for a new connection.
    ///
    /// When the table is already at capacity the session is still registered
    /// but marked rejected; every later admission fails with `-32002` until
    /// the connection closes.
    pub async fn register(&self, bearer: Option<String>) -> Arc<Session> {
        let limiter = if self.settings.rate_limit > 0 {
            Some(TokenBucket::new(self.settings.rate_limit, self.settings.rate_burst))
        } else {
            None
        };
        let authed = self.settings.auth_token.is_none();
        let session =
            Arc::new(Session::new(uuid::Uuid::new_v4().to_string(), authed, limiter, bearer));

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.settings.max_sessions {
            session.rejected.store(true, Ordering::Release);
            tracing::warn!(session = %session.id, "session capacity reached, marking rejected");
        }
        sessions.insert(session.id.clone(), Arc::clone(&session));
        session
    }

    /// Remove a session and cancel everything bound to it.
    pub async fn unregister(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(id)?;
        session.cancel.cancel();
        if let Some(queue) = session.outbound.lock().clone() {
            queue.close();
        }
        Some(session)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Admission gate, in order: capacity, authentication, idle expiry,
    /// rate limit. Successful admission refreshes `last_seen`.
    pub async fn admit(&self, session: &Arc<Session>, method: &str) -> Result<(), AdmissionError> {
        if session.is_rejected() {
            return Err(AdmissionError::TooManySessions);
        }
        if self.auth_configured() && !session.is_authed() && method != "initialize" {
            return Err(AdmissionError::AuthRequired);
        }
        if self.settings.session_timeout > Duration::ZERO
            && session.idle_for() > self.settings.session_timeout
        {
            self.unregister(&session.id).await;
            return Err(AdmissionError::SessionExpired);
        }
        if let Some(ref limiter) = session.limiter {
            if let Err(retry_after) = limiter.try_take() {
                return Err(AdmissionError::RateLimited {
                    retry_after_ms: (retry_after.as_millis() as u64).max(1),
                    limit: limiter.limit(),
                });
            }
        }
        session.touch();
        Ok(())
    }

    /// Validate an `initialize` token against the configured one.
    ///
    /// The token may come from request params or from the transport's bearer
    /// context. On success the session is marked authed and the token digest
    /// recorded.
    pub fn authenticate(
        &self,
        session: &Session,
        presented: Option<&str>,
    ) -> Result<(), AdmissionError> {
        let expected = match self.settings.auth_token.as_deref() {
            Some(tok) => tok,
            None => return Ok(()),
        };
        let bearer = session.bearer();
        let presented = presented
            .or(bearer.as_deref())
            .ok_or(AdmissionError::AuthRequired)?;
        if !constant_time_eq(presented, expected) {
            return Err(AdmissionError::AuthFailed);
        }
        session.authed.store(true, Ordering::Release);
        *session.token_digest.lock() = Some(token_digest(presented));
        Ok(())
    }
}

/// Constant-time string comparison to prevent timing side-channel attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// SHA-256 hex digest of a token, for logging and session records.
pub fn token_digest(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

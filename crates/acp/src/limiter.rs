// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiter used per-session and as the shared queue budget.

use std::time::{Duration, Instant};

/// A token bucket refilled continuously at `rate` tokens per second, capped
/// at `burst`. Internally synchronized; callers share it behind an `Arc`.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    inner: parking_lot::Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    /// `burst == 0` selects the default burst of 2× rate.
    pub fn new(rate: u32, burst: u32) -> Self {
        let rate = rate.max(1) as f64;
        let burst = if burst == 0 { rate * 2.0 } else { burst as f64 };
        Self {
            rate,
            burst,
            inner: parking_lot::Mutex::new(BucketState {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.rate as u32
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.refilled_at = now;
    }

    /// Take one token. On refusal returns how long until a token is due.
    pub fn try_take(&self) -> Result<(), Duration> {
        self.try_take_at(Instant::now())
    }

    fn try_take_at(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.inner.lock();
        self.refill(&mut state, now);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - state.tokens;
        Err(Duration::from_secs_f64(deficit / self.rate))
    }

    /// Wait for a token, giving up at `deadline`. Returns false on deadline.
    pub async fn take(&self, deadline: Instant) -> bool {
        loop {
            match self.try_take() {
                Ok(()) => return true,
                Err(retry_after) => {
                    let now = Instant::now();
                    if now + retry_after > deadline {
                        return false;
                    }
                    tokio::time::sleep(retry_after).await;
                }
            }
        }
    }

    /// Current token count (refilled to now). Test and metrics accessor.
    pub fn available(&self) -> f64 {
        let mut state = self.inner.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    pub fn burst(&self) -> f64 {
        self.burst
    }
}

#[cfg(test)]
#[path = "limiter_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge between protocol handlers and the single-threaded UI loop.
//!
//! Handlers never touch the UI directly: every capability call is posted
//! onto an mpsc channel as a [`UiCall`] and answered over a oneshot. The UI
//! side drains the channel at frame boundaries via [`serve`] (dedicated
//! task) or [`drain_ready`] (inside an existing frame loop). Only the loop
//! side ever mutates widget state.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::keys::{KeyEvent, MouseEvent};
use crate::snapshot::{Dimensions, Snapshot};

/// One screen cell, as reported by `cell_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
}

/// Capability surface the UI host implements.
///
/// All methods run on the UI loop; implementations may assume exclusive
/// access to widget state for the duration of a call.
pub trait UiAgent: Send {
    /// Capture a consistent widget tree at a frame boundary.
    fn snapshot(&mut self, include_text: bool) -> anyhow::Result<Snapshot>;
    fn focus_by_id(&mut self, id: &str) -> anyhow::Result<()>;
    fn clear_focus(&mut self);
    /// Advance one frame so reads after a mutation observe its effect.
    fn tick(&mut self);
    fn send_key(&mut self, key: KeyEvent) -> anyhow::Result<()>;
    fn send_mouse(&mut self, event: MouseEvent) -> anyhow::Result<()>;
    fn send_resize(&mut self, width: u16, height: u16);
    fn capture_text(&mut self) -> anyhow::Result<String>;
    fn capture_region(&mut self, x: u16, y: u16, width: u16, height: u16)
        -> anyhow::Result<String>;
    fn cell_at(&mut self, x: u16, y: u16) -> anyhow::Result<Cell>;
    fn dimensions(&mut self) -> Dimensions;
    /// Select a named option on a widget (lists, selects).
    fn select_by_id(&mut self, id: &str, option: &str) -> anyhow::Result<()>;
    fn clipboard_read(&mut self) -> anyhow::Result<String>;
    fn clipboard_write(&mut self, text: &str) -> anyhow::Result<()>;
}

/// A queued capability call with its reply channel.
pub enum UiCall {
    Snapshot { include_text: bool, reply: oneshot::Sender<anyhow::Result<Snapshot>> },
    FocusById { id: String, reply: oneshot::Sender<anyhow::Result<()>> },
    ClearFocus { reply: oneshot::Sender<()> },
    Tick { reply: oneshot::Sender<()> },
    SendKey { key: KeyEvent, reply: oneshot::Sender<anyhow::Result<()>> },
    SendMouse { event: MouseEvent, reply: oneshot::Sender<anyhow::Result<()>> },
    SendResize { width: u16, height: u16, reply: oneshot::Sender<()> },
    CaptureText { reply: oneshot::Sender<anyhow::Result<String>> },
    CaptureRegion { x: u16, y: u16, width: u16, height: u16, reply: oneshot::Sender<anyhow::Result<String>> },
    CellAt { x: u16, y: u16, reply: oneshot::Sender<anyhow::Result<Cell>> },
    Dimensions { reply: oneshot::Sender<Dimensions> },
    SelectById { id: String, option: String, reply: oneshot::Sender<anyhow::Result<()>> },
    ClipboardRead { reply: oneshot::Sender<anyhow::Result<String>> },
    ClipboardWrite { text: String, reply: oneshot::Sender<anyhow::Result<()>> },
}

/// Errors crossing the bridge back to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The UI loop has shut down.
    Closed,
    /// The request was cancelled before the UI answered.
    Cancelled,
    /// The capability itself failed.
    Ui(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("ui loop closed"),
            Self::Cancelled => f.write_str("request cancelled"),
            Self::Ui(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Handle used by dispatch-side code to reach the UI loop.
#[derive(Clone)]
pub struct UiBridge {
    call_tx: mpsc::Sender<UiCall>,
}

impl UiBridge {
    /// Create a bridge and the receiver the UI loop drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<UiCall>) {
        let (call_tx, call_rx) = mpsc::channel(capacity);
        (Self { call_tx }, call_rx)
    }

    async fn call<T>(
        &self,
        cancel: &CancellationToken,
        build: impl FnOnce(oneshot::Sender<T>) -> UiCall,
    ) -> Result<T, BridgeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.call_tx.send(build(reply_tx)).await.map_err(|_| BridgeError::Closed)?;
        tokio::select! {
            _ = cancel.cancelled() => Err(BridgeError::Cancelled),
            reply = reply_rx => reply.map_err(|_| BridgeError::Closed),
        }
    }

    fn flatten<T>(reply: Result<anyhow::Result<T>, BridgeError>) -> Result<T, BridgeError> {
        match reply {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(BridgeError::Ui(format!("{e:#}"))),
            Err(e) => Err(e),
        }
    }

    pub async fn snapshot(
        &self,
        cancel: &CancellationToken,
        include_text: bool,
    ) -> Result<Snapshot, BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::Snapshot { include_text, reply }).await)
    }

    /// Focus a widget and advance one frame.
    pub async fn focus_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> Result<(), BridgeError> {
        let id = id.to_owned();
        Self::flatten(self.call(cancel, |reply| UiCall::FocusById { id, reply }).await)?;
        self.tick(cancel).await
    }

    pub async fn clear_focus(&self, cancel: &CancellationToken) -> Result<(), BridgeError> {
        self.call(cancel, |reply| UiCall::ClearFocus { reply }).await?;
        self.tick(cancel).await
    }

    pub async fn tick(&self, cancel: &CancellationToken) -> Result<(), BridgeError> {
        self.call(cancel, |reply| UiCall::Tick { reply }).await
    }

    /// Inject a key press and advance one frame.
    pub async fn send_key(
        &self,
        cancel: &CancellationToken,
        key: KeyEvent,
    ) -> Result<(), BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::SendKey { key, reply }).await)?;
        self.tick(cancel).await
    }

    /// Inject a sequence of key presses, then advance one frame.
    pub async fn send_keys(
        &self,
        cancel: &CancellationToken,
        keys: impl IntoIterator<Item = KeyEvent>,
    ) -> Result<(), BridgeError> {
        for key in keys {
            Self::flatten(self.call(cancel, |reply| UiCall::SendKey { key, reply }).await)?;
        }
        self.tick(cancel).await
    }

    /// Inject a mouse event and advance one frame.
    pub async fn send_mouse(
        &self,
        cancel: &CancellationToken,
        event: MouseEvent,
    ) -> Result<(), BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::SendMouse { event, reply }).await)?;
        self.tick(cancel).await
    }

    pub async fn send_resize(
        &self,
        cancel: &CancellationToken,
        width: u16,
        height: u16,
    ) -> Result<(), BridgeError> {
        self.call(cancel, |reply| UiCall::SendResize { width, height, reply }).await?;
        self.tick(cancel).await
    }

    pub async fn capture_text(&self, cancel: &CancellationToken) -> Result<String, BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::CaptureText { reply }).await)
    }

    pub async fn capture_region(
        &self,
        cancel: &CancellationToken,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    ) -> Result<String, BridgeError> {
        Self::flatten(
            self.call(cancel, |reply| UiCall::CaptureRegion { x, y, width, height, reply }).await,
        )
    }

    pub async fn cell_at(
        &self,
        cancel: &CancellationToken,
        x: u16,
        y: u16,
    ) -> Result<Cell, BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::CellAt { x, y, reply }).await)
    }

    pub async fn dimensions(&self, cancel: &CancellationToken) -> Result<Dimensions, BridgeError> {
        self.call(cancel, |reply| UiCall::Dimensions { reply }).await
    }

    /// Select a named option and advance one frame.
    pub async fn select_by_id(
        &self,
        cancel: &CancellationToken,
        id: &str,
        option: &str,
    ) -> Result<(), BridgeError> {
        let id = id.to_owned();
        let option = option.to_owned();
        Self::flatten(self.call(cancel, |reply| UiCall::SelectById { id, option, reply }).await)?;
        self.tick(cancel).await
    }

    pub async fn clipboard_read(&self, cancel: &CancellationToken) -> Result<String, BridgeError> {
        Self::flatten(self.call(cancel, |reply| UiCall::ClipboardRead { reply }).await)
    }

    pub async fn clipboard_write(
        &self,
        cancel: &CancellationToken,
        text: &str,
    ) -> Result<(), BridgeError> {
        let text = text.to_owned();
        Self::flatten(self.call(cancel, |reply| UiCall::ClipboardWrite { text, reply }).await)
    }
}

/// Answer one queued call against the agent.
pub fn serve_call(agent: &mut dyn UiAgent, call: UiCall) {
    match call {
        UiCall::Snapshot { include_text, reply } => {
            let _ = reply.send(agent.snapshot(include_text));
        }
        UiCall::FocusById { id, reply } => {
            let _ = reply.send(agent.focus_by_id(&id));
        }
        UiCall::ClearFocus { reply } => {
            agent.clear_focus();
            let _ = reply.send(());
        }
        UiCall::Tick { reply } => {
            agent.tick();
            let _ = reply.send(());
        }
        UiCall::SendKey { key, reply } => {
            let _ = reply.send(agent.send_key(key));
        }
        UiCall::SendMouse { event, reply } => {
            let _ = reply.send(agent.send_mouse(event));
        }
        UiCall::SendResize { width, height, reply } => {
            agent.send_resize(width, height);
            let _ = reply.send(());
        }
        UiCall::CaptureText { reply } => {
            let _ = reply.send(agent.capture_text());
        }
        UiCall::CaptureRegion { x, y, width, height, reply } => {
            let _ = reply.send(agent.capture_region(x, y, width, height));
        }
        UiCall::CellAt { x, y, reply } => {
            let _ = reply.send(agent.cell_at(x, y));
        }
        UiCall::Dimensions { reply } => {
            let _ = reply.send(agent.dimensions());
        }
        UiCall::SelectById { id, option, reply } => {
            let _ = reply.send(agent.select_by_id(&id, &option));
        }
        UiCall::ClipboardRead { reply } => {
            let _ = reply.send(agent.clipboard_read());
        }
        UiCall::ClipboardWrite { text, reply } => {
            let _ = reply.send(agent.clipboard_write(&text));
        }
    }
}

/// Drain calls until the bridge side closes. For hosts that dedicate a task
/// (or thread) to the UI loop.
pub async fn serve(agent: &mut dyn UiAgent, call_rx: &mut mpsc::Receiver<UiCall>) {
    while let Some(call) = call_rx.recv().await {
        serve_call(agent, call);
    }
}

/// Answer every call already queued without blocking. For hosts that drain
/// the bridge inside their own frame loop.
pub fn drain_ready(agent: &mut dyn UiAgent, call_rx: &mut mpsc::Receiver<UiCall>) {
    while let Ok(call) = call_rx.try_recv() {
        serve_call(agent, call);
    }
}

#[cfg(test)]
#[path = "ui_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: builders, the scripted UI agent, and helpers.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::keys::{KeyCode, KeyEvent, MouseEvent};
use crate::snapshot::{epoch_ms, Dimensions, Snapshot};
use crate::ui::{Cell, UiAgent, UiBridge};
use crate::widget::{Bounds, Role, StateSet, Widget};

/// Build a widget with sensible defaults for its role.
pub fn named_widget(id: &str, role: Role, label: &str) -> Widget {
    let actions: &[&str] = match role {
        Role::Button => &["activate"],
        Role::Checkbox | Role::Radio => &["toggle"],
        Role::Input => &["type", "clear"],
        Role::List | Role::Tree => &["scroll", "select"],
        Role::ListItem | Role::TreeItem | Role::MenuItem | Role::Tab => &["activate"],
        _ => &[],
    };
    Widget {
        id: id.to_owned(),
        role,
        label: label.to_owned(),
        value: String::new(),
        description: String::new(),
        bounds: Bounds::new(0, 0, 10, 1),
        state: StateSet::default(),
        actions: actions.iter().map(|a| (*a).to_owned()).collect(),
        children_ids: Vec::new(),
        parent_id: None,
    }
}

/// Build a widget parented under `parent_id`.
pub fn child_widget(id: &str, role: Role, label: &str, parent_id: &str) -> Widget {
    let mut w = named_widget(id, role, label);
    w.parent_id = Some(parent_id.to_owned());
    w
}

/// Assemble a snapshot from widgets, deriving focus and layer count.
pub fn snapshot_of(widgets: Vec<Widget>) -> Snapshot {
    let focused_id = widgets.iter().find(|w| w.state.focused).map(|w| w.id.clone());
    let layer_count = widgets.iter().map(|w| w.layer() + 1).max().unwrap_or(1);
    Snapshot {
        captured_at_ms: epoch_ms(),
        dimensions: Dimensions { width: 80, height: 24 },
        layer_count,
        focused_id,
        widgets,
        text: None,
    }
}

/// Mutable state behind [`ScriptedUi`], shared with the test through a probe.
#[derive(Default)]
pub struct UiScript {
    pub snapshot: Snapshot,
    /// Snapshots to serve on future captures (id-regeneration scenarios).
    pub queued: VecDeque<Snapshot>,
    pub text: String,
    pub clipboard: String,
    pub keys: Vec<KeyEvent>,
    pub mice: Vec<MouseEvent>,
    pub selections: Vec<(String, String)>,
    pub resizes: Vec<(u16, u16)>,
    pub ticks: u64,
}

pub type UiProbe = Arc<parking_lot::Mutex<UiScript>>;

/// Deterministic in-memory UI agent.
///
/// Implements just enough widget semantics for protocol tests: focus
/// mutates the snapshot, space toggles a focused checkbox, characters append
/// to a focused input.
pub struct ScriptedUi {
    state: UiProbe,
}

impl ScriptedUi {
    pub fn new(initial: Snapshot) -> (Self, UiProbe) {
        let state = Arc::new(parking_lot::Mutex::new(UiScript {
            snapshot: initial,
            ..UiScript::default()
        }));
        (Self { state: Arc::clone(&state) }, state)
    }

    fn apply_key(script: &mut UiScript, key: KeyEvent) {
        let focused_id = match script.snapshot.focused_id.clone() {
            Some(id) => id,
            None => return,
        };
        let Some(widget) = script.snapshot.widgets.iter_mut().find(|w| w.id == focused_id) else {
            return;
        };
        match key.code {
            KeyCode::Char(' ') if matches!(widget.role, Role::Checkbox | Role::Radio) => {
                let current = widget.state.checked.unwrap_or(false);
                widget.state.checked = Some(!current);
            }
            KeyCode::Char(ch) if widget.role == Role::Input && !key.modifiers.ctrl => {
                widget.value.push(ch);
            }
            KeyCode::Backspace if widget.role == Role::Input => {
                widget.value.pop();
            }
            _ => {}
        }
    }
}

impl UiAgent for ScriptedUi {
    fn snapshot(&mut self, include_text: bool) -> anyhow::Result<Snapshot> {
        let mut script = self.state.lock();
        if let Some(next) = script.queued.pop_front() {
            script.snapshot = next;
        }
        let mut snap = script.snapshot.clone();
        snap.captured_at_ms = epoch_ms();
        snap.text = include_text.then(|| script.text.clone());
        Ok(snap)
    }

    fn focus_by_id(&mut self, id: &str) -> anyhow::Result<()> {
        let mut script = self.state.lock();
        if !script.snapshot.contains(id) {
            anyhow::bail!("no widget with id {id}");
        }
        for w in &mut script.snapshot.widgets {
            w.state.focused = w.id == id;
        }
        script.snapshot.focused_id = Some(id.to_owned());
        Ok(())
    }

    fn clear_focus(&mut self) {
        let mut script = self.state.lock();
        for w in &mut script.snapshot.widgets {
            w.state.focused = false;
        }
        script.snapshot.focused_id = None;
    }

    fn tick(&mut self) {
        self.state.lock().ticks += 1;
    }

    fn send_key(&mut self, key: KeyEvent) -> anyhow::Result<()> {
        let mut script = self.state.lock();
        script.keys.push(key);
        Self::apply_key(&mut script, key);
        Ok(())
    }

    fn send_mouse(&mut self, event: MouseEvent) -> anyhow::Result<()> {
        self.state.lock().mice.push(event);
        Ok(())
    }

    fn send_resize(&mut self, width: u16, height: u16) {
        let mut script = self.state.lock();
        script.resizes.push((width, height));
        script.snapshot.dimensions = Dimensions { width, height };
    }

    fn capture_text(&mut self) -> anyhow::Result<String> {
        Ok(self.state.lock().text.clone())
    }

    fn capture_region(&mut self, x: u16, y: u16, width: u16, height: u16)
        -> anyhow::Result<String> {
        Ok(format!("region({x},{y},{width},{height})"))
    }

    fn cell_at(&mut self, x: u16, y: u16) -> anyhow::Result<Cell> {
        let _ = (x, y);
        Ok(Cell { symbol: "x".to_owned(), fg: None, bg: None })
    }

    fn dimensions(&mut self) -> Dimensions {
        self.state.lock().snapshot.dimensions
    }

    fn select_by_id(&mut self, id: &str, option: &str) -> anyhow::Result<()> {
        let mut script = self.state.lock();
        script.selections.push((id.to_owned(), option.to_owned()));
        match script.snapshot.widgets.iter_mut().find(|w| w.id == id) {
            Some(widget) => {
                widget.value = option.to_owned();
                Ok(())
            }
            None => anyhow::bail!("no widget with id {id}"),
        }
    }

    fn clipboard_read(&mut self) -> anyhow::Result<String> {
        Ok(self.state.lock().clipboard.clone())
    }

    fn clipboard_write(&mut self, text: &str) -> anyhow::Result<()> {
        self.state.lock().clipboard = text.to_owned();
        Ok(())
    }
}

/// Run a scripted UI on its own task and hand back the bridge.
pub fn spawn_ui(initial: Snapshot) -> (UiBridge, UiProbe, JoinHandle<()>) {
    let (agent, probe) = ScriptedUi::new(initial);
    let (bridge, mut call_rx) = UiBridge::channel(64);
    let handle = tokio::spawn(async move {
        let mut agent = agent;
        crate::ui::serve(&mut agent, &mut call_rx).await;
    });
    (bridge, probe, handle)
}

/// Extension trait to convert any `Display` error into `anyhow::Error`.
/// Replaces `.map_err(|e| anyhow::anyhow!("{e}"))` with `.anyhow()`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

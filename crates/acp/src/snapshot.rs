// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flattened widget-tree snapshots captured from the UI at frame boundaries.

use serde::{Deserialize, Serialize};

use crate::widget::{explicit_base_of, Widget};

/// Screen dimensions in cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u16,
    pub height: u16,
}

/// An immutable capture of the widget tree plus screen metadata.
///
/// Widgets are stored in depth-first pre-order. The snapshot is created by
/// the UI bridge and owned by the caller; it never observes later UI state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture time, epoch milliseconds.
    pub captured_at_ms: u64,
    pub dimensions: Dimensions,
    pub layer_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_id: Option<String>,
    pub widgets: Vec<Widget>,
    /// Rendered screen text, present only when requested and permitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Snapshot {
    pub fn widget(&self, id: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    /// Pre-order index of a widget, used as the final resolution tie-break.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.widgets.iter().position(|w| w.id == id)
    }

    pub fn focused(&self) -> Option<&Widget> {
        self.focused_id.as_deref().and_then(|id| self.widget(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.widgets.iter().any(|w| w.id == id)
    }

    /// Resolve an id that may be either a full widget id or an explicit base
    /// id. A base id resolves only when exactly one widget carries it.
    pub fn resolve_id(&self, id: &str) -> Option<&Widget> {
        if let Some(w) = self.widget(id) {
            return Some(w);
        }
        let mut matches = self.widgets.iter().filter(|w| {
            explicit_base_of(&w.id).as_deref() == Some(id)
        });
        let first = matches.next()?;
        if matches.next().is_some() {
            return None;
        }
        Some(first)
    }

    pub fn children_of(&self, id: &str) -> Vec<&Widget> {
        match self.widget(id) {
            Some(w) => w.children_ids.iter().filter_map(|c| self.widget(c)).collect(),
            None => Vec::new(),
        }
    }

    pub fn parent_of(&self, id: &str) -> Option<&Widget> {
        self.widget(id).and_then(|w| w.parent_id.as_deref()).and_then(|p| self.widget(p))
    }

    /// Widgets sharing this widget's parent, excluding the widget itself.
    pub fn siblings_of(&self, id: &str) -> Vec<&Widget> {
        match self.parent_of(id) {
            Some(parent) => {
                parent.children_ids.iter().filter(|c| *c != id).filter_map(|c| self.widget(c)).collect()
            }
            None => Vec::new(),
        }
    }

    /// All transitive children in pre-order.
    pub fn descendants_of(&self, id: &str) -> Vec<&Widget> {
        let mut out = Vec::new();
        let mut stack: Vec<&str> = match self.widget(id) {
            Some(w) => w.children_ids.iter().rev().map(String::as_str).collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            if let Some(w) = self.widget(next) {
                out.push(w);
                stack.extend(w.children_ids.iter().rev().map(String::as_str));
            }
        }
        out
    }

    /// Chain of parents from the immediate parent to the root.
    pub fn ancestors_of(&self, id: &str) -> Vec<&Widget> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(w) = current {
            out.push(w);
            current = w.parent_id.as_deref().and_then(|p| self.widget(p));
        }
        out
    }

    /// Focusable widgets in pre-order.
    pub fn focusables(&self) -> Vec<&Widget> {
        self.widgets.iter().filter(|w| w.is_focusable()).collect()
    }

    /// Check the structural invariants: unique ids and resolvable parents.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut seen = std::collections::HashSet::with_capacity(self.widgets.len());
        for w in &self.widgets {
            if !seen.insert(w.id.as_str()) {
                anyhow::bail!("duplicate widget id: {}", w.id);
            }
        }
        for w in &self.widgets {
            if let Some(ref parent) = w.parent_id {
                if !seen.contains(parent.as_str()) {
                    anyhow::bail!("widget {} has missing parent {parent}", w.id);
                }
            }
        }
        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            captured_at_ms: 0,
            dimensions: Dimensions::default(),
            layer_count: 1,
            focused_id: None,
            widgets: Vec::new(),
            text: None,
        }
    }
}

/// Current epoch milliseconds.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural diff between two snapshots.
//!
//! Added/removed/modified collections are sets — their order is not part of
//! the contract. Field-change keys are a closed set (`label`, `bounds`,
//! `state.checked`, …) and every entry carries both old and new values.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshot::Snapshot;
use crate::widget::Widget;

/// Old/new pair for a single field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub old: Value,
    pub new: Value,
}

/// Field-change map for one surviving widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetChange {
    pub id: String,
    pub fields: BTreeMap<String, FieldDelta>,
}

/// Structural delta between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<WidgetChange>,
    pub text_changed: bool,
    pub dimensions_changed: bool,
    pub layer_count_changed: bool,
    pub focus_changed: bool,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && !self.text_changed
            && !self.dimensions_changed
            && !self.layer_count_changed
            && !self.focus_changed
    }

    /// Any widget-level change at all (ignores the top-level flags).
    pub fn has_structural_change(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    pub fn change_for(&self, id: &str) -> Option<&WidgetChange> {
        self.modified.iter().find(|c| c.id == id)
    }
}

fn jv<T: Serialize>(v: &T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn delta<T: Serialize>(fields: &mut BTreeMap<String, FieldDelta>, path: &str, old: &T, new: &T) {
    fields.insert(path.to_owned(), FieldDelta { old: jv(old), new: jv(new) });
}

/// Per-field comparison of one widget across two snapshots.
pub fn diff_widget(before: &Widget, after: &Widget) -> BTreeMap<String, FieldDelta> {
    let mut fields = BTreeMap::new();

    if before.label != after.label {
        delta(&mut fields, "label", &before.label, &after.label);
    }
    if before.value != after.value {
        delta(&mut fields, "value", &before.value, &after.value);
    }
    if before.description != after.description {
        delta(&mut fields, "description", &before.description, &after.description);
    }
    if before.role != after.role {
        delta(&mut fields, "role", &before.role, &after.role);
    }
    if before.bounds != after.bounds {
        delta(&mut fields, "bounds", &before.bounds, &after.bounds);
    }
    if before.actions != after.actions {
        delta(&mut fields, "actions", &before.actions, &after.actions);
    }
    if before.children_ids != after.children_ids {
        delta(&mut fields, "children_ids", &before.children_ids, &after.children_ids);
    }
    if before.parent_id != after.parent_id {
        delta(&mut fields, "parent_id", &before.parent_id, &after.parent_id);
    }

    let b = &before.state;
    let a = &after.state;
    if b.focused != a.focused {
        delta(&mut fields, "state.focused", &b.focused, &a.focused);
    }
    if b.disabled != a.disabled {
        delta(&mut fields, "state.disabled", &b.disabled, &a.disabled);
    }
    if b.hidden != a.hidden {
        delta(&mut fields, "state.hidden", &b.hidden, &a.hidden);
    }
    if b.selected != a.selected {
        delta(&mut fields, "state.selected", &b.selected, &a.selected);
    }
    if b.pressed != a.pressed {
        delta(&mut fields, "state.pressed", &b.pressed, &a.pressed);
    }
    if b.readonly != a.readonly {
        delta(&mut fields, "state.readonly", &b.readonly, &a.readonly);
    }
    if b.required != a.required {
        delta(&mut fields, "state.required", &b.required, &a.required);
    }
    if b.invalid != a.invalid {
        delta(&mut fields, "state.invalid", &b.invalid, &a.invalid);
    }
    if b.busy != a.busy {
        delta(&mut fields, "state.busy", &b.busy, &a.busy);
    }
    // Tri-states compare on both presence and value.
    if b.checked != a.checked {
        delta(&mut fields, "state.checked", &b.checked, &a.checked);
    }
    if b.expanded != a.expanded {
        delta(&mut fields, "state.expanded", &b.expanded, &a.expanded);
    }

    fields
}

/// Compute the structural delta from `before` to `after`.
///
/// The text flag is only meaningful when both snapshots carry rendered text;
/// a capture without text never reports a text change.
pub fn diff_snapshots(before: &Snapshot, after: &Snapshot) -> SnapshotDiff {
    let before_ids: HashMap<&str, &Widget> =
        before.widgets.iter().map(|w| (w.id.as_str(), w)).collect();
    let after_ids: HashMap<&str, &Widget> =
        after.widgets.iter().map(|w| (w.id.as_str(), w)).collect();

    let added = after
        .widgets
        .iter()
        .filter(|w| !before_ids.contains_key(w.id.as_str()))
        .map(|w| w.id.clone())
        .collect();
    let removed = before
        .widgets
        .iter()
        .filter(|w| !after_ids.contains_key(w.id.as_str()))
        .map(|w| w.id.clone())
        .collect();

    let mut modified = Vec::new();
    for w in &before.widgets {
        if let Some(now) = after_ids.get(w.id.as_str()) {
            let fields = diff_widget(w, now);
            if !fields.is_empty() {
                modified.push(WidgetChange { id: w.id.clone(), fields });
            }
        }
    }

    let text_changed = match (&before.text, &after.text) {
        (Some(b), Some(a)) => b != a,
        _ => false,
    };

    SnapshotDiff {
        added,
        removed,
        modified,
        text_changed,
        dimensions_changed: before.dimensions != after.dimensions,
        layer_count_changed: before.layer_count != after.layer_count,
        focus_changed: before.focused_id != after.focused_id,
    }
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

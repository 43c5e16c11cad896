// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use proptest::prelude::*;
use serde_json::json;

use super::*;
use crate::snapshot::Dimensions;
use crate::test_support::{named_widget, snapshot_of};
use crate::widget::Role;

#[test]
fn identical_snapshots_diff_empty() {
    let snap = snapshot_of(vec![
        named_widget("layer0:button:0", Role::Button, "Save"),
        named_widget("layer0:input:0", Role::Input, "Name"),
    ]);
    let diff = diff_snapshots(&snap, &snap);
    assert!(diff.is_empty());
}

#[test]
fn label_change_reports_old_and_new() {
    let before = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "Save")]);
    let mut after = before.clone();
    after.widgets[0].label = "Save All".into();

    let diff = diff_snapshots(&before, &after);
    assert_eq!(diff.modified.len(), 1);
    let change = &diff.modified[0];
    assert_eq!(change.id, "layer0:button:0");
    assert_eq!(
        change.fields.get("label"),
        Some(&FieldDelta { old: json!("Save"), new: json!("Save All") })
    );
    assert!(diff.has_structural_change());
}

#[test]
fn tri_state_presence_is_a_change() {
    let before = snapshot_of(vec![named_widget("layer0:checkbox:0", Role::Checkbox, "Opt")]);
    let mut after = before.clone();
    after.widgets[0].state.checked = Some(false);

    // None → Some(false): presence changed even though the value reads false.
    let diff = diff_snapshots(&before, &after);
    assert_eq!(
        diff.modified[0].fields.get("state.checked"),
        Some(&FieldDelta { old: json!(null), new: json!(false) })
    );
}

#[test]
fn added_and_removed_are_disjoint() {
    let before = snapshot_of(vec![
        named_widget("layer0:button:0", Role::Button, "A"),
        named_widget("layer0:button:1", Role::Button, "B"),
    ]);
    let after = snapshot_of(vec![
        named_widget("layer0:button:1", Role::Button, "B"),
        named_widget("layer0:button:2", Role::Button, "C"),
    ]);

    let diff = diff_snapshots(&before, &after);
    assert_eq!(diff.added, vec!["layer0:button:2"]);
    assert_eq!(diff.removed, vec!["layer0:button:0"]);
    assert!(diff.modified.is_empty());
}

#[test]
fn top_level_flags() {
    let mut before = snapshot_of(vec![named_widget("layer0:button:0", Role::Button, "A")]);
    before.text = Some("screen a".into());
    let mut after = before.clone();
    after.text = Some("screen b".into());
    after.dimensions = Dimensions { width: 120, height: 40 };
    after.layer_count = 2;
    after.focused_id = Some("layer0:button:0".into());

    let diff = diff_snapshots(&before, &after);
    assert!(diff.text_changed);
    assert!(diff.dimensions_changed);
    assert!(diff.layer_count_changed);
    assert!(diff.focus_changed);
}

#[test]
fn missing_text_never_reports_text_change() {
    let mut before = snapshot_of(vec![]);
    before.text = None;
    let mut after = before.clone();
    after.text = Some("now with text".into());

    assert!(!diff_snapshots(&before, &after).text_changed);
}

// -- Property tests -----------------------------------------------------------

fn arb_snapshot() -> impl Strategy<Value = crate::snapshot::Snapshot> {
    // Small id space so generated snapshot pairs overlap.
    proptest::collection::btree_map(0u32..8, (0u8..3, proptest::option::of(any::<bool>())), 0..6)
        .prop_map(|widgets| {
            let widgets = widgets
                .into_iter()
                .map(|(ordinal, (label_sel, checked))| {
                    let mut w = named_widget(
                        &format!("layer0:button:{ordinal}"),
                        Role::Button,
                        ["Save", "Open", "Close"][label_sel as usize],
                    );
                    w.state.checked = checked;
                    w
                })
                .collect();
            snapshot_of(widgets)
        })
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

proptest! {
    #[test]
    fn self_diff_is_always_empty(snap in arb_snapshot()) {
        prop_assert!(diff_snapshots(&snap, &snap).is_empty());
    }

    #[test]
    fn diff_is_antisymmetric(a in arb_snapshot(), b in arb_snapshot()) {
        let ab = diff_snapshots(&a, &b);
        let ba = diff_snapshots(&b, &a);
        prop_assert_eq!(sorted(ab.added.clone()), sorted(ba.removed.clone()));
        prop_assert_eq!(sorted(ab.removed), sorted(ba.added));
        // The same widgets are modified in both directions.
        let ab_ids: Vec<_> = ab.modified.iter().map(|c| c.id.clone()).collect();
        let ba_ids: Vec<_> = ba.modified.iter().map(|c| c.id.clone()).collect();
        prop_assert_eq!(sorted(ab_ids), sorted(ba_ids));
    }
}

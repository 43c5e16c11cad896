// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{child_widget, named_widget, snapshot_of};
use crate::widget::Role;

fn tree() -> Snapshot {
    // container
    //   ├── input "Name"
    //   └── list "Options"
    //         ├── listitem "One"
    //         └── listitem "Two"
    let root = named_widget("layer0:container:0", Role::Container, "");
    let input = child_widget("layer0:input:0", Role::Input, "Name", "layer0:container:0");
    let list = child_widget("layer0:list:0", Role::List, "Options", "layer0:container:0");
    let one = child_widget("layer0:listitem:0", Role::ListItem, "One", "layer0:list:0");
    let two = child_widget("layer0:listitem:1", Role::ListItem, "Two", "layer0:list:0");

    let mut root = root;
    root.children_ids = vec!["layer0:input:0".into(), "layer0:list:0".into()];
    let mut list = list;
    list.children_ids = vec!["layer0:listitem:0".into(), "layer0:listitem:1".into()];

    snapshot_of(vec![root, input, list, one, two])
}

#[test]
fn lookup_and_preorder_index() {
    let snap = tree();
    assert!(snap.contains("layer0:list:0"));
    assert_eq!(snap.index_of("layer0:input:0"), Some(1));
    assert_eq!(snap.index_of("layer0:listitem:1"), Some(4));
    assert!(snap.widget("layer9:button:9").is_none());
}

#[test]
fn relationship_queries() {
    let snap = tree();

    let children: Vec<_> = snap.children_of("layer0:list:0").iter().map(|w| w.id.clone()).collect();
    assert_eq!(children, vec!["layer0:listitem:0", "layer0:listitem:1"]);

    let parent = snap.parent_of("layer0:listitem:0").map(|w| w.id.clone());
    assert_eq!(parent.as_deref(), Some("layer0:list:0"));

    let siblings: Vec<_> =
        snap.siblings_of("layer0:input:0").iter().map(|w| w.id.clone()).collect();
    assert_eq!(siblings, vec!["layer0:list:0"]);

    let descendants: Vec<_> =
        snap.descendants_of("layer0:container:0").iter().map(|w| w.id.clone()).collect();
    assert_eq!(
        descendants,
        vec!["layer0:input:0", "layer0:list:0", "layer0:listitem:0", "layer0:listitem:1"]
    );

    let ancestors: Vec<_> =
        snap.ancestors_of("layer0:listitem:1").iter().map(|w| w.id.clone()).collect();
    assert_eq!(ancestors, vec!["layer0:list:0", "layer0:container:0"]);
}

#[test]
fn resolve_id_accepts_explicit_base() {
    let mut submit = named_widget("layer0:button:1:submit", Role::Button, "Submit");
    submit.parent_id = None;
    let snap = snapshot_of(vec![submit]);

    assert_eq!(snap.resolve_id("layer0:button:1:submit").map(|w| w.id.as_str()),
        Some("layer0:button:1:submit"));
    assert_eq!(snap.resolve_id("submit").map(|w| w.id.as_str()), Some("layer0:button:1:submit"));
    assert!(snap.resolve_id("cancel").is_none());
}

#[test]
fn resolve_id_requires_unique_base() {
    let a = named_widget("layer0:button:0:go#1", Role::Button, "Go");
    let b = named_widget("layer0:button:1:go#2", Role::Button, "Go");
    let snap = snapshot_of(vec![a, b]);

    // Two widgets share base "go"; ambiguous, so no resolution.
    assert!(snap.resolve_id("go").is_none());
    assert!(snap.resolve_id("layer0:button:0:go#1").is_some());
}

#[test]
fn validate_catches_duplicate_ids() {
    let a = named_widget("layer0:button:0", Role::Button, "A");
    let b = named_widget("layer0:button:0", Role::Button, "B");
    let snap = snapshot_of(vec![a, b]);
    assert!(snap.validate().is_err());
}

#[test]
fn validate_catches_dangling_parent() {
    let mut orphan = named_widget("layer0:button:0", Role::Button, "A");
    orphan.parent_id = Some("layer0:container:9".into());
    let snap = snapshot_of(vec![orphan]);
    assert!(snap.validate().is_err());
}

#[test]
fn validate_accepts_well_formed_tree() -> anyhow::Result<()> {
    tree().validate()
}

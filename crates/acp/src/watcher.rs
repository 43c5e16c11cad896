// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling change detector behind resource subscriptions.
//!
//! A single loop owns the baseline. Each tick captures one snapshot (text
//! only when a text-sensitive URI is watched and permitted), diffs it
//! against the baseline, and fans out `resources/updated` notifications to
//! the sessions whose per-URI predicate fired. Intermediate states between
//! ticks collapse into one update.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::diff::{diff_snapshots, SnapshotDiff};
use crate::resource::{ResourceUri, WidgetSub};
use crate::rpc::Notification;
use crate::server::AcpServer;
use crate::session::Session;
use crate::snapshot::Snapshot;
use crate::transport::PushOutcome;
use crate::widget::{explicit_base_of, Widget, WidgetId};

struct Baseline {
    snapshot: Snapshot,
    clipboard: Option<String>,
}

/// Start the watcher; it runs until server shutdown.
pub fn spawn(server: Arc<AcpServer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let shutdown = server.shutdown.clone();
        let mut ticker = tokio::time::interval(server.settings.watch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut baseline: Option<Baseline> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tick(&server, &mut baseline).await;
        }
    })
}

async fn tick(server: &Arc<AcpServer>, baseline: &mut Option<Baseline>) {
    let mut watched: Vec<(Arc<Session>, Vec<ResourceUri>)> = Vec::new();
    for session in server.sessions.all().await {
        let uris: Vec<ResourceUri> = session
            .subscriptions()
            .await
            .iter()
            .filter_map(|raw| ResourceUri::parse(raw).ok())
            .collect();
        if !uris.is_empty() {
            watched.push((session, uris));
        }
    }
    if watched.is_empty() {
        *baseline = None;
        return;
    }

    let caps = &server.settings.caps;
    let need_text = caps.text_access
        && watched.iter().any(|(_, uris)| uris.iter().any(ResourceUri::requires_text));
    let need_clipboard = caps.clipboard_access
        && watched.iter().any(|(_, uris)| uris.iter().any(ResourceUri::requires_clipboard));

    let cancel = server.shutdown.child_token();
    let current = match server.bridge.snapshot(&cancel, need_text).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::debug!(error = %e, "watcher snapshot failed");
            return;
        }
    };
    let clipboard = if need_clipboard {
        server.bridge.clipboard_read(&cancel).await.ok()
    } else {
        None
    };

    // First tick with subscribers: capture the baseline, emit nothing.
    let Some(prev) = baseline.as_ref() else {
        *baseline = Some(Baseline { snapshot: current, clipboard });
        return;
    };

    let diff = diff_snapshots(&prev.snapshot, &current);
    let clipboard_changed = match (&prev.clipboard, &clipboard) {
        (Some(before), Some(after)) => before != after,
        _ => false,
    };

    let mut torn_down: Vec<Arc<Session>> = Vec::new();
    for (session, uris) in &watched {
        for uri in uris {
            let Some(params) = evaluate(uri, &diff, &prev.snapshot, &current, clipboard_changed)
            else {
                continue;
            };
            let note = Notification::new("resources/updated", params).to_value();
            match session.notify(note) {
                PushOutcome::Disconnect => {
                    tracing::warn!(session = %session.id, "slow client disconnected");
                    torn_down.push(Arc::clone(session));
                    break;
                }
                PushOutcome::DroppedOldest | PushOutcome::DroppedNewest => {
                    tracing::debug!(session = %session.id, uri = %uri, "notification dropped");
                }
                PushOutcome::Queued | PushOutcome::Dropped => {}
            }
        }
    }
    for session in torn_down {
        server.teardown(&session).await;
    }

    *baseline = Some(Baseline { snapshot: current, clipboard });
}

/// Resolve a subscription id against a snapshot: exact id, explicit base,
/// or the explicit base extracted from a full id.
fn resolve_sub<'s>(snapshot: &'s Snapshot, sub_id: &str) -> Option<&'s Widget> {
    if let Some(widget) = snapshot.resolve_id(sub_id) {
        return Some(widget);
    }
    let base = explicit_base_of(sub_id)?;
    snapshot.resolve_id(&base)
}

fn layer_touched(diff: &SnapshotDiff, layer: u32) -> bool {
    let of_layer = |id: &str| WidgetId::parse(id).map(|p| p.layer == layer).unwrap_or(false);
    diff.added.iter().any(|id| of_layer(id))
        || diff.removed.iter().any(|id| of_layer(id))
        || diff.modified.iter().any(|c| of_layer(&c.id))
}

/// The per-URI predicate: `Some(params)` when an update is due.
fn evaluate(
    uri: &ResourceUri,
    diff: &SnapshotDiff,
    before: &Snapshot,
    after: &Snapshot,
    clipboard_changed: bool,
) -> Option<Value> {
    let fire = |due: bool| if due { Some(json!({ "uri": uri.to_string() })) } else { None };
    match uri {
        ResourceUri::Screen => fire(diff.text_changed),
        ResourceUri::Widgets => fire(
            diff.has_structural_change()
                || diff.dimensions_changed
                || diff.layer_count_changed
                || diff.focus_changed,
        ),
        ResourceUri::Focused => {
            let focused_modified = after
                .focused_id
                .as_deref()
                .map(|id| diff.change_for(id).is_some())
                .unwrap_or(false);
            fire(diff.focus_changed || focused_modified)
        }
        ResourceUri::Clipboard => fire(clipboard_changed),
        ResourceUri::Dimensions => fire(diff.dimensions_changed),
        ResourceUri::Layer { index } => {
            fire(layer_touched(diff, *index) || diff.layer_count_changed)
        }
        ResourceUri::Widget { id, sub } => {
            let before_widget = resolve_sub(before, id);
            let after_widget = resolve_sub(after, id);
            let (Some(was), Some(now)) = (before_widget, after_widget) else {
                // Appeared or vanished outright: no modified entry, no update.
                return None;
            };

            // Identity tracking: the subscription's id now resolves to a
            // different concrete widget; tell the client where it went.
            if was.id != now.id {
                let new_uri =
                    ResourceUri::Widget { id: now.id.clone(), sub: *sub }.to_string();
                return Some(json!({
                    "uri": uri.to_string(),
                    "reason": "widget_id_changed",
                    "new_uri": new_uri,
                }));
            }

            let changed = match sub {
                None => diff.change_for(&now.id).is_some(),
                Some(WidgetSub::Value) => was.value != now.value,
                Some(WidgetSub::Children) => {
                    was.children_ids != now.children_ids
                        || diff
                            .change_for(&now.id)
                            .map(|c| c.fields.contains_key("children_ids"))
                            .unwrap_or(false)
                }
            };
            fire(changed)
        }
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

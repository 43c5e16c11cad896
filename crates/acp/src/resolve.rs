// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic label resolution.
//!
//! When several widgets match a label substring, the resolver applies a fixed
//! tie-break order — focused, topmost layer, visibility, pre-order — so the
//! same snapshot and query always select the same widget.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;
use crate::widget::Widget;

/// A label lookup request.
#[derive(Debug, Clone, Default)]
pub struct LabelQuery<'a> {
    /// Case-insensitive substring to match against widget labels.
    pub label: &'a str,
    /// Pick the n-th candidate instead of tie-breaking.
    pub index: Option<usize>,
    /// Restrict candidates to one layer.
    pub layer: Option<u32>,
    /// Fail instead of tie-breaking when more than one candidate remains.
    pub strict: bool,
}

/// Which rule selected the winning candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    Single,
    Index,
    Focused,
    TopmostLayer,
    FullyVisible,
    Visibility,
    DomOrder,
}

impl ResolutionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Index => "index",
            Self::Focused => "focused",
            Self::TopmostLayer => "topmost_layer",
            Self::FullyVisible => "fully_visible",
            Self::Visibility => "visibility",
            Self::DomOrder => "dom_order",
        }
    }
}

/// Candidate summary reported back to the client alongside the winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub id: String,
    pub label: String,
    /// Label of the candidate's parent, for disambiguation by the caller.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub context: String,
    pub layer: u32,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub widget: &'a Widget,
    pub reason: ResolutionReason,
    /// All candidates, including the winner, in pre-order.
    pub matches: Vec<MatchInfo>,
    /// True when a tie-break (not an explicit index) chose among several.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NoMatch { label: String },
    IndexOutOfRange { index: usize, count: usize },
    Ambiguous { label: String, count: usize },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch { label } => write!(f, "no widget matches label: {label}"),
            Self::IndexOutOfRange { index, count } => {
                write!(f, "index {index} out of range for {count} matches")
            }
            Self::Ambiguous { label, count } => {
                write!(f, "multiple widgets match label: {label} ({count} candidates)")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

fn match_info(snapshot: &Snapshot, w: &Widget) -> MatchInfo {
    let context = snapshot.parent_of(&w.id).map(|p| p.label.clone()).unwrap_or_default();
    MatchInfo { id: w.id.clone(), label: w.label.clone(), context, layer: w.layer() }
}

/// Resolve a label substring to one widget.
pub fn resolve_label<'a>(
    snapshot: &'a Snapshot,
    query: &LabelQuery<'_>,
) -> Result<Resolution<'a>, ResolveError> {
    let needle = query.label.to_lowercase();
    let mut candidates: Vec<(usize, &Widget)> = snapshot
        .widgets
        .iter()
        .enumerate()
        .filter(|(_, w)| !w.label.is_empty() && w.label.to_lowercase().contains(&needle))
        .collect();

    if let Some(layer) = query.layer {
        candidates.retain(|(_, w)| w.layer() == layer);
    }

    if candidates.is_empty() {
        return Err(ResolveError::NoMatch { label: query.label.to_owned() });
    }

    let matches: Vec<MatchInfo> = candidates.iter().map(|(_, w)| match_info(snapshot, w)).collect();

    if let Some(index) = query.index {
        let (_, widget) = *candidates
            .get(index)
            .ok_or(ResolveError::IndexOutOfRange { index, count: matches.len() })?;
        return Ok(Resolution { widget, reason: ResolutionReason::Index, matches, ambiguous: false });
    }

    if candidates.len() == 1 {
        let (_, widget) = candidates[0];
        return Ok(Resolution {
            widget,
            reason: ResolutionReason::Single,
            matches,
            ambiguous: false,
        });
    }

    if query.strict {
        return Err(ResolveError::Ambiguous {
            label: query.label.to_owned(),
            count: candidates.len(),
        });
    }

    // Tie-break 1: the focused widget wins outright.
    if let Some(focused_id) = snapshot.focused_id.as_deref() {
        if let Some(&(_, widget)) = candidates.iter().find(|(_, w)| w.id == focused_id) {
            return Ok(Resolution {
                widget,
                reason: ResolutionReason::Focused,
                matches,
                ambiguous: true,
            });
        }
    }

    // Tie-break 2: highest layer.
    let top_layer = candidates.iter().map(|(_, w)| w.layer()).max().unwrap_or(0);
    candidates.retain(|(_, w)| w.layer() == top_layer);
    if candidates.len() == 1 {
        let (_, widget) = candidates[0];
        return Ok(Resolution {
            widget,
            reason: ResolutionReason::TopmostLayer,
            matches,
            ambiguous: true,
        });
    }

    // Tie-break 3: visibility class, then visible area.
    let cols = snapshot.dimensions.width as i32;
    let rows = snapshot.dimensions.height as i32;
    let fully: Vec<(usize, &Widget)> = candidates
        .iter()
        .copied()
        .filter(|(_, w)| w.bounds.fully_inside(cols, rows))
        .collect();
    if fully.len() == 1 {
        let (_, widget) = fully[0];
        return Ok(Resolution {
            widget,
            reason: ResolutionReason::FullyVisible,
            matches,
            ambiguous: true,
        });
    }
    if !fully.is_empty() {
        candidates = fully;
    }
    let best_area =
        candidates.iter().map(|(_, w)| w.bounds.visible_area(cols, rows)).max().unwrap_or(0);
    candidates.retain(|(_, w)| w.bounds.visible_area(cols, rows) == best_area);
    if candidates.len() == 1 {
        let (_, widget) = candidates[0];
        return Ok(Resolution {
            widget,
            reason: ResolutionReason::Visibility,
            matches,
            ambiguous: true,
        });
    }
    // Tie-break 4: lowest pre-order index.
    let (_, widget) = candidates
        .iter()
        .copied()
        .min_by_key(|(index, _)| *index)
        .unwrap_or(candidates[0]);
    Ok(Resolution { widget, reason: ResolutionReason::DomOrder, matches, ambiguous: true })
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;

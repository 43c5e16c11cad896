// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol widget model: roles, state flags, bounds, and identifier parsing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of widget roles understood by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Button,
    Checkbox,
    Radio,
    Input,
    List,
    ListItem,
    Tree,
    TreeItem,
    Dialog,
    Menu,
    MenuItem,
    Tab,
    TabPanel,
    ProgressBar,
    Status,
    Alert,
    Text,
    Container,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Input => "input",
            Self::List => "list",
            Self::ListItem => "listitem",
            Self::Tree => "tree",
            Self::TreeItem => "treeitem",
            Self::Dialog => "dialog",
            Self::Menu => "menu",
            Self::MenuItem => "menuitem",
            Self::Tab => "tab",
            Self::TabPanel => "tabpanel",
            Self::ProgressBar => "progressbar",
            Self::Status => "status",
            Self::Alert => "alert",
            Self::Text => "text",
            Self::Container => "container",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a role tag (case-insensitive). Unrecognised tags map to `Unknown`.
    pub fn parse(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "button" => Self::Button,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "input" => Self::Input,
            "list" => Self::List,
            "listitem" => Self::ListItem,
            "tree" => Self::Tree,
            "treeitem" => Self::TreeItem,
            "dialog" => Self::Dialog,
            "menu" => Self::Menu,
            "menuitem" => Self::MenuItem,
            "tab" => Self::Tab,
            "tabpanel" => Self::TabPanel,
            "progressbar" => Self::ProgressBar,
            "status" => Self::Status,
            "alert" => Self::Alert,
            "text" => Self::Text,
            "container" => Self::Container,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widget rectangle in screen cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> i64 {
        (self.w.max(0) as i64) * (self.h.max(0) as i64)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    /// Whether this rectangle lies entirely inside a `cols`×`rows` screen.
    pub fn fully_inside(&self, cols: i32, rows: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x + self.w <= cols && self.y + self.h <= rows
    }

    /// Area of the intersection with a `cols`×`rows` screen.
    pub fn visible_area(&self, cols: i32, rows: i32) -> i64 {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.w).min(cols);
        let y1 = (self.y + self.h).min(rows);
        if x1 <= x0 || y1 <= y0 {
            return 0;
        }
        (x1 - x0) as i64 * (y1 - y0) as i64
    }

    /// Center point, for mouse targeting.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Boolean and tri-state accessibility flags.
///
/// Tri-state flags (`checked`, `expanded`) use `None` for "not applicable";
/// absence is semantically distinct from `Some(false)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSet {
    #[serde(default, skip_serializing_if = "is_false")]
    pub focused: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub pressed: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub invalid: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub busy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded: Option<bool>,
}

impl StateSet {
    /// Look up a boolean flag by name. Tri-states report `false` when absent.
    pub fn flag(&self, name: &str) -> Option<bool> {
        match name {
            "focused" => Some(self.focused),
            "disabled" => Some(self.disabled),
            "hidden" => Some(self.hidden),
            "selected" => Some(self.selected),
            "pressed" => Some(self.pressed),
            "readonly" => Some(self.readonly),
            "required" => Some(self.required),
            "invalid" => Some(self.invalid),
            "busy" => Some(self.busy),
            "checked" => Some(self.checked.unwrap_or(false)),
            "expanded" => Some(self.expanded.unwrap_or(false)),
            _ => None,
        }
    }
}

/// One widget in a flattened snapshot. Immutable after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub bounds: Bounds,
    #[serde(default)]
    pub state: StateSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Widget {
    /// Layer index parsed from the identifier; widgets with unparseable ids
    /// are treated as layer 0.
    pub fn layer(&self) -> u32 {
        WidgetId::parse(&self.id).map(|p| p.layer).unwrap_or(0)
    }

    pub fn supports_action(&self, verb: &str) -> bool {
        self.actions.iter().any(|a| a == verb)
    }

    /// Focusable: interactive role, not disabled, not hidden.
    pub fn is_focusable(&self) -> bool {
        if self.state.disabled || self.state.hidden {
            return false;
        }
        matches!(
            self.role,
            Role::Button
                | Role::Checkbox
                | Role::Radio
                | Role::Input
                | Role::List
                | Role::ListItem
                | Role::Tree
                | Role::TreeItem
                | Role::Menu
                | Role::MenuItem
                | Role::Tab
        )
    }

    /// Actionable: advertises at least one action verb and is not disabled.
    pub fn is_actionable(&self) -> bool {
        !self.state.disabled && !self.actions.is_empty()
    }
}

/// Parsed form of a widget identifier:
/// `layer{N}:{role}:{ordinal}[:{explicit-id}]` where the explicit id may
/// carry a `#k` disambiguator suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetId {
    pub layer: u32,
    pub role: Role,
    pub ordinal: u32,
    pub explicit: Option<String>,
}

impl WidgetId {
    /// Parse an identifier string. Returns `None` when the id does not follow
    /// the `layer{N}:{role}:{ordinal}` shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(4, ':');
        let layer_part = parts.next()?;
        let role_part = parts.next()?;
        let ordinal_part = parts.next()?;
        let explicit = parts.next().map(str::to_owned);

        let layer = layer_part.strip_prefix("layer")?.parse().ok()?;
        let ordinal = ordinal_part.parse().ok()?;
        Some(Self { layer, role: Role::parse(role_part), ordinal, explicit })
    }

    /// Explicit id with any `#k` disambiguator stripped.
    pub fn explicit_base(&self) -> Option<&str> {
        let explicit = self.explicit.as_deref()?;
        Some(explicit.split_once('#').map(|(base, _)| base).unwrap_or(explicit))
    }

    /// The `#k` disambiguator, if present.
    pub fn disambiguator(&self) -> Option<u32> {
        self.explicit.as_deref()?.split_once('#')?.1.parse().ok()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer{}:{}:{}", self.layer, self.role, self.ordinal)?;
        if let Some(ref explicit) = self.explicit {
            write!(f, ":{explicit}")?;
        }
        Ok(())
    }
}

/// Explicit base id of a widget identifier, when it carries one.
pub fn explicit_base_of(id: &str) -> Option<String> {
    WidgetId::parse(id).and_then(|p| p.explicit_base().map(str::to_owned))
}

#[cfg(test)]
#[path = "widget_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-on-demand resources addressed by `fluffy://` URIs.
//!
//! Nothing is persisted: every read captures live state through the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::Capabilities;
use crate::ui::{BridgeError, UiBridge};

pub const SCHEME: &str = "fluffy";

/// Widget sub-resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetSub {
    Value,
    Children,
}

impl WidgetSub {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Children => "children",
        }
    }
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Screen,
    Widgets,
    Focused,
    Clipboard,
    Dimensions,
    Widget { id: String, sub: Option<WidgetSub> },
    Layer { index: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    BadScheme(String),
    UnknownKind(String),
    MissingId,
    BadLayer(String),
    UnknownSub(String),
}

impl fmt::Display for UriError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadScheme(uri) => write!(f, "unsupported URI scheme: {uri}"),
            Self::UnknownKind(kind) => write!(f, "unknown resource kind: {kind}"),
            Self::MissingId => f.write_str("widget URI is missing an id"),
            Self::BadLayer(raw) => write!(f, "invalid layer index: {raw}"),
            Self::UnknownSub(sub) => write!(f, "unknown widget sub-resource: {sub}"),
        }
    }
}

impl std::error::Error for UriError {}

impl ResourceUri {
    /// Parse a `fluffy://<kind>[/<id>[/<sub>]]` URI.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let rest = raw
            .strip_prefix("fluffy://")
            .ok_or_else(|| UriError::BadScheme(raw.to_owned()))?;
        let mut segments = rest.splitn(3, '/');
        let kind = segments.next().unwrap_or_default();
        match kind {
            "screen" => Ok(Self::Screen),
            "widgets" => Ok(Self::Widgets),
            "focused" => Ok(Self::Focused),
            "clipboard" => Ok(Self::Clipboard),
            "dimensions" => Ok(Self::Dimensions),
            "widget" => {
                let id = segments.next().filter(|s| !s.is_empty()).ok_or(UriError::MissingId)?;
                let sub = match segments.next() {
                    None | Some("") => None,
                    Some("value") => Some(WidgetSub::Value),
                    Some("children") => Some(WidgetSub::Children),
                    Some(other) => return Err(UriError::UnknownSub(other.to_owned())),
                };
                Ok(Self::Widget { id: id.to_owned(), sub })
            }
            "layer" => {
                let raw_index =
                    segments.next().filter(|s| !s.is_empty()).ok_or(UriError::MissingId)?;
                let index = raw_index
                    .parse()
                    .map_err(|_| UriError::BadLayer(raw_index.to_owned()))?;
                Ok(Self::Layer { index })
            }
            other => Err(UriError::UnknownKind(other.to_owned())),
        }
    }

    /// True when reading (or watching) this resource needs the rendered text.
    pub fn requires_text(&self) -> bool {
        matches!(self, Self::Screen)
    }

    pub fn requires_clipboard(&self) -> bool {
        matches!(self, Self::Clipboard)
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Screen => write!(f, "fluffy://screen"),
            Self::Widgets => write!(f, "fluffy://widgets"),
            Self::Focused => write!(f, "fluffy://focused"),
            Self::Clipboard => write!(f, "fluffy://clipboard"),
            Self::Dimensions => write!(f, "fluffy://dimensions"),
            Self::Widget { id, sub: None } => write!(f, "fluffy://widget/{id}"),
            Self::Widget { id, sub: Some(sub) } => {
                write!(f, "fluffy://widget/{id}/{}", sub.as_str())
            }
            Self::Layer { index } => write!(f, "fluffy://layer/{index}"),
        }
    }
}

/// Payload returned from a resource read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// Entry in `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Entry in `resources/templates/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub uri_template: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

fn info(uri: &str, name: &str, description: &str, mime_type: &str) -> ResourceInfo {
    ResourceInfo {
        uri: uri.to_owned(),
        name: name.to_owned(),
        description: description.to_owned(),
        mime_type: mime_type.to_owned(),
    }
}

/// Fixed resource endpoints.
pub fn list_resources() -> Vec<ResourceInfo> {
    vec![
        info("fluffy://screen", "screen", "Rendered screen text", "text/plain"),
        info("fluffy://widgets", "widgets", "Full widget tree snapshot", "application/json"),
        info("fluffy://focused", "focused", "The focused widget", "application/json"),
        info("fluffy://clipboard", "clipboard", "Clipboard text", "text/plain"),
        info("fluffy://dimensions", "dimensions", "Screen dimensions", "application/json"),
    ]
}

/// Templated resource endpoints.
pub fn list_templates() -> Vec<ResourceTemplate> {
    let template = |uri_template: &str, name: &str, description: &str, mime_type: &str| {
        ResourceTemplate {
            uri_template: uri_template.to_owned(),
            name: name.to_owned(),
            description: description.to_owned(),
            mime_type: mime_type.to_owned(),
        }
    };
    vec![
        template("fluffy://widget/{id}", "widget", "One widget by id", "application/json"),
        template(
            "fluffy://widget/{id}/value",
            "widget value",
            "A widget's value string",
            "text/plain",
        ),
        template(
            "fluffy://widget/{id}/children",
            "widget children",
            "A widget's direct children",
            "application/json",
        ),
        template("fluffy://layer/{n}", "layer", "All widgets on one layer", "application/json"),
    ]
}

/// Why a read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    Denied { reason: String, hint: String },
    NotFound(String),
    Ui(String),
    Cancelled,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied { reason, .. } => write!(f, "access denied: {reason}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Ui(msg) => f.write_str(msg),
            Self::Cancelled => f.write_str("read cancelled"),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<BridgeError> for ReadError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Cancelled => Self::Cancelled,
            other => Self::Ui(other.to_string()),
        }
    }
}

fn json_content(uri: &ResourceUri, value: &impl Serialize) -> ResourceContent {
    ResourceContent {
        uri: uri.to_string(),
        mime_type: "application/json".to_owned(),
        text: serde_json::to_string(value).unwrap_or_else(|_| "null".to_owned()),
    }
}

fn text_content(uri: &ResourceUri, text: String) -> ResourceContent {
    ResourceContent { uri: uri.to_string(), mime_type: "text/plain".to_owned(), text }
}

/// Capability gate shared by reads and subscription admission.
pub fn check_access(uri: &ResourceUri, caps: &Capabilities) -> Result<(), ReadError> {
    if uri.requires_text() && !caps.text_access {
        return Err(ReadError::Denied {
            reason: "text access disabled".to_owned(),
            hint: "enable text access on the host".to_owned(),
        });
    }
    if uri.requires_clipboard() && !caps.clipboard_access {
        return Err(ReadError::Denied {
            reason: "clipboard access disabled".to_owned(),
            hint: "enable clipboard access on the host".to_owned(),
        });
    }
    Ok(())
}

/// Read one resource. Each call captures live state; nothing is cached.
pub async fn read(
    bridge: &UiBridge,
    caps: &Capabilities,
    cancel: &CancellationToken,
    uri: &ResourceUri,
) -> Result<ResourceContent, ReadError> {
    check_access(uri, caps)?;
    match uri {
        ResourceUri::Screen => {
            let text = bridge.capture_text(cancel).await?;
            Ok(text_content(uri, text))
        }
        ResourceUri::Widgets => {
            let snapshot = bridge.snapshot(cancel, false).await?;
            Ok(json_content(uri, &snapshot))
        }
        ResourceUri::Focused => {
            let snapshot = bridge.snapshot(cancel, false).await?;
            Ok(json_content(uri, &snapshot.focused()))
        }
        ResourceUri::Clipboard => {
            let text = bridge.clipboard_read(cancel).await?;
            Ok(text_content(uri, text))
        }
        ResourceUri::Dimensions => {
            let dims = bridge.dimensions(cancel).await?;
            Ok(json_content(uri, &dims))
        }
        ResourceUri::Widget { id, sub } => {
            let snapshot = bridge.snapshot(cancel, false).await?;
            let widget = snapshot
                .resolve_id(id)
                .ok_or_else(|| ReadError::NotFound(format!("widget {id}")))?;
            match sub {
                None => Ok(json_content(uri, widget)),
                Some(WidgetSub::Value) => Ok(text_content(uri, widget.value.clone())),
                Some(WidgetSub::Children) => {
                    let children = snapshot.children_of(&widget.id);
                    Ok(json_content(uri, &children))
                }
            }
        }
        ResourceUri::Layer { index } => {
            let snapshot = bridge.snapshot(cancel, false).await?;
            if *index >= snapshot.layer_count {
                return Err(ReadError::NotFound(format!("layer {index}")));
            }
            let widgets: Vec<_> =
                snapshot.widgets.iter().filter(|w| w.layer() == *index).collect();
            Ok(json_content(uri, &widgets))
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key and mouse event model shared by the input tools and the UI bridge.

use serde::{Deserialize, Serialize};

/// A key identity, independent of modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Tab,
    BackTab,
    Backspace,
    Delete,
    Insert,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

/// Modifier flags carried with a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false, ctrl: false, alt: false };

    pub fn ctrl() -> Self {
        Self { ctrl: true, ..Self::NONE }
    }

    pub fn shift() -> Self {
        Self { shift: true, ..Self::NONE }
    }
}

/// A single key press delivered to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(code: KeyCode) -> Self {
        Self { code, modifiers: Modifiers::NONE }
    }

    pub fn ctrl(ch: char) -> Self {
        Self { code: KeyCode::Char(ch), modifiers: Modifiers::ctrl() }
    }
}

/// Translate a key name to its code (case-insensitive).
pub fn parse_key(name: &str) -> Option<KeyCode> {
    let lower = name.to_lowercase();
    let code = match lower.as_str() {
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "backtab" | "shift_tab" | "shift-tab" => KeyCode::BackTab,
        "escape" | "esc" => KeyCode::Escape,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "insert" => KeyCode::Insert,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "page_up" => KeyCode::PageUp,
        "pagedown" | "page_down" => KeyCode::PageDown,
        "space" => KeyCode::Char(' '),
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|s| s.parse::<u8>().ok()) {
                if (1..=12).contains(&n) {
                    return Some(KeyCode::F(n));
                }
                return None;
            }
            let mut chars = name.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyCode::Char(ch)
        }
    };
    Some(code)
}

/// Build a key event from modifier names plus a key name.
///
/// Unknown modifier names and unknown keys both return `None`.
pub fn parse_chord(modifiers: &[String], key: &str) -> Option<KeyEvent> {
    let mut mods = Modifiers::NONE;
    for m in modifiers {
        match m.to_lowercase().as_str() {
            "shift" => mods.shift = true,
            "ctrl" | "control" => mods.ctrl = true,
            "alt" | "meta" => mods.alt = true,
            _ => return None,
        }
    }
    Some(KeyEvent { code: parse_key(key)?, modifiers: mods })
}

/// Mouse buttons understood by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "middle" => Some(Self::Middle),
            _ => None,
        }
    }
}

/// What happened at the mouse position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MouseKind {
    Press { button: MouseButton },
    Release { button: MouseButton },
    Moved,
    /// Positive delta scrolls down, negative up.
    Scroll { delta: i32 },
}

/// A single mouse event delivered to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    #[serde(flatten)]
    pub kind: MouseKind,
}

impl MouseEvent {
    pub fn press(x: u16, y: u16, button: MouseButton) -> Self {
        Self { x, y, kind: MouseKind::Press { button } }
    }

    pub fn release(x: u16, y: u16, button: MouseButton) -> Self {
        Self { x, y, kind: MouseKind::Release { button } }
    }

    pub fn moved(x: u16, y: u16) -> Self {
        Self { x, y, kind: MouseKind::Moved }
    }

    pub fn scroll(x: u16, y: u16, delta: i32) -> Self {
        Self { x, y, kind: MouseKind::Scroll { delta } }
    }
}

#[cfg(test)]
#[path = "keys_tests.rs"]
mod tests;

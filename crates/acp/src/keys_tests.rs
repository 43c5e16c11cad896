// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    enter       = { "enter", KeyCode::Enter },
    return_name = { "Return", KeyCode::Enter },
    esc         = { "esc", KeyCode::Escape },
    escape      = { "Escape", KeyCode::Escape },
    tab         = { "tab", KeyCode::Tab },
    back_tab    = { "shift_tab", KeyCode::BackTab },
    space       = { "space", KeyCode::Char(' ') },
    delete      = { "del", KeyCode::Delete },
    page_up     = { "page_up", KeyCode::PageUp },
    pagedown    = { "PageDown", KeyCode::PageDown },
    f1          = { "f1", KeyCode::F(1) },
    f12         = { "F12", KeyCode::F(12) },
    plain_char  = { "a", KeyCode::Char('a') },
    digit       = { "7", KeyCode::Char('7') },
)]
fn key_names(name: &str, expected: KeyCode) {
    assert_eq!(parse_key(name), Some(expected));
}

#[yare::parameterized(
    f0        = { "f0" },
    f13       = { "f13" },
    gibberish = { "not-a-key" },
    empty     = { "" },
)]
fn unknown_keys_rejected(name: &str) {
    assert_eq!(parse_key(name), None);
}

#[test]
fn chord_parsing() {
    let chord = parse_chord(&["ctrl".into(), "shift".into()], "s");
    assert_eq!(
        chord,
        Some(KeyEvent {
            code: KeyCode::Char('s'),
            modifiers: Modifiers { shift: true, ctrl: true, alt: false },
        })
    );

    assert_eq!(parse_chord(&["hyper".into()], "s"), None);
    assert_eq!(parse_chord(&[], "bogus-key"), None);
}

#[test]
fn mouse_constructors() {
    let press = MouseEvent::press(4, 2, MouseButton::Left);
    assert_eq!(press.kind, MouseKind::Press { button: MouseButton::Left });

    let scroll = MouseEvent::scroll(0, 0, -3);
    assert_eq!(scroll.kind, MouseKind::Scroll { delta: -3 });
}

//! Text-to-keystroke translation: the wire protocol's `TextInput` message
//! carries a UTF-16 string, and each code unit is mapped independently to a
//! short sequence of key events, mirroring the platform's per-character key
//! character map lookup (`KeyCharacterMap::getEvents` in the original
//! source).
//!
//! Only the printable ASCII range has a direct physical-key mapping; wider
//! Unicode input is out of scope for the injector (the original source logs
//! and skips characters it can't map, and so do we).

use crate::event::action;

/// Standard (non-extended) keycodes, matching the platform's physical key
/// numbering used on the wire (`ControlMessage::KeyEvent::keycode`).
pub mod keycode {
    pub const SPACE: i32 = 62;
    pub const ENTER: i32 = 66;
    pub const TAB: i32 = 61;
    pub const DEL: i32 = 67;
    pub const SHIFT_LEFT: i32 = 59;
    pub const MINUS: i32 = 69;
    pub const EQUALS: i32 = 70;
    pub const COMMA: i32 = 55;
    pub const PERIOD: i32 = 56;
    pub const SLASH: i32 = 76;
    pub const SEMICOLON: i32 = 74;
    pub const APOSTROPHE: i32 = 75;
    pub const GRAVE: i32 = 68;
    pub const LEFT_BRACKET: i32 = 71;
    pub const RIGHT_BRACKET: i32 = 72;
    pub const BACKSLASH: i32 = 73;
}

/// One key press or release ready for injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: i32,
    pub action: i32,
}

fn letter_keycode(c: char) -> Option<i32> {
    let lower = c.to_ascii_lowercase();
    if lower.is_ascii_lowercase() {
        Some(29 + (lower as i32 - 'a' as i32))
    } else {
        None
    }
}

fn digit_keycode(c: char) -> Option<i32> {
    if c.is_ascii_digit() {
        // AKEYCODE_0 == 7, ..., AKEYCODE_9 == 16.
        Some(7 + (c as i32 - '0' as i32))
    } else {
        None
    }
}

/// Resolves one character to `(keycode, needs_shift)`, or `None` if this
/// character has no mapping in the simulated key character map.
fn char_to_key(c: char) -> Option<(i32, bool)> {
    if let Some(code) = letter_keycode(c) {
        return Some((code, c.is_ascii_uppercase()));
    }
    if let Some(code) = digit_keycode(c) {
        return Some((code, false));
    }
    Some(match c {
        ' ' => (keycode::SPACE, false),
        '\n' | '\r' => (keycode::ENTER, false),
        '\t' => (keycode::TAB, false),
        '-' => (keycode::MINUS, false),
        '_' => (keycode::MINUS, true),
        '=' => (keycode::EQUALS, false),
        '+' => (keycode::EQUALS, true),
        ',' => (keycode::COMMA, false),
        '<' => (keycode::COMMA, true),
        '.' => (keycode::PERIOD, false),
        '>' => (keycode::PERIOD, true),
        '/' => (keycode::SLASH, false),
        '?' => (keycode::SLASH, true),
        ';' => (keycode::SEMICOLON, false),
        ':' => (keycode::SEMICOLON, true),
        '\'' => (keycode::APOSTROPHE, false),
        '"' => (keycode::APOSTROPHE, true),
        '`' => (keycode::GRAVE, false),
        '~' => (keycode::GRAVE, true),
        '[' => (keycode::LEFT_BRACKET, false),
        '{' => (keycode::LEFT_BRACKET, true),
        ']' => (keycode::RIGHT_BRACKET, false),
        '}' => (keycode::RIGHT_BRACKET, true),
        '\\' => (keycode::BACKSLASH, false),
        '|' => (keycode::BACKSLASH, true),
        _ => return None,
    })
}

/// Maps one character (one UTF-16 code unit, decoded by the caller —
/// surrogate pairs are not supported by the simulated key character map,
/// matching the original's per-`uint16_t` lookup) to the key-down/key-up
/// sequence that produces it, including a shift chord when needed.
///
/// Returns `None` when the character has no mapping; the caller should log
/// and skip it, the same way the original source does for unmappable
/// characters.
#[must_use]
pub fn char_to_key_events(c: char) -> Option<Vec<KeyStroke>> {
    let (code, needs_shift) = char_to_key(c)?;
    let mut events = Vec::with_capacity(4);
    if needs_shift {
        events.push(KeyStroke { keycode: keycode::SHIFT_LEFT, action: action::DOWN });
    }
    events.push(KeyStroke { keycode: code, action: action::DOWN });
    events.push(KeyStroke { keycode: code, action: action::UP });
    if needs_shift {
        events.push(KeyStroke { keycode: keycode::SHIFT_LEFT, action: action::UP });
    }
    Some(events)
}

/// Maps an entire string to its key-event sequence, skipping (and letting
/// the caller log) any character with no mapping.
#[must_use]
pub fn text_to_key_events(text: &str) -> Vec<KeyStroke> {
    text.chars()
        .filter_map(char_to_key_events)
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_letter_has_no_shift_chord() {
        let events = char_to_key_events('a').unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, action::DOWN);
        assert_eq!(events[1].action, action::UP);
    }

    #[test]
    fn uppercase_letter_wraps_in_shift_chord() {
        let events = char_to_key_events('A').unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].keycode, keycode::SHIFT_LEFT);
        assert_eq!(events[0].action, action::DOWN);
        assert_eq!(events[3].keycode, keycode::SHIFT_LEFT);
        assert_eq!(events[3].action, action::UP);
    }

    #[test]
    fn digits_map_in_order() {
        let zero = char_to_key_events('0').unwrap();
        let nine = char_to_key_events('9').unwrap();
        assert_eq!(zero[0].keycode + 9, nine[0].keycode);
    }

    #[test]
    fn unmappable_character_returns_none() {
        assert!(char_to_key_events('\u{1F600}').is_none());
    }

    #[test]
    fn text_to_key_events_skips_unmappable_and_keeps_order() {
        let events = text_to_key_events("a\u{1F600}b");
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].keycode, events[2].keycode - 1);
    }
}

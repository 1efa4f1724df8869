//! Terminal keys to VT100 input bytes

use log::warn;

use crate::keyboard::{Key, Modifiers, BROKEN_BAR, CENT, NOT};

fn plain(key: Key) -> Option<&'static [u8]> {
    let bytes: &'static [u8] = match key {
        NOT => b"^",
        CENT => b"[",
        BROKEN_BAR => b"]",
        Key::Attn => b"\x1b",
        Key::Newline | Key::Enter | Key::FieldExit => b"\r",
        Key::Backspace => b"\x08",
        Key::Tab => b"\t",
        Key::Up => b"\x1b[A",
        Key::Down => b"\x1b[B",
        Key::Right => b"\x1b[C",
        Key::Left => b"\x1b[D",
        _ => return None,
    };
    Some(bytes)
}

/// ALT acts as the control key
fn control(key: Key) -> Option<u8> {
    match key {
        Key::Char(' ') => Some(0x00),
        Key::Char(ch @ 'a'..='z') => Some(ch as u8 - b'a' + 1),
        CENT => Some(0x1B),
        Key::Char('\\') => Some(0x1C),
        Key::Char('=') => Some(0x1D),
        Key::Char('<') => Some(0x1E),
        Key::Char('/') => Some(0x1F),
        Key::Newline => Some(b'\n'),
        _ => None,
    }
}

/// Bytes to send for a key, `None` when the key has no VT100 meaning
pub fn encode_key(key: Key, modifiers: Modifiers) -> Option<Vec<u8>> {
    if modifiers.is_alt() {
        if key.is_modifier() {
            return None;
        }
        let byte = control(key);
        if byte.is_none() {
            warn!("No VT100 mapping for ALT + {:?}", key);
        }
        return byte.map(|byte| vec![byte]);
    }

    if let Some(bytes) = plain(key) {
        return Some(bytes.to_vec());
    }

    match key {
        Key::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => Some(vec![ch as u8]),
        _ => None,
    }
}

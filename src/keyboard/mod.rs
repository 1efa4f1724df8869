//! Terminal keyboard: scan codes to keys
//!
//! Terminals report raw scan codes in poll responses. A [`Keymap`] names
//! the key for each code in the unshifted, shifted and alternate planes,
//! and [`Keyboard`] tracks the modifier state between polls.

pub mod keymap_3278;
pub mod keymap_3483;

use std::collections::HashMap;

/// Keys a terminal keyboard can produce
///
/// Printable keys are carried as [`Key::Char`]; everything else is a
/// named control key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),

    // Modifiers
    LeftShift,
    RightShift,
    LeftAlt,
    RightAlt,
    CapsLock,

    // Cursor movement and editing
    Backspace,
    Tab,
    Backtab,
    Newline,
    Insert,
    Delete,
    Left,
    Left2,
    Up,
    Right,
    Right2,
    Down,
    Home,
    Dup,
    Jump,
    FieldMark,
    FieldExit,
    EraseEof,
    EraseInput,

    // Attention
    Enter,
    Clear,
    Pf(u8),
    Pa(u8),
    SysRq,
    Attn,

    // Local functions
    Reset,
    Quit,
    DeviceCancel,
    Print,
    Test,
    CursorSelect,
    CursorBlink,
    AltCursor,
    Clicker,
    Ident,
    ExtendSelect,
    Ctrl,
}

pub const SPACE: Key = Key::Char(' ');
pub const CENT: Key = Key::Char('¢');
pub const NOT: Key = Key::Char('¬');
pub const BROKEN_BAR: Key = Key::Char('¦');
pub const CENTER_PERIOD: Key = Key::Char('·');

impl Key {
    /// Character the key types, if it is a printable key
    pub fn character(self) -> Option<char> {
        match self {
            Key::Char(ch) => Some(ch),
            _ => None,
        }
    }

    /// Modifier bit toggled or held by the key
    pub fn modifier(self) -> Option<Modifiers> {
        match self {
            Key::LeftShift => Some(Modifiers::LEFT_SHIFT),
            Key::RightShift => Some(Modifiers::RIGHT_SHIFT),
            Key::LeftAlt => Some(Modifiers::LEFT_ALT),
            Key::RightAlt => Some(Modifiers::RIGHT_ALT),
            Key::CapsLock => Some(Modifiers::CAPS_LOCK),
            _ => None,
        }
    }

    pub fn is_modifier(self) -> bool {
        self.modifier().is_some()
    }
}

/// Modifier state as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const LEFT_SHIFT: Modifiers = Modifiers(0x01);
    pub const RIGHT_SHIFT: Modifiers = Modifiers(0x02);
    pub const LEFT_ALT: Modifiers = Modifiers(0x04);
    pub const RIGHT_ALT: Modifiers = Modifiers(0x08);
    pub const CAPS_LOCK: Modifiers = Modifiers(0x10);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_shift(self) -> bool {
        self.0 & (Self::LEFT_SHIFT.0 | Self::RIGHT_SHIFT.0) != 0
    }

    pub fn is_alt(self) -> bool {
        self.0 & (Self::LEFT_ALT.0 | Self::RIGHT_ALT.0) != 0
    }

    pub fn is_caps_lock(self) -> bool {
        self.contains(Self::CAPS_LOCK)
    }

    fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    fn remove(&mut self, other: Modifiers) {
        self.0 &= !other.0;
    }

    fn toggle(&mut self, other: Modifiers) {
        self.0 ^= other.0;
    }
}

/// How a keyboard reports that a modifier key was let go
#[derive(Debug, Clone, Copy)]
pub enum ModifierRelease {
    /// A prefix code; the next scan code names the released key
    Code(u8),
    /// Dedicated release codes, one per modifier key
    Map(&'static [(u8, Key)]),
}

/// Scan code tables for one keyboard type
///
/// The shift and alt tables only list codes that differ from the default
/// plane.
#[derive(Debug, Clone, Copy)]
pub struct Keymap {
    pub name: &'static str,
    pub default: &'static [(u8, Key)],
    pub shift: &'static [(u8, Key)],
    pub alt: &'static [(u8, Key)],
    pub modifier_release: ModifierRelease,
}

/// Result of interpreting one scan code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key pressed, `None` for unmapped codes and modifier releases
    pub key: Option<Key>,
    pub modifiers: Modifiers,
    /// Set when a modifier key changed the modifier state
    pub modifiers_changed: bool,
}

/// Keyboard state for one attached terminal
#[derive(Debug)]
pub struct Keyboard {
    default: HashMap<u8, Key>,
    shift: HashMap<u8, Key>,
    alt: HashMap<u8, Key>,
    release: ModifierRelease,
    release_codes: HashMap<u8, Key>,
    modifiers: Modifiers,
    release_pending: bool,
    /// Key click enabled
    pub clicker: bool,
}

fn overlay(base: &HashMap<u8, Key>, changes: &[(u8, Key)]) -> HashMap<u8, Key> {
    let mut plane = base.clone();
    plane.extend(changes.iter().copied());
    plane
}

impl Keyboard {
    pub fn new(keymap: &Keymap) -> Self {
        let default: HashMap<u8, Key> = keymap.default.iter().copied().collect();
        let shift = overlay(&default, keymap.shift);
        let alt = overlay(&default, keymap.alt);
        let release_codes = match keymap.modifier_release {
            ModifierRelease::Map(codes) => codes.iter().copied().collect(),
            ModifierRelease::Code(_) => HashMap::new(),
        };

        Self {
            default,
            shift,
            alt,
            release: keymap.modifier_release,
            release_codes,
            modifiers: Modifiers::NONE,
            release_pending: false,
            clicker: false,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn toggle_clicker(&mut self) {
        self.clicker = !self.clicker;
    }

    /// Map a scan code to a key, updating the modifier state
    pub fn get_key(&mut self, scan_code: u8) -> KeyEvent {
        let mut key = self.default.get(&scan_code).copied();
        let original = self.modifiers;

        if let Some(released) = self.apply_modifiers(scan_code, key) {
            return KeyEvent {
                key: if released { None } else { key },
                modifiers: self.modifiers,
                modifiers_changed: self.modifiers != original,
            };
        }

        if self.modifiers.is_shift() {
            key = self.shift.get(&scan_code).copied();
        } else if self.modifiers.is_alt() {
            key = self.alt.get(&scan_code).copied();
        }

        let key = key.map(|key| match key {
            Key::Char(ch) if self.modifiers.is_caps_lock() && ch.is_ascii_alphabetic() => {
                if self.modifiers.is_shift() {
                    Key::Char(ch.to_ascii_lowercase())
                } else {
                    Key::Char(ch.to_ascii_uppercase())
                }
            }
            other => other,
        });

        KeyEvent { key, modifiers: self.modifiers, modifiers_changed: false }
    }

    /// Returns `Some(is_release)` when the scan code was a modifier event
    fn apply_modifiers(&mut self, scan_code: u8, key: Option<Key>) -> Option<bool> {
        if let ModifierRelease::Code(code) = self.release {
            if scan_code == code {
                self.release_pending = true;
                return Some(false);
            }
        }

        let released = match self.release {
            ModifierRelease::Code(_) if self.release_pending => Some(key),
            ModifierRelease::Map(_) => self.release_codes.get(&scan_code).map(|&key| Some(key)),
            ModifierRelease::Code(_) => None,
        };

        if let Some(released_key) = released {
            self.release_pending = false;
            let modifier = released_key.and_then(Key::modifier)?;
            // caps lock toggles on press, its release changes nothing
            if modifier != Modifiers::CAPS_LOCK {
                self.modifiers.remove(modifier);
            }
            return Some(true);
        }

        let modifier = key.and_then(Key::modifier)?;
        if modifier == Modifiers::CAPS_LOCK {
            self.modifiers.toggle(modifier);
        } else {
            self.modifiers.insert(modifier);
        }
        Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_shifted_keys() {
        let mut keyboard = Keyboard::new(&keymap_3278::KEYMAP);

        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('a')));

        let event = keyboard.get_key(77);
        assert_eq!(event.key, Some(Key::LeftShift));
        assert!(event.modifiers_changed);
        assert!(event.modifiers.is_shift());

        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('A')));
        assert_eq!(keyboard.get_key(33).key, Some(Key::Char('|')));

        let event = keyboard.get_key(205);
        assert_eq!(event.key, None);
        assert!(event.modifiers_changed);
        assert!(!keyboard.modifiers().is_shift());
        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('a')));
    }

    #[test]
    fn test_caps_lock_toggles() {
        let mut keyboard = Keyboard::new(&keymap_3278::KEYMAP);

        keyboard.get_key(76);
        assert!(keyboard.modifiers().is_caps_lock());
        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('A')));
        // digits are not affected
        assert_eq!(keyboard.get_key(33).key, Some(Key::Char('1')));

        // releasing caps lock keeps it on
        keyboard.get_key(204);
        assert!(keyboard.modifiers().is_caps_lock());

        // shift inverts caps lock
        keyboard.get_key(77);
        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('a')));
        keyboard.get_key(205);

        keyboard.get_key(76);
        assert!(!keyboard.modifiers().is_caps_lock());
    }

    #[test]
    fn test_alt_plane() {
        let mut keyboard = Keyboard::new(&keymap_3278::KEYMAP);

        keyboard.get_key(79);
        assert_eq!(keyboard.get_key(33).key, Some(Key::Pf(1)));
        assert_eq!(keyboard.get_key(95).key, Some(Key::Pa(1)));
        // keys without an alternate meaning keep the default one
        assert_eq!(keyboard.get_key(96).key, Some(Key::Char('a')));
        keyboard.get_key(207);
        assert_eq!(keyboard.get_key(33).key, Some(Key::Char('1')));
    }

    #[test]
    fn test_single_release_code() {
        let mut keyboard = Keyboard::new(&keymap_3483::KEYMAP);

        keyboard.get_key(18);
        assert!(keyboard.modifiers().is_shift());
        assert_eq!(keyboard.get_key(7).key, Some(Key::Pf(13)));

        let event = keyboard.get_key(240);
        assert_eq!(event.key, None);
        assert!(!event.modifiers_changed);

        let event = keyboard.get_key(18);
        assert_eq!(event.key, None);
        assert!(event.modifiers_changed);
        assert_eq!(keyboard.get_key(7).key, Some(Key::Pf(1)));
    }

    #[test]
    fn test_release_of_ordinary_key_is_a_key() {
        let mut keyboard = Keyboard::new(&keymap_3483::KEYMAP);

        keyboard.get_key(240);
        // not a modifier, so it is reported as a press
        assert_eq!(keyboard.get_key(28).key, Some(Key::Char('a')));
        assert_eq!(keyboard.get_key(28).key, Some(Key::Char('a')));
    }

    #[test]
    fn test_unmapped_code() {
        let mut keyboard = Keyboard::new(&keymap_3278::KEYMAP);
        let event = keyboard.get_key(250);
        assert_eq!(event.key, None);
        assert!(!event.modifiers_changed);
    }

    #[test]
    fn test_clicker_toggle() {
        let mut keyboard = Keyboard::new(&keymap_3483::KEYMAP);
        assert!(!keyboard.clicker);
        keyboard.toggle_clicker();
        assert!(keyboard.clicker);
    }
}

//! Rendering the screen buffer into terminal regen memory
//!
//! Regen row 0 is the status line; screen address `i` lives at regen
//! address `cols + i`. The display keeps two mirrors of regen: what the
//! terminal is known to show and what it should show. A flush writes the
//! span between the first and last differing byte in a single write.

use log::debug;

use crate::error::LinkResult;
use crate::field::FieldAttribute;
use crate::link::{DeviceLink, Interface};
use crate::screen::ScreenBuffer;
use crate::terminal::Dimensions;
use crate::tn3270::codes::{ATTR_DISPLAY, ATTR_PROTECTED};
use crate::tn3270::OperatorStatus;

/// Control register bits
const CONTROL_CURSOR_BLINK: u8 = 0x01;
const CONTROL_CURSOR_REVERSE: u8 = 0x02;

const STATUS_MESSAGE_COLUMN: usize = 8;
const STATUS_MESSAGE_LENGTH: usize = 9;
const STATUS_SHIFT_COLUMN: usize = 35;
const STATUS_INSERT_COLUMN: usize = 45;
const STATUS_MODE_COLUMN: usize = 45;

const INDICATOR_SHIFT: u8 = 0xDA;
const INDICATOR_INSERT: u8 = 0xD3;

/// Display code for a character, 0x00 when the terminal cannot show it
pub fn encode_char(ch: char) -> u8 {
    match ch {
        'a'..='z' => 0x80 + (ch as u8 - b'a'),
        'A'..='Z' => 0xA0 + (ch as u8 - b'A'),
        '0'..='9' => 0x20 + (ch as u8 - b'0'),
        '>' => 0x08,
        '<' => 0x09,
        '[' => 0x0A,
        ']' => 0x0B,
        ')' => 0x0C,
        '(' => 0x0D,
        '}' => 0x0E,
        '{' => 0x0F,
        '=' => 0x11,
        '\'' => 0x12,
        '"' => 0x13,
        '/' => 0x14,
        '\\' => 0x15,
        '|' => 0x16,
        '¦' => 0x17,
        '?' => 0x18,
        '!' => 0x19,
        '$' => 0x1A,
        '¢' => 0x1B,
        '£' => 0x1C,
        '¥' => 0x1D,
        'ß' => 0x2A,
        '§' => 0x2B,
        '#' => 0x2C,
        '@' => 0x2D,
        '%' => 0x2E,
        '_' => 0x2F,
        '&' => 0x30,
        '-' => 0x31,
        '.' => 0x32,
        ',' => 0x33,
        ':' => 0x34,
        '+' => 0x35,
        '¬' => 0x36,
        '¯' => 0x37,
        '°' => 0x38,
        '^' => 0x3A,
        '~' => 0x3B,
        '¨' => 0x3C,
        'æ' => 0x9A,
        'ø' => 0x9B,
        'å' => 0x9C,
        'ç' => 0x9D,
        'Æ' => 0xBA,
        'Ø' => 0xBB,
        'Å' => 0xBC,
        'Ç' => 0xBD,
        ';' | crate::ebcdic::FIELD_MARK_CHAR => 0xBE,
        '*' | crate::ebcdic::DUP_CHAR => 0xBF,
        _ => 0x00,
    }
}

pub fn encode_str(s: &str) -> Vec<u8> {
    s.chars().map(encode_char).collect()
}

/// Display code for a field attribute: protected and display bits only
///
/// The terminal applies the display bits to the characters that follow,
/// so intensified and hidden data need no handling of their own.
pub fn encode_attribute(attribute: FieldAttribute) -> u8 {
    0xC0 | (attribute.bits() & (ATTR_PROTECTED | ATTR_DISPLAY))
}

fn status_message(status: OperatorStatus) -> Vec<u8> {
    let mut message = match status {
        OperatorStatus::Ready => Vec::new(),
        OperatorStatus::WaitingForHost => vec![0xF6, 0x00, 0xF4, 0xF5],
        OperatorStatus::ProtectedField => vec![0xF6, 0x00, 0xF8, 0xDB, 0xD8],
        OperatorStatus::NumericField => {
            let mut message = vec![0xF6, 0x00, 0xF8, 0xDB];
            message.extend(encode_str("NUM"));
            message
        }
        OperatorStatus::FieldOverflow => vec![0xF6, 0x00, 0xDB, encode_char('>')],
        OperatorStatus::SystemLock => {
            let mut message = vec![0xF6, 0x00];
            message.extend(encode_str("SYSTEM"));
            message
        }
    };
    message.resize(STATUS_MESSAGE_LENGTH, 0x00);
    message
}

/// Buffered view of terminal regen memory
pub struct Display {
    dimensions: Dimensions,
    /// Regen content the terminal is known to hold
    committed: Vec<u8>,
    /// Regen content the terminal should hold
    desired: Vec<u8>,
    control: u8,
}

impl Display {
    pub fn new(dimensions: Dimensions) -> Self {
        let length = (dimensions.rows + 1) * dimensions.cols;
        Self {
            dimensions,
            committed: vec![0; length],
            desired: vec![0; length],
            control: 0,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Null all of regen, status line included, regardless of mirrors
    pub fn clear<I: Interface>(&mut self, link: &mut DeviceLink<I>) -> LinkResult<()> {
        let zeros = vec![0u8; self.desired.len()];
        link.write(0, &zeros)?;
        self.committed.fill(0);
        self.desired.fill(0);
        link.load_address_counter(self.dimensions.cols as u16)
    }

    /// Update the screen area from the buffer
    pub fn render(&mut self, buffer: &ScreenBuffer) {
        let cols = self.dimensions.cols;

        for (index, cell) in buffer.cells().iter().enumerate() {
            let byte = match cell.attribute {
                Some(attribute) => encode_attribute(attribute),
                None => encode_char(cell.ch),
            };
            if let Some(slot) = self.desired.get_mut(cols + index) {
                *slot = byte;
            }
        }
    }

    fn write_status(&mut self, column: usize, data: &[u8]) {
        let end = (column + data.len()).min(self.dimensions.cols);
        if column < end {
            self.desired[column..end].copy_from_slice(&data[..end - column]);
        }
    }

    pub fn show_shift(&mut self, shift: bool) {
        self.write_status(STATUS_SHIFT_COLUMN, &[if shift { INDICATOR_SHIFT } else { 0x00 }]);
    }

    pub fn show_insert(&mut self, insert: bool) {
        self.write_status(STATUS_INSERT_COLUMN, &[if insert { INDICATOR_INSERT } else { 0x00 }]);
    }

    pub fn show_status(&mut self, status: OperatorStatus) {
        self.write_status(STATUS_MESSAGE_COLUMN, &status_message(status));
    }

    /// Session mode label, e.g. "VT100"
    pub fn show_mode(&mut self, label: &str) {
        self.write_status(STATUS_MODE_COLUMN, &encode_str(label));
    }

    /// Write pending changes and place the cursor
    ///
    /// Returns whether anything was written. On failure the mirrors are
    /// left dirty so the next flush resends the span.
    pub fn flush<I: Interface>(&mut self, link: &mut DeviceLink<I>, cursor: usize) -> LinkResult<bool> {
        let first = self
            .desired
            .iter()
            .zip(&self.committed)
            .position(|(desired, committed)| desired != committed);

        let written = match first {
            Some(first) => {
                let last = self
                    .desired
                    .iter()
                    .zip(&self.committed)
                    .rposition(|(desired, committed)| desired != committed)
                    .unwrap_or(first);
                debug!("Writing regen {}-{}", first, last);
                link.write(first as u16, &self.desired[first..=last])?;
                self.committed[first..=last].copy_from_slice(&self.desired[first..=last]);
                true
            }
            None => false,
        };

        link.load_address_counter((self.dimensions.cols + cursor) as u16)?;
        Ok(written)
    }

    pub fn toggle_cursor_blink<I: Interface>(&mut self, link: &mut DeviceLink<I>) -> LinkResult<()> {
        self.control ^= CONTROL_CURSOR_BLINK;
        link.load_control_register(self.control)
    }

    pub fn toggle_cursor_reverse<I: Interface>(&mut self, link: &mut DeviceLink<I>) -> LinkResult<()> {
        self.control ^= CONTROL_CURSOR_REVERSE;
        link.load_control_register(self.control)
    }
}

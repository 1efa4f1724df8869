//! 3270 data stream codec
//!
//! Host records are decoded into screen operations; operator keystrokes
//! are turned into local edits and, for attention keys, inbound records
//! for the host. The codec owns the keyboard lock and operator error
//! state that drive the status line.

pub mod addressing;
pub mod codes;
pub mod decode;
pub mod encode;
pub mod operator;

use log::debug;

use crate::error::{DecodeResult, OperatorError};
use crate::keyboard::Key;
use crate::screen::{ScreenBuffer, ScreenOp};
use codes::{AidKey, AID_CLEAR, AID_NO_AID};
pub use decode::{Decoded, ReadRequest};

/// What a host record asks of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOutput {
    pub ops: Vec<ScreenOp>,
    pub alarm: bool,
    /// Inbound record to send back, for read commands
    pub reply: Option<Vec<u8>>,
}

/// What a keystroke asks of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyOutput {
    pub ops: Vec<ScreenOp>,
    /// Inbound record for the host, empty for local edits
    pub host_bytes: Vec<u8>,
}

impl KeyOutput {
    fn local(ops: Vec<ScreenOp>) -> Self {
        Self { ops, host_bytes: Vec::new() }
    }

    fn cursor(address: usize) -> Self {
        Self::local(vec![ScreenOp::MoveCursor(address)])
    }
}

/// Operator information shown in the status line message area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorStatus {
    Ready,
    WaitingForHost,
    ProtectedField,
    NumericField,
    FieldOverflow,
    SystemLock,
}

fn aid_for_key(key: Key) -> Option<AidKey> {
    match key {
        Key::Enter => Some(AidKey::Enter),
        Key::Clear => Some(AidKey::Clear),
        Key::Pa(1) => Some(AidKey::PA1),
        Key::Pa(2) => Some(AidKey::PA2),
        Key::Pa(3) => Some(AidKey::PA3),
        Key::Pf(number) => AidKey::pf(number),
        _ => None,
    }
}

/// Per-session 3270 state
#[derive(Debug, Clone)]
pub struct Tn3270Codec {
    keyboard_locked: bool,
    waiting: bool,
    insert_mode: bool,
    operator_error: Option<OperatorError>,
    last_aid: u8,
}

impl Default for Tn3270Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Tn3270Codec {
    pub fn new() -> Self {
        Self {
            keyboard_locked: false,
            waiting: false,
            insert_mode: false,
            operator_error: None,
            last_aid: AID_NO_AID,
        }
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn operator_error(&self) -> Option<OperatorError> {
        self.operator_error
    }

    /// Message area contents, most important first
    pub fn status(&self) -> OperatorStatus {
        if self.waiting {
            return OperatorStatus::WaitingForHost;
        }
        match self.operator_error {
            Some(OperatorError::ProtectedFieldViolation) => OperatorStatus::ProtectedField,
            Some(OperatorError::NumericFieldViolation) => OperatorStatus::NumericField,
            Some(OperatorError::FieldOverflow) => OperatorStatus::FieldOverflow,
            Some(OperatorError::KeyboardLocked) => OperatorStatus::SystemLock,
            None if self.keyboard_locked => OperatorStatus::SystemLock,
            None => OperatorStatus::Ready,
        }
    }

    /// Decode one host record
    ///
    /// On error no state changes; the caller decides whether the record
    /// can be skipped.
    pub fn decode(&mut self, data: &[u8], buffer: &ScreenBuffer) -> DecodeResult<HostOutput> {
        let decoded = decode::decode(data, buffer)?;

        self.waiting = false;
        let reply = decoded
            .read
            .map(|request| decode::read_reply(request, self.last_aid, buffer));

        if decoded.restore_keyboard {
            self.keyboard_locked = false;
            self.last_aid = AID_NO_AID;
        }

        debug!(
            "3270 record: {} ops, alarm {}, restore {}, read {:?}",
            decoded.ops.len(),
            decoded.alarm,
            decoded.restore_keyboard,
            decoded.read
        );

        Ok(HostOutput { ops: decoded.ops, alarm: decoded.alarm, reply })
    }

    /// Handle one operator key
    ///
    /// Edit errors are remembered and inhibit further input until RESET.
    pub fn encode_key(&mut self, key: Key, buffer: &ScreenBuffer) -> Result<KeyOutput, OperatorError> {
        if key == Key::Reset {
            self.operator_error = None;
            self.insert_mode = false;
            return Ok(KeyOutput::default());
        }
        if self.keyboard_locked || self.operator_error.is_some() {
            return Err(OperatorError::KeyboardLocked);
        }

        let result = self.edit(key, buffer);
        if let Err(error) = &result {
            self.operator_error = Some(*error);
        }
        result
    }

    fn edit(&mut self, key: Key, buffer: &ScreenBuffer) -> Result<KeyOutput, OperatorError> {
        if let Some(aid) = aid_for_key(key) {
            return Ok(self.encode_aid(aid, buffer));
        }

        let insert = self.insert_mode;
        let output = match key {
            Key::Char(ch) => KeyOutput::local(operator::input(buffer, ch, insert)?),
            Key::Dup => KeyOutput::local(operator::dup(buffer, insert)?),
            Key::FieldMark => KeyOutput::local(operator::field_mark(buffer, insert)?),
            Key::Backspace => KeyOutput::local(operator::backspace(buffer)?),
            Key::Delete => KeyOutput::local(operator::delete(buffer)?),
            Key::EraseEof => KeyOutput::local(operator::erase_eof(buffer)?),
            Key::EraseInput => KeyOutput::local(operator::erase_input(buffer)),
            Key::Tab => KeyOutput::cursor(operator::tab(buffer)),
            Key::Backtab => KeyOutput::cursor(operator::backtab(buffer)),
            Key::Newline => KeyOutput::cursor(operator::newline(buffer)),
            Key::Home => KeyOutput::cursor(operator::home(buffer)),
            Key::Left => KeyOutput::cursor(operator::move_by(buffer, -1)),
            Key::Right => KeyOutput::cursor(operator::move_by(buffer, 1)),
            Key::Left2 => KeyOutput::cursor(operator::move_by(buffer, -2)),
            Key::Right2 => KeyOutput::cursor(operator::move_by(buffer, 2)),
            Key::Up => KeyOutput::cursor(operator::move_by(buffer, -(buffer.cols() as isize))),
            Key::Down => KeyOutput::cursor(operator::move_by(buffer, buffer.cols() as isize)),
            Key::Insert => {
                self.insert_mode = !self.insert_mode;
                KeyOutput::default()
            }
            _ => {
                debug!("Ignoring key {:?} in 3270 session", key);
                KeyOutput::default()
            }
        };
        Ok(output)
    }

    /// Attention key: lock the keyboard and build the inbound record
    ///
    /// Clear also clears the screen locally and sends the AID alone.
    pub fn encode_aid(&mut self, aid: AidKey, buffer: &ScreenBuffer) -> KeyOutput {
        let code = aid.to_u8();
        self.keyboard_locked = true;
        self.waiting = true;
        self.insert_mode = false;
        self.last_aid = code;

        if code == AID_CLEAR {
            return KeyOutput { ops: vec![ScreenOp::Clear], host_bytes: vec![AID_CLEAR] };
        }
        KeyOutput {
            ops: Vec::new(),
            host_bytes: encode::read_modified(code, buffer, false),
        }
    }
}

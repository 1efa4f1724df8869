//! Coax words and terminal commands
//!
//! Every exchange with the terminal is a command word, optionally followed
//! by data words, answered by response words. A command word carries the
//! command code shifted left two with bit 0 set; a data word carries its
//! byte at bits 2..9 with even parity in bit 1.

use crate::error::{LinkError, LinkResult};

pub const POLL: u8 = 0x01;
pub const POLL_ACK: u8 = 0x11;
pub const READ_TERMINAL_ID: u8 = 0x09;
pub const READ_EXTENDED_ID: u8 = 0x07;
pub const LOAD_ADDRESS_COUNTER_HI: u8 = 0x04;
pub const LOAD_ADDRESS_COUNTER_LO: u8 = 0x14;
pub const WRITE_DATA: u8 = 0x0C;
pub const LOAD_CONTROL_REGISTER: u8 = 0x0A;

/// Response to a command that returns no data
pub const TT_AR: u16 = 0b10;
/// Power-on reset complete
pub const POWER_ON_RESET: u16 = 0b1010;

pub fn command_word(code: u8) -> u16 {
    (u16::from(code) << 2) | 1
}

pub fn data_word(byte: u8) -> u16 {
    let parity = u16::from(byte.count_ones() % 2 == 1);
    (u16::from(byte) << 2) | (parity << 1)
}

/// Byte carried by a response or data word
pub fn word_byte(word: u16) -> u8 {
    ((word >> 2) & 0xFF) as u8
}

/// Action requested of the terminal along with a POLL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollAction {
    #[default]
    None,
    Alarm,
    EnableKeyboardClicker,
    DisableKeyboardClicker,
}

impl PollAction {
    fn bits(self) -> u16 {
        match self {
            PollAction::None => 0b00,
            PollAction::DisableKeyboardClicker => 0b01,
            PollAction::Alarm => 0b10,
            PollAction::EnableKeyboardClicker => 0b11,
        }
    }
}

pub fn poll_word(action: PollAction) -> u16 {
    command_word(POLL) | (action.bits() << 8)
}

/// A decoded POLL response word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResponse {
    NoData,
    PowerOnReset,
    Keystroke(u8),
    Status(u16),
}

pub fn parse_poll_response(word: u16) -> LinkResult<PollResponse> {
    match word {
        TT_AR => Ok(PollResponse::NoData),
        POWER_ON_RESET => Ok(PollResponse::PowerOnReset),
        _ if word & 0b11 == 0b10 => Ok(PollResponse::Keystroke(word_byte(word))),
        _ if word & 0b11 == 0b01 => Ok(PollResponse::Status(word >> 2)),
        _ => Err(LinkError::Malformed {
            reason: format!("unexpected POLL response 0x{:04X}", word),
        }),
    }
}

/// Check a single TT/AR acknowledgement
pub fn expect_tt_ar(command: &'static str, words: &[u16]) -> LinkResult<()> {
    match words {
        [TT_AR] => Ok(()),
        [word] => Err(LinkError::Malformed {
            reason: format!("{} answered 0x{:04X} instead of TT/AR", command, word),
        }),
        _ => Err(LinkError::ShortResponse { expected: 1, received: words.len() }),
    }
}

/// Extract exactly `count` data bytes from response words
pub fn expect_bytes(words: &[u16], count: usize) -> LinkResult<Vec<u8>> {
    if words.len() != count {
        return Err(LinkError::ShortResponse { expected: count, received: words.len() });
    }
    Ok(words.iter().map(|&word| word_byte(word)).collect())
}

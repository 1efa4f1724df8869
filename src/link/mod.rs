//! Device link to a terminal attached through a coax interface
//!
//! [`DeviceLink`] turns terminal operations (poll, read id, write regen)
//! into coax command sequences executed by an [`Interface`]. The terminal's
//! address counter is tracked here so writes to consecutive addresses do
//! not reload it.

pub mod command;
pub mod frame;
pub mod interface;
pub mod serial;

use std::time::Duration;

use log::{debug, warn};

use crate::error::{LinkError, LinkResult};
use command::{
    command_word, data_word, expect_bytes, expect_tt_ar, parse_poll_response, poll_word,
    PollResponse,
};
pub use command::PollAction;
pub use interface::Interface;
pub use serial::{open_serial, SerialInterface};

/// Outcome of a single POLL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    NoData,
    KeyboardData(u8),
    /// The terminal completed a power-on reset and reported this id
    TerminalIdData(u8),
    StatusChange(u16),
}

/// Command layer over a coax interface
pub struct DeviceLink<I> {
    interface: I,
    receive_timeout: Duration,
    jumbo_write_max_length: Option<usize>,
    /// Last known terminal address counter, `None` after any failure
    address_counter: Option<u16>,
}

impl<I: Interface> DeviceLink<I> {
    pub fn new(interface: I, receive_timeout: Duration) -> Self {
        Self {
            interface,
            receive_timeout,
            jumbo_write_max_length: None,
            address_counter: None,
        }
    }

    /// Split writes longer than `max_length` words
    pub fn with_jumbo_write_max_length(mut self, max_length: Option<usize>) -> Self {
        self.set_jumbo_write_max_length(max_length);
        self
    }

    pub fn set_jumbo_write_max_length(&mut self, max_length: Option<usize>) {
        self.jumbo_write_max_length = max_length.filter(|&length| length > 1);
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    /// Reset the interface and forget the address counter
    pub fn reset(&mut self) -> LinkResult<Vec<u8>> {
        self.address_counter = None;
        self.interface.reset()
    }

    fn execute(&mut self, words: &[u16], receive_length: usize) -> LinkResult<Vec<u16>> {
        self.interface
            .transmit_receive(words, receive_length, self.receive_timeout)
    }

    pub fn poll(&mut self, action: PollAction) -> LinkResult<PollResult> {
        let response = self.execute(&[poll_word(action)], 1)?;
        let word = match response.as_slice() {
            [word] => *word,
            _ => {
                return Err(LinkError::ShortResponse { expected: 1, received: response.len() })
            }
        };
        let parsed = parse_poll_response(word)?;

        if parsed != PollResponse::NoData {
            self.poll_ack()?;
        }

        match parsed {
            PollResponse::NoData => Ok(PollResult::NoData),
            PollResponse::PowerOnReset => {
                debug!("Terminal power-on reset");
                self.address_counter = None;
                Ok(PollResult::TerminalIdData(self.read_terminal_id()?))
            }
            PollResponse::Keystroke(scan_code) => Ok(PollResult::KeyboardData(scan_code)),
            PollResponse::Status(flags) => Ok(PollResult::StatusChange(flags)),
        }
    }

    pub fn poll_ack(&mut self) -> LinkResult<()> {
        let response = self.execute(&[command_word(command::POLL_ACK)], 1)?;
        expect_tt_ar("POLL_ACK", &response)
    }

    pub fn read_terminal_id(&mut self) -> LinkResult<u8> {
        let response = self.execute(&[command_word(command::READ_TERMINAL_ID)], 1)?;
        Ok(expect_bytes(&response, 1)?[0])
    }

    pub fn read_extended_id(&mut self) -> LinkResult<[u8; 4]> {
        let response = self.execute(&[command_word(command::READ_EXTENDED_ID)], 4)?;
        let bytes = expect_bytes(&response, 4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Load the address counter, sending only the bytes that changed
    pub fn load_address_counter(&mut self, address: u16) -> LinkResult<()> {
        let result = self.load_address_counter_inner(address);
        self.address_counter = result.as_ref().ok().map(|_| address);
        result
    }

    fn load_address_counter_inner(&mut self, address: u16) -> LinkResult<()> {
        let [hi, lo] = address.to_be_bytes();
        let current = self.address_counter.map(u16::to_be_bytes);

        if current.map(|bytes| bytes[0]) != Some(hi) {
            let words = [command_word(command::LOAD_ADDRESS_COUNTER_HI), data_word(hi)];
            let response = self.execute(&words, 1)?;
            expect_tt_ar("LOAD_ADDRESS_COUNTER_HI", &response)?;
        }
        if current.map(|bytes| bytes[1]) != Some(lo) {
            let words = [command_word(command::LOAD_ADDRESS_COUNTER_LO), data_word(lo)];
            let response = self.execute(&words, 1)?;
            expect_tt_ar("LOAD_ADDRESS_COUNTER_LO", &response)?;
        }
        Ok(())
    }

    /// Write bytes into regen memory starting at `address`
    pub fn write(&mut self, address: u16, data: &[u8]) -> LinkResult<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.load_address_counter(address)?;

        let result = self.write_chunks(data);
        self.address_counter = match result {
            Ok(()) => Some(address.wrapping_add(data.len() as u16)),
            Err(ref error) => {
                warn!("Write of {} bytes at {} failed: {}", data.len(), address, error);
                None
            }
        };
        result
    }

    fn write_chunks(&mut self, data: &[u8]) -> LinkResult<()> {
        let first_length = match self.jumbo_write_max_length {
            Some(max_length) => (max_length - 1).min(data.len()),
            None => data.len(),
        };
        let (first, mut rest) = data.split_at(first_length);

        let mut words = Vec::with_capacity(first.len() + 1);
        words.push(command_word(command::WRITE_DATA));
        words.extend(first.iter().map(|&byte| data_word(byte)));
        let response = self.execute(&words, 1)?;
        expect_tt_ar("WRITE_DATA", &response)?;

        // continuation chunks carry data words only
        if let Some(max_length) = self.jumbo_write_max_length {
            while !rest.is_empty() {
                let (chunk, remainder) = rest.split_at(max_length.min(rest.len()));
                let words: Vec<u16> = chunk.iter().map(|&byte| data_word(byte)).collect();
                let response = self.execute(&words, 1)?;
                expect_tt_ar("WRITE_DATA", &response)?;
                rest = remainder;
            }
        }
        Ok(())
    }

    pub fn load_control_register(&mut self, value: u8) -> LinkResult<()> {
        let words = [command_word(command::LOAD_CONTROL_REGISTER), data_word(value)];
        let response = self.execute(&words, 1)?;
        expect_tt_ar("LOAD_CONTROL_REGISTER", &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records transmissions and answers from a queue, TT/AR by default
    #[derive(Default)]
    struct RecordingInterface {
        sent: Vec<Vec<u16>>,
        responses: VecDeque<LinkResult<Vec<u16>>>,
    }

    impl Interface for RecordingInterface {
        fn reset(&mut self) -> LinkResult<Vec<u8>> {
            Ok(vec![0x01])
        }

        fn transmit_receive(
            &mut self,
            words: &[u16],
            _receive_length: usize,
            _timeout: Duration,
        ) -> LinkResult<Vec<u16>> {
            self.sent.push(words.to_vec());
            self.responses
                .pop_front()
                .unwrap_or(Ok(vec![command::TT_AR]))
        }
    }

    fn link(responses: Vec<LinkResult<Vec<u16>>>) -> DeviceLink<RecordingInterface> {
        let interface = RecordingInterface { sent: Vec::new(), responses: responses.into() };
        DeviceLink::new(interface, Duration::from_millis(100))
    }

    #[test]
    fn test_poll_no_data_is_not_acknowledged() {
        let mut link = link(vec![Ok(vec![0b10])]);
        assert_eq!(link.poll(PollAction::None).unwrap(), PollResult::NoData);
        assert_eq!(link.interface().sent.len(), 1);
    }

    #[test]
    fn test_poll_keystroke_is_acknowledged() {
        let mut link = link(vec![Ok(vec![(0x60 << 2) | 0b10])]);
        assert_eq!(link.poll(PollAction::Alarm).unwrap(), PollResult::KeyboardData(0x60));
        let sent = &link.interface().sent;
        assert_eq!(sent[0], vec![0x205]);
        assert_eq!(sent[1], vec![command_word(command::POLL_ACK)]);
    }

    #[test]
    fn test_power_on_reset_reads_terminal_id() {
        let mut link = link(vec![
            Ok(vec![0b1010]),
            Ok(vec![command::TT_AR]),
            Ok(vec![data_word(0x04)]),
        ]);
        assert_eq!(link.poll(PollAction::None).unwrap(), PollResult::TerminalIdData(0x04));
    }

    #[test]
    fn test_address_counter_reload_is_minimal() {
        let mut link = link(vec![]);
        link.write(80, &[0x80, 0x81]).unwrap();
        // hi + lo + write
        assert_eq!(link.interface().sent.len(), 3);

        // counter now sits at 82, so writing there loads nothing
        link.write(82, &[0x82]).unwrap();
        assert_eq!(link.interface().sent.len(), 4);

        // same high byte, only the low byte is reloaded
        link.write(90, &[0x83]).unwrap();
        let sent = &link.interface().sent;
        assert_eq!(sent.len(), 6);
        assert_eq!(sent[4], vec![command_word(command::LOAD_ADDRESS_COUNTER_LO), data_word(90)]);
    }

    #[test]
    fn test_failed_write_forgets_address_counter() {
        let mut link = link(vec![
            Ok(vec![command::TT_AR]),
            Ok(vec![command::TT_AR]),
            Err(LinkError::ReceiveTimeout),
        ]);
        assert!(link.write(80, &[0x80]).is_err());
        link.write(81, &[0x81]).unwrap();
        // both address bytes reloaded after the failure
        assert_eq!(link.interface().sent.len(), 6);
    }

    #[test]
    fn test_jumbo_write_is_split() {
        let mut link = link(vec![]).with_jumbo_write_max_length(Some(4));
        link.load_address_counter(0).unwrap();
        link.write(0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

        let sent = &link.interface().sent[2..];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].len(), 4);
        assert_eq!(sent[0][0], command_word(command::WRITE_DATA));
        assert_eq!(sent[1], vec![data_word(4), data_word(5), data_word(6), data_word(7)]);
        assert_eq!(sent[2], vec![data_word(8)]);
    }

    #[test]
    fn test_read_extended_id() {
        let id = [0xC1, 0x34, 0x83, 0x00];
        let mut link = link(vec![Ok(id.iter().map(|&byte| data_word(byte)).collect())]);
        assert_eq!(link.read_extended_id().unwrap(), id);
    }

    #[test]
    fn test_short_response_is_an_error() {
        let mut link = link(vec![Ok(vec![])]);
        assert!(matches!(link.read_terminal_id(), Err(LinkError::ShortResponse { .. })));
    }
}

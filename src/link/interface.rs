//! Coax interface request/response messages
//!
//! The interface executes one coax transmission per request and answers
//! with the words the terminal sent back. Messages travel inside SLIP
//! frames (see [`super::frame`]).

use std::time::Duration;

use crate::error::{LinkError, LinkResult};

pub const REQUEST_RESET: u8 = 0x01;
pub const REQUEST_TRANSMIT_RECEIVE: u8 = 0x06;

pub const RESPONSE_OK: u8 = 0x01;
pub const RESPONSE_ERROR: u8 = 0x02;

pub const ERROR_INVALID_MESSAGE: u8 = 0x01;
pub const ERROR_UNKNOWN_COMMAND: u8 = 0x02;
pub const ERROR_RECEIVE_TIMEOUT: u8 = 0x65;
pub const ERROR_RECEIVE_ERROR: u8 = 0x66;
pub const ERROR_RECEIVER_ACTIVE: u8 = 0x67;
pub const ERROR_TRANSMIT_ERROR: u8 = 0x68;

/// A transport able to execute coax transmissions
///
/// Implemented by the serial interface and by test doubles.
pub trait Interface: Send {
    /// Reset the interface, returning its firmware version bytes
    fn reset(&mut self) -> LinkResult<Vec<u8>>;

    /// Transmit `words` and wait up to `timeout` for the terminal response
    ///
    /// A `receive_length` of zero accepts any number of response words.
    fn transmit_receive(
        &mut self,
        words: &[u16],
        receive_length: usize,
        timeout: Duration,
    ) -> LinkResult<Vec<u16>>;
}

impl<T: Interface + ?Sized> Interface for Box<T> {
    fn reset(&mut self) -> LinkResult<Vec<u8>> {
        (**self).reset()
    }

    fn transmit_receive(
        &mut self,
        words: &[u16],
        receive_length: usize,
        timeout: Duration,
    ) -> LinkResult<Vec<u16>> {
        (**self).transmit_receive(words, receive_length, timeout)
    }
}

/// Whether a RESET response came from first generation firmware
///
/// Only that firmware answers RESET with its major, minor and patch
/// version.
pub fn is_legacy_firmware(version: &[u8]) -> bool {
    version.len() == 3
}

/// Build a TRANSMIT_RECEIVE request message
pub fn encode_transmit_receive(words: &[u16], receive_length: usize, timeout: Duration) -> Vec<u8> {
    let mut message = Vec::with_capacity(7 + words.len() * 2);
    message.push(REQUEST_TRANSMIT_RECEIVE);
    // repeat count zero: send the words once
    message.extend_from_slice(&0u16.to_be_bytes());
    for word in words {
        message.extend_from_slice(&word.to_le_bytes());
    }
    let receive_length = u16::try_from(receive_length).unwrap_or(u16::MAX);
    message.extend_from_slice(&receive_length.to_be_bytes());
    let timeout_ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    message.extend_from_slice(&timeout_ms.to_be_bytes());
    message
}

/// Strip the status byte from a response, mapping error codes
pub fn decode_response(message: &[u8]) -> LinkResult<&[u8]> {
    match message.split_first() {
        None => Err(LinkError::ShortResponse { expected: 1, received: 0 }),
        Some((&RESPONSE_OK, payload)) => Ok(payload),
        Some((&RESPONSE_ERROR, payload)) => match payload.first() {
            None => Err(LinkError::ShortResponse { expected: 2, received: 1 }),
            Some(&ERROR_RECEIVE_TIMEOUT) => Err(LinkError::ReceiveTimeout),
            Some(&ERROR_RECEIVE_ERROR) => Err(LinkError::ReceiveError),
            Some(&code) => Err(LinkError::Interface { code }),
        },
        Some((status, _)) => Err(LinkError::Malformed {
            reason: format!("unknown response status 0x{:02x}", status),
        }),
    }
}

/// Response payload as little-endian words
pub fn decode_words(payload: &[u8]) -> LinkResult<Vec<u16>> {
    if payload.len() % 2 != 0 {
        return Err(LinkError::Malformed {
            reason: format!("odd response length {}", payload.len()),
        });
    }
    Ok(payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_transmit_receive() {
        let message = encode_transmit_receive(&[0x0005, 0x0231], 1, Duration::from_millis(100));
        assert_eq!(
            message,
            vec![0x06, 0x00, 0x00, 0x05, 0x00, 0x31, 0x02, 0x00, 0x01, 0x00, 0x64]
        );
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(decode_response(&[0x01, 0x02, 0x00]).unwrap(), &[0x02, 0x00]);
        assert!(matches!(decode_response(&[0x02, 0x65]), Err(LinkError::ReceiveTimeout)));
        assert!(matches!(decode_response(&[0x02, 0x66]), Err(LinkError::ReceiveError)));
        assert!(matches!(
            decode_response(&[0x02, ERROR_UNKNOWN_COMMAND]),
            Err(LinkError::Interface { code: 0x02 })
        ));
        assert!(matches!(decode_response(&[]), Err(LinkError::ShortResponse { .. })));
        assert!(matches!(decode_response(&[0x7F]), Err(LinkError::Malformed { .. })));
    }

    #[test]
    fn test_legacy_firmware() {
        assert!(is_legacy_firmware(&[0x00, 0x04, 0x01]));
        assert!(!is_legacy_firmware(&[]));
        assert!(!is_legacy_firmware(&[0x01, 0x00]));
    }

    #[test]
    fn test_decode_words() {
        assert_eq!(decode_words(&[0x02, 0x00, 0x85, 0x01]).unwrap(), vec![0x0002, 0x0185]);
        assert!(decode_words(&[0x02]).is_err());
    }
}

//! Error types for the terminal controller
//!
//! Errors are grouped by the layer that raises them. Everything below the
//! controller only reports; `ControllerError` is the type the session state
//! machine uses to decide whether the session survives.

use std::io;
use thiserror::Error;

/// Top-level error type for controller operations
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Device link errors that survived the retry budget
    #[error("device link failure: {0}")]
    FatalLink(#[source] LinkError),
    /// Terminal identification failed before the session started
    #[error("terminal identification failed: {0}")]
    Identification(#[source] LinkError),
    /// Host data stream violation that cannot be skipped
    #[error("unrecoverable data stream error: {0}")]
    Protocol(#[source] ProtocolViolation),
    /// Screen buffer invariant broken by a codec
    #[error("screen buffer defect: {0}")]
    Screen(#[from] ScreenError),
    /// Host adapter errors
    #[error("host error: {0}")]
    Host(#[from] HostError),
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Coax interface and terminal exchange errors
///
/// All variants are recoverable at the link level; the controller decides
/// when a run of them becomes fatal.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial transport failure
    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),
    /// No response frame from the interface in time
    #[error("interface did not respond within {timeout_ms}ms")]
    InterfaceTimeout { timeout_ms: u64 },
    /// The terminal did not answer the coax command
    #[error("terminal receive timeout")]
    ReceiveTimeout,
    /// The interface reported a coax receive error (parity, length)
    #[error("terminal receive error")]
    ReceiveError,
    /// Interface reported an error code that is not a receive condition
    #[error("interface error 0x{code:02x}")]
    Interface { code: u8 },
    /// Response frame shorter than its header or declared length
    #[error("short response: expected {expected} bytes, received {received}")]
    ShortResponse { expected: usize, received: usize },
    /// Frame or response that does not follow the wire format
    #[error("malformed response: {reason}")]
    Malformed { reason: String },
    /// Terminal identified as something this controller cannot drive
    #[error("unsupported terminal: {reason}")]
    UnsupportedTerminal { reason: String },
}

/// Screen buffer invariant violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreenError {
    /// Address outside the buffer; always a codec defect
    #[error("address {address} out of bounds for buffer of {size} cells")]
    AddressOutOfBounds { address: usize, size: usize },
}

/// Classification of a malformed host data stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Command byte not in the 3270 command set
    UnknownCommand(u8),
    /// Order byte not in the 3270 order set
    UnknownOrder(u8),
    /// Buffer address beyond the screen
    AddressOutOfRange(usize),
    /// Command ended before an order's parameters
    Truncated { context: &'static str },
    /// Structured field length that does not fit the record
    BadStructuredField { length: usize },
}

/// A malformed host data stream
///
/// `recoverable` is true when the whole command can be dropped without
/// touching the screen buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} at offset {offset}")]
pub struct ProtocolViolation {
    pub kind: ViolationKind,
    pub offset: usize,
    pub recoverable: bool,
}

impl ProtocolViolation {
    pub fn skippable(kind: ViolationKind, offset: usize) -> Self {
        Self { kind, offset, recoverable: true }
    }

    pub fn truncated(context: &'static str, offset: usize) -> Self {
        Self {
            kind: ViolationKind::Truncated { context },
            offset,
            recoverable: false,
        }
    }
}

/// Operator errors raised while editing the screen
///
/// These never leave the controller; they become an indicator in the status
/// line message area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("cursor in protected field")]
    ProtectedFieldViolation,
    #[error("non-numeric character in numeric field")]
    NumericFieldViolation,
    #[error("field overflow")]
    FieldOverflow,
    #[error("keyboard locked")]
    KeyboardLocked,
}

/// Host collaborator errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unable to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("invalid host address: {address}")]
    InvalidAddress { address: String },
    #[error("unable to spawn host process: {reason}")]
    Spawn { reason: String },
    #[error("telnet negotiation failed: {reason}")]
    Negotiation { reason: String },
    #[error("host I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {parameter}: {reason}")]
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    #[error("unable to read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ControllerResult<T> = Result<T, ControllerError>;
pub type LinkResult<T> = Result<T, LinkError>;
pub type ScreenResult<T> = Result<T, ScreenError>;
pub type DecodeResult<T> = Result<T, ProtocolViolation>;
pub type HostResult<T> = Result<T, HostError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_violation_is_unrecoverable() {
        let violation = ProtocolViolation::truncated("SBA address", 4);
        assert!(!violation.recoverable);
        assert_eq!(violation.offset, 4);
    }

    #[test]
    fn test_error_display() {
        let error = ScreenError::AddressOutOfBounds { address: 1920, size: 1920 };
        assert_eq!(error.to_string(), "address 1920 out of bounds for buffer of 1920 cells");

        let error = ControllerError::FatalLink(LinkError::ReceiveTimeout);
        assert!(error.to_string().contains("terminal receive timeout"));
    }
}

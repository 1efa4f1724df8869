//! Host side of a session
//!
//! A host is either a TN3270 server reached over telnet or a local process
//! on a pseudo-terminal. Both deliver their output as [`HostEvent`]s from a
//! reader thread so the controller can wait on them with a deadline.

pub mod pty;
pub mod telnet;

use std::sync::mpsc::Receiver;

use crate::error::HostResult;

/// Bound on undelivered host events; a full channel stalls the reader
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// One 3270 record, or a chunk of process output
    Data(Vec<u8>),
    Disconnected,
}

/// Writing side of a host connection
pub trait HostConnection: Send {
    fn write(&mut self, data: &[u8]) -> HostResult<()>;

    /// Close the connection; the reader reports `Disconnected`
    fn close(&mut self);
}

/// A connected host: its writer and its event stream
pub struct Host {
    pub connection: Box<dyn HostConnection>,
    pub events: Receiver<HostEvent>,
}

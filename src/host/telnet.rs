//! Telnet transport for TN3270 hosts
//!
//! Negotiates binary transmission, end of record and terminal type, then
//! splits the stream into records at each IAC EOR. TN3270E and every other
//! option are refused.

use std::collections::HashSet;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use super::{Host, HostConnection, HostEvent, EVENT_CHANNEL_CAPACITY};
use crate::error::{HostError, HostResult};

pub const DEFAULT_PORT: u16 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    Binary = 0,
    TerminalType = 24,
    EndOfRecord = 25,
}

impl TelnetOption {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(TelnetOption::Binary),
            24 => Some(TelnetOption::TerminalType),
            25 => Some(TelnetOption::EndOfRecord),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelnetCommand {
    SE = 240,
    EOR = 239,
    SB = 250,
    WILL = 251,
    WONT = 252,
    DO = 253,
    DONT = 254,
    IAC = 255,
}

const IAC: u8 = TelnetCommand::IAC as u8;
const TERMINAL_TYPE_IS: u8 = 0;
const TERMINAL_TYPE_SEND: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Data,
    Iac,
    /// WILL, WONT, DO or DONT waiting for its option byte
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Output of feeding bytes to the telnet state machine
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelnetOutput {
    pub records: Vec<Vec<u8>>,
    /// Negotiation replies for the host
    pub responses: Vec<u8>,
}

/// Telnet protocol state for one connection
#[derive(Debug)]
pub struct TelnetNegotiator {
    terminal_type: String,
    state: State,
    record: Vec<u8>,
    subnegotiation: Vec<u8>,
    /// Options we agreed to perform
    local: HashSet<u8>,
    /// Options we asked the host to perform
    remote: HashSet<u8>,
}

impl TelnetNegotiator {
    pub fn new(terminal_type: impl Into<String>) -> Self {
        Self {
            terminal_type: terminal_type.into(),
            state: State::Data,
            record: Vec::new(),
            subnegotiation: Vec::new(),
            local: HashSet::new(),
            remote: HashSet::new(),
        }
    }

    /// Whether both directions run binary with end of record
    pub fn is_tn3270_mode(&self) -> bool {
        let required = [TelnetOption::Binary as u8, TelnetOption::EndOfRecord as u8];
        required
            .iter()
            .all(|option| self.local.contains(option) && self.remote.contains(option))
    }

    pub fn feed(&mut self, data: &[u8]) -> TelnetOutput {
        let mut output = TelnetOutput::default();

        for &byte in data {
            self.state = match self.state {
                State::Data if byte == IAC => State::Iac,
                State::Data => {
                    self.record.push(byte);
                    State::Data
                }
                State::Iac => match byte {
                    IAC => {
                        self.record.push(IAC);
                        State::Data
                    }
                    b if b == TelnetCommand::EOR as u8 => {
                        if !self.record.is_empty() {
                            output.records.push(std::mem::take(&mut self.record));
                        }
                        State::Data
                    }
                    b if b == TelnetCommand::SB as u8 => {
                        self.subnegotiation.clear();
                        State::Subnegotiation
                    }
                    b if (TelnetCommand::WILL as u8..=TelnetCommand::DONT as u8).contains(&b) => {
                        State::Option(b)
                    }
                    // NOP, GA and friends
                    _ => State::Data,
                },
                State::Option(command) => {
                    self.negotiate(command, byte, &mut output.responses);
                    State::Data
                }
                State::Subnegotiation if byte == IAC => State::SubnegotiationIac,
                State::Subnegotiation => {
                    self.subnegotiation.push(byte);
                    State::Subnegotiation
                }
                State::SubnegotiationIac => match byte {
                    IAC => {
                        self.subnegotiation.push(IAC);
                        State::Subnegotiation
                    }
                    b if b == TelnetCommand::SE as u8 => {
                        self.handle_subnegotiation(&mut output.responses);
                        State::Data
                    }
                    _ => State::Subnegotiation,
                },
            };
        }
        output
    }

    fn negotiate(&mut self, command: u8, option: u8, responses: &mut Vec<u8>) {
        let supported = TelnetOption::from_u8(option).is_some();
        let reply = |responses: &mut Vec<u8>, command: TelnetCommand| {
            responses.extend_from_slice(&[IAC, command as u8, option]);
        };

        match command {
            c if c == TelnetCommand::DO as u8 => {
                if !supported {
                    debug!("Refusing DO {}", option);
                    reply(responses, TelnetCommand::WONT);
                } else if self.local.insert(option) {
                    reply(responses, TelnetCommand::WILL);
                }
            }
            c if c == TelnetCommand::DONT as u8 => {
                if self.local.remove(&option) {
                    reply(responses, TelnetCommand::WONT);
                }
            }
            c if c == TelnetCommand::WILL as u8 => {
                let wanted = supported && option != TelnetOption::TerminalType as u8;
                if !wanted {
                    debug!("Refusing WILL {}", option);
                    reply(responses, TelnetCommand::DONT);
                } else if self.remote.insert(option) {
                    reply(responses, TelnetCommand::DO);
                }
            }
            _ => {
                if self.remote.remove(&option) {
                    reply(responses, TelnetCommand::DONT);
                }
            }
        }
    }

    fn handle_subnegotiation(&mut self, responses: &mut Vec<u8>) {
        match self.subnegotiation.as_slice() {
            [option, TERMINAL_TYPE_SEND] if *option == TelnetOption::TerminalType as u8 => {
                debug!("Sending terminal type {}", self.terminal_type);
                responses.extend_from_slice(&[
                    IAC,
                    TelnetCommand::SB as u8,
                    TelnetOption::TerminalType as u8,
                    TERMINAL_TYPE_IS,
                ]);
                responses.extend_from_slice(self.terminal_type.as_bytes());
                responses.extend_from_slice(&[IAC, TelnetCommand::SE as u8]);
            }
            other => debug!("Ignoring subnegotiation {:?}", other),
        }
    }
}

/// Escape IAC and terminate with IAC EOR
pub fn encode_record(data: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(data.len() + 2);
    for &byte in data {
        record.push(byte);
        if byte == IAC {
            record.push(IAC);
        }
    }
    record.extend_from_slice(&[IAC, TelnetCommand::EOR as u8]);
    record
}

/// Split `host[:port]`, accepting bracketed IPv6 literals
pub fn parse_address(address: &str) -> HostResult<(String, u16)> {
    let invalid = || HostError::InvalidAddress { address: address.to_string() };

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
        match rest.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if rest.is_empty() => (host, None),
            None => return Err(invalid()),
        }
    } else {
        match address.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            Some(_) => (address, None),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(invalid());
    }
    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid())?,
        None => DEFAULT_PORT,
    };
    Ok((host.to_string(), port))
}

/// Time allowed for the host to agree to binary and end of record
const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound bytes go through a writer thread so a slow host never blocks
/// the caller
struct TelnetConnection {
    outbound: Sender<Vec<u8>>,
    stream: TcpStream,
}

impl HostConnection for TelnetConnection {
    fn write(&mut self, data: &[u8]) -> HostResult<()> {
        self.outbound.send(encode_record(data)).map_err(|_| {
            HostError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "telnet writer stopped"))
        })
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Connect to a TN3270 host
///
/// Returns once the host has agreed to TN3270 mode, binary and end of
/// record in both directions.
pub fn connect(address: &str, terminal_type: &str) -> HostResult<Host> {
    let (host, port) = parse_address(address)?;
    let stream = TcpStream::connect((host.as_str(), port)).map_err(|source| HostError::Connect {
        host: host.clone(),
        port,
        source,
    })?;
    stream.set_nodelay(true)?;
    info!("Connected to {}:{}", host, port);
    open(stream, terminal_type, NEGOTIATION_TIMEOUT)
}

fn open(stream: TcpStream, terminal_type: &str, negotiation_timeout: Duration) -> HostResult<Host> {
    let reader = stream.try_clone()?;
    let writer = stream.try_clone()?;
    let (outbound, outbound_queue) = mpsc::channel();
    let (sender, events) = mpsc::sync_channel(EVENT_CHANNEL_CAPACITY);
    let (ready, negotiated) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("telnet-writer".to_string())
        .spawn(move || send_loop(writer, outbound_queue))?;

    let negotiator = TelnetNegotiator::new(terminal_type);
    let responses = outbound.clone();
    thread::Builder::new()
        .name("telnet-reader".to_string())
        .spawn(move || receive_loop(reader, responses, negotiator, ready, sender))?;

    let failure = match negotiated.recv_timeout(negotiation_timeout) {
        Ok(()) => None,
        Err(RecvTimeoutError::Timeout) => Some("host did not enter TN3270 mode"),
        Err(RecvTimeoutError::Disconnected) => Some("connection closed during negotiation"),
    };
    if let Some(reason) = failure {
        let _ = stream.shutdown(Shutdown::Both);
        return Err(HostError::Negotiation { reason: reason.to_string() });
    }
    info!("TN3270 mode negotiated");

    Ok(Host {
        connection: Box::new(TelnetConnection { outbound, stream }),
        events,
    })
}

fn send_loop(mut stream: TcpStream, outbound: Receiver<Vec<u8>>) {
    for data in outbound {
        if let Err(e) = stream.write_all(&data) {
            warn!("Telnet write failed: {}", e);
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }
    }
    debug!("Telnet writer finished");
}

fn receive_loop(
    mut reader: TcpStream,
    responses: Sender<Vec<u8>>,
    mut negotiator: TelnetNegotiator,
    ready: SyncSender<()>,
    sender: SyncSender<HostEvent>,
) {
    let mut buffer = [0u8; 4096];
    let mut ready = Some(ready);

    loop {
        let count = match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("Telnet connection closed by host");
                break;
            }
            Ok(count) => count,
            Err(e) => {
                warn!("Telnet read error: {}", e);
                break;
            }
        };

        let output = negotiator.feed(&buffer[..count]);
        if !output.responses.is_empty() && responses.send(output.responses).is_err() {
            break;
        }
        if negotiator.is_tn3270_mode() {
            if let Some(ready) = ready.take() {
                let _ = ready.send(());
            }
        }
        for record in output.records {
            if sender.send(HostEvent::Data(record)).is_err() {
                return;
            }
        }
    }

    let _ = sender.send(HostEvent::Disconnected);
}

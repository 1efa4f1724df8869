//! Shared test doubles: a simulated terminal behind the coax interface
//! and an in-memory host.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use coax3174::display::encode_char;
use coax3174::error::{HostResult, LinkError, LinkResult};
use coax3174::host::{Host, HostConnection, HostEvent};
use coax3174::link::command::{self, data_word, word_byte, TT_AR};
use coax3174::link::Interface;

pub const TERMINAL_ID_MODEL_2: u8 = 0x04;

/// Everything the simulated terminal remembers
pub struct TerminalState {
    /// Interface firmware version answered to RESET
    pub firmware: Vec<u8>,
    pub terminal_id: u8,
    pub extended_id: Option<[u8; 4]>,
    pub regen: Vec<u8>,
    pub address_counter: u16,
    pub control_register: u8,
    /// Responses for upcoming POLLs; TT/AR when empty
    pub poll_queue: VecDeque<u16>,
    /// Action bits of every POLL, with its time
    pub polls: Vec<(Instant, u16)>,
    /// Every WRITE_DATA as (start address, bytes)
    pub writes: Vec<(u16, Vec<u8>)>,
    /// After this many POLLs every command times out
    pub fail_after_polls: Option<usize>,
}

/// Terminal simulation implementing the interface contract
#[derive(Clone)]
pub struct MockTerminal {
    state: Arc<Mutex<TerminalState>>,
}

impl MockTerminal {
    pub fn new(terminal_id: u8, rows: usize, cols: usize) -> Self {
        let state = TerminalState {
            firmware: vec![0x01, 0x00],
            terminal_id,
            extended_id: Some([0x00; 4]),
            regen: vec![0; (rows + 1) * cols],
            address_counter: 0,
            control_register: 0,
            poll_queue: VecDeque::new(),
            polls: Vec::new(),
            writes: Vec::new(),
            fail_after_polls: None,
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn model_2() -> Self {
        Self::new(TERMINAL_ID_MODEL_2, 24, 80)
    }

    pub fn state(&self) -> MutexGuard<'_, TerminalState> {
        self.state.lock().unwrap()
    }

    /// Queue key presses by scan code
    pub fn press(&self, scan_codes: &[u8]) {
        let mut state = self.state();
        for &scan_code in scan_codes {
            state.poll_queue.push_back((u16::from(scan_code) << 2) | 0b10);
        }
    }

    pub fn regen_at(&self, address: usize, len: usize) -> Vec<u8> {
        self.state().regen[address..address + len].to_vec()
    }

    /// Whether `text` is displayed anywhere in regen
    pub fn shows(&self, text: &str) -> bool {
        let needle: Vec<u8> = text.chars().map(encode_char).collect();
        self.state().regen.windows(needle.len()).any(|window| window == needle.as_slice())
    }
}

impl TerminalState {
    fn write_byte(&mut self, byte: u8) {
        let len = self.regen.len();
        self.regen[usize::from(self.address_counter) % len] = byte;
        self.address_counter = self.address_counter.wrapping_add(1);
    }

    fn execute(&mut self, words: &[u16]) -> LinkResult<Vec<u16>> {
        let first = *words.first().ok_or(LinkError::Interface { code: 0x01 })?;

        // data words only: a jumbo write continuation
        if first & 1 == 0 {
            let start = self.address_counter;
            let bytes: Vec<u8> = words.iter().map(|&word| word_byte(word)).collect();
            bytes.iter().for_each(|&byte| self.write_byte(byte));
            self.writes.push((start, bytes));
            return Ok(vec![TT_AR]);
        }

        let code = ((first >> 2) & 0x3F) as u8;
        let data: Vec<u8> = words[1..].iter().map(|&word| word_byte(word)).collect();

        match code {
            command::POLL => {
                self.polls.push((Instant::now(), (first >> 8) & 0b11));
                Ok(vec![self.poll_queue.pop_front().unwrap_or(TT_AR)])
            }
            command::POLL_ACK => Ok(vec![TT_AR]),
            command::READ_TERMINAL_ID => Ok(vec![data_word(self.terminal_id)]),
            command::READ_EXTENDED_ID => match self.extended_id {
                Some(id) => Ok(id.iter().map(|&byte| data_word(byte)).collect()),
                None => Err(LinkError::ReceiveTimeout),
            },
            command::LOAD_ADDRESS_COUNTER_HI => {
                self.address_counter = (self.address_counter & 0x00FF) | (u16::from(data[0]) << 8);
                Ok(vec![TT_AR])
            }
            command::LOAD_ADDRESS_COUNTER_LO => {
                self.address_counter = (self.address_counter & 0xFF00) | u16::from(data[0]);
                Ok(vec![TT_AR])
            }
            command::WRITE_DATA => {
                let start = self.address_counter;
                data.iter().for_each(|&byte| self.write_byte(byte));
                self.writes.push((start, data));
                Ok(vec![TT_AR])
            }
            command::LOAD_CONTROL_REGISTER => {
                self.control_register = data[0];
                Ok(vec![TT_AR])
            }
            _ => Err(LinkError::Interface { code: 0x02 }),
        }
    }
}

impl Interface for MockTerminal {
    fn reset(&mut self) -> LinkResult<Vec<u8>> {
        Ok(self.state().firmware.clone())
    }

    fn transmit_receive(
        &mut self,
        words: &[u16],
        _receive_length: usize,
        _timeout: Duration,
    ) -> LinkResult<Vec<u16>> {
        let mut state = self.state();
        if let Some(limit) = state.fail_after_polls {
            if state.polls.len() >= limit {
                return Err(LinkError::ReceiveTimeout);
            }
        }
        state.execute(words)
    }
}

/// Records what the controller sends to the host
#[derive(Clone, Default)]
pub struct HostLog {
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
    pub closed: Arc<AtomicBool>,
}

impl HostLog {
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn all_bytes(&self) -> Vec<u8> {
        self.written().concat()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockConnection {
    log: HostLog,
}

impl HostConnection for MockConnection {
    fn write(&mut self, data: &[u8]) -> HostResult<()> {
        self.log.written.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

/// Host whose output is fed through the returned sender
pub fn mock_host() -> (Host, SyncSender<HostEvent>, HostLog) {
    let (sender, events) = mpsc::sync_channel(64);
    let log = HostLog::default();
    let host = Host {
        connection: Box::new(MockConnection { log: log.clone() }),
        events,
    };
    (host, sender, log)
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

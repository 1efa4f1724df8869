//! VT100 byte stream tokenizer
//!
//! Splits a host byte stream into printable characters, control
//! characters and complete escape sequences. State survives between
//! calls, so a sequence split across two reads is still recognized.

/// Parameters kept per CSI sequence; extras are dropped
const MAX_PARAMS: usize = 16;

const ESC: u8 = 0x1B;
const CAN: u8 = 0x18;
const SUB: u8 = 0x1A;
const BEL: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiParameter,
    CsiIgnore,
    OscString,
}

/// A recognized piece of the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Print(char),
    Execute(u8),
    /// `ESC` [intermediate] final
    Escape { intermediate: Option<u8>, final_byte: u8 },
    /// `ESC [` [?] params final
    Csi { private: bool, params: Vec<u16>, final_byte: u8 },
}

#[derive(Debug, Clone)]
pub struct Parser {
    state: State,
    intermediate: Option<u8>,
    private: bool,
    params: Vec<u16>,
    current: Option<u16>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            intermediate: None,
            private: false,
            params: Vec::new(),
            current: None,
        }
    }

    fn reset_sequence(&mut self) {
        self.intermediate = None;
        self.private = false;
        self.params.clear();
        self.current = None;
    }

    fn finish_param(&mut self) {
        if self.params.len() < MAX_PARAMS {
            self.params.push(self.current.unwrap_or(0));
        }
        self.current = None;
    }

    /// Feed one byte, returning the action it completes
    pub fn advance(&mut self, byte: u8) -> Option<Action> {
        // ESC, CAN and SUB interrupt any sequence in progress
        match byte {
            ESC => {
                self.reset_sequence();
                self.state = State::Escape;
                return None;
            }
            CAN | SUB if self.state != State::Ground => {
                self.state = State::Ground;
                return None;
            }
            _ => {}
        }

        match self.state {
            State::Ground => Self::ground(byte),
            State::Escape => match byte {
                b'[' => {
                    self.state = State::CsiParameter;
                    None
                }
                b']' => {
                    self.state = State::OscString;
                    None
                }
                0x20..=0x2F => {
                    self.intermediate = Some(byte);
                    self.state = State::EscapeIntermediate;
                    None
                }
                0x30..=0x7E => {
                    self.state = State::Ground;
                    Some(Action::Escape { intermediate: None, final_byte: byte })
                }
                0x00..=0x1F => Some(Action::Execute(byte)),
                _ => {
                    self.state = State::Ground;
                    None
                }
            },
            State::EscapeIntermediate => match byte {
                0x20..=0x2F => None,
                0x30..=0x7E => {
                    self.state = State::Ground;
                    Some(Action::Escape { intermediate: self.intermediate, final_byte: byte })
                }
                0x00..=0x1F => Some(Action::Execute(byte)),
                _ => {
                    self.state = State::Ground;
                    None
                }
            },
            State::CsiParameter => match byte {
                b'0'..=b'9' => {
                    let digit = u16::from(byte - b'0');
                    self.current = Some(self.current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
                    None
                }
                b';' => {
                    self.finish_param();
                    None
                }
                b'?' if self.params.is_empty() && self.current.is_none() => {
                    self.private = true;
                    None
                }
                0x40..=0x7E => {
                    if self.current.is_some() || !self.params.is_empty() {
                        self.finish_param();
                    }
                    self.state = State::Ground;
                    Some(Action::Csi {
                        private: self.private,
                        params: std::mem::take(&mut self.params),
                        final_byte: byte,
                    })
                }
                0x00..=0x1F => Some(Action::Execute(byte)),
                _ => {
                    self.state = State::CsiIgnore;
                    None
                }
            },
            State::CsiIgnore => match byte {
                0x40..=0x7E => {
                    self.state = State::Ground;
                    None
                }
                0x00..=0x1F => Some(Action::Execute(byte)),
                _ => None,
            },
            State::OscString => {
                if byte == BEL {
                    self.state = State::Ground;
                }
                None
            }
        }
    }

    fn ground(byte: u8) -> Option<Action> {
        match byte {
            0x00..=0x1F => Some(Action::Execute(byte)),
            0x20..=0x7E => Some(Action::Print(char::from(byte))),
            0x7F..=0x9F => None,
            // Latin-1 graphics
            _ => Some(Action::Print(char::from(byte))),
        }
    }
}

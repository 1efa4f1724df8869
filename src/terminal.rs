//! Terminal identification
//!
//! A CUT terminal reports a one byte terminal id giving its model and
//! keyboard type. Some terminals also answer READ_EXTENDED_ID, which is
//! used to tell the 3483 keyboard apart.

use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::{LinkError, LinkResult};
use crate::keyboard::{keymap_3278, keymap_3483, Keymap};
use crate::link::{DeviceLink, Interface};

const EXTENDED_ID_ATTEMPTS: usize = 3;
const EXTENDED_ID_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Extended ids of terminals shipped with the 3483 keyboard
const KEYMAP_3483_IDS: &[&str] = &["c1348300", "c1347200"];

/// Display size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub rows: usize,
    pub cols: usize,
}

impl Dimensions {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn size(&self) -> usize {
        self.rows * self.cols
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Decoded terminal id byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalId {
    pub model: u8,
    pub keyboard: u8,
}

impl TerminalId {
    pub fn parse(id: u8) -> LinkResult<Self> {
        if id & 0x01 != 0 {
            return Err(LinkError::UnsupportedTerminal {
                reason: format!("terminal id 0x{:02x} is not a CUT terminal", id),
            });
        }
        let model = match (id & 0x0E) >> 1 {
            0b010 => 2,
            0b011 => 3,
            0b111 => 4,
            0b110 => 5,
            bits => {
                return Err(LinkError::UnsupportedTerminal {
                    reason: format!("unknown model bits 0b{:03b}", bits),
                })
            }
        };
        Ok(Self { model, keyboard: (id & 0xF0) >> 4 })
    }

    pub fn dimensions(&self) -> Dimensions {
        match self.model {
            3 => Dimensions::new(32, 80),
            4 => Dimensions::new(43, 80),
            5 => Dimensions::new(27, 132),
            _ => Dimensions::new(24, 80),
        }
    }
}

/// Everything learned about the attached terminal at session start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalIdentity {
    pub id: TerminalId,
    pub extended_id: Option<String>,
    pub dimensions: Dimensions,
}

impl TerminalIdentity {
    pub fn new(id: TerminalId, extended_id: Option<String>) -> Self {
        Self { dimensions: id.dimensions(), id, extended_id }
    }

    pub fn model(&self) -> u8 {
        self.id.model
    }

    pub fn keymap(&self) -> &'static Keymap {
        match self.extended_id.as_deref() {
            Some(extended_id) if KEYMAP_3483_IDS.contains(&extended_id) => &keymap_3483::KEYMAP,
            _ => &keymap_3278::KEYMAP,
        }
    }

    /// Terminal type announced to a TN3270 host
    pub fn terminal_type(&self) -> String {
        format!("IBM-3278-{}-E", self.id.model)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Read the terminal id and extended id
///
/// The extended id is optional; terminals that never answer it still
/// identify successfully.
pub fn identify<I: Interface>(link: &mut DeviceLink<I>) -> LinkResult<TerminalIdentity> {
    let id = TerminalId::parse(link.read_terminal_id()?)?;

    let mut extended_id = None;
    for attempt in 0..EXTENDED_ID_ATTEMPTS {
        if attempt > 0 {
            thread::sleep(EXTENDED_ID_RETRY_DELAY);
        }
        match link.read_extended_id() {
            Ok(bytes) => {
                extended_id = Some(hex(&bytes));
                break;
            }
            Err(e) => debug!("READ_EXTENDED_ID attempt {} failed: {}", attempt + 1, e),
        }
    }

    let identity = TerminalIdentity::new(id, extended_id);
    info!(
        "Identified model {} terminal ({}), keyboard {}, extended id {}",
        identity.model(),
        identity.dimensions,
        identity.id.keyboard,
        identity.extended_id.as_deref().unwrap_or("none")
    );
    Ok(identity)
}

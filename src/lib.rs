//! coax3174: a 3174 establishment controller replacement
//!
//! Drives an IBM 3270 CUT terminal attached through a serial coax
//! interface, connecting it to a TN3270 host or to a local process
//! through VT100 emulation.

pub mod config;
pub mod controller;
pub mod display;
pub mod ebcdic;
pub mod error;
pub mod field;
pub mod host;
pub mod keyboard;
pub mod link;
pub mod screen;
pub mod terminal;
pub mod tn3270;
pub mod vt100;

pub use config::ControllerConfig;
pub use controller::{ActiveCodec, Controller, HostSpec, SessionState};
pub use error::{ControllerError, LinkError};
pub use screen::{ScreenBuffer, ScreenOp};

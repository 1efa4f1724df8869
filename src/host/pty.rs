//! Local process host on a pseudo-terminal
//!
//! The process sees a VT100 sized to the attached terminal. Its output is
//! forwarded unchanged; EOF on the pty ends the session.

use std::io::{Read, Write};
use std::sync::mpsc::{self, SyncSender};
use std::thread;

use log::{debug, info, warn};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use super::{Host, HostConnection, HostEvent, EVENT_CHANNEL_CAPACITY};
use crate::error::{HostError, HostResult};
use crate::terminal::Dimensions;

struct PtyConnection {
    /// Held so the pty stays open for the child
    _master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send>,
    writer: Box<dyn Write + Send>,
}

impl HostConnection for PtyConnection {
    fn write(&mut self, data: &[u8]) -> HostResult<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn close(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => debug!("Host process already exited: {:?}", status),
            _ => {
                if let Err(e) = self.child.kill() {
                    warn!("Unable to kill host process: {}", e);
                }
            }
        }
    }
}

fn spawn_error(error: impl std::fmt::Display) -> HostError {
    HostError::Spawn { reason: error.to_string() }
}

/// Spawn `command` with `args` on a pty of the given size
pub fn spawn(command: &str, args: &[String], dimensions: Dimensions) -> HostResult<Host> {
    let pty_system = native_pty_system();
    let size = PtySize {
        rows: dimensions.rows as u16,
        cols: dimensions.cols as u16,
        pixel_width: 0,
        pixel_height: 0,
    };
    let pair = pty_system.openpty(size).map_err(spawn_error)?;

    let mut builder = CommandBuilder::new(command);
    builder.args(args);
    builder.env("TERM", "vt100");
    builder.env("LC_ALL", "C");

    let child = pair.slave.spawn_command(builder).map_err(spawn_error)?;
    // the child holds its own copy of the slave
    drop(pair.slave);

    let reader = pair.master.try_clone_reader().map_err(spawn_error)?;
    let writer = pair.master.take_writer().map_err(spawn_error)?;
    let (sender, events) = mpsc::sync_channel(EVENT_CHANNEL_CAPACITY);

    thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || receive_loop(reader, sender))?;

    info!("Spawned {} on a {} pty", command, dimensions);
    Ok(Host {
        connection: Box::new(PtyConnection { _master: pair.master, child, writer }),
        events,
    })
}

fn receive_loop(mut reader: Box<dyn Read + Send>, sender: SyncSender<HostEvent>) {
    let mut buffer = [0u8; 4096];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("Host process output closed");
                break;
            }
            Ok(count) => {
                if sender.send(HostEvent::Data(buffer[..count].to_vec())).is_err() {
                    return;
                }
            }
            // EIO once the child exits on Linux
            Err(e) => {
                debug!("Host process read ended: {}", e);
                break;
            }
        }
    }

    let _ = sender.send(HostEvent::Disconnected);
}

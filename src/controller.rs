//! Session controller for one attached terminal
//!
//! The controller identifies the terminal, opens the host, then runs a
//! single loop that alternates between polling the terminal on a fixed
//! cadence and applying host output. Host output arrives on a channel from
//! a reader thread; the wait for it is bounded by the next poll deadline,
//! and a due poll always runs before more host data is taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::config::{ControllerConfig, ENV_JUMBO};
use crate::display::Display;
use crate::error::{ControllerError, ControllerResult, HostError, HostResult, LinkError, ProtocolViolation};
use crate::host::{self, Host, HostEvent};
use crate::keyboard::{Key, Keyboard, Modifiers};
use crate::link::interface::is_legacy_firmware;
use crate::link::{DeviceLink, Interface, PollAction, PollResult};
use crate::screen::{ScreenBuffer, ScreenOp};
use crate::terminal::{self, Dimensions, TerminalIdentity};
use crate::tn3270::Tn3270Codec;
use crate::vt100::Vt100Codec;

/// Lifecycle of a controller session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Identifying,
    Active,
    Draining,
    Closed,
}

/// Host protocol of a session, chosen once when the session starts
#[derive(Debug, Clone)]
pub enum ActiveCodec {
    Tn3270(Tn3270Codec),
    Vt100(Vt100Codec),
}

impl ActiveCodec {
    pub fn name(&self) -> &'static str {
        match self {
            ActiveCodec::Tn3270(_) => "TN3270",
            ActiveCodec::Vt100(_) => "VT100",
        }
    }
}

/// Where the session's host lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSpec {
    Tn3270 { address: String },
    Vt100 { command: String, args: Vec<String> },
}

impl HostSpec {
    pub fn codec(&self, dimensions: Dimensions) -> ActiveCodec {
        match self {
            HostSpec::Tn3270 { .. } => ActiveCodec::Tn3270(Tn3270Codec::new()),
            HostSpec::Vt100 { .. } => ActiveCodec::Vt100(Vt100Codec::new(dimensions.rows, dimensions.cols)),
        }
    }

    pub fn open(&self, identity: &TerminalIdentity) -> HostResult<Host> {
        match self {
            HostSpec::Tn3270 { address } => host::telnet::connect(address, &identity.terminal_type()),
            HostSpec::Vt100 { command, args } => host::pty::spawn(command, args, identity.dimensions),
        }
    }
}

/// Why a session is draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainReason {
    HostDisconnected,
    Shutdown,
}

impl DrainReason {
    fn message(self) -> &'static str {
        match self {
            DrainReason::HostDisconnected => "HOST DISCONNECTED",
            DrainReason::Shutdown => "CONTROLLER STOPPED",
        }
    }
}

/// What interrupted normal processing of a poll or host event
enum Interrupt {
    /// Counted against the retry budget
    Link(LinkError),
    /// The host cannot be written to any more
    Host(HostError),
    Fatal(ControllerError),
}

impl From<LinkError> for Interrupt {
    fn from(error: LinkError) -> Self {
        Interrupt::Link(error)
    }
}

impl From<HostError> for Interrupt {
    fn from(error: HostError) -> Self {
        Interrupt::Host(error)
    }
}

type Step = Result<(), Interrupt>;

fn apply_ops(buffer: &mut ScreenBuffer, ops: &[ScreenOp]) -> Step {
    buffer
        .apply_all(ops)
        .map_err(|e| Interrupt::Fatal(ControllerError::Screen(e)))
}

/// Everything bound to one identified terminal
pub struct Session {
    pub identity: TerminalIdentity,
    pub buffer: ScreenBuffer,
    pub codec: ActiveCodec,
    display: Display,
    keyboard: Keyboard,
    host: Host,
    alarm: bool,
    /// Clicker state last sent with a POLL
    polled_clicker: bool,
}

impl Session {
    fn new(identity: TerminalIdentity, codec: ActiveCodec, host: Host) -> Self {
        let dimensions = identity.dimensions;
        let keyboard = Keyboard::new(identity.keymap());
        Self {
            buffer: ScreenBuffer::new(dimensions.rows, dimensions.cols),
            display: Display::new(dimensions),
            keyboard,
            codec,
            host,
            identity,
            alarm: false,
            polled_clicker: false,
        }
    }

    /// Action for the next POLL: the alarm wins over clicker changes
    fn poll_action(&self) -> PollAction {
        if self.alarm {
            PollAction::Alarm
        } else if self.keyboard.clicker != self.polled_clicker {
            if self.keyboard.clicker {
                PollAction::EnableKeyboardClicker
            } else {
                PollAction::DisableKeyboardClicker
            }
        } else {
            PollAction::None
        }
    }

    fn poll_action_sent(&mut self, action: PollAction) {
        match action {
            PollAction::Alarm => self.alarm = false,
            PollAction::EnableKeyboardClicker | PollAction::DisableKeyboardClicker => {
                self.polled_clicker = self.keyboard.clicker
            }
            PollAction::None => {}
        }
    }

    fn refresh_status(&mut self) {
        match &self.codec {
            ActiveCodec::Tn3270(codec) => {
                self.display.show_status(codec.status());
                self.display.show_insert(codec.insert_mode());
            }
            ActiveCodec::Vt100(_) => self.display.show_mode("VT100"),
        }
        self.display.show_shift(self.keyboard.modifiers().is_shift());
    }
}

/// Terminal controller driving one device link
pub struct Controller<I> {
    link: DeviceLink<I>,
    config: ControllerConfig,
    shutdown: Arc<AtomicBool>,
    state: SessionState,
    link_errors: usize,
}

impl<I: Interface> Controller<I> {
    pub fn new(link: DeviceLink<I>, config: ControllerConfig) -> Self {
        Self {
            link,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: SessionState::Identifying,
            link_errors: 0,
        }
    }

    /// Flag that ends the session at the next loop boundary
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Give back the device link once the controller is done
    pub fn into_link(self) -> DeviceLink<I> {
        self.link
    }

    fn transition(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Run a session against `spec` until it closes
    pub fn run(&mut self, spec: &HostSpec) -> ControllerResult<()> {
        self.run_with(|identity| Ok((spec.codec(identity.dimensions), spec.open(identity)?)))
    }

    /// Run a session whose codec and host come from `open_host`
    pub fn run_with<F>(&mut self, open_host: F) -> ControllerResult<()>
    where
        F: FnOnce(&TerminalIdentity) -> HostResult<(ActiveCodec, Host)>,
    {
        self.transition(SessionState::Identifying);
        let mut session = match self.start(open_host) {
            Ok(session) => session,
            Err(e) => {
                self.transition(SessionState::Closed);
                return Err(e);
            }
        };

        self.transition(SessionState::Active);
        let result = self.run_active(&mut session);

        match result {
            Ok(reason) => {
                self.transition(SessionState::Draining);
                self.drain(&mut session, reason);
            }
            Err(_) => session.host.connection.close(),
        }

        self.transition(SessionState::Closed);
        result.map(|_| ())
    }

    fn start<F>(&mut self, open_host: F) -> ControllerResult<Session>
    where
        F: FnOnce(&TerminalIdentity) -> HostResult<(ActiveCodec, Host)>,
    {
        let firmware = self.link.reset().map_err(ControllerError::Identification)?;
        debug!("Interface firmware {:02x?}", firmware);
        let legacy_firmware = is_legacy_firmware(&firmware);
        let jumbo_write_max_length = self.config.jumbo_write_max_length_for(legacy_firmware);
        if let (true, Some(length)) = (legacy_firmware, jumbo_write_max_length) {
            warn!(
                "Legacy interface firmware {:?}, splitting writes over {} words; set {}=ignore to disable",
                firmware, length, ENV_JUMBO
            );
        }
        self.link.set_jumbo_write_max_length(jumbo_write_max_length);

        let identity = terminal::identify(&mut self.link).map_err(ControllerError::Identification)?;
        let (codec, host) = open_host(&identity)?;
        info!(
            "Starting {} session on {} terminal with {} keymap",
            codec.name(),
            identity.dimensions,
            identity.keymap().name
        );

        let mut session = Session::new(identity, codec, host);
        self.redraw(&mut session).map_err(ControllerError::FatalLink)?;
        Ok(session)
    }

    /// Null regen and repaint everything
    fn redraw(&mut self, session: &mut Session) -> Result<(), LinkError> {
        session.display.clear(&mut self.link)?;
        session.refresh_status();
        session.display.render(&session.buffer);
        session.display.flush(&mut self.link, session.buffer.cursor())?;
        Ok(())
    }

    /// Returns the drain reason, or the error that closed the session
    fn run_active(&mut self, session: &mut Session) -> ControllerResult<DrainReason> {
        let poll_period = self.config.poll_period();
        let mut next_poll = Instant::now();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(DrainReason::Shutdown);
            }

            let now = Instant::now();
            let step = if now >= next_poll {
                next_poll = now + poll_period;
                self.poll_cycle(session)
            } else {
                match session.host.events.recv_timeout(next_poll - now) {
                    Ok(HostEvent::Data(data)) => self.handle_host_data(session, &data),
                    Ok(HostEvent::Disconnected) | Err(RecvTimeoutError::Disconnected) => {
                        info!("Host disconnected");
                        return Ok(DrainReason::HostDisconnected);
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                }
            };

            match step {
                Ok(()) => self.link_errors = 0,
                Err(Interrupt::Link(e)) => {
                    self.link_errors += 1;
                    warn!(
                        "Link error {} of {}: {}",
                        self.link_errors, self.config.max_poll_retries, e
                    );
                    if self.link_errors >= self.config.max_poll_retries {
                        error!("Giving up on the terminal");
                        return Err(ControllerError::FatalLink(e));
                    }
                }
                Err(Interrupt::Host(e)) => {
                    warn!("Host write failed: {}", e);
                    return Ok(DrainReason::HostDisconnected);
                }
                Err(Interrupt::Fatal(e)) => {
                    error!("Closing session: {}", e);
                    return Err(e);
                }
            }
        }
    }

    fn poll_cycle(&mut self, session: &mut Session) -> Step {
        for _ in 0..self.config.poll_depth {
            let action = session.poll_action();
            let result = self.link.poll(action)?;
            session.poll_action_sent(action);

            match result {
                PollResult::NoData => break,
                PollResult::KeyboardData(scan_code) => self.handle_scan_code(session, scan_code)?,
                PollResult::TerminalIdData(id) => {
                    info!("Terminal reset (id 0x{:02x}), redrawing", id);
                    self.redraw(session)?;
                }
                PollResult::StatusChange(flags) => debug!("Terminal status 0x{:03x}", flags),
            }
        }
        Ok(())
    }

    fn handle_scan_code(&mut self, session: &mut Session, scan_code: u8) -> Step {
        let event = session.keyboard.get_key(scan_code);
        debug!(
            "Keystroke: scan code {}, key {:?}, modifiers {:?}",
            scan_code, event.key, event.modifiers
        );

        if let Some(key) = event.key {
            match key {
                Key::CursorBlink => session.display.toggle_cursor_blink(&mut self.link)?,
                Key::AltCursor => session.display.toggle_cursor_reverse(&mut self.link)?,
                Key::Clicker => session.keyboard.toggle_clicker(),
                _ => self.handle_key(session, key, event.modifiers)?,
            }
        }

        self.update_display(session)
    }

    fn handle_key(&mut self, session: &mut Session, key: Key, modifiers: Modifiers) -> Step {
        match &mut session.codec {
            ActiveCodec::Tn3270(codec) => match codec.encode_key(key, &session.buffer) {
                Ok(output) => {
                    apply_ops(&mut session.buffer, &output.ops)?;
                    if !output.host_bytes.is_empty() {
                        session.host.connection.write(&output.host_bytes)?;
                    }
                }
                Err(e) => {
                    debug!("Operator error: {}", e);
                    session.alarm = true;
                }
            },
            ActiveCodec::Vt100(codec) => {
                if let Some(bytes) = codec.encode_key(key, modifiers) {
                    session.host.connection.write(&bytes)?;
                }
            }
        }
        Ok(())
    }

    fn handle_host_data(&mut self, session: &mut Session, data: &[u8]) -> Step {
        match &mut session.codec {
            ActiveCodec::Tn3270(codec) => match codec.decode(data, &session.buffer) {
                Ok(output) => {
                    session.alarm |= output.alarm;
                    apply_ops(&mut session.buffer, &output.ops)?;
                    if let Some(reply) = output.reply {
                        session.host.connection.write(&reply)?;
                    }
                }
                Err(violation) => return self.protocol_violation(violation),
            },
            ActiveCodec::Vt100(codec) => {
                let output = codec.decode(data);
                session.alarm |= output.bell;
                apply_ops(&mut session.buffer, &output.ops)?;
                if !output.reply.is_empty() {
                    session.host.connection.write(&output.reply)?;
                }
            }
        }

        self.update_display(session)
    }

    fn protocol_violation(&mut self, violation: ProtocolViolation) -> Step {
        if violation.recoverable {
            warn!("Skipping host record: {}", violation);
            Ok(())
        } else {
            Err(Interrupt::Fatal(ControllerError::Protocol(violation)))
        }
    }

    fn update_display(&mut self, session: &mut Session) -> Step {
        session.refresh_status();
        session.display.render(&session.buffer);
        session.display.flush(&mut self.link, session.buffer.cursor())?;
        Ok(())
    }

    fn drain(&mut self, session: &mut Session, reason: DrainReason) {
        session.host.connection.close();

        session.buffer.clear();
        for (address, ch) in reason.message().chars().enumerate() {
            if session.buffer.write_cell(address, ch, None).is_err() {
                break;
            }
        }
        if let ActiveCodec::Tn3270(codec) = &mut session.codec {
            *codec = Tn3270Codec::new();
        }
        session.refresh_status();
        session.display.render(&session.buffer);
        if let Err(e) = session.display.flush(&mut self.link, 0) {
            warn!("Unable to show drain message: {}", e);
        }
    }
}

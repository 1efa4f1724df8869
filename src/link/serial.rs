//! Serial transport to the coax interface

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use super::frame::{encode_frame, FrameDecoder};
use super::interface::{decode_response, decode_words, encode_transmit_receive, Interface, REQUEST_RESET};
use crate::error::{LinkError, LinkResult};

/// Extra time allowed for the interface beyond the coax receive timeout
const RESPONSE_GRACE: Duration = Duration::from_secs(1);
/// The interface may restart its microcontroller on reset
const RESET_TIMEOUT: Duration = Duration::from_secs(5);

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Coax interface reached over a byte stream
pub struct SerialInterface<P> {
    port: P,
    decoder: FrameDecoder,
    /// A response may still be in flight after a timeout
    desynchronized: bool,
}

impl<P: Read + Write + Send> SerialInterface<P> {
    pub fn new(port: P) -> Self {
        Self { port, decoder: FrameDecoder::new(), desynchronized: false }
    }

    fn execute(&mut self, message: &[u8], timeout: Duration) -> LinkResult<Vec<u8>> {
        if self.desynchronized {
            self.discard_pending()?;
        }
        self.port.write_all(&encode_frame(message))?;
        self.port.flush()?;
        self.read_frame(timeout)
    }

    /// Drop buffered input so a late response cannot answer the next request
    fn discard_pending(&mut self) -> LinkResult<()> {
        let mut buffer = [0u8; 256];
        let mut discarded = 0;

        loop {
            match self.port.read(&mut buffer) {
                Ok(0) => break,
                Ok(count) => discarded += count,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if is_transient(&e) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if discarded > 0 {
            warn!("Discarded {} stale bytes from the interface", discarded);
        }
        self.decoder = FrameDecoder::new();
        self.desynchronized = false;
        Ok(())
    }

    fn read_frame(&mut self, timeout: Duration) -> LinkResult<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut buffer = [0u8; 256];

        loop {
            let count = match self.port.read(&mut buffer) {
                Ok(count) => count,
                Err(e) if is_transient(&e) => 0,
                Err(e) => return Err(e.into()),
            };

            for &byte in &buffer[..count] {
                if let Some(frame) = self.decoder.push(byte) {
                    return frame;
                }
            }

            if Instant::now() >= deadline {
                self.desynchronized = true;
                return Err(LinkError::InterfaceTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        }
    }
}

impl<P: Read + Write + Send> Interface for SerialInterface<P> {
    fn reset(&mut self) -> LinkResult<Vec<u8>> {
        // discard anything left over from a previous session
        self.discard_pending()?;
        let response = self.execute(&[REQUEST_RESET], RESET_TIMEOUT)?;
        let version = decode_response(&response)?.to_vec();
        debug!("Interface reset, firmware {:02x?}", version);
        Ok(version)
    }

    fn transmit_receive(
        &mut self,
        words: &[u16],
        receive_length: usize,
        timeout: Duration,
    ) -> LinkResult<Vec<u16>> {
        trace!("TX {:03x?}", words);
        let message = encode_transmit_receive(words, receive_length, timeout);
        let response = self.execute(&message, timeout + RESPONSE_GRACE)?;
        let received = decode_words(decode_response(&response)?)?;
        trace!("RX {:03x?}", received);
        Ok(received)
    }
}

fn baud_constant(baud_rate: u32) -> LinkResult<libc::speed_t> {
    let speed = match baud_rate {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => {
            return Err(LinkError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {}", baud_rate),
            )))
        }
    };
    Ok(speed)
}

/// Open a serial device in raw 8N1 mode
///
/// Reads return after 100ms without data so the frame reader can check
/// its deadline.
pub fn open_serial(path: &Path, baud_rate: u32) -> LinkResult<SerialInterface<File>> {
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;

    let speed = baud_constant(baud_rate)?;
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)?;
    let fd = file.as_raw_fd();

    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
    let ret = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if ret != 0 {
        return Err(io::Error::last_os_error().into());
    }
    let mut termios = unsafe { termios.assume_init() };

    unsafe {
        libc::cfmakeraw(&mut termios);
        libc::cfsetispeed(&mut termios, speed);
        libc::cfsetospeed(&mut termios, speed);
    }
    termios.c_cflag |= libc::CLOCAL | libc::CREAD;
    termios.c_cflag &= !(libc::CSTOPB | libc::PARENB);
    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = 1;

    let ret = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if ret != 0 {
        return Err(io::Error::last_os_error().into());
    }
    unsafe {
        libc::tcflush(fd, libc::TCIOFLUSH);
    }

    debug!("Opened {} at {} baud", path.display(), baud_rate);
    Ok(SerialInterface::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Port that answers every request with a canned frame
    struct ScriptedPort {
        responses: VecDeque<Vec<u8>>,
        pending: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl ScriptedPort {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                pending: VecDeque::new(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut count = 0;
            while count < buf.len() {
                match self.pending.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            Ok(count)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some(response) = self.responses.pop_front() {
                self.pending.extend(encode_frame(&response));
            }
            Ok(())
        }
    }

    #[test]
    fn test_reset_returns_firmware_version() {
        let port = ScriptedPort::new(vec![vec![0x01, 0x02, 0x03]]);
        let mut interface = SerialInterface::new(port);
        assert_eq!(interface.reset().unwrap(), vec![0x02, 0x03]);
        assert_eq!(interface.port.written, encode_frame(&[0x01]));
    }

    #[test]
    fn test_transmit_receive() {
        let port = ScriptedPort::new(vec![vec![0x01, 0x02, 0x00]]);
        let mut interface = SerialInterface::new(port);
        let words = interface
            .transmit_receive(&[0x005], 1, Duration::from_millis(100))
            .unwrap();
        assert_eq!(words, vec![0x002]);
    }

    #[test]
    fn test_receive_timeout_is_reported() {
        let port = ScriptedPort::new(vec![vec![0x02, 0x65]]);
        let mut interface = SerialInterface::new(port);
        let result = interface.transmit_receive(&[0x005], 1, Duration::from_millis(100));
        assert!(matches!(result, Err(LinkError::ReceiveTimeout)));
    }

    #[test]
    fn test_silent_interface_times_out() {
        let port = ScriptedPort::new(vec![]);
        let mut interface = SerialInterface::new(port);
        let result = interface.execute(&[0x01], Duration::from_millis(10));
        assert!(matches!(result, Err(LinkError::InterfaceTimeout { .. })));
    }

    /// Port whose first response arrives after a delay
    struct SlowPort {
        delays: VecDeque<(Duration, Vec<u8>)>,
        arriving: Vec<(Instant, Vec<u8>)>,
        pending: VecDeque<u8>,
    }

    impl SlowPort {
        fn new(delays: Vec<(Duration, Vec<u8>)>) -> Self {
            Self { delays: delays.into_iter().collect(), arriving: Vec::new(), pending: VecDeque::new() }
        }
    }

    impl Read for SlowPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let now = Instant::now();
            let (arrived, waiting): (Vec<_>, Vec<_>) =
                self.arriving.drain(..).partition(|(at, _)| *at <= now);
            self.arriving = waiting;
            for (_, frame) in arrived {
                self.pending.extend(frame);
            }

            let count = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
                *slot = byte;
            }
            Ok(count)
        }
    }

    impl Write for SlowPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some((delay, response)) = self.delays.pop_front() {
                self.arriving.push((Instant::now() + delay, encode_frame(&response)));
            }
            Ok(())
        }
    }

    #[test]
    fn test_late_response_is_not_paired_with_next_request() {
        // a keystroke answering the first POLL arrives after its deadline
        let keystroke = vec![0x01, 0xDA, 0x00];
        let tt_ar = vec![0x01, 0x02, 0x00];
        let port = SlowPort::new(vec![
            (Duration::from_millis(20), keystroke),
            (Duration::ZERO, tt_ar),
        ]);
        let mut interface = SerialInterface::new(port);

        let poll = encode_transmit_receive(&[0x005], 1, Duration::from_millis(5));
        let result = interface.execute(&poll, Duration::from_millis(5));
        assert!(matches!(result, Err(LinkError::InterfaceTimeout { .. })));

        std::thread::sleep(Duration::from_millis(40));
        let words = interface
            .transmit_receive(&[0x045], 1, Duration::from_millis(100))
            .unwrap();
        assert_eq!(words, vec![0b10]);
        assert!(interface.port.pending.is_empty());
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut port = ScriptedPort::new(vec![vec![0x01]]);
        // half of a frame from before the reset
        port.pending.extend(&encode_frame(&[0x01, 0x02, 0x00])[..3]);
        let mut interface = SerialInterface::new(port);
        assert_eq!(interface.reset().unwrap(), Vec::<u8>::new());
    }
}

//! VT100 emulation over the screen buffer
//!
//! Host process output is tokenized by [`parser::Parser`] and applied to a
//! cursor model of the screen, producing [`ScreenOp`]s. Keys are sent to
//! the process as they are typed; there is no field buffering.

pub mod keys;
pub mod parser;

use log::debug;

use crate::keyboard::{Key, Modifiers};
use crate::screen::ScreenOp;
use parser::{Action, Parser};

const TAB_STOP: usize = 8;

/// Result of decoding a chunk of process output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vt100Output {
    pub ops: Vec<ScreenOp>,
    /// Answers to device status and attribute queries
    pub reply: Vec<u8>,
    pub bell: bool,
}

/// Per-session VT100 state
#[derive(Debug, Clone)]
pub struct Vt100Codec {
    rows: usize,
    cols: usize,
    parser: Parser,
    row: usize,
    col: usize,
    /// Set after writing the last column; the next character wraps
    pending_wrap: bool,
    saved: (usize, usize),
    intensified: bool,
}

impl Vt100Codec {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            parser: Parser::new(),
            row: 0,
            col: 0,
            pending_wrap: false,
            saved: (0, 0),
            intensified: false,
        }
    }

    /// Cursor as (row, column)
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    fn address(&self) -> usize {
        self.row * self.cols + self.col
    }

    /// Decode process output
    ///
    /// Unrecognized sequences are consumed without effect.
    pub fn decode(&mut self, data: &[u8]) -> Vt100Output {
        let mut output = Vt100Output::default();
        let start = self.cursor();

        for &byte in data {
            match self.parser.advance(byte) {
                Some(Action::Print(ch)) => self.print(ch, &mut output),
                Some(Action::Execute(byte)) => self.execute(byte, &mut output),
                Some(Action::Escape { intermediate, final_byte }) => {
                    self.escape(intermediate, final_byte, &mut output)
                }
                Some(Action::Csi { private, params, final_byte }) => {
                    self.csi(private, &params, final_byte, &mut output)
                }
                None => {}
            }
        }

        if !output.ops.is_empty() || self.cursor() != start {
            output.ops.push(ScreenOp::MoveCursor(self.address()));
        }
        output
    }

    /// Bytes for a key press, `None` when the key sends nothing
    pub fn encode_key(&self, key: Key, modifiers: Modifiers) -> Option<Vec<u8>> {
        keys::encode_key(key, modifiers)
    }

    fn print(&mut self, ch: char, output: &mut Vt100Output) {
        if self.pending_wrap {
            self.col = 0;
            self.line_feed(output);
        }
        output.ops.push(ScreenOp::WriteChar {
            address: self.address(),
            ch,
            intensified: self.intensified,
        });
        if self.col + 1 < self.cols {
            self.col += 1;
        } else {
            self.pending_wrap = true;
        }
    }

    fn line_feed(&mut self, output: &mut Vt100Output) {
        self.pending_wrap = false;
        if self.row + 1 < self.rows {
            self.row += 1;
        } else {
            output.ops.push(ScreenOp::ScrollUp { lines: 1 });
        }
    }

    fn move_to(&mut self, row: usize, col: usize) {
        self.row = row.min(self.rows - 1);
        self.col = col.min(self.cols - 1);
        self.pending_wrap = false;
    }

    fn execute(&mut self, byte: u8, output: &mut Vt100Output) {
        match byte {
            b'\r' => self.move_to(self.row, 0),
            // LF, VT and FF all index
            b'\n' | 0x0B | 0x0C => self.line_feed(output),
            0x08 => self.move_to(self.row, self.col.saturating_sub(1)),
            b'\t' => self.move_to(self.row, (self.col / TAB_STOP + 1) * TAB_STOP),
            0x07 => output.bell = true,
            _ => {}
        }
    }

    fn escape(&mut self, intermediate: Option<u8>, final_byte: u8, output: &mut Vt100Output) {
        match (intermediate, final_byte) {
            (None, b'D') => self.line_feed(output),
            (None, b'E') => {
                self.col = 0;
                self.line_feed(output);
            }
            (None, b'M') => self.move_to(self.row.saturating_sub(1), self.col),
            (None, b'7') => self.saved = (self.row, self.col),
            (None, b'8') => self.move_to(self.saved.0, self.saved.1),
            (None, b'c') => {
                output.ops.push(ScreenOp::Clear);
                self.intensified = false;
                self.move_to(0, 0);
            }
            _ => debug!("Ignoring VT100 escape {:?} {:?}", intermediate, char::from(final_byte)),
        }
    }

    fn csi(&mut self, private: bool, params: &[u16], final_byte: u8, output: &mut Vt100Output) {
        // first parameter, zero or missing meaning `default`
        let count = |index: usize, default: usize| match params.get(index) {
            Some(&0) | None => default,
            Some(&value) => usize::from(value),
        };
        let mode = params.first().copied().unwrap_or(0);

        if private {
            debug!("Ignoring VT100 private mode {:?}{}", params, char::from(final_byte));
            return;
        }

        match final_byte {
            b'A' => self.move_to(self.row.saturating_sub(count(0, 1)), self.col),
            b'B' => self.move_to(self.row.saturating_add(count(0, 1)), self.col),
            b'C' => self.move_to(self.row, self.col.saturating_add(count(0, 1))),
            b'D' => self.move_to(self.row, self.col.saturating_sub(count(0, 1))),
            b'H' | b'f' => self.move_to(count(0, 1) - 1, count(1, 1) - 1),
            b'G' => self.move_to(self.row, count(0, 1) - 1),
            b'd' => self.move_to(count(0, 1) - 1, self.col),
            b'J' => self.erase_display(mode, output),
            b'K' => self.erase_line(mode, output),
            b'm' => self.select_graphic_rendition(params),
            b'n' => match mode {
                5 => output.reply.extend_from_slice(b"\x1b[0n"),
                6 => output
                    .reply
                    .extend(format!("\x1b[{};{}R", self.row + 1, self.col + 1).into_bytes()),
                _ => {}
            },
            b'c' if mode == 0 => output.reply.extend_from_slice(b"\x1b[?1;0c"),
            b's' => self.saved = (self.row, self.col),
            b'u' => self.move_to(self.saved.0, self.saved.1),
            _ => debug!("Ignoring VT100 CSI {:?}{}", params, char::from(final_byte)),
        }
    }

    fn erase_display(&mut self, mode: u16, output: &mut Vt100Output) {
        let size = self.rows * self.cols;
        let address = self.address();
        let (start, len) = match mode {
            0 => (address, size - address),
            1 => (0, address + 1),
            2 => (0, size),
            _ => return,
        };
        output.ops.push(ScreenOp::Erase { start, len });
    }

    fn erase_line(&mut self, mode: u16, output: &mut Vt100Output) {
        let line = self.row * self.cols;
        let (start, len) = match mode {
            0 => (self.address(), self.cols - self.col),
            1 => (line, self.col + 1),
            2 => (line, self.cols),
            _ => return,
        };
        output.ops.push(ScreenOp::Erase { start, len });
    }

    /// Bold, underline, blink and reverse all show as intensified
    fn select_graphic_rendition(&mut self, params: &[u16]) {
        if params.is_empty() {
            self.intensified = false;
            return;
        }
        for &param in params {
            match param {
                0 | 22 | 24 | 25 | 27 => self.intensified = false,
                1 | 4 | 5 | 7 => self.intensified = true,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::ScreenBuffer;

    fn run(codec: &mut Vt100Codec, buffer: &mut ScreenBuffer, data: &[u8]) -> Vt100Output {
        let output = codec.decode(data);
        buffer.apply_all(&output.ops).unwrap();
        output
    }

    #[test]
    fn test_text_and_newline() {
        let mut codec = Vt100Codec::new(24, 80);
        let mut buffer = ScreenBuffer::new(24, 80);
        run(&mut codec, &mut buffer, b"hello\r\nworld");
        assert_eq!(buffer.row_text(0).trim_end(), "hello");
        assert_eq!(buffer.row_text(1).trim_end(), "world");
        assert_eq!(buffer.cursor(), 85);
    }

    #[test]
    fn test_cursor_position_and_erase() {
        let mut codec = Vt100Codec::new(24, 80);
        let mut buffer = ScreenBuffer::new(24, 80);
        run(&mut codec, &mut buffer, b"abcdef\x1b[1;3H\x1b[K");
        assert_eq!(buffer.row_text(0).trim_end(), "ab");
        assert_eq!(codec.cursor(), (0, 2));

        run(&mut codec, &mut buffer, b"\x1b[2J\x1b[24;80H");
        assert!(buffer.cells().iter().all(|cell| cell.is_null()));
        assert_eq!(buffer.cursor(), 1919);
    }

    #[test]
    fn test_unknown_csi_produces_nothing() {
        let mut codec = Vt100Codec::new(24, 80);
        let output = codec.decode(b"\x1b[5z");
        assert!(output.ops.is_empty());
        assert!(codec.decode(b"\x1b[?1049h").ops.is_empty());
    }

    #[test]
    fn test_wrap_and_scroll() {
        let mut codec = Vt100Codec::new(2, 4);
        let mut buffer = ScreenBuffer::new(2, 4);
        run(&mut codec, &mut buffer, b"abcdefghij");
        // "abcd" scrolled off, "efgh" then "ij"
        assert_eq!(buffer.row_text(0), "efgh");
        assert_eq!(buffer.row_text(1), "ij  ");
        assert_eq!(codec.cursor(), (1, 2));
    }

    #[test]
    fn test_last_column_waits_for_next_character() {
        let mut codec = Vt100Codec::new(2, 4);
        let mut buffer = ScreenBuffer::new(2, 4);
        run(&mut codec, &mut buffer, b"abcd");
        assert_eq!(codec.cursor(), (0, 3));
        run(&mut codec, &mut buffer, b"\r\n");
        assert_eq!(codec.cursor(), (1, 0));
        assert_eq!(buffer.row_text(1), "    ");
    }

    #[test]
    fn test_sgr_intensity() {
        let mut codec = Vt100Codec::new(24, 80);
        let mut buffer = ScreenBuffer::new(24, 80);
        run(&mut codec, &mut buffer, b"\x1b[1mA\x1b[0mB");
        assert!(buffer.cell(0).unwrap().intensified);
        assert!(!buffer.cell(1).unwrap().intensified);
    }

    #[test]
    fn test_cursor_report() {
        let mut codec = Vt100Codec::new(24, 80);
        let output = codec.decode(b"\x1b[5;10H\x1b[6n");
        assert_eq!(output.reply, b"\x1b[5;10R".to_vec());
        assert_eq!(codec.decode(b"\x1b[c").reply, b"\x1b[?1;0c".to_vec());
    }

    #[test]
    fn test_cursor_moves_clamp() {
        let mut codec = Vt100Codec::new(24, 80);
        codec.decode(b"\x1b[99A\x1b[200C");
        assert_eq!(codec.cursor(), (0, 79));
        codec.decode(b"\x1b[99B\x1b[D");
        assert_eq!(codec.cursor(), (23, 78));
    }

    #[test]
    fn test_tab_and_backspace() {
        let mut codec = Vt100Codec::new(24, 80);
        codec.decode(b"ab\t");
        assert_eq!(codec.cursor(), (0, 8));
        codec.decode(b"\x08\x08");
        assert_eq!(codec.cursor(), (0, 6));
    }
}

//! Property tests for the screen buffer and both host codecs

use proptest::prelude::*;

use coax3174::error::OperatorError;
use coax3174::field::FieldAttribute;
use coax3174::keyboard::Key;
use coax3174::tn3270::codes::{AID_NO_AID, CMD_ERASE_WRITE};
use coax3174::tn3270::{encode, Tn3270Codec};
use coax3174::vt100::Vt100Codec;
use coax3174::ScreenBuffer;

const ROWS: usize = 4;
const COLS: usize = 10;
const SIZE: usize = ROWS * COLS;

#[derive(Debug, Clone)]
enum CellSpec {
    Null,
    Char(char),
    Attribute(u8),
}

fn arb_cell() -> impl Strategy<Value = CellSpec> {
    prop_oneof![
        3 => Just(CellSpec::Null),
        6 => prop::sample::select(b"ABCXYZ0129 ".to_vec()).prop_map(|b| CellSpec::Char(char::from(b))),
        1 => (0u8..0x40).prop_map(CellSpec::Attribute),
    ]
}

fn build(cells: &[CellSpec], cursor: usize) -> ScreenBuffer {
    let mut buffer = ScreenBuffer::new(ROWS, COLS);
    for (address, cell) in cells.iter().enumerate() {
        match *cell {
            CellSpec::Null => {}
            CellSpec::Char(ch) => buffer.write_cell(address, ch, None).unwrap(),
            CellSpec::Attribute(bits) => {
                buffer.write_cell(address, '\0', Some(FieldAttribute::new(bits))).unwrap()
            }
        }
    }
    buffer.move_cursor(cursor).unwrap();
    buffer
}

fn arb_buffer() -> impl Strategy<Value = ScreenBuffer> {
    (prop::collection::vec(arb_cell(), SIZE), 0..SIZE).prop_map(|(cells, cursor)| build(&cells, cursor))
}

proptest! {
    /// Range reads wrap at the end of the buffer
    #[test]
    fn prop_read_range_wraps(buffer in arb_buffer(), start in 0..SIZE, len in 0..=SIZE) {
        let read: Vec<_> = buffer.read_range(start, len).unwrap().copied().collect();
        let expected: Vec<_> = (0..len).map(|i| buffer.cells()[(start + i) % SIZE]).collect();
        prop_assert_eq!(read, expected);
    }

    /// Writing size - 1 cells from the last address wraps to the start
    #[test]
    fn prop_writes_wrap(rows in 1usize..8, cols in 2usize..20, ch in "[A-Z]") {
        let ch = ch.chars().next().unwrap();
        let mut buffer = ScreenBuffer::new(rows, cols);
        let size = buffer.size();
        for i in 0..size - 1 {
            let address = buffer.offset(size - 1, i as isize);
            buffer.write_cell(address, ch, None).unwrap();
        }
        prop_assert_eq!(buffer.cells()[size - 1].ch, ch);
        if size > 2 {
            prop_assert_eq!(buffer.cells()[size - 3].ch, ch);
        }
        prop_assert_eq!(buffer.cells()[size - 2].ch, '\0');
        prop_assert!(buffer.write_cell(size, ch, None).is_err());
    }

    /// Offsets wrap in both directions
    #[test]
    fn prop_offset_wraps(address in 0..SIZE, offset in -200isize..200) {
        let buffer = ScreenBuffer::new(ROWS, COLS);
        let moved = buffer.offset(address, offset);
        prop_assert!(moved < SIZE);
        prop_assert_eq!(buffer.offset(moved, -offset), address);
    }

    /// Typing into a protected field is refused and nothing changes
    #[test]
    fn prop_protected_keystroke_refused(buffer in arb_buffer(), ch in "[a-z0-9]") {
        let ch = ch.chars().next().unwrap();
        let cursor = buffer.cursor();
        let protected = buffer.is_formatted()
            && (buffer.cells()[cursor].is_attribute()
                || buffer.field_at(cursor).map_or(false, |field| field.attribute.is_protected()));

        let mut codec = Tn3270Codec::new();
        let result = codec.encode_key(Key::Char(ch), &buffer);
        if protected {
            prop_assert_eq!(result, Err(OperatorError::ProtectedFieldViolation));
        }
    }

    /// Accepted keystrokes produce operations that apply cleanly
    #[test]
    fn prop_keystroke_ops_in_bounds(buffer in arb_buffer(), keys in prop::collection::vec(0usize..8, 1..20)) {
        let choices = [
            Key::Char('a'),
            Key::Char('7'),
            Key::Tab,
            Key::Backtab,
            Key::Delete,
            Key::Backspace,
            Key::EraseEof,
            Key::Insert,
        ];
        let mut buffer = buffer;
        let mut codec = Tn3270Codec::new();
        for index in keys {
            match codec.encode_key(choices[index], &buffer) {
                Ok(output) => prop_assert!(buffer.apply_all(&output.ops).is_ok()),
                Err(_) => {
                    codec.encode_key(Key::Reset, &buffer).unwrap();
                }
            }
            prop_assert!(buffer.cursor() < SIZE);
        }
    }

    /// A buffer read back with Read Buffer and written again is unchanged
    #[test]
    fn prop_read_buffer_rewrites_same_screen(cells in prop::collection::vec(arb_cell(), SIZE)) {
        let original = build(&cells, 0);

        // drop the AID and cursor address
        let inbound = encode::read_buffer(AID_NO_AID, &original);
        let mut record = vec![CMD_ERASE_WRITE, 0x00];
        record.extend_from_slice(&inbound[3..]);

        let mut codec = Tn3270Codec::new();
        let mut copy = ScreenBuffer::new(ROWS, COLS);
        let output = codec.decode(&record, &copy).unwrap();
        copy.apply_all(&output.ops).unwrap();
        prop_assert_eq!(copy.cells(), original.cells());
    }

    /// Arbitrary host bytes never produce out of bounds operations
    #[test]
    fn prop_tn3270_decode_total(buffer in arb_buffer(), data in prop::collection::vec(any::<u8>(), 0..200)) {
        let mut buffer = buffer;
        let mut codec = Tn3270Codec::new();
        if let Ok(output) = codec.decode(&data, &buffer) {
            prop_assert!(buffer.apply_all(&output.ops).is_ok());
        }
    }

    /// Arbitrary process output never leaves the screen
    #[test]
    fn prop_vt100_decode_total(chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8)) {
        let mut buffer = ScreenBuffer::new(ROWS, COLS);
        let mut codec = Vt100Codec::new(ROWS, COLS);
        for chunk in chunks {
            let output = codec.decode(&chunk);
            prop_assert!(buffer.apply_all(&output.ops).is_ok());
            let (row, col) = codec.cursor();
            prop_assert!(row < ROWS && col < COLS);
        }
    }
}

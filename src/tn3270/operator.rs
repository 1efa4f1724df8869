//! Operator editing on a 3270 screen
//!
//! Each function inspects the current buffer and returns the operations
//! that perform the edit, or the operator error that forbids it. Nothing
//! here mutates the buffer, so a rejected keystroke leaves it untouched.

use crate::ebcdic::{ebcdic_to_char, DUP, FIELD_MARK};
use crate::error::OperatorError;
use crate::field::Field;
use crate::screen::{ScreenBuffer, ScreenOp};

/// The editable run of cells around an address: the character cells of
/// an unprotected field, or the whole buffer when it is unformatted.
struct Span {
    field: Option<Field>,
    addresses: Vec<usize>,
    index: usize,
}

impl Span {
    fn at(buffer: &ScreenBuffer, address: usize) -> Result<Self, OperatorError> {
        if !buffer.is_formatted() {
            return Ok(Self { field: None, addresses: (0..buffer.size()).collect(), index: address });
        }
        let field = match buffer.field_at(address) {
            Some(field) if field.contains(address) && !field.attribute.is_protected() => field,
            _ => return Err(OperatorError::ProtectedFieldViolation),
        };
        Ok(Self {
            field: Some(field),
            addresses: field.addresses().collect(),
            index: field.offset_of(address),
        })
    }

    fn mark_modified(&self, ops: &mut Vec<ScreenOp>) {
        if let Some(field) = self.field {
            ops.push(ScreenOp::SetModified { address: field.address, modified: true });
        }
    }
}

fn ch_at(buffer: &ScreenBuffer, address: usize) -> char {
    buffer.cell(address).map_or('\0', |cell| cell.ch)
}

fn write(address: usize, ch: char) -> ScreenOp {
    ScreenOp::WriteChar { address, ch, intensified: false }
}

/// Cursor position after typing into `address`
fn advance(buffer: &ScreenBuffer, address: usize) -> usize {
    let next = buffer.offset(address, 1);
    match buffer.cell(next).and_then(|cell| cell.attribute) {
        Some(attribute) if attribute.is_autoskip() => buffer.next_unprotected(next).unwrap_or(next),
        _ => next,
    }
}

/// Type a character at the cursor
///
/// In insert mode the rest of the field shifts right into the first null
/// at or after the cursor; without one the field overflows.
pub fn input(buffer: &ScreenBuffer, ch: char, insert: bool) -> Result<Vec<ScreenOp>, OperatorError> {
    let cursor = buffer.cursor();
    buffer.check_edit(cursor, ch)?;
    let span = Span::at(buffer, cursor)?;
    let mut ops = Vec::new();

    if insert {
        let tail = &span.addresses[span.index..];
        let null = tail
            .iter()
            .position(|&address| ch_at(buffer, address) == '\0')
            .ok_or(OperatorError::FieldOverflow)?;
        for i in (1..=null).rev() {
            ops.push(write(tail[i], ch_at(buffer, tail[i - 1])));
        }
    }

    ops.push(write(cursor, ch));
    span.mark_modified(&mut ops);
    ops.push(ScreenOp::MoveCursor(advance(buffer, cursor)));
    Ok(ops)
}

/// Remove the character at `index`, pulling the rest of the span left
fn delete_at(buffer: &ScreenBuffer, span: &Span, index: usize) -> Vec<ScreenOp> {
    let addresses = &span.addresses;
    let mut ops: Vec<ScreenOp> = addresses[index..]
        .windows(2)
        .map(|pair| write(pair[0], ch_at(buffer, pair[1])))
        .collect();
    if let Some(&last) = addresses.last() {
        ops.push(write(last, '\0'));
    }
    span.mark_modified(&mut ops);
    ops
}

pub fn delete(buffer: &ScreenBuffer) -> Result<Vec<ScreenOp>, OperatorError> {
    let span = Span::at(buffer, buffer.cursor())?;
    Ok(delete_at(buffer, &span, span.index))
}

/// Move left and delete; does nothing at the start of a field
pub fn backspace(buffer: &ScreenBuffer) -> Result<Vec<ScreenOp>, OperatorError> {
    let span = Span::at(buffer, buffer.cursor())?;
    if span.index == 0 {
        return Ok(Vec::new());
    }
    let mut ops = delete_at(buffer, &span, span.index - 1);
    ops.push(ScreenOp::MoveCursor(span.addresses[span.index - 1]));
    Ok(ops)
}

/// Null from the cursor to the end of the field
pub fn erase_eof(buffer: &ScreenBuffer) -> Result<Vec<ScreenOp>, OperatorError> {
    let span = Span::at(buffer, buffer.cursor())?;
    let mut ops = vec![ScreenOp::Erase {
        start: buffer.cursor(),
        len: span.addresses.len() - span.index,
    }];
    span.mark_modified(&mut ops);
    Ok(ops)
}

/// Null every unprotected field and home the cursor to the first one
pub fn erase_input(buffer: &ScreenBuffer) -> Vec<ScreenOp> {
    if !buffer.is_formatted() {
        return vec![ScreenOp::Clear];
    }
    let mut ops = Vec::new();
    for field in buffer.fields().filter(|field| !field.attribute.is_protected()) {
        if field.len > 0 {
            ops.push(ScreenOp::Erase { start: field.start(), len: field.len });
        }
        ops.push(ScreenOp::SetModified { address: field.address, modified: false });
    }
    ops.push(ScreenOp::MoveCursor(home(buffer)));
    ops
}

pub fn tab(buffer: &ScreenBuffer) -> usize {
    buffer.next_unprotected(buffer.cursor()).unwrap_or(0)
}

/// Start of the unprotected field behind the cursor
pub fn backtab(buffer: &ScreenBuffer) -> usize {
    let cursor = buffer.cursor();
    let size = buffer.size();
    buffer
        .fields()
        .filter(|field| !field.attribute.is_protected() && field.len > 0)
        .map(|field| field.start())
        .map(|start| (start, (cursor + size - start) % size))
        .map(|(start, distance)| (start, if distance == 0 { size } else { distance }))
        .min_by_key(|&(_, distance)| distance)
        .map_or(0, |(start, _)| start)
}

/// First position of the next row, or the next input field from there
pub fn newline(buffer: &ScreenBuffer) -> usize {
    let (row, _) = buffer.position(buffer.cursor());
    let target = buffer.address_of((row + 1) % buffer.rows(), 0);
    if !buffer.is_formatted() || Span::at(buffer, target).is_ok() {
        return target;
    }
    buffer.next_unprotected(target).unwrap_or(0)
}

pub fn home(buffer: &ScreenBuffer) -> usize {
    if !buffer.is_formatted() {
        return 0;
    }
    buffer.next_unprotected(buffer.size() - 1).unwrap_or(0)
}

/// Cursor moved by `cells`, wrapping around the screen
pub fn move_by(buffer: &ScreenBuffer, cells: isize) -> usize {
    buffer.offset(buffer.cursor(), cells)
}

/// DUP: store the DUP character and tab to the next field
pub fn dup(buffer: &ScreenBuffer, insert: bool) -> Result<Vec<ScreenOp>, OperatorError> {
    let mut ops = input(buffer, ebcdic_to_char(DUP), insert)?;
    ops.pop();
    ops.push(ScreenOp::MoveCursor(tab(buffer)));
    Ok(ops)
}

pub fn field_mark(buffer: &ScreenBuffer, insert: bool) -> Result<Vec<ScreenOp>, OperatorError> {
    input(buffer, ebcdic_to_char(FIELD_MARK), insert)
}

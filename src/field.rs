//! 3270 field model over the screen buffer
//!
//! Fields are never stored. Every query rescans the buffer from the
//! attribute cells, so a mutation can never leave a stale field behind.

use crate::error::OperatorError;
use crate::screen::ScreenBuffer;
use crate::tn3270::codes::{ATTR_MDT, ATTR_NUMERIC, ATTR_PROTECTED};

/// Base field attribute byte (the value carried by SF)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FieldAttribute(u8);

impl FieldAttribute {
    /// Build from a data stream attribute byte; the two graphic-conversion
    /// bits are dropped
    pub fn new(byte: u8) -> Self {
        Self(byte & 0x3F)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_protected(self) -> bool {
        self.0 & ATTR_PROTECTED != 0
    }

    pub fn is_numeric(self) -> bool {
        self.0 & ATTR_NUMERIC != 0
    }

    /// Protected and numeric: the cursor skips over the field
    pub fn is_autoskip(self) -> bool {
        self.is_protected() && self.is_numeric()
    }

    /// Modified data tag
    pub fn is_modified(self) -> bool {
        self.0 & ATTR_MDT != 0
    }

    pub fn with_modified(self, modified: bool) -> Self {
        if modified {
            Self(self.0 | ATTR_MDT)
        } else {
            Self(self.0 & !ATTR_MDT)
        }
    }
}

/// A field: the attribute cell and the character cells up to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Address of the attribute cell
    pub address: usize,
    pub attribute: FieldAttribute,
    /// Character cells in the field, possibly zero
    pub len: usize,
    buffer_size: usize,
}

impl Field {
    /// First character cell
    pub fn start(&self) -> usize {
        (self.address + 1) % self.buffer_size
    }

    /// Last character cell, `None` for an empty field
    pub fn end(&self) -> Option<usize> {
        (self.len > 0).then(|| (self.address + self.len) % self.buffer_size)
    }

    /// Whether `address` is one of the field's character cells
    pub fn contains(&self, address: usize) -> bool {
        let distance = (address + self.buffer_size - self.address) % self.buffer_size;
        distance >= 1 && distance <= self.len
    }

    /// Character cell addresses in order, wrapping
    pub fn addresses(&self) -> impl Iterator<Item = usize> {
        let (start, size) = (self.start(), self.buffer_size);
        (0..self.len).map(move |i| (start + i) % size)
    }

    /// Offset of `address` inside the field
    pub fn offset_of(&self, address: usize) -> usize {
        (address + self.buffer_size - self.start()) % self.buffer_size
    }
}

/// Lazy scan over the fields of a buffer, in address order
pub struct Fields<'a> {
    buffer: &'a ScreenBuffer,
    first: Option<usize>,
    next: Option<usize>,
}

impl<'a> Iterator for Fields<'a> {
    type Item = Field;

    fn next(&mut self) -> Option<Field> {
        let address = self.next?;
        let field = self.buffer.field_starting_at(address)?;
        let following = self.buffer.offset(address, field.len as isize + 1);
        self.next = if Some(following) == self.first || following == address {
            None
        } else {
            Some(following)
        };
        Some(field)
    }
}

impl ScreenBuffer {
    fn attribute_at(&self, address: usize) -> Option<FieldAttribute> {
        self.cell(address).and_then(|cell| cell.attribute)
    }

    /// Whether the buffer holds at least one field attribute
    pub fn is_formatted(&self) -> bool {
        self.cells().iter().any(|cell| cell.is_attribute())
    }

    fn field_starting_at(&self, address: usize) -> Option<Field> {
        let attribute = self.attribute_at(address)?;
        let size = self.size();
        let len = (1..size)
            .take_while(|&i| !self.cells()[(address + i) % size].is_attribute())
            .count();
        Some(Field { address, attribute, len, buffer_size: size })
    }

    /// Fields in address order starting at the first attribute cell
    pub fn fields(&self) -> Fields<'_> {
        let first = self.cells().iter().position(|cell| cell.is_attribute());
        Fields { buffer: self, first, next: first }
    }

    /// The field owning `address`; an attribute cell belongs to the field it starts
    pub fn field_at(&self, address: usize) -> Option<Field> {
        if address >= self.size() {
            return None;
        }
        (0..self.size())
            .map(|back| self.offset(address, -(back as isize)))
            .find(|&candidate| self.attribute_at(candidate).is_some())
            .and_then(|start| self.field_starting_at(start))
    }

    /// First character cell of the next unprotected field after `address`
    ///
    /// Wraps around the buffer; the field containing `address` is only a
    /// candidate again after a full wrap.
    pub fn next_unprotected(&self, address: usize) -> Option<usize> {
        (1..=self.size())
            .map(|i| self.offset(address, i as isize))
            .filter_map(|candidate| self.attribute_at(candidate).map(|attribute| (candidate, attribute)))
            .find(|(candidate, attribute)| {
                !attribute.is_protected() && self.attribute_at(self.offset(*candidate, 1)).is_none()
            })
            .map(|(candidate, _)| self.offset(candidate, 1))
    }

    /// Check that an operator may type `ch` at `address`
    ///
    /// Returns the target field, or `None` on an unformatted screen.
    pub fn check_edit(&self, address: usize, ch: char) -> Result<Option<Field>, OperatorError> {
        if !self.is_formatted() {
            return Ok(None);
        }
        if self.attribute_at(address).is_some() {
            return Err(OperatorError::ProtectedFieldViolation);
        }
        let field = match self.field_at(address) {
            Some(field) => field,
            None => return Ok(None),
        };
        if field.attribute.is_protected() {
            return Err(OperatorError::ProtectedFieldViolation);
        }
        if field.attribute.is_numeric() && !is_numeric_input(ch) {
            return Err(OperatorError::NumericFieldViolation);
        }
        Ok(Some(field))
    }
}

/// Characters a numeric-lock field accepts
pub fn is_numeric_input(ch: char) -> bool {
    ch.is_ascii_digit() || matches!(ch, '.' | '-' | crate::ebcdic::DUP_CHAR)
}

//! Screen buffer for the attached terminal
//!
//! The buffer is the controller's copy of what the terminal should display:
//! one cell per screen position plus the cursor address. Codecs never touch
//! it directly; they emit [`ScreenOp`]s which the controller applies in
//! order. Addresses are row-major and 3270 addressing is circular, so range
//! reads wrap at the end of the buffer.

use crate::error::{ScreenError, ScreenResult};
use crate::field::FieldAttribute;

/// A single screen position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    /// Character shown in the cell, `'\0'` for a null
    pub ch: char,
    /// Set when the cell is a field attribute rather than a character
    pub attribute: Option<FieldAttribute>,
    /// Character-level intensity, used by hosts without fields
    pub intensified: bool,
}

impl Cell {
    pub fn is_attribute(&self) -> bool {
        self.attribute.is_some()
    }

    pub fn is_null(&self) -> bool {
        self.attribute.is_none() && self.ch == '\0'
    }
}

/// One buffer mutation produced by a codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenOp {
    /// Reset every cell to null and the cursor to 0
    Clear,
    /// Write a character, replacing any attribute in the cell
    WriteChar { address: usize, ch: char, intensified: bool },
    /// Place a field attribute
    StartField { address: usize, attribute: FieldAttribute },
    /// Set or reset the modified data tag of the attribute at `address`
    SetModified { address: usize, modified: bool },
    /// Null `len` character cells from `start`, wrapping, leaving attributes
    Erase { start: usize, len: usize },
    /// Move the cursor
    MoveCursor(usize),
    /// Scroll the whole screen up, filling the bottom with nulls
    ScrollUp { lines: usize },
}

/// Addressable character and attribute grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBuffer {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    cursor: usize,
}

impl ScreenBuffer {
    /// Create a cleared buffer of `rows` x `cols`
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            cursor: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of cells
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cell(&self, address: usize) -> Option<&Cell> {
        self.cells.get(address)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Address `offset` cells away from `address`, wrapping in both directions
    pub fn offset(&self, address: usize, offset: isize) -> usize {
        let size = self.size() as isize;
        (address as isize + offset).rem_euclid(size) as usize
    }

    /// Row and column of an address
    pub fn position(&self, address: usize) -> (usize, usize) {
        (address / self.cols, address % self.cols)
    }

    pub fn address_of(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    fn check(&self, address: usize) -> ScreenResult<()> {
        if address >= self.size() {
            return Err(ScreenError::AddressOutOfBounds {
                address,
                size: self.size(),
            });
        }
        Ok(())
    }

    /// Overwrite a cell completely
    pub fn write_cell(&mut self, address: usize, ch: char, attribute: Option<FieldAttribute>) -> ScreenResult<()> {
        self.check(address)?;
        self.cells[address] = Cell {
            ch: if attribute.is_some() { '\0' } else { ch },
            attribute,
            intensified: false,
        };
        Ok(())
    }

    pub fn move_cursor(&mut self, address: usize) -> ScreenResult<()> {
        self.check(address)?;
        self.cursor = address;
        Ok(())
    }

    /// `len` cells starting at `start`, wrapping at the end of the buffer
    pub fn read_range(&self, start: usize, len: usize) -> ScreenResult<impl Iterator<Item = &Cell> + '_> {
        self.check(start)?;
        let size = self.size();
        Ok((0..len).map(move |i| &self.cells[(start + i) % size]))
    }

    /// Reset every cell to a null, unprotected cell and home the cursor
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.cursor = 0;
    }

    /// Null the character cells in a wrapping range
    pub fn erase(&mut self, start: usize, len: usize) -> ScreenResult<()> {
        self.check(start)?;
        let size = self.size();
        for i in 0..len.min(size) {
            let cell = &mut self.cells[(start + i) % size];
            if !cell.is_attribute() {
                cell.ch = '\0';
                cell.intensified = false;
            }
        }
        Ok(())
    }

    /// Shift rows up, nulling the rows uncovered at the bottom
    pub fn scroll_up(&mut self, lines: usize) {
        let lines = lines.min(self.rows);
        let shift = lines * self.cols;
        self.cells.rotate_left(shift);
        let size = self.size();
        self.cells[size - shift..].fill(Cell::default());
    }

    /// Apply one codec operation
    pub fn apply(&mut self, op: &ScreenOp) -> ScreenResult<()> {
        match *op {
            ScreenOp::Clear => self.clear(),
            ScreenOp::WriteChar { address, ch, intensified } => {
                self.check(address)?;
                self.cells[address] = Cell { ch, attribute: None, intensified };
            }
            ScreenOp::StartField { address, attribute } => {
                self.write_cell(address, '\0', Some(attribute))?;
            }
            ScreenOp::SetModified { address, modified } => {
                self.check(address)?;
                if let Some(attribute) = self.cells[address].attribute.as_mut() {
                    *attribute = attribute.with_modified(modified);
                }
            }
            ScreenOp::Erase { start, len } => self.erase(start, len)?,
            ScreenOp::MoveCursor(address) => self.move_cursor(address)?,
            ScreenOp::ScrollUp { lines } => self.scroll_up(lines),
        }
        Ok(())
    }

    /// Apply operations in order, stopping at the first defect
    pub fn apply_all<'a, I>(&mut self, ops: I) -> ScreenResult<()>
    where
        I: IntoIterator<Item = &'a ScreenOp>,
    {
        for op in ops {
            self.apply(op)?;
        }
        Ok(())
    }

    /// Text of a row with nulls shown as spaces, for logs and tests
    pub fn row_text(&self, row: usize) -> String {
        let start = row * self.cols;
        self.cells[start..start + self.cols]
            .iter()
            .map(|cell| if cell.is_attribute() || cell.ch == '\0' { ' ' } else { cell.ch })
            .collect()
    }
}

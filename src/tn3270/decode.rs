//! Host to terminal: 3270 commands and orders
//!
//! A record holds one command. Decoding runs against a shadow copy of the
//! screen buffer, so orders that depend on field layout (PT, EUA, MF) see
//! the effect of the orders before them, and the real buffer is only
//! touched once the whole command decoded cleanly.

use log::debug;

use super::addressing::decode_address;
use super::codes::*;
use super::encode;
use crate::ebcdic::{ebcdic_to_char, DUP, FIELD_MARK};
use crate::error::{DecodeResult, ProtocolViolation, ViolationKind};
use crate::field::FieldAttribute;
use crate::screen::{ScreenBuffer, ScreenOp};

/// Result of decoding one host command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Buffer mutations in stream order
    pub ops: Vec<ScreenOp>,
    /// WCC sound alarm
    pub alarm: bool,
    /// WCC restore keyboard, or an Erase All Unprotected
    pub restore_keyboard: bool,
    /// What the host asked the terminal to send back
    pub read: Option<ReadRequest>,
}

/// Inbound transfers a host command can request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadRequest {
    Buffer,
    Modified,
    ModifiedAll,
    Query,
}

/// Decode one host record against the current buffer
pub fn decode(data: &[u8], buffer: &ScreenBuffer) -> DecodeResult<Decoded> {
    let mut parser = DataStreamParser::new(data, buffer);
    parser.parse()?;
    Ok(parser.decoded)
}

/// Data stream parser for one record
struct DataStreamParser<'a> {
    data: &'a [u8],
    pos: usize,
    shadow: ScreenBuffer,
    address: usize,
    insert_cursor: Option<usize>,
    decoded: Decoded,
}

impl<'a> DataStreamParser<'a> {
    fn new(data: &'a [u8], buffer: &ScreenBuffer) -> Self {
        Self {
            data,
            pos: 0,
            shadow: buffer.clone(),
            address: buffer.cursor(),
            insert_cursor: None,
            decoded: Decoded::default(),
        }
    }

    fn next_byte(&mut self, context: &'static str) -> DecodeResult<u8> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or_else(|| ProtocolViolation::truncated(context, self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_buffer_address(&mut self, context: &'static str) -> DecodeResult<usize> {
        let offset = self.pos;
        let byte1 = self.next_byte(context)?;
        let byte2 = self.next_byte(context)?;
        let address = decode_address(byte1, byte2);
        if address >= self.shadow.size() {
            return Err(ProtocolViolation::skippable(ViolationKind::AddressOutOfRange(address), offset));
        }
        Ok(address)
    }

    /// Apply to the shadow and record
    fn push(&mut self, op: ScreenOp) -> DecodeResult<()> {
        self.shadow.apply(&op).map_err(|_| {
            ProtocolViolation::skippable(ViolationKind::AddressOutOfRange(self.address), self.pos)
        })?;
        self.decoded.ops.push(op);
        Ok(())
    }

    fn advance(&mut self) {
        self.address = self.shadow.offset(self.address, 1);
    }

    fn parse(&mut self) -> DecodeResult<()> {
        let cmd_byte = self.next_byte("command")?;
        let command = CommandCode::from_u8(cmd_byte)
            .ok_or_else(|| ProtocolViolation::skippable(ViolationKind::UnknownCommand(cmd_byte), 0))?;

        debug!("3270 command {:?}, {} bytes", command, self.data.len());

        match command {
            CommandCode::Write => self.process_write(false),
            CommandCode::EraseWrite | CommandCode::EraseWriteAlternate => self.process_write(true),
            CommandCode::ReadBuffer => {
                self.decoded.read = Some(ReadRequest::Buffer);
                Ok(())
            }
            CommandCode::ReadModified => {
                self.decoded.read = Some(ReadRequest::Modified);
                Ok(())
            }
            CommandCode::ReadModifiedAll => {
                self.decoded.read = Some(ReadRequest::ModifiedAll);
                Ok(())
            }
            CommandCode::EraseAllUnprotected => self.process_erase_all_unprotected(),
            CommandCode::WriteStructuredField => self.process_write_structured_field(),
        }
    }

    /// Write, Erase/Write, or Erase/Write Alternate
    fn process_write(&mut self, erase: bool) -> DecodeResult<()> {
        if erase {
            self.push(ScreenOp::Clear)?;
            self.address = 0;
        }

        // An erase with nothing after it is complete; a write needs its WCC
        if erase && self.pos >= self.data.len() {
            self.push(ScreenOp::MoveCursor(0))?;
            return Ok(());
        }

        let wcc = self.next_byte("WCC")?;
        self.decoded.alarm = wcc & WCC_ALARM != 0;
        self.decoded.restore_keyboard = wcc & WCC_RESTORE != 0;

        if wcc & WCC_RESET_MDT != 0 {
            let modified: Vec<usize> = self
                .shadow
                .fields()
                .filter(|field| field.attribute.is_modified())
                .map(|field| field.address)
                .collect();
            for address in modified {
                self.push(ScreenOp::SetModified { address, modified: false })?;
            }
        }

        let mut after_character = false;

        while self.pos < self.data.len() {
            let offset = self.pos;
            let byte = self.next_byte("order")?;

            match OrderCode::from_u8(byte) {
                Some(order) => {
                    self.process_order(order, after_character)?;
                    after_character = order == OrderCode::GraphicEscape;
                }
                None if is_control_range(byte) => {
                    let ch = control_character(byte)
                        .ok_or_else(|| ProtocolViolation::skippable(ViolationKind::UnknownOrder(byte), offset))?;
                    self.write_character(ch)?;
                    after_character = true;
                }
                None => {
                    self.write_character(ebcdic_to_char(byte))?;
                    after_character = true;
                }
            }
        }

        match self.insert_cursor {
            Some(address) => self.push(ScreenOp::MoveCursor(address))?,
            None if erase => self.push(ScreenOp::MoveCursor(0))?,
            None => {}
        }

        Ok(())
    }

    fn write_character(&mut self, ch: char) -> DecodeResult<()> {
        self.push(ScreenOp::WriteChar { address: self.address, ch, intensified: false })?;
        self.advance();
        Ok(())
    }

    fn start_field(&mut self, attribute: FieldAttribute) -> DecodeResult<()> {
        self.push(ScreenOp::StartField { address: self.address, attribute })?;
        self.advance();
        Ok(())
    }

    fn process_order(&mut self, order: OrderCode, after_character: bool) -> DecodeResult<()> {
        match order {
            OrderCode::StartField => {
                let attr_byte = self.next_byte("SF attribute")?;
                self.start_field(FieldAttribute::new(attr_byte))
            }
            OrderCode::StartFieldExtended => {
                let attribute = self.read_attribute_pairs("SFE")?;
                self.start_field(attribute.unwrap_or_default())
            }
            OrderCode::SetBufferAddress => {
                self.address = self.read_buffer_address("SBA address")?;
                Ok(())
            }
            OrderCode::SetAttribute => {
                // Character attributes need extended attribute storage
                let _attr_type = self.next_byte("SA type")?;
                let _attr_value = self.next_byte("SA value")?;
                Ok(())
            }
            OrderCode::ModifyField => self.process_modify_field(),
            OrderCode::InsertCursor => {
                self.insert_cursor = Some(self.address);
                Ok(())
            }
            OrderCode::ProgramTab => self.process_program_tab(after_character),
            OrderCode::RepeatToAddress => self.process_repeat_to_address(),
            OrderCode::EraseUnprotectedToAddress => self.process_erase_unprotected_to_address(),
            OrderCode::GraphicEscape => {
                let byte = self.next_byte("GE character")?;
                self.write_character(ebcdic_to_char(byte))
            }
        }
    }

    /// Attribute type/value pairs of SFE and MF; returns the base attribute if present
    fn read_attribute_pairs(&mut self, context: &'static str) -> DecodeResult<Option<FieldAttribute>> {
        let count = self.next_byte(context)?;
        let mut base = None;
        for _ in 0..count {
            let attr_type = self.next_byte(context)?;
            let attr_value = self.next_byte(context)?;
            if attr_type == XA_3270 {
                base = Some(FieldAttribute::new(attr_value));
            }
        }
        Ok(base)
    }

    fn process_modify_field(&mut self) -> DecodeResult<()> {
        let base = self.read_attribute_pairs("MF")?;
        let current = self.shadow.cell(self.address).and_then(|cell| cell.attribute);

        if let Some(existing) = current {
            let attribute = base.unwrap_or(existing);
            self.push(ScreenOp::StartField { address: self.address, attribute })?;
            self.advance();
        }
        Ok(())
    }

    fn process_program_tab(&mut self, after_character: bool) -> DecodeResult<()> {
        // PT straight after a character nulls the rest of that field
        if after_character {
            let current = self.shadow.cell(self.address).map(|cell| cell.is_attribute());
            if current == Some(false) {
                if let Some(field) = self.shadow.field_at(self.address) {
                    if !field.attribute.is_protected() {
                        let remaining = field.len - field.offset_of(self.address);
                        self.push(ScreenOp::Erase { start: self.address, len: remaining })?;
                    }
                }
            }
        }

        let from = self.shadow.offset(self.address, -1);
        self.address = self.shadow.next_unprotected(from).unwrap_or(0);
        Ok(())
    }

    fn process_repeat_to_address(&mut self) -> DecodeResult<()> {
        let stop = self.read_buffer_address("RA address")?;

        let mut byte = self.next_byte("RA character")?;
        if byte == ORDER_GE {
            byte = self.next_byte("RA GE character")?;
        }
        let ch = ebcdic_to_char(byte);

        let count = self.distance_to(stop);
        for _ in 0..count {
            self.write_character(ch)?;
        }
        Ok(())
    }

    fn process_erase_unprotected_to_address(&mut self) -> DecodeResult<()> {
        let stop = self.read_buffer_address("EUA address")?;
        let count = self.distance_to(stop);
        self.erase_unprotected(self.address, count)?;
        self.address = stop;
        Ok(())
    }

    /// Cells from the current address up to `stop`; equal addresses mean the whole buffer
    fn distance_to(&self, stop: usize) -> usize {
        let size = self.shadow.size();
        match (stop + size - self.address) % size {
            0 => size,
            distance => distance,
        }
    }

    /// Null the unprotected character cells in a wrapping range, one Erase per run
    fn erase_unprotected(&mut self, start: usize, count: usize) -> DecodeResult<()> {
        let formatted = self.shadow.is_formatted();
        let mut protected = formatted
            && self
                .shadow
                .field_at(start)
                .map(|field| field.attribute.is_protected())
                .unwrap_or(false);
        let mut run: Option<(usize, usize)> = None;
        let mut runs = Vec::new();

        for i in 0..count {
            let address = self.shadow.offset(start, i as isize);
            let attribute = self.shadow.cell(address).and_then(|cell| cell.attribute);
            if let Some(attribute) = attribute {
                protected = attribute.is_protected();
                if let Some(finished) = run.take() {
                    runs.push(finished);
                }
                continue;
            }
            if protected {
                continue;
            }
            run = match run {
                Some((run_start, len)) => Some((run_start, len + 1)),
                None => Some((address, 1)),
            };
        }
        runs.extend(run);

        for (start, len) in runs {
            self.push(ScreenOp::Erase { start, len })?;
        }
        Ok(())
    }

    fn process_erase_all_unprotected(&mut self) -> DecodeResult<()> {
        if !self.shadow.is_formatted() {
            self.push(ScreenOp::Clear)?;
        } else {
            let fields: Vec<_> = self
                .shadow
                .fields()
                .filter(|field| !field.attribute.is_protected())
                .collect();
            for field in &fields {
                if field.len > 0 {
                    self.push(ScreenOp::Erase { start: field.start(), len: field.len })?;
                }
                self.push(ScreenOp::SetModified { address: field.address, modified: false })?;
            }
            let home = self.shadow.next_unprotected(self.shadow.size() - 1).unwrap_or(0);
            self.push(ScreenOp::MoveCursor(home))?;
        }
        self.decoded.restore_keyboard = true;
        Ok(())
    }

    fn process_write_structured_field(&mut self) -> DecodeResult<()> {
        while self.pos < self.data.len() {
            let offset = self.pos;
            let hi = self.next_byte("structured field length")?;
            let lo = self.next_byte("structured field length")?;
            let declared = usize::from(u16::from_be_bytes([hi, lo]));
            let remaining = self.data.len() - offset;

            // Zero means the field runs to the end of the record
            let length = if declared == 0 { remaining } else { declared };
            if length < 3 {
                return Err(ProtocolViolation::skippable(
                    ViolationKind::BadStructuredField { length },
                    offset,
                ));
            }
            if length > remaining {
                return Err(ProtocolViolation::truncated("structured field", offset));
            }

            let body = &self.data[offset + 2..offset + length];
            self.pos = offset + length;
            self.process_structured_field(body)?;
        }
        Ok(())
    }

    fn process_structured_field(&mut self, body: &[u8]) -> DecodeResult<()> {
        match body[0] {
            SF_READ_PARTITION => {
                let query_type = body.get(2).copied();
                if matches!(query_type, Some(READ_PARTITION_QUERY) | Some(READ_PARTITION_QUERY_LIST)) {
                    self.decoded.read = Some(ReadRequest::Query);
                } else {
                    debug!("Ignoring read partition type {:?}", query_type);
                }
            }
            SF_ERASE_RESET => {
                self.push(ScreenOp::Clear)?;
                self.address = 0;
            }
            other => debug!("Ignoring structured field 0x{other:02x}"),
        }
        Ok(())
    }
}

/// Control codes allowed as data in a write
fn control_character(byte: u8) -> Option<char> {
    match byte {
        0x00 | DUP | FIELD_MARK => Some(ebcdic_to_char(byte)),
        // FF, CR, NL, EM and SUB display as nulls
        0x0C | 0x0D | 0x15 | 0x19 | 0x3F => Some('\0'),
        _ => None,
    }
}

/// Build the inbound record for a read request
pub fn read_reply(request: ReadRequest, aid: u8, buffer: &ScreenBuffer) -> Vec<u8> {
    match request {
        ReadRequest::Buffer => encode::read_buffer(aid, buffer),
        ReadRequest::Modified => encode::read_modified(aid, buffer, false),
        ReadRequest::ModifiedAll => encode::read_modified(aid, buffer, true),
        ReadRequest::Query => encode::query_reply(buffer),
    }
}

//! Terminal to host: inbound 3270 records
//!
//! Read Modified, Read Buffer and the query reply. Characters go out as
//! EBCDIC and nulls are dropped from field contents.

use super::addressing::{encode_address, graphic_byte};
use super::codes::*;
use crate::ebcdic::char_to_ebcdic;
use crate::screen::{Cell, ScreenBuffer};

fn encode_char(ch: char) -> u8 {
    char_to_ebcdic(ch).unwrap_or(0x6F)
}

fn is_short_read(aid: u8) -> bool {
    matches!(aid, AID_CLEAR | AID_PA1 | AID_PA2 | AID_PA3)
}

fn push_address(out: &mut Vec<u8>, address: usize, buffer: &ScreenBuffer) {
    out.extend(encode_address(address, buffer.size()));
}

fn push_contents<'a>(out: &mut Vec<u8>, cells: impl Iterator<Item = &'a Cell>) {
    out.extend(
        cells
            .filter(|cell| !cell.is_null() && !cell.is_attribute())
            .map(|cell| encode_char(cell.ch)),
    );
}

/// Read Modified response
///
/// AID, cursor address, then SBA + address + contents for every field
/// with its MDT set, in field order. On an unformatted screen the whole
/// buffer is sent without SBA orders. Short-read AIDs send only the AID
/// unless `all` is set (Read Modified All).
pub fn read_modified(aid: u8, buffer: &ScreenBuffer, all: bool) -> Vec<u8> {
    let mut out = vec![aid];
    if is_short_read(aid) && !all {
        return out;
    }

    push_address(&mut out, buffer.cursor(), buffer);

    if !buffer.is_formatted() {
        push_contents(&mut out, buffer.cells().iter());
        return out;
    }

    for field in buffer.fields().filter(|field| field.attribute.is_modified()) {
        out.push(ORDER_SBA);
        push_address(&mut out, field.start(), buffer);
        push_contents(
            &mut out,
            field.addresses().filter_map(|address| buffer.cell(address)),
        );
    }
    out
}

/// Read Buffer response: every cell, attributes as SF orders
pub fn read_buffer(aid: u8, buffer: &ScreenBuffer) -> Vec<u8> {
    let mut out = Vec::with_capacity(buffer.size() + 3);
    out.push(aid);
    push_address(&mut out, buffer.cursor(), buffer);
    for cell in buffer.cells() {
        match cell.attribute {
            Some(attribute) => {
                out.push(ORDER_SF);
                out.push(graphic_byte(attribute.bits()));
            }
            None => out.push(encode_char(cell.ch)),
        }
    }
    out
}

fn push_structured_field(out: &mut Vec<u8>, body: &[u8]) {
    let length = (body.len() + 2) as u16;
    out.extend(length.to_be_bytes());
    out.extend_from_slice(body);
}

/// Query reply for Read Partition Query
///
/// Reports the usable area and an implicit partition sized to the
/// terminal, for both the default and alternate screen.
pub fn query_reply(buffer: &ScreenBuffer) -> Vec<u8> {
    let cols = (buffer.cols() as u16).to_be_bytes();
    let rows = (buffer.rows() as u16).to_be_bytes();
    let size = (buffer.size() as u16).to_be_bytes();

    let mut out = vec![AID_STRUCTURED_FIELD];

    push_structured_field(
        &mut out,
        &[SF_QUERY_REPLY, QR_SUMMARY, QR_SUMMARY, QR_USABLE_AREA, QR_IMPLICIT_PARTITION],
    );

    let mut usable_area = vec![SF_QUERY_REPLY, QR_USABLE_AREA, 0x01, 0x00];
    usable_area.extend(cols);
    usable_area.extend(rows);
    usable_area.push(0x00);
    usable_area.extend([0x00, 0x0A, 0x02, 0xE5, 0x00, 0x02, 0x00, 0x6F, 0x09, 0x0C]);
    usable_area.extend(size);
    push_structured_field(&mut out, &usable_area);

    let mut partition = vec![SF_QUERY_REPLY, QR_IMPLICIT_PARTITION, 0x00, 0x00, 0x0B, 0x01, 0x00];
    partition.extend(cols);
    partition.extend(rows);
    partition.extend(cols);
    partition.extend(rows);
    push_structured_field(&mut out, &partition);

    out
}

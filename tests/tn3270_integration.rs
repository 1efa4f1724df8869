//! TN3270 Integration Tests
//!
//! Drives the 3270 codec the way the controller does: host records are
//! decoded against the buffer, the resulting operations applied, and
//! operator keys turned into inbound records.

use coax3174::ebcdic::encode_str;
use coax3174::error::{OperatorError, ViolationKind};
use coax3174::keyboard::Key;
use coax3174::tn3270::addressing::encode_address;
use coax3174::tn3270::codes::*;
use coax3174::tn3270::{OperatorStatus, Tn3270Codec};
use coax3174::ScreenBuffer;

fn sba(address: usize) -> Vec<u8> {
    let [b1, b2] = encode_address(address, 1920);
    vec![ORDER_SBA, b1, b2]
}

fn address(address: usize) -> Vec<u8> {
    encode_address(address, 1920).to_vec()
}

/// Decode a record and apply it, returning the reply if any
fn host(codec: &mut Tn3270Codec, buffer: &mut ScreenBuffer, data: &[u8]) -> Option<Vec<u8>> {
    let output = codec.decode(data, buffer).expect("record decodes");
    buffer.apply_all(&output.ops).unwrap();
    output.reply
}

fn key(codec: &mut Tn3270Codec, buffer: &mut ScreenBuffer, key: Key) -> Result<Vec<u8>, OperatorError> {
    let output = codec.encode_key(key, buffer)?;
    buffer.apply_all(&output.ops).unwrap();
    Ok(output.host_bytes)
}

fn type_text(codec: &mut Tn3270Codec, buffer: &mut ScreenBuffer, text: &str) {
    for ch in text.chars() {
        key(codec, buffer, Key::Char(ch)).expect("keystroke accepted");
    }
}

/// "USER" label, input field at 10, protected stopper at 20, cursor at 11
fn login_record(input_attribute: u8) -> Vec<u8> {
    let mut data = vec![CMD_ERASE_WRITE, WCC_RESTORE, ORDER_SF, 0x60];
    data.extend(encode_str("USER"));
    data.extend(sba(10));
    data.extend([ORDER_SF, input_attribute]);
    data.extend(sba(20));
    data.extend([ORDER_SF, 0x60]);
    data.extend(sba(11));
    data.push(ORDER_IC);
    data
}

fn login_session(input_attribute: u8) -> (Tn3270Codec, ScreenBuffer) {
    let mut codec = Tn3270Codec::new();
    let mut buffer = ScreenBuffer::new(24, 80);
    assert_eq!(host(&mut codec, &mut buffer, &login_record(input_attribute)), None);
    (codec, buffer)
}

/// Test a login screen round trip
#[test]
fn test_login_screen_round_trip() {
    let (mut codec, mut buffer) = login_session(0x40);
    assert_eq!(buffer.cell(1).unwrap().ch, 'U');
    assert_eq!(buffer.cursor(), 11);
    assert_eq!(codec.status(), OperatorStatus::Ready);

    type_text(&mut codec, &mut buffer, "ab");
    assert_eq!(buffer.cursor(), 13);

    let sent = key(&mut codec, &mut buffer, Key::Enter).unwrap();
    let mut expected = vec![AID_ENTER];
    expected.extend(address(13));
    expected.extend(sba(11));
    expected.extend([0x81, 0x82]);
    assert_eq!(sent, expected);
}

/// Test keyboard lock after an attention key until the host restores it
#[test]
fn test_keyboard_locked_until_restore() {
    let (mut codec, mut buffer) = login_session(0x40);
    key(&mut codec, &mut buffer, Key::Enter).unwrap();

    assert!(codec.is_keyboard_locked());
    assert_eq!(codec.status(), OperatorStatus::WaitingForHost);
    assert_eq!(
        key(&mut codec, &mut buffer, Key::Char('x')),
        Err(OperatorError::KeyboardLocked)
    );

    // a write without restore leaves the keyboard locked
    host(&mut codec, &mut buffer, &[CMD_WRITE, 0x00]);
    assert!(codec.is_keyboard_locked());
    assert_eq!(codec.status(), OperatorStatus::SystemLock);

    host(&mut codec, &mut buffer, &[CMD_WRITE, WCC_RESTORE]);
    assert!(!codec.is_keyboard_locked());
    assert_eq!(codec.status(), OperatorStatus::Ready);
}

/// Test short read AIDs send only the AID byte
#[test]
fn test_short_read_sends_aid_only() {
    let (mut codec, mut buffer) = login_session(0x40);
    type_text(&mut codec, &mut buffer, "abc");

    assert_eq!(key(&mut codec, &mut buffer, Key::Pa(1)).unwrap(), vec![AID_PA1]);
    assert!(codec.is_keyboard_locked());
}

/// Test Clear clears locally and sends the AID alone
#[test]
fn test_clear_key() {
    let (mut codec, mut buffer) = login_session(0x40);
    assert_eq!(key(&mut codec, &mut buffer, Key::Clear).unwrap(), vec![AID_CLEAR]);
    assert!(buffer.cells().iter().all(|cell| cell.is_null()));
    assert_eq!(buffer.cursor(), 0);
}

/// Test host Read Modified returns typed input
#[test]
fn test_host_read_modified() {
    let (mut codec, mut buffer) = login_session(0x40);
    type_text(&mut codec, &mut buffer, "ab");

    let reply = host(&mut codec, &mut buffer, &[CMD_READ_MODIFIED]).expect("reply");
    let mut expected = vec![AID_NO_AID];
    expected.extend(address(13));
    expected.extend(sba(11));
    expected.extend([0x81, 0x82]);
    assert_eq!(reply, expected);
}

/// Test fields the host sends pre-modified come back on Read Modified
#[test]
fn test_premodified_fields_round_trip() {
    let mut codec = Tn3270Codec::new();
    let mut buffer = ScreenBuffer::new(24, 80);
    let mut data = vec![CMD_ERASE_WRITE, WCC_RESTORE, ORDER_SF, 0xC1];
    data.extend(encode_str("ONE"));
    data.extend([ORDER_SF, 0x40]);
    data.extend(encode_str("TWO"));
    data.extend([ORDER_SF, 0xC1]);
    data.extend(encode_str("THREE"));
    host(&mut codec, &mut buffer, &data);

    let reply = host(&mut codec, &mut buffer, &[CMD_READ_MODIFIED]).expect("reply");
    let mut expected = vec![AID_NO_AID];
    expected.extend(address(0));
    expected.extend(sba(1));
    expected.extend(encode_str("ONE"));
    expected.extend(sba(9));
    expected.extend(encode_str("THREE"));
    assert_eq!(reply, expected);
}

/// Test modified data tags survive until a WCC reset
#[test]
fn test_reset_mdt() {
    let (mut codec, mut buffer) = login_session(0x40);
    type_text(&mut codec, &mut buffer, "ab");

    host(&mut codec, &mut buffer, &[CMD_WRITE, WCC_RESET_MDT]);
    let reply = host(&mut codec, &mut buffer, &[CMD_READ_MODIFIED]).expect("reply");
    assert_eq!(reply.len(), 3);
}

/// Test protected field keystroke
#[test]
fn test_protected_field_rejects_input() {
    let (mut codec, mut buffer) = login_session(0x40);
    buffer.move_cursor(2).unwrap();
    let before = buffer.clone();

    assert_eq!(
        key(&mut codec, &mut buffer, Key::Char('z')),
        Err(OperatorError::ProtectedFieldViolation)
    );
    assert_eq!(buffer, before);
    assert_eq!(codec.status(), OperatorStatus::ProtectedField);

    // inhibited until Reset
    buffer.move_cursor(11).unwrap();
    assert_eq!(
        key(&mut codec, &mut buffer, Key::Char('z')),
        Err(OperatorError::KeyboardLocked)
    );
    key(&mut codec, &mut buffer, Key::Reset).unwrap();
    assert_eq!(codec.status(), OperatorStatus::Ready);
    key(&mut codec, &mut buffer, Key::Char('z')).unwrap();
    assert_eq!(buffer.cell(11).unwrap().ch, 'z');
}

/// Test numeric field accepts digits only
#[test]
fn test_numeric_field() {
    let (mut codec, mut buffer) = login_session(0x50);

    assert_eq!(
        key(&mut codec, &mut buffer, Key::Char('x')),
        Err(OperatorError::NumericFieldViolation)
    );
    assert_eq!(codec.status(), OperatorStatus::NumericField);
    key(&mut codec, &mut buffer, Key::Reset).unwrap();

    type_text(&mut codec, &mut buffer, "42");
    assert_eq!(buffer.cell(11).unwrap().ch, '4');
    assert_eq!(buffer.cell(12).unwrap().ch, '2');
}

/// Test tab moves between unprotected fields
#[test]
fn test_tab_to_next_field() {
    let (mut codec, mut buffer) = login_session(0x40);
    buffer.move_cursor(0).unwrap();
    key(&mut codec, &mut buffer, Key::Tab).unwrap();
    assert_eq!(buffer.cursor(), 11);
}

/// Test query reply to Read Partition Query
#[test]
fn test_read_partition_query() {
    let mut codec = Tn3270Codec::new();
    let mut buffer = ScreenBuffer::new(24, 80);
    let record = [
        CMD_WRITE_STRUCTURED_FIELD,
        0x00,
        0x05,
        SF_READ_PARTITION,
        0xFF,
        READ_PARTITION_QUERY,
    ];

    let reply = host(&mut codec, &mut buffer, &record).expect("query reply");
    assert_eq!(reply[0], AID_STRUCTURED_FIELD);
    assert_eq!(reply[3], SF_QUERY_REPLY);
}

/// Test SNA command codes decode like their local equivalents
#[test]
fn test_sna_command_codes() {
    let mut local = login_record(0x40);
    let (_, expected) = login_session(0x40);

    local[0] = SNA_CMD_ERASE_WRITE;
    let mut codec = Tn3270Codec::new();
    let mut buffer = ScreenBuffer::new(24, 80);
    host(&mut codec, &mut buffer, &local);
    assert_eq!(buffer, expected);
}

/// Test a truncated record changes nothing
#[test]
fn test_truncated_record() {
    let (mut codec, buffer) = login_session(0x40);
    let violation = codec
        .decode(&[CMD_WRITE, 0x00, ORDER_SBA, 0x40], &buffer)
        .unwrap_err();
    assert!(!violation.recoverable);
}

/// Test an out of range address can be skipped
#[test]
fn test_address_out_of_range() {
    let buffer = ScreenBuffer::new(24, 80);
    let mut codec = Tn3270Codec::new();
    // 12-bit address 4000 on a 1920 cell screen
    let [b1, b2] = encode_address(4000, 4096);
    let violation = codec
        .decode(&[CMD_WRITE, 0x00, ORDER_SBA, b1, b2], &buffer)
        .unwrap_err();
    assert!(violation.recoverable);
    assert!(matches!(violation.kind, ViolationKind::AddressOutOfRange(4000)));
}

//! 3270 buffer address encoding
//!
//! 12-bit addresses carry six bits in each byte, translated through the
//! graphic code table. 14-bit addresses are plain binary; the decoder tells
//! them apart by the top two bits of the first byte being zero.

/// Six-bit values as graphic bytes
const CODE_TABLE: [u8; 64] = [
    0x40, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
    0xC8, 0xC9, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
    0x50, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7,
    0xD8, 0xD9, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
    0x60, 0x61, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
    0xE8, 0xE9, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
    0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
    0xF8, 0xF9, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
];

/// Largest buffer that can be addressed with 12-bit addresses
pub const MAX_12BIT_SIZE: usize = 4096;

/// Decode a two byte buffer address
pub fn decode_address(byte1: u8, byte2: u8) -> usize {
    if byte1 & 0xC0 == 0 {
        (usize::from(byte1 & 0x3F) << 8) | usize::from(byte2)
    } else {
        (usize::from(byte1 & 0x3F) << 6) | usize::from(byte2 & 0x3F)
    }
}

/// Six-bit value as a graphic byte, as used for attribute bytes in inbound streams
pub fn graphic_byte(value: u8) -> u8 {
    CODE_TABLE[usize::from(value & 0x3F)]
}

/// Encode an address for a buffer of `buffer_size` cells
///
/// Buffers that fit use 12-bit encoding, larger ones 14-bit.
pub fn encode_address(address: usize, buffer_size: usize) -> [u8; 2] {
    if buffer_size <= MAX_12BIT_SIZE {
        [
            CODE_TABLE[(address >> 6) & 0x3F],
            CODE_TABLE[address & 0x3F],
        ]
    } else {
        [((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8]
    }
}

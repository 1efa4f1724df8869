//! SLIP framing for interface messages
//!
//! A frame is `END`, the escaped message, `END`. The message itself starts
//! with its own length as a big-endian u16 so truncated frames are caught.

use crate::error::{LinkError, LinkResult};

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

fn push_escaped(out: &mut Vec<u8>, byte: u8) {
    match byte {
        END => out.extend([ESC, ESC_END]),
        ESC => out.extend([ESC, ESC_ESC]),
        _ => out.push(byte),
    }
}

/// Frame a message for the wire
pub fn encode_frame(message: &[u8]) -> Vec<u8> {
    let length = (message.len() as u16).to_be_bytes();
    let mut out = Vec::with_capacity(message.len() + 6);
    out.push(END);
    for &byte in length.iter().chain(message) {
        push_escaped(&mut out, byte);
    }
    out.push(END);
    out
}

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    escaped: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a message when a frame completes
    pub fn push(&mut self, byte: u8) -> Option<LinkResult<Vec<u8>>> {
        if self.escaped {
            self.escaped = false;
            match byte {
                ESC_END => self.buffer.push(END),
                ESC_ESC => self.buffer.push(ESC),
                _ => {
                    self.buffer.clear();
                    return Some(Err(LinkError::Malformed {
                        reason: format!("invalid escape 0x{:02X}", byte),
                    }));
                }
            }
            return None;
        }

        match byte {
            ESC => {
                self.escaped = true;
                None
            }
            // empty frames are just separators
            END if self.buffer.is_empty() => None,
            END => Some(Self::unpack(std::mem::take(&mut self.buffer))),
            _ => {
                self.buffer.push(byte);
                None
            }
        }
    }

    fn unpack(frame: Vec<u8>) -> LinkResult<Vec<u8>> {
        if frame.len() < 2 {
            return Err(LinkError::Malformed { reason: "frame shorter than its length".to_string() });
        }
        let length = usize::from(u16::from_be_bytes([frame[0], frame[1]]));
        if frame.len() - 2 != length {
            return Err(LinkError::Malformed {
                reason: format!("frame length {} but {} bytes received", length, frame.len() - 2),
            });
        }
        Ok(frame[2..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<LinkResult<Vec<u8>>> {
        let mut decoder = FrameDecoder::new();
        bytes.iter().filter_map(|&byte| decoder.push(byte)).collect()
    }

    #[test]
    fn test_escapes_special_bytes() {
        let frame = encode_frame(&[0x01, END, ESC]);
        assert_eq!(frame, vec![END, 0x00, 0x03, 0x01, ESC, ESC_END, ESC, ESC_ESC, END]);
        let decoded = decode_all(&frame);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap(), &vec![0x01, END, ESC]);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = encode_frame(b"ab");
        bytes.extend(encode_frame(b"c"));
        let decoded: Vec<Vec<u8>> = decode_all(&bytes).into_iter().map(Result::unwrap).collect();
        assert_eq!(decoded, vec![b"ab".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_length_mismatch() {
        let decoded = decode_all(&[END, 0x00, 0x05, 0x01, END]);
        assert!(matches!(decoded[0], Err(LinkError::Malformed { .. })));
    }

    #[test]
    fn test_bad_escape_resyncs() {
        let mut bytes = vec![END, 0x00, ESC, 0x42, END];
        bytes.extend(encode_frame(b"ok"));
        let decoded = decode_all(&bytes);
        assert!(decoded[0].is_err());
        assert_eq!(decoded.last().unwrap().as_ref().unwrap(), &b"ok".to_vec());
    }
}

//! Length-prefixed framing for the binary protocol.
//!
//! Frame layout: `u64` big-endian payload length, then exactly that many
//! payload bytes. Readers live in the loader; this module owns the layout.

use std::io::Write;

/// Size of the frame length header in bytes
pub const FRAME_HEADER_LEN: usize = 8;

/// Write one frame to `w`
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> std::io::Result<()> {
    w.write_all(&(payload.len() as u64).to_be_bytes())?;
    w.write_all(payload)
}

/// Encode one frame into a fresh buffer
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Parse a frame header
pub fn frame_len(header: &[u8; FRAME_HEADER_LEN]) -> u64 {
    u64::from_be_bytes(*header)
}

//! # qrlink-protocol
//!
//! Moves a file across an air-gapped screen-to-camera channel as a sequence of indexed frames,
//! each shown as one QR symbol.
//!
//! ## Wire format
//!
//! ```text
//! [index: u64 BE (8 bytes)][payload: 1..=block_size bytes]
//! ```
//!
//! The raw frame is base64-encoded (standard alphabet, padded) before it is handed to the
//! symbol codec, so the symbol only ever carries printable ASCII.
//!
//! ## Pipelines
//!
//! - [`encoder`]: file → frames → `0.png, 1.png, …` via [`codec::SymbolCodec`]
//! - [`presenter`]: frame images → [`presenter::DisplayDevice`] at a fixed rate
//! - [`receiver`]: [`capture::CaptureDevice`] → detect → [`reassembler::Reassembler`] → file

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::{Cursor, Read};
use xxhash_rust::xxh3::xxh3_64;

pub mod capture;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod layout;
pub mod logging;
pub mod presenter;
pub mod reassembler;
pub mod receiver;

pub use error::{Result, TransferError};

/// Length of the big-endian frame index that prefixes every payload.
pub const INDEX_LEN: usize = 8;

/// Default payload bytes per frame.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// One indexed transport unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub index: u64,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, payload: Vec<u8>) -> Self {
        Frame { index, payload }
    }

    /// Raw wire bytes: `be64(index) ++ payload`.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; INDEX_LEN + self.payload.len()];
        BigEndian::write_u64(&mut buf[..INDEX_LEN], self.index);
        buf[INDEX_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse raw (already base64-decoded) wire bytes.
    pub fn from_wire_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < INDEX_LEN {
            return Err(TransferError::CorruptFrame(format!(
                "{} bytes is shorter than the {}-byte index",
                raw.len(),
                INDEX_LEN
            )));
        }

        let mut cursor = Cursor::new(raw);
        let index = cursor.read_u64::<BigEndian>()?;
        let mut payload = Vec::with_capacity(raw.len() - INDEX_LEN);
        cursor.read_to_end(&mut payload)?;

        Ok(Frame { index, payload })
    }

    /// Alphanumeric-safe form handed to the symbol codec.
    pub fn to_wire(&self) -> String {
        STANDARD.encode(self.to_wire_bytes())
    }
}

/// Encode one frame into its base64 wire form.
pub fn encode_wire(index: u64, payload: &[u8]) -> String {
    Frame::new(index, payload.to_vec()).to_wire()
}

/// Decode the base64 wire form carried by a symbol back into a frame.
pub fn decode_wire(encoded: &[u8]) -> Result<Frame> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| TransferError::CorruptFrame(format!("invalid base64: {}", e)))?;
    Frame::from_wire_bytes(&raw)
}

/// xxh3-64 digest of a whole stream, logged on both ends so an operator can compare them.
pub fn stream_digest(stream_bytes: &[u8]) -> u64 {
    xxh3_64(stream_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        let wire = encode_wire(2, b"HEL");
        let frame = decode_wire(wire.as_bytes()).unwrap();

        assert_eq!(frame.index, 2);
        assert_eq!(frame.payload, b"HEL");
    }

    #[test]
    fn test_wire_is_base64_of_big_endian_index() {
        let frame = Frame::new(1, b"LO".to_vec());
        let raw = frame.to_wire_bytes();

        assert_eq!(&raw[..INDEX_LEN], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&raw[INDEX_LEN..], b"LO");
        assert_eq!(frame.to_wire(), STANDARD.encode(&raw));
        assert_eq!(frame.to_wire(), encode_wire(1, b"LO"));
    }

    #[test]
    fn test_wire_only_alphanumeric_safe_chars() {
        let wire = encode_wire(u64::MAX, &[0xff, 0xfe, 0x00, 0x80]);
        assert!(wire
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let short = STANDARD.encode([0u8; 7]);
        assert!(matches!(
            decode_wire(short.as_bytes()),
            Err(TransferError::CorruptFrame(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_wire(b"not base64!!"),
            Err(TransferError::CorruptFrame(_))
        ));
    }

    #[test]
    fn test_decode_index_only_frame_has_empty_payload() {
        let wire = STANDARD.encode(7u64.to_be_bytes());
        let frame = decode_wire(wire.as_bytes()).unwrap();
        assert_eq!(frame.index, 7);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_stream_digest_is_stable() {
        assert_eq!(stream_digest(b"HELLO"), stream_digest(b"HELLO"));
        assert_ne!(stream_digest(b"HELLO"), stream_digest(b"HELLP"));
    }
}

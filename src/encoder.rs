//! Splitting a source byte stream into indexed frames.
//!
//! `block_size` counts payload bytes only. The 8-byte index is added on top, so a frame built
//! with block size `b` carries at most `8 + b` raw wire bytes.

use std::path::Path;

use tracing::{debug, info};

use crate::{stream_digest, Frame, Result, TransferError, INDEX_LEN};

/// Smallest raw wire frame: the index plus one payload byte.
pub const MIN_WIRE_LEN: usize = INDEX_LEN + 1;

/// Check a payload block size against the minimum wire frame.
pub fn validate_block_size(block_size: usize) -> Result<usize> {
    if block_size.saturating_add(INDEX_LEN) < MIN_WIRE_LEN {
        return Err(TransferError::InvalidConfig(format!(
            "block size {} leaves no room for payload; a wire frame needs at least {} bytes",
            block_size, MIN_WIRE_LEN
        )));
    }
    Ok(block_size)
}

/// Split `source` into frames of at most `block_size` payload bytes, indexed from 0.
///
/// An empty source produces no frames.
pub fn encode_file(source: &[u8], block_size: usize) -> Result<Vec<Frame>> {
    let block_size = validate_block_size(block_size)?;

    let frames: Vec<Frame> = source
        .chunks(block_size)
        .enumerate()
        .map(|(i, chunk)| Frame::new(i as u64, chunk.to_vec()))
        .collect();

    for frame in &frames {
        debug!(
            index = frame.index,
            len = frame.payload.len(),
            "split frame"
        );
    }

    Ok(frames)
}

/// Read a file from disk and split it into frames.
pub fn encode_path(path: &Path, block_size: usize) -> Result<Vec<Frame>> {
    validate_block_size(block_size)?;
    let source = std::fs::read(path)?;

    info!(
        path = %path.display(),
        bytes = source.len(),
        digest = %format!("{:#018x}", stream_digest(&source)),
        "read source file"
    );

    encode_file(&source, block_size)
}

/// Number of frames `encode_file` produces for a source of `source_len` bytes.
pub fn frame_count(source_len: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    source_len.div_ceil(block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_block_size_three() {
        let frames = encode_file(b"HELLO", 3).unwrap();

        assert_eq!(
            frames,
            vec![Frame::new(0, b"HEL".to_vec()), Frame::new(1, b"LO".to_vec())]
        );
    }

    #[test]
    fn test_single_frame_when_source_fits() {
        let data = vec![7u8; 100];
        let frames = encode_file(&data, 1024).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].index, 0);
        assert_eq!(frames[0].payload, data);
    }

    #[test]
    fn test_exact_multiple_has_no_short_tail() {
        let data: Vec<u8> = (0u8..30).collect();
        let frames = encode_file(&data, 10).unwrap();

        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.payload.len() == 10));
        assert_eq!(frame_count(data.len(), 10), 3);
    }

    #[test]
    fn test_empty_source_has_no_frames() {
        assert!(encode_file(&[], 16).unwrap().is_empty());
        assert_eq!(frame_count(0, 16), 0);
    }

    #[test]
    fn test_zero_block_size_is_invalid() {
        assert!(matches!(
            encode_file(b"abc", 0),
            Err(TransferError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_block_size_one_is_minimum() {
        let frames = encode_file(b"ab", 1).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].to_wire_bytes().len(), MIN_WIRE_LEN);
    }

    #[test]
    fn test_encode_path_missing_file() {
        let result = encode_path(Path::new("/definitely/not/here.bin"), 16);
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}

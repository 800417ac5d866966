//! Error types for the qrlink transport.

use thiserror::Error;

/// Everything that can go wrong while encoding, presenting or capturing a transfer.
///
/// Configuration and I/O variants abort a run. `OrderingAnomaly`, `AmbiguousDetection` and
/// `CorruptFrame` are raised during live capture and are only fatal when the session's
/// loss policy asks for it.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Bad block size, frame rate, threshold or symbol settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unreadable source, unwritable destination, missing frame directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Detected symbol does not carry a valid wire frame.
    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    /// Index sequence is not contiguous.
    #[error("ordering anomaly: expected index {expected}, got {actual}")]
    OrderingAnomaly { expected: u64, actual: u64 },

    /// No usable capture device was found.
    #[error("no capture device available")]
    NoCaptureDevice,

    /// More than one symbol was detected in a single sampled image.
    #[error("ambiguous detection: {count} symbols in one image")]
    AmbiguousDetection { count: usize },

    /// Symbol codec failed to render or scan.
    #[error("symbol codec error: {0}")]
    Codec(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using TransferError.
pub type Result<T> = std::result::Result<T, TransferError>;

//! Waveform pipeline error types

use thiserror::Error;

/// Errors raised by buffers, reducers, channel sets and the feed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaveformError {
    /// Read past the current buffer length (caller bug; windowing clamps first)
    #[error("Index {index} out of range for buffer of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Reducer configured with a zero block size
    #[error("Invalid block size: {0} (must be at least 1)")]
    InvalidBlockSize(usize),

    /// A channel with this identifier already exists in the set
    #[error("Channel already registered: {0}")]
    DuplicateChannel(String),

    /// A channel span must be finite with a positive length
    #[error("Invalid range: location {location}, length {length}")]
    InvalidRange { location: f64, length: f64 },

    /// No channel set is registered under this source id
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Opaque failure reported by the decode layer
    #[error("Decode failed: {0}")]
    DecodeFailure(String),

    /// The receiving side of a feed has been dropped
    #[error("Feed receiver disconnected")]
    FeedDisconnected,
}

/// Result type for waveform operations
pub type WaveformResult<T> = Result<T, WaveformError>;

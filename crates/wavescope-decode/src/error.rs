//! Decode error types

use std::path::PathBuf;
use thiserror::Error;
use wavescope_core::WaveformError;

/// Errors that can occur while probing or decoding a media file
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open media file: {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio track found")]
    NoAudioTrack,

    /// Detail windows need the container's frame count
    #[error("Frame count unknown: {0}")]
    UnknownLength(PathBuf),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Waveform pipeline error: {0}")]
    Feed(#[from] WaveformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

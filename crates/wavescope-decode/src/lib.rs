//! Wavescope Decode - background media decoding for waveform display
//!
//! Decodes audio files with symphonia on a named background thread and
//! streams mono samples into a [`wavescope_core::PlotModel`] through its feed.
//!
//! ```ignore
//! let mut plot = PlotModel::<f32>::new(config, Bounds::new(800.0, 120.0));
//! let handle = open_source(&mut plot, "track-1", "song.flac", DecodeOptions::default())?;
//! let frames = pump_until_done(&mut plot, "track-1", handle, Duration::from_millis(2))?;
//! ```

pub mod error;
pub mod loader;
pub mod source;

pub use error::{DecodeError, Result};
pub use loader::{
    detail_window, open_detail, open_source, pump_until_done, reload_detail, reload_source,
    DetailWindow,
};
pub use source::{
    decode_blocking, probe, spawn_decode, DecodeHandle, DecodeOptions, SourceInfo,
    DEFAULT_CHUNK_FRAMES,
};

//! Wavescope Core - streaming waveform data pipeline
//!
//! Decoded samples arrive incrementally from a background decoder and are
//! stored in growable buffers, reduced into fixed-size blocks for overview
//! display, and windowed onto a zoomed/panned view as a bounded set of points.
//!
//! ## Pipeline
//!
//! ```text
//! decoder thread ─► FeedSender ─► Feed ─► ChannelSet ─┬─ raw     SampleBuffer
//!                                                     ├─ max     SampleBuffer
//!                                                     └─ average SampleBuffer
//!                                                              │
//!                                     Viewport (scale, start) ◄┘ ─► GeometryResult
//! ```
//!
//! - **Buffers**: [`SampleBuffer`] grows by doubling and tracks min/max
//! - **Reducers**: [`BlockReducer`] folds raw values into max/average/rms blocks
//! - **Channel sets**: [`ChannelSet`] fans every raw value out to its reducers
//! - **Windowing**: [`compute_geometry`] and [`Viewport`]
//! - **Hand-off**: [`feed`] moves values from producer threads to the owner
//! - **Plot model**: [`PlotModel`] ties sources, feeds and the viewport together

pub mod buffer;
pub mod channel_set;
pub mod config;
pub mod error;
pub mod feed;
pub mod geometry;
pub mod plot;
pub mod reducer;
pub mod types;
pub mod viewport;

pub use buffer::{SampleBuffer, WaveformSource};
pub use channel_set::{ChannelLookup, ChannelSet, SourceState, RAW_CHANNEL};
pub use config::{ReducerConfig, WaveformConfig};
pub use error::{WaveformError, WaveformResult};
pub use feed::{DrainReport, Feed, FeedEvent, FeedSender};
pub use geometry::{compute_geometry, GeometryResult, Point};
pub use plot::PlotModel;
pub use reducer::{BlockReducer, ReducerKind, TrailingBlockPolicy};
pub use types::*;
pub use viewport::Viewport;

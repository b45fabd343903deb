//! Growable sample storage with incremental extrema
//!
//! A [`SampleBuffer`] is append-only while a source is streaming. Reads and
//! writes happen on the same owning context (see [`crate::feed`]), so drawing
//! code can query `len()` and `value_at()` without locking and never observes
//! a half-grown buffer.
//!
//! Capacity doubles when full (with a floor of [`MIN_CAPACITY`]), so appending
//! N samples costs O(log N) reallocations. `growth_count()` exposes that count.

use crate::error::{WaveformError, WaveformResult};
use crate::types::SampleValue;

/// Capacity allocated by the first append into an empty buffer
pub const MIN_CAPACITY: usize = 16;

/// Read-only view of a channel, as consumed by windowing and drawing
///
/// Object-safe so a viewport can read buffers of any storage type.
pub trait WaveformSource {
    /// Stable identifier, e.g. `"track-1.max"`
    fn identifier(&self) -> &str;

    /// Samples currently readable
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical length used to lay out geometry (may exceed `len()` while streaming)
    fn total_count(&self) -> usize;

    /// Smallest value appended so far, `None` while empty
    fn min(&self) -> Option<f64>;

    /// Largest value appended so far, `None` while empty
    fn max(&self) -> Option<f64>;

    /// Value at `index`, failing with `IndexOutOfRange` past `len()`
    fn value_at(&self, index: usize) -> WaveformResult<f64>;
}

/// Growable contiguous sample store
#[derive(Debug, Clone)]
pub struct SampleBuffer<T: SampleValue = f32> {
    identifier: String,
    samples: Vec<T>,
    /// Running (min, max) over every appended sample
    extrema: Option<(f64, f64)>,
    finalized_len: Option<usize>,
    expected_len: Option<usize>,
    /// Raw samples represented by one stored value
    block_size: usize,
    growth_count: usize,
}

impl<T: SampleValue> SampleBuffer<T> {
    /// Create an empty raw buffer (block size 1)
    pub fn new(identifier: impl Into<String>) -> Self {
        Self::with_block_size(identifier, 1)
    }

    /// Create an empty buffer whose values each cover `block_size` raw samples
    pub fn with_block_size(identifier: impl Into<String>, block_size: usize) -> Self {
        Self {
            identifier: identifier.into(),
            samples: Vec::new(),
            extrema: None,
            finalized_len: None,
            expected_len: None,
            block_size: block_size.max(1),
            growth_count: 0,
        }
    }

    /// Append one value, growing storage geometrically when full
    pub fn append(&mut self, value: f64) {
        if self.samples.len() == self.samples.capacity() {
            self.grow();
        }

        let stored = T::from_f64(value);
        let v = stored.to_f64();
        self.extrema = Some(match self.extrema {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        });
        self.samples.push(stored);
    }

    fn grow(&mut self) {
        let target = (self.samples.capacity() * 2).max(MIN_CAPACITY);
        self.samples.reserve_exact(target - self.samples.len());
        self.growth_count += 1;
        log::trace!(
            "SampleBuffer {}: grew to {} slots ({} reallocations)",
            self.identifier,
            self.samples.capacity(),
            self.growth_count
        );
    }

    /// Mark the current length as the final logical length
    ///
    /// Meant to be called once when the source completes. A repeated call
    /// re-assigns the current length.
    pub fn finalize(&mut self) {
        if let Some(previous) = self.finalized_len {
            log::warn!(
                "SampleBuffer {}: finalized twice ({} -> {})",
                self.identifier,
                previous,
                self.samples.len()
            );
        }
        self.finalized_len = Some(self.samples.len());
    }

    /// Record the length the producer expects to reach
    pub fn set_expected_len(&mut self, len: usize) {
        self.expected_len = Some(len);
    }

    /// Drop all samples but keep the allocation
    ///
    /// Extrema, finalized length and the expected-length hint are cleared too.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.extrema = None;
        self.finalized_len = None;
        self.expected_len = None;
    }

    /// Value at `index`, failing past `len()`
    pub fn value_at(&self, index: usize) -> WaveformResult<f64> {
        self.get(index).ok_or(WaveformError::IndexOutOfRange {
            index,
            len: self.samples.len(),
        })
    }

    /// Value at `index`, or `None` past `len()`
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.samples.get(index).map(|v| v.to_f64())
    }

    /// Iterate over stored values in append order
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|v| v.to_f64())
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Allocated slots
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Number of reallocations performed so far
    pub fn growth_count(&self) -> usize {
        self.growth_count
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn finalized_len(&self) -> Option<usize> {
        self.finalized_len
    }

    pub fn expected_len(&self) -> Option<usize> {
        self.expected_len
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_len.is_some()
    }

    /// Logical length: finalized length, else the expected length, else `len()`
    pub fn total_count(&self) -> usize {
        self.finalized_len
            .or(self.expected_len)
            .unwrap_or(self.samples.len())
    }

    pub fn min(&self) -> Option<f64> {
        self.extrema.map(|(lo, _)| lo)
    }

    pub fn max(&self) -> Option<f64> {
        self.extrema.map(|(_, hi)| hi)
    }
}

impl<T: SampleValue> WaveformSource for SampleBuffer<T> {
    fn identifier(&self) -> &str {
        SampleBuffer::identifier(self)
    }

    fn len(&self) -> usize {
        SampleBuffer::len(self)
    }

    fn total_count(&self) -> usize {
        SampleBuffer::total_count(self)
    }

    fn min(&self) -> Option<f64> {
        SampleBuffer::min(self)
    }

    fn max(&self) -> Option<f64> {
        SampleBuffer::max(self)
    }

    fn value_at(&self, index: usize) -> WaveformResult<f64> {
        SampleBuffer::value_at(self, index)
    }
}

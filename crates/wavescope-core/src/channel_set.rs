//! One raw channel plus its reduced channels for a single source
//!
//! Identifiers are `"<source>.raw"` for the raw buffer and `"<source>.<name>"`
//! for each derived buffer. Derived buffer index `i` with block size `b`
//! covers raw samples `[i*b, i*b + b)`.

use crate::buffer::{SampleBuffer, WaveformSource};
use crate::error::{WaveformError, WaveformResult};
use crate::reducer::{reduced_len, BlockReducer, ReducerKind, TrailingBlockPolicy};
use crate::types::SampleValue;

/// Suffix of the raw channel identifier
pub const RAW_CHANNEL: &str = "raw";

/// Resolves channel identifiers to readable channels
pub trait ChannelLookup {
    fn channel(&self, identifier: &str) -> Option<&dyn WaveformSource>;
}

/// Streaming state of a channel set's source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState {
    Streaming,
    Complete,
    /// The decode layer failed; samples appended so far remain valid
    Failed(String),
}

/// A reducer together with the buffer it feeds
#[derive(Debug, Clone)]
struct DerivedChannel<T: SampleValue> {
    name: String,
    reducer: BlockReducer,
    buffer: SampleBuffer<T>,
}

/// Raw buffer plus N derived buffers, fed by fan-out
#[derive(Debug, Clone)]
pub struct ChannelSet<T: SampleValue = f32> {
    source_id: String,
    raw: SampleBuffer<T>,
    /// Registration order is the fold order
    derived: Vec<DerivedChannel<T>>,
    trailing_policy: TrailingBlockPolicy,
    state: SourceState,
}

impl<T: SampleValue> ChannelSet<T> {
    /// Create a set with an empty raw channel and no reducers
    pub fn new(source_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        let raw = SampleBuffer::new(format!("{}.{}", source_id, RAW_CHANNEL));
        Self {
            source_id,
            raw,
            derived: Vec::new(),
            trailing_policy: TrailingBlockPolicy::default(),
            state: SourceState::Streaming,
        }
    }

    /// Set how partial trailing blocks are handled on completion
    pub fn with_trailing_policy(mut self, policy: TrailingBlockPolicy) -> Self {
        self.trailing_policy = policy;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn state(&self) -> &SourceState {
        &self.state
    }

    pub fn trailing_policy(&self) -> TrailingBlockPolicy {
        self.trailing_policy
    }

    /// Identifier a derived channel named `name` gets in this set
    pub fn identifier_for(&self, name: &str) -> String {
        format!("{}.{}", self.source_id, name)
    }

    /// Register a reducer and its derived buffer, returning the channel identifier
    ///
    /// Raw samples already in the set are folded into the new reducer first.
    pub fn add_reducer(
        &mut self,
        name: &str,
        kind: ReducerKind,
        block_size: usize,
    ) -> WaveformResult<String> {
        let mut reducer = BlockReducer::new(kind, block_size)?;
        let identifier = self.identifier_for(name);

        if name == RAW_CHANNEL || self.derived.iter().any(|d| d.name == name) {
            return Err(WaveformError::DuplicateChannel(identifier));
        }

        let mut buffer = SampleBuffer::with_block_size(identifier.clone(), block_size);
        if let Some(expected) = self.raw.expected_len() {
            buffer.set_expected_len(reduced_len(expected, block_size, self.trailing_policy));
        }

        // Late registration: replay raw history so block i still covers [i*b, i*b + b)
        for value in self.raw.iter() {
            if let Some(reduced) = reducer.push(value) {
                buffer.append(reduced);
            }
        }
        if self.state == SourceState::Complete {
            if let Some(reduced) = reducer.finish(self.trailing_policy) {
                buffer.append(reduced);
            }
            buffer.finalize();
        }

        log::debug!(
            "ChannelSet {}: added {:?} reducer '{}' (block size {})",
            self.source_id,
            kind,
            name,
            block_size
        );

        self.derived.push(DerivedChannel {
            name: name.to_string(),
            reducer,
            buffer,
        });
        Ok(identifier)
    }

    /// Append a raw value and fold it into every reducer in registration order
    pub fn handle_raw_value(&mut self, value: f64) {
        self.raw.append(value);
        for channel in &mut self.derived {
            if let Some(reduced) = channel.reducer.push(value) {
                channel.buffer.append(reduced);
            }
        }
    }

    /// Batched form of [`handle_raw_value`](Self::handle_raw_value)
    pub fn handle_raw_values(&mut self, values: &[f64]) {
        for &value in values {
            self.handle_raw_value(value);
        }
    }

    /// Announce the raw length the source expects to produce
    ///
    /// Derived buffers get the matching reduced length so geometry can be laid
    /// out for the whole track while it is still decoding.
    pub fn set_expected_raw_len(&mut self, len: usize) {
        self.raw.set_expected_len(len);
        for channel in &mut self.derived {
            let reduced = reduced_len(len, channel.reducer.block_size(), self.trailing_policy);
            channel.buffer.set_expected_len(reduced);
        }
    }

    /// Finalize every buffer, flushing partial blocks per the trailing policy
    pub fn complete(&mut self) {
        if self.state == SourceState::Complete {
            log::debug!("ChannelSet {}: already complete", self.source_id);
            return;
        }

        self.raw.finalize();
        for channel in &mut self.derived {
            if let Some(reduced) = channel.reducer.finish(self.trailing_policy) {
                channel.buffer.append(reduced);
            }
            channel.buffer.finalize();
        }
        self.state = SourceState::Complete;

        log::info!(
            "ChannelSet {}: complete ({} raw samples, {} derived channels)",
            self.source_id,
            self.raw.len(),
            self.derived.len()
        );
    }

    /// Record a decode failure; buffers keep their partial contents
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!(
            "ChannelSet {}: source failed after {} samples: {}",
            self.source_id,
            self.raw.len(),
            reason
        );
        self.state = SourceState::Failed(reason);
    }

    /// Clear all buffers and reducer state for a fresh decode
    pub fn reset(&mut self) {
        self.raw.reset();
        for channel in &mut self.derived {
            channel.reducer.clear();
            channel.buffer.reset();
        }
        self.state = SourceState::Streaming;
    }

    pub fn raw(&self) -> &SampleBuffer<T> {
        &self.raw
    }

    /// Derived buffer registered under `name`
    pub fn derived(&self, name: &str) -> Option<&SampleBuffer<T>> {
        self.derived
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.buffer)
    }

    /// Any buffer of this set by full identifier
    pub fn buffer(&self, identifier: &str) -> Option<&SampleBuffer<T>> {
        if self.raw.identifier() == identifier {
            return Some(&self.raw);
        }
        self.derived
            .iter()
            .find(|d| d.buffer.identifier() == identifier)
            .map(|d| &d.buffer)
    }

    /// Identifier of the first derived channel reduced with `kind`
    pub fn identifier_for_kind(&self, kind: ReducerKind) -> Option<&str> {
        self.derived
            .iter()
            .find(|d| d.reducer.kind() == kind)
            .map(|d| d.buffer.identifier())
    }

    /// All channel identifiers, raw first, then in registration order
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.raw.identifier())
            .chain(self.derived.iter().map(|d| d.buffer.identifier()))
    }

    /// Whether `identifier` belongs to this set
    pub fn owns(&self, identifier: &str) -> bool {
        self.buffer(identifier).is_some()
    }
}

impl<T: SampleValue> ChannelLookup for ChannelSet<T> {
    fn channel(&self, identifier: &str) -> Option<&dyn WaveformSource> {
        self.buffer(identifier).map(|b| b as &dyn WaveformSource)
    }
}

impl<T: SampleValue> ChannelLookup for [ChannelSet<T>] {
    fn channel(&self, identifier: &str) -> Option<&dyn WaveformSource> {
        self.iter().find_map(|set| set.channel(identifier))
    }
}

impl<T: SampleValue> ChannelLookup for Vec<ChannelSet<T>> {
    fn channel(&self, identifier: &str) -> Option<&dyn WaveformSource> {
        self.as_slice().channel(identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> ChannelSet<f64> {
        let mut set = ChannelSet::new("track");
        set.add_reducer("max", ReducerKind::Max, 4).unwrap();
        set.add_reducer("average", ReducerKind::Average, 2).unwrap();
        set
    }

    #[test]
    fn test_identifiers() {
        let set = track();
        let ids: Vec<&str> = set.identifiers().collect();
        assert_eq!(ids, vec!["track.raw", "track.max", "track.average"]);
        assert_eq!(set.identifier_for_kind(ReducerKind::Max), Some("track.max"));
        assert_eq!(set.identifier_for_kind(ReducerKind::Rms), None);
        assert!(set.owns("track.average"));
        assert!(!set.owns("other.max"));
    }

    #[test]
    fn test_add_reducer_errors() {
        let mut set = track();
        assert_eq!(
            set.add_reducer("max", ReducerKind::Rms, 8),
            Err(WaveformError::DuplicateChannel("track.max".to_string()))
        );
        assert_eq!(
            set.add_reducer("raw", ReducerKind::Max, 8),
            Err(WaveformError::DuplicateChannel("track.raw".to_string()))
        );
        assert_eq!(
            set.add_reducer("rms", ReducerKind::Rms, 0),
            Err(WaveformError::InvalidBlockSize(0))
        );
    }

    #[test]
    fn test_fan_out_and_block_sizes() {
        let mut set = track();
        set.handle_raw_values(&[1.0, -3.0, 2.0, 0.0, 5.0]);

        assert_eq!(set.raw().len(), 5);
        let max = set.derived("max").unwrap();
        assert_eq!(max.block_size(), 4);
        assert_eq!(max.iter().collect::<Vec<_>>(), vec![3.0]);

        let avg = set.derived("average").unwrap();
        assert_eq!(avg.block_size(), 2);
        assert_eq!(avg.iter().collect::<Vec<_>>(), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_complete_flushes_trailing_blocks() {
        let mut set = track();
        set.handle_raw_values(&[1.0, -3.0, 2.0, 0.0, 5.0]);
        set.complete();

        assert_eq!(set.state(), &SourceState::Complete);
        assert_eq!(set.raw().finalized_len(), Some(5));

        let max = set.derived("max").unwrap();
        assert_eq!(max.iter().collect::<Vec<_>>(), vec![3.0, 5.0]);
        assert_eq!(max.finalized_len(), Some(2));

        let avg = set.derived("average").unwrap();
        assert_eq!(avg.iter().collect::<Vec<_>>(), vec![-1.0, 1.0, 5.0]);

        // Second completion is a no-op
        set.complete();
        assert_eq!(set.derived("max").unwrap().len(), 2);
    }

    #[test]
    fn test_complete_with_discard_policy() {
        let mut set: ChannelSet<f64> =
            ChannelSet::new("track").with_trailing_policy(TrailingBlockPolicy::Discard);
        set.add_reducer("max", ReducerKind::Max, 4).unwrap();
        set.set_expected_raw_len(5);
        assert_eq!(set.derived("max").unwrap().total_count(), 1);

        set.handle_raw_values(&[1.0, -3.0, 2.0, 0.0, 5.0]);
        set.complete();
        assert_eq!(set.derived("max").unwrap().iter().collect::<Vec<_>>(), vec![3.0]);
    }

    #[test]
    fn test_expected_len_propagates() {
        let mut set = track();
        set.set_expected_raw_len(1001);
        assert_eq!(set.raw().total_count(), 1001);
        assert_eq!(set.derived("max").unwrap().total_count(), 251);
        assert_eq!(set.derived("average").unwrap().total_count(), 501);

        // Reducers registered later pick up the hint too
        set.add_reducer("rms", ReducerKind::Rms, 10).unwrap();
        assert_eq!(set.derived("rms").unwrap().total_count(), 101);
    }

    #[test]
    fn test_late_reducer_stays_aligned_with_raw() {
        let mut set: ChannelSet<f64> = ChannelSet::new("late");
        set.handle_raw_values(&[1.0, 2.0, 3.0]);
        set.add_reducer("max", ReducerKind::Max, 2).unwrap();

        // Block 0 covers raw [0, 2) even though it was registered after raw 3
        assert_eq!(set.derived("max").unwrap().iter().collect::<Vec<_>>(), vec![2.0]);

        set.handle_raw_value(4.0);
        assert_eq!(set.derived("max").unwrap().iter().collect::<Vec<_>>(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_reducer_added_after_completion_is_finalized() {
        let mut set: ChannelSet<f64> = ChannelSet::new("done");
        set.handle_raw_values(&[1.0, -2.0, 3.0, 4.0, -5.0]);
        set.complete();

        set.add_reducer("average", ReducerKind::Average, 2).unwrap();
        let avg = set.derived("average").unwrap();
        assert_eq!(avg.iter().collect::<Vec<_>>(), vec![-0.5, 3.5, -5.0]);
        assert_eq!(avg.finalized_len(), Some(3));
    }

    #[test]
    fn test_failure_keeps_partial_samples() {
        let mut set = track();
        set.handle_raw_values(&[0.5, 0.25, 0.125]);
        set.fail("corrupt packet");

        assert_eq!(set.state(), &SourceState::Failed("corrupt packet".to_string()));
        assert_eq!(set.raw().len(), 3);
        assert_eq!(set.channel("track.raw").unwrap().value_at(2).unwrap(), 0.125);
    }

    #[test]
    fn test_reset_for_new_decode() {
        let mut set = track();
        set.handle_raw_values(&[1.0, 1.0, 1.0]);
        set.complete();

        set.reset();
        assert_eq!(set.state(), &SourceState::Streaming);
        assert!(set.raw().is_empty());
        assert!(set.derived("max").unwrap().is_empty());

        // No leftover partial block from before the reset
        set.handle_raw_values(&[2.0, 2.0]);
        assert_eq!(set.derived("average").unwrap().iter().collect::<Vec<_>>(), vec![2.0]);
    }

    #[test]
    fn test_lookup_across_sets() {
        let sets = vec![track(), {
            let mut other: ChannelSet<f64> = ChannelSet::new("other");
            other.add_reducer("max", ReducerKind::Max, 2).unwrap();
            other
        }];

        assert!(sets.channel("other.max").is_some());
        assert!(sets.channel("track.average").is_some());
        assert!(sets.channel("missing.max").is_none());
    }
}

//! Block reducers: downsample a raw value stream into derived channels
//!
//! Each reducer folds raw values into an accumulator and emits one reduced
//! value every `block_size` folds. The kinds form a closed set; adding one
//! means adding a variant and its fold/flush arms here.

use serde::{Deserialize, Serialize};

use crate::error::{WaveformError, WaveformResult};

/// Reduction applied to each block of raw samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReducerKind {
    /// Peak absolute value (waveforms are drawn mirrored around zero)
    Max,
    /// Arithmetic mean
    Average,
    /// Root mean square
    Rms,
}

impl ReducerKind {
    /// Default channel name for this kind, used in identifiers like `"track.max"`
    pub fn name(&self) -> &'static str {
        match self {
            ReducerKind::Max => "max",
            ReducerKind::Average => "average",
            ReducerKind::Rms => "rms",
        }
    }
}

/// What to do with a partial block when the stream completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingBlockPolicy {
    /// Emit the partial block as a final short block
    #[default]
    Flush,
    /// Drop the partial block
    Discard,
}

/// Kind-specific accumulator state
#[derive(Debug, Clone, Copy)]
enum Accumulator {
    Max { peak: f64 },
    Average { sum: f64 },
    Rms { sum_squares: f64 },
}

impl Accumulator {
    fn empty(kind: ReducerKind) -> Self {
        match kind {
            ReducerKind::Max => Accumulator::Max { peak: 0.0 },
            ReducerKind::Average => Accumulator::Average { sum: 0.0 },
            ReducerKind::Rms => Accumulator::Rms { sum_squares: 0.0 },
        }
    }

    #[inline]
    fn fold(&mut self, value: f64) {
        match self {
            Accumulator::Max { peak } => *peak = peak.max(value.abs()),
            Accumulator::Average { sum } => *sum += value,
            Accumulator::Rms { sum_squares } => *sum_squares += value * value,
        }
    }

    fn value(&self, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        match *self {
            Accumulator::Max { peak } => peak,
            Accumulator::Average { sum } => sum / count as f64,
            Accumulator::Rms { sum_squares } => (sum_squares / count as f64).sqrt(),
        }
    }
}

/// Folds raw values into one reduced value per `block_size` values
#[derive(Debug, Clone)]
pub struct BlockReducer {
    kind: ReducerKind,
    block_size: usize,
    accumulator: Accumulator,
    /// Values folded since the last flush
    count: usize,
}

impl BlockReducer {
    /// Create a reducer; a zero block size is rejected
    pub fn new(kind: ReducerKind, block_size: usize) -> WaveformResult<Self> {
        if block_size == 0 {
            return Err(WaveformError::InvalidBlockSize(block_size));
        }
        Ok(Self {
            kind,
            block_size,
            accumulator: Accumulator::empty(kind),
            count: 0,
        })
    }

    pub fn kind(&self) -> ReducerKind {
        self.kind
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Values folded into the current, not yet emitted block
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Fold one value into the current block
    #[inline]
    pub fn fold(&mut self, value: f64) {
        self.accumulator.fold(value);
        self.count += 1;
    }

    /// Reduce the current block and reset the accumulator
    ///
    /// An empty block reduces to 0.
    pub fn flush(&mut self) -> f64 {
        let value = self.accumulator.value(self.count);
        self.accumulator = Accumulator::empty(self.kind);
        self.count = 0;
        value
    }

    /// Fold a value and, once the block is full, emit its reduced value
    #[inline]
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.fold(value);
        if self.count == self.block_size {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Handle the end of the stream
    ///
    /// Returns the reduced partial block under [`TrailingBlockPolicy::Flush`],
    /// `None` when there is nothing pending or the policy discards it.
    pub fn finish(&mut self, policy: TrailingBlockPolicy) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let value = self.flush();
        match policy {
            TrailingBlockPolicy::Flush => Some(value),
            TrailingBlockPolicy::Discard => None,
        }
    }

    /// Forget any partially accumulated block
    pub fn clear(&mut self) {
        self.accumulator = Accumulator::empty(self.kind);
        self.count = 0;
    }
}

/// Number of reduced values a stream of `raw_len` samples produces
pub fn reduced_len(raw_len: usize, block_size: usize, policy: TrailingBlockPolicy) -> usize {
    let block_size = block_size.max(1);
    match policy {
        TrailingBlockPolicy::Flush => raw_len.div_ceil(block_size),
        TrailingBlockPolicy::Discard => raw_len / block_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(reducer: &mut BlockReducer, values: &[f64], policy: TrailingBlockPolicy) -> Vec<f64> {
        let mut out: Vec<f64> = values.iter().filter_map(|&v| reducer.push(v)).collect();
        out.extend(reducer.finish(policy));
        out
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let err = BlockReducer::new(ReducerKind::Max, 0).unwrap_err();
        assert_eq!(err, WaveformError::InvalidBlockSize(0));
    }

    #[test]
    fn test_max_emits_block_peaks() {
        // blockSize 4, k = 3 full blocks, r = 2 trailing values
        let values = [
            0.1, -0.9, 0.3, 0.2, // peak 0.9
            0.5, 0.4, -0.2, 0.0, // peak 0.5
            -0.1, 0.05, 0.7, 0.6, // peak 0.7
            -0.3, 0.25, // trailing, peak 0.3
        ];

        let mut reducer = BlockReducer::new(ReducerKind::Max, 4).unwrap();
        let flushed = run(&mut reducer, &values, TrailingBlockPolicy::Flush);
        assert_eq!(flushed, vec![0.9, 0.5, 0.7, 0.3]);

        let mut reducer = BlockReducer::new(ReducerKind::Max, 4).unwrap();
        let discarded = run(&mut reducer, &values, TrailingBlockPolicy::Discard);
        assert_eq!(discarded, vec![0.9, 0.5, 0.7]);
    }

    #[test]
    fn test_max_block_count_matches_formula() {
        for block_size in 1..9 {
            for total in 0..40 {
                let values: Vec<f64> = (0..total).map(|i| (i % 7) as f64 - 3.0).collect();

                let mut reducer = BlockReducer::new(ReducerKind::Max, block_size).unwrap();
                let out = run(&mut reducer, &values, TrailingBlockPolicy::Flush);
                assert_eq!(out.len(), reduced_len(total, block_size, TrailingBlockPolicy::Flush));

                for (block, &peak) in values.chunks(block_size).zip(out.iter()) {
                    let expected = block.iter().map(|v| v.abs()).fold(0.0, f64::max);
                    assert_eq!(peak, expected);
                }

                let mut reducer = BlockReducer::new(ReducerKind::Max, block_size).unwrap();
                let out = run(&mut reducer, &values, TrailingBlockPolicy::Discard);
                assert_eq!(out.len(), total / block_size);
            }
        }
    }

    #[test]
    fn test_average_and_empty_flush() {
        let mut reducer = BlockReducer::new(ReducerKind::Average, 3).unwrap();
        let out = run(&mut reducer, &[1.0, 2.0, 6.0, -4.0], TrailingBlockPolicy::Flush);
        assert_eq!(out, vec![3.0, -4.0]);

        assert_eq!(reducer.pending(), 0);
        assert_eq!(reducer.flush(), 0.0);
    }

    #[test]
    fn test_rms() {
        let mut reducer = BlockReducer::new(ReducerKind::Rms, 2).unwrap();
        assert_eq!(reducer.push(3.0), None);
        assert_eq!(reducer.push(-4.0), Some((12.5f64).sqrt()));
    }

    #[test]
    fn test_accumulator_resets_after_each_block() {
        let mut reducer = BlockReducer::new(ReducerKind::Max, 2).unwrap();
        assert_eq!(reducer.push(5.0), None);
        assert_eq!(reducer.push(1.0), Some(5.0));
        assert_eq!(reducer.pending(), 0);
        assert_eq!(reducer.push(0.5), None);
        assert_eq!(reducer.push(0.25), Some(0.5));
    }

    #[test]
    fn test_finish_without_pending_block() {
        let mut reducer = BlockReducer::new(ReducerKind::Average, 2).unwrap();
        reducer.push(1.0);
        reducer.push(1.0);
        assert_eq!(reducer.finish(TrailingBlockPolicy::Flush), None);
    }

    #[test]
    fn test_kind_names_and_serde() {
        assert_eq!(ReducerKind::Max.name(), "max");
        assert_eq!(ReducerKind::Average.name(), "average");
        let yaml = serde_yaml::to_string(&ReducerKind::Rms).unwrap();
        assert_eq!(yaml.trim(), "rms");
        let policy: TrailingBlockPolicy = serde_yaml::from_str("discard").unwrap();
        assert_eq!(policy, TrailingBlockPolicy::Discard);
    }
}

//! Single-writer hand-off from decode threads to the owning context
//!
//! Producers never touch buffers. They push events into a bounded crossbeam
//! channel through a [`FeedSender`]; the context that owns the
//! [`ChannelSet`] drains them with [`Feed::drain_into`] (typically once per
//! UI tick). All appends, growth and min/max updates therefore happen on one
//! thread, and readers on that thread always see a consistent snapshot.
//!
//! ```text
//! decode thread ──FeedSender──► [bounded channel] ──drain_into──► ChannelSet
//!                                                   (owning context)
//! ```
//!
//! ## Superseding a decode
//!
//! [`Feed::restart`] bumps the feed's generation. Events already queued by the
//! previous producer still arrive but are discarded on drain, and the old
//! sender reports [`FeedSender::is_abandoned`] so its thread can stop early.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use crate::channel_set::ChannelSet;
use crate::error::{WaveformError, WaveformResult};
use crate::types::SampleValue;

/// Default channel capacity in events
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Event pushed by a producer
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Decoded raw values, in stream order
    Values(Vec<f64>),
    /// Total raw length the producer expects to deliver
    ExpectedLen(usize),
    /// The stream ended normally
    Complete,
    /// The stream failed; values delivered so far stay valid
    Failed(String),
}

#[derive(Debug)]
struct Envelope {
    generation: u64,
    event: FeedEvent,
}

/// Producer handle, cheap to clone and safe to move to another thread
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: Sender<Envelope>,
    generation: u64,
    current: Arc<AtomicU64>,
}

impl FeedSender {
    /// Push a single raw value
    pub fn on_raw_value(&self, value: f64) -> WaveformResult<()> {
        self.send(FeedEvent::Values(vec![value]))
    }

    /// Push a batch of raw values
    pub fn on_raw_values(&self, values: Vec<f64>) -> WaveformResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.send(FeedEvent::Values(values))
    }

    /// Announce the total raw length once it is known
    pub fn announce_len(&self, len: usize) -> WaveformResult<()> {
        self.send(FeedEvent::ExpectedLen(len))
    }

    /// Signal the end of the stream
    pub fn on_complete(&self) -> WaveformResult<()> {
        self.send(FeedEvent::Complete)
    }

    /// Signal a decode failure
    pub fn on_failure(&self, reason: impl Into<String>) -> WaveformResult<()> {
        self.send(FeedEvent::Failed(reason.into()))
    }

    /// Whether the feed has been restarted since this sender was created
    pub fn is_abandoned(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Blocks while the channel is full
    fn send(&self, event: FeedEvent) -> WaveformResult<()> {
        if self.is_abandoned() {
            log::trace!("FeedSender: dropping event from abandoned generation {}", self.generation);
            return Ok(());
        }
        self.tx
            .send(Envelope {
                generation: self.generation,
                event,
            })
            .map_err(|_| WaveformError::FeedDisconnected)
    }
}

/// Outcome of one [`Feed::drain_into`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Events applied to the channel set
    pub events: usize,
    /// Raw values appended
    pub values: usize,
    /// Events discarded because they belong to an abandoned generation
    pub stale: usize,
    /// A completion event was applied
    pub completed: bool,
    /// A failure event was applied
    pub failure: Option<WaveformError>,
}

impl DrainReport {
    /// Whether the drain changed anything
    pub fn is_empty(&self) -> bool {
        self.events == 0
    }
}

/// Receiving side of the hand-off, owned by the context that owns the buffers
#[derive(Debug)]
pub struct Feed {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    generation: Arc<AtomicU64>,
}

impl Feed {
    /// Create a feed holding at most `capacity` undrained events
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sender for the current generation
    pub fn sender(&self) -> FeedSender {
        FeedSender {
            tx: self.tx.clone(),
            generation: self.generation(),
            current: Arc::clone(&self.generation),
        }
    }

    /// Abandon all existing senders and return one for a new generation
    pub fn restart(&self) -> FeedSender {
        let previous = self.generation.fetch_add(1, Ordering::AcqRel);
        log::info!("Feed: restarted (generation {} -> {})", previous, previous + 1);
        self.sender()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Events waiting to be drained (including stale ones)
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Apply up to `budget` queued events to `set`
    ///
    /// Never blocks. Stale events are discarded and do not count against the
    /// budget.
    pub fn drain_into<T: SampleValue>(&self, set: &mut ChannelSet<T>, budget: usize) -> DrainReport {
        let current = self.generation();
        let mut report = DrainReport::default();

        while report.events < budget {
            // The feed holds a sender itself, so an error here only means empty
            let Ok(envelope) = self.rx.try_recv() else {
                break;
            };

            if envelope.generation != current {
                report.stale += 1;
                continue;
            }

            report.events += 1;
            match envelope.event {
                FeedEvent::Values(values) => {
                    report.values += values.len();
                    set.handle_raw_values(&values);
                }
                FeedEvent::ExpectedLen(len) => set.set_expected_raw_len(len),
                FeedEvent::Complete => {
                    set.complete();
                    report.completed = true;
                }
                FeedEvent::Failed(reason) => {
                    set.fail(reason.clone());
                    report.failure = Some(WaveformError::DecodeFailure(reason));
                }
            }
        }

        if report.stale > 0 {
            log::warn!(
                "Feed {}: discarded {} events from abandoned generations",
                set.source_id(),
                report.stale
            );
        }
        if !report.is_empty() {
            log::debug!(
                "Feed {}: applied {} events ({} values)",
                set.source_id(),
                report.events,
                report.values
            );
        }

        report
    }
}

impl Default for Feed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

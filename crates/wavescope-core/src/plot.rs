//! Plot model: owns channel sets, their feeds and the shared viewport
//!
//! The plot model is the single owner of every buffer. Producers get a
//! [`FeedSender`] from [`PlotModel::add_source`]; the owning context calls
//! [`PlotModel::pump`] regularly (e.g. from a UI tick) to apply queued values
//! and publish geometry for the bound channels.
//!
//! ```ignore
//! let mut plot = PlotModel::<f32>::new(WaveformConfig::default(), Bounds::new(800.0, 120.0));
//! let sender = plot.add_source("track-1", Some(total_frames))?;
//! plot.bind("track-1.max");
//! plot.on_geometry(|id, geometry| redraw(id, geometry));
//! spawn_decoder(sender);
//!
//! // every tick:
//! plot.pump();
//! ```
//!
//! ## Detail channels
//!
//! Whole-track reducers are sized for the fully zoomed-out view. When zoomed
//! in far enough, a host re-decodes the visible slice into a detail source
//! (see [`PlotModel::add_detail_source`]) in response to
//! [`PlotModel::on_view_changed`]. Detail channels are bound with the span they
//! cover and draw aligned with the whole-track channels.

use crate::buffer::WaveformSource;
use crate::channel_set::{ChannelLookup, ChannelSet};
use crate::config::WaveformConfig;
use crate::error::{WaveformError, WaveformResult};
use crate::feed::{Feed, FeedSender};
use crate::geometry::{GeometryResult, Point};
use crate::types::{Bounds, DataRange, SampleValue};
use crate::viewport::Viewport;

/// Called with a channel identifier whenever its geometry changes
pub type GeometryCallback = Box<dyn FnMut(&str, &GeometryResult) + Send>;

/// Called once per source when its stream completes or fails
pub type CompletionCallback = Box<dyn FnMut(&str, WaveformResult<()>) + Send>;

/// Called with the visible track range after the view changed
pub type ViewCallback = Box<dyn FnMut(DataRange) + Send>;

#[derive(Debug)]
struct SourceFeed {
    feed: Feed,
    /// Completion or failure already reported
    finished: bool,
    /// Track range a detail source covers
    span: Option<DataRange>,
}

/// Owner of all channel sets bound to one viewport
pub struct PlotModel<T: SampleValue = f32> {
    config: WaveformConfig,
    /// Parallel to `feeds`
    sets: Vec<ChannelSet<T>>,
    feeds: Vec<SourceFeed>,
    viewport: Viewport,
    on_geometry: Option<GeometryCallback>,
    on_complete: Option<CompletionCallback>,
    on_view_changed: Option<ViewCallback>,
}

impl<T: SampleValue> PlotModel<T> {
    pub fn new(config: WaveformConfig, bounds: Bounds) -> Self {
        let viewport = Viewport::new(bounds)
            .with_max_scale(config.max_scale)
            .with_epsilon(config.boundary_epsilon);
        Self {
            config,
            sets: Vec::new(),
            feeds: Vec::new(),
            viewport,
            on_geometry: None,
            on_complete: None,
            on_view_changed: None,
        }
    }

    pub fn config(&self) -> &WaveformConfig {
        &self.config
    }

    /// Register a geometry listener (replaces any previous one)
    pub fn on_geometry<F>(&mut self, callback: F)
    where
        F: FnMut(&str, &GeometryResult) + Send + 'static,
    {
        self.on_geometry = Some(Box::new(callback));
    }

    /// Register a completion listener (replaces any previous one)
    pub fn on_complete<F>(&mut self, callback: F)
    where
        F: FnMut(&str, WaveformResult<()>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
    }

    /// Register a view listener (replaces any previous one)
    ///
    /// Fired by [`set_view`](Self::set_view), [`zoom_at`](Self::zoom_at) and
    /// [`pan_by`](Self::pan_by) when the clamped view actually moved.
    pub fn on_view_changed<F>(&mut self, callback: F)
    where
        F: FnMut(DataRange) + Send + 'static,
    {
        self.on_view_changed = Some(Box::new(callback));
    }

    fn build_set(&self, source_id: &str, expected_len: Option<usize>) -> WaveformResult<ChannelSet<T>> {
        let mut set = ChannelSet::new(source_id).with_trailing_policy(self.config.trailing_block);
        if let Some(len) = expected_len {
            set.set_expected_raw_len(len);
        }
        for reducer in &self.config.reducers {
            let block_size = reducer.resolve_block_size(expected_len, self.config.points_on_plot);
            set.add_reducer(&reducer.name, reducer.kind, block_size)?;
        }
        Ok(set)
    }

    fn index_of(&self, source_id: &str) -> Option<usize> {
        self.sets.iter().position(|s| s.source_id() == source_id)
    }

    /// Create a channel set with the configured reducers and return its producer handle
    ///
    /// `expected_len` is the raw length the producer expects to deliver, if
    /// known. It sizes automatic reducer blocks and lets geometry span the
    /// whole track while decoding.
    pub fn add_source(
        &mut self,
        source_id: &str,
        expected_len: Option<usize>,
    ) -> WaveformResult<FeedSender> {
        self.insert_source(source_id, None, expected_len)
    }

    /// Like [`add_source`](Self::add_source) for a source covering only `span` of the track
    ///
    /// `expected_len` is the length of the slice, so automatic reducer blocks
    /// give `points_on_plot` values across the span.
    pub fn add_detail_source(
        &mut self,
        source_id: &str,
        span: DataRange,
        expected_len: Option<usize>,
    ) -> WaveformResult<FeedSender> {
        check_span(span)?;
        self.insert_source(source_id, Some(span), expected_len)
    }

    fn insert_source(
        &mut self,
        source_id: &str,
        span: Option<DataRange>,
        expected_len: Option<usize>,
    ) -> WaveformResult<FeedSender> {
        if self.index_of(source_id).is_some() {
            return Err(WaveformError::DuplicateChannel(source_id.to_string()));
        }

        let set = self.build_set(source_id, expected_len)?;
        let feed = Feed::new(self.config.feed_capacity);
        let sender = feed.sender();

        log::info!(
            "PlotModel: added source {} ({} channels, expected {:?} samples, span {:?})",
            source_id,
            set.identifiers().count(),
            expected_len,
            span
        );

        self.sets.push(set);
        self.feeds.push(SourceFeed {
            feed,
            finished: false,
            span,
        });
        Ok(sender)
    }

    /// Start a fresh decode for an existing source
    ///
    /// Buffers are rebuilt empty and every previously issued sender for this
    /// source is abandoned.
    pub fn restart_source(
        &mut self,
        source_id: &str,
        expected_len: Option<usize>,
    ) -> WaveformResult<FeedSender> {
        let index = self
            .index_of(source_id)
            .ok_or_else(|| WaveformError::UnknownSource(source_id.to_string()))?;

        self.sets[index] = self.build_set(source_id, expected_len)?;
        let source = &mut self.feeds[index];
        source.finished = false;
        let sender = source.feed.restart();

        self.refresh();
        Ok(sender)
    }

    /// Restart a source for a new slice of the track
    ///
    /// Bound channels of the source move to the new span.
    pub fn retarget_source(
        &mut self,
        source_id: &str,
        span: DataRange,
        expected_len: Option<usize>,
    ) -> WaveformResult<FeedSender> {
        check_span(span)?;
        let index = self
            .index_of(source_id)
            .ok_or_else(|| WaveformError::UnknownSource(source_id.to_string()))?;

        self.feeds[index].span = Some(span);
        for identifier in self.sets[index].identifiers() {
            self.viewport.set_span(identifier, Some(span));
        }
        log::debug!("PlotModel: retargeting {} to {:?}", source_id, span);

        self.restart_source(source_id, expected_len)
    }

    /// Track range covered by a detail source (`None` for whole-track sources)
    pub fn source_span(&self, source_id: &str) -> Option<DataRange> {
        self.index_of(source_id).and_then(|i| self.feeds[i].span)
    }

    /// Feed events waiting for the next pump
    pub fn pending_events(&self, source_id: &str) -> usize {
        self.index_of(source_id).map_or(0, |i| self.feeds[i].feed.pending())
    }

    /// Drop a source and unbind its channels
    pub fn remove_source(&mut self, source_id: &str) -> bool {
        let Some(index) = self.index_of(source_id) else {
            return false;
        };
        let set = self.sets.remove(index);
        self.feeds.remove(index);
        for identifier in set.identifiers() {
            self.viewport.unbind(identifier);
        }
        log::info!("PlotModel: removed source {}", source_id);
        true
    }

    pub fn source(&self, source_id: &str) -> Option<&ChannelSet<T>> {
        self.index_of(source_id).map(|i| &self.sets[i])
    }

    pub fn sources(&self) -> impl Iterator<Item = &ChannelSet<T>> {
        self.sets.iter()
    }

    /// Any channel by identifier, e.g. `"track-1.max"`
    pub fn channel(&self, identifier: &str) -> Option<&dyn WaveformSource> {
        self.sets.channel(identifier)
    }

    /// Apply queued feed events and publish changed geometry
    ///
    /// Returns the number of raw values appended.
    pub fn pump(&mut self) -> usize {
        let budget = self.config.max_events_per_pump.max(1);
        let mut appended = 0;

        for (set, source) in self.sets.iter_mut().zip(self.feeds.iter_mut()) {
            let report = source.feed.drain_into(set, budget);
            appended += report.values;

            if source.finished {
                continue;
            }
            let outcome = match (report.failure, report.completed) {
                (Some(error), _) => Some(Err(error)),
                (None, true) => Some(Ok(())),
                (None, false) => None,
            };
            if let Some(outcome) = outcome {
                source.finished = true;
                if let Some(callback) = self.on_complete.as_mut() {
                    callback(set.source_id(), outcome);
                }
            }
        }

        self.refresh();
        appended
    }

    /// Recompute geometry for bound channels and notify the listener
    pub fn refresh(&mut self) {
        let changed = self.viewport.refresh(&self.sets);
        if let Some(callback) = self.on_geometry.as_mut() {
            for identifier in &changed {
                if let Some(geometry) = self.viewport.geometry(identifier) {
                    callback(identifier, geometry);
                }
            }
        }
    }

    /// Bind a channel to the viewport and compute its geometry
    ///
    /// Channels of detail sources are bound with their source's span.
    pub fn bind(&mut self, identifier: &str) -> bool {
        let span = self
            .sets
            .iter()
            .position(|set| set.owns(identifier))
            .and_then(|i| self.feeds[i].span);
        let bound = match span {
            Some(span) => self.viewport.bind_span(identifier, span),
            None => self.viewport.bind(identifier),
        };
        if bound {
            self.refresh();
        }
        bound
    }

    pub fn unbind(&mut self, identifier: &str) -> bool {
        self.viewport.unbind(identifier)
    }

    /// Cached geometry of a bound channel
    pub fn geometry(&self, identifier: &str) -> Option<&GeometryResult> {
        self.viewport.geometry(identifier)
    }

    /// Visible points of a bound channel
    pub fn visible_points(&self, identifier: &str) -> Vec<Point> {
        match (self.viewport.geometry(identifier), self.channel(identifier)) {
            (Some(geometry), Some(source)) => geometry.points(source).collect(),
            _ => Vec::new(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Set zoom and pan (clamped) and refresh geometry if the view changed
    pub fn set_view(&mut self, scale: f64, start: f64) -> bool {
        let changed = self.viewport.set_view(scale, start);
        if changed {
            self.view_changed();
        }
        changed
    }

    /// Zoom around a view-relative anchor and refresh geometry
    pub fn zoom_at(&mut self, factor: f64, anchor: f64) -> bool {
        let changed = self.viewport.zoom_at(factor, anchor);
        if changed {
            self.view_changed();
        }
        changed
    }

    /// Pan by view widths and refresh geometry
    pub fn pan_by(&mut self, view_widths: f64) -> bool {
        let changed = self.viewport.pan_by(view_widths);
        if changed {
            self.view_changed();
        }
        changed
    }

    fn view_changed(&mut self) {
        self.refresh();
        let visible = self.viewport.visible_range();
        if let Some(callback) = self.on_view_changed.as_mut() {
            callback(visible);
        }
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.viewport.set_bounds(bounds);
    }

    pub fn visible_range(&self) -> DataRange {
        self.viewport.visible_range()
    }

    /// Convert a selection in view coordinates to track coordinates
    pub fn absolute_range(&self, relative: DataRange) -> DataRange {
        self.viewport.absolute_range(relative)
    }

    /// Largest absolute extreme across bound channels (0 when nothing is drawn)
    ///
    /// Used as the shared vertical scale so bound waveforms stay comparable.
    pub fn amplitude_bounds(&self) -> f64 {
        self.viewport
            .bound()
            .filter_map(|id| self.channel(id))
            .filter_map(|source| match (source.min(), source.max()) {
                (Some(lo), Some(hi)) => Some(lo.abs().max(hi.abs())),
                _ => None,
            })
            .fold(0.0, f64::max)
    }
}

fn check_span(span: DataRange) -> WaveformResult<()> {
    if span.is_valid() {
        Ok(())
    } else {
        Err(WaveformError::InvalidRange {
            location: span.location,
            length: span.length,
        })
    }
}

impl<T: SampleValue> std::fmt::Debug for PlotModel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlotModel")
            .field("sources", &self.sets.iter().map(|s| s.source_id()).collect::<Vec<_>>())
            .field("viewport", &self.viewport)
            .field("on_geometry", &self.on_geometry.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_view_changed", &self.on_view_changed.is_some())
            .finish()
    }
}

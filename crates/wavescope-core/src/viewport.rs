//! Zoom/pan state and per-channel geometry cache
//!
//! A [`Viewport`] holds one zoom scale and pan offset shared by every channel
//! bound to it. Channels are bound by identifier, not by reference: the
//! channel sets are owned elsewhere (usually by a
//! [`PlotModel`](crate::PlotModel)) and handed in through a
//! [`ChannelLookup`] on each [`refresh`](Viewport::refresh).
//!
//! Geometry is cached per binding and only recomputed when the scale, the
//! start, or the bound buffer's `len()`/`total_count()` changed.
//!
//! A binding may carry a span: the part of the track its channel covers
//! (e.g. a detail channel decoded for the visible slice only). Its geometry is
//! computed in the channel's own coordinates, so its points land at the same
//! x as the matching samples of a whole-track channel.

use crate::channel_set::ChannelLookup;
use crate::geometry::{compute_geometry, GeometryResult, DEFAULT_BOUNDARY_EPSILON};
use crate::types::{Bounds, DataRange};

/// Fully zoomed out: the whole track fits the view
pub const MIN_SCALE: f64 = 1.0;

/// Default zoom limit
pub const DEFAULT_MAX_SCALE: f64 = 4096.0;

/// Inputs the cached geometry was computed from
#[derive(Debug, Clone, Copy, PartialEq)]
struct GeometryKey {
    scale: f64,
    start: f64,
    len: usize,
    total: usize,
}

#[derive(Debug, Clone)]
struct Binding {
    identifier: String,
    /// Track range covered by the channel; `None` for the whole track
    span: Option<DataRange>,
    key: Option<GeometryKey>,
    geometry: Option<GeometryResult>,
}

/// Shared zoom/pan state with cached geometry for each bound channel
#[derive(Debug, Clone)]
pub struct Viewport {
    scale: f64,
    start: f64,
    bounds: Bounds,
    epsilon: f64,
    max_scale: f64,
    bindings: Vec<Binding>,
}

impl Viewport {
    /// Fully zoomed-out viewport for a draw area of `bounds`
    pub fn new(bounds: Bounds) -> Self {
        Self {
            scale: MIN_SCALE,
            start: 0.0,
            bounds,
            epsilon: DEFAULT_BOUNDARY_EPSILON,
            max_scale: DEFAULT_MAX_SCALE,
            bindings: Vec::new(),
        }
    }

    /// Set the zoom limit (values below 1 are raised to 1)
    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = if max_scale.is_finite() {
            max_scale.max(MIN_SCALE)
        } else {
            DEFAULT_MAX_SCALE
        };
        let (scale, start) = self.clamp_view(self.scale, self.start);
        self.scale = scale;
        self.start = start;
        self
    }

    /// Set the boundary epsilon used by windowing
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Change the draw area size (geometry is normalized, so caches stay valid)
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    /// Clamp a requested view to `scale ∈ [1, max_scale]`, `start ∈ [0, 1 - 1/scale]`
    fn clamp_view(&self, scale: f64, start: f64) -> (f64, f64) {
        let scale = if scale.is_finite() {
            scale.clamp(MIN_SCALE, self.max_scale)
        } else {
            MIN_SCALE
        };
        let max_start = 1.0 - 1.0 / scale;
        let start = if start.is_finite() {
            start.clamp(0.0, max_start)
        } else {
            0.0
        };
        (scale, start)
    }

    /// Set zoom and pan together; returns whether the (clamped) view changed
    pub fn set_view(&mut self, scale: f64, start: f64) -> bool {
        let (scale, start) = self.clamp_view(scale, start);
        let changed = scale != self.scale || start != self.start;
        if changed {
            log::trace!("Viewport: view -> scale={} start={}", scale, start);
        }
        self.scale = scale;
        self.start = start;
        changed
    }

    pub fn set_scale(&mut self, scale: f64) -> bool {
        self.set_view(scale, self.start)
    }

    pub fn set_start(&mut self, start: f64) -> bool {
        self.set_view(self.scale, start)
    }

    /// Pan by a distance in view widths (1.0 = one full screen to the right)
    pub fn pan_by(&mut self, view_widths: f64) -> bool {
        self.set_start(self.start + view_widths / self.scale)
    }

    /// Zoom by `factor`, keeping the track position under `anchor` fixed
    ///
    /// `anchor` is in view coordinates (0.0 = left edge, 1.0 = right edge).
    pub fn zoom_at(&mut self, factor: f64, anchor: f64) -> bool {
        let anchor = anchor.clamp(0.0, 1.0);
        let focus = self.start + anchor / self.scale;
        let (scale, _) = self.clamp_view(self.scale * factor, self.start);
        self.set_view(scale, focus - anchor / scale)
    }

    /// Track range currently visible
    pub fn visible_range(&self) -> DataRange {
        DataRange::new(self.start, 1.0 / self.scale)
    }

    /// Convert a range in view coordinates (e.g. a selection) to track coordinates
    pub fn absolute_range(&self, relative: DataRange) -> DataRange {
        DataRange::new(
            self.start + relative.location / self.scale,
            relative.length / self.scale,
        )
    }

    /// Bind a channel; returns `false` if it was already bound
    pub fn bind(&mut self, identifier: impl Into<String>) -> bool {
        let identifier = identifier.into();
        if self.is_bound(&identifier) {
            return false;
        }
        self.bindings.push(Binding {
            identifier,
            span: None,
            key: None,
            geometry: None,
        });
        true
    }

    /// Bind a channel that covers only `span` of the track
    ///
    /// An already bound channel keeps its binding and takes the new span;
    /// returns `false` in that case.
    pub fn bind_span(&mut self, identifier: impl Into<String>, span: DataRange) -> bool {
        let identifier = identifier.into();
        let added = self.bind(identifier.as_str());
        self.set_span(&identifier, Some(span));
        added
    }

    /// Change the span of a bound channel; returns `false` if it is not bound
    ///
    /// Invalid spans (see [`DataRange::is_valid`]) are treated as the whole track.
    pub fn set_span(&mut self, identifier: &str, span: Option<DataRange>) -> bool {
        let span = match span {
            Some(range) if !range.is_valid() => {
                log::warn!("Viewport: ignoring invalid span {:?} for {}", range, identifier);
                None
            }
            other => other,
        };
        match self.bindings.iter_mut().find(|b| b.identifier == identifier) {
            Some(binding) => {
                binding.span = span;
                binding.key = None;
                true
            }
            None => false,
        }
    }

    /// Span of a bound channel
    pub fn span(&self, identifier: &str) -> Option<DataRange> {
        self.bindings
            .iter()
            .find(|b| b.identifier == identifier)
            .and_then(|b| b.span)
    }

    /// Unbind a channel; returns `false` if it was not bound
    pub fn unbind(&mut self, identifier: &str) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|b| b.identifier != identifier);
        self.bindings.len() != before
    }

    pub fn is_bound(&self, identifier: &str) -> bool {
        self.bindings.iter().any(|b| b.identifier == identifier)
    }

    /// Bound channel identifiers in binding order
    pub fn bound(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.identifier.as_str())
    }

    /// Cached geometry of a bound channel (`None` before the first refresh)
    pub fn geometry(&self, identifier: &str) -> Option<&GeometryResult> {
        self.bindings
            .iter()
            .find(|b| b.identifier == identifier)
            .and_then(|b| b.geometry.as_ref())
    }

    /// Drop every cached geometry so the next refresh recomputes all bindings
    pub fn invalidate(&mut self) {
        for binding in &mut self.bindings {
            binding.key = None;
        }
    }

    /// Recompute geometry for bindings whose inputs changed
    ///
    /// Returns the identifiers whose geometry differs from the cached one.
    /// A binding whose channel cannot be found gets empty geometry.
    pub fn refresh<L>(&mut self, lookup: &L) -> Vec<String>
    where
        L: ChannelLookup + ?Sized,
    {
        let mut changed = Vec::new();

        for binding in &mut self.bindings {
            let Some(source) = lookup.channel(&binding.identifier) else {
                if binding.geometry != Some(GeometryResult::EMPTY) {
                    log::debug!("Viewport: channel {} not found", binding.identifier);
                    binding.key = None;
                    binding.geometry = Some(GeometryResult::EMPTY);
                    changed.push(binding.identifier.clone());
                }
                continue;
            };

            let (scale, start) = match binding.span {
                Some(span) => (self.scale * span.length, (self.start - span.location) / span.length),
                None => (self.scale, self.start),
            };
            let key = GeometryKey {
                scale,
                start,
                len: source.len(),
                total: source.total_count(),
            };
            if binding.key == Some(key) {
                continue;
            }

            let geometry = compute_geometry(key.total, key.len, key.scale, key.start, self.epsilon);
            binding.key = Some(key);
            if binding.geometry != Some(geometry) {
                binding.geometry = Some(geometry);
                changed.push(binding.identifier.clone());
            }
        }

        changed
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Bounds::default())
    }
}

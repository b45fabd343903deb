//! Viewport windowing: map a zoom/pan state onto a bounded set of points
//!
//! The whole track spans the normalized range `[0, 1]` at scale 1. For a
//! buffer with `total_count` samples, adjacent samples are `dx = 1/(total-1)`
//! apart. Zooming multiplies that distance by `scale`; panning shifts the
//! left edge of the view to `start`.
//!
//! ```text
//!   start                                  start + 1/scale
//!     |<------------- visible slice ------------->|
//!  ...x   |  x      x      x      x      x      x |  x ...
//!         ^
//!     first_index = ceil(start / dx), offset by sub_pixel_offset
//! ```
//!
//! Only `points_count` points are produced regardless of track length, and
//! `first_index + points_count` never exceeds the buffer's current length.

use crate::buffer::WaveformSource;
use crate::types::Bounds;

/// Guards `ceil` against landing one point short at exact pixel boundaries
pub const DEFAULT_BOUNDARY_EPSILON: f64 = 1e-6;

/// A point in normalized view coordinates
///
/// `x` is 0.0 at the left edge of the view and 1.0 at the right edge; `y` is
/// the raw sample value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Map to draw-area pixels, with zero amplitude on the vertical centre
    ///
    /// `amplitude` is the value drawn at the top edge; non-positive amplitudes
    /// draw everything on the centre line.
    pub fn to_screen(&self, bounds: Bounds, amplitude: f64) -> (f64, f64) {
        let half = bounds.height / 2.0;
        let y = if amplitude > 0.0 {
            half - (self.y / amplitude) * half
        } else {
            half
        };
        (self.x * bounds.width, y)
    }
}

/// Bounded rendering geometry for one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryResult {
    /// Number of visible points
    pub points_count: usize,
    /// Buffer index of the first visible point
    pub first_index: usize,
    /// X of the first visible point, in `[0, step_x)`
    pub sub_pixel_offset: f64,
    /// Horizontal distance between consecutive points
    pub step_x: f64,
}

impl GeometryResult {
    /// Geometry with nothing to draw
    pub const EMPTY: GeometryResult = GeometryResult {
        points_count: 0,
        first_index: 0,
        sub_pixel_offset: 0.0,
        step_x: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        self.points_count == 0
    }

    /// One past the last buffer index this geometry reads
    pub fn end_index(&self) -> usize {
        self.first_index + self.points_count
    }

    /// Point `i` of the window
    ///
    /// Indices not yet present in `source` read as 0, so a buffer that is
    /// still filling draws a flat tail instead of failing.
    pub fn point_at(&self, i: usize, source: &dyn WaveformSource) -> Point {
        let x = self.sub_pixel_offset + self.step_x * i as f64;
        let y = self
            .first_index
            .checked_add(i)
            .and_then(|index| source.value_at(index).ok())
            .unwrap_or(0.0);
        Point { x, y }
    }

    /// Iterate over the `points_count` visible points
    pub fn points<'a>(
        &'a self,
        source: &'a dyn WaveformSource,
    ) -> impl Iterator<Item = Point> + 'a {
        (0..self.points_count).map(move |i| self.point_at(i, source))
    }
}

impl Default for GeometryResult {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Compute the visible window of a channel
///
/// * `total_count` - logical length the layout is based on
/// * `current_len` - samples actually readable; the window never exceeds it
/// * `scale` - zoom factor, 1.0 shows the whole track
/// * `start` - normalized pan offset of the view's left edge (may be negative
///   or past the end for channels covering only part of the track)
/// * `epsilon` - boundary guard, normally [`DEFAULT_BOUNDARY_EPSILON`]
pub fn compute_geometry(
    total_count: usize,
    current_len: usize,
    scale: f64,
    start: f64,
    epsilon: f64,
) -> GeometryResult {
    if total_count < 2 {
        return GeometryResult::EMPTY;
    }

    let dx = 1.0 / (total_count - 1) as f64;
    let scaled_dx = dx * scale;

    // Ceiling keeps the leftmost point at or right of the view origin
    let first_index = (start / dx).ceil().max(0.0) as usize;
    let scaled_start_x = (first_index as f64 * dx - start) * scale;

    let raw_count = ((1.0 - scaled_start_x) / scaled_dx + epsilon).ceil();
    let raw_count = if raw_count.is_finite() && raw_count > 0.0 {
        raw_count as usize
    } else {
        0
    };
    let points_count = raw_count.min(current_len.saturating_sub(first_index));

    // An empty window starts at the readable end, never past it
    let first_index = if points_count == 0 {
        first_index.min(current_len)
    } else {
        first_index
    };

    GeometryResult {
        points_count,
        first_index,
        sub_pixel_offset: scaled_start_x,
        step_x: scaled_dx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::SampleBuffer;

    const EPS: f64 = DEFAULT_BOUNDARY_EPSILON;

    fn buffer(values: &[f64]) -> SampleBuffer<f64> {
        let mut buffer = SampleBuffer::new("test.raw");
        for &v in values {
            buffer.append(v);
        }
        buffer
    }

    #[test]
    fn test_fewer_than_two_samples_draws_nothing() {
        assert!(compute_geometry(0, 0, 1.0, 0.0, EPS).is_empty());
        assert!(compute_geometry(1, 1, 1.0, 0.0, EPS).is_empty());
        assert!(compute_geometry(1, 1, 4.0, 0.5, EPS).is_empty());
    }

    #[test]
    fn test_full_view_covers_whole_buffer() {
        let source = buffer(&[0.0, 10.0, -5.0, 3.0, 7.0]);
        let geometry = compute_geometry(5, 5, 1.0, 0.0, EPS);

        assert_eq!(geometry.first_index, 0);
        assert_eq!(geometry.points_count, 5);
        assert_eq!(geometry.step_x, 0.25);
        assert_eq!(geometry.sub_pixel_offset, 0.0);

        let ys: Vec<f64> = geometry.points(&source).map(|p| p.y).collect();
        assert_eq!(ys, vec![0.0, 10.0, -5.0, 3.0, 7.0]);

        let xs: Vec<f64> = geometry.points(&source).map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_zoomed_and_panned_window() {
        let source = buffer(&[0.0, 10.0, -5.0, 3.0, 7.0]);
        let geometry = compute_geometry(5, 5, 2.0, 0.25, EPS);

        assert_eq!(geometry.first_index, 1);
        assert_eq!(geometry.sub_pixel_offset, 0.0);
        assert_eq!(geometry.step_x, 0.5);
        assert_eq!(geometry.points_count, 3);
        assert!(geometry.end_index() <= 4);

        let points: Vec<Point> = geometry.points(&source).collect();
        assert_eq!(
            points,
            vec![
                Point { x: 0.0, y: 10.0 },
                Point { x: 0.5, y: -5.0 },
                Point { x: 1.0, y: 3.0 },
            ]
        );
    }

    #[test]
    fn test_first_point_never_left_of_origin() {
        // start falls between samples 1 and 2
        let geometry = compute_geometry(5, 5, 2.0, 0.3, EPS);
        assert_eq!(geometry.first_index, 2);
        assert!(geometry.sub_pixel_offset >= 0.0);
        assert!(geometry.sub_pixel_offset < geometry.step_x);
    }

    #[test]
    fn test_streaming_buffer_pads_with_silence() {
        let mut source = buffer(&[1.0; 10]);
        source.set_expected_len(1000);

        let geometry = compute_geometry(source.total_count(), source.len(), 1.0, 0.0, EPS);
        assert_eq!(geometry.first_index, 0);
        assert_eq!(geometry.points_count, 10);
        assert_eq!(geometry.step_x, 1.0 / 999.0);

        for i in 0..10 {
            assert_eq!(geometry.point_at(i, &source).y, 1.0);
        }
        for i in [10, 500, 999] {
            assert_eq!(geometry.point_at(i, &source).y, 0.0);
        }
    }

    #[test]
    fn test_window_past_current_length_is_empty() {
        let mut source = buffer(&[1.0; 10]);
        source.set_expected_len(1000);

        let geometry = compute_geometry(source.total_count(), source.len(), 4.0, 0.5, EPS);
        assert_eq!(geometry.points_count, 0);
        assert_eq!(geometry.first_index, 10);
        assert!(geometry.end_index() <= source.len());
    }

    #[test]
    fn test_non_finite_start_draws_nothing() {
        let source = buffer(&[1.0, 2.0, 3.0]);
        for start in [f64::INFINITY, f64::NAN, f64::NEG_INFINITY] {
            let geometry = compute_geometry(3, 3, 1.0, start, EPS);
            assert!(geometry.end_index() <= 3, "start={} -> {:?}", start, geometry);
            let _ = geometry.points(&source).count();
        }
    }

    #[test]
    fn test_point_at_index_overflow_reads_silence() {
        let source = buffer(&[1.0, 2.0]);
        let geometry = GeometryResult {
            points_count: 2,
            first_index: usize::MAX,
            sub_pixel_offset: 0.0,
            step_x: 0.5,
        };
        assert_eq!(geometry.point_at(1, &source).y, 0.0);
        assert_eq!(geometry.point_at(0, &source).y, 0.0);
    }

    #[test]
    fn test_negative_start_offsets_first_point() {
        // Channel covering the right half of the view
        let geometry = compute_geometry(5, 5, 1.0, -0.5, EPS);
        assert_eq!(geometry.first_index, 0);
        assert_eq!(geometry.sub_pixel_offset, 0.5);
        assert_eq!(geometry.points_count, 3);
    }

    #[test]
    fn test_window_bounds_hold_across_zoom_and_pan() {
        for total in [2usize, 3, 5, 17, 100, 1001, 44_100] {
            for current in [0, 1, total / 2, total] {
                for scale in [1.0, 1.5, 2.0, 3.0, 7.25, 64.0, 1000.0] {
                    let max_start: f64 = 1.0 - 1.0 / scale;
                    for step in 0..=16 {
                        let start = max_start * step as f64 / 16.0;
                        let g = compute_geometry(total, current, scale, start, EPS);

                        assert!(
                            g.end_index() <= current,
                            "total={} current={} scale={} start={} -> {:?}",
                            total,
                            current,
                            scale,
                            start,
                            g
                        );
                        assert!(g.sub_pixel_offset >= -1e-12);
                        assert!(g.step_x > 0.0);

                        let mut last = f64::NEG_INFINITY;
                        for i in 0..g.points_count {
                            let x = g.sub_pixel_offset + g.step_x * i as f64;
                            assert!(x >= last);
                            last = x;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_full_view_of_complete_buffer_is_exact() {
        for total in 2..300 {
            let g = compute_geometry(total, total, 1.0, 0.0, EPS);
            assert_eq!(g.first_index, 0);
            assert_eq!(g.points_count, total, "total={}", total);
        }
    }

    #[test]
    fn test_to_screen() {
        let bounds = Bounds::new(200.0, 100.0);
        assert_eq!(Point { x: 0.5, y: 0.0 }.to_screen(bounds, 1.0), (100.0, 50.0));
        assert_eq!(Point { x: 1.0, y: 1.0 }.to_screen(bounds, 1.0), (200.0, 0.0));
        assert_eq!(Point { x: 0.0, y: -0.5 }.to_screen(bounds, 1.0), (0.0, 75.0));
        assert_eq!(Point { x: 0.0, y: 3.0 }.to_screen(bounds, 0.0), (0.0, 50.0));
    }
}

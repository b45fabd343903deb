//! Open media files straight into a [`PlotModel`]
//!
//! Probing first lets the plot size its reducer blocks and lay out geometry
//! for the whole track before the first sample arrives.
//!
//! Detail sources re-decode only the visible slice of a track, typically from
//! a [`PlotModel::on_view_changed`] listener:
//!
//! ```ignore
//! // after the view settled on `visible`:
//! let handle = reload_detail(&mut plot, "track-1.detail", path, visible, DecodeOptions::default())?;
//! ```

use std::path::Path;
use std::thread;
use std::time::Duration;

use wavescope_core::{DataRange, PlotModel, SampleValue, SourceState, WaveformError};

use crate::error::{DecodeError, Result};
use crate::source::{probe, spawn_decode, DecodeHandle, DecodeOptions};

/// Register `source_id` with `plot` and start decoding `path` into it
pub fn open_source<T: SampleValue>(
    plot: &mut PlotModel<T>,
    source_id: &str,
    path: impl AsRef<Path>,
    options: DecodeOptions,
) -> Result<DecodeHandle> {
    let path = path.as_ref();
    let info = probe(path)?;
    let sender = plot.add_source(source_id, expected_frames(info.n_frames, &options))?;
    spawn_decode(path, sender, options)
}

/// Decode `path` again into an existing source, abandoning any running decode
pub fn reload_source<T: SampleValue>(
    plot: &mut PlotModel<T>,
    source_id: &str,
    path: impl AsRef<Path>,
    options: DecodeOptions,
) -> Result<DecodeHandle> {
    let path = path.as_ref();
    let info = probe(path)?;
    let sender = plot.restart_source(source_id, expected_frames(info.n_frames, &options))?;
    spawn_decode(path, sender, options)
}

fn expected_frames(n_frames: Option<u64>, options: &DecodeOptions) -> Option<usize> {
    let limit = options.max_frames.unwrap_or(u64::MAX);
    n_frames.map(|n| n.saturating_sub(options.start_frame).min(limit) as usize)
}

/// Frames to decode for a detail source and the track range they cover
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailWindow {
    pub start_frame: u64,
    pub frames: u64,
    pub span: DataRange,
}

/// Smallest whole-frame window of an `n_frames` track containing `range`
///
/// Returns `None` for a range that is not finite or has no length.
pub fn detail_window(n_frames: u64, range: DataRange) -> Option<DetailWindow> {
    if !range.is_valid() {
        return None;
    }
    if n_frames < 2 {
        return Some(DetailWindow {
            start_frame: 0,
            frames: n_frames,
            span: DataRange::new(0.0, 1.0),
        });
    }

    let last = n_frames - 1;
    let last_f = last as f64;
    let first = ((range.location * last_f).floor().max(0.0) as u64).min(last - 1);
    let end = ((range.end() * last_f).ceil().max(0.0) as u64).clamp(first + 1, last);

    Some(DetailWindow {
        start_frame: first,
        frames: end - first + 1,
        span: DataRange::new(first as f64 / last_f, (end - first) as f64 / last_f),
    })
}

fn detail_request(
    path: &Path,
    range: DataRange,
    options: DecodeOptions,
) -> Result<(DetailWindow, DecodeOptions)> {
    let n_frames = probe(path)?
        .n_frames
        .ok_or_else(|| DecodeError::UnknownLength(path.to_path_buf()))?;
    let window = detail_window(n_frames, range).ok_or(WaveformError::InvalidRange {
        location: range.location,
        length: range.length,
    })?;
    log::debug!(
        "detail: {} frames {}..{} for {:?}",
        path.display(),
        window.start_frame,
        window.start_frame + window.frames,
        range
    );

    let options = DecodeOptions {
        start_frame: window.start_frame,
        max_frames: Some(window.frames),
        ..options
    };
    Ok((window, options))
}

/// Register a detail source covering `range` of the track and decode that slice
///
/// The start and length in `options` are replaced by the detail window.
pub fn open_detail<T: SampleValue>(
    plot: &mut PlotModel<T>,
    source_id: &str,
    path: impl AsRef<Path>,
    range: DataRange,
    options: DecodeOptions,
) -> Result<DecodeHandle> {
    let path = path.as_ref();
    let (window, options) = detail_request(path, range, options)?;
    let sender = plot.add_detail_source(source_id, window.span, Some(window.frames as usize))?;
    spawn_decode(path, sender, options)
}

/// Move an existing detail source to `range`, abandoning its running decode
pub fn reload_detail<T: SampleValue>(
    plot: &mut PlotModel<T>,
    source_id: &str,
    path: impl AsRef<Path>,
    range: DataRange,
    options: DecodeOptions,
) -> Result<DecodeHandle> {
    let path = path.as_ref();
    let (window, options) = detail_request(path, range, options)?;
    let sender = plot.retarget_source(source_id, window.span, Some(window.frames as usize))?;
    spawn_decode(path, sender, options)
}

/// Pump `plot` until `source_id` stops streaming, then join `handle`
///
/// Also stops once the decode thread has exited and its events are drained,
/// which covers a decode abandoned by a restart and a thread that died.
/// Sleeps for `idle` whenever a pump applies nothing.
pub fn pump_until_done<T: SampleValue>(
    plot: &mut PlotModel<T>,
    source_id: &str,
    handle: DecodeHandle,
    idle: Duration,
) -> Result<u64> {
    while plot.source(source_id).map(|s| s.state()) == Some(&SourceState::Streaming) {
        if plot.pump() > 0 {
            continue;
        }
        if handle.is_finished() && plot.pending_events(source_id) == 0 {
            log::debug!("pump_until_done: decode of {} exited while streaming", source_id);
            break;
        }
        thread::sleep(idle);
    }
    handle.join()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::{mono, write_wav, FRAMES};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use wavescope_core::{Bounds, WaveformConfig};

    const IDLE: Duration = Duration::from_millis(1);

    #[test]
    fn test_open_source_streams_into_plot() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 2);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::new(800.0, 100.0));

        let handle = open_source(&mut plot, "track", &path, DecodeOptions::default()).unwrap();

        // Layout already spans the whole track
        let set = plot.source("track").unwrap();
        assert_eq!(set.raw().total_count(), FRAMES);
        assert_eq!(set.derived("max").unwrap().block_size(), FRAMES / 512);

        plot.bind("track.max");
        assert_eq!(pump_until_done(&mut plot, "track", handle, IDLE).unwrap(), FRAMES as u64);

        let set = plot.source("track").unwrap();
        assert_eq!(set.raw().len(), FRAMES);
        assert_eq!(set.raw().value_at(42).unwrap(), mono(42));
        assert_eq!(set.derived("max").unwrap().len(), FRAMES.div_ceil(FRAMES / 512));
        assert!(!plot.geometry("track.max").unwrap().is_empty());
        assert!(plot.amplitude_bounds() > 0.0);
    }

    #[test]
    fn test_reload_source_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 2);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::default());

        let handle = open_source(&mut plot, "track", &path, DecodeOptions::default()).unwrap();
        pump_until_done(&mut plot, "track", handle, IDLE).unwrap();

        let options = DecodeOptions {
            max_frames: Some(500),
            ..DecodeOptions::default()
        };
        let handle = reload_source(&mut plot, "track", &path, options).unwrap();
        assert_eq!(pump_until_done(&mut plot, "track", handle, IDLE).unwrap(), 500);
        assert_eq!(plot.source("track").unwrap().raw().len(), 500);
    }

    #[test]
    fn test_open_source_rejects_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 1);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::default());

        open_source(&mut plot, "track", &path, DecodeOptions::default()).unwrap();
        let err = open_source(&mut plot, "track", &path, DecodeOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Feed(WaveformError::DuplicateChannel(_))
        ));
    }

    #[test]
    fn test_detail_window_covers_range() {
        let window = detail_window(FRAMES as u64, DataRange::new(0.5, 0.25)).unwrap();
        assert_eq!(window.start_frame, 999);
        assert_eq!(window.frames, 502);
        assert_eq!(window.span, DataRange::new(999.0 / 1999.0, 501.0 / 1999.0));

        // Clamped to the track
        let window = detail_window(100, DataRange::new(0.9, 0.5)).unwrap();
        assert_eq!((window.start_frame, window.frames), (89, 11));
        let window = detail_window(100, DataRange::new(1.5, 0.1)).unwrap();
        assert_eq!((window.start_frame, window.frames), (98, 2));

        assert_eq!(detail_window(1, DataRange::new(0.2, 0.1)).unwrap().frames, 1);
        assert_eq!(detail_window(100, DataRange::new(0.2, 0.0)), None);
        assert_eq!(detail_window(100, DataRange::new(f64::NAN, 0.1)), None);
    }

    #[test]
    fn test_open_detail_decodes_visible_slice() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 2);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::new(800.0, 100.0));

        let handle = open_detail(
            &mut plot,
            "detail",
            &path,
            DataRange::new(0.5, 0.25),
            DecodeOptions::default(),
        )
        .unwrap();
        plot.bind("detail.raw");
        assert_eq!(pump_until_done(&mut plot, "detail", handle, IDLE).unwrap(), 502);

        let raw = plot.source("detail").unwrap().raw();
        assert_eq!(raw.len(), 502);
        assert_eq!(raw.value_at(0).unwrap(), mono(999));
        assert_eq!(raw.value_at(501).unwrap(), mono(1500));

        plot.set_view(4.0, 0.5);
        let geometry = *plot.geometry("detail.raw").unwrap();
        assert_eq!(geometry.first_index, 1);
        assert_eq!(geometry.points_count, 500);
        assert_eq!(plot.visible_points("detail.raw")[0].y, mono(1000));
    }

    #[test]
    fn test_reload_detail_follows_view() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 2);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::default());

        let views = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&views);
        plot.on_view_changed(move |range| sink.lock().unwrap().push(range));

        let handle = open_detail(
            &mut plot,
            "detail",
            &path,
            DataRange::new(0.0, 0.5),
            DecodeOptions::default(),
        )
        .unwrap();
        pump_until_done(&mut plot, "detail", handle, IDLE).unwrap();

        plot.set_view(4.0, 0.75);
        let visible = *views.lock().unwrap().last().unwrap();
        assert_eq!(visible, DataRange::new(0.75, 0.25));

        let handle = reload_detail(&mut plot, "detail", &path, visible, DecodeOptions::default()).unwrap();
        pump_until_done(&mut plot, "detail", handle, IDLE).unwrap();

        let window = detail_window(FRAMES as u64, visible).unwrap();
        assert_eq!(plot.source_span("detail"), Some(window.span));
        let raw = plot.source("detail").unwrap().raw();
        assert_eq!(raw.len() as u64, window.frames);
        assert_eq!(raw.value_at(0).unwrap(), mono(window.start_frame as usize));
    }

    #[test]
    fn test_open_detail_rejects_empty_range() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 1);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::default());

        let err = open_detail(
            &mut plot,
            "detail",
            &path,
            DataRange::new(0.5, 0.0),
            DecodeOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::Feed(WaveformError::InvalidRange { .. })));
        assert!(plot.source("detail").is_none());
    }

    #[test]
    fn test_pump_until_done_returns_for_abandoned_decode() {
        let dir = TempDir::new().unwrap();
        let path = write_wav(&dir, "track.wav", 2);
        let mut plot: PlotModel<f64> = PlotModel::new(WaveformConfig::default(), Bounds::default());

        let handle = open_source(&mut plot, "track", &path, DecodeOptions::default()).unwrap();
        // Restarted with no new producer, so the source never leaves Streaming
        plot.restart_source("track", None).unwrap();

        let frames = pump_until_done(&mut plot, "track", handle, IDLE).unwrap();
        assert!(frames <= FRAMES as u64);
        assert_eq!(plot.source("track").unwrap().state(), &SourceState::Streaming);
        assert_eq!(plot.source("track").unwrap().raw().len(), 0);
    }
}

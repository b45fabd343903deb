//! Media decoding into a waveform feed
//!
//! Files are opened with symphonia, decoded packet by packet, mixed down to
//! mono and pushed through a [`FeedSender`] in chunks. The owning context
//! drains the feed; this module never touches buffers.
//!
//! ```text
//! probe ─► announce_len ─► [next_packet ─► decode ─► mixdown ─► on_raw_values]* ─► on_complete
//!                                                                            └─► on_failure
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use wavescope_core::FeedSender;

use crate::error::{DecodeError, Result};

/// Frames pushed per feed event
pub const DEFAULT_CHUNK_FRAMES: usize = 4096;

/// Stream parameters read from the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frame count, if the container declares it
    pub n_frames: Option<u64>,
}

impl SourceInfo {
    pub fn duration_secs(&self) -> Option<f64> {
        self.n_frames
            .map(|n| n as f64 / self.sample_rate.max(1) as f64)
    }
}

/// Decode tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Mono frames per feed event
    pub chunk_frames: usize,
    /// Frames decoded and dropped before the first pushed frame
    pub start_frame: u64,
    /// Stop after this many pushed frames
    pub max_frames: Option<u64>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            start_frame: 0,
            max_frames: None,
        }
    }
}

struct OpenedTrack {
    format: Box<dyn FormatReader>,
    track_id: u32,
    params: CodecParameters,
    info: SourceInfo,
}

fn open_track(path: &Path) -> Result<OpenedTrack> {
    let file = File::open(path).map_err(|e| DecodeError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let format = probed.format;

    let (track_id, params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        (track.id, track.codec_params.clone())
    };

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| DecodeError::UnsupportedFormat("Unknown sample rate".to_string()))?;
    let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);

    let info = SourceInfo {
        sample_rate,
        channels,
        n_frames: params.n_frames,
    };

    Ok(OpenedTrack {
        format,
        track_id,
        params,
        info,
    })
}

/// Read stream parameters without decoding
pub fn probe(path: impl AsRef<Path>) -> Result<SourceInfo> {
    let path = path.as_ref();
    let info = open_track(path)?.info;
    log::debug!(
        "probe: {} ({} Hz, {} ch, {:?} frames)",
        path.display(),
        info.sample_rate,
        info.channels,
        info.n_frames
    );
    Ok(info)
}

/// Decode `path` on the calling thread, pushing mono frames into `sender`
///
/// Completion or failure is signalled through the sender as well as returned.
/// Returns the number of frames pushed. A sender whose feed was restarted
/// stops the decode early with the frames pushed so far.
///
/// The feed must be drained by another thread, or be large enough to hold the
/// whole file, since a full feed blocks this call.
pub fn decode_blocking(
    path: impl AsRef<Path>,
    sender: &FeedSender,
    options: &DecodeOptions,
) -> Result<u64> {
    decode_with_progress(path.as_ref(), sender, options, &AtomicU64::new(0))
}

fn decode_with_progress(
    path: &Path,
    sender: &FeedSender,
    options: &DecodeOptions,
    progress: &AtomicU64,
) -> Result<u64> {
    let started = Instant::now();

    match stream_frames(path, sender, options, progress) {
        Ok(frames) => {
            sender.on_complete()?;
            log::info!(
                "decode: {} finished, {} frames in {:?}",
                path.display(),
                frames,
                started.elapsed()
            );
            Ok(frames)
        }
        Err(e) => {
            log::error!("decode: {} failed: {}", path.display(), e);
            if let Err(feed_err) = sender.on_failure(e.to_string()) {
                log::warn!("decode: could not report failure: {}", feed_err);
            }
            Err(e)
        }
    }
}

fn stream_frames(
    path: &Path,
    sender: &FeedSender,
    options: &DecodeOptions,
    progress: &AtomicU64,
) -> Result<u64> {
    let OpenedTrack {
        mut format,
        track_id,
        params,
        info,
    } = open_track(path)?;

    let limit = options.max_frames.unwrap_or(u64::MAX);
    if let Some(n_frames) = info.n_frames {
        sender.announce_len(n_frames.saturating_sub(options.start_frame).min(limit) as usize)?;
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let chunk_frames = options.chunk_frames.max(1);
    let mut pending: Vec<f64> = Vec::with_capacity(chunk_frames);
    // Interleaved scratch buffer plus its frame capacity
    let mut sample_buf: Option<(SampleBuffer<f32>, u64)> = None;
    let mut frames: u64 = 0;
    let mut skipped: u64 = 0;

    while frames < limit {
        if sender.is_abandoned() {
            log::info!(
                "decode: {} abandoned after {} frames",
                path.display(),
                frames
            );
            return Ok(frames);
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("decode: skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        if sample_buf.as_ref().map_or(true, |(_, cap)| *cap < capacity) {
            sample_buf = Some((SampleBuffer::new(capacity, spec), capacity));
        }
        let Some((buf, _)) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let channels = spec.channels.count().max(1);
        for frame in buf.samples().chunks_exact(channels) {
            if frames >= limit {
                break;
            }
            if skipped < options.start_frame {
                skipped += 1;
                continue;
            }
            let sum: f64 = frame.iter().map(|&s| s as f64).sum();
            pending.push(sum / channels as f64);
            frames += 1;

            if pending.len() >= chunk_frames {
                let chunk = std::mem::replace(&mut pending, Vec::with_capacity(chunk_frames));
                sender.on_raw_values(chunk)?;
            }
        }
        progress.store(frames, Ordering::Release);
    }

    sender.on_raw_values(pending)?;
    progress.store(frames, Ordering::Release);
    Ok(frames)
}

/// Handle to a decode running on its own thread
#[derive(Debug)]
pub struct DecodeHandle {
    path: PathBuf,
    progress: Arc<AtomicU64>,
    thread: JoinHandle<Result<u64>>,
}

impl DecodeHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames pushed so far
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the decode thread and return its outcome
    pub fn join(self) -> Result<u64> {
        self.thread
            .join()
            .unwrap_or_else(|_| Err(DecodeError::Decode("decode thread panicked".to_string())))
    }
}

/// Decode `path` on a background thread
///
/// The thread owns `sender`; the caller keeps draining the matching feed.
pub fn spawn_decode(
    path: impl AsRef<Path>,
    sender: FeedSender,
    options: DecodeOptions,
) -> Result<DecodeHandle> {
    let path = path.as_ref().to_path_buf();
    let progress = Arc::new(AtomicU64::new(0));

    let thread_path = path.clone();
    let thread_progress = Arc::clone(&progress);
    let thread = thread::Builder::new()
        .name("wavescope-decode".to_string())
        .spawn(move || decode_with_progress(&thread_path, &sender, &options, &thread_progress))?;

    log::info!("decode: spawned decode thread for {}", path.display());

    Ok(DecodeHandle {
        path,
        progress,
        thread,
    })
}

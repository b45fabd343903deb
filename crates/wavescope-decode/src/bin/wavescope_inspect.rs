//! wavescope-inspect - decode a file and print its waveform channels
//!
//! Decodes the file through the full pipeline (feed, reducers, viewport) and
//! prints buffer statistics plus the geometry at the requested view.
//!
//! ## Usage
//!
//! ```text
//! wavescope-inspect <FILE> [--scale S] [--start X] [--points N] [--detail] [--config PATH]
//! ```
//!
//! - `--scale`: zoom factor, 1.0 shows the whole track (default 1.0)
//! - `--start`: normalized pan offset of the left edge (default 0.0)
//! - `--points`: number of leading points to print per channel (default 8)
//! - `--detail`: also decode the visible slice into a detail source
//! - `--config`: YAML config file (default: the standard config location)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use wavescope_core::config::{default_config_path, load_config};
use wavescope_core::{Bounds, PlotModel, WaveformConfig, WaveformSource};
use wavescope_decode::{open_detail, open_source, probe, pump_until_done, DecodeOptions};

const SOURCE_ID: &str = "input";
const DETAIL_ID: &str = "input-detail";
const IDLE: Duration = Duration::from_millis(2);

struct Args {
    file: PathBuf,
    scale: f64,
    start: f64,
    points: usize,
    detail: bool,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut file = None;
    let mut scale = 1.0;
    let mut start = 0.0;
    let mut points = 8;
    let mut detail = false;
    let mut config = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scale" => {
                let value = args.next().context("--scale needs a value")?;
                scale = value.parse().with_context(|| format!("invalid scale: {}", value))?;
            }
            "--start" => {
                let value = args.next().context("--start needs a value")?;
                start = value.parse().with_context(|| format!("invalid start: {}", value))?;
            }
            "--points" => {
                let value = args.next().context("--points needs a value")?;
                points = value.parse().with_context(|| format!("invalid point count: {}", value))?;
            }
            "--detail" => detail = true,
            "--config" => {
                config = Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            other if other.starts_with("--") => bail!("unknown flag: {}", other),
            other => {
                if file.is_some() {
                    bail!("only one input file is supported");
                }
                file = Some(PathBuf::from(other));
            }
        }
    }

    let Some(file) = file else {
        bail!(
            "usage: wavescope-inspect <FILE> [--scale S] [--start X] [--points N] [--detail] [--config PATH]"
        );
    };

    Ok(Args {
        file,
        scale,
        start,
        points,
        detail,
        config,
    })
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config: WaveformConfig = load_config(&config_path);
    config
        .validate()
        .with_context(|| format!("invalid config at {:?}", config_path))?;

    let info = probe(&args.file).with_context(|| format!("failed to probe {:?}", args.file))?;
    println!("File:        {}", args.file.display());
    println!("Sample rate: {} Hz", info.sample_rate);
    println!("Channels:    {} (mixed to mono)", info.channels);
    match info.duration_secs() {
        Some(secs) => println!("Duration:    {:.2}s", secs),
        None => println!("Duration:    unknown"),
    }
    println!();

    let mut plot: PlotModel<f32> = PlotModel::new(config, Bounds::new(1024.0, 256.0));
    let handle = open_source(&mut plot, SOURCE_ID, &args.file, DecodeOptions::default())
        .with_context(|| format!("failed to start decoding {:?}", args.file))?;

    let started = Instant::now();
    let frames = pump_until_done(&mut plot, SOURCE_ID, handle, IDLE).context("decode failed")?;
    log::info!("Decoded {} frames in {:?}", frames, started.elapsed());

    plot.set_view(args.scale, args.start);
    let view = plot.visible_range();

    if args.detail {
        let handle = open_detail(&mut plot, DETAIL_ID, &args.file, view, DecodeOptions::default())
            .with_context(|| format!("failed to start detail decode of {:?}", args.file))?;
        let frames = pump_until_done(&mut plot, DETAIL_ID, handle, IDLE).context("detail decode failed")?;
        log::info!("Decoded {} detail frames", frames);
    }

    let identifiers: Vec<String> = plot
        .sources()
        .flat_map(|set| set.identifiers().map(str::to_string).collect::<Vec<_>>())
        .collect();
    for identifier in &identifiers {
        plot.bind(identifier);
    }

    println!(
        "View:        scale {:.3}, start {:.6} (visible {:.6}..{:.6})",
        plot.viewport().scale(),
        plot.viewport().start(),
        view.location,
        view.end()
    );
    println!("Amplitude:   {:.6}", plot.amplitude_bounds());
    println!();

    for identifier in &identifiers {
        let Some(channel) = plot.channel(identifier) else {
            continue;
        };
        let geometry = plot.geometry(identifier).copied().unwrap_or_default();

        println!("[{}]", identifier);
        println!("  len:      {} (total {})", channel.len(), channel.total_count());
        println!(
            "  range:    {:.6} .. {:.6}",
            channel.min().unwrap_or(0.0),
            channel.max().unwrap_or(0.0)
        );
        println!(
            "  geometry: {} points from index {}, offset {:.6}, step {:.6}",
            geometry.points_count, geometry.first_index, geometry.sub_pixel_offset, geometry.step_x
        );
        for point in geometry.points(channel).take(args.points) {
            println!("    x={:.6} y={:.6}", point.x, point.y);
        }
    }

    Ok(())
}

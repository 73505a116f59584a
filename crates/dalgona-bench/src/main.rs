//! dalgona-bench: CLI tool for edge detection experiments and diagnostics.
//!
//! Runs the Canny pipeline on a given image file with configurable
//! thresholds, printing detailed per-stage diagnostics. Useful for:
//!
//! - Comparing estimated thresholds against hand-picked ones
//! - Checking how fixed-pass and exhaustive hysteresis differ
//! - Measuring per-stage durations to identify bottlenecks
//! - Dumping every intermediate stage as a PNG for inspection
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin dalgona-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Library log output goes to stderr; set `RUST_LOG` (for example
//! `RUST_LOG=dalgona_pipeline=debug`) to see it.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use dalgona_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use dalgona_pipeline::{
    ChannelOrder, DetectConfig, Detection, Dimensions, MAX_IMAGE_HEIGHT, RgbaImage, StageEvent,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Edge detection experiments and diagnostics for dalgona.
///
/// Runs the Canny pipeline on a given image with configurable thresholds
/// and prints detailed per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "dalgona-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Lower hysteresis threshold in [0, 1]. Leave both thresholds unset
    /// to estimate them from the image.
    #[arg(long)]
    lower: Option<f64>,

    /// Upper hysteresis threshold in [0, 1].
    #[arg(long)]
    upper: Option<f64>,

    /// Link weak edges until convergence instead of a fixed pass count.
    #[arg(long)]
    exhaustive: bool,

    /// Byte layout the pixels are read in.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_ORDER)]
    channel_order: Order,

    /// Scale the image down to at most this height before detection.
    #[arg(long, default_value_t = MAX_IMAGE_HEIGHT, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_height: u32,

    /// Run on the image as loaded, without scaling it down.
    #[arg(long)]
    full_size: bool,

    /// Write the edge mask as a PNG to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write every intermediate stage as a PNG into this directory.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full detection config as a JSON string.
    ///
    /// When provided, all other detection parameter flags are ignored.
    /// The JSON must be a valid `DetectConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Pixel byte layout selection.
#[derive(Clone, Copy, ValueEnum)]
enum Order {
    /// Bytes are red, green, blue, alpha.
    Rgba,
    /// Bytes are blue, green, red, alpha.
    Bgra,
}

/// Maps a [`ChannelOrder`] to the local CLI [`Order`] enum.
const fn order_from_pipeline(order: ChannelOrder) -> Order {
    match order {
        ChannelOrder::Rgba => Order::Rgba,
        ChannelOrder::Bgra => Order::Bgra,
    }
}

/// The CLI default order, derived from
/// [`DetectConfig::DEFAULT_CHANNEL_ORDER`] so the two cannot silently
/// diverge.
const CLI_DEFAULT_ORDER: Order = order_from_pipeline(DetectConfig::DEFAULT_CHANNEL_ORDER);

/// Build a [`DetectConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<DetectConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DetectConfig {
        lower_threshold: cli.lower,
        upper_threshold: cli.upper,
        channel_order: match cli.channel_order {
            Order::Rgba => ChannelOrder::Rgba,
            Order::Bgra => ChannelOrder::Bgra,
        },
        exhaustive_hysteresis: cli.exhaustive,
    })
}

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`,
/// defaulting to `warn`.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Logging disabled: {e}");
    }
}

/// Scale `image` down so its height is at most `max_height`, keeping the
/// aspect ratio. Smaller images are returned unchanged.
fn fit_height(image: RgbaImage, max_height: u32) -> RgbaImage {
    if image.height() <= max_height {
        return image;
    }
    let width = u64::from(image.width()) * u64::from(max_height) / u64::from(image.height());
    let width = u32::try_from(width.max(1)).unwrap_or(u32::MAX);
    info!(
        from_width = image.width(),
        from_height = image.height(),
        to_width = width,
        to_height = max_height,
        "scaling input down"
    );
    image::imageops::resize(
        &image,
        width,
        max_height,
        image::imageops::FilterType::Triangle,
    )
}

fn load_image(cli: &Cli) -> Result<RgbaImage, String> {
    let image = image::open(&cli.image_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.image_path.display()))?
        .to_rgba8();
    Ok(if cli.full_size {
        image
    } else {
        fit_height(image, cli.max_height)
    })
}

/// Write the edge mask as a grayscale PNG.
fn write_mask(path: &Path, detection: &Detection) -> Result<(), String> {
    detection
        .edges
        .to_gray_image()
        .save(path)
        .map_err(|e| format!("Error writing mask to {}: {e}", path.display()))?;
    eprintln!("Edge mask written to {}", path.display());
    Ok(())
}

/// Write each stage payload as `<index>-<stage>.png` into `dir`.
fn write_stages(dir: &Path, dimensions: Dimensions, events: Vec<StageEvent>) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;
    for (index, event) in events.into_iter().enumerate() {
        let Some(data) = event.data else {
            continue;
        };
        let path = dir.join(format!("{index}-{}.png", event.stage));
        let Some(image) = RgbaImage::from_raw(dimensions.width, dimensions.height, data) else {
            warn!(stage = %event.stage, "stage payload does not match image size");
            continue;
        };
        image
            .save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    }
    eprintln!("Stage images written to {}", dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match load_image(&cli) {
        Ok(image) => image,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let dimensions = Dimensions::new(image.width(), image.height());

    eprintln!(
        "Image: {} ({}x{})",
        cli.image_path.display(),
        dimensions.width,
        dimensions.height,
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        // Stage payloads are only kept on the first run.
        let mut events = Vec::new();
        let keep_events = run == 0 && cli.stages_dir.is_some();

        match dalgona_pipeline::diagnostics::detect_with_diagnostics(
            image.as_raw(),
            dimensions,
            &config,
            &StdClock,
            |event| {
                if keep_events {
                    events.push(event);
                }
            },
        ) {
            Ok((detection, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if run == 0 {
                    if let Some(ref path) = cli.output
                        && let Err(msg) = write_mask(path, &detection)
                    {
                        eprintln!("{msg}");
                    }
                    if let Some(ref dir) = cli.stages_dir
                        && let Err(msg) = write_stages(dir, dimensions, events)
                    {
                        eprintln!("{msg}");
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dalgona-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_config() {
        let cli = parse(&[
            "--lower",
            "0.1",
            "--upper",
            "0.4",
            "--exhaustive",
            "--channel-order",
            "bgra",
            "in.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.lower_threshold, Some(0.1));
        assert_eq!(config.upper_threshold, Some(0.4));
        assert!(config.exhaustive_hysteresis);
        assert_eq!(config.channel_order, ChannelOrder::Bgra);
    }

    #[test]
    fn defaults_match_detect_config() {
        let cli = parse(&["in.png"]);
        assert_eq!(config_from_cli(&cli).unwrap(), DetectConfig::default());
        assert_eq!(cli.max_height, MAX_IMAGE_HEIGHT);
        assert_eq!(cli.runs, 1);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "--lower",
            "0.9",
            "--config-json",
            r#"{"upper_threshold":0.5}"#,
            "in.png",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.lower_threshold, None);
        assert_eq!(config.upper_threshold, Some(0.5));
    }

    #[test]
    fn bad_config_json_is_an_error() {
        let cli = parse(&["--config-json", "{", "in.png"]);
        assert!(config_from_cli(&cli).is_err());
    }

    #[test]
    fn zero_runs_rejected() {
        let result = Cli::try_parse_from(["dalgona-bench", "--runs", "0", "in.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn fit_height_keeps_aspect_ratio() {
        let scaled = fit_height(RgbaImage::new(900, 600), 300);
        assert_eq!((scaled.width(), scaled.height()), (450, 300));
    }

    #[test]
    fn fit_height_leaves_small_images() {
        let image = fit_height(RgbaImage::new(40, 20), 300);
        assert_eq!((image.width(), image.height()), (40, 20));
    }

    #[test]
    fn fit_height_never_collapses_width() {
        let scaled = fit_height(RgbaImage::new(1, 1000), 10);
        assert_eq!((scaled.width(), scaled.height()), (1, 10));
    }
}

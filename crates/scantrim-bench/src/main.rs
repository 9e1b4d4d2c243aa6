//! scantrim-bench: CLI tool for exercising the content stage and its cache.
//!
//! Runs the content selection stage over a set of page images several
//! times against one settings session, printing per-task diagnostics.
//! Useful for:
//!
//! - Checking that unchanged pages are reused instead of re-analyzed
//! - Watching crop changes invalidate stored content boxes (`--vary-crop`)
//! - Tuning the content box finder (blur, minimum content, margin)
//! - Measuring analyzer cost against cache lookups
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin scantrim-bench -- [OPTIONS] <IMAGE_PATH>...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use scantrim_pipeline::{
    CacheOutcome, CancellationToken, ContentBoxFinder, ContentBoxFinderConfig, Dimensions,
    HeadlessUi, Point, Rotation, Settings, TaskConfig,
};
use scantrim_worker::{BatchRunner, BatchSummary, PageJob, WorkerConfig};
use tracing_subscriber::EnvFilter;

/// Content stage cache experimentation and diagnostics for scantrim.
///
/// Processes every page `--runs` times against the same settings
/// session and prints per-task cache outcomes and timings.
#[derive(Parser)]
#[command(name = "scantrim-bench", version)]
struct Cli {
    /// Page images (PNG, JPEG, BMP, TIFF, WebP).
    #[arg(required = true)]
    image_paths: Vec<PathBuf>,

    /// Dependency key comparison tolerance in pixels (0 = exact).
    #[arg(long, default_value_t = TaskConfig::DEFAULT_DEPENDENCY_TOLERANCE)]
    dependency_tolerance: f64,

    /// Gaussian blur sigma applied before binarization.
    #[arg(long, default_value_t = ContentBoxFinderConfig::DEFAULT_BLUR_SIGMA)]
    blur_sigma: f32,

    /// Minimum share of dark pixels for a page to count as non-blank.
    #[arg(long, default_value_t = ContentBoxFinderConfig::DEFAULT_MIN_CONTENT_FRACTION)]
    min_content_fraction: f64,

    /// Margin in pixels added around detected content.
    #[arg(long, default_value_t = ContentBoxFinderConfig::DEFAULT_MARGIN_PX)]
    margin: f64,

    /// Pre-rotation applied to every page, in degrees.
    #[arg(long, value_enum, default_value_t = Turn::Zero)]
    rotation: Turn,

    /// Inset of the crop area from the page edges, in pixels.
    #[arg(long, default_value_t = 0)]
    crop_inset: u32,

    /// Grow the crop inset by one pixel per run, invalidating every page.
    #[arg(long)]
    vary_crop: bool,

    /// Worker threads (0 = one per CPU).
    #[arg(long, default_value_t = WorkerConfig::DEFAULT_THREADS)]
    threads: usize,

    /// Number of runs against the same session.
    #[arg(long, default_value_t = 2, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Write one SVG overlay per page into this directory after the last run.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full task config as a JSON string.
    ///
    /// When provided, all other task parameter flags are ignored.
    /// The JSON must be a valid `TaskConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Log cache decisions (`RUST_LOG` takes precedence).
    #[arg(long, short)]
    verbose: bool,
}

/// Pre-rotation selection.
#[derive(Clone, Copy, ValueEnum)]
enum Turn {
    /// No rotation.
    #[value(name = "0")]
    Zero,
    /// Quarter turn clockwise.
    #[value(name = "90")]
    Cw90,
    /// Half turn.
    #[value(name = "180")]
    Half,
    /// Quarter turn counter-clockwise.
    #[value(name = "270")]
    Ccw90,
}

impl From<Turn> for Rotation {
    fn from(turn: Turn) -> Self {
        match turn {
            Turn::Zero => Self::None,
            Turn::Cw90 => Self::Cw90,
            Turn::Half => Self::Rotate180,
            Turn::Ccw90 => Self::Ccw90,
        }
    }
}

/// Build a [`TaskConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<TaskConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(TaskConfig {
        dependency_tolerance: cli.dependency_tolerance,
        finder: ContentBoxFinderConfig {
            blur_sigma: cli.blur_sigma,
            min_content_fraction: cli.min_content_fraction,
            margin_px: cli.margin,
            ..ContentBoxFinderConfig::default()
        },
        ..TaskConfig::default()
    })
}

/// Install the `tracing` subscriber.
fn setup_logging(verbose: bool) {
    let default = if verbose { "scantrim=debug" } else { "scantrim=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Rectangle inset by `inset` pixels from a `dims` page, clockwise from
/// the top-left. `None` when the inset leaves nothing.
fn inset_polygon(dims: Dimensions, inset: u32) -> Option<Vec<Point>> {
    if inset == 0 || inset.saturating_mul(2) >= dims.width.min(dims.height) {
        return None;
    }
    let i = f64::from(inset);
    let (w, h) = (f64::from(dims.width) - i, f64::from(dims.height) - i);
    Some(vec![
        Point::new(i, i),
        Point::new(w, i),
        Point::new(w, h),
        Point::new(i, h),
    ])
}

/// Jobs for one run. Page sizes are read from the file headers.
fn jobs_for_run(
    paths: &[PathBuf],
    sizes: &[Option<Dimensions>],
    rotation: Rotation,
    inset: u32,
) -> Vec<PageJob> {
    paths
        .iter()
        .zip(sizes)
        .map(|(path, size)| {
            let job = PageJob::from_file(path).with_rotation(rotation);
            match size.and_then(|dims| inset_polygon(rotation.rotate_dimensions(dims), inset)) {
                Some(polygon) => job.with_crop_area(polygon),
                None => job,
            }
        })
        .collect()
}

/// Page size from the image header, if readable.
fn page_size(path: &Path) -> Option<Dimensions> {
    match image::image_dimensions(path) {
        Ok((width, height)) => Some(Dimensions { width, height }),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read page size");
            None
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let config_json = serde_json::to_string(&config).unwrap_or_default();

    let settings = Arc::new(Settings::new());
    let analyzer = Arc::new(ContentBoxFinder::new(config.finder.clone()));
    let runner = match BatchRunner::new(
        Arc::clone(&settings),
        analyzer,
        config,
        &WorkerConfig {
            threads: cli.threads,
        },
    ) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rotation = Rotation::from(cli.rotation);
    let sizes: Vec<Option<Dimensions>> = cli.image_paths.iter().map(|p| page_size(p)).collect();

    eprintln!("Pages: {}", cli.image_paths.len());
    eprintln!("Config: {config_json}");
    eprintln!("Threads: {}", runner.threads());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let token = CancellationToken::new();
    let mut ui = HeadlessUi::new(Arc::clone(&settings));
    let mut summaries = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let step = if cli.vary_crop {
            u32::try_from(run).unwrap_or(u32::MAX)
        } else {
            0
        };
        let inset = cli.crop_inset.saturating_add(step);
        let jobs = jobs_for_run(&cli.image_paths, &sizes, rotation, inset);

        let summary = match runner.run(jobs, &token, &mut ui) {
            Ok(summary) => summary,
            Err(e) => {
                eprintln!("Worker error: {e}");
                return ExitCode::FAILURE;
            }
        };

        if cli.json {
            match serde_json::to_string_pretty(&summary.diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", summary.report());
        }
        summaries.push(summary);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if let Some(ref dir) = cli.svg
        && let Err(e) = write_overlays(dir, &ui, &config_json)
    {
        eprintln!("Error writing SVG overlays to {}: {e}", dir.display());
        return ExitCode::FAILURE;
    }

    if cli.runs > 1 {
        print_multi_run_summary(&summaries);
    }

    if summaries.iter().all(|s| s.completed() == 0) {
        eprintln!("No page could be processed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Write one overlay per page shown in `ui`.
fn write_overlays(dir: &Path, ui: &HeadlessUi, config_json: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for view in ui.views() {
        let overlay = scantrim_export::PageOverlay::from_view(view);
        let title = view.page().to_string();
        let stem = view
            .page()
            .image()
            .path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("page");
        let metadata = scantrim_export::SvgMetadata {
            title: Some(&title),
            description: None,
            config_json: Some(config_json),
        };
        let svg = scantrim_export::to_svg(&overlay, &metadata);
        let path = dir.join(format!("{stem}-{}.svg", view.page().image().page()));
        std::fs::write(&path, &svg)?;
        eprintln!("SVG written to {} ({} bytes)", path.display(), svg.len());
    }
    Ok(())
}

/// Print cache outcomes and timings across runs.
fn print_multi_run_summary(summaries: &[BatchSummary]) {
    println!();
    println!("Summary ({} runs)\n{}", summaries.len(), "=".repeat(72));
    println!(
        "{:<5} {:>8} {:>10} {:>11} {:>7} {:>13} {:>12}",
        "Run", "Reused", "Refreshed", "Recomputed", "Failed", "Analysis (ms)", "Batch (ms)"
    );
    println!("{}", "-".repeat(72));
    for (i, s) in summaries.iter().enumerate() {
        println!(
            "{:<5} {:>8} {:>10} {:>11} {:>7} {:>13.3} {:>12.3}",
            i + 1,
            s.count(CacheOutcome::Reused),
            s.count(CacheOutcome::Refreshed),
            s.count(CacheOutcome::Recomputed),
            s.failed.len(),
            s.diagnostics.total_analysis().as_secs_f64() * 1000.0,
            s.elapsed.as_secs_f64() * 1000.0,
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::try_parse_from(["scantrim-bench", "a.png", "b.png"]).unwrap();
        assert_eq!(cli.image_paths.len(), 2);
        assert_eq!(cli.runs, 2);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config, TaskConfig::default());
    }

    #[test]
    fn cli_requires_a_page() {
        assert!(Cli::try_parse_from(["scantrim-bench"]).is_err());
    }

    #[test]
    fn rotation_flag_accepts_degrees() {
        let cli = Cli::try_parse_from(["scantrim-bench", "--rotation", "270", "a.png"]).unwrap();
        assert_eq!(Rotation::from(cli.rotation), Rotation::Ccw90);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = Cli::try_parse_from([
            "scantrim-bench",
            "--margin",
            "9",
            "--config-json",
            r#"{"debug_images": true}"#,
            "a.png",
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert!(config.debug_images);
        assert!((config.finder.margin_px - ContentBoxFinderConfig::DEFAULT_MARGIN_PX).abs() < 1e-9);
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli =
            Cli::try_parse_from(["scantrim-bench", "--config-json", "{", "a.png"]).unwrap();
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn inset_polygon_shrinks_page() {
        let dims = Dimensions {
            width: 100,
            height: 50,
        };
        assert_eq!(inset_polygon(dims, 0), None);
        assert_eq!(inset_polygon(dims, 25), None);
        let polygon = inset_polygon(dims, 3).unwrap();
        assert_eq!(polygon[0], Point::new(3.0, 3.0));
        assert_eq!(polygon[2], Point::new(97.0, 47.0));
    }

    #[test]
    fn jobs_without_size_stay_uncropped() {
        let paths = vec![PathBuf::from("a.png"), PathBuf::from("b.png")];
        let sizes = vec![
            Some(Dimensions {
                width: 40,
                height: 20,
            }),
            None,
        ];
        let jobs = jobs_for_run(&paths, &sizes, Rotation::Cw90, 2);
        assert_eq!(
            jobs[0].crop_area.as_ref().unwrap()[2],
            Point::new(18.0, 38.0)
        );
        assert!(jobs[1].crop_area.is_none());
        assert_eq!(jobs[1].rotation, Rotation::Cw90);
    }
}

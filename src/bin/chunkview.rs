//! Command-line front-end for chunkview.
//!
//! Loads configuration from (in precedence order): defaults, config file, environment variables
//! (`CHUNKVIEW_*`), and CLI flags. Loads a two-column CSV, then issues one view (or a short
//! playback run) and prints the downsampled bucket count and the window aggregates.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chunkview::playback::Advance;
use chunkview::telemetry::{ViewEvent, ViewEventListener};
use chunkview::{target_points, HeaderMode, Playhead, ViewConfig, ViewCore, ViewError, ViewUpdate};
use clap::Parser;
use config::{Config, Environment, File};

// ---------- CLI ----------

/// Scrub through a large two-column CSV time series.
#[derive(Parser, Debug)]
#[command(name = "chunkview", version, about)]
pub struct Cli {
    /// CSV file with `x,y` rows.
    #[arg(required_unless_present = "validate_config")]
    pub input: Option<PathBuf>,

    /// Path to config file (TOML). If omitted, `chunkview.toml` is loaded when it exists.
    #[arg(long, env = "CHUNKVIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Do not load any config file; use defaults + env + CLI only.
    #[arg(long, default_value_t = false)]
    pub no_config: bool,

    /// Load and validate config (file + env + CLI), print the effective values, then exit.
    #[arg(long, default_value_t = false)]
    pub validate_config: bool,

    /// First row of the view.
    #[arg(long)]
    pub start: Option<usize>,

    /// Rows per view.
    #[arg(long)]
    pub window: Option<usize>,

    /// Plot width in pixels; with `--ratio` this sets the point budget.
    #[arg(long)]
    pub width: Option<usize>,

    /// Pixels per downsampled point.
    #[arg(long)]
    pub ratio: Option<usize>,

    /// Number of playback steps to run after the first view.
    #[arg(long, default_value_t = 0)]
    pub play: usize,

    /// Rows to advance per playback step.
    #[arg(long)]
    pub step: Option<usize>,

    /// Wrap around at the end of the dataset instead of stopping (`--wrap true`).
    #[arg(long)]
    pub wrap: Option<bool>,

    /// Print every core event to stderr.
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

// ---------- File/env config (all optional for partial config) ----------

/// Top-level config as read from file + env. Every field optional for layering.
#[derive(Debug, Default, serde::Deserialize)]
pub struct FileConfig {
    pub chunk_size: Option<usize>,
    pub header: Option<HeaderMode>,
    pub delimiter: Option<String>,
    pub release_before_load: Option<bool>,
    pub parallel_min_rows: Option<usize>,
    pub slow_computation_ms: Option<u64>,
    pub window: Option<usize>,
    pub step: Option<usize>,
    pub wrap: Option<bool>,
    pub width: Option<usize>,
    pub ratio: Option<usize>,
}

/// View options derived from config + env + CLI.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub playhead: Playhead,
    pub width: usize,
    pub ratio: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            playhead: Playhead::default(),
            width: 1000,
            ratio: 2,
        }
    }
}

/// Load merged config. CLI overrides file/env.
fn load_config(cli: &Cli) -> Result<(ViewConfig, RunOptions), ViewError> {
    let mut builder = Config::builder();

    if !cli.no_config {
        if let Some(ref path) = cli.config {
            if !path.exists() {
                return Err(ViewError::ConfigError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.as_path()).required(true));
        } else {
            let default_path = PathBuf::from("chunkview.toml");
            if default_path.exists() {
                builder = builder.add_source(File::from(default_path.as_path()).required(false));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("CHUNKVIEW")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .ignore_empty(true),
    );

    let merged = builder
        .build()
        .map_err(|e| ViewError::ConfigError(e.to_string()))?;
    let partial: FileConfig = merged
        .try_deserialize()
        .map_err(|e| ViewError::ConfigError(e.to_string()))?;

    let mut view_config = ViewConfig::default();
    let mut options = RunOptions::default();
    merge_config(&mut view_config, &mut options, &partial)?;

    if let Some(n) = cli.start {
        options.playhead.start = n;
    }
    if let Some(n) = cli.window {
        options.playhead.window = n;
    }
    if let Some(n) = cli.step {
        options.playhead.step = n;
    }
    if let Some(b) = cli.wrap {
        options.playhead.wrap = b;
    }
    if let Some(n) = cli.width {
        options.width = n;
    }
    if let Some(n) = cli.ratio {
        options.ratio = n;
    }
    Ok((view_config, options))
}

/// Merge file/env partial config. Only overwrites fields that are `Some`.
fn merge_config(
    base: &mut ViewConfig,
    options: &mut RunOptions,
    partial: &FileConfig,
) -> Result<(), ViewError> {
    if let Some(n) = partial.chunk_size {
        if n == 0 {
            return Err(ViewError::ConfigError(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        base.chunk_size = n;
    }
    if let Some(h) = partial.header {
        base.header = h;
    }
    if let Some(ref d) = partial.delimiter {
        match d.as_bytes() {
            [b] if b.is_ascii() => base.delimiter = *b,
            _ => {
                return Err(ViewError::ConfigError(format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    d
                )))
            }
        }
    }
    if let Some(b) = partial.release_before_load {
        base.release_before_load = b;
    }
    if let Some(n) = partial.parallel_min_rows {
        base.parallel_min_rows = n;
    }
    if let Some(ms) = partial.slow_computation_ms {
        base.slow_computation_threshold = Duration::from_millis(ms);
    }
    if let Some(n) = partial.window {
        options.playhead.window = n;
    }
    if let Some(n) = partial.step {
        options.playhead.step = n;
    }
    if let Some(b) = partial.wrap {
        options.playhead.wrap = b;
    }
    if let Some(n) = partial.width {
        options.width = n;
    }
    if let Some(n) = partial.ratio {
        options.ratio = n;
    }
    Ok(())
}

/// Forwards core events to stderr.
#[derive(Debug)]
struct StderrListener {
    verbose: bool,
}

impl ViewEventListener for StderrListener {
    fn on_event(&self, event: ViewEvent) {
        match event {
            ViewEvent::IngestFailed { error } => eprintln!("load failed: {}", error),
            ViewEvent::ContextFailure { worker, error } => {
                eprintln!("{} failure: {}", worker.thread_name(), error)
            }
            ViewEvent::WorkerPanicked { worker } => eprintln!("{} panicked", worker.thread_name()),
            other if self.verbose => eprintln!("{:?}", other),
            _ => {}
        }
    }
}

fn print_view(core: &mut ViewCore, playhead: &Playhead, threshold: usize) -> Result<(), Box<dyn std::error::Error>> {
    core.request_view(playhead.start, playhead.window, threshold)?;
    let (downsampled, aggregated) = core.wait_for_view(Duration::from_secs(30))?;

    print!("start={} window={}", playhead.start, playhead.window);
    if let Some(ViewUpdate::Downsampled { stride, result, .. }) = downsampled {
        print!(" stride={} buckets={}", stride, result.len());
    }
    if let Some(ViewUpdate::Aggregated { result, .. }) = aggregated {
        print!(
            " count={} min={} max={} mean={:.6} variance={:.6} std_dev={:.6}",
            result.count,
            result.min,
            result.max,
            result.mean,
            result.variance,
            result.std_dev()
        );
    }
    println!();
    Ok(())
}

// ---------- Main ----------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (mut view_config, options) = load_config(&cli).map_err(|e| {
        eprintln!("config error: {}", e);
        e
    })?;

    if cli.validate_config {
        println!("chunk_size={}", view_config.chunk_size);
        println!("header={:?}", view_config.header);
        println!("delimiter={}", view_config.delimiter as char);
        println!("release_before_load={}", view_config.release_before_load);
        println!("window={}", options.playhead.window);
        println!("step={}", options.playhead.step);
        println!("wrap={}", options.playhead.wrap);
        println!("threshold={}", target_points(options.width, options.ratio));
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .ok_or_else(|| ViewError::ConfigError("an input file is required".to_string()))?;

    view_config.event_listener = Arc::new(StderrListener { verbose: cli.verbose });
    let mut core = ViewCore::with_config(view_config)?;

    let report = core.load_path(&input).map_err(|e| {
        eprintln!("failed to load {}: {}", input.display(), e);
        e
    })?;
    println!(
        "rows={} invalid_rows={} elapsed_ms={:.1}",
        report.total_rows,
        report.invalid_rows,
        report.elapsed_ms()
    );
    if let Some(warning) = report.warning() {
        eprintln!("{}", warning);
    }

    let total = core.total_rows();
    let mut playhead = options.playhead;
    let requested_window = playhead.window;
    playhead.set_window(requested_window, total);
    let threshold = target_points(options.width, options.ratio);

    let started = Instant::now();
    print_view(&mut core, &playhead, threshold)?;
    for _ in 0..cli.play {
        let step = playhead.advance(total);
        print_view(&mut core, &playhead, threshold)?;
        if step == Advance::Finished {
            break;
        }
    }
    if cli.play > 0 {
        println!("playback_ms={:.1}", started.elapsed().as_secs_f64() * 1000.0);
    }

    Ok(())
}

//! grainflow — granular sand settling automaton in the terminal.

mod app;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use grainflow::{SeededRandom, Simulation, Status, WorldParams, worldgen};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(LogSink::for_args(&args))?;

    if let Some(ticks) = args.headless {
        return run_headless(&args, ticks);
    }

    let theme = match theme::Theme::load(args.theme.as_deref()) {
        Ok(theme) => theme,
        Err(err) => {
            warn!(error = %err, "theme not loaded, using defaults");
            theme::Theme::default()
        }
    };
    App::new(args, theme).run()
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogSink<'a> {
    File(&'a Path),
    Stderr,
    /// The interactive view owns the terminal, so stray log lines would draw over it.
    Off,
}

impl<'a> LogSink<'a> {
    fn for_args(args: &'a Args) -> Self {
        match (args.log_file.as_deref(), args.headless) {
            (Some(path), _) => Self::File(path),
            (None, Some(_)) => Self::Stderr,
            (None, None) => Self::Off,
        }
    }
}

fn init_tracing(sink: LogSink<'_>) -> Result<()> {
    let builder =
        tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env());
    let _ = match sink {
        LogSink::File(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        LogSink::Stderr => builder.with_writer(std::io::stderr).try_init(),
        LogSink::Off => Ok(()),
    };
    Ok(())
}

/// Generates a world from the CLI options and seeds its active set.
pub fn build_simulation(args: &Args, width: usize, height: usize, seed: u64) -> Result<Simulation> {
    let params = args.world_params(width, height);
    let mut rng = SeededRandom::from_seed(seed);
    let grid = worldgen::generate(&params, rng.rng_mut())
        .with_context(|| format!("generating {width}x{height} world"))?;
    let mut sim = Simulation::new(grid, rng);
    sim.initialize();
    info!(seed, width, height, "world ready");
    Ok(sim)
}

fn run_headless(args: &Args, ticks: u64) -> Result<()> {
    let defaults = WorldParams::default();
    let width = args.width.unwrap_or(defaults.width);
    let height = args.height.unwrap_or(defaults.height);
    let seed = args.seed.unwrap_or_else(rand::random);

    let mut sim = build_simulation(args, width, height, seed)?;
    let sand_before = sim.grid().sand_count();
    sim.run(ticks);
    let stats = sim.stats();

    info!(
        iteration = stats.iteration,
        active = stats.active,
        sand = stats.sand,
        settled = stats.count(Status::Settled),
        "headless run finished"
    );
    anyhow::ensure!(
        stats.sand == sand_before,
        "sand mass changed from {sand_before} to {}",
        stats.sand
    );
    println!(
        "seed={seed} iteration={} active={} sand={} idle={} falling={} rolling={} settled={}",
        stats.iteration,
        stats.active,
        stats.sand,
        stats.count(Status::Idle),
        stats.count(Status::Falling),
        stats.count(Status::Rolling),
        stats.count(Status::Settled),
    );
    Ok(())
}

/// Granular sand settling automaton in the terminal.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "grainflow",
    version,
    about = "Granular sand settling automaton in the terminal.",
    long_about = "grainflow pours six grades of sand from a perforated stone shelf onto sloped ledges.\n\n\
        Only moving or recently disturbed grains are evaluated each tick; resting sand goes dormant \
        and is rechecked periodically.\n\n\
        CONTROLS:\n  P / Space   Pause       .  Step one tick (paused)\n  + / -       Speed       R  New world\n  Q / Esc     Quit\n\n\
        Use --theme to load a btop-style theme file. Set RUST_LOG (e.g. RUST_LOG=debug) with --log-file to trace the run; \
        without --log-file, logs go to stderr in headless mode only."
)]
pub struct Args {
    /// World width in cells. Defaults to the terminal width (400 headless).
    #[arg(long, value_name = "COLS")]
    pub width: Option<usize>,

    /// World height in cells. Defaults to twice the terminal height (300 headless).
    #[arg(long, value_name = "ROWS")]
    pub height: Option<usize>,

    /// Seed for world generation and the simulation. Random if not set.
    #[arg(short, long, value_name = "N")]
    pub seed: Option<u64>,

    /// Simulation ticks per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub tick_rate: f64,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Probability that a cell above the shelf starts filled with sand.
    #[arg(long, default_value = "0.7", value_name = "RATIO")]
    pub fill: f32,

    /// Exact number of sloped ledges (6 to 8 at random if not set).
    #[arg(long, value_name = "N")]
    pub slopes: Option<usize>,

    /// Path to theme file (btop-style theme[key]=\"value\").
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Run N ticks without a terminal, print a summary line and exit.
    #[arg(long, value_name = "N")]
    pub headless: Option<u64>,

    /// Write logs to FILE. Without it, only headless runs log (to stderr).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn world_params(&self, width: usize, height: usize) -> WorldParams {
        let mut params = WorldParams::for_size(width, height);
        params.fill_ratio = self.fill;
        if let Some(n) = self.slopes {
            params.slopes = n..=n;
        }
        params
    }
}

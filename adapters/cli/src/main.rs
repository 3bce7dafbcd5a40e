#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives Gabor Hunt sessions headlessly.

mod config;
mod observer;
mod simulation;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};
use gabor_hunt_core::{PlacementRect, Point, SessionConfig, StimulusParameters, TargetId};
use gabor_hunt_rendering::{compose_frame, PgmHost, RenderHost, Scene, SceneTarget};
use gabor_hunt_system_stimulus::render;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::simulation::SimulationOptions;

#[derive(Parser)]
#[command(author, version, about = "Headless driver for Gabor Hunt visual search sessions")]
struct Cli {
    /// Session configuration file (TOML); built-in defaults apply when omitted
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a session against a simulated observer and print its summary
    Simulate(SimulateArgs),

    /// Write a single stimulus (and the arena frame containing it) as PGM images
    Render(RenderArgs),

    /// Validate the configuration file and exit
    CheckConfig,
}

#[derive(Args)]
struct SimulateArgs {
    /// Session length in seconds
    #[arg(long, default_value_t = 60.0)]
    seconds: f64,

    /// Tick interval in milliseconds
    #[arg(long, default_value_t = 16)]
    tick_ms: u64,

    /// Seed of the simulated observer
    #[arg(long, default_value_t = 7)]
    observer_seed: u64,

    /// Override table to activate before the first tick
    #[arg(long)]
    mode: Option<String>,

    /// Directory receiving periodic PGM frames
    #[arg(long, value_hint = ValueHint::DirPath)]
    frames: Option<PathBuf>,

    /// Capture a frame every this many ticks
    #[arg(long, default_value_t = 30)]
    frame_every: u32,
}

#[derive(Args)]
struct RenderArgs {
    /// Directory receiving the PGM images
    #[arg(long, value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Carrier orientation in degrees; the configured base orientation when omitted
    #[arg(long)]
    orientation_deg: Option<f64>,

    /// Carrier phase in degrees
    #[arg(long, default_value_t = 0.0)]
    phase_deg: f64,
}

/// Entry point for the Gabor Hunt command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        CliCommand::Simulate(args) => simulate(config, args),
        CliCommand::Render(args) => render_stimulus(&config, &args),
        CliCommand::CheckConfig => {
            println!(
                "configuration ok: {}px patches, up to {} concurrent targets every {:.2}s",
                config.stimulus_size(),
                config.max_concurrent,
                config.spawn_interval_secs
            );
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn simulate(config: SessionConfig, args: SimulateArgs) -> Result<()> {
    let duration = Duration::try_from_secs_f64(args.seconds)
        .with_context(|| format!("invalid session length {}", args.seconds))?;
    let options = SimulationOptions {
        duration,
        tick: Duration::from_millis(args.tick_ms),
        observer_seed: args.observer_seed,
        mode: args.mode,
        frame_every: args.frame_every,
    };

    let mut host = args.frames.map(PgmHost::new).transpose()?;
    let summary = simulation::run(
        config,
        &options,
        host.as_mut().map(|host| host as &mut dyn RenderHost),
    )?;
    if let Some(host) = &host {
        info!(
            frames = host.written().len(),
            directory = %host.directory().display(),
            "frames written"
        );
    }

    println!("spawned      {}", summary.spawned);
    println!("hits         {}", summary.hits);
    println!("misses       {}", summary.misses);
    match summary.accuracy() {
        Some(accuracy) => println!("accuracy     {:.1}%", accuracy * 100.0),
        None => println!("accuracy     n/a"),
    }
    match summary.mean_reaction {
        Some(reaction) => println!("mean rt      {} ms", reaction.as_millis()),
        None => println!("mean rt      n/a"),
    }
    println!("best streak  {}", summary.best_streak);
    println!("score        {}", summary.score);
    println!("level        {}", summary.level);
    Ok(())
}

fn render_stimulus(config: &SessionConfig, args: &RenderArgs) -> Result<()> {
    let size = config.stimulus_size();
    let parameters = StimulusParameters {
        size,
        wavelength: config.wavelength,
        orientation: args.orientation_deg.unwrap_or(config.orientation_deg).to_radians(),
        phase: args.phase_deg.to_radians(),
        sigma: config.sigma,
        contrast: config.contrast,
        brightness: config.brightness,
        quantization_levels: config.quantization_levels,
        background: config.background_color,
    };
    let pixels = render(&parameters).context("failed to render stimulus")?;

    let arena = config.arena();
    let placement = PlacementRect::centered(
        Point::new(arena.width() / 2.0, arena.height() / 2.0),
        size,
    );
    let mut host = PgmHost::new(&args.output)?;
    host.present_stimulus(placement, &pixels)?;

    let scene = Scene::new(
        arena,
        config.background_color,
        config.brightness,
        vec![SceneTarget {
            id: TargetId::new(0),
            placement,
            visible: 1.0,
            pixels,
        }],
    );
    host.present_frame(&compose_frame(&scene).context("failed to compose frame")?)?;

    for path in host.written() {
        println!("{}", path.display());
    }
    Ok(())
}

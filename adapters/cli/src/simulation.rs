//! Headless session driven by the simulated observer.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use gabor_hunt_core::{Command, Event, SessionConfig, SessionSummary};
use gabor_hunt_rendering::{compose_frame, RenderHost, Scene, SceneTarget};
use gabor_hunt_system_spawning::{Config, SpawnInputs, SpawnScheduler};
use gabor_hunt_world::{self as world, query, Session};
use tracing::{debug, info};

use crate::observer::SimulatedObserver;

/// Parameters of a headless run.
#[derive(Clone, Debug)]
pub(crate) struct SimulationOptions {
    /// Host time covered by the run.
    pub(crate) duration: Duration,
    /// Host time between successive ticks.
    pub(crate) tick: Duration,
    /// Seed of the simulated observer.
    pub(crate) observer_seed: u64,
    /// Override table activated before the first tick.
    pub(crate) mode: Option<String>,
    /// Capture a frame every this many ticks, when a host is attached.
    pub(crate) frame_every: u32,
}

/// Runs a complete session and returns its summary.
pub(crate) fn run(
    config: SessionConfig,
    options: &SimulationOptions,
    mut host: Option<&mut dyn RenderHost>,
) -> Result<SessionSummary> {
    if options.tick.is_zero() {
        bail!("tick interval must be positive");
    }
    if let Some(mode) = options.mode.as_deref() {
        if config.mode(mode).is_none() {
            bail!("unknown mode `{mode}`");
        }
    }

    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut session = Session::new(config).context("session configuration rejected")?;
    let mut observer = SimulatedObserver::new(options.observer_seed);
    info!(
        seed = query::config(&session).seed,
        duration = ?options.duration,
        tick = ?options.tick,
        "simulation started"
    );

    if options.mode.is_some() {
        let _ = dispatch(
            &mut session,
            Command::SetMode {
                mode: options.mode.clone(),
            },
        );
    }

    let mut now = Duration::ZERO;
    let mut tick_index: u32 = 0;
    while now <= options.duration {
        let events = dispatch(&mut session, Command::Tick { now });
        drive_spawning(&mut session, &mut scheduler, events);

        let mut selections = Vec::new();
        let view = query::target_view(&session);
        observer.observe(view.iter(), now, &mut selections);
        for command in selections {
            let _ = dispatch(&mut session, command);
        }

        if let Some(host) = host.as_deref_mut() {
            if options.frame_every > 0 && tick_index % options.frame_every == 0 {
                present(&session, host)?;
            }
        }

        now = now.saturating_add(options.tick);
        tick_index = tick_index.wrapping_add(1);
    }

    let summary = query::summary(&session);
    info!(
        score = summary.score,
        hits = summary.hits,
        misses = summary.misses,
        "simulation finished"
    );
    Ok(summary)
}

fn dispatch(session: &mut Session, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(session, command, &mut events);
    for event in &events {
        debug!(?event, "session event");
    }
    events
}

fn drive_spawning(session: &mut Session, scheduler: &mut SpawnScheduler, pending: Vec<Event>) {
    let mut events = pending;
    while !events.is_empty() {
        let mut commands = Vec::new();
        scheduler.handle(
            &events,
            SpawnInputs {
                state: query::session_state(session),
                active_targets: query::active_count(session),
                config: query::config(session),
                difficulty: query::difficulty(session),
                overrides: query::active_overrides(session),
            },
            &mut commands,
        );

        events.clear();
        for command in commands {
            events.extend(dispatch(session, command));
        }
    }
}

fn present(session: &Session, host: &mut dyn RenderHost) -> Result<()> {
    let targets = query::targets(session)
        .map(|target| SceneTarget::new(&target.snapshot(), target.pixels().clone()))
        .collect();
    let config = query::config(session);
    let scene = Scene::new(
        query::arena(session),
        config.background_color,
        config.brightness,
        targets,
    );
    let frame = compose_frame(&scene).context("failed to compose frame")?;
    host.present_frame(&frame)
}

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use gabor_hunt_core::{
    Command, DifficultyState, Event, ModeOverrides, SessionConfig, SessionState,
    SpawnSkipReason, TargetId, TargetPlan,
};
use gabor_hunt_system_spawning::{Config, SpawnInputs, SpawnScheduler};
use gabor_hunt_world::{self as world, query, Session};

fn advanced(millis: u64) -> [Event; 1] {
    [Event::TimeAdvanced {
        dt: Duration::from_millis(millis),
    }]
}

fn inputs<'a>(
    config: &'a SessionConfig,
    difficulty: &'a DifficultyState,
    active_targets: usize,
) -> SpawnInputs<'a> {
    SpawnInputs {
        state: SessionState::Running,
        active_targets,
        config,
        difficulty,
        overrides: None,
    }
}

fn plans(commands: &[Command]) -> Vec<&TargetPlan> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::SpawnTarget { plan } => Some(&**plan),
            _ => None,
        })
        .collect()
}

fn skips(commands: &[Command]) -> Vec<SpawnSkipReason> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::SkipSpawn { reason } => Some(*reason),
            _ => None,
        })
        .collect()
}

#[test]
fn emits_multiple_spawn_commands_for_large_dt() {
    let config = SessionConfig {
        spawn_interval_secs: 0.5,
        max_concurrent: 10,
        ..SessionConfig::default()
    };
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(2_000), inputs(&config, &difficulty, 0), &mut commands);

    assert_eq!(plans(&commands).len(), 4, "expected one spawn per interval");
    assert!(skips(&commands).is_empty());
    let bounds = config
        .arena()
        .placement_bounds(config.stimulus_size())
        .expect("default arena fits");
    for plan in plans(&commands) {
        assert_eq!(plan.parameters.size, config.stimulus_size());
        assert_eq!(plan.pixels.size(), plan.parameters.size);
        assert!(bounds.contains(plan.position));
        assert!(plan.duration >= difficulty.fade_bounds.min);
        assert_eq!(plan.scoring.max_perfect_score, config.max_perfect_score);
        assert_eq!(plan.scoring.exponent, difficulty.scoring_exponent);
    }
}

#[test]
fn attempts_at_capacity_are_dropped_not_retried() {
    let config = SessionConfig {
        spawn_interval_secs: 0.5,
        max_concurrent: 3,
        ..SessionConfig::default()
    };
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(2_000), inputs(&config, &difficulty, 2), &mut commands);
    assert_eq!(plans(&commands).len(), 1, "only one slot was free");
    assert_eq!(skips(&commands), vec![SpawnSkipReason::AtCapacity; 3]);
    assert_eq!(scheduler.accumulated(), Duration::ZERO);

    commands.clear();
    scheduler.handle(&advanced(400), inputs(&config, &difficulty, 0), &mut commands);
    assert!(commands.is_empty(), "dropped attempts must not be replayed");
}

#[test]
fn pausing_resets_accumulator() {
    let config = SessionConfig::default();
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::new(Duration::from_secs(1), 0x4d59_5df4));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(500), inputs(&config, &difficulty, 0), &mut commands);
    assert!(commands.is_empty(), "no spawn before full interval");

    let paused = SpawnInputs {
        state: SessionState::Paused,
        ..inputs(&config, &difficulty, 0)
    };
    scheduler.handle(&advanced(5_000), paused, &mut commands);
    assert!(commands.is_empty(), "paused sessions never spawn");
    assert_eq!(scheduler.accumulated(), Duration::ZERO);

    scheduler.handle(&advanced(500), inputs(&config, &difficulty, 0), &mut commands);
    assert!(commands.is_empty(), "accumulator resets while paused");

    scheduler.handle(&advanced(500), inputs(&config, &difficulty, 0), &mut commands);
    assert_eq!(commands.len(), 1, "expected spawn after full interval");
}

#[test]
fn unplannable_attempts_are_skipped_and_scheduling_continues() {
    let cramped = SessionConfig {
        arena_width: 100.0,
        arena_height: 100.0,
        ..SessionConfig::default()
    };
    let config = SessionConfig::default();
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(3_000), inputs(&cramped, &difficulty, 0), &mut commands);
    assert!(plans(&commands).is_empty());
    assert_eq!(skips(&commands), vec![SpawnSkipReason::Misconfigured; 3]);
    assert_eq!(scheduler.accumulated(), Duration::ZERO);

    commands.clear();
    scheduler.handle(&advanced(1_000), inputs(&config, &difficulty, 0), &mut commands);
    assert_eq!(plans(&commands).len(), 1);
}

#[test]
fn extreme_numeric_settings_are_clamped_while_planning() {
    let config = SessionConfig {
        spawn_interval_secs: 0.1,
        max_concurrent: 100,
        orientation_deg: 0.0,
        orientation_jitter_deg: 1.0e308,
        drift_speed_unit: 1.0e308,
        fader_min_visibility: -1.0e308,
        fader_max_visibility: 1.0e308,
        ..SessionConfig::default()
    };
    assert_eq!(config.validate(), Ok(()));
    let difficulty = DifficultyState::initial(&config);
    let overrides = ModeOverrides {
        fader_probability: Some(0.5),
        drift_probability: Some(1.0),
    };
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(
        &advanced(3_000),
        SpawnInputs {
            overrides: Some(&overrides),
            ..inputs(&config, &difficulty, 0)
        },
        &mut commands,
    );

    let planned = plans(&commands);
    assert_eq!(planned.len(), 30);
    assert!(skips(&commands).is_empty());
    for plan in planned {
        let degrees = plan.parameters.orientation.to_degrees();
        assert!(degrees.abs() <= 180.0 + 1e-9, "{degrees}");
        let velocity = plan.drift.expect("every target drifts");
        assert!(velocity.speed().is_finite());
        assert!(velocity.speed() <= 10_000.0 * 2.1 + 1e-6);
        if let gabor_hunt_core::FadeKind::Fader { peak_visibility } = plan.fade {
            assert!((0.01..=1.0).contains(&peak_visibility));
        }
    }
}

#[test]
fn negative_margins_skip_planning_instead_of_panicking() {
    let config = SessionConfig {
        arena_margin: -1.0e308,
        ..SessionConfig::default()
    };
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(2_000), inputs(&config, &difficulty, 0), &mut commands);

    assert_eq!(skips(&commands), vec![SpawnSkipReason::Misconfigured; 2]);
}

#[test]
fn dropped_attempts_surface_as_session_events() {
    let config = SessionConfig {
        spawn_interval_secs: 0.5,
        max_concurrent: 1,
        ..SessionConfig::default()
    };
    let mut session = Session::new(config.clone()).expect("valid config");
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));

    let mut events = Vec::new();
    world::apply(
        &mut session,
        Command::Tick {
            now: Duration::ZERO,
        },
        &mut events,
    );
    events.clear();
    world::apply(
        &mut session,
        Command::Tick {
            now: Duration::from_millis(1_000),
        },
        &mut events,
    );

    let mut commands = Vec::new();
    scheduler.handle(
        &events,
        SpawnInputs {
            state: query::session_state(&session),
            active_targets: query::active_count(&session),
            config: query::config(&session),
            difficulty: query::difficulty(&session),
            overrides: query::active_overrides(&session),
        },
        &mut commands,
    );

    let mut events = Vec::new();
    for command in commands {
        world::apply(&mut session, command, &mut events);
    }

    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, Event::TargetSpawned { .. }))
            .count(),
        1
    );
    assert!(events.contains(&Event::SpawnSkipped {
        reason: SpawnSkipReason::AtCapacity,
    }));
    assert_eq!(query::active_count(&session), 1);
}

#[test]
fn mode_overrides_replace_adaptive_fractions() {
    let config = SessionConfig {
        spawn_interval_secs: 0.1,
        max_concurrent: 100,
        ..SessionConfig::default()
    };
    let difficulty = DifficultyState::initial(&config);
    let overrides = ModeOverrides {
        fader_probability: Some(1.0),
        drift_probability: Some(0.0),
    };
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(
        &advanced(5_000),
        SpawnInputs {
            overrides: Some(&overrides),
            ..inputs(&config, &difficulty, 0)
        },
        &mut commands,
    );

    assert_eq!(commands.len(), 50);
    for plan in plans(&commands) {
        assert!(plan.fade.is_fader());
        assert!(plan.drift.is_none());
    }
}

#[test]
fn orientation_stays_within_jitter() {
    let config = SessionConfig {
        spawn_interval_secs: 0.1,
        max_concurrent: 100,
        orientation_deg: 30.0,
        orientation_jitter_deg: 10.0,
        phase_randomized: false,
        ..SessionConfig::default()
    };
    let difficulty = DifficultyState::initial(&config);
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut commands = Vec::new();

    scheduler.handle(&advanced(5_000), inputs(&config, &difficulty, 0), &mut commands);

    for plan in plans(&commands) {
        let degrees = plan.parameters.orientation.to_degrees();
        assert!((20.0 - 1e-9..=40.0 + 1e-9).contains(&degrees), "{degrees}");
        assert_eq!(plan.parameters.phase, 0.0);
    }
}

#[test]
fn deterministic_replay_produces_identical_sequence() {
    let first = replay(0x4d59_5df4_d0f3_3173);
    let second = replay(0x4d59_5df4_d0f3_3173);

    assert!(!first.spawns.is_empty(), "replay should spawn targets");
    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());

    let other = replay(0x1234_5678);
    assert_ne!(first.fingerprint(), other.fingerprint());
}

fn replay(seed: u64) -> ReplayOutcome {
    let config = SessionConfig {
        seed,
        spawn_interval_secs: 0.75,
        ..SessionConfig::default()
    };
    let mut session = Session::new(config.clone()).expect("valid config");
    let mut scheduler = SpawnScheduler::new(Config::from_session(&config));
    let mut outcome = ReplayOutcome::default();
    let mut host_now = Duration::ZERO;

    for command in scripted_commands() {
        if let Command::Tick { now } | Command::Resume { now } = &command {
            host_now = *now;
        }
        let mut events = Vec::new();
        world::apply(&mut session, command, &mut events);
        outcome.record(&events);
        process_spawning(&mut session, &mut scheduler, events, &mut outcome);

        let oldest = query::targets(&session).next().map(|target| target.id());
        if let Some(oldest) = oldest {
            let mut events = Vec::new();
            world::apply(
                &mut session,
                Command::Select {
                    target: oldest,
                    at: host_now,
                },
                &mut events,
            );
            outcome.record(&events);
        }
    }

    outcome.score = query::score(&session);
    outcome
}

fn process_spawning(
    session: &mut Session,
    scheduler: &mut SpawnScheduler,
    pending_events: Vec<Event>,
    outcome: &mut ReplayOutcome,
) {
    let mut events = pending_events;

    loop {
        if events.is_empty() {
            break;
        }

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

        if commands.is_empty() {
            break;
        }

        events.clear();
        for command in commands {
            if let Command::SpawnTarget { plan } = &command {
                outcome.spawns.push(SpawnRecord {
                    x: plan.position.x.to_bits(),
                    y: plan.position.y.to_bits(),
                    duration: plan.duration,
                    orientation: plan.parameters.orientation.to_bits(),
                    fader: plan.fade.is_fader(),
                    drifting: plan.drift.is_some(),
                });
            }
            world::apply(session, command, &mut events);
        }
        outcome.record(&events);
    }
}

fn scripted_commands() -> Vec<Command> {
    let tick = |millis: u64| Command::Tick {
        now: Duration::from_millis(millis),
    };
    vec![
        tick(1_000),
        tick(1_500),
        tick(2_000),
        Command::Pause,
        tick(9_000),
        Command::Resume {
            now: Duration::from_millis(10_000),
        },
        tick(11_000),
        tick(13_000),
        tick(13_100),
        tick(16_000),
        tick(20_000),
    ]
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    spawns: Vec<SpawnRecord>,
    hits: Vec<(TargetId, u32)>,
    misses: Vec<(TargetId, u32)>,
    score: u64,
}

impl ReplayOutcome {
    fn record(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::TargetHit { target, points, .. } => self.hits.push((*target, *points)),
                Event::TargetMissed { target, penalty } => self.misses.push((*target, *penalty)),
                _ => {}
            }
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SpawnRecord {
    x: u64,
    y: u64,
    duration: Duration,
    orientation: u64,
    fader: bool,
    drifting: bool,
}

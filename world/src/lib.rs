#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state management for Gabor Hunt.
//!
//! The [`Session`] owns every live target, the session clock, the adaptive
//! difficulty state and the outcome statistics. All mutation flows through
//! [`apply`]; everything else observes the session through [`query`].

mod clock;
mod stats;

use std::time::Duration;

use gabor_hunt_core::{
    Arena, Command, ConfigurationError, DifficultyState, Event, PlacementBounds, SessionConfig,
    SessionState, SpawnSkipReason, TargetId, TargetPlan,
};
use gabor_hunt_system_difficulty::DifficultyController;
use gabor_hunt_system_lifecycle::{Outcome, Target};
use gabor_hunt_system_scoring::ScoringEngine;
use tracing::{debug, info, warn};

use clock::SessionClock;
use stats::SessionStats;

#[derive(Clone, Debug)]
struct LiveTarget {
    target: Target,
    bounds: PlacementBounds,
}

/// Represents the authoritative Gabor Hunt session state.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    arena: Arena,
    state: SessionState,
    clock: SessionClock,
    targets: Vec<LiveTarget>,
    next_target_id: u32,
    difficulty: DifficultyState,
    controller: DifficultyController,
    scoring: ScoringEngine,
    stats: SessionStats,
}

impl Session {
    /// Creates a running session after validating the provided configuration.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let session = Self {
            arena: config.arena(),
            state: SessionState::Running,
            clock: SessionClock::default(),
            targets: Vec::new(),
            next_target_id: 0,
            difficulty: DifficultyState::initial(&config),
            controller: DifficultyController::from_config(&config),
            scoring: ScoringEngine::from_config(&config),
            stats: SessionStats::default(),
            config,
        };
        info!(
            patch_size = session.config.patch_size,
            max_concurrent = session.config.max_concurrent,
            "session created"
        );
        Ok(session)
    }

    fn tick(&mut self, now: Duration, out_events: &mut Vec<Event>) {
        let dt = self.clock.advance_to(now);
        out_events.push(Event::TimeAdvanced { dt });

        let session_time = self.clock.now();
        let mut expired = Vec::new();
        for live in &mut self.targets {
            if let Some(Outcome::Miss) = live.target.advance(session_time, dt, &live.bounds) {
                expired.push(live.target.id());
            }
        }

        if expired.is_empty() {
            return;
        }
        for target in expired {
            self.record_miss(target, out_events);
        }
        self.controller.recompute(&mut self.difficulty, out_events);
        self.retain_active();
    }

    fn spawn(&mut self, plan: TargetPlan, out_events: &mut Vec<Event>) {
        if self.state == SessionState::Paused {
            out_events.push(Event::SpawnSkipped {
                reason: SpawnSkipReason::Paused,
            });
            return;
        }
        if self.targets.len() >= self.config.max_concurrent {
            debug!(active = self.targets.len(), "spawn dropped at capacity");
            out_events.push(Event::SpawnSkipped {
                reason: SpawnSkipReason::AtCapacity,
            });
            return;
        }

        let size = plan.parameters.size;
        let bounds = match self.arena.placement_bounds(size) {
            Ok(bounds) if plan.pixels.size() == size => bounds,
            Ok(_) => {
                warn!(
                    size,
                    pixels = plan.pixels.size(),
                    "spawn dropped: pixel buffer does not match stimulus size"
                );
                out_events.push(Event::SpawnSkipped {
                    reason: SpawnSkipReason::Misconfigured,
                });
                return;
            }
            Err(error) => {
                warn!(%error, "spawn dropped: stimulus does not fit the arena");
                out_events.push(Event::SpawnSkipped {
                    reason: SpawnSkipReason::Misconfigured,
                });
                return;
            }
        };

        let mut plan = plan;
        plan.position.x = plan.position.x.clamp(bounds.min_x, bounds.max_x);
        plan.position.y = plan.position.y.clamp(bounds.min_y, bounds.max_y);

        let id = TargetId::new(self.next_target_id);
        self.next_target_id = self.next_target_id.wrapping_add(1);
        let target = Target::spawn(id, plan, self.clock.now());
        out_events.push(Event::TargetSpawned {
            target: id,
            placement: target.placement(),
            fade: target.fade(),
            drifting: target.velocity().is_some(),
        });
        self.stats.record_spawn();
        self.targets.push(LiveTarget { target, bounds });
    }

    fn select(&mut self, target: TargetId, at: Duration, out_events: &mut Vec<Event>) {
        if self.state == SessionState::Paused {
            debug!(target = target.get(), "selection ignored while paused");
            return;
        }
        let at = self.clock.session_time_at(at);
        let Some(live) = self
            .targets
            .iter_mut()
            .find(|live| live.target.id() == target)
        else {
            debug!(target = target.get(), "selection of unknown target ignored");
            return;
        };

        match live.target.select(at) {
            Some(Outcome::Hit { points, elapsed }) => {
                self.scoring.record_hit(&mut self.difficulty, points);
                self.stats.record_hit(elapsed);
                out_events.push(Event::TargetHit {
                    target,
                    points,
                    elapsed,
                });
                out_events.push(Event::ScoreChanged {
                    score: self.difficulty.score,
                });
            }
            Some(Outcome::Miss) => self.record_miss(target, out_events),
            None => return,
        }

        self.controller.recompute(&mut self.difficulty, out_events);
        self.retain_active();
    }

    fn record_miss(&mut self, target: TargetId, out_events: &mut Vec<Event>) {
        let penalty = self.scoring.record_miss(&mut self.difficulty);
        self.stats.record_miss();
        out_events.push(Event::TargetMissed { target, penalty });
        out_events.push(Event::ScoreChanged {
            score: self.difficulty.score,
        });
    }

    fn retain_active(&mut self) {
        self.targets.retain(|live| !live.target.is_resolved());
    }

    fn clear(&mut self, out_events: &mut Vec<Event>) {
        for live in self.targets.drain(..) {
            out_events.push(Event::TargetCleared {
                target: live.target.id(),
            });
        }
    }

    fn set_mode(&mut self, mode: Option<String>, out_events: &mut Vec<Event>) {
        if let Some(name) = mode.as_deref() {
            if self.config.mode(name).is_none() {
                warn!(mode = name, "unknown mode ignored");
                return;
            }
        }
        if self.config.active_mode == mode {
            return;
        }
        info!(mode = mode.as_deref().unwrap_or("adaptive"), "mode changed");
        self.config.active_mode = mode.clone();
        out_events.push(Event::ModeChanged { mode });
    }

    fn reset(&mut self, out_events: &mut Vec<Event>) {
        self.clear(out_events);
        self.difficulty = DifficultyState::initial(&self.config);
        self.stats = SessionStats::default();
        info!("session reset");
        out_events.push(Event::ScoreChanged { score: 0 });
    }
}

/// Applies the provided command to the session, mutating state deterministically.
pub fn apply(session: &mut Session, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { now } => {
            if session.state == SessionState::Running {
                session.tick(now, out_events);
            }
        }
        Command::SpawnTarget { plan } => session.spawn(*plan, out_events),
        Command::SkipSpawn { reason } => out_events.push(Event::SpawnSkipped { reason }),
        Command::Select { target, at } => session.select(target, at, out_events),
        Command::Pause => {
            if session.state == SessionState::Running {
                session.state = SessionState::Paused;
                info!(session_time = ?session.clock.now(), "session paused");
                out_events.push(Event::SessionPaused);
            }
        }
        Command::Resume { now } => {
            if session.state == SessionState::Paused {
                session.state = SessionState::Running;
                session.clock.resume_at(now);
                info!(session_time = ?session.clock.now(), "session resumed");
                out_events.push(Event::SessionResumed);
            }
        }
        Command::SetMode { mode } => session.set_mode(mode, out_events),
        Command::Clear => session.clear(out_events),
        Command::ResetSession => session.reset(out_events),
    }
}

/// Query functions that provide read-only access to the session state.
pub mod query {
    use std::time::Duration;

    use super::Session;
    use gabor_hunt_core::{
        Arena, DifficultyState, Level, ModeOverrides, SessionConfig, SessionState, SessionSummary,
        TargetId, TargetView,
    };
    use gabor_hunt_system_lifecycle::Target;

    /// Reports whether the session clock is advancing.
    #[must_use]
    pub fn session_state(session: &Session) -> SessionState {
        session.state
    }

    /// Session time reached by the most recent tick.
    #[must_use]
    pub fn session_time(session: &Session) -> Duration {
        session.clock.now()
    }

    /// Configuration the session runs with.
    #[must_use]
    pub fn config(session: &Session) -> &SessionConfig {
        &session.config
    }

    /// Arena targets are placed in.
    #[must_use]
    pub fn arena(session: &Session) -> Arena {
        session.arena
    }

    /// Number of live targets.
    #[must_use]
    pub fn active_count(session: &Session) -> usize {
        session.targets.len()
    }

    /// Captures a read-only view of all live targets.
    #[must_use]
    pub fn target_view(session: &Session) -> TargetView {
        TargetView::from_snapshots(
            session
                .targets
                .iter()
                .map(|live| live.target.snapshot())
                .collect(),
        )
    }

    /// Iterator over live targets in spawn order.
    pub fn targets(session: &Session) -> impl Iterator<Item = &Target> {
        session.targets.iter().map(|live| &live.target)
    }

    /// Looks up a live target by identifier.
    #[must_use]
    pub fn target(session: &Session, id: TargetId) -> Option<&Target> {
        targets(session).find(|target| target.id() == id)
    }

    /// Adaptive difficulty state driving new spawns.
    #[must_use]
    pub fn difficulty(session: &Session) -> &DifficultyState {
        &session.difficulty
    }

    /// Cumulative score.
    #[must_use]
    pub fn score(session: &Session) -> u64 {
        session.difficulty.score
    }

    /// Current difficulty level.
    #[must_use]
    pub fn level(session: &Session) -> Level {
        session.difficulty.level
    }

    /// Override table selected by the active mode, if any.
    #[must_use]
    pub fn active_overrides(session: &Session) -> Option<&ModeOverrides> {
        session.config.active_overrides()
    }

    /// Aggregated outcome statistics.
    #[must_use]
    pub fn summary(session: &Session) -> SessionSummary {
        session.stats.summary(&session.difficulty)
    }
}

//! Outcome statistics accumulated by the session.

use std::time::Duration;

use gabor_hunt_core::{DifficultyState, SessionSummary};

#[derive(Clone, Debug, Default)]
pub(crate) struct SessionStats {
    spawned: u32,
    hits: u32,
    misses: u32,
    streak: u32,
    best_streak: u32,
    total_reaction: Duration,
}

impl SessionStats {
    pub(crate) fn record_spawn(&mut self) {
        self.spawned = self.spawned.saturating_add(1);
    }

    pub(crate) fn record_hit(&mut self, elapsed: Duration) {
        self.hits = self.hits.saturating_add(1);
        self.streak = self.streak.saturating_add(1);
        self.best_streak = self.best_streak.max(self.streak);
        self.total_reaction = self.total_reaction.saturating_add(elapsed);
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses = self.misses.saturating_add(1);
        self.streak = 0;
    }

    pub(crate) fn summary(&self, difficulty: &DifficultyState) -> SessionSummary {
        SessionSummary {
            hits: self.hits,
            misses: self.misses,
            score: difficulty.score,
            level: difficulty.level.get(),
            best_streak: self.best_streak,
            mean_reaction: (self.hits > 0).then(|| self.total_reaction / self.hits),
            spawned: self.spawned,
        }
    }
}

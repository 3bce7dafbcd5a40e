//! Seeded stand-in for a human observer selecting targets.
//!
//! Each target gets a detection threshold on its visible fraction, a reaction
//! delay and a lapse flag when the observer first sees it. Once the target
//! crosses its threshold the observer selects it after the reaction delay,
//! unless it lapsed. A target is selected at most once.

use std::{collections::BTreeMap, time::Duration};

use gabor_hunt_core::{Command, TargetId, TargetSnapshot};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

const DETECTION_THRESHOLD_MIN: f64 = 0.15;
const DETECTION_THRESHOLD_MAX: f64 = 0.65;
const REACTION_MEAN_SECS: f64 = 0.45;
const REACTION_STD_DEV_SECS: f64 = 0.12;
const REACTION_FLOOR_SECS: f64 = 0.15;
const LAPSE_PROBABILITY: f64 = 0.08;

#[derive(Clone, Copy, Debug)]
struct Percept {
    threshold: f64,
    reaction: Duration,
    settled: bool,
    detected_at: Option<Duration>,
}

impl Percept {
    fn update(mut self, snapshot: &TargetSnapshot, now: Duration, out: &mut Vec<Command>) -> Self {
        if self.settled {
            return self;
        }
        if self.detected_at.is_none() && snapshot.visible >= self.threshold {
            self.detected_at = Some(now);
        }
        if let Some(detected_at) = self.detected_at {
            let respond_at = detected_at.saturating_add(self.reaction);
            if respond_at <= now {
                out.push(Command::Select {
                    target: snapshot.id,
                    at: respond_at,
                });
                self.settled = true;
            }
        }
        self
    }
}

/// Simulated observer issuing selections from target snapshots.
#[derive(Debug)]
pub(crate) struct SimulatedObserver {
    rng: ChaCha8Rng,
    percepts: BTreeMap<TargetId, Percept>,
}

impl SimulatedObserver {
    pub(crate) fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            percepts: BTreeMap::new(),
        }
    }

    /// Inspects the live targets at host time `now` and emits due selections.
    pub(crate) fn observe<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a TargetSnapshot>,
        now: Duration,
        out: &mut Vec<Command>,
    ) {
        let mut seen = Vec::new();
        for snapshot in targets {
            seen.push(snapshot.id);
            let percept = match self.percepts.get(&snapshot.id) {
                Some(percept) => *percept,
                None => self.perceive(),
            };
            let percept = percept.update(snapshot, now, out);
            let _ = self.percepts.insert(snapshot.id, percept);
        }
        self.percepts.retain(|id, _| seen.contains(id));
    }

    fn perceive(&mut self) -> Percept {
        let threshold = self
            .rng
            .gen_range(DETECTION_THRESHOLD_MIN..=DETECTION_THRESHOLD_MAX);
        let deviation: f64 = self.rng.sample(StandardNormal);
        let reaction =
            (REACTION_MEAN_SECS + deviation * REACTION_STD_DEV_SECS).max(REACTION_FLOOR_SECS);
        Percept {
            threshold,
            reaction: Duration::from_secs_f64(reaction),
            settled: self.rng.gen_bool(LAPSE_PROBABILITY),
            detected_at: None,
        }
    }
}

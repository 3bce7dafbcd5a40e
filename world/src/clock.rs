//! Session clock derived from host timestamps.

use std::time::Duration;

/// Maps monotonic host timestamps onto session time, which stands still while paused.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SessionClock {
    session_time: Duration,
    anchor: Option<Duration>,
}

impl SessionClock {
    /// Session time reached by the most recent tick.
    pub(crate) const fn now(&self) -> Duration {
        self.session_time
    }

    /// Advances to host timestamp `now`, returning the session time that elapsed.
    ///
    /// The first timestamp only anchors the clock. Timestamps earlier than the
    /// anchor are treated as zero progress.
    pub(crate) fn advance_to(&mut self, now: Duration) -> Duration {
        let dt = match self.anchor {
            Some(anchor) => now.saturating_sub(anchor),
            None => Duration::ZERO,
        };
        self.anchor = Some(self.anchor.map_or(now, |anchor| anchor.max(now)));
        self.session_time = self.session_time.saturating_add(dt);
        dt
    }

    /// Re-anchors at `now` so the paused interval is never counted.
    pub(crate) fn resume_at(&mut self, now: Duration) {
        self.anchor = Some(now);
    }

    /// Converts a host timestamp into session time.
    pub(crate) fn session_time_at(&self, host: Duration) -> Duration {
        match self.anchor {
            Some(anchor) if host >= anchor => self.session_time.saturating_add(host - anchor),
            Some(anchor) => self.session_time.saturating_sub(anchor - host),
            None => self.session_time,
        }
    }
}

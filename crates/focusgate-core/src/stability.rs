//! Stability gating for block candidates.
//!
//! A foreign pick must remain the resolver's choice for a minimum dwell
//! time before it may trigger a block. This suppresses flicker from
//! app-switcher animations and transient system overlays, which surface as
//! short-lived foreign picks.
//!
//! The gate tracks exactly one priming candidate. A different pick resets
//! priming entirely; callers that resolve no pick at all simply skip
//! `admit`, which deliberately leaves the candidate in place.

use crate::AppId;

/// Single-slot dwell gate over the resolver's pick.
#[derive(Debug)]
pub struct StabilityGate {
    window_ms: u64,
    candidate: Option<AppId>,
    primed_at_ms: u64,
}

impl StabilityGate {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            candidate: None,
            primed_at_ms: 0,
        }
    }

    /// The candidate currently priming, if any.
    pub fn candidate(&self) -> Option<&AppId> {
        self.candidate.as_ref()
    }

    /// Present `pick` as the resolver's current choice.
    ///
    /// Returns true once the same pick has persisted for the configured
    /// window. A first sighting always primes and never admits.
    pub fn admit(&mut self, pick: &AppId, now_ms: u64) -> bool {
        match &self.candidate {
            Some(current) if current == pick => {
                now_ms.saturating_sub(self.primed_at_ms) >= self.window_ms
            }
            _ => {
                self.candidate = Some(pick.clone());
                self.primed_at_ms = now_ms;
                false
            }
        }
    }

    /// Drop the candidate and its priming progress.
    pub fn reset(&mut self) {
        self.candidate = None;
        self.primed_at_ms = 0;
    }
}

//! Delay controller: inter-attempt pacing policy and its run-scoped state.
//!
//! The external service budgets mutations per account, so the controller is
//! the engine's main defence against penalties: it samples every wait from a
//! policy range and, in adaptive mode, widens or narrows that range from the
//! recent outcome history.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::AttemptOutcome;

/// How many processed targets between flood-count decay steps.
const FLOOD_DECAY_EVERY: u32 = 20;

/// Jitter range in seconds appended to a server-mandated rate-limit wait.
const FLOOD_RETRY_JITTER_SECS: (f64, f64) = (1.0, 3.0);

/// Jitter range in seconds between fallback invite messages.
const FALLBACK_SEND_JITTER_SECS: (f64, f64) = (2.0, 4.0);

/// Inter-target delay strategy, fixed for the whole run.
///
/// Bounds are seconds. `min` must be positive and no greater than `max`;
/// [`DelayPolicy::validate`] enforces this before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DelayPolicy {
    /// Uniform sample from `[min, max]`, independent of history.
    Fixed {
        /// Lower bound in seconds.
        min: f64,
        /// Upper bound in seconds.
        max: f64,
    },
    /// History-aware sampling: slows down after floods and failure streaks,
    /// speeds up mildly on success streaks.
    Adaptive {
        /// Lower bound in seconds for the normal branch.
        min: f64,
        /// Upper bound in seconds for the normal branch.
        max: f64,
    },
}

impl DelayPolicy {
    /// Fast but risky: fixed 1–3 s.
    pub fn aggressive() -> Self {
        Self::Fixed { min: 1.0, max: 3.0 }
    }

    /// The recommended default: fixed 3–6 s.
    pub fn balanced() -> Self {
        Self::Fixed { min: 3.0, max: 6.0 }
    }

    /// Safest fixed pacing: 8–15 s.
    pub fn conservative() -> Self {
        Self::Fixed {
            min: 8.0,
            max: 15.0,
        }
    }

    /// History-aware pacing over a 2–8 s base range.
    pub fn adaptive() -> Self {
        Self::Adaptive { min: 2.0, max: 8.0 }
    }

    /// Policy bounds as `(min, max)` seconds.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Fixed { min, max } | Self::Adaptive { min, max } => (min, max),
        }
    }

    /// Check the bounds are finite, non-negative, and ordered.
    ///
    /// # Errors
    ///
    /// Returns a description of the offending bound.
    pub fn validate(&self) -> Result<(), InvalidDelayPolicy> {
        let (min, max) = self.bounds();
        if !min.is_finite() || !max.is_finite() {
            return Err(InvalidDelayPolicy { min, max });
        }
        if min < 0.0 || max < min {
            return Err(InvalidDelayPolicy { min, max });
        }
        Ok(())
    }
}

/// A delay policy with unusable bounds.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid delay bounds: min {min}s, max {max}s")]
pub struct InvalidDelayPolicy {
    /// Offending lower bound.
    pub min: f64,
    /// Offending upper bound.
    pub max: f64,
}

/// Mutable pacing history, owned solely by the controller and scoped to one
/// run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayState {
    /// Terminal non-success outcomes in a row.
    pub consecutive_failures: u32,
    /// `Added` outcomes in a row.
    pub consecutive_successes: u32,
    /// Rate-limit events seen recently; decays every 20 processed targets.
    pub recent_flood_count: u32,
    /// Targets that have reached a terminal outcome this run.
    pub processed_count: u32,
}

/// Stateful delay policy evaluator.
///
/// One controller per run. The orchestrator feeds it every terminal outcome
/// via [`update`](Self::update) (plus non-terminal rate-limit events via
/// [`record_flood_event`](Self::record_flood_event)) and asks for the next
/// inter-target wait via [`next_delay`](Self::next_delay).
#[derive(Debug)]
pub struct DelayController {
    policy: DelayPolicy,
    state: DelayState,
}

impl DelayController {
    /// Create a controller with fresh state for `policy`.
    pub fn new(policy: DelayPolicy) -> Self {
        Self {
            policy,
            state: DelayState::default(),
        }
    }

    /// Read-only view of the pacing history.
    pub fn state(&self) -> &DelayState {
        &self.state
    }

    /// Advance the history with one terminal outcome.
    ///
    /// Also counts the target as processed and applies the periodic flood
    /// decay: `recent_flood_count` drops by one every 20 processed targets,
    /// regardless of policy.
    pub fn update(&mut self, outcome: &AttemptOutcome) {
        self.apply(outcome);
        self.state.processed_count = self.state.processed_count.saturating_add(1);
        if self
            .state
            .processed_count
            .checked_rem(FLOOD_DECAY_EVERY)
            .is_some_and(|rem| rem == 0)
        {
            self.state.recent_flood_count = self.state.recent_flood_count.saturating_sub(1);
        }
    }

    /// Register a rate-limit event that did not terminate the target (the
    /// flood before the single automatic retry). Does not count the target
    /// as processed.
    pub fn record_flood_event(&mut self) {
        self.apply(&AttemptOutcome::RateLimited { retry_after: 0 });
    }

    fn apply(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Added => {
                self.state.consecutive_failures = 0;
                self.state.consecutive_successes =
                    self.state.consecutive_successes.saturating_add(1);
            }
            // Breaks a failure streak but does not extend the success one.
            AttemptOutcome::AlreadyMember => {
                self.state.consecutive_failures = 0;
            }
            // Skips never reached the service; they leave the streaks alone.
            AttemptOutcome::SkippedBot | AttemptOutcome::SkippedDeleted => {}
            AttemptOutcome::RateLimited { .. } => {
                self.state.recent_flood_count = self.state.recent_flood_count.saturating_add(1);
                self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
                self.state.consecutive_successes = 0;
            }
            _ => {
                self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
                self.state.consecutive_successes = 0;
            }
        }
    }

    /// Sample the wait before the next target.
    ///
    /// Fixed policies ignore history. Adaptive policies evaluate the branch
    /// conditions in priority order, first match wins:
    /// flood backoff, failure-streak backoff, success-streak speed-up,
    /// normal range.
    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let (min, max) = self.policy.bounds();
        let secs = match self.policy {
            DelayPolicy::Fixed { .. } => sample(rng, min, max),
            DelayPolicy::Adaptive { .. } => {
                if self.state.recent_flood_count >= 2 {
                    sample(rng, max * 2.0, max * 3.0)
                } else if self.state.consecutive_failures >= 5 {
                    sample(rng, max * 1.5, max * 2.0)
                } else if self.state.consecutive_successes >= 5 {
                    sample(rng, min * 0.8, max * 0.9)
                } else {
                    sample(rng, min, max)
                }
            }
        };
        Duration::from_secs_f64(secs)
    }
}

/// Jitter appended to a server-mandated rate-limit wait before the single
/// automatic retry. Distinct from the inter-target delay.
pub fn flood_retry_jitter<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    let (lo, hi) = FLOOD_RETRY_JITTER_SECS;
    Duration::from_secs_f64(sample(rng, lo, hi))
}

/// Jittered pause between fallback invite messages.
pub fn fallback_send_jitter<R: Rng + ?Sized>(rng: &mut R) -> Duration {
    let (lo, hi) = FALLBACK_SEND_JITTER_SECS;
    Duration::from_secs_f64(sample(rng, lo, hi))
}

fn sample<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if hi <= lo {
        return lo;
    }
    rng.gen_range(lo..=hi)
}

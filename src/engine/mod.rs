//! The batch add engine: orchestrator, delay controller, classifier, and
//! outcome aggregation.
//!
//! One [`BatchRunner`] owns a run end to end. It is strictly sequential by
//! design: the external service budgets mutations per account, and parallel
//! attempts would both scramble the adaptive controller's history and invite
//! penalties. The only suspension points are the inter-target delay, the
//! rate-limit wait before the single automatic retry, and the jitter between
//! fallback invite messages.

pub mod classify;
pub mod delay;
pub mod stats;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::api::{AddError, IdentityResolver, MembershipApi, MessagingApi, ResolveError, SendError};
use crate::types::{AttemptOutcome, Group, GroupKind, Identity, Target};

use self::classify::{classify_add_failure, classify_resolve_failure, resolve_failure_is_transient};
use self::delay::{fallback_send_jitter, flood_retry_jitter, DelayController, DelayPolicy};
use self::stats::{Report, RunStatistics};

/// Lookup attempts before the resolver gives up on a handle.
const RESOLVE_ATTEMPTS: u32 = 3;

/// Pause between transient resolver retries.
const RESOLVE_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Default invite text for fallback dispatch. `{title}` and `{link}` are
/// substituted per run.
pub const DEFAULT_INVITE_MESSAGE: &str =
    "Hi! You've been invited to join '{title}'. Click here to join: {link}";

/// Why a run stopped before the roster was exhausted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbortCause {
    /// The cancellation flag was raised; honored between targets.
    #[error("cancelled")]
    Cancelled,
    /// The transport to the service is gone.
    #[error("connection lost: {detail}")]
    ConnectionLost {
        /// Short description of the transport failure.
        detail: String,
    },
}

/// Everything a run produced. Returned even when the run aborted early, so
/// partial progress still reaches the report.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Per-category outcome counters.
    pub stats: RunStatistics,
    /// Targets handed to the engine (post roster filtering).
    pub total_processed: u32,
    /// Invite links successfully delivered during fallback dispatch.
    pub links_sent: u32,
    /// Set when the run stopped early.
    pub aborted: Option<AbortCause>,
}

impl RunReport {
    /// Derive the renderable summary for this run.
    pub fn summary(&self) -> Report {
        self.stats.summary(self.total_processed)
    }
}

/// Result of one full attempt on one target.
enum Attempt {
    Terminal {
        outcome: AttemptOutcome,
        identity: Option<Identity>,
    },
    Aborted(AbortCause),
}

/// Sequential batch orchestrator.
///
/// Drives the per-target state machine: resolve → skip checks → add →
/// classify → (single rate-limit retry) → record, with controller-paced
/// sleeps in between and invite-link fallback dispatch after the main pass.
pub struct BatchRunner {
    resolver: Arc<dyn IdentityResolver>,
    membership: Arc<dyn MembershipApi>,
    messaging: Arc<dyn MessagingApi>,
    cancel: Arc<AtomicBool>,
    invite_message: String,
    rng: StdRng,
}

impl BatchRunner {
    /// Build a runner over the three service seams.
    pub fn new(
        resolver: Arc<dyn IdentityResolver>,
        membership: Arc<dyn MembershipApi>,
        messaging: Arc<dyn MessagingApi>,
    ) -> Self {
        Self {
            resolver,
            membership,
            messaging,
            cancel: Arc::new(AtomicBool::new(false)),
            invite_message: DEFAULT_INVITE_MESSAGE.to_owned(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Share a cancellation flag; raising it stops the run between targets.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Override the fallback invite text. `{title}` and `{link}` are
    /// substituted at send time.
    #[must_use]
    pub fn with_invite_message(mut self, template: impl Into<String>) -> Self {
        self.invite_message = template.into();
        self
    }

    /// Use a seeded RNG. Tests use this to make sampled delays exact.
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Run the batch: every target gets exactly one terminal outcome, in
    /// input order, with at most one automatic retry on a rate limit.
    ///
    /// Never fails per target; only cancellation or connection loss stops
    /// the run early, and even then the partially filled statistics are
    /// returned.
    pub async fn run(
        &mut self,
        targets: &[Target],
        group: &Group,
        policy: DelayPolicy,
        fallback_enabled: bool,
    ) -> RunReport {
        let mut controller = DelayController::new(policy);
        let mut stats = RunStatistics::default();
        let mut fallback_queue: Vec<(Target, Identity)> = Vec::new();
        let mut aborted = None;
        let total = targets.len();
        let started = tokio::time::Instant::now();

        info!(
            group = %group.title,
            kind = group.kind.label(),
            targets = total,
            fallback_enabled,
            "starting batch add"
        );

        for (index, target) in targets.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!(processed = index, "cancellation requested, stopping run");
                aborted = Some(AbortCause::Cancelled);
                break;
            }

            log_progress(index, total, started.elapsed());

            let attempt = self.attempt(target, group, &mut controller, &mut stats).await;
            let (outcome, identity) = match attempt {
                Attempt::Terminal { outcome, identity } => (outcome, identity),
                Attempt::Aborted(cause) => {
                    warn!(handle = %target, cause = %cause, "run aborted mid-pass");
                    aborted = Some(cause);
                    break;
                }
            };

            info!(handle = %target, outcome = outcome.label(), "attempt finished");
            stats.record(&outcome);
            controller.update(&outcome);

            if fallback_enabled && outcome.is_fallback_eligible() {
                if let Some(identity) = identity {
                    fallback_queue.push((target.clone(), identity));
                }
            }

            let remaining = targets.len().saturating_sub(index.saturating_add(1));
            if remaining > 0 {
                let wait = controller.next_delay(&mut self.rng);
                debug!(wait_secs = wait.as_secs_f64(), "inter-target delay");
                tokio::time::sleep(wait).await;
            }
        }

        let mut links_sent = 0;
        if fallback_enabled && !fallback_queue.is_empty() && aborted.is_none() {
            let (sent, cause) = self.dispatch_fallback(&fallback_queue, group).await;
            links_sent = sent;
            aborted = cause;
        }

        let total_processed = stats.terminal_total();
        RunReport {
            stats,
            total_processed,
            links_sent,
            aborted,
        }
    }

    /// One target through the state machine: resolve, skip checks, add with
    /// a single bounded rate-limit retry.
    async fn attempt(
        &mut self,
        target: &Target,
        group: &Group,
        controller: &mut DelayController,
        stats: &mut RunStatistics,
    ) -> Attempt {
        let identity = match self.resolve_with_retry(target.handle()).await {
            Resolution::Resolved(identity) => identity,
            Resolution::Failed(outcome) => {
                return Attempt::Terminal {
                    outcome,
                    identity: None,
                }
            }
            Resolution::Lost(detail) => {
                return Attempt::Aborted(AbortCause::ConnectionLost { detail })
            }
        };

        if identity.is_bot {
            return Attempt::Terminal {
                outcome: AttemptOutcome::SkippedBot,
                identity: Some(identity),
            };
        }
        if identity.is_deleted {
            return Attempt::Terminal {
                outcome: AttemptOutcome::SkippedDeleted,
                identity: Some(identity),
            };
        }

        // Broadcast channels reject all direct adds; the service is never called.
        if group.kind == GroupKind::BroadcastChannel {
            return Attempt::Terminal {
                outcome: AttemptOutcome::Unknown {
                    detail: "broadcast-not-addable".to_owned(),
                },
                identity: Some(identity),
            };
        }

        // Explicit bounded loop: at most one retry, only for a rate limit.
        let mut retried = false;
        loop {
            let err = match self.membership.add_to_group(group, &identity).await {
                Ok(()) => {
                    return Attempt::Terminal {
                        outcome: AttemptOutcome::Added,
                        identity: Some(identity),
                    }
                }
                Err(AddError::ConnectionLost { detail }) => {
                    return Attempt::Aborted(AbortCause::ConnectionLost { detail })
                }
                Err(err) => err,
            };

            let outcome = classify_add_failure(&err);
            if let AttemptOutcome::RateLimited { retry_after } = outcome {
                stats.record_flood_event();
                if !retried {
                    retried = true;
                    let jitter = flood_retry_jitter(&mut self.rng);
                    info!(
                        handle = %target,
                        retry_after,
                        jitter_secs = jitter.as_secs_f64(),
                        "rate limited, waiting before single retry"
                    );
                    controller.record_flood_event();
                    tokio::time::sleep(Duration::from_secs(retry_after).saturating_add(jitter))
                        .await;
                    continue;
                }
            }

            return Attempt::Terminal {
                outcome,
                identity: Some(identity),
            };
        }
    }

    /// Resolve a handle, retrying transient lookup failures up to
    /// [`RESOLVE_ATTEMPTS`] times before yielding a terminal outcome.
    async fn resolve_with_retry(&self, handle: &str) -> Resolution {
        let mut last_err = None;
        for attempt in 1..=RESOLVE_ATTEMPTS {
            match self.resolver.resolve(handle).await {
                Ok(identity) => return Resolution::Resolved(identity),
                Err(ResolveError::NotFound) => {
                    return Resolution::Failed(AttemptOutcome::NotFound)
                }
                Err(ResolveError::ConnectionLost { detail }) => {
                    return Resolution::Lost(detail);
                }
                Err(err) if resolve_failure_is_transient(&err) => {
                    debug!(handle, attempt, error = %err, "transient resolver failure");
                    if attempt < RESOLVE_ATTEMPTS {
                        tokio::time::sleep(RESOLVE_RETRY_PAUSE).await;
                    }
                    last_err = Some(err);
                }
                Err(err) => {
                    return Resolution::Failed(classify_resolve_failure(&err));
                }
            }
        }
        let err = last_err.unwrap_or(ResolveError::Unknown {
            detail: "resolver exhausted".to_owned(),
        });
        Resolution::Failed(classify_resolve_failure(&err))
    }

    /// Send the group invite to every queued target, one jittered message at
    /// a time. Send failures are logged, not counted against the run.
    async fn dispatch_fallback(
        &mut self,
        queue: &[(Target, Identity)],
        group: &Group,
    ) -> (u32, Option<AbortCause>) {
        info!(recipients = queue.len(), "dispatching fallback invite links");

        // One link serves every recipient.
        let link = match self.membership.invite_link(group).await {
            Ok(link) => link,
            Err(AddError::ConnectionLost { detail }) => {
                return (0, Some(AbortCause::ConnectionLost { detail }));
            }
            Err(err) => {
                warn!(group = %group.title, error = %err, "could not obtain invite link");
                return (0, None);
            }
        };

        let text = self
            .invite_message
            .replace("{title}", &group.title)
            .replace("{link}", &link);

        let mut sent = 0u32;
        for (index, (target, identity)) in queue.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                info!(sent, "cancellation requested, stopping fallback dispatch");
                return (sent, Some(AbortCause::Cancelled));
            }

            match self.messaging.send_direct_message(identity, &text).await {
                Ok(()) => {
                    sent = sent.saturating_add(1);
                    info!(handle = %target, "invite link sent");
                }
                Err(SendError::ConnectionLost { detail }) => {
                    return (sent, Some(AbortCause::ConnectionLost { detail }));
                }
                Err(err) => {
                    warn!(handle = %target, error = %err, "invite link send failed");
                }
            }

            if index.saturating_add(1) < queue.len() {
                tokio::time::sleep(fallback_send_jitter(&mut self.rng)).await;
            }
        }
        (sent, None)
    }
}

/// Outcome of the bounded resolver loop.
enum Resolution {
    Resolved(Identity),
    Failed(AttemptOutcome),
    Lost(String),
}

/// Per-target progress line with elapsed time and a naive ETA.
fn log_progress(index: usize, total: usize, elapsed: Duration) {
    let done = index;
    let percent = if total == 0 {
        100.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        {
            done as f64 / total as f64 * 100.0
        }
    };
    let eta_secs = if done == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        {
            elapsed.as_secs_f64() / done as f64 * (total.saturating_sub(done)) as f64
        }
    };
    info!(
        position = index.saturating_add(1),
        total,
        percent = format!("{percent:.1}"),
        elapsed_secs = format!("{:.1}", elapsed.as_secs_f64()),
        eta_secs = format!("{eta_secs:.1}"),
        "progress"
    );
}

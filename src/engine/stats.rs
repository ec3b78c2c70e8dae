//! Outcome aggregation: per-run counters and the derived report.
//!
//! [`RunStatistics`] is a value created fresh for every run and threaded
//! through the orchestrator; there is no long-lived mutable counter object.
//! [`Report`] is derived on demand and never stored.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::AttemptOutcome;

/// Success-rate tiers with fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuccessTier {
    /// ≥ 80% of attempted targets added.
    Excellent,
    /// ≥ 60%.
    Good,
    /// ≥ 40%.
    Moderate,
    /// ≥ 20%.
    Low,
    /// Below 20%.
    VeryLow,
}

impl SuccessTier {
    /// Tier for a success rate in percent.
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            Self::Excellent
        } else if rate >= 60.0 {
            Self::Good
        } else if rate >= 40.0 {
            Self::Moderate
        } else if rate >= 20.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    /// One-line verdict for the rendered report.
    pub fn verdict(self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT - very high success rate",
            Self::Good => "GOOD - decent success rate",
            Self::Moderate => "MODERATE success rate",
            Self::Low => "LOW success rate",
            Self::VeryLow => "VERY LOW success rate",
        }
    }
}

/// Best-effort advisory heuristics derived from the error mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    /// Most failures were permission errors; the account likely needs admin
    /// rights in the target group.
    NeedsAdminRights,
    /// A large share of targets have privacy restrictions; mutual contacts
    /// fare better.
    PrivacyHeavy,
    /// Enough rate-limit events occurred that slower delay settings are
    /// advisable.
    SlowDown,
}

impl Recommendation {
    /// Advisory text for the rendered report.
    pub fn text(self) -> &'static str {
        match self {
            Self::NeedsAdminRights => {
                "you likely need admin permissions in the target group"
            }
            Self::PrivacyHeavy => {
                "many accounts have privacy restrictions - try mutual contacts"
            }
            Self::SlowDown => "use slower delay settings to avoid rate limits",
        }
    }
}

/// Per-run outcome counters, one slot per terminal category plus a
/// rate-limit event counter.
///
/// Invariant: after a run, the terminal counters sum to the number of
/// targets the engine actually processed. `flood_events` counts every
/// rate-limit event (including the one before a successful retry) and sits
/// outside that sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    /// Accounts added.
    pub added: u32,
    /// Accounts already in the group.
    pub already_member: u32,
    /// Bot accounts skipped.
    pub skipped_bot: u32,
    /// Deleted/restricted accounts skipped.
    pub skipped_deleted: u32,
    /// Permission failures.
    pub admin_required: u32,
    /// Privacy-restricted accounts.
    pub privacy_restricted: u32,
    /// Mutual-contact-required accounts.
    pub mutual_contact_required: u32,
    /// Accounts in too many communities.
    pub too_many_channels: u32,
    /// Accounts banned from the group.
    pub banned: u32,
    /// Accounts that blocked the acting account.
    pub blocked: u32,
    /// Targets whose retry was rate limited again (terminal).
    pub rate_limited: u32,
    /// Handles with no matching account.
    pub not_found: u32,
    /// Handles the resolver kept failing on.
    pub unresolvable: u32,
    /// Failures with no dedicated category.
    pub unknown: u32,
    /// Every rate-limit event observed, terminal or not.
    pub flood_events: u32,
}

impl RunStatistics {
    /// Increment the counter matching a terminal outcome.
    pub fn record(&mut self, outcome: &AttemptOutcome) {
        let slot = match outcome {
            AttemptOutcome::Added => &mut self.added,
            AttemptOutcome::AlreadyMember => &mut self.already_member,
            AttemptOutcome::SkippedBot => &mut self.skipped_bot,
            AttemptOutcome::SkippedDeleted => &mut self.skipped_deleted,
            AttemptOutcome::AdminRequired => &mut self.admin_required,
            AttemptOutcome::PrivacyRestricted => &mut self.privacy_restricted,
            AttemptOutcome::MutualContactRequired => &mut self.mutual_contact_required,
            AttemptOutcome::TooManyChannels => &mut self.too_many_channels,
            AttemptOutcome::Banned => &mut self.banned,
            AttemptOutcome::Blocked => &mut self.blocked,
            AttemptOutcome::RateLimited { .. } => &mut self.rate_limited,
            AttemptOutcome::NotFound => &mut self.not_found,
            AttemptOutcome::Unresolvable => &mut self.unresolvable,
            AttemptOutcome::Unknown { .. } => &mut self.unknown,
        };
        *slot = slot.saturating_add(1);
    }

    /// Count one rate-limit event, terminal or not.
    pub fn record_flood_event(&mut self) {
        self.flood_events = self.flood_events.saturating_add(1);
    }

    /// Targets that never reached the membership API.
    pub fn skipped(&self) -> u32 {
        self.skipped_bot.saturating_add(self.skipped_deleted)
    }

    /// Attempted targets that did not end in `Added` or `AlreadyMember`.
    pub fn failed(&self) -> u32 {
        [
            self.admin_required,
            self.privacy_restricted,
            self.mutual_contact_required,
            self.too_many_channels,
            self.banned,
            self.blocked,
            self.rate_limited,
            self.not_found,
            self.unresolvable,
            self.unknown,
        ]
        .iter()
        .fold(0u32, |acc, n| acc.saturating_add(*n))
    }

    /// Sum of all terminal category counters.
    ///
    /// Equals the number of targets the engine processed this run.
    pub fn terminal_total(&self) -> u32 {
        self.skipped()
            .saturating_add(self.added)
            .saturating_add(self.already_member)
            .saturating_add(self.failed())
    }

    /// Derive the run report for `total_processed` targets.
    pub fn summary(&self, total_processed: u32) -> Report {
        let attempted = total_processed.saturating_sub(self.skipped());
        let success_rate = if attempted == 0 {
            0.0
        } else {
            f64::from(self.added) / f64::from(attempted.max(1)) * 100.0
        };

        let mut recommendations = Vec::new();
        if f64::from(self.admin_required) > f64::from(attempted) * 0.5 {
            recommendations.push(Recommendation::NeedsAdminRights);
        }
        if f64::from(self.privacy_restricted) > f64::from(attempted) * 0.3 {
            recommendations.push(Recommendation::PrivacyHeavy);
        }
        if self.flood_events > 5 {
            recommendations.push(Recommendation::SlowDown);
        }

        Report {
            stats: self.clone(),
            total_processed,
            attempted,
            success_rate,
            tier: SuccessTier::from_rate(success_rate),
            recommendations,
            finished_at: Utc::now(),
        }
    }
}

/// Derived run summary: counters plus success rate, tier, and advisories.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// The raw counters the report was derived from.
    pub stats: RunStatistics,
    /// Targets handed to the engine (post roster filtering).
    pub total_processed: u32,
    /// `total_processed` minus skips.
    pub attempted: u32,
    /// `added / max(1, attempted) × 100`.
    pub success_rate: f64,
    /// Qualitative tier for the success rate.
    pub tier: SuccessTier,
    /// Advisory heuristics, possibly empty.
    pub recommendations: Vec<Recommendation>,
    /// When the summary was derived.
    pub finished_at: DateTime<Utc>,
}

impl Report {
    /// Render the human-readable summary: counts table, error breakdown,
    /// tier verdict, and recommendations.
    pub fn render(&self) -> String {
        use std::fmt::Write as _;

        let s = &self.stats;
        let mut out = String::new();
        let rule = "=".repeat(64);
        let thin = "-".repeat(64);

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "RUN SUMMARY  ({})", self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "  added:            {:5}", s.added);
        let _ = writeln!(out, "  already members:  {:5}", s.already_member);
        let _ = writeln!(out, "  failed:           {:5}", s.failed());
        let _ = writeln!(out, "  skipped:          {:5}", s.skipped());
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "ERROR BREAKDOWN");
        let _ = writeln!(out, "  admin required:   {:5}", s.admin_required);
        let _ = writeln!(out, "  privacy:          {:5}", s.privacy_restricted);
        let _ = writeln!(out, "  mutual contact:   {:5}", s.mutual_contact_required);
        let _ = writeln!(out, "  too many chans:   {:5}", s.too_many_channels);
        let _ = writeln!(out, "  banned:           {:5}", s.banned);
        let _ = writeln!(out, "  blocked:          {:5}", s.blocked);
        let _ = writeln!(out, "  rate limited:     {:5}", s.rate_limited);
        let _ = writeln!(out, "  not found:        {:5}", s.not_found);
        let _ = writeln!(out, "  unresolvable:     {:5}", s.unresolvable);
        let _ = writeln!(out, "  unknown:          {:5}", s.unknown);
        let _ = writeln!(out, "  flood events:     {:5}", s.flood_events);
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(out, "  total in run:     {:5}", self.total_processed);
        let _ = writeln!(out, "  attempted:        {:5}", self.attempted);
        let _ = writeln!(out, "  success rate:     {:5.1}%", self.success_rate);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", self.tier.verdict());
        for rec in &self.recommendations {
            let _ = writeln!(out, "RECOMMENDATION: {}", rec.text());
        }
        out
    }
}

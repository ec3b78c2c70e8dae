//! Aggregator tests: counters, summary math, tiers, and recommendations.

use convoke::engine::stats::{Recommendation, RunStatistics, SuccessTier};
use convoke::types::AttemptOutcome;

#[test]
fn each_outcome_increments_its_own_counter() {
    let mut stats = RunStatistics::default();
    stats.record(&AttemptOutcome::Added);
    stats.record(&AttemptOutcome::Added);
    stats.record(&AttemptOutcome::AlreadyMember);
    stats.record(&AttemptOutcome::SkippedBot);
    stats.record(&AttemptOutcome::Banned);
    stats.record(&AttemptOutcome::RateLimited { retry_after: 4 });
    stats.record(&AttemptOutcome::Unknown {
        detail: "x".to_owned(),
    });

    assert_eq!(stats.added, 2);
    assert_eq!(stats.already_member, 1);
    assert_eq!(stats.skipped_bot, 1);
    assert_eq!(stats.banned, 1);
    assert_eq!(stats.rate_limited, 1);
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.terminal_total(), 7);
}

#[test]
fn fresh_statistics_start_at_zero() {
    let stats = RunStatistics::default();
    assert_eq!(stats.terminal_total(), 0);
    assert_eq!(stats.flood_events, 0);
    assert_eq!(stats, RunStatistics::default());
}

#[test]
fn flood_events_sit_outside_the_terminal_sum() {
    let mut stats = RunStatistics::default();
    stats.record_flood_event();
    stats.record(&AttemptOutcome::Added);

    assert_eq!(stats.flood_events, 1);
    assert_eq!(stats.terminal_total(), 1);
}

#[test]
fn summary_computes_attempted_and_success_rate() {
    let mut stats = RunStatistics::default();
    for _ in 0..6 {
        stats.record(&AttemptOutcome::Added);
    }
    stats.record(&AttemptOutcome::SkippedBot);
    stats.record(&AttemptOutcome::SkippedDeleted);
    stats.record(&AttemptOutcome::Banned);
    stats.record(&AttemptOutcome::Banned);

    let report = stats.summary(10);
    assert_eq!(report.attempted, 8);
    assert_eq!(report.success_rate, 75.0);
    assert_eq!(report.tier, SuccessTier::Good);
}

#[test]
fn success_rate_is_zero_when_nothing_was_attempted() {
    let mut stats = RunStatistics::default();
    stats.record(&AttemptOutcome::SkippedBot);

    let report = stats.summary(1);
    assert_eq!(report.attempted, 0);
    assert_eq!(report.success_rate, 0.0);
    assert_eq!(report.tier, SuccessTier::VeryLow);
}

#[test]
fn tier_thresholds_are_inclusive() {
    assert_eq!(SuccessTier::from_rate(80.0), SuccessTier::Excellent);
    assert_eq!(SuccessTier::from_rate(79.9), SuccessTier::Good);
    assert_eq!(SuccessTier::from_rate(60.0), SuccessTier::Good);
    assert_eq!(SuccessTier::from_rate(40.0), SuccessTier::Moderate);
    assert_eq!(SuccessTier::from_rate(20.0), SuccessTier::Low);
    assert_eq!(SuccessTier::from_rate(19.9), SuccessTier::VeryLow);
    assert_eq!(SuccessTier::from_rate(0.0), SuccessTier::VeryLow);
}

#[test]
fn admin_recommendation_requires_a_majority_of_permission_errors() {
    let mut stats = RunStatistics::default();
    for _ in 0..6 {
        stats.record(&AttemptOutcome::AdminRequired);
    }
    for _ in 0..4 {
        stats.record(&AttemptOutcome::Added);
    }

    let report = stats.summary(10);
    assert!(report
        .recommendations
        .contains(&Recommendation::NeedsAdminRights));

    // Exactly half does not trigger it.
    let mut stats = RunStatistics::default();
    for _ in 0..5 {
        stats.record(&AttemptOutcome::AdminRequired);
        stats.record(&AttemptOutcome::Added);
    }
    let report = stats.summary(10);
    assert!(!report
        .recommendations
        .contains(&Recommendation::NeedsAdminRights));
}

#[test]
fn privacy_recommendation_uses_the_thirty_percent_gate() {
    let mut stats = RunStatistics::default();
    for _ in 0..4 {
        stats.record(&AttemptOutcome::PrivacyRestricted);
    }
    for _ in 0..6 {
        stats.record(&AttemptOutcome::Added);
    }

    let report = stats.summary(10);
    assert!(report.recommendations.contains(&Recommendation::PrivacyHeavy));
}

#[test]
fn slow_down_recommendation_counts_flood_events_not_terminal_outcomes() {
    let mut stats = RunStatistics::default();
    for _ in 0..6 {
        stats.record_flood_event();
        stats.record(&AttemptOutcome::Added);
    }

    let report = stats.summary(6);
    assert_eq!(stats.rate_limited, 0);
    assert!(report.recommendations.contains(&Recommendation::SlowDown));
}

#[test]
fn no_recommendations_on_a_clean_run() {
    let mut stats = RunStatistics::default();
    for _ in 0..10 {
        stats.record(&AttemptOutcome::Added);
    }

    let report = stats.summary(10);
    assert!(report.recommendations.is_empty());
    assert_eq!(report.tier, SuccessTier::Excellent);
}

#[test]
fn render_includes_counts_verdict_and_recommendations() {
    let mut stats = RunStatistics::default();
    stats.record(&AttemptOutcome::Added);
    for _ in 0..9 {
        stats.record(&AttemptOutcome::PrivacyRestricted);
    }

    let text = stats.summary(10).render();
    assert!(text.contains("added:"));
    assert!(text.contains("privacy:"));
    assert!(text.contains("success rate:"));
    assert!(text.contains("10.0%"));
    assert!(text.contains("VERY LOW"));
    assert!(text.contains("privacy restrictions"));
}

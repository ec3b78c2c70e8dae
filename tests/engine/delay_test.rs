//! Delay controller tests: sampling bounds, adaptive branch priority,
//! streak bookkeeping, and flood decay.

use rand::rngs::StdRng;
use rand::SeedableRng;

use convoke::engine::delay::{DelayController, DelayPolicy};
use convoke::types::AttemptOutcome;

const SAMPLES: usize = 200;

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

fn assert_samples_within(controller: &DelayController, lo: f64, hi: f64) {
    let mut rng = rng();
    for _ in 0..SAMPLES {
        let secs = controller.next_delay(&mut rng).as_secs_f64();
        assert!(secs >= lo && secs <= hi, "sample {secs} outside [{lo}, {hi}]");
    }
}

fn adaptive() -> DelayController {
    DelayController::new(DelayPolicy::Adaptive { min: 2.0, max: 8.0 })
}

#[test]
fn fixed_policy_samples_within_bounds() {
    let controller = DelayController::new(DelayPolicy::Fixed { min: 3.0, max: 6.0 });
    assert_samples_within(&controller, 3.0, 6.0);
}

#[test]
fn fixed_policy_ignores_history() {
    let mut controller = DelayController::new(DelayPolicy::Fixed { min: 3.0, max: 6.0 });
    for _ in 0..10 {
        controller.update(&AttemptOutcome::Banned);
    }
    controller.record_flood_event();
    controller.record_flood_event();
    assert_samples_within(&controller, 3.0, 6.0);
}

#[test]
fn adaptive_normal_branch_uses_base_range() {
    assert_samples_within(&adaptive(), 2.0, 8.0);
}

#[test]
fn adaptive_flood_branch_doubles_the_upper_bound() {
    let mut controller = adaptive();
    controller.record_flood_event();
    controller.record_flood_event();
    assert_samples_within(&controller, 16.0, 24.0);
}

#[test]
fn adaptive_failure_streak_slows_down() {
    let mut controller = adaptive();
    for _ in 0..5 {
        controller.update(&AttemptOutcome::Banned);
    }
    assert_samples_within(&controller, 12.0, 16.0);
}

#[test]
fn adaptive_success_streak_speeds_up() {
    let mut controller = adaptive();
    for _ in 0..5 {
        controller.update(&AttemptOutcome::Added);
    }
    assert_samples_within(&controller, 1.6, 7.2);
}

#[test]
fn flood_branch_outranks_success_streak() {
    let mut controller = adaptive();
    for _ in 0..5 {
        controller.update(&AttemptOutcome::Added);
    }
    controller.record_flood_event();
    controller.record_flood_event();
    // Successes were reset by the floods anyway; the flood branch wins.
    assert_samples_within(&controller, 16.0, 24.0);
}

#[test]
fn adaptive_output_is_always_within_global_bounds() {
    // Whatever the history, samples stay inside [min*0.8, max*3].
    let histories: Vec<Vec<AttemptOutcome>> = vec![
        vec![],
        vec![AttemptOutcome::Added; 8],
        vec![AttemptOutcome::Banned; 8],
        vec![AttemptOutcome::RateLimited { retry_after: 1 }; 4],
    ];
    for history in &histories {
        let mut controller = adaptive();
        for outcome in history {
            controller.update(outcome);
        }
        assert_samples_within(&controller, 1.6, 24.0);
    }
}

#[test]
fn added_resets_failures_and_extends_the_success_streak() {
    let mut controller = adaptive();
    controller.update(&AttemptOutcome::Banned);
    controller.update(&AttemptOutcome::Banned);
    assert_eq!(controller.state().consecutive_failures, 2);

    controller.update(&AttemptOutcome::Added);
    assert_eq!(controller.state().consecutive_failures, 0);
    assert_eq!(controller.state().consecutive_successes, 1);
}

#[test]
fn already_member_breaks_failure_streak_without_extending_successes() {
    let mut controller = adaptive();
    controller.update(&AttemptOutcome::Added);
    controller.update(&AttemptOutcome::Banned);
    controller.update(&AttemptOutcome::AlreadyMember);

    assert_eq!(controller.state().consecutive_failures, 0);
    assert_eq!(controller.state().consecutive_successes, 0);
}

#[test]
fn rate_limit_counts_flood_and_failure_and_resets_successes() {
    let mut controller = adaptive();
    controller.update(&AttemptOutcome::Added);
    controller.update(&AttemptOutcome::RateLimited { retry_after: 10 });

    let state = controller.state();
    assert_eq!(state.recent_flood_count, 1);
    assert_eq!(state.consecutive_failures, 1);
    assert_eq!(state.consecutive_successes, 0);
}

#[test]
fn skips_leave_the_streaks_alone() {
    let mut controller = adaptive();
    controller.update(&AttemptOutcome::Added);
    controller.update(&AttemptOutcome::SkippedBot);
    controller.update(&AttemptOutcome::SkippedDeleted);

    assert_eq!(controller.state().consecutive_successes, 1);
    assert_eq!(controller.state().consecutive_failures, 0);
}

#[test]
fn flood_count_decays_every_twenty_processed_targets() {
    let mut controller = adaptive();
    controller.record_flood_event();
    controller.record_flood_event();
    assert_eq!(controller.state().recent_flood_count, 2);

    for _ in 0..20 {
        controller.update(&AttemptOutcome::Added);
    }
    assert_eq!(controller.state().recent_flood_count, 1);

    for _ in 0..20 {
        controller.update(&AttemptOutcome::Added);
    }
    assert_eq!(controller.state().recent_flood_count, 0);

    // Floored at zero.
    for _ in 0..20 {
        controller.update(&AttemptOutcome::Added);
    }
    assert_eq!(controller.state().recent_flood_count, 0);
}

#[test]
fn flood_events_do_not_advance_the_processed_count() {
    let mut controller = adaptive();
    controller.record_flood_event();
    controller.record_flood_event();
    assert_eq!(controller.state().processed_count, 0);

    controller.update(&AttemptOutcome::Added);
    assert_eq!(controller.state().processed_count, 1);
}

#[test]
fn policy_validation_rejects_bad_bounds() {
    assert!(DelayPolicy::Fixed { min: 6.0, max: 3.0 }.validate().is_err());
    assert!(DelayPolicy::Fixed { min: -1.0, max: 3.0 }.validate().is_err());
    assert!(DelayPolicy::Adaptive {
        min: f64::NAN,
        max: 3.0
    }
    .validate()
    .is_err());
    assert!(DelayPolicy::balanced().validate().is_ok());
}

#[test]
fn presets_have_the_documented_ranges() {
    assert_eq!(DelayPolicy::aggressive().bounds(), (1.0, 3.0));
    assert_eq!(DelayPolicy::balanced().bounds(), (3.0, 6.0));
    assert_eq!(DelayPolicy::conservative().bounds(), (8.0, 15.0));
    assert_eq!(DelayPolicy::adaptive().bounds(), (2.0, 8.0));
}

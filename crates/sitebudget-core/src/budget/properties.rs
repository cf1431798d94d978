//! Property tests for the budget transitions.

use proptest::prelude::*;

use super::{DomainTimer, HOUR_MS};

fn arb_timer() -> impl Strategy<Value = DomainTimer> {
    (
        0i64..=7_200,
        -100i64..=14_400,
        1u32..=168,
        0i64..=2_000_000_000_000,
        any::<bool>(),
    )
        .prop_map(
            |(original_time, time_left, reset_interval, last_reset_timestamp, logged)| DomainTimer {
                original_time,
                time_left,
                reset_interval,
                last_reset_timestamp,
                expired_message_logged: logged,
            },
        )
}

proptest! {
    #[test]
    fn decrement_never_goes_negative(timer in arb_timer()) {
        prop_assert!(timer.decrement_one_tick().time_left >= 0);
    }

    #[test]
    fn repeated_decrement_converges_and_flags_once(mut timer in arb_timer()) {
        timer.time_left = timer.time_left.max(1);
        timer.expired_message_logged = false;

        let mut transitions = 0;
        for _ in 0..(timer.time_left + 5) {
            let next = timer.decrement_one_tick();
            if next.expired_message_logged && !timer.expired_message_logged {
                transitions += 1;
                prop_assert_eq!(timer.time_left, 1);
            }
            timer = next;
        }
        prop_assert_eq!(timer.time_left, 0);
        prop_assert!(timer.expired_message_logged);
        prop_assert_eq!(transitions, 1);
    }

    #[test]
    fn interval_reset_is_idempotent(timer in arb_timer(), offset in 0i64..=(200 * HOUR_MS)) {
        let now = timer.last_reset_timestamp + offset;
        let once = timer.check_interval_reset(now);
        prop_assert_eq!(once.check_interval_reset(now), once);
    }

    #[test]
    fn interval_reset_noop_before_due(timer in arb_timer(), early in 1i64..=HOUR_MS) {
        let now = timer.next_reset_at() - early;
        prop_assert_eq!(timer.check_interval_reset(now), timer);
    }

    #[test]
    fn same_budget_within_bounds_never_resets(mut timer in arb_timer(), interval in 1u32..=168) {
        timer.time_left = timer.time_left.clamp(0, timer.original_time);
        let r = timer.reconcile_settings_change(timer.original_time, interval, 42);
        prop_assert!(!r.was_reset);
        prop_assert_eq!(r.timer.time_left, timer.time_left);
        prop_assert_eq!(r.timer.last_reset_timestamp, timer.last_reset_timestamp);
    }

    #[test]
    fn budget_below_time_left_always_resets(timer in arb_timer(), cut in 1i64..=100) {
        let new_original = timer.time_left - cut;
        prop_assume!(new_original >= 0);
        let r = timer.reconcile_settings_change(new_original, timer.reset_interval, 42);
        prop_assert!(r.was_reset);
        prop_assert_eq!(r.timer.time_left, new_original);
    }
}

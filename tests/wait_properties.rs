use std::cell::Cell;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use waitkit::conditions::stable;
use waitkit::network::{AdaptiveTimeout, NetworkProfile, Reliability};
use waitkit::prelude::*;

fn waiter(clock: &ManualClock, timeout: Duration, interval: Duration) -> Waiter {
    Waiter::new(PollPolicy::new(timeout, interval)).with_clock(Arc::new(clock.clone()))
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[test]
fn satisfied_on_fifth_poll() {
    let clock = ManualClock::new();
    let mut n = 0;
    let outcome = waiter(&clock, secs(10), secs(1))
        .run(|| {
            n += 1;
            Observation::from_bool(n == 5)
        })
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.polls(), 5);
    // Polls run at 0s, 1s, 2s, 3s and 4s.
    assert!(outcome.elapsed() >= secs(4) && outcome.elapsed() <= secs(5));
}

#[test]
fn never_satisfied_times_out_within_one_interval() {
    let clock = ManualClock::new();
    let outcome = waiter(&clock, secs(3), secs(1)).run(|| Observation::<()>::NotYet).unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    assert!(outcome.elapsed() >= secs(3) && outcome.elapsed() <= secs(4));
    assert!((3..=4).contains(&outcome.polls()));
}

#[test]
fn slow_condition_still_bounded() {
    // Each evaluation takes 300ms of (virtual) time.
    let clock = ManualClock::new();
    let ticking = clock.clone();
    let outcome = waiter(&clock, secs(2), Duration::from_millis(500))
        .run(move || {
            ticking.advance(Duration::from_millis(300));
            Observation::<()>::NotYet
        })
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    assert!(outcome.elapsed() >= secs(2));
    assert!(outcome.elapsed() <= secs(2) + Duration::from_millis(500));
}

#[test]
fn backoff_spaces_polls_out() {
    let clock = ManualClock::new();
    let seen = clock.clone();
    let mut at = Vec::new();
    let policy = PollPolicy::new(secs(10), secs(1)).with_backoff(2.0);
    let outcome = Waiter::new(policy)
        .with_clock(Arc::new(clock.clone()))
        .run(|| {
            at.push(seen.elapsed().as_secs());
            Observation::<()>::NotYet
        })
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(at, vec![0, 1, 3, 7, 10]);
}

#[test]
fn cancelled_after_two_intervals() {
    let clock = ManualClock::new();
    let seen = clock.clone();
    let token = CancelToken::new();
    let trigger = token.clone();
    let interval = secs(1);
    let outcome = waiter(&clock, secs(30), interval)
        .cancel_on(token)
        .run(move || {
            if seen.elapsed() >= interval * 2 {
                trigger.cancel();
            }
            Observation::<()>::NotYet
        })
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
    assert!(outcome.elapsed() <= interval * 3);
}

#[test]
fn cancelled_from_another_thread() {
    let token = CancelToken::new();
    let trigger = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(60));
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = Waiter::new(PollPolicy::new(secs(10), Duration::from_millis(20)))
        .cancel_on(token)
        .run(|| Observation::<()>::NotYet)
        .unwrap();
    handle.join().unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Cancelled));
    assert!(started.elapsed() < secs(5));
}

#[test]
fn stability_needs_consecutive_identical_samples() {
    let clock = ManualClock::new();
    let mut snapshots = vec!["<ul>1</ul>", "<ul>1 2</ul>", "<ul>1 2 3</ul>", "<ul>1 2 3</ul>"].into_iter();
    let outcome = waiter(&clock, secs(10), Duration::from_millis(200))
        .run(stable(move || Observation::from_option(snapshots.next()), 2))
        .unwrap();
    assert_eq!(outcome.polls(), 4);
    assert_eq!(outcome.into_result().unwrap(), "<ul>1 2 3</ul>");
}

#[test]
fn stale_error_breaks_the_stable_run() {
    let clock = ManualClock::new();
    let mut samples = vec![
        Observation::Satisfied("a"),
        Observation::Failed(ObservedError::stale("#rows")),
        Observation::Satisfied("a"),
        Observation::Satisfied("a"),
    ]
    .into_iter();
    let outcome = waiter(&clock, secs(10), Duration::from_millis(200))
        .run(stable(move || samples.next().unwrap_or(Observation::NotYet), 2))
        .unwrap();
    assert_eq!(outcome.polls(), 4);
    assert_eq!(outcome.into_result().unwrap(), "a");
}

#[test]
fn ever_changing_value_never_stabilises() {
    let clock = ManualClock::new();
    let mut n = 0u64;
    let outcome = waiter(&clock, secs(2), Duration::from_millis(100))
        .run(stable(
            move || {
                n += 1;
                Observation::Satisfied(n)
            },
            2,
        ))
        .unwrap();
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
}

#[test]
fn fallback_second_of_three_succeeds() {
    let clock = ManualClock::new();
    let third_invoked = Cell::new(false);
    let chain = StrategyChain::new()
        .then("css", || || Observation::<&str>::NotYet)
        .then("xpath", || || Observation::Satisfied("found"))
        .then("javascript", || {
            third_invoked.set(true);
            || Observation::Satisfied("js")
        });

    let outcome = waiter(&clock, secs(3), Duration::from_millis(250)).run_chain(chain).unwrap();
    let chosen = outcome.into_result().unwrap();
    assert_eq!(chosen.label, "xpath");
    assert_eq!(chosen.failures.len(), 1);
    assert_eq!(chosen.failures[0].label, "css");
    assert_eq!(chosen.failures[0].failure.kind, FailureKind::Timeout);
    assert!(!third_invoked.get());
}

#[test]
fn adaptive_timeout_scales_with_network() {
    let adaptive = AdaptiveTimeout::new(secs(10));
    let fast = adaptive.timeout_for(&NetworkProfile::fast(), Reliability::default()).unwrap();
    let slow = adaptive.timeout_for(&NetworkProfile::slow_2g(), Reliability::default()).unwrap();
    assert!(adaptive.scaling_factor(NetworkClass::Slow2G) > adaptive.scaling_factor(NetworkClass::Fast));
    assert!(slow > fast);
    assert!(slow <= secs(50));
}

#[test]
fn adaptive_feedback_loop() {
    let adaptive = AdaptiveTimeout::new(secs(4));
    let template = PollPolicy::new(secs(1), Duration::from_millis(500));
    let profile = NetworkProfile::three_g();
    let clock = ManualClock::new();

    let mut reliability = Reliability::default();
    let policy = adaptive.policy_for(&template, &profile, reliability).unwrap();
    assert_eq!(policy.timeout(), secs(10));

    let outcome = Waiter::new(policy.clone())
        .with_clock(Arc::new(clock))
        .run(|| Observation::<()>::NotYet)
        .unwrap();
    reliability = adaptive.record(reliability, &outcome, policy.timeout());
    assert!(reliability.value() > 1.0);

    let next = adaptive.policy_for(&template, &profile, reliability).unwrap();
    assert!(next.timeout() > policy.timeout());
    assert!(next.timeout() <= secs(20));
}

proptest! {
    #[test]
    fn timeout_elapsed_is_bounded(timeout_ms in 1u64..5_000, interval_ms in 1u64..1_000) {
        let clock = ManualClock::new();
        let timeout = Duration::from_millis(timeout_ms);
        let interval = Duration::from_millis(interval_ms);
        let outcome = waiter(&clock, timeout, interval).run(|| Observation::<()>::NotYet).unwrap();
        prop_assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        prop_assert!(outcome.elapsed() >= timeout);
        prop_assert!(outcome.elapsed() <= timeout + interval);
        prop_assert!(outcome.polls() >= 1);
    }

    #[test]
    fn backoff_overrun_is_bounded(
        timeout_ms in 1u64..5_000,
        interval_ms in 1u64..1_000,
        factor in 1.0f64..4.0,
    ) {
        let clock = ManualClock::new();
        let timeout = Duration::from_millis(timeout_ms);
        let interval = Duration::from_millis(interval_ms);
        let policy = PollPolicy::new(timeout, interval).with_backoff(factor);
        let outcome = Waiter::new(policy)
            .with_clock(Arc::new(clock))
            .run(|| Observation::<()>::NotYet)
            .unwrap();
        prop_assert_eq!(outcome.failure_kind(), Some(FailureKind::Timeout));
        prop_assert!(outcome.elapsed() <= timeout + interval);
    }

    #[test]
    fn immediate_success_is_one_poll(timeout_ms in 1u64..5_000, interval_ms in 1u64..1_000) {
        let clock = ManualClock::new();
        let outcome = waiter(&clock, Duration::from_millis(timeout_ms), Duration::from_millis(interval_ms))
            .run(|| Observation::Satisfied(42))
            .unwrap();
        prop_assert_eq!(outcome.polls(), 1);
        prop_assert!(outcome.elapsed() < Duration::from_millis(interval_ms));
        prop_assert_eq!(outcome.into_result().unwrap(), 42);
    }

    #[test]
    fn adaptive_timeout_never_exceeds_cap(
        base_ms in 1u64..60_000,
        cap in 1.0f64..10.0,
        reliability in 0.0f64..100.0,
    ) {
        let adaptive = AdaptiveTimeout::new(Duration::from_millis(base_ms)).with_cap(cap);
        for profile in &[NetworkProfile::fast(), NetworkProfile::three_g(), NetworkProfile::slow_2g(), NetworkProfile::offline()] {
            let timeout = adaptive.timeout_for(profile, Reliability(reliability)).unwrap();
            let limit = Duration::from_millis(base_ms).as_secs_f64() * cap;
            prop_assert!(timeout.as_secs_f64() <= limit + 1e-6);
        }
    }
}

//! Property-based tests for doble.
//!
//! Uses proptest to verify resolution and verification invariants hold for
//! arbitrary inputs.

use doble::prelude::*;
use doble::ChaosEngine;
use proptest::prelude::*;

fn chaos_outcomes(seed: u64, rate: f64, calls: usize) -> Vec<bool> {
    let mock = Mock::new(MockBehavior::Loose);
    mock.set_chaos(
        ChaosPolicy::new()
            .with_failure_rate(rate)
            .with_exception(InjectedFault::message("chaos"))
            .with_seed(seed),
    )
    .unwrap();
    (0..calls).map(|_| mock.call("Fetch", values![]).is_err()).collect()
}

fn chaos_triggers(seed: u64, rate: f64, faults: usize, calls: usize) -> Vec<bool> {
    let policy = (0..faults).fold(
        ChaosPolicy::new().with_failure_rate(rate).with_seed(seed),
        |policy, i| policy.with_exception(InjectedFault::message(format!("fault {}", i))),
    );
    let mut engine = ChaosEngine::new(policy).unwrap();
    (0..calls).map(|_| engine.decide().triggered).collect()
}

// === Times Property Tests ===

proptest! {
    /// Between accepts exactly the closed interval.
    #[test]
    fn prop_between_is_closed_interval(
        from in 0usize..50,
        span in 0usize..50,
        count in 0usize..120
    ) {
        let to = from + span;
        let times = Times::between(from, to).unwrap();
        prop_assert_eq!(times.accepts(count), from <= count && count <= to);
    }

    /// Inverted bounds are rejected as misuse.
    #[test]
    fn prop_between_rejects_inverted(to in 0usize..50, gap in 1usize..50) {
        let result = Times::between(to + gap, to);
        let is_misuse = matches!(result, Err(MockError::Misuse { .. }));
        prop_assert!(is_misuse, "inverted bounds accepted: {}..{}", to + gap, to);
    }

    /// Exactly(n) accepts only n.
    #[test]
    fn prop_exactly_accepts_only_n(n in 0usize..100, count in 0usize..100) {
        prop_assert_eq!(Times::exactly(n).accepts(count), n == count);
    }
}

// === Matching Property Tests ===

proptest! {
    /// A stub never matches a call with a different argument count.
    #[test]
    fn prop_arity_is_strict(expected in 0usize..6, observed in 0usize..6) {
        let mock = Mock::new(MockBehavior::Strict);
        let matchers: Vec<Arg> = (0..expected).map(|_| It::any_value().into()).collect();
        mock.setup("Call", matchers).returns(true);

        let args: Vec<Value> = (0..observed).map(|i| Value::from(i as i64)).collect();
        prop_assert_eq!(mock.call("Call", args).is_ok(), expected == observed);
    }

    /// Any<T> accepts null and every T; NotNull<T> rejects null.
    #[test]
    fn prop_any_and_not_null(n in any::<i64>()) {
        let any = It::any::<i64>();
        let not_null = It::is_not_null::<i64>();
        prop_assert!(any.matches(&Value::Null));
        prop_assert!(any.matches(&Value::from(n)));
        prop_assert!(!not_null.matches(&Value::Null));
        prop_assert!(not_null.matches(&Value::from(n)));
    }

    /// Inclusive range matching agrees with integer comparison.
    #[test]
    fn prop_inclusive_range(low in -100i64..100, span in 0i64..100, n in -250i64..250) {
        let high = low + span;
        let matcher = It::is_in_range(low, high, Range::Inclusive);
        prop_assert_eq!(matcher.matches(&Value::from(n)), low <= n && n <= high);
    }

    /// Literal stubs return only for their own value.
    #[test]
    fn prop_literal_stub_selects_value(key in "[a-z]{1,8}", other in "[A-Z]{1,8}") {
        let mock = Mock::new(MockBehavior::Strict);
        mock.setup("Get", args![key.clone()]).returns(1);
        prop_assert_eq!(mock.call("Get", values![key]).unwrap(), Value::from(1));
        prop_assert!(mock.call("Get", values![other]).is_err());
    }
}

// === Result Strategy Property Tests ===

proptest! {
    /// Sequential results advance once per match and repeat the last step.
    #[test]
    fn prop_sequential_clamps_to_last(
        steps in prop::collection::vec(any::<i32>(), 1..8),
        calls in 1usize..16
    ) {
        let mock = Mock::new(MockBehavior::Strict);
        mock.setup("Next", args![]).returns_in_order(steps.clone());

        for i in 0..calls {
            let expected = steps[i.min(steps.len() - 1)];
            prop_assert_eq!(mock.call("Next", values![]).unwrap(), Value::from(expected));
        }
    }
}

// === Ordering Property Tests ===

proptest! {
    /// Calling bound steps in registration order never raises.
    #[test]
    fn prop_in_order_never_raises(steps in 1usize..10) {
        let token = SequenceToken::new();
        let mock = Mock::new(MockBehavior::Strict);
        for i in 0..steps {
            mock.setup(&format!("Step{i}"), args![]).in_sequence(&token);
        }
        for i in 0..steps {
            let signature = format!("Step{}", i);
            let resolved = mock.call(&signature, values![]).is_ok();
            prop_assert!(resolved, "in-order call rejected: {}", signature);
        }
        prop_assert!(token.is_complete());
    }

    /// Skipping ahead always names the next expected step.
    #[test]
    fn prop_skip_ahead_names_expected_step(steps in 2usize..10, done in 0usize..8, skip in 1usize..8) {
        let done = done.min(steps - 2);
        let target = (done + skip).min(steps - 1);
        let token = SequenceToken::new();
        let mock = Mock::new(MockBehavior::Strict);
        for i in 0..steps {
            mock.setup(&format!("Step{i}"), args![]).in_sequence(&token);
        }
        for i in 0..done {
            mock.call(&format!("Step{i}"), values![]).unwrap();
        }

        let err = mock.call(&format!("Step{target}"), values![]).unwrap_err();
        let is_expected = matches!(
            err,
            MockError::OutOfSequence { expected, actual, .. } if expected == done && actual == target
        );
        prop_assert!(is_expected);
    }
}

// === Chaos Property Tests ===

proptest! {
    /// Identical seed and rate yield identical accept/reject sequences.
    #[test]
    fn prop_chaos_is_deterministic(seed in any::<u64>(), rate in 0.0f64..=1.0, calls in 1usize..64) {
        prop_assert_eq!(chaos_outcomes(seed, rate, calls), chaos_outcomes(seed, rate, calls));
    }

    /// The trigger sequence does not depend on how many faults are configured.
    #[test]
    fn prop_triggers_ignore_fault_count(
        seed in any::<u64>(),
        rate in 0.0f64..=1.0,
        faults in 0usize..4,
        calls in 1usize..64
    ) {
        let baseline = chaos_triggers(seed, rate, 0, calls);
        prop_assert_eq!(chaos_triggers(seed, rate, faults, calls), baseline);
    }

    /// Zero failure rate never injects.
    #[test]
    fn prop_zero_rate_never_injects(seed in any::<u64>(), calls in 1usize..64) {
        prop_assert!(chaos_outcomes(seed, 0.0, calls).iter().all(|failed| !failed));
    }

    /// Rates outside [0, 1] are rejected.
    #[test]
    fn prop_invalid_rate_rejected(rate in 1.0001f64..100.0) {
        let mock = Mock::new(MockBehavior::Loose);
        prop_assert!(mock.set_chaos(ChaosPolicy::new().with_failure_rate(rate)).is_err());
        prop_assert!(mock.set_chaos(ChaosPolicy::new().with_failure_rate(-rate)).is_err());
    }
}

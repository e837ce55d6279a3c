//! Property-based tests for the step engine
//!
//! These tests verify the dispatch rules hold for arbitrary transition tables.

use super::*;
use crate::error::BodyError;
use crate::events::EventParams;
use crate::session::Session;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

/// Agent whose start state `s` has one constant-valued transition per entry
/// of `guards`, transition `i` leading to state `d{i}`. Returns the machine
/// and a per-transition evaluation counter.
fn fan_out(guards: &[bool], own_fallback: bool) -> (StateMachine, Arc<Vec<AtomicUsize>>) {
    let counters: Arc<Vec<AtomicUsize>> = Arc::new(guards.iter().map(|_| AtomicUsize::new(0)).collect());

    let mut builder = StateMachineBuilder::new("prop");
    let mut start = builder.new_state("s").initial();
    for (i, guard) in guards.iter().copied().enumerate() {
        let counters = Arc::clone(&counters);
        start = start.when_event_go_to(
            move |_: &Session, _: &EventParams| {
                counters[i].fetch_add(1, Ordering::SeqCst);
                guard
            },
            &format!("d{i}"),
            EventParams::new(),
        );
    }
    if own_fallback {
        start.fallback_body(tag("own"));
    }
    for i in 0..guards.len() {
        builder.new_state(format!("d{i}")).body(tag("entered"));
    }
    (builder.build().unwrap(), counters)
}

fn tag(label: &'static str) -> impl Fn(&mut Session) -> Result<(), BodyError> {
    move |session: &mut Session| {
        session.set("ran", label);
        Ok(())
    }
}

fn ran(session: &Session) -> Option<&str> {
    session.get("ran").and_then(serde_json::Value::as_str)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// The first true guard wins and no later guard is evaluated
    #[test]
    fn prop_first_true_transition_wins(guards in proptest::collection::vec(any::<bool>(), 0..8)) {
        let (machine, counters) = fan_out(&guards, false);
        let mut session = machine.new_session("p");
        let outcome = machine.step(&mut session);

        match guards.iter().position(|g| *g) {
            Some(first) => {
                let expected = format!("d{first}");
                prop_assert_eq!(session.current_state(), expected.as_str());
                prop_assert_eq!(ran(&session), Some("entered"));
                prop_assert!(outcome.moved());
                for (i, counter) in counters.iter().enumerate() {
                    let expected_calls = usize::from(i <= first);
                    prop_assert_eq!(counter.load(Ordering::SeqCst), expected_calls);
                }
            }
            None => {
                prop_assert_eq!(session.current_state(), "s");
                prop_assert_eq!(ran(&session), None);
                prop_assert_eq!(outcome, StepOutcome::NoOp { state: "s".to_string() });
                for counter in counters.iter() {
                    prop_assert_eq!(counter.load(Ordering::SeqCst), 1);
                }
            }
        }
    }

    /// A fallback never moves the session, and the state's own fallback
    /// shadows the global one
    #[test]
    fn prop_fallback_keeps_state(
        len in 0usize..6,
        own_fallback in any::<bool>(),
        global in any::<bool>(),
    ) {
        let (machine, _) = fan_out(&vec![false; len], own_fallback);
        if global {
            machine.set_global_fallback_body(tag("global"));
        }
        let mut session = machine.new_session("p");
        let outcome = machine.step(&mut session);

        prop_assert_eq!(session.current_state(), "s");
        let expected = match (own_fallback, global) {
            (true, _) => Some("own"),
            (false, true) => Some("global"),
            (false, false) => None,
        };
        prop_assert_eq!(ran(&session), expected);
        prop_assert_eq!(outcome.state(), "s");
    }

    /// Auto chains stop after the configured number of hops
    #[test]
    fn prop_auto_chain_bounded(chain in 1usize..10, limit in 0usize..12) {
        let mut builder = StateMachineBuilder::new("prop");
        builder.max_auto_transitions(limit);
        builder.new_state("a0").initial().go_to("a1");
        for i in 1..chain {
            builder.new_state(format!("a{i}")).go_to(&format!("a{}", i + 1));
        }
        builder.new_state(format!("a{chain}"));
        let machine = builder.build().unwrap();

        let mut session = machine.new_session("p");
        let path = machine.start(&mut session);

        let hops = chain.min(limit);
        prop_assert_eq!(path.len(), hops + 1);
        let expected = format!("a{hops}");
        prop_assert_eq!(session.current_state(), expected.as_str());
    }
}

//! Property-based tests for scenario evaluation

use super::*;
use crate::perception::{ImageEntity, ImagePrediction};
use crate::session::Session;
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

const NAMES: [&str; 4] = ["dog", "cat", "bird", "car"];

/// A session that sees some subset of `NAMES`, plus the leaves for all of them
fn arb_seen() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), NAMES.len())
}

fn session_seeing(seen: &[bool]) -> Session {
    let mut prediction = ImagePrediction::new();
    for (name, visible) in NAMES.iter().zip(seen) {
        if *visible {
            prediction = prediction.with_object(ImageEntity::new(*name), 0.9);
        }
    }
    let mut session = Session::new("prop", "idle");
    session.set_image_prediction(Some(prediction));
    session
}

fn leaf(index: usize) -> Expression {
    ScenarioImageEntity::new(NAMES[index], ImageEntity::new(NAMES[index]), 0.5).into()
}

fn arb_leaf_indices() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(0..NAMES.len(), 2..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_and_is_all(seen in arb_seen(), indices in arb_leaf_indices()) {
        let session = session_seeing(&seen);
        let expression = BooleanExpression::and(indices.iter().map(|i| leaf(*i)).collect()).unwrap();
        prop_assert_eq!(expression.evaluate(&session), indices.iter().all(|i| seen[*i]));
    }

    #[test]
    fn prop_or_is_any(seen in arb_seen(), indices in arb_leaf_indices()) {
        let session = session_seeing(&seen);
        let expression = BooleanExpression::or(indices.iter().map(|i| leaf(*i)).collect()).unwrap();
        prop_assert_eq!(expression.evaluate(&session), indices.iter().any(|i| seen[*i]));
    }

    #[test]
    fn prop_double_negation(seen in arb_seen(), index in 0..NAMES.len()) {
        let session = session_seeing(&seen);
        let expression = BooleanExpression::not(BooleanExpression::not(leaf(index)));
        prop_assert_eq!(expression.evaluate(&session), seen[index]);
    }

    #[test]
    fn prop_and_or_reject_short_lists(len in 0usize..2) {
        let children: Vec<Expression> = (0..len).map(leaf).collect();
        prop_assert!(BooleanExpression::and(children.clone()).is_err());
        prop_assert!(BooleanExpression::or(children).is_err());
    }

    #[test]
    fn prop_not_rejects_wrong_arity(len in prop_oneof![Just(0usize), 2usize..5]) {
        let children: Vec<Expression> = (0..len).map(|i| leaf(i % NAMES.len())).collect();
        prop_assert!(BooleanExpression::new(BooleanOperator::Not, children).is_err());
    }

    // Decision table: no detections never qualifies
    #[test]
    fn prop_zero_count_never_satisfies(min in 0u32..10, max in 0u32..10) {
        prop_assert!(!count_satisfies(min, max, 0));
    }

    // Decision table: max == 0 means "at least min"
    #[test]
    fn prop_unbounded_max_is_at_least_min(min in 1u32..10, count in 1usize..200) {
        prop_assert_eq!(count_satisfies(min, 0, count), count >= min as usize);
    }

    // Decision table: with both bounds set, result is the closed interval
    #[test]
    fn prop_bounded_is_closed_interval(min in 1u32..10, span in 0u32..10, count in 1usize..30) {
        let max = min + span;
        prop_assert_eq!(
            count_satisfies(min, max, count),
            (min as usize..=max as usize).contains(&count)
        );
    }

    // Leaf evaluation agrees with the decision table over real snapshots
    #[test]
    fn prop_leaf_matches_table(
        scores in proptest::collection::vec(0.0f64..1.0, 0..12),
        threshold in 0.0f64..1.0,
        min in 1u32..4,
        span in 0u32..4,
        bounded in any::<bool>(),
    ) {
        let max = if bounded { min + span } else { 0 };
        let dog = ImageEntity::new("dog");
        let requirement = ScenarioImageEntity::with_threshold(
            "dogs",
            dog.clone(),
            EntityThreshold { score: threshold, min, max },
        )
        .unwrap();

        let mut prediction = ImagePrediction::new().with_object(ImageEntity::new("cat"), 0.99);
        for score in &scores {
            prediction = prediction.with_object(dog.clone(), *score);
        }
        let mut session = Session::new("prop", "idle");
        session.set_image_prediction(Some(prediction));

        let qualifying = scores.iter().filter(|s| **s >= threshold).count();
        prop_assert_eq!(requirement.evaluate(&session), count_satisfies(min, max, qualifying));
    }
}

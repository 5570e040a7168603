//! Property-based test generators using proptest.
//!
//! Provides strategies for initial values, pure update functions and whole
//! transaction plans.

use proptest::prelude::*;

/// A pure update function over `i64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Wrapping addition.
    Add(i64),
    /// Wrapping multiplication.
    Mul(i64),
    /// Wrapping negation.
    Neg,
    /// Replace with a constant.
    Set(i64),
}

impl Op {
    /// Applies the update.
    #[must_use]
    pub fn apply(self, value: i64) -> i64 {
        match self {
            Self::Add(n) => value.wrapping_add(n),
            Self::Mul(n) => value.wrapping_mul(n),
            Self::Neg => value.wrapping_neg(),
            Self::Set(n) => n,
        }
    }
}

/// Per-participant initial values and staged updates.
#[derive(Debug, Clone)]
pub struct TxnPlan {
    /// Initial value of each participant.
    pub initial: Vec<i64>,
    /// Update staged on each participant, same length as `initial`.
    pub ops: Vec<Op>,
}

impl TxnPlan {
    /// Number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.initial.len()
    }

    /// Always false for generated plans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    /// Values every participant holds after a successful commit.
    #[must_use]
    pub fn expected(&self) -> Vec<i64> {
        self.initial
            .iter()
            .zip(&self.ops)
            .map(|(v, op)| op.apply(*v))
            .collect()
    }
}

/// Strategy for entity values.
pub fn value_strategy() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000
}

/// Strategy for short text values.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z ]{0,16}").expect("Invalid regex")
}

/// Strategy for update functions.
pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (-1_000i64..1_000).prop_map(Op::Add),
        (-8i64..8).prop_map(Op::Mul),
        Just(Op::Neg),
        value_strategy().prop_map(Op::Set),
    ]
}

/// Strategy for transaction plans with 2 to 5 participants.
pub fn plan_strategy() -> impl Strategy<Value = TxnPlan> {
    (2usize..=5).prop_flat_map(|len| {
        (
            prop::collection::vec(value_strategy(), len),
            prop::collection::vec(op_strategy(), len),
        )
            .prop_map(|(initial, ops)| TxnPlan { initial, ops })
    })
}

/// Strategy for a plan plus the index of one participant inside it.
pub fn plan_with_index_strategy() -> impl Strategy<Value = (TxnPlan, usize)> {
    plan_strategy().prop_flat_map(|plan| {
        let len = plan.len();
        (Just(plan), 0..len)
    })
}

//! Constraint-based order validation.
//!
//! Each role carries an ordered list of constraint rules built at config
//! load and immutable thereafter. Constraints are a tagged sum with a
//! common `check` capability; they run in declared order and the first
//! failure short-circuits into a rejection carrying the rule's configured
//! error code.

mod constraints;
mod rate;

pub use constraints::{ConstraintKind, ConstraintRule, OrderTypeKind};
pub use rate::RateWindow;

use serde::Serialize;

use crate::orderbook::Order;

/// A business rejection produced by validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Stable machine-readable code, e.g. `MM_POS_LIMIT`
    pub code: String,
    /// Human-readable explanation
    pub message: String,
}

impl Rejection {
    /// Build a rejection from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Everything a constraint may consult about the world around an order.
///
/// Assembled by the validator worker per order; constraints never reach
/// into shared state themselves.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    /// Current net position of the team on the order's instrument
    pub position: i64,
    /// Sum of absolute positions across all the team's instruments
    pub portfolio_abs_total: i64,
    /// Orders from this team inside the rolling rate window, including
    /// this one (rejected orders still consume rate budget)
    pub recent_order_count: usize,
    /// Current mid price of the order's book in cents, when both sides
    /// are quoted
    pub mid_price: Option<f64>,
}

/// The ordered constraint list for one role.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    rules: Vec<ConstraintRule>,
}

impl ConstraintSet {
    /// Build a set from rules in declared order.
    pub fn new(rules: Vec<ConstraintRule>) -> Self {
        Self { rules }
    }

    /// An empty set that accepts everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Run every rule in order; the first failure wins.
    pub fn check(&self, order: &Order, ctx: &ValidationContext) -> Result<(), Rejection> {
        for rule in &self.rules {
            rule.check(order, ctx)?;
        }
        Ok(())
    }

    /// Number of rules in this set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

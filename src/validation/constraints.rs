//! The built-in constraint kinds.

use serde::{Deserialize, Serialize};

use super::{Rejection, ValidationContext};
use crate::orderbook::Order;

/// Order types a role can be permitted to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderTypeKind {
    /// Priced order that may rest
    Limit,
    /// Unpriced order that executes immediately or is cancelled
    Market,
    /// Two-sided quote; accepted in configuration but no submission path
    /// exists for it yet
    Quote,
}

/// The parameterized body of a constraint rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintKind {
    /// Post-trade position bound. `symmetric` bounds the absolute value;
    /// otherwise only the signed position is bounded above.
    PositionLimit {
        /// Largest permitted post-trade position
        max: i64,
        /// Whether the bound applies to |position|
        symmetric: bool,
    },
    /// The order's symbol must appear in the whitelist.
    InstrumentAllowed {
        /// Permitted symbols
        whitelist: Vec<String>,
    },
    /// Rolling-window submission rate cap.
    OrderRate {
        /// Maximum orders per rolling second
        max_per_second: usize,
    },
    /// Only the listed order types may be submitted.
    OrderType {
        /// Permitted order types
        allowed: Vec<OrderTypeKind>,
    },
    /// Limit price must sit within a percentage band around the mid.
    /// Vacuously satisfied for market orders and one-sided books.
    PriceRange {
        /// Maximum distance from mid, in percent
        max_pct_from_mid: f64,
    },
    /// Post-trade bound on Σ|position| across all instruments.
    PortfolioLimit {
        /// Largest permitted total absolute position
        max_total: i64,
    },
}

/// One configured constraint: a kind plus the rejection it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRule {
    /// What to check
    pub kind: ConstraintKind,
    /// Stable rejection code surfaced to clients
    pub error_code: String,
    /// Human-readable rejection text
    pub error_message: String,
}

impl ConstraintRule {
    /// Build a rule.
    pub fn new(
        kind: ConstraintKind,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }

    /// Check one order against this rule.
    pub fn check(&self, order: &Order, ctx: &ValidationContext) -> Result<(), Rejection> {
        let ok = match &self.kind {
            ConstraintKind::PositionLimit { max, symmetric } => {
                let post = ctx.position + order.side.sign() * order.quantity as i64;
                if *symmetric { post.abs() <= *max } else { post <= *max }
            }
            ConstraintKind::InstrumentAllowed { whitelist } => {
                whitelist.iter().any(|s| s == &order.symbol)
            }
            ConstraintKind::OrderRate { max_per_second } => {
                ctx.recent_order_count <= *max_per_second
            }
            ConstraintKind::OrderType { allowed } => {
                let kind = if order.is_market() {
                    OrderTypeKind::Market
                } else {
                    OrderTypeKind::Limit
                };
                allowed.contains(&kind)
            }
            ConstraintKind::PriceRange { max_pct_from_mid } => {
                match (order.price, ctx.mid_price) {
                    (Some(price), Some(mid)) if mid > 0.0 => {
                        let distance_pct = (price as f64 - mid).abs() / mid * 100.0;
                        distance_pct <= *max_pct_from_mid
                    }
                    _ => true,
                }
            }
            ConstraintKind::PortfolioLimit { max_total } => {
                let post = ctx.position + order.side.sign() * order.quantity as i64;
                let post_total = ctx.portfolio_abs_total - ctx.position.abs() + post.abs();
                post_total <= *max_total
            }
        };

        if ok {
            Ok(())
        } else {
            Err(Rejection::new(&self.error_code, &self.error_message))
        }
    }
}

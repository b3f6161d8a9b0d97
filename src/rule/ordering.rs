//! Deterministic total order over rules.
//!
//! Key, compared left to right:
//! 1. explicit order ascending, absent order last
//! 2. registration sequence (distinct declaring units, or static rules)
//! 3. declaration order within a unit (kind priority, then method name)
//!
//! Every rule in a registry snapshot has a distinct (registration,
//! declaration order) pair, so the order is total.

use std::cmp::Ordering;
use std::sync::Arc;

use super::Rule;

/// Comparator applied to eligible rules before a chain is cached.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderingPolicy;

impl OrderingPolicy {
    pub fn key(rule: &Rule) -> (bool, i32, u64, usize) {
        (
            rule.order().is_none(),
            rule.order().unwrap_or(0),
            rule.registration(),
            rule.declaration_order(),
        )
    }

    pub fn compare(a: &Rule, b: &Rule) -> Ordering {
        Self::key(a).cmp(&Self::key(b))
    }

    /// Stable sort by [`OrderingPolicy::key`].
    pub fn sort(rules: &mut [Arc<Rule>]) {
        rules.sort_by(|a, b| Self::compare(a, b));
    }
}

//! Per-method chains built from a class's resolved rules.

use std::fmt;
use std::sync::Arc;

use crate::rule::Rule;
use crate::target::{Arguments, Method, TargetClass};

/// One link of an interception chain.
#[derive(Clone)]
pub struct ChainLink {
    rule: Arc<Rule>,
    dynamic: bool,
}

impl ChainLink {
    /// `dynamic` links consult the rule's runtime matcher on every call.
    pub fn new(rule: Arc<Rule>, dynamic: bool) -> Self {
        Self { rule, dynamic }
    }

    pub fn rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Per-call argument check for dynamic links.
    pub fn matches_args(&self, method: &Method, class: &TargetClass, args: &Arguments) -> bool {
        self.rule
            .pointcut()
            .method_matcher()
            .matches_args(method, class, args)
    }
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("rule", &self.rule.to_string())
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

/// Whether `rule` applies to `method` of `class`.
///
/// The class filter is a hard veto. Introductions apply at type level and
/// match every method of a class they apply to.
pub fn matches(rule: &Rule, method: &Method, class: &TargetClass) -> bool {
    let pointcut = rule.pointcut();
    if !pointcut.matches_class(class) {
        return false;
    }
    if rule.is_introduction() {
        return true;
    }
    pointcut.matches_method(method, class)
}

/// Ordered chain for one method. Introductions are skipped; they never
/// take part in a call.
pub fn chain_for(rules: &[Arc<Rule>], method: &Method, class: &TargetClass) -> Arc<[ChainLink]> {
    rules
        .iter()
        .filter(|r| !r.is_introduction() && matches(r, method, class))
        .map(|r| ChainLink::new(r.clone(), r.pointcut().is_runtime()))
        .collect()
}

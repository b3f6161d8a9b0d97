//! Matchers deciding where a rule applies.
//!
//! A [`Pointcut`] pairs a [`ClassFilter`] (hard veto at type level) with a
//! [`MethodMatcher`]. Both are pure and may be called concurrently. A method
//! matcher may be *runtime*: its static part is checked when a chain is built,
//! and `matches_args` is evaluated on every call.
//!
//! # Example
//!
//! ```ignore
//! let pointcut = Pointcut::new(TypeNameFilter::new("*Service"), NameMatch::new(["get*"]))
//!     .and(Pointcut::for_methods(TaggedMethod::new("Cached")));
//! ```

mod expression;
mod filters;
mod pattern;

use std::fmt;
use std::sync::Arc;

use crate::target::{Arguments, Method, TargetClass};

pub use expression::{ExpressionEvaluator, ExpressionPointcut};
pub use filters::{
    AllOf, AnyOf, CapabilityFilter, FnClassFilter, FnMethodMatcher, NameMatch, RuntimeMatcher,
    TaggedClass, TaggedMethod, TrueFilter, TypeNameFilter,
};
pub use pattern::{any_match, simple_match};

/// Type-level predicate.
pub trait ClassFilter: Send + Sync {
    fn matches(&self, class: &TargetClass) -> bool;
}

/// Method-level predicate.
pub trait MethodMatcher: Send + Sync {
    /// Static match, evaluated once per (class, method) when a chain is built.
    fn matches(&self, method: &Method, class: &TargetClass) -> bool;

    /// Whether `matches_args` must be consulted on every call.
    fn is_runtime(&self) -> bool {
        false
    }

    /// Argument-sensitive match. Only called when `is_runtime` is true and
    /// the static match succeeded.
    fn matches_args(&self, _method: &Method, _class: &TargetClass, _args: &Arguments) -> bool {
        true
    }

    /// Fast-reject hint: when false, no method of `class` is examined.
    fn is_candidate_class(&self, _class: &TargetClass) -> bool {
        true
    }
}

/// A type filter plus a method matcher.
#[derive(Clone)]
pub struct Pointcut {
    class_filter: Arc<dyn ClassFilter>,
    method_matcher: Arc<dyn MethodMatcher>,
}

impl Pointcut {
    pub fn new(
        class_filter: impl ClassFilter + 'static,
        method_matcher: impl MethodMatcher + 'static,
    ) -> Self {
        Self {
            class_filter: Arc::new(class_filter),
            method_matcher: Arc::new(method_matcher),
        }
    }

    pub fn from_parts(
        class_filter: Arc<dyn ClassFilter>,
        method_matcher: Arc<dyn MethodMatcher>,
    ) -> Self {
        Self {
            class_filter,
            method_matcher,
        }
    }

    /// Matches every method of every class.
    pub fn always() -> Self {
        Self::new(TrueFilter, TrueFilter)
    }

    /// Every method of the classes passing `class_filter`.
    pub fn for_classes(class_filter: impl ClassFilter + 'static) -> Self {
        Self::new(class_filter, TrueFilter)
    }

    /// Methods passing `method_matcher`, on any class.
    pub fn for_methods(method_matcher: impl MethodMatcher + 'static) -> Self {
        Self::new(TrueFilter, method_matcher)
    }

    /// Pointcut backed by an external expression evaluator.
    pub fn expression(
        expression: impl Into<String>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        let pointcut = Arc::new(ExpressionPointcut::new(expression, evaluator));
        Self {
            class_filter: pointcut.clone(),
            method_matcher: pointcut,
        }
    }

    pub fn class_filter(&self) -> &Arc<dyn ClassFilter> {
        &self.class_filter
    }

    pub fn method_matcher(&self) -> &Arc<dyn MethodMatcher> {
        &self.method_matcher
    }

    pub fn matches_class(&self, class: &TargetClass) -> bool {
        self.class_filter.matches(class)
    }

    pub fn is_candidate_class(&self, class: &TargetClass) -> bool {
        self.method_matcher.is_candidate_class(class)
    }

    pub fn matches_method(&self, method: &Method, class: &TargetClass) -> bool {
        self.method_matcher.matches(method, class)
    }

    pub fn is_runtime(&self) -> bool {
        self.method_matcher.is_runtime()
    }

    /// Both pointcuts must match.
    pub fn and(self, other: Pointcut) -> Self {
        Self {
            class_filter: Arc::new(AllOf::new(vec![self.class_filter, other.class_filter])),
            method_matcher: Arc::new(AllOf::new(vec![self.method_matcher, other.method_matcher])),
        }
    }

    /// Either pointcut matches. Each side keeps its own class filter, so a
    /// method matches only together with the class filter it was paired with.
    pub fn or(self, other: Pointcut) -> Self {
        let union = Arc::new(Union {
            left: self.clone(),
            right: other.clone(),
        });
        Self {
            class_filter: Arc::new(AnyOf::new(vec![self.class_filter, other.class_filter])),
            method_matcher: union,
        }
    }
}

impl fmt::Debug for Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointcut")
            .field("runtime", &self.is_runtime())
            .finish_non_exhaustive()
    }
}

/// Method matcher for `Pointcut::or`.
struct Union {
    left: Pointcut,
    right: Pointcut,
}

impl Union {
    fn sides(&self) -> [&Pointcut; 2] {
        [&self.left, &self.right]
    }
}

impl MethodMatcher for Union {
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        self.sides()
            .iter()
            .any(|p| p.matches_class(class) && p.matches_method(method, class))
    }

    fn is_runtime(&self) -> bool {
        self.left.is_runtime() || self.right.is_runtime()
    }

    fn matches_args(&self, method: &Method, class: &TargetClass, args: &Arguments) -> bool {
        self.sides().iter().any(|p| {
            p.matches_class(class)
                && p.matches_method(method, class)
                && (!p.is_runtime() || p.method_matcher.matches_args(method, class, args))
        })
    }

    fn is_candidate_class(&self, class: &TargetClass) -> bool {
        self.sides().iter().any(|p| p.is_candidate_class(class))
    }
}

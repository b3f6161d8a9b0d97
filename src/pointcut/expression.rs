//! Pointcuts backed by an external expression evaluator.
//!
//! The expression grammar lives outside this crate. The engine only sees an
//! opaque predicate plus an optional candidate-type hint.

use std::fmt;
use std::sync::Arc;

use super::{ClassFilter, MethodMatcher};
use crate::target::{Arguments, Method, TargetClass};

/// Evaluates pointcut expressions. Implemented by a rule source.
pub trait ExpressionEvaluator: Send + Sync {
    /// Fast pre-filter. When false, no method of `class` is evaluated.
    fn is_candidate_type(&self, _expression: &str, _class: &TargetClass) -> bool {
        true
    }

    /// Type-level match used as the pointcut's class filter.
    fn matches_type(&self, _expression: &str, _class: &TargetClass) -> bool {
        true
    }

    /// Method-level match. `args` is `Some` only for per-call evaluation of
    /// runtime expressions.
    fn evaluate_method_match(
        &self,
        expression: &str,
        method: &Method,
        class: &TargetClass,
        args: Option<&Arguments>,
    ) -> bool;

    /// Whether the expression depends on call arguments.
    fn is_runtime(&self, _expression: &str) -> bool {
        false
    }
}

/// Class filter and method matcher for one expression.
pub struct ExpressionPointcut {
    expression: String,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ExpressionPointcut {
    pub fn new(expression: impl Into<String>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            expression: expression.into(),
            evaluator,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Debug for ExpressionPointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionPointcut")
            .field("expression", &self.expression)
            .finish()
    }
}

impl ClassFilter for ExpressionPointcut {
    fn matches(&self, class: &TargetClass) -> bool {
        self.evaluator.matches_type(&self.expression, class)
    }
}

impl MethodMatcher for ExpressionPointcut {
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        self.evaluator
            .evaluate_method_match(&self.expression, method, class, None)
    }

    fn is_runtime(&self) -> bool {
        self.evaluator.is_runtime(&self.expression)
    }

    fn matches_args(&self, method: &Method, class: &TargetClass, args: &Arguments) -> bool {
        self.evaluator
            .evaluate_method_match(&self.expression, method, class, Some(args))
    }

    fn is_candidate_class(&self, class: &TargetClass) -> bool {
        self.evaluator.is_candidate_type(&self.expression, class)
    }
}

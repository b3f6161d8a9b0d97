//! Rules: a pointcut, a behavior, and ordering metadata.
//!
//! Rules are immutable once built and shared as `Arc<Rule>`; resolved and
//! cached chains hold references to the registry's rules, never copies.

pub mod ordering;

use std::fmt;
use std::sync::Arc;

use crate::advice::{Advice, AdviceKind, Interceptor, Introduction};
use crate::error::Result;
use crate::pointcut::Pointcut;

pub use ordering::OrderingPolicy;

/// A behavior bound to the places it applies.
pub struct Rule {
    name: String,
    pointcut: Pointcut,
    advice: Advice,
    interceptor: Option<Arc<dyn Interceptor>>,
    order: Option<i32>,
    unit: Option<String>,
    registration: u64,
    declaration_order: usize,
}

impl Rule {
    pub fn builder(name: impl Into<String>, advice: Advice) -> RuleBuilder {
        RuleBuilder {
            name: name.into(),
            advice,
            pointcut: Pointcut::always(),
            order: None,
            unit: None,
            declaration_order: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn kind(&self) -> AdviceKind {
        self.advice.kind()
    }

    /// Around form of the behavior, computed when the rule was built.
    /// `None` for introductions.
    pub fn interceptor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.interceptor.as_ref()
    }

    /// Explicit priority; lower runs earlier, `None` runs last.
    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// Name of the declaring unit this rule was expanded from.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Name used for eligibility checks: the declaring unit, or the rule
    /// itself for static registrations.
    pub fn eligibility_name(&self) -> &str {
        self.unit().unwrap_or(&self.name)
    }

    /// Sequence assigned by the registry; rules of one unit share it.
    pub fn registration(&self) -> u64 {
        self.registration
    }

    /// Position within the declaring unit.
    pub fn declaration_order(&self) -> usize {
        self.declaration_order
    }

    /// Whether the rule was expanded from a declaring unit.
    pub fn is_declarative(&self) -> bool {
        self.unit.is_some()
    }

    pub fn is_introduction(&self) -> bool {
        self.advice.is_introduction()
    }

    pub fn introduction(&self) -> Option<&Introduction> {
        self.advice.as_introduction()
    }

    /// Rule owned by the engine itself. Never an introduction.
    pub(crate) fn infrastructure(name: &str, advice: Advice, order: i32) -> Rule {
        let interceptor = advice.to_interceptor();
        Rule {
            name: name.to_string(),
            pointcut: Pointcut::always(),
            advice,
            interceptor,
            order: Some(order),
            unit: None,
            registration: 0,
            declaration_order: 0,
        }
    }

    pub(crate) fn with_registration(mut self, registration: u64) -> Self {
        self.registration = registration;
        self
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("order", &self.order)
            .field("unit", &self.unit)
            .field("registration", &self.registration)
            .field("declaration_order", &self.declaration_order)
            .finish()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{}.{}", unit, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Builder for [`Rule`].
pub struct RuleBuilder {
    name: String,
    advice: Advice,
    pointcut: Pointcut,
    order: Option<i32>,
    unit: Option<String>,
    declaration_order: usize,
}

impl RuleBuilder {
    /// Where the rule applies. Defaults to every method of every class.
    pub fn pointcut(mut self, pointcut: Pointcut) -> Self {
        self.pointcut = pointcut;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn maybe_order(mut self, order: Option<i32>) -> Self {
        self.order = order;
        self
    }

    /// Mark the rule as the `index`th contribution of declaring unit `unit`.
    pub fn declared_by(mut self, unit: impl Into<String>, index: usize) -> Self {
        self.unit = Some(unit.into());
        self.declaration_order = index;
        self
    }

    /// Build the rule. Introductions are validated here so a malformed
    /// one fails at registration rather than at call time.
    pub fn build(self) -> Result<Rule> {
        if let Some(intro) = self.advice.as_introduction() {
            intro.validate()?;
        }
        let interceptor = self.advice.to_interceptor();
        Ok(Rule {
            name: self.name,
            pointcut: self.pointcut,
            advice: self.advice,
            interceptor,
            order: self.order,
            unit: self.unit,
            registration: 0,
            declaration_order: self.declaration_order,
        })
    }
}

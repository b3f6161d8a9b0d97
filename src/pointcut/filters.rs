//! Stock class filters and method matchers.

use std::sync::Arc;

use super::pattern::any_match;
use super::{ClassFilter, MethodMatcher};
use crate::target::{Arguments, Method, TargetClass};

/// Matches everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrueFilter;

impl ClassFilter for TrueFilter {
    fn matches(&self, _class: &TargetClass) -> bool {
        true
    }
}

impl MethodMatcher for TrueFilter {
    fn matches(&self, _method: &Method, _class: &TargetClass) -> bool {
        true
    }
}

/// Class name against a `*` wildcard pattern.
#[derive(Clone, Debug)]
pub struct TypeNameFilter {
    pattern: String,
}

impl TypeNameFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

impl ClassFilter for TypeNameFilter {
    fn matches(&self, class: &TargetClass) -> bool {
        super::simple_match(&self.pattern, class.name())
    }
}

/// Classes implementing a capability.
#[derive(Clone, Debug)]
pub struct CapabilityFilter {
    capability: String,
}

impl CapabilityFilter {
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
        }
    }
}

impl ClassFilter for CapabilityFilter {
    fn matches(&self, class: &TargetClass) -> bool {
        class.implements(&self.capability)
    }
}

/// Classes carrying a tag.
#[derive(Clone, Debug)]
pub struct TaggedClass {
    tag: String,
}

impl TaggedClass {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl ClassFilter for TaggedClass {
    fn matches(&self, class: &TargetClass) -> bool {
        class.has_tag(&self.tag)
    }
}

/// Methods carrying a tag. A tag on the class applies to all its methods.
#[derive(Clone, Debug)]
pub struct TaggedMethod {
    tag: String,
}

impl TaggedMethod {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl MethodMatcher for TaggedMethod {
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        method.has_tag(&self.tag) || class.has_tag(&self.tag)
    }
}

/// Method names against `*` wildcard patterns.
#[derive(Clone, Debug)]
pub struct NameMatch {
    patterns: Vec<String>,
}

impl NameMatch {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl MethodMatcher for NameMatch {
    fn matches(&self, method: &Method, _class: &TargetClass) -> bool {
        any_match(&self.patterns, method.name())
    }
}

/// Class filter from a closure.
pub struct FnClassFilter<F>(F);

impl<F> FnClassFilter<F>
where
    F: Fn(&TargetClass) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ClassFilter for FnClassFilter<F>
where
    F: Fn(&TargetClass) -> bool + Send + Sync,
{
    fn matches(&self, class: &TargetClass) -> bool {
        (self.0)(class)
    }
}

/// Static method matcher from a closure.
pub struct FnMethodMatcher<F>(F);

impl<F> FnMethodMatcher<F>
where
    F: Fn(&Method, &TargetClass) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> MethodMatcher for FnMethodMatcher<F>
where
    F: Fn(&Method, &TargetClass) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        (self.0)(method, class)
    }
}

/// Runtime matcher: a static matcher plus a per-call argument predicate.
pub struct RuntimeMatcher<M, F> {
    static_part: M,
    predicate: F,
}

impl<M, F> RuntimeMatcher<M, F>
where
    M: MethodMatcher,
    F: Fn(&Method, &Arguments) -> bool + Send + Sync,
{
    pub fn new(static_part: M, predicate: F) -> Self {
        Self {
            static_part,
            predicate,
        }
    }
}

impl<M, F> MethodMatcher for RuntimeMatcher<M, F>
where
    M: MethodMatcher,
    F: Fn(&Method, &Arguments) -> bool + Send + Sync,
{
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        self.static_part.matches(method, class)
    }

    fn is_runtime(&self) -> bool {
        true
    }

    fn matches_args(&self, method: &Method, _class: &TargetClass, args: &Arguments) -> bool {
        (self.predicate)(method, args)
    }

    fn is_candidate_class(&self, class: &TargetClass) -> bool {
        self.static_part.is_candidate_class(class)
    }
}

/// Intersection of filters or matchers.
pub struct AllOf<T: ?Sized> {
    parts: Vec<Arc<T>>,
}

impl<T: ?Sized> AllOf<T> {
    pub fn new(parts: Vec<Arc<T>>) -> Self {
        Self { parts }
    }
}

impl ClassFilter for AllOf<dyn ClassFilter> {
    fn matches(&self, class: &TargetClass) -> bool {
        self.parts.iter().all(|p| p.matches(class))
    }
}

impl MethodMatcher for AllOf<dyn MethodMatcher> {
    fn matches(&self, method: &Method, class: &TargetClass) -> bool {
        self.parts.iter().all(|p| p.matches(method, class))
    }

    fn is_runtime(&self) -> bool {
        self.parts.iter().any(|p| p.is_runtime())
    }

    fn matches_args(&self, method: &Method, class: &TargetClass, args: &Arguments) -> bool {
        self.parts
            .iter()
            .filter(|p| p.is_runtime())
            .all(|p| p.matches_args(method, class, args))
    }

    fn is_candidate_class(&self, class: &TargetClass) -> bool {
        self.parts.iter().all(|p| p.is_candidate_class(class))
    }
}

/// Union of class filters.
pub struct AnyOf<T: ?Sized> {
    parts: Vec<Arc<T>>,
}

impl<T: ?Sized> AnyOf<T> {
    pub fn new(parts: Vec<Arc<T>>) -> Self {
        Self { parts }
    }
}

impl ClassFilter for AnyOf<dyn ClassFilter> {
    fn matches(&self, class: &TargetClass) -> bool {
        self.parts.iter().any(|p| p.matches(class))
    }
}

//! Resolution of the rules that apply to a class.
//!
//! For each (class, bean key) the resolver filters the registry's
//! candidates, lets extenders inject extra rules, orders the result, and
//! validates introductions. Results are cached per class identity and
//! registry generation, so two classes sharing a name never share an entry.
//!
//! Empty results are cached too and mean "do not intercept".

mod chain;

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{AopError, Result};
use crate::invocation::ExposeJoinPoint;
use crate::registry::RuleRegistry;
use crate::rule::{OrderingPolicy, Rule};
use crate::target::{ClassId, Method, TargetClass};

pub use chain::{chain_for, matches, ChainLink};

/// Injects rules after eligibility filtering, before ordering.
pub trait RuleExtender: Send + Sync {
    fn extend(&self, class: &TargetClass, eligible: &mut Vec<Arc<Rule>>);
}

/// Adds the join-point exposure rule whenever a rule expanded from a
/// declaring unit is eligible.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExposeJoinPointExtender;

impl RuleExtender for ExposeJoinPointExtender {
    fn extend(&self, _class: &TargetClass, eligible: &mut Vec<Arc<Rule>>) {
        let declarative = eligible.iter().any(|r| r.is_declarative());
        let present = eligible.iter().any(|r| ExposeJoinPoint::is_exposure_rule(r));
        if declarative && !present {
            eligible.insert(0, ExposeJoinPoint::rule());
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ResolutionKey {
    class: ClassId,
    bean_key: String,
}

struct Resolved {
    generation: u64,
    rules: Arc<[Arc<Rule>]>,
    // keeps the allocation behind the ClassId from being reused
    _class: Weak<TargetClass>,
}

/// Resolves and caches the ordered rules applying to each class.
pub struct ChainResolver {
    registry: Arc<RuleRegistry>,
    extenders: Vec<Arc<dyn RuleExtender>>,
    cache: DashMap<ResolutionKey, Resolved>,
}

impl ChainResolver {
    /// Resolver with the default [`ExposeJoinPointExtender`].
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            extenders: vec![Arc::new(ExposeJoinPointExtender)],
            cache: DashMap::new(),
        }
    }

    pub fn with_extender(mut self, extender: Arc<dyn RuleExtender>) -> Self {
        self.extenders.push(extender);
        self
    }

    /// Drop every extender, including the default one.
    pub fn without_extenders(mut self) -> Self {
        self.extenders.clear();
        self
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Ordered rules applying to `class`, including introductions.
    ///
    /// Infrastructure classes resolve to nothing without consulting any
    /// rule. Concurrent first calls may compute twice; one result is kept
    /// and returned to every later caller.
    pub fn resolve(&self, class: &Arc<TargetClass>, bean_key: &str) -> Result<Arc<[Arc<Rule>]>> {
        if class.is_infrastructure() {
            trace!(class = %class.name(), "Infrastructure class is never advised");
            return Ok(Arc::from(Vec::new()));
        }

        let generation = self.registry.generation();
        let key = ResolutionKey {
            class: ClassId::of(class),
            bean_key: bean_key.to_string(),
        };
        if let Some(hit) = self.cache.get(&key) {
            if hit.generation == generation {
                return Ok(hit.rules.clone());
            }
        }

        let rules = self.compute(class)?;
        debug!(
            class = %class.name(),
            bean_key,
            generation,
            rules = rules.len(),
            "Resolved eligible rules"
        );

        let mut entry = self.cache.entry(key).or_insert_with(|| Resolved {
            generation,
            rules: rules.clone(),
            _class: Arc::downgrade(class),
        });
        if entry.generation < generation {
            entry.generation = generation;
            entry.rules = rules;
        }
        Ok(entry.rules.clone())
    }

    /// Whether `rule` applies to `method` of `class`.
    pub fn matches(&self, rule: &Rule, method: &Method, class: &TargetClass) -> bool {
        matches(rule, method, class)
    }

    /// Forget every cached resolution.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn compute(&self, class: &TargetClass) -> Result<Arc<[Arc<Rule>]>> {
        let candidates = self.registry.find_candidate_rules()?;
        let mut eligible = find_eligible(&candidates, class);

        for extender in &self.extenders {
            extender.extend(class, &mut eligible);
        }

        OrderingPolicy::sort(&mut eligible);
        validate_introductions(class, &eligible)?;
        Ok(eligible.into())
    }
}

/// Candidates applying to at least one method of `class`, in candidate
/// order.
pub fn find_eligible(candidates: &[Arc<Rule>], class: &TargetClass) -> Vec<Arc<Rule>> {
    candidates
        .iter()
        .filter(|rule| can_apply(rule, class))
        .cloned()
        .collect()
}

fn can_apply(rule: &Rule, class: &TargetClass) -> bool {
    let pointcut = rule.pointcut();
    if !pointcut.matches_class(class) {
        return false;
    }
    if let Some(intro) = rule.introduction() {
        // already implemented; the class serves the capability itself
        return !class.implements(intro.capability().name());
    }
    if !pointcut.is_candidate_class(class) {
        return false;
    }
    class
        .methods()
        .iter()
        .any(|m| pointcut.matches_method(m, class))
}

/// Introductions must be well formed and must not compete with each other
/// or with the class for a method signature.
pub fn validate_introductions(class: &TargetClass, rules: &[Arc<Rule>]) -> Result<()> {
    let mut capabilities = HashSet::new();
    let mut signatures = HashSet::new();

    for intro in rules.iter().filter_map(|r| r.introduction()) {
        intro.validate()?;

        let capability = intro.capability();
        if !capabilities.insert(capability.name().to_string()) {
            return Err(AopError::ambiguous(format!(
                "{} is introduced into {} more than once",
                capability.name(),
                class.name()
            )));
        }

        for method in capability.methods() {
            if class.find_method(method).is_some() || !signatures.insert(method.signature()) {
                return Err(AopError::ambiguous(format!(
                    "introduced {} conflicts with an existing method of {}",
                    method,
                    class.name()
                )));
            }
        }
    }
    Ok(())
}

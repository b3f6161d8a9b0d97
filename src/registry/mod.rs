//! Rule registry: static rules plus rules expanded from declaring units.
//!
//! The registry hands out immutable snapshots of its eligible candidates.
//! A snapshot is built once per generation and reused until the next
//! registration bumps the generation.

mod aspect;
mod instance;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::RegistrySettings;
use crate::error::{AopError, Result};
use crate::pointcut::any_match;
use crate::rule::Rule;

pub use aspect::{
    registered_aspects, AdviceMethod, Aspect, AspectBuilder, AspectRegistration,
    AspectRuleFactory, DeclareParents, Instantiation, RuleSource,
};
pub use instance::{AspectInstanceFactory, AspectInstances, InstanceMode};

type EligibilityHook = dyn Fn(&str) -> bool + Send + Sync;

#[derive(Default)]
struct State {
    rules: Vec<Arc<Rule>>,
    units: Vec<String>,
    generation: u64,
    snapshot: Option<(u64, Arc<[Arc<Rule>]>)>,
    frozen: bool,
}

/// Holds every rule visible to the resolver.
///
/// # Example
///
/// ```ignore
/// let registry = RuleRegistry::new();
/// registry.register(Rule::builder("audit", audit_advice).order(5).build()?)?;
/// registry.register_aspect(cache_aspect())?;
/// let candidates = registry.find_candidate_rules()?;
/// ```
pub struct RuleRegistry {
    source: Arc<dyn RuleSource>,
    settings: RegistrySettings,
    eligibility: Option<Box<EligibilityHook>>,
    state: RwLock<State>,
    next_registration: AtomicU64,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::with_settings(RegistrySettings::default())
    }

    pub fn with_settings(settings: RegistrySettings) -> Self {
        Self {
            source: Arc::new(AspectRuleFactory),
            settings,
            eligibility: None,
            state: RwLock::new(State::default()),
            next_registration: AtomicU64::new(1),
        }
    }

    /// Replace the source that expands declaring units.
    pub fn with_source(mut self, source: Arc<dyn RuleSource>) -> Self {
        self.source = source;
        self
    }

    /// Override the eligibility check. Receives the rule's declaring-unit
    /// name, or the rule name for static rules.
    pub fn with_eligibility<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.eligibility = Some(Box::new(hook));
        self
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Register a static rule.
    pub fn register(&self, rule: Rule) -> Result<Arc<Rule>> {
        let mut state = self.state.write();
        Self::ensure_open(&state)?;

        let rule = Arc::new(rule.with_registration(self.next_seq()));
        info!(rule = %rule, kind = %rule.kind(), order = ?rule.order(), "Registered rule");
        state.rules.push(rule.clone());
        state.generation += 1;
        Ok(rule)
    }

    /// Expand and register a declaring unit. Returns the number of rules it
    /// contributed.
    pub fn register_aspect(&self, aspect: Aspect) -> Result<usize> {
        // expansion may fail; do it before touching shared state
        let rules = self.source.discover_rules(&aspect)?;

        let mut state = self.state.write();
        Self::ensure_open(&state)?;
        if state.units.iter().any(|u| u == aspect.name()) {
            return Err(AopError::configuration(format!(
                "declaring unit {} is already registered",
                aspect.name()
            )));
        }

        let registration = self.next_seq();
        let count = rules.len();
        state.rules.extend(
            rules
                .into_iter()
                .map(|r| Arc::new(r.with_registration(registration))),
        );
        state.units.push(aspect.name().to_string());
        state.generation += 1;

        info!(
            unit = %aspect.name(),
            rules = count,
            instantiation = ?aspect.instantiation(),
            "Registered declaring unit"
        );
        Ok(count)
    }

    /// Register every unit submitted with `inventory::submit!`.
    pub fn load_registered(&self) -> Result<usize> {
        let registrations: Vec<_> = registered_aspects().collect();
        info!(count = registrations.len(), "Loading submitted declaring units");

        let mut total = 0;
        for registration in registrations {
            debug!(unit = registration.name(), "Loading declaring unit");
            total += self.register_aspect(registration.build())?;
        }
        Ok(total)
    }

    /// Snapshot of every eligible candidate rule, in registration order.
    pub fn find_candidate_rules(&self) -> Result<Arc<[Arc<Rule>]>> {
        {
            let state = self.state.read();
            if let Some((generation, snapshot)) = &state.snapshot {
                if *generation == state.generation {
                    return Ok(snapshot.clone());
                }
            }
        }

        let mut state = self.state.write();
        if let Some((generation, snapshot)) = &state.snapshot {
            if *generation == state.generation {
                return Ok(snapshot.clone());
            }
        }

        let snapshot: Arc<[Arc<Rule>]> = state
            .rules
            .iter()
            .filter(|r| self.is_eligible(r.eligibility_name()))
            .cloned()
            .collect();
        debug!(
            generation = state.generation,
            candidates = snapshot.len(),
            total = state.rules.len(),
            "Built candidate snapshot"
        );
        state.snapshot = Some((state.generation, snapshot.clone()));
        Ok(snapshot)
    }

    /// Whether rules declared under `name` take part in resolution.
    ///
    /// Default: true, or when include patterns are configured, `name` must
    /// match one of them.
    pub fn is_eligible(&self, name: &str) -> bool {
        if let Some(hook) = &self.eligibility {
            return hook(name);
        }
        let patterns = &self.settings.include_patterns;
        patterns.is_empty() || any_match(patterns, name)
    }

    /// Changes whenever the rule set changes.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Reject further registrations.
    pub fn freeze(&self) {
        self.state.write().frozen = true;
        info!("Rule registry frozen");
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub fn len(&self) -> usize {
        self.state.read().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_seq(&self) -> u64 {
        self.next_registration.fetch_add(1, Ordering::Relaxed)
    }

    fn ensure_open(state: &State) -> Result<()> {
        if state.frozen {
            return Err(AopError::configuration(
                "rule registry is frozen; no further rules may be registered",
            ));
        }
        Ok(())
    }
}

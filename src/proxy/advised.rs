//! Mutable-until-frozen configuration behind a proxy.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::advice::IntroducedImpl;
use crate::config::ProxySettings;
use crate::error::{AopError, Result};
use crate::resolver::{chain_for, validate_introductions, ChainLink};
use crate::rule::Rule;
use crate::target::{Capability, Method, TargetClass, TargetSource};

/// An introduced capability bound to this proxy's delegate.
#[derive(Clone)]
pub struct BoundIntroduction {
    capability: Arc<Capability>,
    implementation: IntroducedImpl,
}

impl BoundIntroduction {
    pub fn capability(&self) -> &Arc<Capability> {
        &self.capability
    }

    pub fn implementation(&self) -> &IntroducedImpl {
        &self.implementation
    }
}

struct State {
    rules: Vec<Arc<Rule>>,
    introductions: Vec<BoundIntroduction>,
    generation: u64,
    frozen: bool,
}

/// Rules, introductions, and target source of one proxy.
///
/// Per-method chains are computed on first call and cached until the rule
/// list changes.
pub struct ProxyConfig {
    source: Arc<dyn TargetSource>,
    class: Arc<TargetClass>,
    settings: ProxySettings,
    state: RwLock<State>,
    chains: DashMap<String, (u64, Arc<[ChainLink]>)>,
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("class", &self.class)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ProxyConfig {
    pub(crate) fn new(
        source: Arc<dyn TargetSource>,
        settings: ProxySettings,
        rules: Vec<Arc<Rule>>,
    ) -> Result<Self> {
        let class = source.target_class().clone();
        let introductions = bind_introductions(&class, &rules)?;
        Ok(Self {
            source,
            class,
            state: RwLock::new(State {
                rules,
                introductions,
                generation: 0,
                frozen: settings.frozen,
            }),
            settings,
            chains: DashMap::new(),
        })
    }

    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.source
    }

    pub fn class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Current rules, in chain order.
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.state.read().rules.clone()
    }

    pub fn introductions(&self) -> Vec<BoundIntroduction> {
        self.state.read().introductions.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    /// Reject any further change to the rule list.
    pub fn freeze(&self) {
        self.state.write().frozen = true;
    }

    /// Append a rule. Fails with `Configuration` once frozen.
    pub fn add_rule(&self, rule: Arc<Rule>) -> Result<()> {
        let mut state = self.state.write();
        ensure_open(&state)?;

        let mut rules = state.rules.clone();
        rules.push(rule.clone());
        validate_introductions(&self.class, &rules)?;

        // Delegates already bound keep their state; only the new one binds.
        if let Some(intro) = rule.introduction() {
            let bound = BoundIntroduction {
                capability: intro.capability().clone(),
                implementation: intro.bind()?,
            };
            state.introductions.push(bound);
        }
        state.rules = rules;
        state.generation += 1;
        self.chains.clear();
        debug!(class = %self.class.name(), rule = %rule, "Added rule to proxy");
        Ok(())
    }

    /// Remove the rule named `name`. Returns whether one was removed.
    pub fn remove_rule(&self, name: &str) -> Result<bool> {
        let mut state = self.state.write();
        ensure_open(&state)?;

        let Some(position) = state.rules.iter().position(|r| r.name() == name) else {
            return Ok(false);
        };
        let removed = state.rules.remove(position);
        if let Some(intro) = removed.introduction() {
            let capability = intro.capability().name();
            state
                .introductions
                .retain(|b| b.capability.name() != capability);
        }
        state.generation += 1;
        self.chains.clear();
        debug!(class = %self.class.name(), rule = %removed, "Removed rule from proxy");
        Ok(true)
    }

    /// Whether the proxy exposes `capability`, natively or by introduction.
    pub fn implements(&self, capability: &str) -> bool {
        self.class.implements(capability)
            || self
                .state
                .read()
                .introductions
                .iter()
                .any(|b| b.capability.name() == capability)
    }

    /// Cached chain for `method`.
    pub(crate) fn chain_for(&self, method: &Method) -> Arc<[ChainLink]> {
        let key = method.signature();
        let state = self.state.read();
        if let Some(entry) = self.chains.get(&key) {
            if entry.0 == state.generation {
                return entry.1.clone();
            }
        }

        let chain = chain_for(&state.rules, method, &self.class);
        debug!(
            class = %self.class.name(),
            method = %method,
            links = chain.len(),
            "Built method chain"
        );
        self.chains.insert(key, (state.generation, chain.clone()));
        chain
    }

    /// Delegate serving `method` when it belongs to an introduced capability.
    pub(crate) fn introduction_for(&self, method: &Method) -> Option<IntroducedImpl> {
        self.state
            .read()
            .introductions
            .iter()
            .find(|b| b.capability.declares(method))
            .map(|b| b.implementation.clone())
    }

    /// Introduced methods named `name`.
    pub(crate) fn introduced_method_named(&self, name: &str) -> Vec<Method> {
        self.state
            .read()
            .introductions
            .iter()
            .flat_map(|b| b.capability.methods().iter())
            .filter(|m| m.name() == name)
            .cloned()
            .collect()
    }
}

fn ensure_open(state: &State) -> Result<()> {
    if state.frozen {
        return Err(AopError::configuration(
            "proxy configuration is frozen; rules cannot be changed",
        ));
    }
    Ok(())
}

fn bind_introductions(
    class: &TargetClass,
    rules: &[Arc<Rule>],
) -> Result<Vec<BoundIntroduction>> {
    validate_introductions(class, rules)?;
    rules
        .iter()
        .filter_map(|r| r.introduction())
        .map(|intro| {
            Ok(BoundIntroduction {
                capability: intro.capability().clone(),
                implementation: intro.bind()?,
            })
        })
        .collect()
}

//! Automatic proxying of targets as they are created.
//!
//! [`AutoProxyCreator`] decides per target whether it needs a proxy, and
//! makes sure each live target has at most one. Per-target state moves from
//! uncreated to either proxied or pass-through:
//!
//! - infrastructure classes and skipped targets pass through permanently
//! - a non-empty resolution creates one proxy; concurrent first calls may
//!   build two, only the first published is ever returned
//! - an empty resolution is negatively cached per (class, bean key) until
//!   the rule set changes
//!
//! The creator holds no strong reference to proxies or targets. Entries
//! whose proxy or target has been dropped are pruned as the table grows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::{method_named, ProxyFactory, ProxyHandle, WeakProxy};
use crate::config::ProxySettings;
use crate::error::{InvocationResult, Result};
use crate::resolver::ChainResolver;
use crate::rule::Rule;
use crate::target::{Arguments, ClassId, Method, Target, TargetClass, TargetId, Value};

type SkipPredicate = dyn Fn(&TargetClass, &str) -> bool + Send + Sync;

/// Table size below which dead entries are left in place.
const PRUNE_FLOOR: usize = 64;

/// Result of [`AutoProxyCreator::wrap_if_necessary`].
#[derive(Clone)]
pub enum Wrapped {
    Proxy(ProxyHandle),
    Raw(Arc<dyn Target>),
}

impl Wrapped {
    pub fn is_proxy(&self) -> bool {
        matches!(self, Wrapped::Proxy(_))
    }

    pub fn as_proxy(&self) -> Option<&ProxyHandle> {
        match self {
            Wrapped::Proxy(proxy) => Some(proxy),
            Wrapped::Raw(_) => None,
        }
    }

    pub fn into_proxy(self) -> Option<ProxyHandle> {
        match self {
            Wrapped::Proxy(proxy) => Some(proxy),
            Wrapped::Raw(_) => None,
        }
    }

    pub fn call(&self, method: &Method, args: Arguments) -> InvocationResult<Value> {
        match self {
            Wrapped::Proxy(proxy) => proxy.call(method, args),
            Wrapped::Raw(target) => target.invoke(method, &args),
        }
    }

    pub fn call_by_name(&self, name: &str, args: Arguments) -> InvocationResult<Value> {
        match self {
            Wrapped::Proxy(proxy) => proxy.call_by_name(name, args),
            Wrapped::Raw(target) => {
                let method = method_named(target.class(), name, Vec::new())?;
                target.invoke(&method, &args)
            }
        }
    }
}

enum ProxyState {
    // a live proxy keeps its target, and so the TargetId, alive
    Proxied(WeakProxy),
    // weak reference pins the address behind the TargetId
    PassThrough(Weak<dyn Target>),
}

impl ProxyState {
    fn is_live(&self) -> bool {
        match self {
            ProxyState::Proxied(proxy) => proxy.is_live(),
            ProxyState::PassThrough(target) => target.strong_count() > 0,
        }
    }

    /// What a settled entry answers for `target`, if it is still live.
    fn settled(&self, target: &Arc<dyn Target>) -> Option<Wrapped> {
        match self {
            ProxyState::Proxied(proxy) => proxy.upgrade().map(Wrapped::Proxy),
            ProxyState::PassThrough(_) => Some(Wrapped::Raw(target.clone())),
        }
    }
}

struct NoRules {
    generation: u64,
    // pins the address behind the ClassId
    _class: Weak<TargetClass>,
}

/// Wraps targets in proxies when any registered rule applies to them.
pub struct AutoProxyCreator {
    resolver: Arc<ChainResolver>,
    settings: ProxySettings,
    states: DashMap<TargetId, ProxyState>,
    prune_at: AtomicUsize,
    negative: DashMap<(ClassId, String), NoRules>,
    skip: Option<Box<SkipPredicate>>,
}

impl AutoProxyCreator {
    pub fn new(resolver: Arc<ChainResolver>) -> Self {
        Self::with_settings(resolver, ProxySettings::default())
    }

    pub fn with_settings(resolver: Arc<ChainResolver>, settings: ProxySettings) -> Self {
        Self {
            resolver,
            settings,
            states: DashMap::new(),
            prune_at: AtomicUsize::new(PRUNE_FLOOR),
            negative: DashMap::new(),
            skip: None,
        }
    }

    /// Never proxy targets for which `predicate(class, bean_key)` holds.
    pub fn with_skip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TargetClass, &str) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Box::new(predicate));
        self
    }

    pub fn resolver(&self) -> &Arc<ChainResolver> {
        &self.resolver
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// The proxy for `target`, or `target` itself when nothing applies.
    pub fn wrap_if_necessary(&self, target: Arc<dyn Target>, bean_key: &str) -> Result<Wrapped> {
        let id = TargetId::of(&target);
        let settled = self.states.get(&id).and_then(|state| state.settled(&target));
        if let Some(wrapped) = settled {
            return Ok(wrapped);
        }

        let class = target.class().clone();
        if class.is_infrastructure() || self.should_skip(&class, bean_key) {
            debug!(class = %class.name(), bean_key, "Target passes through unproxied");
            self.prune();
            self.states
                .insert(id, ProxyState::PassThrough(Arc::downgrade(&target)));
            return Ok(Wrapped::Raw(target));
        }

        let generation = self.resolver.registry().generation();
        let negative_key = (ClassId::of(&class), bean_key.to_string());
        if self
            .negative
            .get(&negative_key)
            .is_some_and(|cached| cached.generation == generation)
        {
            trace!(class = %class.name(), bean_key, "No rules apply (cached)");
            return Ok(Wrapped::Raw(target));
        }

        let rules = self.get_eligible_rules(&class, bean_key)?;
        if rules.is_empty() {
            trace!(class = %class.name(), bean_key, "No rules apply");
            self.negative.insert(
                negative_key,
                NoRules {
                    generation,
                    _class: Arc::downgrade(&class),
                },
            );
            return Ok(Wrapped::Raw(target));
        }

        let proxy = self.create_proxy(target.clone(), rules.to_vec())?;
        Ok(self.publish(id, target, proxy))
    }

    /// Build a proxy for `target` with the given, already ordered, rules.
    pub fn create_proxy(
        &self,
        target: Arc<dyn Target>,
        rules: Vec<Arc<Rule>>,
    ) -> Result<ProxyHandle> {
        ProxyFactory::new(target)
            .settings(self.settings.clone())
            .rules(rules)
            .build()
    }

    /// Ordered rules that would apply to `class`.
    pub fn get_eligible_rules(
        &self,
        class: &Arc<TargetClass>,
        bean_key: &str,
    ) -> Result<Arc<[Arc<Rule>]>> {
        self.resolver.resolve(class, bean_key)
    }

    /// Number of targets with a live settled state.
    pub fn tracked(&self) -> usize {
        self.states.iter().filter(|entry| entry.value().is_live()).count()
    }

    /// First live proxy published for `id` wins; a dead one is replaced.
    fn publish(&self, id: TargetId, target: Arc<dyn Target>, proxy: ProxyHandle) -> Wrapped {
        self.prune();
        match self.states.entry(id) {
            Entry::Occupied(mut entry) => {
                if let Some(existing) = entry.get().settled(&target) {
                    return existing;
                }
                entry.insert(ProxyState::Proxied(proxy.downgrade()));
            }
            Entry::Vacant(entry) => {
                entry.insert(ProxyState::Proxied(proxy.downgrade()));
            }
        }
        Wrapped::Proxy(proxy)
    }

    /// Drop dead entries once the table reaches its high-water mark.
    fn prune(&self) {
        if self.states.len() < self.prune_at.load(Ordering::Relaxed) {
            return;
        }
        let before = self.states.len();
        self.states.retain(|_, state| state.is_live());
        let live = self.states.len();
        self.prune_at
            .store((live * 2).max(PRUNE_FLOOR), Ordering::Relaxed);
        trace!(before, live, "Pruned settled target states");
    }

    fn should_skip(&self, class: &TargetClass, bean_key: &str) -> bool {
        self.skip.as_ref().is_some_and(|skip| skip(class, bean_key))
    }
}

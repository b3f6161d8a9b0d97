//! Instances of declaring units, created according to their lifecycle.
//!
//! Per-target instances are held only while their target is alive; entries
//! for dropped targets are evicted as the table grows.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::target::{Target, TargetId};

/// Table size below which dead per-target entries are left in place.
const EVICT_FLOOR: usize = 64;

/// Lifecycle of a declaring unit's instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceMode {
    /// Created when the unit is built.
    Eager,
    /// Created on the first qualifying call.
    Lazy,
    /// One instance per target, created on the target's first qualifying call.
    PerTarget,
}

/// Type-erased view of a unit's instances, used by the synthetic touch rule.
pub trait AspectInstanceFactory: Send + Sync {
    fn mode(&self) -> InstanceMode;

    /// Make sure the instance serving `target` exists.
    fn touch(&self, target: &Arc<dyn Target>);

    /// Whether the instance serving `target` exists.
    fn is_instantiated(&self, target: &Arc<dyn Target>) -> bool;

    /// Number of live instances.
    fn instance_count(&self) -> usize;
}

type Factory<A> = Box<dyn Fn() -> A + Send + Sync>;

struct Bound<A> {
    // pins the address behind the TargetId while the entry exists
    target: Weak<dyn Target>,
    instance: Arc<A>,
}

impl<A> Bound<A> {
    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// Typed instances of one declaring unit.
pub struct AspectInstances<A> {
    unit: String,
    mode: InstanceMode,
    factory: Factory<A>,
    shared: OnceLock<Arc<A>>,
    per_target: DashMap<TargetId, Bound<A>>,
    evict_at: AtomicUsize,
}

impl<A: Send + Sync + 'static> AspectInstances<A> {
    pub fn new<F>(unit: impl Into<String>, mode: InstanceMode, factory: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        let instances = Self {
            unit: unit.into(),
            mode,
            factory: Box::new(factory),
            shared: OnceLock::new(),
            per_target: DashMap::new(),
            evict_at: AtomicUsize::new(EVICT_FLOOR),
        };
        if mode == InstanceMode::Eager {
            instances.shared.get_or_init(|| Arc::new((instances.factory)()));
        }
        instances
    }

    /// The instance serving `target`, creating it if needed.
    pub fn get(&self, target: &Arc<dyn Target>) -> Arc<A> {
        match self.mode {
            InstanceMode::PerTarget => self.for_target(target),
            InstanceMode::Eager | InstanceMode::Lazy => self
                .shared
                .get_or_init(|| {
                    debug!(unit = %self.unit, "Instantiated unit");
                    Arc::new((self.factory)())
                })
                .clone(),
        }
    }

    fn for_target(&self, target: &Arc<dyn Target>) -> Arc<A> {
        let id = TargetId::of(target);
        if let Some(bound) = self.per_target.get(&id) {
            return bound.instance.clone();
        }

        self.evict_dead();
        self.per_target
            .entry(id)
            .or_insert_with(|| {
                debug!(unit = %self.unit, target = %id, "Instantiated per-target unit");
                Bound {
                    target: Arc::downgrade(target),
                    instance: Arc::new((self.factory)()),
                }
            })
            .instance
            .clone()
    }

    /// Drop instances of dropped targets once the table reaches its
    /// high-water mark.
    fn evict_dead(&self) {
        if self.per_target.len() < self.evict_at.load(Ordering::Relaxed) {
            return;
        }
        let before = self.per_target.len();
        self.per_target.retain(|_, bound| bound.is_live());
        let live = self.per_target.len();
        self.evict_at
            .store((live * 2).max(EVICT_FLOOR), Ordering::Relaxed);
        trace!(unit = %self.unit, before, live, "Evicted per-target instances");
    }
}

impl<A: Send + Sync + 'static> AspectInstanceFactory for AspectInstances<A> {
    fn mode(&self) -> InstanceMode {
        self.mode
    }

    fn touch(&self, target: &Arc<dyn Target>) {
        let _ = self.get(target);
    }

    fn is_instantiated(&self, target: &Arc<dyn Target>) -> bool {
        match self.mode {
            InstanceMode::PerTarget => self.per_target.contains_key(&TargetId::of(target)),
            InstanceMode::Eager | InstanceMode::Lazy => self.shared.get().is_some(),
        }
    }

    fn instance_count(&self) -> usize {
        match self.mode {
            InstanceMode::PerTarget => self
                .per_target
                .iter()
                .filter(|entry| entry.value().is_live())
                .count(),
            InstanceMode::Eager | InstanceMode::Lazy => usize::from(self.shared.get().is_some()),
        }
    }
}

//! Declaring units: one registered object expanding into several rules.
//!
//! An [`Aspect`] groups advice methods that share an instance, an order,
//! and a lifecycle. [`AspectRuleFactory`] turns it into rules in a fixed
//! declaration order; lazily instantiated units also get a synthetic touch
//! rule at position 0.
//!
//! # Example
//!
//! ```ignore
//! let aspect = Aspect::builder("CacheAspect", CacheAspect::default)
//!     .order(1)
//!     .around("cacheGet", Pointcut::for_methods(NameMatch::new(["get"])), |cache, inv| {
//!         cache.lookup_or_proceed(inv)
//!     })
//!     .build();
//! registry.register_aspect(aspect)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::advice::{Advice, AdviceKind, Introduction};
use crate::error::{AopError, InvocationError, InvocationResult, Result};
use crate::invocation::Invocation;
use crate::pointcut::{ClassFilter, Pointcut, TrueFilter};
use crate::rule::Rule;
use crate::target::Value;

use super::instance::{AspectInstanceFactory, AspectInstances, InstanceMode};

/// Expands declaring units into rules.
pub trait RuleSource: Send + Sync {
    /// Rules for `aspect`, in declaration order.
    fn discover_rules(&self, aspect: &Aspect) -> Result<Vec<Rule>>;
}

/// How a unit's instance is created.
#[derive(Clone)]
pub enum Instantiation {
    /// One instance, created with the unit.
    Singleton,
    /// One instance, created on the first call matching the pointcut.
    Lazy(Pointcut),
    /// One instance per target, created on that target's first call
    /// matching the pointcut.
    PerTarget(Pointcut),
}

impl Instantiation {
    pub fn is_lazy(&self) -> bool {
        !matches!(self, Instantiation::Singleton)
    }

    /// Pointcut gating instantiation, for lazy units.
    pub fn pointcut(&self) -> Option<&Pointcut> {
        match self {
            Instantiation::Singleton => None,
            Instantiation::Lazy(p) | Instantiation::PerTarget(p) => Some(p),
        }
    }

    fn mode(&self) -> InstanceMode {
        match self {
            Instantiation::Singleton => InstanceMode::Eager,
            Instantiation::Lazy(_) => InstanceMode::Lazy,
            Instantiation::PerTarget(_) => InstanceMode::PerTarget,
        }
    }
}

impl fmt::Debug for Instantiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instantiation::Singleton => f.write_str("Singleton"),
            Instantiation::Lazy(_) => f.write_str("Lazy"),
            Instantiation::PerTarget(_) => f.write_str("PerTarget"),
        }
    }
}

/// One advice method of a unit, already bound to the unit's instances.
#[derive(Clone, Debug)]
pub struct AdviceMethod {
    name: String,
    pointcut: Pointcut,
    advice: Advice,
}

impl AdviceMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AdviceKind {
        self.advice.kind()
    }

    pub fn pointcut(&self) -> &Pointcut {
        &self.pointcut
    }

    pub fn advice(&self) -> &Advice {
        &self.advice
    }
}

/// A capability the unit introduces into matching classes.
#[derive(Clone)]
pub struct DeclareParents {
    name: String,
    types: Arc<dyn ClassFilter>,
    introduction: Introduction,
}

impl DeclareParents {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn introduction(&self) -> &Introduction {
        &self.introduction
    }
}

/// A registered declaring unit.
pub struct Aspect {
    name: String,
    order: Option<i32>,
    instantiation: Instantiation,
    instances: Arc<dyn AspectInstanceFactory>,
    methods: Vec<AdviceMethod>,
    parents: Vec<DeclareParents>,
}

impl Aspect {
    /// Start a unit whose instances are produced by `factory`.
    pub fn builder<A, F>(name: impl Into<String>, factory: F) -> AspectBuilder<A>
    where
        A: Send + Sync + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        AspectBuilder {
            name: name.into(),
            order: None,
            instantiation: Instantiation::Singleton,
            factory: Box::new(factory),
            methods: Vec::new(),
            parents: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn instantiation(&self) -> &Instantiation {
        &self.instantiation
    }

    pub fn instances(&self) -> &Arc<dyn AspectInstanceFactory> {
        &self.instances
    }

    pub fn methods(&self) -> &[AdviceMethod] {
        &self.methods
    }

    pub fn declared_parents(&self) -> &[DeclareParents] {
        &self.parents
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("instantiation", &self.instantiation)
            .field("methods", &self.methods.len())
            .field("parents", &self.parents.len())
            .finish()
    }
}

type Binder<A> = Box<dyn FnOnce(Arc<AspectInstances<A>>) -> Advice + Send>;

struct PendingMethod<A> {
    name: String,
    pointcut: Pointcut,
    bind: Binder<A>,
}

/// Builder for [`Aspect`]. Advice closures receive the unit instance
/// serving the call.
pub struct AspectBuilder<A> {
    name: String,
    order: Option<i32>,
    instantiation: Instantiation,
    factory: Box<dyn Fn() -> A + Send + Sync>,
    methods: Vec<PendingMethod<A>>,
    parents: Vec<DeclareParents>,
}

impl<A: Send + Sync + 'static> AspectBuilder<A> {
    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn instantiation(mut self, instantiation: Instantiation) -> Self {
        self.instantiation = instantiation;
        self
    }

    pub fn around<F>(self, name: impl Into<String>, pointcut: Pointcut, f: F) -> Self
    where
        F: Fn(&A, &mut Invocation<'_>) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        self.method(name, pointcut, move |instances| {
            Advice::around_fn(move |inv| {
                let aspect = instances.get(inv.target());
                f(aspect.as_ref(), inv)
            })
        })
    }

    pub fn before<F>(self, name: impl Into<String>, pointcut: Pointcut, f: F) -> Self
    where
        F: Fn(&A, &mut Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.method(name, pointcut, move |instances| {
            Advice::before(move |inv| {
                let aspect = instances.get(inv.target());
                f(aspect.as_ref(), inv)
            })
        })
    }

    pub fn after<F>(self, name: impl Into<String>, pointcut: Pointcut, f: F) -> Self
    where
        F: Fn(&A, &Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.method(name, pointcut, move |instances| {
            Advice::after(move |inv| {
                let aspect = instances.get(inv.target());
                f(aspect.as_ref(), inv)
            })
        })
    }

    pub fn after_returning<F>(self, name: impl Into<String>, pointcut: Pointcut, f: F) -> Self
    where
        F: Fn(&A, &Value, &Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        self.method(name, pointcut, move |instances| {
            Advice::after_returning(move |value, inv| {
                let aspect = instances.get(inv.target());
                f(aspect.as_ref(), value, inv)
            })
        })
    }

    pub fn after_throwing<F>(self, name: impl Into<String>, pointcut: Pointcut, f: F) -> Self
    where
        F: Fn(&A, &InvocationError, &Invocation<'_>) -> Option<InvocationError>
            + Send
            + Sync
            + 'static,
    {
        self.method(name, pointcut, move |instances| {
            Advice::after_throwing(move |error, inv| {
                let aspect = instances.get(inv.target());
                f(aspect.as_ref(), error, inv)
            })
        })
    }

    /// Introduce a capability into every class passing `types`.
    pub fn declare_parents(
        mut self,
        name: impl Into<String>,
        types: impl ClassFilter + 'static,
        introduction: Introduction,
    ) -> Self {
        self.parents.push(DeclareParents {
            name: name.into(),
            types: Arc::new(types),
            introduction,
        });
        self
    }

    fn method<B>(mut self, name: impl Into<String>, pointcut: Pointcut, bind: B) -> Self
    where
        B: FnOnce(Arc<AspectInstances<A>>) -> Advice + Send + 'static,
    {
        self.methods.push(PendingMethod {
            name: name.into(),
            pointcut,
            bind: Box::new(bind),
        });
        self
    }

    pub fn build(self) -> Aspect {
        let instances = Arc::new(AspectInstances::new(
            self.name.clone(),
            self.instantiation.mode(),
            self.factory,
        ));
        let methods = self
            .methods
            .into_iter()
            .map(|m| AdviceMethod {
                name: m.name,
                pointcut: m.pointcut,
                advice: (m.bind)(instances.clone()),
            })
            .collect();

        Aspect {
            name: self.name,
            order: self.order,
            instantiation: self.instantiation,
            instances,
            methods,
            parents: self.parents,
        }
    }
}

/// Default [`RuleSource`].
///
/// Rule order within a unit: the touch rule (lazy units only), then advice
/// methods by kind priority (Around, Before, After, AfterReturning,
/// AfterThrowing) and name, then introductions.
#[derive(Clone, Copy, Debug, Default)]
pub struct AspectRuleFactory;

impl AspectRuleFactory {
    /// Suffix of the synthetic touch rule's name.
    pub const TOUCH_SUFFIX: &'static str = "$touch";
}

impl RuleSource for AspectRuleFactory {
    fn discover_rules(&self, aspect: &Aspect) -> Result<Vec<Rule>> {
        let mut seen = HashSet::new();
        for m in aspect.methods() {
            if !seen.insert(m.name()) {
                return Err(AopError::ambiguous(format!(
                    "{} declares more than one advice method named {}",
                    aspect.name(),
                    m.name()
                )));
            }
        }

        let mut methods: Vec<&AdviceMethod> = aspect.methods().iter().collect();
        methods.sort_by(|a, b| {
            (a.kind().priority(), a.name()).cmp(&(b.kind().priority(), b.name()))
        });

        let gate = aspect.instantiation().pointcut();
        let mut rules = Vec::with_capacity(methods.len() + aspect.declared_parents().len() + 1);

        if let Some(gate) = gate {
            let instances = aspect.instances().clone();
            let touch = Advice::before(move |inv| {
                instances.touch(inv.target());
                Ok(())
            });
            rules.push(
                Rule::builder(format!("{}{}", aspect.name(), Self::TOUCH_SUFFIX), touch)
                    .pointcut(gate.clone())
                    .maybe_order(aspect.order())
                    .declared_by(aspect.name(), 0)
                    .build()?,
            );
        }

        for m in methods {
            let pointcut = match gate {
                Some(gate) => m.pointcut().clone().and(gate.clone()),
                None => m.pointcut().clone(),
            };
            let index = rules.len();
            rules.push(
                Rule::builder(m.name(), m.advice().clone())
                    .pointcut(pointcut)
                    .maybe_order(aspect.order())
                    .declared_by(aspect.name(), index)
                    .build()?,
            );
        }

        for parent in aspect.declared_parents() {
            let index = rules.len();
            rules.push(
                Rule::builder(parent.name(), Advice::introduction(parent.introduction.clone()))
                    .pointcut(Pointcut::from_parts(parent.types.clone(), Arc::new(TrueFilter)))
                    .maybe_order(aspect.order())
                    .declared_by(aspect.name(), index)
                    .build()?,
            );
        }

        Ok(rules)
    }
}

/// A unit submitted for discovery with `inventory::submit!`.
///
/// ```ignore
/// inventory::submit! {
///     AspectRegistration::new("AuditAspect", audit_aspect)
/// }
/// ```
pub struct AspectRegistration {
    name: &'static str,
    build: fn() -> Aspect,
}

impl AspectRegistration {
    pub const fn new(name: &'static str, build: fn() -> Aspect) -> Self {
        Self { name, build }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn build(&self) -> Aspect {
        (self.build)()
    }
}

inventory::collect!(AspectRegistration);

/// Every unit submitted with `inventory::submit!`.
pub fn registered_aspects() -> impl Iterator<Item = &'static AspectRegistration> {
    inventory::iter::<AspectRegistration>.into_iter()
}

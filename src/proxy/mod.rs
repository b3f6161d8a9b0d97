//! Proxies and their construction.
//!
//! A [`ProxyHandle`] stands in for a target. Each call is routed to an
//! introduced delegate, straight to the target, or through the method's
//! interception chain, depending on the proxy's [`Strategy`] and rules.
//!
//! # Example
//!
//! ```ignore
//! let proxy = ProxyFactory::new(Arc::new(repo))
//!     .advice(Advice::before(|inv| {
//!         tracing::info!(method = %inv.method(), "entering");
//!         Ok(())
//!     }))
//!     .build()?;
//!
//! let order = proxy.call_by_name("get", args!["o-1".to_string()])?;
//! ```

mod advised;
pub mod auto;
mod factory;
mod strategy;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;
use uuid::Uuid;

use crate::error::{AopError, InvocationError, InvocationResult, Result};
use crate::invocation::context::ProxyScope;
use crate::invocation::Invocation;
use crate::target::{unsupported, Arguments, Method, Target, TargetClass, Value};

pub use advised::{BoundIntroduction, ProxyConfig};
pub use auto::{AutoProxyCreator, Wrapped};
pub use factory::ProxyFactory;
pub use strategy::Strategy;

use strategy::Route;

struct ProxyInner {
    id: Uuid,
    strategy: Strategy,
    config: ProxyConfig,
}

/// Non-owning reference to a proxy; does not keep its target alive.
#[derive(Clone)]
pub(crate) struct WeakProxy(Weak<ProxyInner>);

impl WeakProxy {
    pub(crate) fn upgrade(&self) -> Option<ProxyHandle> {
        self.0.upgrade().map(|inner| ProxyHandle { inner })
    }

    pub(crate) fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}

/// A proxy. Clones share the same proxy identity.
#[derive(Clone)]
pub struct ProxyHandle {
    inner: Arc<ProxyInner>,
}

impl ProxyHandle {
    pub(crate) fn new(config: ProxyConfig, strategy: Strategy) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                id: Uuid::new_v4(),
                strategy,
                config,
            }),
        }
    }

    /// Identity of this proxy, distinct from its target's.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn class(&self) -> &Arc<TargetClass> {
        self.inner.config.class()
    }

    pub fn strategy(&self) -> Strategy {
        self.inner.strategy
    }

    /// The proxy's configuration. Opaque proxies refuse.
    pub fn advised(&self) -> Result<&ProxyConfig> {
        if self.inner.config.settings().opaque {
            return Err(AopError::configuration(format!(
                "proxy {} is opaque and does not expose its configuration",
                self.inner.id
            )));
        }
        Ok(&self.inner.config)
    }

    /// Whether the proxy exposes `capability`, natively or by introduction.
    pub fn implements(&self, capability: &str) -> bool {
        self.inner.config.implements(capability)
    }

    /// Typed access to an introduced delegate.
    pub fn introduced<D: Any + Send + Sync>(&self) -> Option<Arc<D>> {
        self.inner
            .config
            .introductions()
            .iter()
            .find_map(|b| b.implementation().downcast::<D>())
    }

    /// Whether both handles refer to the same proxy.
    pub fn same_proxy(&self, other: &ProxyHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakProxy {
        WeakProxy(Arc::downgrade(&self.inner))
    }

    /// Call `method` through the proxy.
    pub fn call(&self, method: &Method, args: Arguments) -> InvocationResult<Value> {
        let config = &self.inner.config;
        let class = config.class();

        if let Some(introduced) = config.introduction_for(method) {
            trace!(proxy.id = %self.inner.id, method = %method, "Routing to introduced delegate");
            return introduced.delegate().invoke(method, &args);
        }

        let Some(resolved) = class.find_method(method) else {
            return Err(unsupported(class, method));
        };

        match self.inner.strategy.route(resolved) {
            Route::Unsupported => Err(unsupported(class, resolved)),
            Route::Direct => {
                trace!(
                    proxy.id = %self.inner.id,
                    method = %resolved,
                    "Forwarding non-overridable method"
                );
                self.with_target(|target| target.invoke(resolved, &args))
            }
            Route::Chain => {
                let _scope = config
                    .settings()
                    .expose_proxy
                    .then(|| ProxyScope::enter(self.clone()));
                let chain = config.chain_for(resolved);
                trace!(
                    proxy.id = %self.inner.id,
                    method = %resolved,
                    links = chain.len(),
                    "Dispatching call"
                );
                self.with_target(|target| {
                    if chain.is_empty() {
                        return target.invoke(resolved, &args);
                    }
                    Invocation::new(target.clone(), class, resolved, args, chain)
                        .with_proxy(self.clone())
                        .proceed()
                })
            }
        }
    }

    /// Call the method named `name`. Fails when the name is overloaded.
    pub fn call_by_name(&self, name: &str, args: Arguments) -> InvocationResult<Value> {
        let introduced = self.inner.config.introduced_method_named(name);
        let method = method_named(self.class(), name, introduced)?;
        self.call(&method, args)
    }

    fn with_target<F>(&self, f: F) -> InvocationResult<Value>
    where
        F: FnOnce(&Arc<dyn Target>) -> InvocationResult<Value>,
    {
        let source = self.inner.config.target_source();
        let target = source.get_target()?;
        let result = f(&target);
        source.release_target(target);
        result
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("id", &self.inner.id)
            .field("class", &self.class().name())
            .field("strategy", &self.inner.strategy)
            .finish()
    }
}

/// Single method named `name` among the class's and `extra` methods.
pub(crate) fn method_named(
    class: &TargetClass,
    name: &str,
    extra: Vec<Method>,
) -> InvocationResult<Method> {
    let mut found: Vec<Method> = class
        .methods()
        .iter()
        .filter(|m| m.name() == name)
        .cloned()
        .chain(extra)
        .collect();

    match found.len() {
        0 => Err(InvocationError::UnsupportedMethod {
            class: class.name().to_string(),
            method: name.to_string(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(InvocationError::AmbiguousMethod {
            class: class.name().to_string(),
            method: name.to_string(),
        }),
    }
}

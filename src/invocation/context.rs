//! Call-scoped context slots.
//!
//! While a call runs through a proxy, the handling proxy (when the proxy was
//! configured with `expose_proxy`) and a snapshot of the join point (when the
//! chain carries the exposure rule) can be read from anywhere on the calling
//! thread. Slots are saved on entry and restored on exit by RAII guards, so
//! nested calls and early returns on error leave the outer value in place.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::advice::{Advice, Interceptor};
use crate::error::{AopError, InvocationResult, Result};
use crate::invocation::Invocation;
use crate::proxy::ProxyHandle;
use crate::rule::Rule;
use crate::target::{Arguments, Method, Target, TargetClass, Value};

thread_local! {
    static CURRENT_PROXY: RefCell<Option<ProxyHandle>> = const { RefCell::new(None) };
    static CURRENT_JOIN_POINT: RefCell<Option<JoinPoint>> = const { RefCell::new(None) };
}

/// The proxy handling the call in progress on this thread.
///
/// Fails with `IllegalState` outside a proxied call or when the proxy does
/// not expose itself.
pub fn current_proxy() -> Result<ProxyHandle> {
    CURRENT_PROXY.with(|slot| slot.borrow().clone()).ok_or_else(|| {
        AopError::IllegalState(
            "no current proxy: enable expose_proxy and call from within a proxied method"
                .to_string(),
        )
    })
}

/// The join point of the call in progress on this thread.
pub fn current_join_point() -> Result<JoinPoint> {
    CURRENT_JOIN_POINT
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| {
            AopError::IllegalState(
                "no join point exposed: the chain does not carry the exposure rule".to_string(),
            )
        })
}

/// Publishes a proxy for the lifetime of the guard.
pub(crate) struct ProxyScope {
    previous: Option<ProxyHandle>,
}

impl ProxyScope {
    pub(crate) fn enter(proxy: ProxyHandle) -> Self {
        let previous = CURRENT_PROXY.with(|slot| slot.replace(Some(proxy)));
        Self { previous }
    }
}

impl Drop for ProxyScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_PROXY.with(|slot| *slot.borrow_mut() = previous);
    }
}

struct JoinPointScope {
    previous: Option<JoinPoint>,
}

impl JoinPointScope {
    fn enter(join_point: JoinPoint) -> Self {
        let previous = CURRENT_JOIN_POINT.with(|slot| slot.replace(Some(join_point)));
        Self { previous }
    }
}

impl Drop for JoinPointScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_JOIN_POINT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Snapshot of a call taken when it entered the exposure rule.
#[derive(Clone)]
pub struct JoinPoint {
    class: Arc<TargetClass>,
    method: Method,
    target: Arc<dyn Target>,
    proxy: Option<ProxyHandle>,
    arguments: Arguments,
}

impl JoinPoint {
    pub(crate) fn new(
        class: Arc<TargetClass>,
        method: Method,
        target: Arc<dyn Target>,
        proxy: Option<ProxyHandle>,
        arguments: Arguments,
    ) -> Self {
        Self {
            class,
            method,
            target,
            proxy,
            arguments,
        }
    }

    pub fn class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn proxy(&self) -> Option<&ProxyHandle> {
        self.proxy.as_ref()
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// Short description, e.g. `Repo.get(String)`.
    pub fn short_string(&self) -> String {
        format!("{}.{}", self.class.name(), self.method.signature())
    }
}

impl fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("class", &self.class.name())
            .field("method", &self.method.signature())
            .field("arguments", &self.arguments.len())
            .finish()
    }
}

/// Interceptor publishing the join point for the rest of the chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExposeJoinPoint;

impl ExposeJoinPoint {
    /// Name of the exposure rule.
    pub const RULE_NAME: &'static str = "exposeJoinPoint";

    /// The shared exposure rule. Ordered ahead of every other rule.
    pub fn rule() -> Arc<Rule> {
        static RULE: LazyLock<Arc<Rule>> = LazyLock::new(|| {
            Arc::new(Rule::infrastructure(
                ExposeJoinPoint::RULE_NAME,
                Advice::around(ExposeJoinPoint),
                i32::MIN,
            ))
        });
        RULE.clone()
    }

    pub fn is_exposure_rule(rule: &Rule) -> bool {
        rule.name() == Self::RULE_NAME && rule.order() == Some(i32::MIN) && !rule.is_declarative()
    }
}

impl Interceptor for ExposeJoinPoint {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        let _scope = JoinPointScope::enter(invocation.join_point());
        invocation.proceed()
    }
}

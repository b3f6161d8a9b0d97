//! A single in-flight proxied call.
//!
//! An [`Invocation`] lives on the caller's stack for exactly one call. Each
//! interceptor receives it and calls [`Invocation::proceed`] to pass control
//! to the next link; after the last link the target method runs with the
//! (possibly rewritten) arguments. Not calling `proceed` short-circuits the
//! call, calling it again repeats everything downstream.

pub mod context;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::error::InvocationResult;
use crate::proxy::ProxyHandle;
use crate::resolver::ChainLink;
use crate::target::{Arguments, Method, Target, TargetClass, Value};

pub use context::{current_join_point, current_proxy, ExposeJoinPoint, JoinPoint};

pub struct Invocation<'a> {
    proxy: Option<ProxyHandle>,
    target: Arc<dyn Target>,
    class: &'a Arc<TargetClass>,
    method: &'a Method,
    arguments: Arguments,
    chain: Arc<[ChainLink]>,
    cursor: usize,
    attributes: HashMap<String, Value>,
}

impl<'a> Invocation<'a> {
    pub fn new(
        target: Arc<dyn Target>,
        class: &'a Arc<TargetClass>,
        method: &'a Method,
        arguments: Arguments,
        chain: Arc<[ChainLink]>,
    ) -> Self {
        Self {
            proxy: None,
            target,
            class,
            method,
            arguments,
            chain,
            cursor: 0,
            attributes: HashMap::new(),
        }
    }

    pub(crate) fn with_proxy(mut self, proxy: ProxyHandle) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Run the next link of the chain, or the target method once the chain
    /// is exhausted.
    ///
    /// Links whose runtime matcher rejects the current arguments are
    /// skipped. The cursor is restored when the link returns.
    pub fn proceed(&mut self) -> InvocationResult<Value> {
        let chain = Arc::clone(&self.chain);
        let entry = self.cursor;
        let mut index = entry;

        while let Some(link) = chain.get(index) {
            index += 1;
            if link.is_dynamic() && !link.matches_args(self.method, self.class, &self.arguments) {
                trace!(rule = %link.rule(), method = %self.method, "runtime match rejected call");
                continue;
            }
            let Some(interceptor) = link.rule().interceptor() else {
                continue;
            };

            self.cursor = index;
            let result = interceptor.invoke(self);
            self.cursor = entry;
            return result;
        }

        trace!(class = %self.class.name(), method = %self.method, "invoking target");
        self.target.invoke(self.method, &self.arguments)
    }

    /// The proxy handling this call, when invoked through one.
    pub fn proxy(&self) -> Option<&ProxyHandle> {
        self.proxy.as_ref()
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn class(&self) -> &Arc<TargetClass> {
        self.class
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    /// Replace argument `index` for the rest of the chain and the target.
    pub fn set_argument(&mut self, index: usize, value: Value) -> InvocationResult<()> {
        self.arguments.set(index, value)
    }

    /// Number of links in the chain.
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    /// Index of the next link `proceed` would consider.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Per-call scratch data shared between behaviors.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    /// Snapshot of the call for exposure outside the chain.
    pub fn join_point(&self) -> JoinPoint {
        JoinPoint::new(
            self.class.clone(),
            self.method.clone(),
            self.target.clone(),
            self.proxy.clone(),
            self.arguments.clone(),
        )
    }
}

//! Introductions: capabilities added to a proxy and served by a delegate.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{AopError, Result};
use crate::target::{Capability, Target, TargetClass};

/// The delegate bound into one proxy for an introduced capability.
#[derive(Clone)]
pub struct IntroducedImpl {
    delegate: Arc<dyn Target>,
    instance: Arc<dyn Any + Send + Sync>,
}

impl IntroducedImpl {
    pub fn new<D: Target>(delegate: Arc<D>) -> Self {
        Self {
            delegate: delegate.clone(),
            instance: delegate,
        }
    }

    /// Dynamic entry point calls are routed to.
    pub fn delegate(&self) -> &Arc<dyn Target> {
        &self.delegate
    }

    /// Typed access to the delegate.
    pub fn downcast<D: Any + Send + Sync>(&self) -> Option<Arc<D>> {
        self.instance.clone().downcast::<D>().ok()
    }
}

type ImplFactory = dyn Fn() -> IntroducedImpl + Send + Sync;

/// Adds `capability` to matching proxies. Calls to its methods go straight
/// to the delegate and never pass through the interception chain.
#[derive(Clone)]
pub struct Introduction {
    capability: Arc<Capability>,
    delegate_class: Option<Arc<TargetClass>>,
    factory: Option<Arc<ImplFactory>>,
}

impl Introduction {
    /// Every proxy shares `delegate`.
    pub fn shared<D: Target>(capability: Arc<Capability>, delegate: Arc<D>) -> Self {
        let delegate_class = delegate.class().clone();
        let bound = IntroducedImpl::new(delegate);
        Self {
            capability,
            delegate_class: Some(delegate_class),
            factory: Some(Arc::new(move || bound.clone())),
        }
    }

    /// Each proxy gets its own delegate from `factory`.
    pub fn per_proxy<D, F>(
        capability: Arc<Capability>,
        delegate_class: Arc<TargetClass>,
        factory: F,
    ) -> Self
    where
        D: Target,
        F: Fn() -> D + Send + Sync + 'static,
    {
        Self {
            capability,
            delegate_class: Some(delegate_class),
            factory: Some(Arc::new(move || IntroducedImpl::new(Arc::new(factory())))),
        }
    }

    /// An introduction with no default implementation. Rejected when
    /// validated.
    pub fn unimplemented(capability: Arc<Capability>) -> Self {
        Self {
            capability,
            delegate_class: None,
            factory: None,
        }
    }

    pub fn capability(&self) -> &Arc<Capability> {
        &self.capability
    }

    pub fn delegate_class(&self) -> Option<&Arc<TargetClass>> {
        self.delegate_class.as_ref()
    }

    /// Check that a default implementation exists and actually implements
    /// the capability.
    pub fn validate(&self) -> Result<()> {
        let Some(class) = &self.delegate_class else {
            return Err(AopError::configuration(format!(
                "introduction of {} has no default implementation",
                self.capability.name()
            )));
        };
        if !class.implements(self.capability.name()) {
            return Err(AopError::configuration(format!(
                "{} does not implement introduced capability {}",
                class.name(),
                self.capability.name()
            )));
        }
        Ok(())
    }

    /// Create the delegate for one proxy.
    pub fn bind(&self) -> Result<IntroducedImpl> {
        self.validate()?;
        self.factory.as_ref().map(|f| f()).ok_or_else(|| {
            AopError::configuration(format!(
                "introduction of {} has no default implementation",
                self.capability.name()
            ))
        })
    }
}

impl fmt::Debug for Introduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Introduction")
            .field("capability", &self.capability.name())
            .field("delegate", &self.delegate_class.as_ref().map(|c| c.name()))
            .finish()
    }
}

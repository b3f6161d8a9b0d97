//! How a proxy presents itself and which calls it intercepts.

use std::fmt;

use crate::config::ProxySettings;
use crate::error::{AopError, Result};
use crate::target::{Method, TargetClass};

/// Dispatch strategy of a proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Exposes only the capabilities of the target class.
    Capability,
    /// Exposes every method of the target class. Non-overridable methods
    /// bypass the chain.
    Subclass,
}

/// Where a single call goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// Through the interception chain.
    Chain,
    /// Straight to the target.
    Direct,
    /// Not exposed by this proxy.
    Unsupported,
}

impl Strategy {
    /// Capability-based when the class has capabilities and class proxying
    /// was not requested; subclass-based otherwise.
    pub fn select(class: &TargetClass, settings: &ProxySettings) -> Result<Self> {
        let strategy = if !class.capabilities().is_empty() && !settings.proxy_target_class {
            Strategy::Capability
        } else {
            Strategy::Subclass
        };

        if strategy == Strategy::Subclass && class.is_sealed() {
            return Err(AopError::configuration(format!(
                "cannot create a subclass proxy for sealed class {}",
                class.name()
            )));
        }
        Ok(strategy)
    }

    pub(crate) fn route(self, method: &Method) -> Route {
        match self {
            Strategy::Capability if method.capability().is_none() => Route::Unsupported,
            Strategy::Capability => Route::Chain,
            Strategy::Subclass if !method.is_overridable() => Route::Direct,
            Strategy::Subclass => Route::Chain,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Capability => write!(f, "capability"),
            Strategy::Subclass => write!(f, "subclass"),
        }
    }
}

//! Error types for rule resolution and proxied calls.
//!
//! Two families, split by when they can occur:
//! - [`AopError`] is raised while rules are registered, resolved, or a proxy
//!   is configured. It never surfaces from a proxied call.
//! - [`InvocationError`] travels through `proceed()` during a call. Errors
//!   raised by a target or a behavior are carried untouched in
//!   [`InvocationError::Thrown`].

use std::error::Error as StdError;
use std::sync::Arc;

/// Result type for setup-time operations.
pub type Result<T> = std::result::Result<T, AopError>;

/// Result type for a proxied call.
pub type InvocationResult<T> = std::result::Result<T, InvocationError>;

/// Errors raised while registering rules, resolving chains, or configuring proxies.
#[derive(Debug, thiserror::Error)]
pub enum AopError {
    /// Malformed rule or proxy configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Two competing claims where exactly one is required.
    #[error("ambiguous match: {0}")]
    AmbiguousMatch(String),

    /// An operation that needs call context was used outside of it.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Configuration source could not be loaded or deserialized.
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    /// Inline YAML configuration could not be parsed.
    #[error("invalid yaml configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AopError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AopError::Configuration(msg.into())
    }

    pub fn ambiguous(msg: impl Into<String>) -> Self {
        AopError::AmbiguousMatch(msg.into())
    }

    /// Returns true if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AopError::Configuration(_))
    }

    /// Returns true if this is an ambiguous-match error.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, AopError::AmbiguousMatch(_))
    }
}

/// Errors that propagate out of a proxied call.
///
/// Cloning is cheap; a thrown error keeps its identity across clones so a
/// caller can check it received exactly what the target raised.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvocationError {
    /// Raised by the target method or by a behavior in the chain.
    #[error("{0}")]
    Thrown(Arc<dyn StdError + Send + Sync + 'static>),

    /// The proxy does not expose the requested method.
    #[error("method {method} is not exposed by the proxy for {class}")]
    UnsupportedMethod { class: String, method: String },

    /// A method looked up by name is overloaded.
    #[error("method name {method} is overloaded on {class}; call it by signature")]
    AmbiguousMethod { class: String, method: String },

    /// An argument could not be read as the expected type.
    #[error("argument {index} of {method}: expected {expected}, got {actual}")]
    ArgumentType {
        method: String,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// An argument was replaced past the end of the argument list.
    #[error("argument {index} is out of range for {len} arguments")]
    ArgumentIndex { index: usize, len: usize },

    /// The return value could not be read as the expected type.
    #[error("return value: expected {expected}, got {actual}")]
    ReturnType {
        expected: &'static str,
        actual: &'static str,
    },

    /// The target source could not supply a target.
    #[error("target unavailable: {0}")]
    TargetUnavailable(String),
}

impl InvocationError {
    /// Wrap an application error so it can travel through the chain.
    pub fn thrown<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        InvocationError::Thrown(Arc::new(error))
    }

    /// Downcast a thrown error to its concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            InvocationError::Thrown(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns true if the thrown error is of type `E`.
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// Returns true if both errors carry the very same thrown instance.
    pub fn same_as(&self, other: &InvocationError) -> bool {
        match (self, other) {
            (InvocationError::Thrown(a), InvocationError::Thrown(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

//! Interpose - rule resolution and interception chains for transparent proxies.
//!
//! Rules pair a pointcut (which classes and methods) with advice (what to do
//! around a call). The registry collects rules, the resolver picks and
//! orders the ones that apply to a class, and proxies run them as a chain
//! around each call to the target.

pub mod advice;
pub mod config;
pub mod error;
pub mod invocation;
pub mod pointcut;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod target;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use advice::{Advice, AdviceKind, Interceptor, Introduction};
pub use config::{Config, ProxySettings, RegistrySettings};
pub use error::{AopError, InvocationError, InvocationResult, Result};
pub use invocation::{current_join_point, current_proxy, Invocation, JoinPoint};
pub use pointcut::Pointcut;
pub use proxy::{AutoProxyCreator, ProxyFactory, ProxyHandle, Wrapped};
pub use registry::{Aspect, RuleRegistry};
pub use resolver::ChainResolver;
pub use rule::Rule;
pub use target::{Arguments, Capability, Method, Target, TargetClass, Value};

// Re-exported for `inventory::submit!` in downstream crates.
pub use inventory;

//! Behaviors run around intercepted calls.
//!
//! [`Advice`] is a tagged variant over the six behavior kinds. Around
//! ([`Interceptor`]) is the canonical shape: every other call-time kind is
//! adapted into an interceptor once, when its rule is built, so the
//! invocation machinery only ever sees one `invoke(&mut Invocation)` contract.
//! Introductions never join the per-call chain; they are bound when the
//! proxy is constructed.
//!
//! # Example
//!
//! ```ignore
//! let log = Advice::before(|inv: &mut Invocation<'_>| {
//!     info!(method = %inv.method(), "calling");
//!     Ok(())
//! });
//! let timed = Advice::around(Instrumented::new("repository"));
//! ```

mod adapters;
mod instrumented;
mod introduction;

use std::fmt;
use std::sync::Arc;

use crate::error::{InvocationError, InvocationResult};
use crate::invocation::Invocation;
use crate::target::Value;

pub use adapters::{
    AfterInterceptor, AfterReturningInterceptor, AfterThrowingInterceptor, BeforeInterceptor,
};
pub use instrumented::{Instrumented, Proceed};
pub use introduction::{IntroducedImpl, Introduction};

/// Around behavior. Decides whether and how often to call `proceed()`.
pub trait Interceptor: Send + Sync {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value>;
}

/// Runs before the call. May rewrite the invocation's arguments but must
/// not call `proceed()`; an error aborts the call.
pub trait BeforeAdvice: Send + Sync {
    fn before(&self, invocation: &mut Invocation<'_>) -> InvocationResult<()>;
}

/// Runs after a normal return.
pub trait AfterReturningAdvice: Send + Sync {
    fn after_returning(&self, value: &Value, invocation: &Invocation<'_>) -> InvocationResult<()>;
}

/// Runs when the call fails.
///
/// Returning `None` rethrows the original error; `Some` replaces it.
pub trait AfterThrowingAdvice: Send + Sync {
    fn after_throwing(
        &self,
        error: &InvocationError,
        invocation: &Invocation<'_>,
    ) -> Option<InvocationError>;
}

/// Runs after the call regardless of outcome.
pub trait AfterAdvice: Send + Sync {
    fn after(&self, invocation: &Invocation<'_>) -> InvocationResult<()>;
}

/// Behavior kinds, in per-unit declaration priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdviceKind {
    Around,
    Before,
    After,
    AfterReturning,
    AfterThrowing,
    Introduction,
}

impl AdviceKind {
    /// Rank used when expanding a declaring unit: Around first, then
    /// Before, After, AfterReturning, AfterThrowing.
    pub fn priority(self) -> u8 {
        match self {
            AdviceKind::Around => 0,
            AdviceKind::Before => 1,
            AdviceKind::After => 2,
            AdviceKind::AfterReturning => 3,
            AdviceKind::AfterThrowing => 4,
            AdviceKind::Introduction => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterThrowing => "after_throwing",
            AdviceKind::Introduction => "introduction",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A behavior of one of the six kinds.
#[derive(Clone)]
pub enum Advice {
    Before(Arc<dyn BeforeAdvice>),
    Around(Arc<dyn Interceptor>),
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    AfterThrowing(Arc<dyn AfterThrowingAdvice>),
    After(Arc<dyn AfterAdvice>),
    Introduction(Introduction),
}

impl Advice {
    pub fn kind(&self) -> AdviceKind {
        match self {
            Advice::Before(_) => AdviceKind::Before,
            Advice::Around(_) => AdviceKind::Around,
            Advice::AfterReturning(_) => AdviceKind::AfterReturning,
            Advice::AfterThrowing(_) => AdviceKind::AfterThrowing,
            Advice::After(_) => AdviceKind::After,
            Advice::Introduction(_) => AdviceKind::Introduction,
        }
    }

    pub fn is_introduction(&self) -> bool {
        matches!(self, Advice::Introduction(_))
    }

    pub fn as_introduction(&self) -> Option<&Introduction> {
        match self {
            Advice::Introduction(intro) => Some(intro),
            _ => None,
        }
    }

    /// The Around form of this behavior. `None` for introductions.
    pub fn to_interceptor(&self) -> Option<Arc<dyn Interceptor>> {
        let interceptor: Arc<dyn Interceptor> = match self {
            Advice::Around(i) => i.clone(),
            Advice::Before(b) => Arc::new(BeforeInterceptor::new(b.clone())),
            Advice::AfterReturning(a) => Arc::new(AfterReturningInterceptor::new(a.clone())),
            Advice::AfterThrowing(a) => Arc::new(AfterThrowingInterceptor::new(a.clone())),
            Advice::After(a) => Arc::new(AfterInterceptor::new(a.clone())),
            Advice::Introduction(_) => return None,
        };
        Some(interceptor)
    }

    pub fn around(interceptor: impl Interceptor + 'static) -> Self {
        Advice::Around(Arc::new(interceptor))
    }

    /// Around behavior from a closure.
    pub fn around_fn<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> InvocationResult<Value> + Send + Sync + 'static,
    {
        Advice::Around(Arc::new(FnAdvice(f)))
    }

    pub fn before<F>(f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Advice::Before(Arc::new(FnAdvice(f)))
    }

    pub fn after_returning<F>(f: F) -> Self
    where
        F: Fn(&Value, &Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Advice::AfterReturning(Arc::new(FnAdvice(f)))
    }

    pub fn after_throwing<F>(f: F) -> Self
    where
        F: Fn(&InvocationError, &Invocation<'_>) -> Option<InvocationError> + Send + Sync + 'static,
    {
        Advice::AfterThrowing(Arc::new(FnAdvice(f)))
    }

    pub fn after<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> InvocationResult<()> + Send + Sync + 'static,
    {
        Advice::After(Arc::new(FnAdvice(f)))
    }

    pub fn introduction(introduction: Introduction) -> Self {
        Advice::Introduction(introduction)
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advice::Introduction(intro) => f.debug_tuple("Introduction").field(intro).finish(),
            other => write!(f, "Advice::{}", other.kind()),
        }
    }
}

/// Closure-backed behavior. One wrapper per kind, selected by signature.
struct FnAdvice<F>(F);

impl<F> Interceptor for FnAdvice<F>
where
    F: Fn(&mut Invocation<'_>) -> InvocationResult<Value> + Send + Sync,
{
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        (self.0)(invocation)
    }
}

impl<F> BeforeAdvice for FnAdvice<F>
where
    F: Fn(&mut Invocation<'_>) -> InvocationResult<()> + Send + Sync,
{
    fn before(&self, invocation: &mut Invocation<'_>) -> InvocationResult<()> {
        (self.0)(invocation)
    }
}

impl<F> AfterReturningAdvice for FnAdvice<F>
where
    F: Fn(&Value, &Invocation<'_>) -> InvocationResult<()> + Send + Sync,
{
    fn after_returning(&self, value: &Value, invocation: &Invocation<'_>) -> InvocationResult<()> {
        (self.0)(value, invocation)
    }
}

impl<F> AfterThrowingAdvice for FnAdvice<F>
where
    F: Fn(&InvocationError, &Invocation<'_>) -> Option<InvocationError> + Send + Sync,
{
    fn after_throwing(
        &self,
        error: &InvocationError,
        invocation: &Invocation<'_>,
    ) -> Option<InvocationError> {
        (self.0)(error, invocation)
    }
}

impl<F> AfterAdvice for FnAdvice<F>
where
    F: Fn(&Invocation<'_>) -> InvocationResult<()> + Send + Sync,
{
    fn after(&self, invocation: &Invocation<'_>) -> InvocationResult<()> {
        (self.0)(invocation)
    }
}

//! Metrics instrumentation advice.
//!
//! Wraps an interceptor (or the bare continuation) to record call latency
//! and outcome as metrics and `tracing` events, without modifying the
//! wrapped behavior.

use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::Interceptor;
use crate::error::InvocationResult;
use crate::invocation::Invocation;
use crate::target::Value;

/// Interceptor that only proceeds. The default inner of [`Instrumented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Proceed;

impl Interceptor for Proceed {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        invocation.proceed()
    }
}

/// Wrapper that adds metrics instrumentation to any interceptor.
///
/// Records per call, labelled by `label`, `class` and `method`:
/// - `interpose_call_duration_seconds` - Call latency
/// - `interpose_calls_total` - Calls, additionally labelled by `outcome`
///
/// and logs `debug` on success, `warn` with the error on failure.
///
/// # Example
///
/// ```ignore
/// let rule = Rule::builder("timing", Advice::around(Instrumented::new("repository")))
///     .pointcut(Pointcut::for_classes(TypeNameFilter::new("*Repo")))
///     .build()?;
/// let cached = Instrumented::wrap(CacheInterceptor::default(), "cache");
/// ```
pub struct Instrumented<T = Proceed> {
    inner: T,
    label: &'static str,
}

impl Instrumented<Proceed> {
    /// Time the rest of the chain.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Proceed,
            label,
        }
    }
}

impl<T> Instrumented<T> {
    /// Time `inner`, including everything it proceeds into.
    pub fn wrap(inner: T, label: &'static str) -> Self {
        Self { inner, label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Interceptor> Interceptor for Instrumented<T> {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        let start = Instant::now();

        let result = self.inner.invoke(invocation);

        let elapsed = start.elapsed();
        let class = invocation.class().name().to_string();
        let method = invocation.method().name().to_string();
        let outcome = if result.is_ok() { "ok" } else { "error" };

        histogram!(
            "interpose_call_duration_seconds",
            "label" => self.label,
            "class" => class.clone(),
            "method" => method.clone()
        )
        .record(elapsed.as_secs_f64());
        counter!(
            "interpose_calls_total",
            "label" => self.label,
            "class" => class,
            "method" => method,
            "outcome" => outcome
        )
        .increment(1);

        let elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => debug!(
                label = self.label,
                class = %invocation.class().name(),
                method = %invocation.method(),
                elapsed_us,
                "call completed"
            ),
            Err(e) => warn!(
                label = self.label,
                class = %invocation.class().name(),
                method = %invocation.method(),
                elapsed_us,
                error = %e,
                "call failed"
            ),
        }

        result
    }
}

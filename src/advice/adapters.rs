//! Adapters turning each call-time behavior kind into an [`Interceptor`].
//!
//! Nesting composes the kinds: an After adapter that wraps AfterReturning
//! and AfterThrowing adapters deeper in the chain runs its cleanup only
//! after theirs, even though After is declared ahead of them.

use std::sync::Arc;

use super::{AfterAdvice, AfterReturningAdvice, AfterThrowingAdvice, BeforeAdvice, Interceptor};
use crate::error::InvocationResult;
use crate::invocation::Invocation;
use crate::target::Value;

/// Runs the behavior, then proceeds.
pub struct BeforeInterceptor {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeInterceptor {
    pub fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for BeforeInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        self.advice.before(invocation)?;
        invocation.proceed()
    }
}

/// Proceeds, then runs the behavior on a normal return only.
pub struct AfterReturningInterceptor {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningInterceptor {
    pub fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterReturningInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        let value = invocation.proceed()?;
        self.advice.after_returning(&value, invocation)?;
        Ok(value)
    }
}

/// Proceeds, then runs the behavior on failure and rethrows.
pub struct AfterThrowingInterceptor {
    advice: Arc<dyn AfterThrowingAdvice>,
}

impl AfterThrowingInterceptor {
    pub fn new(advice: Arc<dyn AfterThrowingAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterThrowingInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(error) => match self.advice.after_throwing(&error, invocation) {
                Some(translated) => Err(translated),
                None => Err(error),
            },
        }
    }
}

/// Proceeds, then always runs the behavior. A failing cleanup replaces the
/// call's outcome.
pub struct AfterInterceptor {
    advice: Arc<dyn AfterAdvice>,
}

impl AfterInterceptor {
    pub fn new(advice: Arc<dyn AfterAdvice>) -> Self {
        Self { advice }
    }
}

impl Interceptor for AfterInterceptor {
    fn invoke(&self, invocation: &mut Invocation<'_>) -> InvocationResult<Value> {
        let outcome = invocation.proceed();
        self.advice.after(invocation)?;
        outcome
    }
}

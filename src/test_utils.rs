//! Test utilities: recording behaviors, a counting expression evaluator,
//! and sample targets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use crate::advice::Advice;
use crate::error::{InvocationError, InvocationResult};
use crate::pointcut::{simple_match, ExpressionEvaluator};
use crate::target::{unsupported, Arguments, Method, Target, TargetClass, Value};

/// Shared, ordered log of behavior events.
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.into());
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    /// Before behavior logging `label`.
    pub fn before(&self, label: &str) -> Advice {
        let (log, label) = (self.clone(), label.to_string());
        Advice::before(move |_| {
            log.record(label.clone());
            Ok(())
        })
    }

    /// Around behavior logging `label:enter` and `label:exit`.
    pub fn around(&self, label: &str) -> Advice {
        let (log, label) = (self.clone(), label.to_string());
        Advice::around_fn(move |inv| {
            log.record(format!("{label}:enter"));
            let result = inv.proceed();
            log.record(format!("{label}:exit"));
            result
        })
    }

    pub fn after(&self, label: &str) -> Advice {
        let (log, label) = (self.clone(), label.to_string());
        Advice::after(move |_| {
            log.record(label.clone());
            Ok(())
        })
    }

    pub fn after_returning(&self, label: &str) -> Advice {
        let (log, label) = (self.clone(), label.to_string());
        Advice::after_returning(move |_, _| {
            log.record(label.clone());
            Ok(())
        })
    }

    pub fn after_throwing(&self, label: &str) -> Advice {
        let (log, label) = (self.clone(), label.to_string());
        Advice::after_throwing(move |_, _| {
            log.record(label.clone());
            None
        })
    }
}

/// Matches method names against the expression as a `*` wildcard and
/// counts every evaluation.
#[derive(Default)]
pub struct CountingEvaluator {
    method_calls: AtomicUsize,
    type_calls: AtomicUsize,
}

impl CountingEvaluator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn method_calls(&self) -> usize {
        self.method_calls.load(Ordering::SeqCst)
    }

    pub fn type_calls(&self) -> usize {
        self.type_calls.load(Ordering::SeqCst)
    }
}

impl ExpressionEvaluator for CountingEvaluator {
    fn matches_type(&self, _expression: &str, _class: &TargetClass) -> bool {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn evaluate_method_match(
        &self,
        expression: &str,
        method: &Method,
        _class: &TargetClass,
        _args: Option<&Arguments>,
    ) -> bool {
        self.method_calls.fetch_add(1, Ordering::SeqCst);
        simple_match(expression, method.name())
    }
}

/// Error raised by [`SampleRepo::fail`].
#[derive(Debug, thiserror::Error)]
#[error("sample repository failure")]
pub struct SampleFailure;

pub static SAMPLE_REPO: LazyLock<Arc<TargetClass>> = LazyLock::new(|| {
    TargetClass::builder("SampleRepo")
        .method(Method::new("get").param("String"))
        .method(Method::new("fail"))
        .build()
        .unwrap_or_else(|e| panic!("sample class: {e}"))
});

/// Repository returning `"value-<key>"` and counting target calls.
#[derive(Default)]
pub struct SampleRepo {
    calls: AtomicUsize,
}

impl SampleRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Target for SampleRepo {
    fn class(&self) -> &Arc<TargetClass> {
        &SAMPLE_REPO
    }

    fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name() {
            "get" => Ok(Value::of(format!("value-{}", args.get::<String>("get", 0)?))),
            "fail" => Err(InvocationError::thrown(SampleFailure)),
            _ => Err(unsupported(self.class(), method)),
        }
    }
}

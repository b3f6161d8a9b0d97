//! Shared fixtures for integration and scenario tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use interpose::error::{InvocationError, InvocationResult};
use interpose::target::{unsupported, Arguments, Capability, Method, Target, TargetClass, Value};
use interpose::Advice;

/// Ordered log of behavior events shared between advice closures.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn before(&self, label: &'static str) -> Advice {
        let rec = self.clone();
        Advice::before(move |_| {
            rec.push(label);
            Ok(())
        })
    }

    pub fn after(&self, label: &'static str) -> Advice {
        let rec = self.clone();
        Advice::after(move |_| {
            rec.push(label);
            Ok(())
        })
    }

    pub fn after_returning(&self, label: &'static str) -> Advice {
        let rec = self.clone();
        Advice::after_returning(move |_, _| {
            rec.push(label);
            Ok(())
        })
    }

    pub fn after_throwing(&self, label: &'static str) -> Advice {
        let rec = self.clone();
        Advice::after_throwing(move |_, _| {
            rec.push(label);
            None
        })
    }

    pub fn around(&self, label: &'static str) -> Advice {
        let rec = self.clone();
        Advice::around_fn(move |inv| {
            rec.push(format!("{label}:enter"));
            let result = inv.proceed();
            rec.push(format!("{label}:exit"));
            result
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("order {0} not found")]
pub struct NotFound(pub String);

pub static REPOSITORY: LazyLock<Arc<Capability>> = LazyLock::new(|| {
    Capability::new(
        "Repository",
        vec![
            Method::new("get").param("String"),
            Method::new("save").param("String"),
        ],
    )
    .unwrap()
});

pub static WRITER: LazyLock<Arc<Capability>> = LazyLock::new(|| {
    Capability::new("Writer", vec![Method::new("write").param("String")]).unwrap()
});

pub static ORDER_REPO: LazyLock<Arc<TargetClass>> = LazyLock::new(|| {
    TargetClass::builder("OrderRepo")
        .implements(REPOSITORY.clone())
        .method(Method::new("flush"))
        .method(Method::new("version").sealed())
        .build()
        .unwrap()
});

pub static BUFFER_WRITER: LazyLock<Arc<TargetClass>> = LazyLock::new(|| {
    TargetClass::builder("BufferWriter")
        .implements(WRITER.clone())
        .build()
        .unwrap()
});

pub static TIMING_RULE: LazyLock<Arc<TargetClass>> = LazyLock::new(|| {
    TargetClass::builder("TimingRule")
        .method(Method::new("get").param("String"))
        .infrastructure()
        .build()
        .unwrap()
});

/// In-memory repository. `get` of an unknown key fails with [`NotFound`].
#[derive(Default)]
pub struct OrderRepo {
    orders: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
}

impl OrderRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_order(key: &str, value: &str) -> Arc<Self> {
        let repo = Self::default();
        repo.orders
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Arc::new(repo)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Target for OrderRepo {
    fn class(&self) -> &Arc<TargetClass> {
        &ORDER_REPO
    }

    fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match method.name() {
            "get" => {
                let key = args.get::<String>("get", 0)?;
                let orders = self.orders.lock().unwrap();
                match orders.get(key) {
                    Some(value) => Ok(Value::of(value.clone())),
                    None => Err(InvocationError::thrown(NotFound(key.clone()))),
                }
            }
            "save" => {
                let key = args.get::<String>("save", 0)?;
                self.orders
                    .lock()
                    .unwrap()
                    .insert(key.clone(), format!("order {key}"));
                Ok(Value::unit())
            }
            "flush" => Ok(Value::unit()),
            "version" => Ok(Value::of(3u32)),
            _ => Err(unsupported(self.class(), method)),
        }
    }
}

/// Default implementation of the `Writer` capability.
#[derive(Default)]
pub struct BufferWriter {
    pub lines: Mutex<Vec<String>>,
}

impl Target for BufferWriter {
    fn class(&self) -> &Arc<TargetClass> {
        &BUFFER_WRITER
    }

    fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value> {
        match method.name() {
            "write" => {
                let line = args.get::<String>("write", 0)?;
                self.lines.lock().unwrap().push(line.clone());
                Ok(Value::unit())
            }
            _ => Err(unsupported(self.class(), method)),
        }
    }
}

/// A behavior implementation; never advised itself.
pub struct TimingRule;

impl Target for TimingRule {
    fn class(&self) -> &Arc<TargetClass> {
        &TIMING_RULE
    }

    fn invoke(&self, method: &Method, _args: &Arguments) -> InvocationResult<Value> {
        match method.name() {
            "get" => Ok(Value::of("timing".to_string())),
            _ => Err(unsupported(self.class(), method)),
        }
    }
}

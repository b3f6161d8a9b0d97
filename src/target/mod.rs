//! Proxy targets and how a proxy obtains them.
//!
//! A [`Target`] is the plain object being advised. It describes itself with a
//! [`TargetClass`] and exposes a single dynamic entry point, `invoke`, that a
//! hand-written adapter maps onto its real methods. A [`TargetSource`]
//! decides which target instance serves a call: always the same one, one
//! created lazily on first use, or a fresh one per call.

mod class;
mod value;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::error::{InvocationError, InvocationResult};

pub use class::{Capability, ClassRole, Method, TargetClass, TargetClassBuilder};
pub use value::{Arguments, Value};

/// A proxiable object.
///
/// # Example
///
/// ```ignore
/// impl Target for Repo {
///     fn class(&self) -> &Arc<TargetClass> {
///         &REPO_CLASS
///     }
///
///     fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value> {
///         match method.name() {
///             "get" => Ok(Value::of(self.get(args.get::<String>("get", 0)?))),
///             _ => Err(unsupported(self.class(), method)),
///         }
///     }
/// }
/// ```
pub trait Target: Any + Send + Sync {
    /// Descriptor of this target's class.
    fn class(&self) -> &Arc<TargetClass>;

    /// Execute `method` on this object with `args`.
    fn invoke(&self, method: &Method, args: &Arguments) -> InvocationResult<Value>;
}

/// Error for a method a target's adapter does not handle.
pub fn unsupported(class: &TargetClass, method: &Method) -> InvocationError {
    InvocationError::UnsupportedMethod {
        class: class.name().to_string(),
        method: method.signature(),
    }
}

/// Opaque identity of a target instance (its allocation address).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    pub fn of(target: &Arc<dyn Target>) -> Self {
        TargetId(Arc::as_ptr(target) as *const () as usize)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identity of a class descriptor (its allocation address).
///
/// Names are not unique; two descriptors built with the same name are
/// different classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassId(usize);

impl ClassId {
    pub fn of(class: &Arc<TargetClass>) -> Self {
        ClassId(Arc::as_ptr(class) as usize)
    }
}

/// Supplies the target for each proxied call.
pub trait TargetSource: Send + Sync {
    /// Class of the targets this source returns.
    fn target_class(&self) -> &Arc<TargetClass>;

    /// Whether every call gets the same target.
    fn is_static(&self) -> bool;

    /// Target for the current call.
    fn get_target(&self) -> InvocationResult<Arc<dyn Target>>;

    /// Hand back a target obtained from `get_target`.
    fn release_target(&self, _target: Arc<dyn Target>) {}
}

/// Always returns the same target.
pub struct SingletonTargetSource {
    target: Arc<dyn Target>,
    class: Arc<TargetClass>,
}

impl SingletonTargetSource {
    pub fn new(target: Arc<dyn Target>) -> Self {
        let class = target.class().clone();
        Self { target, class }
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> InvocationResult<Arc<dyn Target>> {
        Ok(self.target.clone())
    }
}

type TargetFactory = dyn Fn() -> InvocationResult<Arc<dyn Target>> + Send + Sync;

/// Creates its target on the first call and reuses it afterwards.
///
/// Concurrent first calls may each run the factory; exactly one result is kept.
pub struct LazyTargetSource {
    class: Arc<TargetClass>,
    factory: Box<TargetFactory>,
    target: OnceLock<Arc<dyn Target>>,
}

impl LazyTargetSource {
    pub fn new<F>(class: Arc<TargetClass>, factory: F) -> Self
    where
        F: Fn() -> InvocationResult<Arc<dyn Target>> + Send + Sync + 'static,
    {
        Self {
            class,
            factory: Box::new(factory),
            target: OnceLock::new(),
        }
    }

    /// Whether the target has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.target.get().is_some()
    }
}

impl TargetSource for LazyTargetSource {
    fn target_class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    fn is_static(&self) -> bool {
        true
    }

    fn get_target(&self) -> InvocationResult<Arc<dyn Target>> {
        if let Some(target) = self.target.get() {
            return Ok(target.clone());
        }
        let created = (self.factory)()?;
        debug!(class = %self.class.name(), "Lazily created proxy target");
        Ok(self.target.get_or_init(|| created).clone())
    }
}

/// Creates a fresh target for every call.
pub struct PrototypeTargetSource {
    class: Arc<TargetClass>,
    factory: Box<TargetFactory>,
}

impl PrototypeTargetSource {
    pub fn new<F>(class: Arc<TargetClass>, factory: F) -> Self
    where
        F: Fn() -> InvocationResult<Arc<dyn Target>> + Send + Sync + 'static,
    {
        Self {
            class,
            factory: Box::new(factory),
        }
    }
}

impl TargetSource for PrototypeTargetSource {
    fn target_class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    fn is_static(&self) -> bool {
        false
    }

    fn get_target(&self) -> InvocationResult<Arc<dyn Target>> {
        (self.factory)()
    }
}

//! Type-erased argument and return values.

use std::any::{type_name, Any};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::{InvocationError, InvocationResult};

/// A type-erased, cheaply clonable value passed through an interception chain.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a concrete value.
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// The value returned by methods without a result.
    pub fn unit() -> Self {
        Self::of(())
    }

    /// Name of the wrapped Rust type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn is_unit(&self) -> bool {
        self.is::<()>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Read the value as `T`, reporting a return-type mismatch otherwise.
    pub fn get<T: Any>(&self) -> InvocationResult<&T> {
        self.downcast_ref::<T>()
            .ok_or_else(|| InvocationError::ReturnType {
                expected: type_name::<T>(),
                actual: self.type_name,
            })
    }

    /// Clone the wrapped value out as `T`.
    pub fn cloned<T: Any + Clone>(&self) -> InvocationResult<T> {
        self.get::<T>().cloned()
    }

    /// Returns true if both values share the same allocation.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value<{}>", self.type_name)
    }
}

/// Ordered call arguments. Before and Around behaviors may rewrite entries.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Read argument `index` as `T`.
    ///
    /// `method` is only used to describe a mismatch.
    pub fn get<T: Any>(&self, method: &str, index: usize) -> InvocationResult<&T> {
        let value = self
            .values
            .get(index)
            .ok_or_else(|| InvocationError::ArgumentType {
                method: method.to_string(),
                index,
                expected: type_name::<T>(),
                actual: "<missing>",
            })?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| InvocationError::ArgumentType {
                method: method.to_string(),
                index,
                expected: type_name::<T>(),
                actual: value.type_name(),
            })
    }

    /// Replace argument `index`. Appends when `index == len()`; any
    /// further index fails with `ArgumentIndex` and leaves the list as is.
    pub fn set(&mut self, index: usize, value: Value) -> InvocationResult<()> {
        let len = self.values.len();
        match index.cmp(&len) {
            Ordering::Less => self.values[index] = value,
            Ordering::Equal => self.values.push(value),
            Ordering::Greater => return Err(InvocationError::ArgumentIndex { index, len }),
        }
        Ok(())
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<Value> for Arguments {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Build [`Arguments`] from plain values.
///
/// ```ignore
/// let args = args!["k1".to_string(), 42u32];
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::target::Arguments::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::target::Arguments::from(vec![$($crate::target::Value::of($value)),+])
    };
}

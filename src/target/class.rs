//! Class, method, and capability descriptors.
//!
//! These replace runtime reflection: a target describes itself once
//! (typically in a `LazyLock` static) and the engine matches rules against
//! the description.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{AopError, Result};

/// A method on a target class or capability.
///
/// Identity is the signature `name(param, ...)`; the declaring capability
/// and tags are metadata for matching.
#[derive(Clone, Debug)]
pub struct Method {
    name: String,
    params: Vec<String>,
    capability: Option<String>,
    overridable: bool,
    tags: BTreeSet<String>,
}

impl Method {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            capability: None,
            overridable: true,
            tags: BTreeSet::new(),
        }
    }

    /// Append a parameter type name.
    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.params.push(type_name.into());
        self
    }

    /// Mark the method as non-overridable. Subclass proxies forward it
    /// straight to the target without interception.
    pub fn sealed(mut self) -> Self {
        self.overridable = false;
        self
    }

    /// Attach a tag (the analogue of a method annotation).
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn capability(&self) -> Option<&str> {
        self.capability.as_deref()
    }

    pub fn is_overridable(&self) -> bool {
        self.overridable
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Signature used as the method's identity, e.g. `get(String)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }

    /// Same name and parameter list.
    pub fn same_signature(&self, other: &Method) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.capability {
            Some(cap) => write!(f, "{}::{}", cap, self.signature()),
            None => f.write_str(&self.signature()),
        }
    }
}

/// A named set of methods; the analogue of an interface.
#[derive(Debug)]
pub struct Capability {
    name: String,
    methods: Vec<Method>,
}

impl Capability {
    /// Create a capability. Each method is stamped with the capability name.
    pub fn new(name: impl Into<String>, methods: Vec<Method>) -> Result<Arc<Self>> {
        let name = name.into();
        let methods: Vec<Method> = methods
            .into_iter()
            .map(|mut m| {
                m.capability = Some(name.clone());
                m
            })
            .collect();
        ensure_unique(&name, &methods)?;
        Ok(Arc::new(Self { name, methods }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Look up a method by name. Fails if the name is overloaded.
    pub fn method(&self, name: &str) -> Option<&Method> {
        let mut found = self.methods.iter().filter(|m| m.name == name);
        let first = found.next()?;
        match found.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    /// Returns true if this capability declares a method with the same signature.
    pub fn declares(&self, method: &Method) -> bool {
        self.methods.iter().any(|m| m.same_signature(method))
    }
}

/// Whether a class belongs to the application or to the interception machinery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ClassRole {
    #[default]
    Application,
    /// Rules, matchers, and behaviors themselves. Never proxied.
    Infrastructure,
}

/// Descriptor of a proxiable type.
#[derive(Debug)]
pub struct TargetClass {
    name: String,
    capabilities: Vec<Arc<Capability>>,
    methods: Vec<Method>,
    tags: BTreeSet<String>,
    role: ClassRole,
    sealed: bool,
}

impl TargetClass {
    pub fn builder(name: impl Into<String>) -> TargetClassBuilder {
        TargetClassBuilder {
            name: name.into(),
            capabilities: Vec::new(),
            methods: Vec::new(),
            tags: BTreeSet::new(),
            role: ClassRole::Application,
            sealed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[Arc<Capability>] {
        &self.capabilities
    }

    /// All methods: capability methods first, then class-only methods.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn role(&self) -> ClassRole {
        self.role
    }

    pub fn is_infrastructure(&self) -> bool {
        self.role == ClassRole::Infrastructure
    }

    /// A sealed class cannot be subclass-proxied.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn implements(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c.name() == capability)
    }

    /// Find the class method with the same signature.
    pub fn find_method(&self, method: &Method) -> Option<&Method> {
        self.methods.iter().find(|m| m.same_signature(method))
    }

    /// Find a method by name. Returns `AmbiguousMatch` if the name is overloaded.
    pub fn method_named(&self, name: &str) -> Result<Option<&Method>> {
        let mut found = self.methods.iter().filter(|m| m.name == name);
        let Some(first) = found.next() else {
            return Ok(None);
        };
        if found.next().is_some() {
            return Err(AopError::ambiguous(format!(
                "{} has several methods named {}",
                self.name, name
            )));
        }
        Ok(Some(first))
    }
}

/// Builder for [`TargetClass`].
pub struct TargetClassBuilder {
    name: String,
    capabilities: Vec<Arc<Capability>>,
    methods: Vec<Method>,
    tags: BTreeSet<String>,
    role: ClassRole,
    sealed: bool,
}

impl TargetClassBuilder {
    pub fn implements(mut self, capability: Arc<Capability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn infrastructure(mut self) -> Self {
        self.role = ClassRole::Infrastructure;
        self
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    /// Build the descriptor.
    ///
    /// Capability methods are merged into the method set. A signature
    /// declared twice by different capabilities, or by a capability and the
    /// class itself with different overridability, is ambiguous.
    pub fn build(self) -> Result<Arc<TargetClass>> {
        let mut methods: Vec<Method> = Vec::new();
        for cap in &self.capabilities {
            for m in cap.methods() {
                if let Some(existing) = methods.iter().find(|e| e.same_signature(m)) {
                    return Err(AopError::ambiguous(format!(
                        "{}: {} is declared by both {} and {}",
                        self.name,
                        m.signature(),
                        existing.capability().unwrap_or("class"),
                        cap.name()
                    )));
                }
                methods.push(m.clone());
            }
        }
        for m in self.methods {
            match methods.iter_mut().find(|e| e.same_signature(&m)) {
                Some(existing) if existing.capability.is_none() => {
                    return Err(AopError::ambiguous(format!(
                        "{}: {} is declared more than once",
                        self.name,
                        m.signature()
                    )));
                }
                Some(existing) if existing.overridable != m.overridable => {
                    return Err(AopError::ambiguous(format!(
                        "{}: conflicting declarations of {}",
                        self.name,
                        m.signature()
                    )));
                }
                Some(existing) => existing.tags.extend(m.tags),
                None => methods.push(m),
            }
        }

        Ok(Arc::new(TargetClass {
            name: self.name,
            capabilities: self.capabilities,
            methods,
            tags: self.tags,
            role: self.role,
            sealed: self.sealed,
        }))
    }
}

fn ensure_unique(owner: &str, methods: &[Method]) -> Result<()> {
    let mut seen = HashSet::new();
    for m in methods {
        if !seen.insert(m.signature()) {
            return Err(AopError::ambiguous(format!(
                "{}: {} is declared more than once",
                owner,
                m.signature()
            )));
        }
    }
    Ok(())
}

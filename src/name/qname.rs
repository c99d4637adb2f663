//! Resolved AVM2 names.
//!
//! These are the *resolved* counterparts of the raw multiname/namespace
//! records found in an ABC constant pool (see `crate::abc::multiname`):
//! by the time code in this crate holds a `QName`, every runtime-qualified
//! or ambiguous component has already been ruled out or resolved.

use std::fmt;
use std::sync::Arc;

/// The kind of an AVM2 namespace. Order matters for nothing except
/// `Ord`/`Hash` stability of the interned pool in `ConstantPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamespaceKind {
    Namespace,
    Package,
    PackageInternal,
    Protected,
    Explicit,
    StaticProtected,
    Private,
}

/// A single resolved namespace: a kind plus a URI (empty for the public
/// namespace) and, for `Private`, a unique id distinguishing otherwise
/// identically-named private namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    kind: NamespaceKind,
    uri: Arc<str>,
    /// Only meaningful for `NamespaceKind::Private`; two private namespaces
    /// with the same URI are still distinct.
    private_id: Option<u32>,
}

impl Namespace {
    pub fn new(kind: NamespaceKind, uri: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            uri: uri.into(),
            private_id: None,
        }
    }

    pub fn new_private(uri: impl Into<Arc<str>>, private_id: u32) -> Self {
        Self {
            kind: NamespaceKind::Private,
            uri: uri.into(),
            private_id: Some(private_id),
        }
    }

    pub fn public() -> Self {
        Self::new(NamespaceKind::Package, "")
    }

    pub fn kind(&self) -> NamespaceKind {
        self.kind
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn private_id(&self) -> Option<u32> {
        self.private_id
    }

    pub fn is_public(&self) -> bool {
        self.kind == NamespaceKind::Package && self.uri.is_empty()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.private_id {
            Some(id) => write!(f, "{:?}({:?}#{id})", self.kind, self.uri),
            None => write!(f, "{:?}({:?})", self.kind, self.uri),
        }
    }
}

/// A resolved, ordered set of namespaces (the resolved form of a
/// `multiname`'s namespace set). Order is preserved because the constant
/// pool flattens namespace sets into parallel index arrays in declaration
/// order (see `ConstantPool::add_namespace_set`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceSet(Arc<[Namespace]>);

impl NamespaceSet {
    pub fn new(namespaces: Vec<Namespace>) -> Self {
        Self(namespaces.into())
    }

    pub fn single(ns: Namespace) -> Self {
        Self(vec![ns].into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Namespace> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ns: &Namespace) -> bool {
        self.0.iter().any(|n| n == ns)
    }
}

/// A fully-resolved qualified name: exactly one namespace plus a local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    namespace: Namespace,
    local_name: Arc<str>,
}

impl QName {
    pub fn new(namespace: Namespace, local_name: impl Into<Arc<str>>) -> Self {
        Self {
            namespace,
            local_name: local_name.into(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_public() {
            write!(f, "{}", self.local_name)
        } else {
            write!(f, "{}::{}", self.namespace, self.local_name)
        }
    }
}

/// A name as it appears at a use site: either already resolved to one
/// namespace (`QName`) or still carrying a candidate namespace set that
/// must be disambiguated against a scope chain (`Multiname`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Multiname {
    QName(QName),
    Multiname {
        namespace_set: NamespaceSet,
        local_name: Arc<str>,
    },
    /// An attribute-qualified name (`@name` / `@ns::name`), valid only in
    /// attribute-access contexts.
    Attribute(Box<Multiname>),
    /// A generic-instantiation name: a definition multiname plus its type
    /// arguments, e.g. `Vector.<int>`.
    TypeApplication {
        base: Box<Multiname>,
        type_args: Vec<Multiname>,
    },
}

impl Multiname {
    pub fn is_attribute(&self) -> bool {
        matches!(self, Multiname::Attribute(_))
    }

    pub fn local_name(&self) -> Option<&str> {
        match self {
            Multiname::QName(q) => Some(q.local_name()),
            Multiname::Multiname { local_name, .. } => Some(local_name),
            Multiname::Attribute(inner) => inner.local_name(),
            Multiname::TypeApplication { base, .. } => base.local_name(),
        }
    }
}

impl fmt::Display for Multiname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiname::QName(q) => write!(f, "{q}"),
            Multiname::Multiname { local_name, .. } => write!(f, "{local_name}"),
            Multiname::Attribute(inner) => write!(f, "@{inner}"),
            Multiname::TypeApplication { base, type_args } => {
                write!(f, "{base}.<")?;
                for (i, arg) in type_args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

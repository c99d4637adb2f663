//! External ABC data model (§3 "ABCFile (external)").
//!
//! This is deliberately inert: it models the *shape* of a loaded ABC parse
//! the way `swf::avm2::types` does (index-addressed pools, 1-based
//! `Index<T>` newtypes, bitflag flag sets), but does not decode bytecode
//! operands, read a byte stream, or implement a parser. §1 places the
//! byte-stream parser out of core scope; the core only needs something
//! concrete to index into.

use bitflags::bitflags;

/// A 1-based index into one of `AbcFile`'s pools. `0` conventionally means
/// "absent" wherever the pool in question allows it (e.g. `Index<Multiname>`
/// of `0` means "any type" for a method return/param type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Index<T>(pub u32, std::marker::PhantomData<T>);

impl<T> Index<T> {
    pub fn new(raw: u32) -> Self {
        Self(raw, std::marker::PhantomData)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Converts to a 0-based slice index, if non-zero.
    pub fn as_usize(&self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0 as usize - 1)
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        const NEED_ARGUMENTS = 1 << 0;
        const NEED_ACTIVATION = 1 << 1;
        const NEED_REST       = 1 << 2;
        const HAS_OPTIONAL    = 1 << 3;
        const SET_DXNS        = 1 << 6;
        const HAS_PARAM_NAMES = 1 << 7;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TraitAttributes: u8 {
        const FINAL    = 1 << 0;
        const OVERRIDE = 1 << 1;
        const METADATA = 1 << 2;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct InstanceFlags: u8 {
        const SEALED    = 1 << 0;
        const FINAL     = 1 << 1;
        const INTERFACE = 1 << 2;
        const PROTECTED_NS = 1 << 3;
    }
}

/// A raw default value for an optional parameter or a `Const`/`Slot` trait,
/// tagged with the ABC constant-pool kind it was read from.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Undefined,
    Null,
    Int(i32),
    Uint(u32),
    Double(f64),
    String(String),
    True,
    False,
    Namespace(Index<RawNamespace>),
}

#[derive(Debug, Clone)]
pub struct MethodParam {
    /// `0` (zero `Index`) means "any type".
    pub kind: Index<RawMultiname>,
    pub name: Option<Index<String>>,
    pub default_value: Option<DefaultValue>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: Index<String>,
    pub params: Vec<MethodParam>,
    pub return_type: Index<RawMultiname>,
    pub flags: MethodFlags,
    pub body: Option<Index<MethodBody>>,
}

#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    pub from_offset: u32,
    pub to_offset: u32,
    pub target_offset: u32,
    pub var_name: Index<RawMultiname>,
    pub type_name: Index<RawMultiname>,
}

#[derive(Debug, Clone)]
pub struct MethodBody {
    pub method: Index<MethodInfo>,
    pub max_stack: u32,
    pub local_count: u32,
    pub init_scope_depth: u32,
    pub max_scope_depth: u32,
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionInfo>,
    /// Traits declared directly on an activation object for this body
    /// (see §4.G "activation classes").
    pub traits: Vec<RawTrait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTraitValueKind {
    Undefined,
    Null,
    Int,
    Uint,
    Double,
    Utf8,
    True,
    False,
    Namespace,
}

#[derive(Debug, Clone)]
pub enum RawTraitKind {
    Slot {
        slot_id: u32,
        type_name: Index<RawMultiname>,
        value_index: u32,
        value_kind: Option<RawTraitValueKind>,
    },
    Method {
        disp_id: u32,
        method: Index<MethodInfo>,
    },
    Getter {
        disp_id: u32,
        method: Index<MethodInfo>,
    },
    Setter {
        disp_id: u32,
        method: Index<MethodInfo>,
    },
    Class {
        slot_id: u32,
        class: Index<ClassInfo>,
    },
    Function {
        slot_id: u32,
        method: Index<MethodInfo>,
    },
    Const {
        slot_id: u32,
        type_name: Index<RawMultiname>,
        value_index: u32,
        value_kind: Option<RawTraitValueKind>,
    },
}

#[derive(Debug, Clone)]
pub struct RawTrait {
    pub name: Index<RawMultiname>,
    pub kind: RawTraitKind,
    pub attributes: TraitAttributes,
    pub metadata: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub name: Index<RawMultiname>,
    pub super_name: Index<RawMultiname>,
    pub flags: InstanceFlags,
    pub protected_namespace: Option<Index<RawNamespace>>,
    pub interfaces: Vec<Index<RawMultiname>>,
    pub init: Index<MethodInfo>,
    pub traits: Vec<RawTrait>,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub cinit: Index<MethodInfo>,
    pub traits: Vec<RawTrait>,
}

#[derive(Debug, Clone)]
pub struct ScriptInfo {
    pub init: Index<MethodInfo>,
    pub traits: Vec<RawTrait>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawNamespaceKind {
    Namespace,
    Package,
    PackageInternal,
    Protected,
    Explicit,
    StaticProtected,
    Private,
}

#[derive(Debug, Clone)]
pub struct RawNamespace {
    pub kind: RawNamespaceKind,
    pub name: Index<String>,
}

#[derive(Debug, Clone)]
pub struct RawNamespaceSet(pub Vec<Index<RawNamespace>>);

#[derive(Debug, Clone)]
pub enum RawMultiname {
    QName {
        namespace: Index<RawNamespace>,
        name: Index<String>,
    },
    Multiname {
        name: Index<String>,
        namespace_set: Index<RawNamespaceSet>,
    },
    MultinameA {
        name: Index<String>,
        namespace_set: Index<RawNamespaceSet>,
    },
    /// Runtime-qualified: the namespace is supplied on the stack at
    /// execution time. Disallowed everywhere the core resolves names
    /// statically (§4.G / §7 `RuntimeNameInvalid`).
    RTQName {
        name: Index<String>,
    },
    RTQNameA {
        name: Index<String>,
    },
    RTQNameL,
    RTQNameLA,
    MultinameL {
        namespace_set: Index<RawNamespaceSet>,
    },
    MultinameLA {
        namespace_set: Index<RawNamespaceSet>,
    },
    TypeName {
        base: Index<RawMultiname>,
        type_args: Vec<Index<RawMultiname>>,
    },
}

impl RawMultiname {
    pub fn is_runtime_qualified(&self) -> bool {
        matches!(
            self,
            RawMultiname::RTQName { .. }
                | RawMultiname::RTQNameA { .. }
                | RawMultiname::RTQNameL
                | RawMultiname::RTQNameLA
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPoolRaw {
    pub strings: Vec<String>,
    pub namespaces: Vec<RawNamespace>,
    pub namespace_sets: Vec<RawNamespaceSet>,
    pub multinames: Vec<RawMultiname>,
}

/// A fully-loaded ABC file: every pool is index-addressed, 0-based in
/// storage but 1-based via `Index<T>` (index `0` means "absent" wherever
/// that is legal for the pool).
#[derive(Debug, Clone, Default)]
pub struct AbcFile {
    pub constant_pool: ConstantPoolRaw,
    pub methods: Vec<MethodInfo>,
    pub method_bodies: Vec<MethodBody>,
    pub instances: Vec<InstanceInfo>,
    pub classes: Vec<ClassInfo>,
    pub scripts: Vec<ScriptInfo>,
}

impl AbcFile {
    pub fn method_body_for(&self, method_index: usize) -> Option<&MethodBody> {
        let method = self.methods.get(method_index)?;
        let body_index = method.body?;
        self.method_bodies.get(body_index.as_usize()?)
    }
}

//! The external ABC data model (§3).
//!
//! Everything under this module is a passive view of an already-parsed ABC
//! file. Nothing here performs name resolution, slot assignment, or
//! validation beyond the structural shape of the pools themselves — those
//! are the job of `crate::model`, `crate::slots`, and the lettered
//! components in §4.

pub mod types;

pub use types::{
    AbcFile, ClassInfo, ConstantPoolRaw, DefaultValue, ExceptionInfo, Index, InstanceFlags,
    InstanceInfo, MethodBody, MethodFlags, MethodInfo, MethodParam, RawMultiname, RawNamespace,
    RawNamespaceKind, RawNamespaceSet, RawTrait, RawTraitKind, RawTraitValueKind, ScriptInfo,
};

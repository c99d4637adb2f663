//! Resolved classes (§4.G "Class Builder").

use crate::model::method::MethodId;
use crate::model::trait_def::TraitId;
use crate::name::qname::{Namespace, QName};
use bitflags::bitflags;

slotmap::new_key_type! {
    /// A stable id for a resolved class, valid for the lifetime of a single
    /// `CompilationContext`. Never reused across compiles.
    pub struct ClassId;
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClassAttributes: u8 {
        const SEALED = 1 << 0;
        const FINAL  = 1 << 1;
    }
}

/// Distinguishes classes that originate from an ABC `instance_info`/
/// `class_info` pair from the synthetic classes this compiler invents to
/// represent runtime concepts the target platform does not have a direct
/// equivalent for (§4.C, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// An ordinary class compiled from the script's own ABC pools.
    Normal,
    /// An ABC interface (`InstanceFlags::INTERFACE`).
    Interface,
    /// A synthetic captured-scope container type (§4.C).
    ScopeContainer,
    /// A synthetic catch-scope class, one per distinct caught exception
    /// binding shape (§4.G).
    CatchScope,
    /// A synthetic activation-object class, one per method that sets
    /// `MethodFlags::NEED_ACTIVATION` (§4.G).
    Activation,
}

/// A fully resolved class, ready for or already past trait emission.
///
/// Instances move through `CompilationContext`'s per-class state machine
/// (`INIT -> DEF_CREATING -> DEF_CREATED -> TRAITS_CREATING ->
/// TRAITS_CREATED -> TRAITS_EMITTED`); the fields below only ever describe
/// the class's structural shape, never its emission-phase status — that
/// lives alongside the arena entry in `CompilationContext`, not here, since
/// it's concurrency-state rather than type-shape.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: QName,
    pub kind: ClassKind,
    pub attributes: ClassAttributes,
    pub super_class: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    /// Non-`None` only when `InstanceFlags::PROTECTED_NS` was set; names the
    /// namespace this class's `protected` members live in, which its
    /// subclasses additionally see widened into their own protected set.
    pub protected_namespace: Option<Namespace>,
    pub instance_traits: Vec<TraitId>,
    pub static_traits: Vec<TraitId>,
    pub instance_init: Option<MethodId>,
    pub class_init: Option<MethodId>,
}

impl Class {
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.kind,
            ClassKind::ScopeContainer | ClassKind::CatchScope | ClassKind::Activation
        )
    }
}


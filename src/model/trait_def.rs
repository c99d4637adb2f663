//! Resolved traits: the output of interpreting a raw `RawTrait` against
//! the constant pool and the class graph.

use crate::model::class::ClassId;
use crate::model::method::{MethodId, TypeRef};
use crate::name::qname::QName;

slotmap::new_key_type! {
    pub struct TraitId;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotDefault {
    None,
    Undefined,
    Null,
    Int(i32),
    Uint(u32),
    Double(f64),
    Boolean(bool),
    String(String),
}

/// One half of a property's accessor pair, as flushed into a
/// `Trait::Property` (§4.G Pass 2 "Property aggregation", §9).
#[derive(Debug, Clone)]
pub struct PropertyAccessor {
    pub disp_id: u32,
    pub method: MethodId,
    pub is_final: bool,
}

#[derive(Debug, Clone)]
pub enum Trait {
    Slot {
        name: QName,
        slot_id: u32,
        type_ref: TypeRef,
        default: SlotDefault,
    },
    Const {
        name: QName,
        slot_id: u32,
        type_ref: TypeRef,
        default: SlotDefault,
    },
    Method {
        name: QName,
        disp_id: u32,
        method: MethodId,
        is_final: bool,
    },
    /// A getter/setter pair combined at flush time into one trait (§4.G
    /// Pass 2 "Property aggregation"). Either half may be absent when only
    /// one of the two was declared. Each present half keeps its own
    /// disp-id, since getter and setter occupy distinct disp-id slots even
    /// though they share one declared name.
    Property {
        name: QName,
        getter: Option<PropertyAccessor>,
        setter: Option<PropertyAccessor>,
    },
    Class {
        name: QName,
        slot_id: u32,
        class: ClassId,
    },
}

impl Trait {
    pub fn name(&self) -> &QName {
        match self {
            Trait::Slot { name, .. }
            | Trait::Const { name, .. }
            | Trait::Method { name, .. }
            | Trait::Property { name, .. }
            | Trait::Class { name, .. } => name,
        }
    }

    /// Whether this trait occupies a slot/disp id at all (every variant
    /// here does; kept as a named predicate because future trait kinds —
    /// none currently exist — might not).
    pub fn occupies_slot(&self) -> bool {
        true
    }

    /// A single representative disp/slot id. For `Property`, this is
    /// whichever half is present (getter first); a property with both
    /// halves occupies two disp-ids, so callers that need both should
    /// match the variant directly rather than call this.
    pub fn slot_or_disp_id(&self) -> u32 {
        match self {
            Trait::Slot { slot_id, .. } | Trait::Const { slot_id, .. } | Trait::Class { slot_id, .. } => *slot_id,
            Trait::Method { disp_id, .. } => *disp_id,
            Trait::Property { getter, setter, .. } => getter
                .as_ref()
                .or(setter.as_ref())
                .map(|a| a.disp_id)
                .unwrap_or(0),
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Trait::Property { .. })
    }
}

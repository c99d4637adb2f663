//! Resolved method signatures (used by §4.H's override/signature checker
//! and §4.D's helper emitter arity decisions).

use smallvec::SmallVec;

use crate::model::class::ClassId;

slotmap::new_key_type! {
    /// A stable id for a resolved method, one per `method_info` that is
    /// actually reachable from a class/script trait or a `newfunction`.
    pub struct MethodId;
}

/// A resolved parameter or return type. `Any` corresponds to an ABC
/// multiname index of `0` (untyped); `Class` is the common case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Any,
    Void,
    Class(ClassId),
    /// The implicit leading parameter type prepended to every method
    /// signature built for a `newfunction`-produced closure (§3 "Method
    /// signature"). Never appears as a return type, and never as anything
    /// but the first parameter.
    ScopedClosureReceiver,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub type_ref: TypeRef,
    pub name: Option<String>,
    /// Present iff this parameter is optional. Coercion to `type_ref`
    /// happens once at resolution time (§4.H "default-value coercion");
    /// by the time a `Param` exists the value is already in its target
    /// representation, not the raw ABC constant-pool form.
    pub default: Option<CoercedDefault>,
}

impl Param {
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// A default value that has already been coerced to its parameter's
/// declared type, ready for direct emission as a literal in the target
/// assembly (or as a stub-method forwarding argument).
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedDefault {
    Undefined,
    Null,
    Int(i32),
    Uint(u32),
    Double(f64),
    Boolean(bool),
    String(String),
}

/// Most AVM2 methods declare only a handful of parameters, so `params`
/// is a `SmallVec` (matching `CapturedScope`'s rationale) rather than a
/// plain `Vec`: the common case never allocates.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub params: SmallVec<[Param; 4]>,
    pub return_type: TypeRef,
    pub needs_rest: bool,
    pub needs_arguments: bool,
}

impl MethodSignature {
    /// Number of parameters a caller must supply at minimum (everything up
    /// to the first optional one).
    pub fn required_param_count(&self) -> usize {
        self.params.iter().take_while(|p| !p.is_optional()).count()
    }

    /// Structural equivalence used by the override checker (§4.H): two
    /// signatures are override-compatible when return-ness, return type,
    /// the rest-flag, parameter count, and each parameter's `(type,
    /// isOptional)` all match — `hasDefault` is deliberately excluded,
    /// since certain ABC conventions intentionally vary it between an
    /// override and its base.
    pub fn is_override_compatible_with(&self, base: &MethodSignature) -> bool {
        if self.params.len() != base.params.len() {
            return false;
        }
        if self.return_type != base.return_type {
            return false;
        }
        if self.needs_rest != base.needs_rest {
            return false;
        }
        self.params.iter().zip(base.params.iter()).all(|(derived, base)| {
            derived.type_ref == base.type_ref && derived.is_optional() == base.is_optional()
        })
    }
}

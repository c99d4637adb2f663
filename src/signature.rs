//! Component H — Signature & Override Checker.

use crate::abc::types::{DefaultValue, MethodFlags, MethodInfo};
use crate::error::{Result, TypeSystemError};
use crate::model::class::ClassId;
use crate::model::method::{CoercedDefault, MethodSignature, Param, TypeRef};

/// The handful of built-in classes whose identity the coercion rules need
/// to recognize by name rather than by structural shape. Supplied by the
/// caller, since which `ClassId` is "the" `int` class is a fact about a
/// particular compile's loaded class graph, not something this module can
/// know on its own.
#[derive(Debug, Clone, Copy)]
pub struct WellKnownTypes {
    pub object: ClassId,
    pub int: ClassId,
    pub uint: ClassId,
    pub number: ClassId,
    pub string: ClassId,
    pub boolean: ClassId,
}

impl WellKnownTypes {
    fn is_numeric_coercible(&self, class: ClassId) -> bool {
        class == self.int || class == self.uint || class == self.number
    }
}

/// Default-value coercion (§4.H). Consumes the raw ABC constant-pool value
/// and the parameter's declared type, producing a value already in its
/// target representation, or rejecting the pair as illegal.
pub fn coerce_default_value(
    value: &DefaultValue,
    declared: &TypeRef,
    well_known: &WellKnownTypes,
    method_name: &str,
    param_name: &str,
) -> std::result::Result<CoercedDefault, TypeSystemError> {
    let illegal = || TypeSystemError::IllegalDefaultValue {
        method: method_name.to_string(),
        param: param_name.to_string(),
    };

    match value {
        DefaultValue::Undefined | DefaultValue::Null => match declared {
            TypeRef::Any => Ok(if matches!(value, DefaultValue::Undefined) {
                CoercedDefault::Undefined
            } else {
                CoercedDefault::Null
            }),
            TypeRef::Class(c) if *c == well_known.int => Ok(CoercedDefault::Int(0)),
            TypeRef::Class(c) if *c == well_known.uint => Ok(CoercedDefault::Uint(0)),
            TypeRef::Class(c) if *c == well_known.number => Ok(CoercedDefault::Double(
                if matches!(value, DefaultValue::Undefined) {
                    f64::NAN
                } else {
                    0.0
                },
            )),
            _ => Ok(CoercedDefault::Null),
        },
        DefaultValue::Int(v) => coerce_numeric(declared, well_known, &illegal).map(|_| match declared {
            TypeRef::Class(c) if *c == well_known.uint => CoercedDefault::Uint(*v as u32),
            TypeRef::Class(c) if *c == well_known.number => CoercedDefault::Double(*v as f64),
            _ => CoercedDefault::Int(*v),
        }),
        DefaultValue::Uint(v) => coerce_numeric(declared, well_known, &illegal).map(|_| match declared {
            TypeRef::Class(c) if *c == well_known.int => CoercedDefault::Int(*v as i32),
            TypeRef::Class(c) if *c == well_known.number => CoercedDefault::Double(*v as f64),
            _ => CoercedDefault::Uint(*v),
        }),
        DefaultValue::Double(v) => coerce_numeric(declared, well_known, &illegal).map(|_| match declared {
            TypeRef::Class(c) if *c == well_known.int => CoercedDefault::Int(*v as i32),
            TypeRef::Class(c) if *c == well_known.uint => CoercedDefault::Uint(*v as u32),
            _ => CoercedDefault::Double(*v),
        }),
        DefaultValue::String(s) => match declared {
            TypeRef::Any => Ok(CoercedDefault::String(s.clone())),
            TypeRef::Class(c) if *c == well_known.object || *c == well_known.string => {
                Ok(CoercedDefault::String(s.clone()))
            }
            _ => Err(illegal()),
        },
        DefaultValue::True | DefaultValue::False => {
            let b = matches!(value, DefaultValue::True);
            match declared {
                TypeRef::Any => Ok(CoercedDefault::Boolean(b)),
                TypeRef::Class(c) if *c == well_known.object || *c == well_known.boolean => {
                    Ok(CoercedDefault::Boolean(b))
                }
                _ => Err(illegal()),
            }
        }
        DefaultValue::Namespace(_) => Err(illegal()),
    }
}

fn coerce_numeric(
    declared: &TypeRef,
    well_known: &WellKnownTypes,
    illegal: &impl Fn() -> TypeSystemError,
) -> std::result::Result<(), TypeSystemError> {
    match declared {
        TypeRef::Any => Ok(()),
        TypeRef::Class(c) if *c == well_known.object => Ok(()),
        TypeRef::Class(c) if well_known.is_numeric_coercible(*c) => Ok(()),
        _ => Err(illegal()),
    }
}

/// Resolves a raw ABC `method_info` into a `MethodSignature` (§3 "Method
/// signature", §4.H "Resolves method/constructor signatures"). `resolve_type`
/// turns a raw multiname index (`0` meaning untyped/any) into a `TypeRef`;
/// it is supplied by the caller because it depends on the constant pool and
/// the class graph, neither of which this module owns. `method_name` is
/// only used to attribute a coercion failure to the right method in the
/// returned error.
///
/// When `is_newfunction_closure` is set, an implicit leading
/// `ScopedClosureReceiver`-typed, non-optional parameter is prepended ahead
/// of the method_info's own declared parameters, per §3's note that every
/// closure produced by `newfunction` carries one.
///
/// `resolve_type` turns a raw multiname index into a `TypeRef` and may fail
/// (the name might not resolve to any known class), which is why it returns
/// `Result` rather than the infallible shape a purely structural helper
/// would get away with.
pub fn build_method_signature(
    info: &MethodInfo,
    mut resolve_type: impl FnMut(u32) -> Result<TypeRef>,
    well_known: &WellKnownTypes,
    method_name: &str,
    is_newfunction_closure: bool,
) -> Result<MethodSignature> {
    let mut params = smallvec::SmallVec::with_capacity(info.params.len() + 1);
    if is_newfunction_closure {
        params.push(Param {
            type_ref: TypeRef::ScopedClosureReceiver,
            name: None,
            default: None,
        });
    }

    for (i, raw_param) in info.params.iter().enumerate() {
        let type_ref = resolve_type(raw_param.kind.0)?;
        let default = raw_param
            .default_value
            .as_ref()
            .map(|v| coerce_default_value(v, &type_ref, well_known, method_name, &format!("#{i}")))
            .transpose()?;
        params.push(Param {
            type_ref,
            name: None,
            default,
        });
    }

    let return_type = if info.return_type.is_zero() {
        TypeRef::Any
    } else {
        resolve_type(info.return_type.0)?
    };

    Ok(MethodSignature {
        params,
        return_type,
        needs_rest: info.flags.contains(MethodFlags::NEED_REST),
        needs_arguments: info.flags.contains(MethodFlags::NEED_ARGUMENTS),
    })
}

/// Override legality (§4.H): `derived` may override `base` when their
/// signatures are override-compatible per
/// `MethodSignature::is_override_compatible_with` — delegated here rather
/// than duplicated, since the field-level rule lives with the type it
/// describes.
pub fn is_legal_override(derived: &MethodSignature, base: &MethodSignature, base_is_final: bool) -> bool {
    !base_is_final && derived.is_override_compatible_with(base)
}

/// A stub recorded against a specific overriding trait, once
/// `stub_necessity` has found at least one disjunct true for it.
#[derive(Debug, Clone)]
pub struct StubRequirement {
    pub trait_id: crate::model::trait_def::TraitId,
    pub stub_name: String,
    pub cause: StubCause,
}

/// The four disjuncts under which a stub method must be synthesized for
/// an (override, base) pair (§4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubCause {
    pub inherited_not_declared_locally: bool,
    pub not_virtual: bool,
    pub rest_shape_differs: bool,
    pub optional_wrapper_vs_default_differs: bool,
}

impl StubCause {
    pub fn any(&self) -> bool {
        self.inherited_not_declared_locally
            || self.not_virtual
            || self.rest_shape_differs
            || self.optional_wrapper_vs_default_differs
    }
}

/// Whether a stub is required, per the stub-necessity predicate (§4.H,
/// §8 property 5). `derived_declared_locally` and `derived_is_virtual`
/// describe facts about the *implementing* class's declaration, not the
/// signature itself, so they're passed in rather than derived here.
pub fn stub_necessity(
    derived: &MethodSignature,
    base: &MethodSignature,
    derived_declared_locally: bool,
    derived_is_virtual: bool,
    derived_needs_arguments: bool,
    base_needs_rest: bool,
    override_has_default_where_base_has_optional_wrapper: bool,
) -> StubCause {
    StubCause {
        inherited_not_declared_locally: !derived_declared_locally,
        not_virtual: !derived_is_virtual,
        rest_shape_differs: derived_needs_arguments != base_needs_rest,
        optional_wrapper_vs_default_differs: override_has_default_where_base_has_optional_wrapper,
    }
}

/// The protected-namespace ancestor walk (§4.H): given an override name
/// whose namespace is the *declaring* class's own protected namespace,
/// successive ancestors are searched using *their own* protected namespace
/// rather than the original one. `ancestors` is the inheritance chain from
/// the immediate parent upward; `lookup` tests whether a given
/// re-qualified name resolves on a given ancestor.
pub fn find_override_base<'a, A>(
    local_name: &str,
    ancestors: impl Iterator<Item = &'a A>,
    protected_namespace_of: impl Fn(&'a A) -> Option<&'a crate::name::qname::Namespace>,
    lookup: impl Fn(&'a A, &crate::name::qname::QName) -> bool,
) -> bool {
    for ancestor in ancestors {
        let Some(ns) = protected_namespace_of(ancestor) else {
            break;
        };
        let requalified = crate::name::qname::QName::new(ns.clone(), local_name);
        if lookup(ancestor, &requalified) {
            return true;
        }
    }
    false
}

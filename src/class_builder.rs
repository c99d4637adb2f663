//! Component G — Class Builder.
//!
//! Builds each ABC class through the three bounded passes from §4.G,
//! driving `CompilationContext`'s state machine. Name resolution (turning
//! a `RawMultiname` into a `ClassId`) is supplied by the caller via the
//! `Resolver` trait, since that depends on the constant pool and the
//! global stager, both of which outlive any single `ClassBuilder` call.

use fnv::FnvHashMap;

use crate::abc::types::{DefaultValue, MethodInfo, RawTrait, RawTraitKind, RawTraitValueKind, TraitAttributes};
use crate::context::CompilationContext;
use crate::error::{AbcStructureError, CompileError, Result, TypeSystemError};
use crate::model::class::{Class, ClassAttributes, ClassId, ClassKind};
use crate::model::method::{CoercedDefault, MethodId, MethodSignature, TypeRef};
use crate::model::trait_def::{PropertyAccessor, SlotDefault, Trait, TraitId};
use crate::name::qname::{Namespace, QName};
use crate::signature::{self, WellKnownTypes};
use crate::slots::SlotMap as MemberSlotMap;

/// Resolves multinames encountered while walking a class's traits to
/// already-known classes. Implemented by the compiler driver that owns
/// the constant pool and the global stager; the `ClassBuilder` itself
/// stays agnostic of *how* a name becomes a `ClassId`.
pub trait Resolver {
    fn resolve_class(&mut self, multiname_index: u32) -> Result<ClassId>;
    fn resolve_optional_class(&mut self, multiname_index: u32) -> Result<Option<ClassId>>;
}

/// Computes the transitive closure of implemented interfaces: declared
/// interfaces, their own closures, and the parent's closure, deduplicated
/// (§8 property 3).
pub fn compute_interface_closure(
    declared: &[ClassId],
    parent_closure: &[ClassId],
    closure_of: impl Fn(ClassId) -> Vec<ClassId>,
) -> Vec<ClassId> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    let mut push = |id: ClassId, seen: &mut std::collections::HashSet<ClassId>, out: &mut Vec<ClassId>| {
        if seen.insert(id) {
            out.push(id);
        }
    };
    for &iface in declared {
        push(iface, &mut seen, &mut out);
        for ancestor in closure_of(iface) {
            push(ancestor, &mut seen, &mut out);
        }
    }
    for &ancestor in parent_closure {
        push(ancestor, &mut seen, &mut out);
    }
    out
}

/// Pass 1 — Definition. Resolves the parent and declared interfaces,
/// verifies the parent is neither final nor an interface, and registers
/// the class's definition. Returns the new `ClassId`.
pub fn build_definition(
    ctx: &mut CompilationContext,
    name: QName,
    kind: ClassKind,
    attributes: ClassAttributes,
    parent: Option<ClassId>,
    declared_interfaces: Vec<ClassId>,
) -> Result<ClassId> {
    let _span = tracing::debug_span!("build_class", class = %name, pass = "definition").entered();
    if kind == ClassKind::Interface && parent.is_some() {
        return Err(TypeSystemError::CannotExtendClass {
            class: name.to_string(),
            base: "<interface-with-parent>".to_string(),
        }
        .into());
    }

    if let Some(parent_id) = parent {
        let parent_class = &ctx.class(parent_id).class;
        if parent_class.attributes.contains(ClassAttributes::FINAL)
            || parent_class.kind == ClassKind::Interface
        {
            return Err(TypeSystemError::CannotExtendClass {
                class: name.to_string(),
                base: parent_class.name.to_string(),
            }
            .into());
        }
    }

    // §4.G Pass 1 / §8 property 3: a class's visible interface set is the
    // transitive closure of what it declares, each declared interface's own
    // closure, and whatever its parent already implements — not just the
    // `implements` clause as written.
    let parent_closure = parent
        .map(|p| ctx.class(p).class.interfaces.clone())
        .unwrap_or_default();
    let interfaces = compute_interface_closure(&declared_interfaces, &parent_closure, |iface| {
        ctx.class(iface).class.interfaces.clone()
    });

    let class = Class {
        name,
        kind,
        attributes,
        super_class: parent,
        interfaces,
        protected_namespace: None,
        instance_traits: vec![],
        static_traits: vec![],
        instance_init: None,
        class_init: None,
    };
    let id = ctx.alloc_class(class);
    ctx.begin_def(id)?;
    ctx.complete_def(id);
    Ok(id)
}

/// One buffered accessor half: its disp-id, its already-resolved method,
/// whether it was declared `final` (needed once its sibling half is
/// flushed into a `Trait::Property`), and any stub this half's override
/// check already found necessary (§4.H).
struct BufferedAccessor {
    disp_id: u32,
    method: MethodId,
    is_final: bool,
    stub_cause: Option<signature::StubCause>,
}

/// Temporary getter/setter buffer for property aggregation during a
/// single class's trait pass (§9 "Property aggregation"). Cleared at the
/// end of `build_traits` so nothing leaks across classes.
#[derive(Default)]
struct PropertyBuffer {
    getters: FnvHashMap<QName, BufferedAccessor>,
    setters: FnvHashMap<QName, BufferedAccessor>,
}

pub struct BuiltTraits {
    pub instance_traits: Vec<TraitId>,
    pub static_traits: Vec<TraitId>,
    pub member_slots: MemberSlotMap,
    pub stubs: Vec<signature::StubRequirement>,
}

fn coerced_default_to_slot_default(value: CoercedDefault) -> SlotDefault {
    match value {
        CoercedDefault::Undefined => SlotDefault::Undefined,
        CoercedDefault::Null => SlotDefault::Null,
        CoercedDefault::Int(v) => SlotDefault::Int(v),
        CoercedDefault::Uint(v) => SlotDefault::Uint(v),
        CoercedDefault::Double(v) => SlotDefault::Double(v),
        CoercedDefault::Boolean(v) => SlotDefault::Boolean(v),
        CoercedDefault::String(v) => SlotDefault::String(v),
    }
}

/// Validates that `derived_method`, declared with the `override` attribute
/// at `disp_id`, is a legal override of whatever already occupies that
/// disp-id on the parent (§4.G "check overrides", §4.H). A disp-id with no
/// parent occupant is left alone here — that's either a malformed ABC file
/// or a first declaration mislabeled `override`, neither of which this pass
/// is positioned to tell apart, so it's not treated as an error on its own.
///
/// On success, also runs the stub-necessity predicate (§4.H "Stub
/// emission") and returns the cause when a stub is required. A trait
/// reaching this function is by construction declared locally with the
/// `override` attribute, so disjunct (i) never fires here; disjunct (ii) is
/// approximated from the derived trait's own `final` flag (a final override
/// is the last one in the chain and needs no further virtual dispatch);
/// disjunct (iii) compares the two signatures' rest/arguments shape
/// directly; disjunct (iv) is answered by `wrapper_default_conflict`, since
/// telling an optional-wrapper-typed base parameter apart from an ordinary
/// one needs type information this core's `TypeRef` model doesn't carry.
#[allow(clippy::too_many_arguments)]
fn check_override(
    ctx: &CompilationContext,
    derived_name: &QName,
    parent_member_slots: Option<&MemberSlotMap>,
    disp_id: u32,
    is_static: bool,
    derived_method: MethodId,
    derived_is_final: bool,
    wrapper_default_conflict: &mut impl FnMut(MethodId, MethodId) -> bool,
) -> Result<Option<signature::StubCause>> {
    let Some(parent) = parent_member_slots else {
        return Ok(None);
    };
    let Some(base_trait_id) = parent.get_method_by_disp_id(disp_id, is_static) else {
        return Ok(None);
    };
    let (base_method, base_is_final, base_name) = match ctx.trait_(base_trait_id) {
        Trait::Method { method, is_final, name, .. } => (*method, *is_final, name.clone()),
        Trait::Property { name, getter, setter } => {
            let accessor = getter
                .as_ref()
                .filter(|a| a.disp_id == disp_id)
                .or_else(|| setter.as_ref().filter(|a| a.disp_id == disp_id));
            let Some(accessor) = accessor else {
                return Ok(None);
            };
            (accessor.method, accessor.is_final, name.clone())
        }
        _ => return Ok(None),
    };
    let derived_sig = ctx.method(derived_method).signature.clone();
    let base_sig = ctx.method(base_method).signature.clone();
    if !signature::is_legal_override(&derived_sig, &base_sig, base_is_final) {
        return Err(TypeSystemError::IllegalOverride {
            derived: derived_name.to_string(),
            base: base_name.to_string(),
        }
        .into());
    }
    let cause = signature::stub_necessity(
        &derived_sig,
        &base_sig,
        true,
        !derived_is_final,
        derived_sig.needs_arguments,
        base_sig.needs_rest,
        wrapper_default_conflict(derived_method, base_method),
    );
    Ok(if cause.any() { Some(cause) } else { None })
}

/// Pass 2 — Traits. Walks `raw_traits`, producing resolved `Trait`s and
/// assigning slot/disp ids through a `MemberSlotMap` seeded from the
/// parent's instance slots. Getter/setter pairs are buffered and flushed
/// into combined property traits at the end. Traits declared `override`
/// are checked against whatever they replace on the parent's slot map
/// (§4.G Pass 2, §4.H); field/const traits resolve their declared type and
/// coerce their default value through the same rules (§4.H).
///
/// `method_lookup` maps a raw method_info index to the already-allocated
/// `MethodId` for it (methods are allocated up front by the caller, one
/// per distinct `method_info`, so this pass only wires them to traits).
/// `resolve_type` turns a raw multiname index (`0` meaning untyped) into a
/// `TypeRef`, and `resolve_default` turns a constant-pool value index/kind
/// pair into the `DefaultValue` it names — both depend on the constant pool,
/// which this pass does not own.
#[allow(clippy::too_many_arguments)]
pub fn build_traits(
    ctx: &mut CompilationContext,
    class_id: ClassId,
    raw_traits: &[RawTrait],
    is_static: bool,
    parent_member_slots: Option<&MemberSlotMap>,
    well_known: &WellKnownTypes,
    mut name_of: impl FnMut(u32) -> Result<QName>,
    mut method_lookup: impl FnMut(u32) -> Result<MethodId>,
    mut class_lookup: impl FnMut(u32) -> Result<ClassId>,
    mut resolve_type: impl FnMut(u32) -> Result<TypeRef>,
    mut resolve_default: impl FnMut(u32, RawTraitValueKind) -> DefaultValue,
    mut wrapper_default_conflict: impl FnMut(MethodId, MethodId) -> bool,
) -> Result<BuiltTraits> {
    let _span = tracing::debug_span!("build_class", class = ?class_id, pass = "traits", is_static).entered();
    ctx.begin_traits(class_id)?;

    let is_interface = ctx.class(class_id).class.kind == ClassKind::Interface;
    let class_name = ctx.class(class_id).class.name.clone();

    let mut member_slots = MemberSlotMap::new();
    if let Some(parent) = parent_member_slots {
        member_slots.add_parent_slots(parent);
    }

    let mut properties = PropertyBuffer::default();
    let mut trait_ids = Vec::new();
    let mut stubs: Vec<signature::StubRequirement> = Vec::new();

    for raw in raw_traits {
        let name = name_of(raw.name.0)?;
        if is_interface
            && matches!(
                raw.kind,
                RawTraitKind::Slot { .. } | RawTraitKind::Const { .. } | RawTraitKind::Class { .. }
            )
        {
            return Err(TypeSystemError::InterfaceContainsNonMethod {
                interface: class_name.to_string(),
                trait_name: name.to_string(),
            }
            .into());
        }
        match &raw.kind {
            RawTraitKind::Slot {
                slot_id,
                type_name,
                value_index,
                value_kind,
            }
            | RawTraitKind::Const {
                slot_id,
                type_name,
                value_index,
                value_kind,
            } => {
                let type_ref = resolve_type(type_name.0)?;
                let default = match value_kind {
                    None => SlotDefault::None,
                    Some(kind) => {
                        let raw_default = resolve_default(*value_index, *kind);
                        let coerced = signature::coerce_default_value(
                            &raw_default,
                            &type_ref,
                            well_known,
                            &name.to_string(),
                            "<field>",
                        )?;
                        coerced_default_to_slot_default(coerced)
                    }
                };
                let is_const = matches!(raw.kind, RawTraitKind::Const { .. });
                let t = if is_const {
                    Trait::Const {
                        name: name.clone(),
                        slot_id: *slot_id,
                        type_ref,
                        default,
                    }
                } else {
                    Trait::Slot {
                        name: name.clone(),
                        slot_id: *slot_id,
                        type_ref,
                        default,
                    }
                };
                let trait_id = ctx.alloc_trait(t);
                if !member_slots.try_add_slot(*slot_id as i32, is_static, trait_id) {
                    return Err(AbcStructureError::SlotIdTaken {
                        class: name.to_string(),
                        slot_id: *slot_id,
                    }
                    .into());
                }
                trait_ids.push(trait_id);
            }
            RawTraitKind::Method { disp_id, method } => {
                let method_id = method_lookup(method.0)?;
                let is_final = raw.attributes.contains(TraitAttributes::FINAL);
                let mut stub_cause = None;
                if raw.attributes.contains(TraitAttributes::OVERRIDE) {
                    stub_cause = check_override(
                        ctx,
                        &name,
                        parent_member_slots,
                        *disp_id,
                        is_static,
                        method_id,
                        is_final,
                        &mut wrapper_default_conflict,
                    )?;
                }
                let t = Trait::Method {
                    name: name.clone(),
                    disp_id: *disp_id,
                    method: method_id,
                    is_final,
                };
                let trait_id = ctx.alloc_trait(t);
                if !member_slots.try_add_method(*disp_id as i32, is_static, trait_id) {
                    return Err(AbcStructureError::SlotIdTaken {
                        class: name.to_string(),
                        slot_id: *disp_id,
                    }
                    .into());
                }
                if let Some(cause) = stub_cause {
                    stubs.push(signature::StubRequirement {
                        trait_id,
                        stub_name: crate::name::mangler::create_method_impl_stub_name(&class_name, &name),
                        cause,
                    });
                }
                trait_ids.push(trait_id);
            }
            RawTraitKind::Getter { disp_id, method } => {
                let method_id = method_lookup(method.0)?;
                let is_final = raw.attributes.contains(TraitAttributes::FINAL);
                let mut stub_cause = None;
                if raw.attributes.contains(TraitAttributes::OVERRIDE) {
                    stub_cause = check_override(
                        ctx,
                        &name,
                        parent_member_slots,
                        *disp_id,
                        is_static,
                        method_id,
                        is_final,
                        &mut wrapper_default_conflict,
                    )?;
                }
                properties.getters.insert(
                    name.clone(),
                    BufferedAccessor {
                        disp_id: *disp_id,
                        method: method_id,
                        is_final,
                        stub_cause,
                    },
                );
            }
            RawTraitKind::Setter { disp_id, method } => {
                let method_id = method_lookup(method.0)?;
                let is_final = raw.attributes.contains(TraitAttributes::FINAL);
                let mut stub_cause = None;
                if raw.attributes.contains(TraitAttributes::OVERRIDE) {
                    stub_cause = check_override(
                        ctx,
                        &name,
                        parent_member_slots,
                        *disp_id,
                        is_static,
                        method_id,
                        is_final,
                        &mut wrapper_default_conflict,
                    )?;
                }
                properties.setters.insert(
                    name.clone(),
                    BufferedAccessor {
                        disp_id: *disp_id,
                        method: method_id,
                        is_final,
                        stub_cause,
                    },
                );
            }
            RawTraitKind::Class { slot_id, class } => {
                if !is_static {
                    return Err(TypeSystemError::InstanceClassTrait(name.to_string()).into());
                }
                let aliased = class_lookup(class.0)?;
                let t = Trait::Class {
                    name: name.clone(),
                    slot_id: *slot_id,
                    class: aliased,
                };
                let trait_id = ctx.alloc_trait(t);
                if !member_slots.try_add_slot(*slot_id as i32, is_static, trait_id) {
                    return Err(AbcStructureError::SlotIdTaken {
                        class: name.to_string(),
                        slot_id: *slot_id,
                    }
                    .into());
                }
                trait_ids.push(trait_id);
            }
            RawTraitKind::Function { .. } => {
                return Err(AbcStructureError::InvalidTraitKind(name.to_string()).into());
            }
        }
    }

    // Flush buffered getter/setter pairs into a single property trait each
    // (§9 "Property aggregation"). A name present in only one of the two
    // maps still yields a property trait with that single accessor. Each
    // present half is registered in the slot map under its own real
    // disp-id, both pointing at the same trait id, so `get_method_by_disp_id`
    // resolves either disp-id to the combined property.
    let mut flushed_names: Vec<QName> = properties
        .getters
        .keys()
        .chain(properties.setters.keys())
        .cloned()
        .collect();
    flushed_names.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    flushed_names.dedup();

    for name in flushed_names {
        let getter = properties.getters.remove(&name);
        let setter = properties.setters.remove(&name);
        let getter_disp_id = getter.as_ref().map(|g| g.disp_id);
        let setter_disp_id = setter.as_ref().map(|s| s.disp_id);
        let getter_stub_cause = getter.as_ref().and_then(|g| g.stub_cause);
        let setter_stub_cause = setter.as_ref().and_then(|s| s.stub_cause);

        let trait_id = ctx.alloc_trait(Trait::Property {
            name: name.clone(),
            getter: getter.map(|g| PropertyAccessor {
                disp_id: g.disp_id,
                method: g.method,
                is_final: g.is_final,
            }),
            setter: setter.map(|s| PropertyAccessor {
                disp_id: s.disp_id,
                method: s.method,
                is_final: s.is_final,
            }),
        });

        if let Some(cause) = getter_stub_cause {
            stubs.push(signature::StubRequirement {
                trait_id,
                stub_name: crate::name::mangler::create_method_impl_stub_name(
                    &class_name,
                    &QName::new(name.namespace().clone(), format!("get_{}", name.local_name())),
                ),
                cause,
            });
        }
        if let Some(cause) = setter_stub_cause {
            stubs.push(signature::StubRequirement {
                trait_id,
                stub_name: crate::name::mangler::create_method_impl_stub_name(
                    &class_name,
                    &QName::new(name.namespace().clone(), format!("set_{}", name.local_name())),
                ),
                cause,
            });
        }

        if let Some(disp_id) = getter_disp_id {
            if !member_slots.try_add_method(disp_id as i32, is_static, trait_id) {
                return Err(AbcStructureError::SlotIdTaken {
                    class: name.to_string(),
                    slot_id: disp_id,
                }
                .into());
            }
        }
        if let Some(disp_id) = setter_disp_id {
            if !member_slots.try_add_method(disp_id as i32, is_static, trait_id) {
                return Err(AbcStructureError::SlotIdTaken {
                    class: name.to_string(),
                    slot_id: disp_id,
                }
                .into());
            }
        }
        trait_ids.push(trait_id);
    }

    ctx.complete_traits(class_id);

    let (instance_traits, static_traits) = if is_static {
        (vec![], trait_ids)
    } else {
        (trait_ids, vec![])
    };

    if is_static {
        ctx.class_mut(class_id).class.static_traits = static_traits.clone();
    } else {
        ctx.class_mut(class_id).class.instance_traits = instance_traits.clone();
    }
    ctx.class_mut(class_id).member_slots = member_slots.clone();

    Ok(BuiltTraits {
        instance_traits,
        static_traits,
        member_slots,
        stubs,
    })
}

/// Resolves an ABC `method_info` into a `MethodSignature` (Component H) and
/// allocates the `MethodId` for it in one step. This is the "up front"
/// allocation `build_traits`'s `method_lookup` callback expects to have
/// already happened, one call per distinct `method_info` reachable from a
/// class's traits or a `newfunction` site.
pub fn resolve_and_alloc_method(
    ctx: &mut CompilationContext,
    info: &MethodInfo,
    resolve_type: impl FnMut(u32) -> Result<TypeRef>,
    well_known: &WellKnownTypes,
    method_name: &str,
    is_newfunction_closure: bool,
) -> Result<MethodId> {
    let sig = signature::build_method_signature(info, resolve_type, well_known, method_name, is_newfunction_closure)?;
    Ok(ctx.alloc_method(sig))
}

/// Verifies every method an interface declares has a compatible implementing
/// trait somewhere in `class_id`'s own instance traits or those of an
/// ancestor (§4.G Pass 2 "check ... interface implementations", §8 scenarios
/// S3/S4). Must run after `class_id`'s instance traits (and every ancestor's)
/// have been built and recorded via `build_traits`, and after its
/// `interfaces` field holds the transitive closure `build_definition`
/// computes.
pub fn verify_interface_implementations(ctx: &CompilationContext, class_id: ClassId) -> Result<()> {
    let interfaces = ctx.class(class_id).class.interfaces.clone();
    for iface_id in interfaces {
        let iface_name = ctx.class(iface_id).class.name.clone();
        let iface_traits = ctx.class(iface_id).class.instance_traits.clone();
        for trait_id in iface_traits {
            match ctx.trait_(trait_id) {
                Trait::Method { name: method_name, method, .. } => {
                    let base_sig = ctx.method(*method).signature.clone();
                    if !ancestor_chain_implements(ctx, class_id, method_name, AccessorKind::Method, &base_sig) {
                        return Err(TypeSystemError::InterfaceMethodNotImplemented {
                            class: ctx.class(class_id).class.name.to_string(),
                            interface: iface_name.to_string(),
                            method: method_name.to_string(),
                        }
                        .into());
                    }
                }
                Trait::Property { name: prop_name, getter, setter } => {
                    if let Some(getter) = getter {
                        let base_sig = ctx.method(getter.method).signature.clone();
                        if !ancestor_chain_implements(ctx, class_id, prop_name, AccessorKind::Getter, &base_sig) {
                            return Err(TypeSystemError::InterfaceMethodNotImplemented {
                                class: ctx.class(class_id).class.name.to_string(),
                                interface: iface_name.to_string(),
                                method: prop_name.to_string(),
                            }
                            .into());
                        }
                    }
                    if let Some(setter) = setter {
                        let base_sig = ctx.method(setter.method).signature.clone();
                        if !ancestor_chain_implements(ctx, class_id, prop_name, AccessorKind::Setter, &base_sig) {
                            return Err(TypeSystemError::InterfaceMethodNotImplemented {
                                class: ctx.class(class_id).class.name.to_string(),
                                interface: iface_name.to_string(),
                                method: prop_name.to_string(),
                            }
                            .into());
                        }
                    }
                }
                _ => continue,
            }
        }
    }
    Ok(())
}

/// Which half of a trait `ancestor_chain_implements` is looking for — a
/// plain method, or one specific accessor half of a property (getter and
/// setter are checked independently, per spec.md:273: a class may
/// implement only the half an interface actually declares).
#[derive(Clone, Copy, PartialEq, Eq)]
enum AccessorKind {
    Method,
    Getter,
    Setter,
}

/// Walks `class_id`'s ancestor chain looking for a trait that implements
/// `target` as `kind`, trying both the interface's own namespace and the
/// public namespace for the lookup (spec.md:271-272: an implementation may
/// be declared in either), and requiring the implementing method's
/// signature be override-compatible with the interface's (§8 scenarios
/// S3/S4).
fn ancestor_chain_implements(
    ctx: &CompilationContext,
    class_id: ClassId,
    target: &QName,
    kind: AccessorKind,
    base_sig: &MethodSignature,
) -> bool {
    let candidates = if target.namespace().is_public() {
        vec![target.clone()]
    } else {
        let public_name = QName::new(Namespace::public(), target.local_name().to_string());
        vec![target.clone(), public_name]
    };
    ancestor_chain_implements_among(ctx, class_id, &candidates, kind, base_sig)
}

fn ancestor_chain_implements_among(
    ctx: &CompilationContext,
    class_id: ClassId,
    candidates: &[QName],
    kind: AccessorKind,
    base_sig: &MethodSignature,
) -> bool {
    let mut current = Some(class_id);
    while let Some(id) = current {
        let entry = ctx.class(id);
        for &tid in &entry.class.instance_traits {
            let implementing_method = match (ctx.trait_(tid), kind) {
                (Trait::Method { name, method, .. }, AccessorKind::Method) if candidates.contains(name) => {
                    Some(*method)
                }
                (Trait::Property { name, getter, .. }, AccessorKind::Getter) if candidates.contains(name) => {
                    getter.as_ref().map(|a| a.method)
                }
                (Trait::Property { name, setter, .. }, AccessorKind::Setter) if candidates.contains(name) => {
                    setter.as_ref().map(|a| a.method)
                }
                _ => None,
            };
            if let Some(method_id) = implementing_method {
                let derived_sig = &ctx.method(method_id).signature;
                if derived_sig.is_override_compatible_with(base_sig) {
                    return true;
                }
            }
        }
        current = entry.class.super_class;
    }
    false
}

/// Pass 3 — Emission. This core does not itself write target-assembly
/// bytecode (that's the backend, out of scope); completing emission here
/// only means advancing the class past `TraitsCreated` so the scheduler
/// (§4.I) is allowed to queue its methods.
pub fn complete_emission(ctx: &mut CompilationContext, class_id: ClassId) {
    let _span = tracing::debug_span!("build_class", class = ?class_id, pass = "emission").entered();
    ctx.complete_emission(class_id);
}

/// Dedup key for synthetic catch-scope classes: either a single typed
/// variable slot, or no variable at all (§4.G).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CatchScopeShape {
    Typed(Option<ClassId>, String),
    NoVariable,
}

#[derive(Default)]
pub struct SyntheticClassCache {
    catch_scopes: FnvHashMap<CatchScopeShape, ClassId>,
    next_catch_scope_id: u64,
    next_activation_id: u64,
}

impl SyntheticClassCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns (or creates) the catch-scope class for `shape`, reusing an
    /// existing one with an identical shape across handlers (§4.G).
    pub fn get_or_create_catch_scope(
        &mut self,
        ctx: &mut CompilationContext,
        shape: CatchScopeShape,
    ) -> Result<ClassId> {
        if let Some(&id) = self.catch_scopes.get(&shape) {
            return Ok(id);
        }
        let n = self.next_catch_scope_id;
        self.next_catch_scope_id += 1;
        let mangled = crate::name::mangler::create_catch_scope_class_name(n);
        let id = build_definition(
            ctx,
            QName::new(crate::name::qname::Namespace::public(), mangled),
            ClassKind::CatchScope,
            ClassAttributes::SEALED,
            None,
            vec![],
        )?;
        self.catch_scopes.insert(shape, id);
        Ok(id)
    }

    /// Always creates a fresh activation class; activation shapes are
    /// essentially unique per method and are not deduplicated by the spec.
    pub fn create_activation_class(&mut self, ctx: &mut CompilationContext) -> Result<ClassId> {
        let n = self.next_activation_id;
        self.next_activation_id += 1;
        let mangled = crate::name::mangler::create_activation_class_name(n);
        build_definition(
            ctx,
            QName::new(crate::name::qname::Namespace::public(), mangled),
            ClassKind::Activation,
            ClassAttributes::SEALED,
            None,
            vec![],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_catch_scope_shapes_are_reused() {
        let mut ctx = CompilationContext::new();
        let mut cache = SyntheticClassCache::new();
        let shape_a = CatchScopeShape::Typed(None, "e".to_string());
        let shape_b = CatchScopeShape::Typed(None, "e".to_string());
        let a = cache.get_or_create_catch_scope(&mut ctx, shape_a).unwrap();
        let b = cache.get_or_create_catch_scope(&mut ctx, shape_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_catch_scope_shapes_are_not_shared() {
        let mut ctx = CompilationContext::new();
        let mut cache = SyntheticClassCache::new();
        let a = cache
            .get_or_create_catch_scope(&mut ctx, CatchScopeShape::NoVariable)
            .unwrap();
        let b = cache
            .get_or_create_catch_scope(&mut ctx, CatchScopeShape::Typed(None, "e".to_string()))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn interface_closure_deduplicates_shared_ancestors() {
        let mut ctx = CompilationContext::new();
        let base = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IBase"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let mid = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IMid"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![base],
        )
        .unwrap();

        let closure = compute_interface_closure(&[mid, base], &[], |id| {
            if id == mid {
                vec![base]
            } else {
                vec![]
            }
        });
        assert_eq!(closure.len(), 2);
    }

    #[test]
    fn build_definition_stores_the_transitive_interface_closure_on_the_class() {
        let mut ctx = CompilationContext::new();
        let base = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IBase"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let mid = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IMid"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![base],
        )
        .unwrap();
        let child = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "C"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![mid],
        )
        .unwrap();
        assert_eq!(ctx.class(child).class.interfaces, vec![mid, base]);
    }

    #[test]
    fn a_subclass_inherits_its_parents_interface_closure_without_redeclaring() {
        let mut ctx = CompilationContext::new();
        let iface = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IFoo"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let parent = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Base"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![iface],
        )
        .unwrap();
        let child = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Derived"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            Some(parent),
            vec![],
        )
        .unwrap();
        assert_eq!(ctx.class(child).class.interfaces, vec![iface]);
    }

    fn well_known(ctx: &mut CompilationContext) -> WellKnownTypes {
        let mut dummy = || {
            build_definition(
                ctx,
                QName::new(crate::name::qname::Namespace::public(), "Dummy"),
                ClassKind::Normal,
                ClassAttributes::empty(),
                None,
                vec![],
            )
            .unwrap()
        };
        WellKnownTypes {
            object: dummy(),
            int: dummy(),
            uint: dummy(),
            number: dummy(),
            string: dummy(),
            boolean: dummy(),
        }
    }

    fn no_rest_signature() -> crate::model::method::MethodSignature {
        crate::model::method::MethodSignature {
            params: smallvec::smallvec![],
            return_type: TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        }
    }

    fn raw_trait(name_idx: u32, attributes: TraitAttributes, kind: RawTraitKind) -> RawTrait {
        RawTrait {
            name: crate::abc::types::Index::new(name_idx),
            kind,
            attributes,
            metadata: vec![],
        }
    }

    fn name_from_index(idx: u32) -> QName {
        QName::new(crate::name::qname::Namespace::public(), format!("member{idx}"))
    }

    #[test]
    fn field_traits_resolve_their_declared_type_and_coerce_their_default() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);
        let raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Slot {
                slot_id: 1,
                type_name: crate::abc::types::Index::new(7),
                value_index: 0,
                value_kind: Some(RawTraitValueKind::Undefined),
            },
        )];
        let class_id = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "HasField"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let built = build_traits(
            &mut ctx,
            class_id,
            &raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| unreachable!("no methods declared"),
            |_| unreachable!("no class traits declared"),
            |_| Ok(TypeRef::Class(wk.int)),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();
        let trait_id = built.instance_traits[0];
        match ctx.trait_(trait_id) {
            Trait::Slot { type_ref, default, .. } => {
                assert_eq!(*type_ref, TypeRef::Class(wk.int));
                assert_eq!(*default, SlotDefault::Int(0));
            }
            other => panic!("expected a Slot trait, got {other:?}"),
        }
    }

    #[test]
    fn getter_and_setter_register_their_own_disp_ids_in_the_slot_map() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);
        let getter_method = ctx.alloc_method(no_rest_signature());
        let setter_method = ctx.alloc_method(no_rest_signature());
        let raw = vec![
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Getter {
                    disp_id: 3,
                    method: crate::abc::types::Index::new(1),
                },
            ),
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Setter {
                    disp_id: 4,
                    method: crate::abc::types::Index::new(2),
                },
            ),
        ];
        let class_id = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "HasProp"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let built = build_traits(
            &mut ctx,
            class_id,
            &raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |idx| Ok(if idx == 1 { getter_method } else { setter_method }),
            |_| unreachable!("no class traits declared"),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        // Both halves fuse into the one property trait, reachable from
        // either its getter's or its setter's disp-id.
        let property_trait = *built
            .instance_traits
            .iter()
            .find(|&&t| matches!(ctx.trait_(t), Trait::Property { .. }))
            .unwrap();
        assert_eq!(built.instance_traits.len(), 1);
        assert_eq!(built.member_slots.get_method_by_disp_id(3, false), Some(property_trait));
        assert_eq!(built.member_slots.get_method_by_disp_id(4, false), Some(property_trait));
        match ctx.trait_(property_trait) {
            Trait::Property { getter, setter, .. } => {
                assert_eq!(getter.as_ref().unwrap().method, getter_method);
                assert_eq!(setter.as_ref().unwrap().method, setter_method);
            }
            other => panic!("expected a Property trait, got {other:?}"),
        }
    }

    #[test]
    fn override_with_an_incompatible_signature_is_rejected() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);

        let base_method = ctx.alloc_method(no_rest_signature());
        let parent = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Base"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let parent_raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Method {
                disp_id: 1,
                method: crate::abc::types::Index::new(1),
            },
        )];
        let parent_built = build_traits(
            &mut ctx,
            parent,
            &parent_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(base_method),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let derived_method = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![crate::model::method::Param {
                type_ref: TypeRef::Any,
                name: None,
                default: None,
            }],
            return_type: TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        });
        let child = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Child"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            Some(parent),
            vec![],
        )
        .unwrap();
        let child_raw = vec![raw_trait(
            1,
            TraitAttributes::OVERRIDE,
            RawTraitKind::Method {
                disp_id: 1,
                method: crate::abc::types::Index::new(2),
            },
        )];
        let result = build_traits(
            &mut ctx,
            child,
            &child_raw,
            false,
            Some(&parent_built.member_slots),
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(derived_method),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        );
        assert!(matches!(
            result,
            Err(CompileError::TypeSystem(TypeSystemError::IllegalOverride { .. }))
        ));
    }

    #[test]
    fn an_override_with_a_mismatched_rest_argument_shape_records_a_stub() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);

        // The base declares `...rest`; needs_rest must match for the override
        // to be legal at all, but needs_arguments is not part of override
        // compatibility, so an override can legally flip it independently.
        let base_method = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![],
            return_type: TypeRef::Void,
            needs_rest: true,
            needs_arguments: false,
        });
        let parent = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Base"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let parent_raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Method {
                disp_id: 1,
                method: crate::abc::types::Index::new(1),
            },
        )];
        let parent_built = build_traits(
            &mut ctx,
            parent,
            &parent_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(base_method),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let derived_method = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![],
            return_type: TypeRef::Void,
            needs_rest: true,
            needs_arguments: false,
        });
        let child = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Child"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            Some(parent),
            vec![],
        )
        .unwrap();
        let child_raw = vec![raw_trait(
            1,
            TraitAttributes::OVERRIDE,
            RawTraitKind::Method {
                disp_id: 1,
                method: crate::abc::types::Index::new(2),
            },
        )];
        let built = build_traits(
            &mut ctx,
            child,
            &child_raw,
            false,
            Some(&parent_built.member_slots),
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(derived_method),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        assert_eq!(built.stubs.len(), 1);
        assert!(built.stubs[0].cause.rest_shape_differs);
        assert!(!built.stubs[0].cause.inherited_not_declared_locally);
    }

    #[test]
    fn verify_interface_implementations_flags_a_missing_method() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);

        let iface_method = ctx.alloc_method(no_rest_signature());
        let iface = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IRunnable"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let iface_raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Method {
                disp_id: 1,
                method: crate::abc::types::Index::new(1),
            },
        )];
        build_traits(
            &mut ctx,
            iface,
            &iface_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(iface_method),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let class_id = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "DoesNotImplement"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![iface],
        )
        .unwrap();
        build_traits(
            &mut ctx,
            class_id,
            &[],
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| unreachable!(),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let result = verify_interface_implementations(&ctx, class_id);
        assert!(matches!(
            result,
            Err(CompileError::TypeSystem(TypeSystemError::InterfaceMethodNotImplemented { .. }))
        ));
    }

    #[test]
    fn interfaces_reject_slot_and_class_traits() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);
        let iface = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IHasField"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Slot {
                slot_id: 1,
                type_name: crate::abc::types::Index::new(0),
                value_index: 0,
                value_kind: None,
            },
        )];
        let result = build_traits(
            &mut ctx,
            iface,
            &raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| unreachable!(),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        );
        assert!(matches!(
            result,
            Err(CompileError::TypeSystem(TypeSystemError::InterfaceContainsNonMethod { .. }))
        ));
    }

    #[test]
    fn interface_property_is_satisfied_by_a_matching_getter_and_setter() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);

        let iface_getter = ctx.alloc_method(no_rest_signature());
        let iface_setter = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![crate::model::method::Param {
                type_ref: TypeRef::Any,
                name: None,
                default: None,
            }],
            return_type: TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        });
        let iface = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IHasProp"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let iface_raw = vec![
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Getter {
                    disp_id: 1,
                    method: crate::abc::types::Index::new(1),
                },
            ),
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Setter {
                    disp_id: 2,
                    method: crate::abc::types::Index::new(2),
                },
            ),
        ];
        build_traits(
            &mut ctx,
            iface,
            &iface_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |idx| Ok(if idx == 1 { iface_getter } else { iface_setter }),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let impl_getter = ctx.alloc_method(no_rest_signature());
        let impl_setter = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![crate::model::method::Param {
                type_ref: TypeRef::Any,
                name: None,
                default: None,
            }],
            return_type: TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        });
        let class_id = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "Implements"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![iface],
        )
        .unwrap();
        let class_raw = vec![
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Getter {
                    disp_id: 1,
                    method: crate::abc::types::Index::new(1),
                },
            ),
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Setter {
                    disp_id: 2,
                    method: crate::abc::types::Index::new(2),
                },
            ),
        ];
        build_traits(
            &mut ctx,
            class_id,
            &class_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |idx| Ok(if idx == 1 { impl_getter } else { impl_setter }),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        assert!(verify_interface_implementations(&ctx, class_id).is_ok());
    }

    #[test]
    fn interface_property_missing_the_setter_half_is_flagged() {
        let mut ctx = CompilationContext::new();
        let wk = well_known(&mut ctx);

        let iface_getter = ctx.alloc_method(no_rest_signature());
        let iface_setter = ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![crate::model::method::Param {
                type_ref: TypeRef::Any,
                name: None,
                default: None,
            }],
            return_type: TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        });
        let iface = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "IHasProp"),
            ClassKind::Interface,
            ClassAttributes::empty(),
            None,
            vec![],
        )
        .unwrap();
        let iface_raw = vec![
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Getter {
                    disp_id: 1,
                    method: crate::abc::types::Index::new(1),
                },
            ),
            raw_trait(
                1,
                TraitAttributes::empty(),
                RawTraitKind::Setter {
                    disp_id: 2,
                    method: crate::abc::types::Index::new(2),
                },
            ),
        ];
        build_traits(
            &mut ctx,
            iface,
            &iface_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |idx| Ok(if idx == 1 { iface_getter } else { iface_setter }),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let impl_getter = ctx.alloc_method(no_rest_signature());
        let class_id = build_definition(
            &mut ctx,
            QName::new(crate::name::qname::Namespace::public(), "OnlyImplementsGetter"),
            ClassKind::Normal,
            ClassAttributes::empty(),
            None,
            vec![iface],
        )
        .unwrap();
        let class_raw = vec![raw_trait(
            1,
            TraitAttributes::empty(),
            RawTraitKind::Getter {
                disp_id: 1,
                method: crate::abc::types::Index::new(1),
            },
        )];
        build_traits(
            &mut ctx,
            class_id,
            &class_raw,
            false,
            None,
            &wk,
            |idx| Ok(name_from_index(idx)),
            |_| Ok(impl_getter),
            |_| unreachable!(),
            |_| Ok(TypeRef::Any),
            |_, _| DefaultValue::Undefined,
            |_, _| false,
        )
        .unwrap();

        let result = verify_interface_implementations(&ctx, class_id);
        assert!(matches!(
            result,
            Err(CompileError::TypeSystem(TypeSystemError::InterfaceMethodNotImplemented { .. }))
        ));
    }
}

//! Component A — Name Mangler.
//!
//! A pure function from AVM2 `QName`s to target-assembly identifiers. No
//! state is kept here: the only invariant this module owns is that two
//! distinct inputs never collide, and that every identifier it produces is
//! disjoint from anything an AVM2 script could itself name (it reserves a
//! namespace prefix no user-expressible URI can produce).
use crate::name::qname::{Namespace, NamespaceKind, QName};

/// Prefix for every synthetic/internal identifier this module emits.
/// AVM2 namespace URIs are arbitrary UTF-8 strings the author controls, but
/// they can never contain the `$` sigil immediately after a mangled
/// namespace-kind tag, because we escape any literal `$` in the source URI
/// before emitting it (see `mangle_namespace`).
const INTERNAL_TAG: &str = "$$";

fn escape_identifier_chars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            // Escape anything else (including '.', '$', ':', '/') as a
            // stable hex run so two different inputs can never produce the
            // same escaped output by accident of adjacency, and so a literal
            // '_' in the source never collides with an escaped '.'.
            out.push_str(&format!("_x{:04x}_", c as u32));
        }
    }
    out
}

fn mangle_namespace(ns: &Namespace) -> String {
    let kind_tag = match ns.kind() {
        NamespaceKind::Namespace => "ns",
        NamespaceKind::Package => "pkg",
        NamespaceKind::PackageInternal => "internal",
        NamespaceKind::Protected => "protected",
        NamespaceKind::Explicit => "explicit",
        NamespaceKind::StaticProtected => "staticprotected",
        NamespaceKind::Private => "private",
    };
    match ns.private_id() {
        Some(id) => format!(
            "{kind_tag}_{id}_{}",
            escape_identifier_chars(ns.uri())
        ),
        None => format!("{kind_tag}_{}", escape_identifier_chars(ns.uri())),
    }
}

fn mangle_qname(name: &QName) -> String {
    if name.namespace().is_public() {
        escape_identifier_chars(name.local_name())
    } else {
        format!(
            "{}__{}",
            mangle_namespace(name.namespace()),
            escape_identifier_chars(name.local_name())
        )
    }
}

/// Mangles a field/method target-assembly member name.
pub fn create_name(name: &QName) -> String {
    mangle_qname(name)
}

/// Mangles a property getter's backing method name.
pub fn create_getter_name(name: &QName) -> String {
    format!("get_{}", mangle_qname(name))
}

/// Mangles a property setter's backing method name.
pub fn create_setter_name(name: &QName) -> String {
    format!("set_{}", mangle_qname(name))
}

/// Mangles a class/interface's target-assembly type name.
pub fn create_type_name(name: &QName) -> String {
    mangle_qname(name)
}

/// Mangles the n-th captured-scope container type's name. `n` is a
/// monotonically increasing id assigned by the `ScopeFactory`, not a
/// structural signature, so the name alone has no semantic meaning; it only
/// needs to be unique.
pub fn create_scope_container_name(n: u64) -> String {
    format!("{INTERNAL_TAG}ScopeContainer_{n}")
}

/// Mangles a catch-scope synthetic class's name.
pub fn create_catch_scope_class_name(n: u64) -> String {
    format!("{INTERNAL_TAG}CatchScope_{n}")
}

/// Mangles an activation-object synthetic class's name.
pub fn create_activation_class_name(n: u64) -> String {
    format!("{INTERNAL_TAG}Activation_{n}")
}

/// Mangles a synthesized name for an anonymous function (`newfunction`
/// with no enclosing named method, or a closure reused across call sites).
pub fn create_anon_function_name(n: u64) -> String {
    format!("{INTERNAL_TAG}AnonFunction_{n}")
}

/// Mangles a per-script container type's name.
pub fn create_script_container_name(n: u64) -> String {
    format!("{INTERNAL_TAG}Script_{n}")
}

/// Mangles a stub method's name, for the override/base pair described in
/// §4.H. The base type's mangled name and member name are both folded in so
/// that two distinct (type, member) pairs can never collide even if `n`
/// were ever reused (it currently is not: stub names are always qualified
/// by their declaring type as well).
pub fn create_method_impl_stub_name(base_type: &QName, base_member: &QName) -> String {
    format!(
        "{INTERNAL_TAG}Stub__{}__{}",
        mangle_qname(base_type),
        mangle_qname(base_member)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(kind: NamespaceKind, uri: &str) -> Namespace {
        Namespace::new(kind, uri)
    }

    #[test]
    fn public_names_are_unprefixed() {
        let q = QName::new(Namespace::public(), "MovieClip");
        assert_eq!(create_name(&q), "MovieClip");
    }

    #[test]
    fn distinct_namespaces_never_collide() {
        let a = QName::new(ns(NamespaceKind::Package, "flash.display"), "Loader");
        let b = QName::new(ns(NamespaceKind::Package, "flash.net"), "Loader");
        assert_ne!(create_name(&a), create_name(&b));
    }

    #[test]
    fn private_namespaces_with_equal_uri_but_different_id_never_collide() {
        let a = QName::new(Namespace::new_private("frame", 1), "x");
        let b = QName::new(Namespace::new_private("frame", 2), "x");
        assert_ne!(create_name(&a), create_name(&b));
    }

    #[test]
    fn accessor_names_never_collide_with_plain_member_names() {
        let q = QName::new(Namespace::public(), "foo");
        let getter = create_getter_name(&q);
        let plain = create_name(&q);
        assert_ne!(getter, plain);
    }

    #[test]
    fn escaping_cannot_forge_the_internal_tag() {
        // A user namespace containing literal '$' characters must not be
        // able to produce a string indistinguishable from a synthetic name.
        let q = QName::new(ns(NamespaceKind::Package, "$$evil"), "x");
        let mangled = create_name(&q);
        assert!(!mangled.starts_with(INTERNAL_TAG));
    }

    #[test]
    fn dot_and_underscore_never_collide() {
        let a = QName::new(Namespace::public(), "a.b");
        let b = QName::new(Namespace::public(), "a_b");
        assert_ne!(create_name(&a), create_name(&b));
    }

    #[test]
    fn synthetic_families_are_mutually_disjoint_by_construction() {
        let scope = create_scope_container_name(1);
        let catch = create_catch_scope_class_name(1);
        let activation = create_activation_class_name(1);
        assert_ne!(scope, catch);
        assert_ne!(scope, activation);
        assert_ne!(catch, activation);
    }
}

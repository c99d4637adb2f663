//! Component E — Constant Pool.
//!
//! Seven interned sets plus a flattened namespace-set pool. Every
//! `get_index_*` call interns its argument (or returns the existing index)
//! and the pool never forgets or shrinks for the lifetime of a
//! `CompilationContext`; emission order and the static-initializer
//! algorithm described in §4.E live in `emit_static_initializer_plan`
//! rather than at intern time, since interning order is insertion order but
//! emission deliberately walks pools in reverse.

use crate::model::class::ClassId;
use crate::model::trait_def::TraitId;
use crate::name::qname::{Namespace, QName};
use indexmap::IndexSet;

/// A stable index into one of the constant pool's arrays, assigned at
/// intern time and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceSetIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegexSlotIndex(pub u32);

fn intern<T: std::hash::Hash + Eq>(set: &mut IndexSet<T>, value: T) -> ConstIndex {
    let (idx, _) = set.insert_full(value);
    ConstIndex(idx as u32)
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    classes: IndexSet<ClassId>,
    traits: IndexSet<TraitId>,
    internal_namespaces: IndexSet<Namespace>,
    public_namespaces: IndexSet<Namespace>,
    internal_qnames: IndexSet<QName>,
    public_qnames: IndexSet<QName>,
    namespace_sets: IndexSet<Vec<ConstIndex>>,
    /// Regex slots are not deduplicated: each `newregex` opcode site gets
    /// its own slot even if pattern+flags repeat, matching how the ABC
    /// `newregex` opcode is positional rather than constant-pool-indexed
    /// for this purpose. Left unconstructed (`None`) until first use; see
    /// §4.E step 5.
    regex_slots: Vec<(String, String)>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_index_class(&mut self, class: ClassId) -> ConstIndex {
        intern(&mut self.classes, class)
    }

    pub fn get_index_trait(&mut self, trait_id: TraitId) -> ConstIndex {
        intern(&mut self.traits, trait_id)
    }

    pub fn get_index_namespace(&mut self, ns: Namespace) -> ConstIndex {
        intern(&mut self.internal_namespaces, ns)
    }

    pub fn get_index_namespace_language_visible(&mut self, ns: Namespace) -> ConstIndex {
        intern(&mut self.public_namespaces, ns)
    }

    pub fn get_index_qname(&mut self, name: QName) -> ConstIndex {
        intern(&mut self.internal_qnames, name)
    }

    pub fn get_index_qname_language_visible(&mut self, name: QName) -> ConstIndex {
        intern(&mut self.public_qnames, name)
    }

    /// Flattens `namespaces` to their interned namespace indices first (so
    /// a namespace referenced only via a set is still uniformly indexed),
    /// then interns the resulting index sequence.
    pub fn add_namespace_set(&mut self, namespaces: Vec<Namespace>) -> NamespaceSetIndex {
        let flattened: Vec<ConstIndex> = namespaces
            .into_iter()
            .map(|ns| self.get_index_namespace(ns))
            .collect();
        let (idx, _) = self.namespace_sets.insert_full(flattened);
        NamespaceSetIndex(idx as u32)
    }

    pub fn add_regexp_slot(&mut self, pattern: String, flags: String) -> RegexSlotIndex {
        self.regex_slots.push((pattern, flags));
        RegexSlotIndex(self.regex_slots.len() as u32 - 1)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
    pub fn trait_count(&self) -> usize {
        self.traits.len()
    }
    pub fn namespace_count(&self) -> usize {
        self.internal_namespaces.len()
    }
    pub fn public_namespace_count(&self) -> usize {
        self.public_namespaces.len()
    }
    pub fn qname_count(&self) -> usize {
        self.internal_qnames.len()
    }
    pub fn public_qname_count(&self) -> usize {
        self.public_qnames.len()
    }
    pub fn namespace_set_count(&self) -> usize {
        self.namespace_sets.len()
    }
    pub fn regex_slot_count(&self) -> usize {
        self.regex_slots.len()
    }

    /// Describes the five-step static-initializer emission plan from
    /// §4.E, in order. The finalizer's backend call sequences its emitted
    /// instructions to match; this core does not itself write bytecode.
    pub fn static_initializer_steps(&self) -> [StaticInitStep; 5] {
        [
            StaticInitStep::AllocateArrays {
                namespaces: self.internal_namespaces.len() + self.public_namespaces.len(),
                qnames: self.internal_qnames.len() + self.public_qnames.len(),
                namespace_sets: self.namespace_sets.len(),
                classes: self.classes.len(),
                traits: self.traits.len(),
                regex_slots: self.regex_slots.len(),
            },
            StaticInitStep::InitNamespacesReverse,
            StaticInitStep::InitQNamesReverse,
            StaticInitStep::InitNamespaceSets {
                scratch_size: self
                    .namespace_sets
                    .iter()
                    .map(|set| set.len())
                    .max()
                    .unwrap_or(0),
            },
            StaticInitStep::LeaveRegexSlotsNull,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
pub enum StaticInitStep {
    AllocateArrays {
        namespaces: usize,
        qnames: usize,
        namespace_sets: usize,
        classes: usize,
        traits: usize,
        regex_slots: usize,
    },
    InitNamespacesReverse,
    InitQNamesReverse,
    InitNamespaceSets {
        scratch_size: usize,
    },
    LeaveRegexSlotsNull,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::qname::NamespaceKind;

    #[test]
    fn interning_the_same_namespace_twice_returns_the_same_index() {
        let mut pool = ConstantPool::new();
        let a = pool.get_index_namespace(Namespace::new(NamespaceKind::Package, "flash.display"));
        let b = pool.get_index_namespace(Namespace::new(NamespaceKind::Package, "flash.display"));
        assert_eq!(a, b);
        assert_eq!(pool.namespace_count(), 1);
    }

    #[test]
    fn distinct_namespaces_get_distinct_indices() {
        let mut pool = ConstantPool::new();
        let a = pool.get_index_namespace(Namespace::new(NamespaceKind::Package, "a"));
        let b = pool.get_index_namespace(Namespace::new(NamespaceKind::Package, "b"));
        assert_ne!(a, b);
    }

    #[test]
    fn regex_slots_are_never_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.add_regexp_slot("foo".into(), "g".into());
        let b = pool.add_regexp_slot("foo".into(), "g".into());
        assert_ne!(a, b);
        assert_eq!(pool.regex_slot_count(), 2);
    }

    #[test]
    fn namespace_set_scratch_size_is_the_largest_set() {
        let mut pool = ConstantPool::new();
        pool.add_namespace_set(vec![Namespace::new(NamespaceKind::Package, "a")]);
        pool.add_namespace_set(vec![
            Namespace::new(NamespaceKind::Package, "b"),
            Namespace::new(NamespaceKind::Package, "c"),
        ]);
        let steps = pool.static_initializer_steps();
        match steps[3] {
            StaticInitStep::InitNamespaceSets { scratch_size } => assert_eq!(scratch_size, 2),
            _ => panic!("expected InitNamespaceSets step"),
        }
    }
}

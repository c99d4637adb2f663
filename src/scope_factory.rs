//! Component C — Captured-Scope Factory.
//!
//! Canonicalizes `CapturedScope` shapes into deduplicated container types.
//! The factory itself only owns the dedup cache and the shape description;
//! actual class/field/method handle creation is the caller's job (the
//! `CompilationContext`, via the Name Mangler and the backend), since this
//! module has no access to the class arena and must stay a pure,
//! independently testable piece per the spec's component boundary.

use crate::model::scope::{CapturedScope, CapturedScopeItem, ScopeId};
use fnv::FnvHashMap;

/// The bind-options mask computed per captured item when the container's
/// lazy runtime-scope-stack method constructs the stack (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOptions {
    pub search_traits: bool,
    pub search_prototype: bool,
    pub search_dynamic: bool,
}

impl BindOptions {
    fn for_item(item: &CapturedScopeItem, is_with_scope: bool) -> Self {
        match item {
            CapturedScopeItem::Global => Self {
                search_traits: true,
                search_prototype: true,
                search_dynamic: true,
            },
            _ if is_with_scope => Self {
                search_traits: true,
                search_prototype: false,
                search_dynamic: true,
            },
            _ => Self {
                search_traits: true,
                search_prototype: false,
                search_dynamic: false,
            },
        }
    }
}

/// One field slot of a captured-scope container, in stack order
/// (outermost/earliest-pushed first).
#[derive(Debug, Clone)]
pub struct ContainerField {
    pub item: CapturedScopeItem,
    pub bind_options: BindOptions,
}

/// The full shape a container type must implement: its fields plus the
/// lazy runtime-scope-stack field/method pair every container carries
/// regardless of item count.
#[derive(Debug, Clone)]
pub struct ContainerShape {
    pub id: ScopeId,
    pub mangled_name: String,
    pub fields: Vec<ContainerField>,
}

/// Dedup key for the factory's cache: the captured items alone are not
/// enough, since two calls can share an identical `CapturedScope` but differ
/// in which positions are *with*-scopes (§8 property 1's key is `(tag,
/// class, with-flag)` per item, not just the item sequence).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopeCacheKey {
    items: CapturedScope,
    with_flags: Vec<bool>,
}

impl ScopeCacheKey {
    fn new(items: &CapturedScope, with_scope_positions: &[usize]) -> Self {
        let with_flags = (0..items.0.len())
            .map(|i| with_scope_positions.contains(&i))
            .collect();
        Self {
            items: items.clone(),
            with_flags,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScopeFactory {
    cache: FnvHashMap<ScopeCacheKey, ScopeId>,
    shapes: slotmap::SecondaryMap<ScopeId, ContainerShape>,
    arena: slotmap::SlotMap<ScopeId, ()>,
    next_name_counter: u64,
}

pub enum ContainerLookup<'a> {
    Existing(&'a ContainerShape),
    Created(&'a ContainerShape),
}

impl ScopeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the container for `items`, creating and caching it on a
    /// dedup miss. `with_scope_items` names which of `items`'s positions
    /// (by index) are *with*-scopes, for the bind-options computation;
    /// everything else is treated as a plain scope push.
    pub fn get_container_for(
        &mut self,
        items: CapturedScope,
        with_scope_positions: &[usize],
        mangle: impl FnOnce(u64) -> String,
    ) -> ContainerLookup<'_> {
        let key = ScopeCacheKey::new(&items, with_scope_positions);
        if let Some(&id) = self.cache.get(&key) {
            return ContainerLookup::Existing(&self.shapes[id]);
        }

        let id = self.arena.insert(());
        let n = self.next_name_counter;
        self.next_name_counter += 1;

        let fields = items
            .0
            .iter()
            .enumerate()
            .map(|(i, item)| ContainerField {
                item: item.clone(),
                bind_options: BindOptions::for_item(item, with_scope_positions.contains(&i)),
            })
            .collect();

        let shape = ContainerShape {
            id,
            mangled_name: mangle(n),
            fields,
        };
        self.shapes.insert(id, shape);
        self.cache.insert(key, id);
        ContainerLookup::Created(&self.shapes[id])
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::mangler::create_scope_container_name;

    fn scope(items: Vec<CapturedScopeItem>) -> CapturedScope {
        CapturedScope::from(items)
    }

    #[test]
    fn structurally_equal_sequences_dedup_to_one_container() {
        let mut factory = ScopeFactory::new();
        let a = scope(vec![CapturedScopeItem::Global]);
        let b = scope(vec![CapturedScopeItem::Global]);

        let id_a = match factory.get_container_for(a, &[], create_scope_container_name) {
            ContainerLookup::Created(shape) => shape.id,
            ContainerLookup::Existing(_) => panic!("expected first call to create"),
        };
        let id_b = match factory.get_container_for(b, &[], create_scope_container_name) {
            ContainerLookup::Existing(shape) => shape.id,
            ContainerLookup::Created(_) => panic!("expected second call to hit the cache"),
        };
        assert_eq!(id_a, id_b);
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn structurally_distinct_sequences_never_share() {
        let mut factory = ScopeFactory::new();
        factory.get_container_for(
            scope(vec![CapturedScopeItem::Global]),
            &[],
            create_scope_container_name,
        );
        factory.get_container_for(
            scope(vec![CapturedScopeItem::Global, CapturedScopeItem::Global]),
            &[],
            create_scope_container_name,
        );
        assert_eq!(factory.len(), 2);
    }

    #[test]
    fn with_scope_items_get_search_dynamic_but_not_prototype() {
        let mut factory = ScopeFactory::new();
        let class_id = {
            let mut arena: slotmap::SlotMap<crate::model::class::ClassId, ()> =
                slotmap::SlotMap::with_key();
            arena.insert(())
        };
        let shape = match factory.get_container_for(
            scope(vec![CapturedScopeItem::ScopeObject(class_id)]),
            &[0],
            create_scope_container_name,
        ) {
            ContainerLookup::Created(shape) => shape,
            ContainerLookup::Existing(_) => unreachable!(),
        };
        assert!(shape.fields[0].bind_options.search_dynamic);
        assert!(!shape.fields[0].bind_options.search_prototype);
    }

    #[test]
    fn identical_items_with_different_with_flags_are_not_shared() {
        let mut factory = ScopeFactory::new();
        let class_id = {
            let mut arena: slotmap::SlotMap<crate::model::class::ClassId, ()> =
                slotmap::SlotMap::with_key();
            arena.insert(())
        };
        let id_plain = match factory.get_container_for(
            scope(vec![CapturedScopeItem::ScopeObject(class_id)]),
            &[],
            create_scope_container_name,
        ) {
            ContainerLookup::Created(shape) => shape.id,
            ContainerLookup::Existing(_) => panic!("expected first call to create"),
        };
        let id_with = match factory.get_container_for(
            scope(vec![CapturedScopeItem::ScopeObject(class_id)]),
            &[0],
            create_scope_container_name,
        ) {
            ContainerLookup::Created(shape) => shape.id,
            ContainerLookup::Existing(_) => panic!("expected distinct with-flags to miss the cache"),
        };
        assert_ne!(id_plain, id_with);
        assert_eq!(factory.len(), 2);
    }
}

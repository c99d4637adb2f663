//! Component B — Slot Map.
//!
//! A per-class index from `(slot-or-disp-id, staticness)` to the trait or
//! method occupying it. IDs are 1-based in the ABC sense; `addParentSlots`
//! seeds a derived class's instance half from its parent before the
//! derived class's own trait pass runs, so a derived class's own
//! `tryAddSlot` calls only ever contend against its own declarations.

use crate::model::trait_def::TraitId;
use fnv::FnvHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SlotKey {
    id: u32,
    is_static: bool,
}

/// A method occupying a disp-id, distinct from a field/const/class-alias
/// trait occupying a slot-id: both id spaces are 1-based and independent,
/// but disp-ids are only ever assigned to `Method`/`Getter`/`Setter`
/// traits, so the slot map keeps two separate tables rather than unioning
/// them under one key type.
#[derive(Debug, Default, Clone)]
pub struct SlotMap {
    slots: FnvHashMap<SlotKey, TraitId>,
    methods: FnvHashMap<SlotKey, TraitId>,
}

impl SlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` without modifying the map if `slot_id` is
    /// non-positive or already occupied for this staticness.
    pub fn try_add_slot(&mut self, slot_id: i32, is_static: bool, trait_id: TraitId) -> bool {
        if slot_id <= 0 {
            return false;
        }
        let key = SlotKey {
            id: slot_id as u32,
            is_static,
        };
        if self.slots.contains_key(&key) {
            return false;
        }
        self.slots.insert(key, trait_id);
        true
    }

    pub fn try_add_method(&mut self, disp_id: i32, is_static: bool, trait_id: TraitId) -> bool {
        if disp_id <= 0 {
            return false;
        }
        let key = SlotKey {
            id: disp_id as u32,
            is_static,
        };
        if self.methods.contains_key(&key) {
            return false;
        }
        self.methods.insert(key, trait_id);
        true
    }

    pub fn get_slot(&self, slot_id: u32, is_static: bool) -> Option<TraitId> {
        self.slots
            .get(&SlotKey {
                id: slot_id,
                is_static,
            })
            .copied()
    }

    pub fn get_method_by_disp_id(&self, disp_id: u32, is_static: bool) -> Option<TraitId> {
        self.methods
            .get(&SlotKey {
                id: disp_id,
                is_static,
            })
            .copied()
    }

    /// Copies only the *instance* entries of `parent` into `self`. Called
    /// once, before a derived class's own trait pass assigns any of its
    /// own slots, so inherited slot ids are visible to `get_slot` even
    /// though the derived class never re-declares them.
    pub fn add_parent_slots(&mut self, parent: &SlotMap) {
        for (key, trait_id) in parent.slots.iter().filter(|(k, _)| !k.is_static) {
            self.slots.entry(*key).or_insert(*trait_id);
        }
        for (key, trait_id) in parent.methods.iter().filter(|(k, _)| !k.is_static) {
            self.methods.entry(*key).or_insert(*trait_id);
        }
    }
}

//! Component D — Helper Emitter.
//!
//! Three lazily-created variadic helper families, each keyed by arity.
//! Nothing here emits target-assembly code directly (that is the backend's
//! job via the handles this module hands out); this module only owns the
//! bookkeeping of which arities have been synthesized and enforces the
//! per-family arity cap that sends callers back to open-coded emission.

/// Above this arity, callers open-code the array/object/args construction
/// themselves instead of calling a shared helper, to avoid the helper
/// ballooning to one branch per supported arity.
const MAX_HELPER_ARITY: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HelperHandle {
    pub family: HelperFamily,
    pub arity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperFamily {
    /// Builds an array from the top `arity` stack values.
    NewArray,
    /// Builds an object from `arity` key/value pairs; pairs are consumed
    /// in top-down stack order so the bottom-most pair (pushed first, i.e.
    /// closest to the object's start in source order) wins on duplicate
    /// keys, matching ABC `newobject` semantics.
    NewObject,
    /// Packs `arity` any-typed values into a dense array, used to adapt a
    /// fixed-arity ABC call into a `...rest`-style call.
    ArgArray,
}

#[derive(Debug, Default)]
pub struct HelperEmitter {
    created: std::collections::HashSet<HelperHandle>,
}

/// Whether an arity is within a helper family's cap, or the caller must
/// open-code the construction inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperLookup {
    Shared(HelperHandle),
    OpenCode,
}

impl HelperEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle to use for constructing an array literal of
    /// `arity` elements. Marks the helper as needing emission on first use;
    /// subsequent calls at the same arity are free (the backend emits the
    /// container type containing every requested helper exactly once,
    /// lazily, on first use of *any* arity in that family — see
    /// `pending_for_emission`).
    pub fn new_array(&mut self, arity: u32) -> HelperLookup {
        self.lookup(HelperFamily::NewArray, arity)
    }

    pub fn new_object(&mut self, arity: u32) -> HelperLookup {
        self.lookup(HelperFamily::NewObject, arity)
    }

    pub fn arg_array(&mut self, arity: u32) -> HelperLookup {
        self.lookup(HelperFamily::ArgArray, arity)
    }

    fn lookup(&mut self, family: HelperFamily, arity: u32) -> HelperLookup {
        if arity > MAX_HELPER_ARITY {
            return HelperLookup::OpenCode;
        }
        let handle = HelperHandle { family, arity };
        self.created.insert(handle);
        HelperLookup::Shared(handle)
    }

    /// All helpers requested so far, for the backend to emit once when the
    /// helper container type is first materialized.
    pub fn pending_for_emission(&self) -> impl Iterator<Item = &HelperHandle> {
        self.created.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arities_within_cap_return_shared_handles() {
        let mut helpers = HelperEmitter::new();
        match helpers.new_array(3) {
            HelperLookup::Shared(h) => {
                assert_eq!(h.family, HelperFamily::NewArray);
                assert_eq!(h.arity, 3);
            }
            HelperLookup::OpenCode => panic!("expected a shared helper"),
        }
    }

    #[test]
    fn arities_above_cap_fall_back_to_open_coding() {
        let mut helpers = HelperEmitter::new();
        assert_eq!(helpers.new_array(MAX_HELPER_ARITY + 1), HelperLookup::OpenCode);
    }

    #[test]
    fn helpers_are_created_lazily_and_only_once_per_arity() {
        let mut helpers = HelperEmitter::new();
        assert!(helpers.is_empty());
        helpers.new_object(2);
        helpers.new_object(2);
        assert_eq!(helpers.pending_for_emission().count(), 1);
    }

    #[test]
    fn distinct_families_do_not_collide_at_the_same_arity() {
        let mut helpers = HelperEmitter::new();
        helpers.new_array(2);
        helpers.arg_array(2);
        assert_eq!(helpers.pending_for_emission().count(), 2);
    }
}

//! The captured-scope shape used by the Captured-Scope Factory (§4.C) to
//! decide whether two `newfunction` sites (or a method and its closures)
//! can share a single generated container type.

use smallvec::SmallVec;

use crate::model::class::ClassId;

slotmap::new_key_type! {
    /// A stable id for a synthesized captured-scope container class. Note
    /// this is distinct from `ClassId`: the container's own `ClassId` is
    /// allocated once its shape is known, and `ScopeId` is the dedup key
    /// the factory's cache is keyed on (see `crate::scope_factory`).
    pub struct ScopeId;
}

/// One level of a method's static scope chain, at the granularity the
/// target platform needs to reconstruct it without a live AVM2 scope
/// stack: not the runtime value pushed, but what *kind* of thing was
/// pushed and, where it matters for field access, its static type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapturedScopeItem {
    /// The global object of the script that defines this method.
    Global,
    /// A class object pushed by `pushscope` inside a class initializer's
    /// capture (e.g. a nested class referencing an outer one).
    Class(ClassId),
    /// The enclosing instance (`this`) of an instance method's closure.
    Instance(ClassId),
    /// A `with`-style scope object of statically known type.
    ScopeObject(ClassId),
    /// The activation object of an enclosing method that `NEED_ACTIVATION`s.
    Activation(ClassId),
    /// A synthetic catch-scope object for an enclosing `catch` block.
    CatchScope(ClassId),
}

/// A full captured-scope shape: the ordered sequence of scope-stack
/// entries a closure needs captured at its creation site, outermost first.
///
/// Two closures whose `CapturedScope`s are equal can always share one
/// generated container type and one runtime-scope-stack reconstruction
/// routine (§8 "scope-closure reuse"). Backed by a `SmallVec` rather than a
/// plain `Vec`: a real scope chain rarely exceeds a handful of levels
/// (`max_scope_depth` in a `method_body` is a `u8`-range value in practice),
/// so most captured scopes fit inline without a heap allocation per
/// `newfunction` site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapturedScope(pub SmallVec<[CapturedScopeItem; 4]>);

impl CapturedScope {
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<CapturedScopeItem>> for CapturedScope {
    fn from(items: Vec<CapturedScopeItem>) -> Self {
        Self(SmallVec::from_vec(items))
    }
}

impl FromIterator<CapturedScopeItem> for CapturedScope {
    fn from_iter<I: IntoIterator<Item = CapturedScopeItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

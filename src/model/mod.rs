//! The resolved type/trait graph the compiler builds up as it walks an ABC
//! file's class and script pools.
//!
//! Everything here is addressed by stable, generation-checked keys
//! (`slotmap::new_key_type!`) rather than by raw ABC pool index or by
//! pointer, per the arena-of-stable-ids approach: a single owner
//! (`CompilationContext`) holds the arenas, and every other component only
//! ever holds a key into them.

pub mod class;
pub mod method;
pub mod scope;
pub mod trait_def;

pub use class::{Class, ClassAttributes, ClassId, ClassKind};
pub use method::{MethodId, MethodSignature, Param, TypeRef};
pub use scope::{CapturedScope, CapturedScopeItem, ScopeId};
pub use trait_def::{Trait, TraitId};

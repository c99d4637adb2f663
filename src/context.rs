//! The per-compile `CompilationContext`: the single owner bundling the
//! class/trait/method arenas, the per-class state machine, and the
//! lock-guarded shared collaborators (constant pool, helper emitter,
//! scope factory, global stager).
//!
//! Per §9's design notes, there is no ambient static state: everything
//! lives in one context value created at the start of a compile and
//! dropped at the end (successful or not). A fresh context is created per
//! ABC file (§3 "Lifetimes").

use std::sync::Mutex;

use slotmap::SecondaryMap;

use crate::constant_pool::ConstantPool;
use crate::error::{CompileError, Result};
use crate::helpers::HelperEmitter;
use crate::model::class::{Class, ClassId};
use crate::model::method::{MethodId, MethodSignature};
use crate::model::trait_def::{Trait, TraitId};
use crate::scope_factory::ScopeFactory;
use crate::slots::SlotMap as MemberSlotMap;

/// A class's position in the state machine from §3. Re-entry into a
/// `*Creating` state for the same class is a definition cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    Init,
    DefCreating,
    DefCreated,
    TraitsCreating,
    TraitsCreated,
    TraitsEmitted,
}

pub struct ClassEntry {
    pub class: Class,
    pub state: ClassState,
    pub member_slots: MemberSlotMap,
    /// Set once via `Compiler::set_class_captured_scope` (§6). Kept here
    /// rather than on `Class` itself for the same reason `state` is: it is
    /// a fact about this compile's progress, not the class's structural
    /// shape.
    pub captured_scope: Option<crate::model::scope::ScopeId>,
}

pub struct MethodEntry {
    pub signature: MethodSignature,
    /// Set once the method's captured scope (if any) has been established
    /// via `setClassCapturedScope`/`createNewFunction` (§6).
    pub captured_scope: Option<crate::model::scope::ScopeId>,
}

/// The collaborators that require the context-level lock in parallel mode
/// (§5): constant-pool interning, helper-emitter lazy creation, closure
/// enqueueing, and captured-scope dedup all funnel through here.
#[derive(Default)]
pub struct SharedState {
    pub constant_pool: ConstantPool,
    pub helpers: HelperEmitter,
    pub scope_factory: ScopeFactory,
    pub closure_worklist: Vec<MethodId>,
}

pub struct CompilationContext {
    classes: slotmap::SlotMap<ClassId, ()>,
    class_data: SecondaryMap<ClassId, ClassEntry>,
    methods: slotmap::SlotMap<MethodId, ()>,
    method_data: SecondaryMap<MethodId, MethodEntry>,
    traits: slotmap::SlotMap<TraitId, Trait>,
    shared: Mutex<SharedState>,
    diagnostics: Mutex<Vec<crate::diagnostics::Diagnostic>>,
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompilationContext {
    pub fn new() -> Self {
        Self {
            classes: slotmap::SlotMap::with_key(),
            class_data: SecondaryMap::new(),
            methods: slotmap::SlotMap::with_key(),
            method_data: SecondaryMap::new(),
            traits: slotmap::SlotMap::with_key(),
            shared: Mutex::new(SharedState::default()),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn alloc_class(&mut self, class: Class) -> ClassId {
        let id = self.classes.insert(());
        self.class_data.insert(
            id,
            ClassEntry {
                class,
                state: ClassState::Init,
                member_slots: MemberSlotMap::new(),
                captured_scope: None,
            },
        );
        id
    }

    pub fn alloc_method(&mut self, signature: MethodSignature) -> MethodId {
        let id = self.methods.insert(());
        self.method_data.insert(
            id,
            MethodEntry {
                signature,
                captured_scope: None,
            },
        );
        id
    }

    pub fn alloc_trait(&mut self, t: Trait) -> TraitId {
        self.traits.insert(t)
    }

    pub fn class(&self, id: ClassId) -> &ClassEntry {
        &self.class_data[id]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassEntry {
        &mut self.class_data[id]
    }

    pub fn method(&self, id: MethodId) -> &MethodEntry {
        &self.method_data[id]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodEntry {
        &mut self.method_data[id]
    }

    pub fn trait_(&self, id: TraitId) -> &Trait {
        &self.traits[id]
    }

    /// Acquires the single context-level lock for the duration of `f`.
    /// Elided in single-thread mode only in the sense that there is never
    /// contention, not that the lock is skipped — a real mutex is always
    /// taken, matching the spec's "coarse but fine enough" design (§9).
    pub fn with_shared<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        let mut guard = self.shared.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub fn push_diagnostic(&self, d: crate::diagnostics::Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(d);
    }

    pub fn diagnostics(&self) -> Vec<crate::diagnostics::Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Transitions `id` from `Init` to `DefCreating`; fails if `id` is
    /// already mid-definition (a cycle) or past `Init`.
    pub fn begin_def(&mut self, id: ClassId) -> Result<()> {
        let entry = self.class_mut(id);
        match entry.state {
            ClassState::Init => {
                entry.state = ClassState::DefCreating;
                Ok(())
            }
            ClassState::DefCreating => Err(CompileError::Reentrancy(entry.class.name.to_string())),
            _ => Ok(()),
        }
    }

    pub fn complete_def(&mut self, id: ClassId) {
        let entry = self.class_mut(id);
        debug_assert_eq!(entry.state, ClassState::DefCreating);
        entry.state = ClassState::DefCreated;
    }

    pub fn begin_traits(&mut self, id: ClassId) -> Result<()> {
        let entry = self.class_mut(id);
        match entry.state {
            ClassState::DefCreated => {
                entry.state = ClassState::TraitsCreating;
                Ok(())
            }
            ClassState::TraitsCreating => Err(CompileError::Reentrancy(entry.class.name.to_string())),
            _ => Ok(()),
        }
    }

    pub fn complete_traits(&mut self, id: ClassId) {
        let entry = self.class_mut(id);
        debug_assert_eq!(entry.state, ClassState::TraitsCreating);
        entry.state = ClassState::TraitsCreated;
    }

    pub fn complete_emission(&mut self, id: ClassId) {
        let entry = self.class_mut(id);
        debug_assert_eq!(entry.state, ClassState::TraitsCreated);
        entry.state = ClassState::TraitsEmitted;
    }

    pub fn class_state(&self, id: ClassId) -> ClassState {
        self.class_data[id].state
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}

//! The compiler facade — §6 "Outputs (exposed to collaborators)".
//!
//! Every lettered component (A-J) is independently testable and knows
//! nothing about the others beyond the narrow types it's handed. Something
//! still has to be the caller that owns a `CompilationContext`, a
//! `GlobalTraitStager`, and a `SyntheticClassCache` together and exposes the
//! named operations §6 promises the backend (the per-method IR/codegen
//! collaborator) and the host driver. That's this module: it wires
//! existing pieces together rather than reimplementing any of them.

use fnv::FnvHashMap;

use crate::backend::{AssemblyLoader, EntityHandle, MethodCompiler, TypeSignatureHandle};
use crate::class_builder::{CatchScopeShape, SyntheticClassCache};
use crate::context::CompilationContext;
use crate::error::{CompileError, NameResolutionError, NewFunctionError, Result};
use crate::finalizer::{self, AssemblyImage, ScriptEntryPoint};
use crate::global_stager::{ApplicationDomain, GlobalTraitStager};
use crate::model::class::ClassId;
use crate::model::method::MethodId;
use crate::model::scope::{CapturedScope, ScopeId};
use crate::model::trait_def::{Trait, TraitId};
use crate::name::mangler;
use crate::name::qname::{NamespaceSet, QName};
use crate::options::CompilerOptions;
use crate::scheduler::{CompilationScheduler, ScheduledMethod};

/// §4.I "Closure-method reuse": remembers which `CapturedScope` a given ABC
/// `method_info` was last compiled as a closure against. A second
/// `newfunction` referencing the same `method_info` reuses the already
/// compiled method only if the two captured scopes match exactly;
/// otherwise the compile fails with `newfunction-scope-mismatch` (§7, §8
/// item 8).
#[derive(Default)]
struct ClosureReuseTable {
    by_method_info: FnvHashMap<u32, (MethodId, CapturedScope)>,
}

/// The single object a host driver (and, through the seams it exposes, the
/// backend) interacts with for the lifetime of one compile. Bundles:
/// - the class/trait/method arena and state machine (`CompilationContext`),
/// - the global name-resolution table (`GlobalTraitStager`, component F),
/// - the synthetic catch-scope/activation class cache (component G), and
/// - the `newfunction` closure-reuse table (§4.I).
///
/// `CompilationScheduler` (component I) and the finalizer (component J) are
/// not held as fields — they are stateless beyond the context they
/// borrow, so `finish_compilation_and_load` constructs them on the fly.
pub struct Compiler {
    pub ctx: CompilationContext,
    pub stager: GlobalTraitStager,
    pub synthetic_classes: SyntheticClassCache,
    pub options: CompilerOptions,
    closures: ClosureReuseTable,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            ctx: CompilationContext::new(),
            stager: GlobalTraitStager::new(),
            synthetic_classes: SyntheticClassCache::new(),
            options,
            closures: ClosureReuseTable::default(),
        }
    }

    /// `getEntityHandle` for a class (§6).
    pub fn get_entity_handle_class(&self, id: ClassId) -> EntityHandle {
        EntityHandle::Class(id)
    }

    /// `getEntityHandle` for a field/method/property trait (§6).
    pub fn get_entity_handle_trait(&self, id: TraitId) -> EntityHandle {
        EntityHandle::Trait(id)
    }

    /// `getEntityHandle` for a method or constructor (§6).
    pub fn get_entity_handle_method(&self, id: MethodId) -> EntityHandle {
        EntityHandle::Method(id)
    }

    /// `getTypeSignature` (§6): the resolved signature of a method or
    /// constructor, opaque to the backend beyond what it needs to build a
    /// call instruction's operand.
    pub fn get_type_signature(&self, method: MethodId) -> TypeSignatureHandle {
        TypeSignatureHandle(self.ctx.method(method).signature.clone())
    }

    /// `getTypeSigForOptionalParam` (§6): the same signature, requested at
    /// a call site where the backend is specifically deciding whether
    /// stub-necessity disjunct (iv) applies (§4.H) — an override
    /// declaring a plain default where the base declared the same
    /// parameter via an optional-wrapper type. The signature itself is not
    /// recomputed; this accessor exists so the backend's intent at the
    /// call site (asking about the optional-wrapper view specifically) is
    /// legible without a second, structurally different type.
    pub fn get_type_sig_for_optional_param(&self, method: MethodId) -> TypeSignatureHandle {
        self.get_type_signature(method)
    }

    /// `getGlobalTraitByQName` (§6).
    pub fn get_global_trait_by_qname(
        &self,
        name: &QName,
        no_inherited: bool,
        domain: &dyn ApplicationDomain,
    ) -> Option<TraitId> {
        self.stager.lookup_by_qname(name, no_inherited, domain)
    }

    /// `getGlobalTraitByMultiname` (§6): resolves a local name against a
    /// namespace set, surfacing `ambiguous-name-match` when requested and
    /// recording a diagnostic instead when not (§9 Open Questions).
    pub fn get_global_trait_by_multiname(
        &mut self,
        local_name: &str,
        namespace_set: &NamespaceSet,
        no_inherited: bool,
        domain: &dyn ApplicationDomain,
        throw_on_ambiguous: bool,
    ) -> Result<Option<TraitId>> {
        self.stager
            .lookup_by_local_name(local_name, namespace_set, no_inherited, domain, throw_on_ambiguous)
            .map_err(CompileError::from)
    }

    /// `getClassByMultiname` (§6): like `getGlobalTraitByMultiname`, but
    /// requires the resolved trait to be a class alias and unwraps it to
    /// the underlying `ClassId`, failing with `class-not-found` otherwise.
    pub fn get_class_by_multiname(
        &mut self,
        local_name: &str,
        namespace_set: &NamespaceSet,
        domain: &dyn ApplicationDomain,
    ) -> Result<ClassId> {
        let trait_id = self
            .get_global_trait_by_multiname(local_name, namespace_set, false, domain, true)?
            .ok_or_else(|| NameResolutionError::ClassNotFound(local_name.to_string()))?;
        match self.ctx.trait_(trait_id) {
            Trait::Class { class, .. } => Ok(*class),
            _ => Err(NameResolutionError::ClassNotFound(local_name.to_string()).into()),
        }
    }

    /// `createCatchScopeClass` (§6, §4.G): returns or reuses the synthetic
    /// class for a given caught-exception binding shape.
    pub fn create_catch_scope_class(&mut self, shape: CatchScopeShape) -> Result<ClassId> {
        self.synthetic_classes.get_or_create_catch_scope(&mut self.ctx, shape)
    }

    /// `createActivationClass` (§6, §4.G): always synthesizes a fresh
    /// activation class; shapes are not deduplicated across methods.
    pub fn create_activation_class(&mut self) -> Result<ClassId> {
        self.synthetic_classes.create_activation_class(&mut self.ctx)
    }

    fn intern_scope(&mut self, items: CapturedScope, with_scope_positions: &[usize]) -> ScopeId {
        self.ctx.with_shared(|shared| {
            match shared
                .scope_factory
                .get_container_for(items, with_scope_positions, mangler::create_scope_container_name)
            {
                crate::scope_factory::ContainerLookup::Existing(shape) => shape.id,
                crate::scope_factory::ContainerLookup::Created(shape) => shape.id,
            }
        })
    }

    /// `setClassCapturedScope` (§6): establishes (or reuses, via the
    /// Captured-Scope Factory's dedup) the captured-scope container a
    /// class's instance methods close over.
    pub fn set_class_captured_scope(
        &mut self,
        class: ClassId,
        items: CapturedScope,
        with_scope_positions: &[usize],
    ) -> ScopeId {
        let scope_id = self.intern_scope(items, with_scope_positions);
        self.ctx.class_mut(class).captured_scope = Some(scope_id);
        scope_id
    }

    /// `createNewFunction` (§6): resolves an ABC `newfunction` opcode site
    /// to a `MethodId`, applying the closure-reuse rule from §4.I. On a
    /// fresh `method_info`, establishes its captured scope and enqueues it
    /// onto the scoped-closure worklist the scheduler's phase 4 drains.
    pub fn create_new_function(
        &mut self,
        method_info: u32,
        method: MethodId,
        captured_scope: CapturedScope,
        with_scope_positions: &[usize],
    ) -> Result<MethodId> {
        if let Some((existing_method, existing_scope)) = self.closures.by_method_info.get(&method_info) {
            return if *existing_scope == captured_scope {
                Ok(*existing_method)
            } else {
                Err(NewFunctionError::ScopeMismatch(method_info).into())
            };
        }

        let scope_id = self.intern_scope(captured_scope.clone(), with_scope_positions);
        self.ctx.method_mut(method).captured_scope = Some(scope_id);
        self.closures
            .by_method_info
            .insert(method_info, (method, captured_scope));
        self.ctx.with_shared(|shared| shared.closure_worklist.push(method));
        Ok(method)
    }

    /// `finishCompilationAndLoad` (§6, §4.J): runs the scheduler to
    /// completion, then the finalizer's load/backpatch/commit/run sequence.
    /// `image` and `loader` stand in for the backend's assembly writer and
    /// the host's loader, both out of this core's scope; this method only
    /// sequences the calls. The staged-globals list handed to the finalizer
    /// comes from draining `self.stager` directly — the caller has no other
    /// way to produce it, since the stager is the only thing that ever
    /// populates it (§4.F/§4.J).
    #[allow(clippy::too_many_arguments)]
    pub fn finish_compilation_and_load(
        &mut self,
        method_compiler: &dyn MethodCompiler,
        script_inits: Vec<ScheduledMethod>,
        static_inits: Vec<ScheduledMethod>,
        instance_and_static_methods: Vec<ScheduledMethod>,
        closure_queue: Vec<ScheduledMethod>,
        image: AssemblyImage,
        loader: &dyn AssemblyLoader,
        domain: &mut dyn ApplicationDomain,
        entry_points: Vec<ScriptEntryPoint>,
    ) -> Result<()> {
        let scheduler =
            CompilationScheduler::new(&self.ctx, method_compiler, self.options.parallel_compile_threads);
        scheduler.run(script_inits, static_inits, instance_and_static_methods, closure_queue)?;

        let _loaded = finalizer::load_and_validate(&image, loader)?;
        let staged_globals = self.stager.drain_staged();
        finalizer::commit_staged_globals(staged_globals, domain);
        finalizer::run_entry_points(entry_points, self.options.script_initializer_run_mode)?;
        Ok(())
    }
}

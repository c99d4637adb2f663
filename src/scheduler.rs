//! Component I — Compilation Scheduler.
//!
//! Orders method-body compilation into the four strictly-ordered phases
//! from §4.I, running each phase either sequentially or across a bounded
//! `rayon` thread pool. The scheduler itself never compiles a method body
//! — it only drives calls into the host-supplied `MethodCompiler` (§6)
//! with the correct role flags and enforces the happens-before barrier
//! between phases.

use crate::backend::{CompileRoleFlags, EntityHandle, MethodCompiler};
use crate::context::CompilationContext;
use crate::error::{CompileError, Result};
use crate::model::method::MethodId;
use crate::model::scope::ScopeId;

/// One unit of scheduled work: a method plus the captured scope (if any)
/// it should be compiled against, and which phase/role it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledMethod {
    pub method: MethodId,
    pub captured_scope: Option<ScopeId>,
    pub role: CompileRoleFlags,
}

pub struct CompilationScheduler<'a> {
    ctx: &'a CompilationContext,
    compiler: &'a dyn MethodCompiler,
    pool_width: usize,
}

impl<'a> CompilationScheduler<'a> {
    pub fn new(ctx: &'a CompilationContext, compiler: &'a dyn MethodCompiler, pool_width: usize) -> Self {
        Self {
            ctx,
            compiler,
            pool_width,
        }
    }

    fn run_phase(&self, work: Vec<ScheduledMethod>) -> Result<Vec<MethodId>> {
        let method_count = work.len();
        tracing::info!(method_count, parallel = self.pool_width > 1, "phase starting");

        if self.pool_width <= 1 {
            let mut discovered = Vec::new();
            for item in work {
                self.compile_one(item, &mut discovered)?;
            }
            tracing::info!(method_count, discovered = discovered.len(), "phase finished");
            return Ok(discovered);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool_width)
            .build()
            .map_err(|e| CompileError::MethodCompilerFailed {
                method: "<pool-init>".to_string(),
                message: e.to_string(),
            })?;

        // Each worker compiles into its own method builder handle, so
        // results only need merging for (a) the first fatal error, and
        // (b) newly-discovered closures, both collected without any
        // ordering requirement across workers (§5 "Outputs merge
        // deterministically").
        let results: Vec<Result<Vec<MethodId>>> = pool.install(|| {
            use rayon::prelude::*;
            work.into_par_iter()
                .map(|item| {
                    let mut discovered = Vec::new();
                    self.compile_one(item, &mut discovered)?;
                    Ok(discovered)
                })
                .collect()
        });

        let mut discovered = Vec::new();
        let mut first_error = None;
        let mut extra_errors = 0usize;
        for result in results {
            match result {
                Ok(mut closures) => discovered.append(&mut closures),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        extra_errors += 1;
                    }
                }
            }
        }
        if let Some(e) = first_error {
            if extra_errors > 0 {
                self.ctx.push_diagnostic(crate::diagnostics::Diagnostic::WorkerErrorsDiscarded {
                    count: extra_errors,
                });
            }
            return Err(e);
        }
        tracing::info!(method_count, discovered = discovered.len(), "phase finished");
        Ok(discovered)
    }

    fn compile_one(&self, item: ScheduledMethod, discovered: &mut Vec<MethodId>) -> Result<()> {
        tracing::trace!(method = ?item.method, role = ?item.role, "compiling method");
        self.compiler.compile(
            item.method,
            item.captured_scope,
            EntityHandle::Method(item.method),
            item.role,
        )?;
        self.ctx.with_shared(|shared| {
            discovered.extend(shared.closure_worklist.drain(..));
        });
        Ok(())
    }

    /// Runs phases 1-3, then repeatedly drains phase 4 (scoped closures
    /// discovered along the way) until empty, per §4.I.
    pub fn run(
        &self,
        script_inits: Vec<ScheduledMethod>,
        static_inits: Vec<ScheduledMethod>,
        instance_and_static_methods: Vec<ScheduledMethod>,
        mut closure_queue: Vec<ScheduledMethod>,
    ) -> Result<()> {
        let mut discovered = self.run_phase(script_inits)?;
        discovered.extend(self.run_phase(static_inits)?);
        discovered.extend(self.run_phase(instance_and_static_methods)?);

        loop {
            let mut batch: Vec<ScheduledMethod> = std::mem::take(&mut closure_queue);
            batch.extend(discovered.drain(..).map(|method| ScheduledMethod {
                method,
                captured_scope: None,
                role: CompileRoleFlags::SCOPED_CLOSURE,
            }));
            if batch.is_empty() {
                break;
            }
            discovered = self.run_phase(batch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCompiler {
        calls: AtomicUsize,
    }
    impl MethodCompiler for CountingCompiler {
        fn compile(
            &self,
            _method_or_ctor: MethodId,
            _captured_scope: Option<ScopeId>,
            _output: EntityHandle,
            _flags: CompileRoleFlags,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fake_method_id(ctx: &mut CompilationContext) -> MethodId {
        ctx.alloc_method(crate::model::method::MethodSignature {
            params: smallvec::smallvec![],
            return_type: crate::model::method::TypeRef::Void,
            needs_rest: false,
            needs_arguments: false,
        })
    }

    #[test]
    fn sequential_mode_compiles_every_scheduled_method() {
        let mut ctx = CompilationContext::new();
        let m1 = fake_method_id(&mut ctx);
        let m2 = fake_method_id(&mut ctx);
        let compiler = CountingCompiler {
            calls: AtomicUsize::new(0),
        };
        let scheduler = CompilationScheduler::new(&ctx, &compiler, 1);
        scheduler
            .run(
                vec![ScheduledMethod {
                    method: m1,
                    captured_scope: None,
                    role: CompileRoleFlags::SCRIPT_INIT,
                }],
                vec![],
                vec![ScheduledMethod {
                    method: m2,
                    captured_scope: None,
                    role: CompileRoleFlags::INSTANCE_METHOD,
                }],
                vec![],
            )
            .unwrap();
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
    }

    /// A compiler that, on its first call, enqueues one synthetic closure
    /// onto the shared worklist (simulating a `newfunction` found while
    /// compiling a script or class static initializer), then counts every
    /// call it receives afterward.
    struct ClosureDiscoveringCompiler<'a> {
        ctx: &'a CompilationContext,
        closure: MethodId,
        calls: AtomicUsize,
        enqueued: std::sync::atomic::AtomicBool,
    }
    impl<'a> MethodCompiler for ClosureDiscoveringCompiler<'a> {
        fn compile(
            &self,
            _method_or_ctor: MethodId,
            _captured_scope: Option<ScopeId>,
            _output: EntityHandle,
            _flags: CompileRoleFlags,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.enqueued.swap(true, Ordering::SeqCst) {
                self.ctx.with_shared(|shared| shared.closure_worklist.push(self.closure));
            }
            Ok(())
        }
    }

    #[test]
    fn closures_discovered_during_script_or_static_init_phases_are_still_compiled() {
        let mut ctx = CompilationContext::new();
        let script_init = fake_method_id(&mut ctx);
        let closure = fake_method_id(&mut ctx);
        let compiler = ClosureDiscoveringCompiler {
            ctx: &ctx,
            closure,
            calls: AtomicUsize::new(0),
            enqueued: std::sync::atomic::AtomicBool::new(false),
        };
        let scheduler = CompilationScheduler::new(&ctx, &compiler, 1);
        scheduler
            .run(
                vec![ScheduledMethod {
                    method: script_init,
                    captured_scope: None,
                    role: CompileRoleFlags::SCRIPT_INIT,
                }],
                vec![],
                vec![],
                vec![],
            )
            .unwrap();
        // The script-init call plus the discovered closure's own compile call.
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
    }

    struct FailingCompiler;
    impl MethodCompiler for FailingCompiler {
        fn compile(
            &self,
            _method_or_ctor: MethodId,
            _captured_scope: Option<ScopeId>,
            _output: EntityHandle,
            _flags: CompileRoleFlags,
        ) -> Result<()> {
            Err(CompileError::MethodCompilerFailed {
                method: "m".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    #[test]
    fn a_phase_failure_propagates_as_a_fatal_error() {
        let mut ctx = CompilationContext::new();
        let m1 = fake_method_id(&mut ctx);
        let compiler = FailingCompiler;
        let scheduler = CompilationScheduler::new(&ctx, &compiler, 1);
        let result = scheduler.run(
            vec![ScheduledMethod {
                method: m1,
                captured_scope: None,
                role: CompileRoleFlags::SCRIPT_INIT,
            }],
            vec![],
            vec![],
            vec![],
        );
        assert!(result.is_err());
    }
}

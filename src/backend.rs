//! §6 External Interfaces.
//!
//! The seams this core calls through (or is called through) without owning
//! the other side's implementation: the per-method IR/codegen compiler,
//! the application domain, and the assembly loader. None of these traits
//! are implemented in this crate; a host wires in its own backend.

use bitflags::bitflags;

use crate::error::{CompileError, LoaderError};
use crate::model::class::ClassId;
use crate::model::method::MethodId;
use crate::model::scope::ScopeId;
use crate::model::trait_def::TraitId;

/// A stable handle to a class, trait (field/method/property), or method,
/// usable by the backend while building instruction operands. In this
/// core these coincide exactly with the arena keys already used
/// internally — the handle *is* the key — since there is no separate
/// backend-private id space to bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityHandle {
    Class(ClassId),
    Trait(TraitId),
    Method(MethodId),
}

/// A resolved method/constructor signature, opaque to the backend beyond
/// what it needs to build a call or field-access instruction.
#[derive(Debug, Clone)]
pub struct TypeSignatureHandle(pub crate::model::method::MethodSignature);

bitflags! {
    /// Which of §4.I's four roles a method being compiled plays. Exactly
    /// one of the first three bits is set for a top-level compile; the
    /// fourth is set for scoped-closure compiles queued during the first
    /// three phases.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CompileRoleFlags: u8 {
        const SCRIPT_INIT     = 1 << 0;
        const STATIC_INIT     = 1 << 1;
        const INSTANCE_METHOD = 1 << 2;
        const SCOPED_CLOSURE  = 1 << 3;
    }
}

/// The per-method bytecode-to-target compiler (§1's non-core collaborator,
/// referenced here only via its contract). Reads bytecode through this
/// core's `AbcFile` accessors and writes a verified method body into
/// `output` via the backend's own API (out of scope here).
pub trait MethodCompiler {
    fn compile(
        &self,
        method_or_ctor: MethodId,
        captured_scope: Option<ScopeId>,
        output: EntityHandle,
        flags: CompileRoleFlags,
    ) -> Result<(), CompileError>;
}

/// Identity fields of an assembly, used to validate that a caller-supplied
/// loader actually returned the assembly this core just asked it to load
/// (§4.J, §7 `custom-loader-rejected`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    pub name: String,
    pub version: String,
    pub module_version_id: String,
}

/// An opaque, already-loaded assembly. This core never inspects its
/// contents beyond identity comparison; everything else is the loader's
/// and backend's business.
pub trait LoadedAssembly {
    fn identity(&self) -> AssemblyIdentity;
}

/// Loads a serialized assembly image. The default loader (used when the
/// host does not supply `CompilerOptions::assembly_loader`) is expected to
/// hand the bytes to the platform's own module loader.
pub trait AssemblyLoader {
    fn load(&self, image: &[u8]) -> Result<Box<dyn LoadedAssembly>, LoaderError>;
}

/// Verifies a loader's returned assembly matches what was emitted,
/// surfacing `custom-loader-rejected` on mismatch (§4.J).
pub fn validate_loaded_identity(
    expected: &AssemblyIdentity,
    loaded: &dyn LoadedAssembly,
) -> Result<(), LoaderError> {
    let got = loaded.identity();
    if &got == expected {
        Ok(())
    } else {
        Err(LoaderError::CustomLoaderRejected {
            expected: expected.name.clone(),
            got: got.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeAssembly(AssemblyIdentity);
    impl LoadedAssembly for FakeAssembly {
        fn identity(&self) -> AssemblyIdentity {
            self.0.clone()
        }
    }

    #[test]
    fn matching_identity_validates() {
        let expected = AssemblyIdentity {
            name: "a".into(),
            version: "1.0".into(),
            module_version_id: "abc".into(),
        };
        let loaded = FakeAssembly(expected.clone());
        assert!(validate_loaded_identity(&expected, &loaded).is_ok());
    }

    #[test]
    fn mismatched_identity_is_rejected() {
        let expected = AssemblyIdentity {
            name: "a".into(),
            version: "1.0".into(),
            module_version_id: "abc".into(),
        };
        let loaded = FakeAssembly(AssemblyIdentity {
            name: "b".into(),
            ..expected.clone()
        });
        assert!(validate_loaded_identity(&expected, &loaded).is_err());
    }
}

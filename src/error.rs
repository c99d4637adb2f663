//! Stable, structured compile errors.
//!
//! Every error kind named in the core's design carries the data needed to
//! reproduce the failing input; none of them are stringly-typed catch-alls.
//! All of them are fatal to the current compile (see `CompilationContext`).

use crate::name::qname::QName;
use thiserror::Error;

/// Structural problems found while walking an ABC file's pools.
#[derive(Debug, Error)]
pub enum AbcStructureError {
    #[error("method_info {0} has more than one method_body entry")]
    MethodMultipleBodies(u32),

    #[error("method_info {0} has no method_body entry and is not native")]
    MethodMissingBody(u32),

    #[error("method_info {0} is native but declares a method_body entry")]
    MethodNoBodyAllowed(u32),

    #[error("method_info {0} was already assigned to a different method handle")]
    MethodInfoAlreadyAssigned(u32),

    #[error("trait `{0}` has an invalid or unsupported trait kind")]
    InvalidTraitKind(String),

    #[error("slot id {slot_id} is already occupied on class `{class}`")]
    SlotIdTaken { class: String, slot_id: u32 },

    #[error("class `{0}` participates in a definition cycle")]
    ClassCircularReference(String),

    #[error("a runtime-qualified multiname was used where only a compile-time name is allowed")]
    RuntimeNameInvalid,

    #[error("exception handler variable name `{0}` is not a valid identifier")]
    ExceptionVarInvalidName(String),

    #[error("method `{0}` declares required parameters after an optional one, which is not allowed")]
    NoRequiredParamsAllowed(String),
}

/// Name-resolution failures while staging or looking up traits.
#[derive(Debug, Error)]
pub enum NameResolutionError {
    #[error("`{0}` is already defined")]
    AlreadyDefined(QName),

    #[error("class `{0}` could not be found")]
    ClassNotFound(String),

    #[error("multiname `{0}` matched more than one binding and no policy resolved the conflict")]
    AmbiguousNameMatch(String),

    #[error("`{0}` cannot be used with a type application (not generic)")]
    NonGenericTypeApplication(String),

    #[error("type application for `{class}` expected {expected} argument(s), found {found}")]
    TypeArgumentCountIncorrect {
        class: String,
        expected: usize,
        found: usize,
    },

    #[error("applyType was used on a non-class value")]
    ApplyTypeNonClass,
}

/// Type-system violations discovered while building the class/trait graph.
#[derive(Debug, Error)]
pub enum TypeSystemError {
    #[error("class `{class}` cannot extend `{base}` because it is final or an interface")]
    CannotExtendClass { class: String, base: String },

    #[error("class `{class}` cannot implement `{interface}`")]
    CannotImplementInterface { class: String, interface: String },

    #[error("instance class traits are not allowed (found on class `{0}`)")]
    InstanceClassTrait(String),

    #[error("interface `{interface}` declares a non-method trait `{trait_name}`")]
    InterfaceContainsNonMethod {
        interface: String,
        trait_name: String,
    },

    #[error("method `{derived}` is not a legal override of `{base}`")]
    IllegalOverride { derived: String, base: String },

    #[error("default value for parameter `{param}` of `{method}` cannot be coerced to its declared type")]
    IllegalDefaultValue { method: String, param: String },

    #[error("class `{class}` does not implement interface method `{interface}.{method}`")]
    InterfaceMethodNotImplemented {
        class: String,
        interface: String,
        method: String,
    },
}

/// Errors raised while resolving `newfunction` closures.
#[derive(Debug, Error)]
pub enum NewFunctionError {
    #[error("method_info {0} referenced by newfunction is not a valid closure method")]
    InvalidMethod(u32),

    #[error("method_info {0} was already compiled as a closure with a different captured scope")]
    ScopeMismatch(u32),
}

/// Errors raised by the caller-supplied assembly loader.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("the supplied loader returned an assembly whose identity does not match the emitted image (expected `{expected}`, got `{got}`)")]
    CustomLoaderRejected { expected: String, got: String },
}

/// The single error type surfaced across the public API of this crate.
///
/// Every narrower error above converts into this via `#[from]`, mirroring
/// the teacher's pattern of a single top-level `Error` enum that application
/// code matches on without needing to know which subsystem raised it.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Structure(#[from] AbcStructureError),

    #[error(transparent)]
    NameResolution(#[from] NameResolutionError),

    #[error(transparent)]
    TypeSystem(#[from] TypeSystemError),

    #[error(transparent)]
    NewFunction(#[from] NewFunctionError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Re-entry into a `*_CREATING` state for the same class (see
    /// `CompilationContext`'s state machine).
    #[error("class `{0}` was re-entered while already being built (definition cycle)")]
    Reentrancy(String),

    /// An error raised by the per-method IR/codegen collaborator (§6).
    #[error("method compilation failed for `{method}`: {message}")]
    MethodCompilerFailed { method: String, message: String },

    /// Aggregated worker panics/errors from the parallel scheduler (§5); only
    /// the first structured `CompileError` among them is kept, the rest are
    /// summarized by count so they are not silently lost.
    #[error("{0} additional worker error(s) were discarded after the first fatal error")]
    AdditionalWorkerErrors(usize),
}

pub type Result<T> = std::result::Result<T, CompileError>;

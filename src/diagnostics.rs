//! Non-fatal compile diagnostics.
//!
//! Everything in `crate::error` is fatal to the compile that raised it; this
//! module is for the one designed-but-flagged exception in §9's Open
//! Questions — an ambiguous multiname lookup without `throwOnAmbiguous`
//! silently returns `None` rather than failing, but the context still
//! records it so a caller who cares can inspect `diagnostics()` afterward.

use crate::name::qname::QName;

#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// A multiname lookup matched in both the staging table and the
    /// application domain, in different namespaces, and the caller did not
    /// request a hard failure on ambiguity.
    AmbiguousLookupSuppressed { local_name: String },
    /// A class or trait carried metadata this compiler does not interpret;
    /// recorded so tooling can report on unused metadata without this
    /// failing the compile.
    UnrecognizedMetadata { owner: QName, tag: String },
    /// A parallel scheduler phase (§4.I/§5) raised more than one worker
    /// error; only the first is ever surfaced as the fatal `CompileError`,
    /// the rest are summarized here by count rather than silently lost.
    WorkerErrorsDiscarded { count: usize },
}

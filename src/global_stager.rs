//! Component F — Global Trait Stager.
//!
//! A two-level name-resolution table: this compile's staging table, backed
//! by the host application domain through the `ApplicationDomain` seam
//! (§6). The domain itself is out of core scope — only the trait boundary
//! this module calls through is specified here.

use crate::diagnostics::Diagnostic;
use crate::error::NameResolutionError;
use crate::model::trait_def::TraitId;
use crate::name::qname::{Namespace, NamespaceSet, QName};
use fnv::FnvHashMap;

/// §6 "Application domain": `lookupGlobalTrait` / `tryDefineGlobalTrait`.
/// Implemented by the host; this crate never constructs one itself.
pub trait ApplicationDomain {
    fn lookup_global_trait(&self, name: &QName, no_inherited: bool) -> Option<TraitId>;
    fn try_define_global_trait(&mut self, name: QName, trait_id: TraitId, hide_from_parent: bool) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Fail,
    UseChild,
    UseParent,
}

/// Identifies which ABC script staged a given name, so same-script
/// redefinitions can be told apart from cross-script ones (the former
/// always fails regardless of policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptOrigin(pub u32);

#[derive(Debug, Clone)]
struct StagedEntry {
    trait_id: TraitId,
    origin: ScriptOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    Defined,
    RejectedKeptExisting,
}

#[derive(Debug, Default)]
pub struct GlobalTraitStager {
    staging: FnvHashMap<QName, StagedEntry>,
    diagnostics: Vec<Diagnostic>,
}

impl GlobalTraitStager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        name: QName,
        trait_id: TraitId,
        origin: ScriptOrigin,
        domain: &mut dyn ApplicationDomain,
        policy: ConflictResolution,
    ) -> Result<DefineOutcome, NameResolutionError> {
        if let Some(existing) = self.staging.get(&name) {
            if existing.origin == origin {
                return Err(NameResolutionError::AlreadyDefined(name));
            }
            return match policy {
                ConflictResolution::Fail => Err(NameResolutionError::AlreadyDefined(name)),
                ConflictResolution::UseChild => {
                    self.staging.insert(name, StagedEntry { trait_id, origin });
                    Ok(DefineOutcome::Defined)
                }
                ConflictResolution::UseParent => Ok(DefineOutcome::RejectedKeptExisting),
            };
        }

        if domain.lookup_global_trait(&name, false).is_some() {
            return match policy {
                ConflictResolution::Fail => Err(NameResolutionError::AlreadyDefined(name)),
                ConflictResolution::UseChild => {
                    self.staging.insert(
                        name.clone(),
                        StagedEntry { trait_id, origin },
                    );
                    domain.try_define_global_trait(name, trait_id, true);
                    Ok(DefineOutcome::Defined)
                }
                ConflictResolution::UseParent => Ok(DefineOutcome::RejectedKeptExisting),
            };
        }

        self.staging.insert(name, StagedEntry { trait_id, origin });
        Ok(DefineOutcome::Defined)
    }

    pub fn lookup_by_qname(
        &self,
        name: &QName,
        no_inherited: bool,
        domain: &dyn ApplicationDomain,
    ) -> Option<TraitId> {
        if let Some(entry) = self.staging.get(name) {
            return Some(entry.trait_id);
        }
        if no_inherited {
            return None;
        }
        domain.lookup_global_trait(name, no_inherited)
    }

    /// Multiname-style lookup: `local_name` paired with a candidate
    /// `NamespaceSet`. If more than one namespace in the set yields a
    /// match (across staging + domain combined), the result is ambiguous;
    /// per §9's recorded Open Question, an unthrown ambiguity returns
    /// `None` and records a diagnostic rather than silently picking one.
    pub fn lookup_by_local_name(
        &mut self,
        local_name: &str,
        namespace_set: &NamespaceSet,
        no_inherited: bool,
        domain: &dyn ApplicationDomain,
        throw_on_ambiguous: bool,
    ) -> Result<Option<TraitId>, NameResolutionError> {
        let mut matches: Vec<(Namespace, TraitId)> = Vec::new();
        for ns in namespace_set.iter() {
            let qname = QName::new(ns.clone(), local_name);
            if let Some(trait_id) = self.lookup_by_qname(&qname, no_inherited, domain) {
                matches.push((ns.clone(), trait_id));
            }
        }
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0].1)),
            _ => {
                if throw_on_ambiguous {
                    Err(NameResolutionError::AmbiguousNameMatch(local_name.to_string()))
                } else {
                    tracing::warn!(
                        local_name,
                        candidates = matches.len(),
                        "ambiguous multiname match suppressed, returning None"
                    );
                    self.diagnostics.push(Diagnostic::AmbiguousLookupSuppressed {
                        local_name: local_name.to_string(),
                    });
                    Ok(None)
                }
            }
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Drains the staging table, returning every name this compile staged
    /// together with its trait, for `Finalizer::commit_staged_globals`
    /// (§4.J) to push into the application domain. Takes the table empty so
    /// a stager is never committed twice.
    pub fn drain_staged(&mut self) -> Vec<(QName, TraitId)> {
        self.staging
            .drain()
            .map(|(name, entry)| (name, entry.trait_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::qname::NamespaceKind;

    struct EmptyDomain;
    impl ApplicationDomain for EmptyDomain {
        fn lookup_global_trait(&self, _name: &QName, _no_inherited: bool) -> Option<TraitId> {
            None
        }
        fn try_define_global_trait(&mut self, _name: QName, _trait_id: TraitId, _hide: bool) -> bool {
            true
        }
    }

    fn fake_trait() -> TraitId {
        let mut arena: slotmap::SlotMap<TraitId, ()> = slotmap::SlotMap::with_key();
        arena.insert(())
    }

    #[test]
    fn same_script_redefinition_always_fails() {
        let mut stager = GlobalTraitStager::new();
        let mut domain = EmptyDomain;
        let name = QName::new(Namespace::public(), "foo");
        let t1 = fake_trait();
        let t2 = fake_trait();
        stager
            .define(name.clone(), t1, ScriptOrigin(0), &mut domain, ConflictResolution::Fail)
            .unwrap();
        let result = stager.define(name, t2, ScriptOrigin(0), &mut domain, ConflictResolution::UseChild);
        assert!(result.is_err());
    }

    #[test]
    fn cross_script_conflict_respects_use_child_policy() {
        let mut stager = GlobalTraitStager::new();
        let mut domain = EmptyDomain;
        let name = QName::new(Namespace::public(), "foo");
        let t1 = fake_trait();
        let t2 = fake_trait();
        stager
            .define(name.clone(), t1, ScriptOrigin(0), &mut domain, ConflictResolution::Fail)
            .unwrap();
        let outcome = stager
            .define(name.clone(), t2, ScriptOrigin(1), &mut domain, ConflictResolution::UseChild)
            .unwrap();
        assert_eq!(outcome, DefineOutcome::Defined);
        assert_eq!(stager.lookup_by_qname(&name, true, &domain), Some(t2));
    }

    #[test]
    fn cross_script_conflict_respects_use_parent_policy() {
        let mut stager = GlobalTraitStager::new();
        let mut domain = EmptyDomain;
        let name = QName::new(Namespace::public(), "foo");
        let t1 = fake_trait();
        let t2 = fake_trait();
        stager
            .define(name.clone(), t1, ScriptOrigin(0), &mut domain, ConflictResolution::Fail)
            .unwrap();
        let outcome = stager
            .define(name.clone(), t2, ScriptOrigin(1), &mut domain, ConflictResolution::UseParent)
            .unwrap();
        assert_eq!(outcome, DefineOutcome::RejectedKeptExisting);
        assert_eq!(stager.lookup_by_qname(&name, true, &domain), Some(t1));
    }

    #[test]
    fn ambiguous_multiname_match_without_throw_returns_none_and_records_diagnostic() {
        let mut stager = GlobalTraitStager::new();
        let mut domain = EmptyDomain;
        let ns_a = Namespace::new(NamespaceKind::Package, "a");
        let ns_b = Namespace::new(NamespaceKind::Package, "b");
        stager
            .define(
                QName::new(ns_a.clone(), "foo"),
                fake_trait(),
                ScriptOrigin(0),
                &mut domain,
                ConflictResolution::Fail,
            )
            .unwrap();
        stager
            .define(
                QName::new(ns_b.clone(), "foo"),
                fake_trait(),
                ScriptOrigin(0),
                &mut domain,
                ConflictResolution::Fail,
            )
            .unwrap();
        let set = NamespaceSet::new(vec![ns_a, ns_b]);
        let result = stager
            .lookup_by_local_name("foo", &set, true, &domain, false)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(stager.diagnostics().len(), 1);
    }

    #[test]
    fn drain_staged_returns_every_entry_and_empties_the_table() {
        let mut stager = GlobalTraitStager::new();
        let mut domain = EmptyDomain;
        let name = QName::new(Namespace::public(), "foo");
        let t1 = fake_trait();
        stager
            .define(name.clone(), t1, ScriptOrigin(0), &mut domain, ConflictResolution::Fail)
            .unwrap();
        let drained = stager.drain_staged();
        assert_eq!(drained, vec![(name.clone(), t1)]);
        assert_eq!(stager.lookup_by_qname(&name, true, &domain), None);
        assert!(stager.drain_staged().is_empty());
    }
}

//! Regulation mapping
//!
//! Derives the regulations a verdict falls under from its label, subtype,
//! field semantics and the session's regulation scope:
//! - HIPAA for protected health information
//! - GDPR and CCPA for personal data
//! - PCI-DSS additionally for payment card data

use crate::classification::types::{
    ClassificationCandidate, FieldDescriptor, Label, Regulation, RegulationScope, Subtype,
};
use std::collections::BTreeSet;

/// Maps classifications to regulation sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegulationMapper;

impl RegulationMapper {
    pub fn new() -> Self {
        Self
    }

    /// Regulations for a candidate, including any in-scope regulations the
    /// candidate's source suggested.
    pub fn map_regulations(
        &self,
        candidate: &ClassificationCandidate,
        field: &FieldDescriptor,
        scope: &RegulationScope,
    ) -> BTreeSet<Regulation> {
        let mut regulations = self.for_label(candidate.label, candidate.subtype, field, scope);
        if candidate.label.is_sensitive() {
            regulations.extend(
                candidate
                    .regulations
                    .iter()
                    .copied()
                    .filter(|r| in_scope(scope, *r)),
            );
        }
        regulations
    }

    /// Regulations implied by a label alone, as after a human override.
    pub fn for_label(
        &self,
        label: Label,
        subtype: Option<Subtype>,
        field: &FieldDescriptor,
        scope: &RegulationScope,
    ) -> BTreeSet<Regulation> {
        let plausible = self.plausible(label, subtype);
        match scope {
            RegulationScope::Auto => plausible,
            RegulationScope::Explicit(selected) => {
                let mut regulations: BTreeSet<Regulation> =
                    plausible.intersection(selected).copied().collect();
                match label {
                    Label::Phi => {
                        regulations.insert(Regulation::Hipaa);
                    }
                    Label::Pii if regulations.is_empty() => {
                        tracing::debug!(
                            field = %field.field_key(),
                            scope = %scope,
                            "Scope excludes every plausible regulation, keeping plausible set"
                        );
                        regulations = plausible;
                    }
                    _ => {}
                }
                regulations
            }
        }
    }

    /// Regulations a label can fall under before scoping. Every PII set
    /// already carries GDPR, so EU-context hints need no extra entry.
    fn plausible(&self, label: Label, subtype: Option<Subtype>) -> BTreeSet<Regulation> {
        let mut set = BTreeSet::new();
        match label {
            Label::NonSensitive => {}
            Label::Phi => {
                set.insert(Regulation::Hipaa);
            }
            Label::Pii => {
                set.insert(Regulation::Gdpr);
                set.insert(Regulation::Ccpa);
                if subtype.is_some_and(Subtype::is_card_data) {
                    set.insert(Regulation::PciDss);
                }
            }
        }
        set
    }
}

fn in_scope(scope: &RegulationScope, regulation: Regulation) -> bool {
    match scope {
        RegulationScope::Auto => true,
        RegulationScope::Explicit(_) => scope.includes(regulation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::types::Source;

    fn mapper() -> RegulationMapper {
        RegulationMapper::new()
    }

    fn candidate(label: Label, subtype: Option<Subtype>) -> ClassificationCandidate {
        ClassificationCandidate {
            field_key: "t.c".to_string(),
            source: Source::Local,
            label,
            subtype,
            confidence: 0.9,
            rationale: String::new(),
            regulations: BTreeSet::new(),
        }
    }

    fn set(regs: &[Regulation]) -> BTreeSet<Regulation> {
        regs.iter().copied().collect()
    }

    #[test]
    fn test_auto_scope() {
        let m = mapper();
        let field = FieldDescriptor::new("customers", "email_address", "TEXT");
        assert_eq!(
            m.map_regulations(&candidate(Label::Pii, Some(Subtype::Email)), &field, &RegulationScope::Auto),
            set(&[Regulation::Gdpr, Regulation::Ccpa])
        );
        assert_eq!(
            m.map_regulations(&candidate(Label::Phi, Some(Subtype::Ssn)), &field, &RegulationScope::Auto),
            set(&[Regulation::Hipaa])
        );
        assert!(m
            .map_regulations(&candidate(Label::NonSensitive, None), &field, &RegulationScope::Auto)
            .is_empty());
    }

    #[test]
    fn test_card_data_adds_pci() {
        let field = FieldDescriptor::new("payments", "card_number", "VARCHAR(19)");
        let regs = mapper().map_regulations(
            &candidate(Label::Pii, Some(Subtype::CreditCard)),
            &field,
            &RegulationScope::Auto,
        );
        assert!(regs.contains(&Regulation::PciDss));
        assert!(regs.contains(&Regulation::Gdpr));
    }

    #[test]
    fn test_explicit_scope_intersects() {
        let scope: RegulationScope = "gdpr".parse().unwrap();
        let field = FieldDescriptor::new("customers", "email", "TEXT");
        let regs = mapper().map_regulations(&candidate(Label::Pii, Some(Subtype::Email)), &field, &scope);
        assert_eq!(regs, set(&[Regulation::Gdpr]));
    }

    #[test]
    fn test_phi_always_includes_hipaa() {
        let scope: RegulationScope = "gdpr,ccpa".parse().unwrap();
        let field = FieldDescriptor::new("patients", "diagnosis", "TEXT");
        let regs = mapper().map_regulations(&candidate(Label::Phi, Some(Subtype::Diagnosis)), &field, &scope);
        assert_eq!(regs, set(&[Regulation::Hipaa]));
    }

    #[test]
    fn test_empty_intersection_falls_back_to_plausible() {
        let scope: RegulationScope = "pci-dss".parse().unwrap();
        let field = FieldDescriptor::new("customers", "email", "TEXT");
        let regs = mapper().map_regulations(&candidate(Label::Pii, Some(Subtype::Email)), &field, &scope);
        assert_eq!(regs, set(&[Regulation::Gdpr, Regulation::Ccpa]));
    }

    #[test]
    fn test_ai_suggestions_respect_scope() {
        let mut ai = candidate(Label::Phi, Some(Subtype::Diagnosis));
        ai.source = Source::Ai;
        ai.regulations = set(&[Regulation::Gdpr, Regulation::Ccpa]);
        let field = FieldDescriptor::new("visits", "dx", "TEXT");

        let auto = mapper().map_regulations(&ai, &field, &RegulationScope::Auto);
        assert_eq!(auto, set(&[Regulation::Hipaa, Regulation::Gdpr, Regulation::Ccpa]));

        let scope: RegulationScope = "hipaa,gdpr".parse().unwrap();
        let scoped = mapper().map_regulations(&ai, &field, &scope);
        assert_eq!(scoped, set(&[Regulation::Hipaa, Regulation::Gdpr]));
    }

    #[test]
    fn test_sensitive_never_empty() {
        let m = mapper();
        let field = FieldDescriptor::new("t", "c", "TEXT");
        for scope in ["auto", "hipaa", "gdpr", "ccpa", "pci-dss"] {
            let scope: RegulationScope = scope.parse().unwrap();
            for label in [Label::Pii, Label::Phi] {
                assert!(!m.for_label(label, None, &field, &scope).is_empty());
            }
            assert!(m.for_label(Label::NonSensitive, None, &field, &scope).is_empty());
        }
    }
}

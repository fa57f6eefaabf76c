//! Local pattern and alias matcher
//!
//! Runs the ordered rule set (exact alias, fuzzy alias, token rules) over a
//! field's normalized column name, lets the scorer weigh every candidate
//! subtype, and returns the best LOCAL candidate. Matching is a pure function
//! of the field, the scope and the alias table, so fields can be matched in
//! parallel against one shared table.

use crate::classification::alias::{normalize, AliasTable, ContextHints, DeclaredType, NormalizedName};
use crate::classification::scorer::{
    ConfidenceScorer, RuleHit, RuleKind, ScoredMatch, ScoringContext, FUZZY_PENALTY, SUBSTRING_PENALTY,
    UNMATCHED_CONFIDENCE,
};
use crate::classification::types::{
    ClassificationCandidate, FieldDescriptor, Label, RegulationScope, Source, Subtype,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Keywords shorter than this only match whole tokens.
const MIN_SUBSTRING_KEYWORD: usize = 5;

/// Local classifier over a shared alias table.
#[derive(Clone)]
pub struct FieldMatcher {
    aliases: Arc<AliasTable>,
    scorer: ConfidenceScorer,
}

impl FieldMatcher {
    pub fn new(aliases: Arc<AliasTable>) -> Self {
        Self {
            aliases,
            scorer: ConfidenceScorer::new(),
        }
    }

    /// Classify one field locally. Never fails; unmatched fields come back
    /// NON_SENSITIVE at a low confidence.
    pub fn match_field(&self, field: &FieldDescriptor, scope: &RegulationScope) -> ClassificationCandidate {
        let column = normalize(&field.column);
        let table = normalize(&field.table);
        let declared = DeclaredType::parse(&field.data_type);
        let hints = ContextHints::from_names(&table, &column);
        let field_key = field.field_key();

        let hits = self.collect_hits(&column);
        if hits.is_empty() {
            return unmatched(field_key, "no alias or token rule matched".to_string());
        }

        let ctx = ScoringContext {
            column: &column,
            declared: &declared,
            hints,
            scope,
        };

        let mut by_subtype: BTreeMap<Subtype, Vec<RuleHit>> = BTreeMap::new();
        for hit in hits {
            by_subtype.entry(hit.subtype).or_default().push(hit);
        }

        let mut best: Option<ScoredMatch> = None;
        for (subtype, subtype_hits) in &by_subtype {
            if let Some(scored) = self.scorer.score(*subtype, subtype_hits, &ctx) {
                let better = best
                    .as_ref()
                    .map_or(true, |b| scored.confidence > b.confidence);
                if better {
                    best = Some(scored);
                }
            }
        }

        let Some(best) = best else {
            return unmatched(field_key, "no alias or token rule matched".to_string());
        };

        // A weak sensitive reading is better explained as a non-sensitive column
        if best.label == Label::NonSensitive || best.confidence < UNMATCHED_CONFIDENCE {
            let confidence = (1.0 - best.confidence).max(UNMATCHED_CONFIDENCE);
            tracing::debug!(
                field = %field_key,
                subtype = %best.subtype,
                score = best.confidence,
                "Weak local match treated as non-sensitive"
            );
            return ClassificationCandidate {
                field_key,
                source: Source::Local,
                label: Label::NonSensitive,
                subtype: None,
                confidence: round(confidence),
                rationale: format!("weak {} match discounted: {}", best.subtype, best.rationale),
                regulations: BTreeSet::new(),
            };
        }

        tracing::debug!(
            field = %field_key,
            label = %best.label,
            subtype = %best.subtype,
            confidence = best.confidence,
            "Local match"
        );

        ClassificationCandidate {
            field_key,
            source: Source::Local,
            label: best.label,
            subtype: Some(best.subtype),
            confidence: round(best.confidence),
            rationale: best.rationale,
            regulations: BTreeSet::new(),
        }
    }

    fn collect_hits(&self, column: &NormalizedName) -> Vec<RuleHit> {
        let mut hits = Vec::new();

        if let Some(entry) = self.aliases.lookup_exact(&column.compact) {
            hits.push(RuleHit {
                subtype: entry.subtype,
                kind: RuleKind::ExactAlias,
                weight: entry.confidence,
            });
        } else if let Some((alias, entry)) = self.aliases.lookup_fuzzy(&column.compact) {
            hits.push(RuleHit {
                subtype: entry.subtype,
                kind: RuleKind::FuzzyAlias {
                    alias: alias.to_string(),
                },
                weight: entry.confidence - FUZZY_PENALTY,
            });
        }

        for rule in self.aliases.token_rules() {
            let Some((keyword, whole_token)) = find_keyword(column, rule.keywords) else {
                continue;
            };
            let qualified = rule.qualifiers.is_empty()
                || rule
                    .qualifiers
                    .iter()
                    .any(|q| column.has_token(q) || (q.len() >= MIN_SUBSTRING_KEYWORD && column.compact.contains(q)));
            if !qualified {
                continue;
            }
            let weight = if whole_token {
                rule.confidence
            } else {
                rule.confidence - SUBSTRING_PENALTY
            };
            // One token hit per subtype is enough; keep the strongest rule
            if let Some(existing) = hits.iter_mut().find(|h| {
                h.subtype == rule.subtype && matches!(h.kind, RuleKind::Token { .. })
            }) {
                if weight > existing.weight {
                    existing.weight = weight;
                    existing.kind = RuleKind::Token {
                        keyword: keyword.to_string(),
                    };
                }
                continue;
            }
            hits.push(RuleHit {
                subtype: rule.subtype,
                kind: RuleKind::Token {
                    keyword: keyword.to_string(),
                },
                weight,
            });
        }

        hits
    }
}

/// Find a rule keyword among the tokens, or inside the compact name for long
/// keywords. Returns the keyword and whether it matched a whole token.
fn find_keyword<'k>(column: &NormalizedName, keywords: &[&'k str]) -> Option<(&'k str, bool)> {
    if let Some(k) = keywords.iter().find(|k| column.has_token(k)) {
        return Some((*k, true));
    }
    keywords
        .iter()
        .find(|k| k.len() >= MIN_SUBSTRING_KEYWORD && column.compact.contains(**k))
        .map(|k| (*k, false))
}

fn unmatched(field_key: String, rationale: String) -> ClassificationCandidate {
    ClassificationCandidate {
        field_key,
        source: Source::Local,
        label: Label::NonSensitive,
        subtype: None,
        confidence: UNMATCHED_CONFIDENCE,
        rationale,
        regulations: BTreeSet::new(),
    }
}

fn round(confidence: f64) -> f64 {
    (confidence * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher() -> FieldMatcher {
        FieldMatcher::new(Arc::new(AliasTable::builtin()))
    }

    fn classify(table: &str, column: &str, data_type: &str) -> ClassificationCandidate {
        matcher().match_field(&FieldDescriptor::new(table, column, data_type), &RegulationScope::Auto)
    }

    #[test]
    fn test_ssn_in_patients_is_phi() {
        let candidate = classify("patients", "ssn", "CHAR(11)");
        assert_eq!(candidate.source, Source::Local);
        assert_eq!(candidate.label, Label::Phi);
        assert_eq!(candidate.subtype, Some(Subtype::Ssn));
        assert!(candidate.confidence >= 0.9);
        assert!(candidate.confidence <= 0.99);
    }

    #[test]
    fn test_email_address_in_customers_is_pii() {
        let candidate = classify("customers", "email_address", "VARCHAR(255)");
        assert_eq!(candidate.label, Label::Pii);
        assert_eq!(candidate.subtype, Some(Subtype::Email));
        assert!(candidate.confidence >= 0.9);
    }

    #[test]
    fn test_compound_name_with_healthcare_token() {
        let candidate = classify("encounters", "patient_home_phone", "VARCHAR(20)");
        assert_eq!(candidate.subtype, Some(Subtype::Phone));
        assert_eq!(candidate.label, Label::Phi);
        assert!(candidate.rationale.contains("token 'phone'"));
    }

    #[test]
    fn test_unmatched_is_low_confidence_non_sensitive() {
        let candidate = classify("orders", "notes", "TEXT");
        assert_eq!(candidate.label, Label::NonSensitive);
        assert_eq!(candidate.subtype, None);
        assert_eq!(candidate.confidence, UNMATCHED_CONFIDENCE);
    }

    #[test]
    fn test_naming_variants_agree() {
        for column in ["SSN", "social_security_num", "SocialSecurityNumber", "soc_sec_no"] {
            let candidate = classify("employees", column, "VARCHAR(11)");
            assert_eq!(candidate.subtype, Some(Subtype::Ssn), "column {}", column);
            assert_eq!(candidate.label, Label::Pii);
        }
    }

    #[test]
    fn test_localized_aliases() {
        let email = classify("benutzer", "benutzer_email", "TEXT");
        assert_eq!(email.subtype, Some(Subtype::Email));

        let dob = classify("clientes", "fecha_nacimiento", "DATE");
        assert_eq!(dob.subtype, Some(Subtype::DateOfBirth));

        let insurance = classify("patienten", "krankenversicherungsnummer", "VARCHAR(20)");
        assert_eq!(insurance.label, Label::Phi);
    }

    #[test]
    fn test_fuzzy_alias_scores_below_exact() {
        let exact = classify("contacts", "email_address", "TEXT");
        let fuzzy = classify("contacts", "email_adress", "TEXT");
        assert_eq!(fuzzy.subtype, Some(Subtype::Email));
        assert!(fuzzy.confidence < exact.confidence);
    }

    #[test]
    fn test_flag_column_discounted_to_non_sensitive() {
        let candidate = classify("users", "email_verified", "BOOLEAN");
        assert_eq!(candidate.label, Label::NonSensitive);
        assert!(candidate.rationale.contains("discounted"));
    }

    #[test]
    fn test_exact_aliases_with_flag_suffix_stay_confident() {
        let blood = classify("patients", "blood_type", "VARCHAR(3)");
        assert_eq!(blood.label, Label::Phi);
        assert_eq!(blood.subtype, Some(Subtype::LabResult));
        assert!(blood.confidence >= 0.70, "blood_type scored {}", blood.confidence);

        for column in ["face_template", "biometric_template"] {
            let candidate = classify("users", column, "BLOB");
            assert_eq!(candidate.subtype, Some(Subtype::Biometric), "column {}", column);
            assert!(candidate.confidence >= 0.70, "{} scored {}", column, candidate.confidence);
        }
    }

    #[test]
    fn test_ddl_constraints_keep_type_affinity() {
        let plain = classify("patients", "ssn", "CHAR(11)");
        let ddl = classify("patients", "ssn", "CHAR(11) NOT NULL");
        assert_eq!(ddl.label, plain.label);
        assert!((ddl.confidence - plain.confidence).abs() < 1e-9);
    }

    #[test]
    fn test_hipaa_scope_turns_identifier_into_phi() {
        let hipaa: RegulationScope = "hipaa".parse().unwrap();
        let candidate = matcher().match_field(&FieldDescriptor::new("members", "email", "TEXT"), &hipaa);
        assert_eq!(candidate.label, Label::Phi);
    }

    #[test]
    fn test_diagnosis_code_is_phi_anywhere() {
        let candidate = classify("billing", "diagnosis_code", "VARCHAR(10)");
        assert_eq!(candidate.label, Label::Phi);
        assert_eq!(candidate.subtype, Some(Subtype::Diagnosis));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let field = FieldDescriptor::new("customers", "cust_tel", "VARCHAR(20)");
        let m = matcher();
        let first = m.match_field(&field, &RegulationScope::Auto);
        for _ in 0..10 {
            assert_eq!(m.match_field(&field, &RegulationScope::Auto), first);
        }
    }
}

//! Consolidation of LOCAL and AI candidates
//!
//! Produces exactly one verdict per field. The evidence available for a
//! field decides how the verdict is formed:
//!
//! | Evidence            | Verdict                          | Needs review when                  |
//! |---------------------|----------------------------------|------------------------------------|
//! | LOCAL only          | LOCAL candidate                  | low confidence or unresolved escalation |
//! | AI only             | AI candidate                     | low confidence                     |
//! | both, same label    | AI subtype and confidence        | AI confidence is low               |
//! | both, labels differ | higher confidence (ties to AI)   | always                             |

use crate::classification::regulation::RegulationMapper;
use crate::classification::types::{
    ClassificationCandidate, ConflictDetail, ConsolidatedClassification, FieldDescriptor,
    Provenance, RegulationScope, ReviewReason,
};
use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashMap};

/// What is known about one field at consolidation time.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEvidence {
    Local(ClassificationCandidate),
    Ai(ClassificationCandidate),
    Both {
        local: ClassificationCandidate,
        ai: ClassificationCandidate,
    },
}

impl FieldEvidence {
    /// Gather the evidence for `field_key`, if any source produced a candidate.
    pub fn gather(
        field_key: &str,
        local: &HashMap<String, ClassificationCandidate>,
        ai: &HashMap<String, ClassificationCandidate>,
    ) -> Option<Self> {
        match (local.get(field_key).cloned(), ai.get(field_key).cloned()) {
            (Some(local), Some(ai)) => Some(FieldEvidence::Both { local, ai }),
            (Some(local), None) => Some(FieldEvidence::Local(local)),
            (None, Some(ai)) => Some(FieldEvidence::Ai(ai)),
            (None, None) => None,
        }
    }
}

/// Session facts consolidation depends on.
#[derive(Debug, Clone)]
pub struct ConsolidationPolicy<'a> {
    pub scope: &'a RegulationScope,
    pub review_threshold: f64,
    /// An AI call was issued for the session
    pub ai_attempted: bool,
    /// Fields that went below the escalation threshold
    pub escalated: &'a BTreeSet<String>,
}

/// Merges candidates into final verdicts.
#[derive(Debug, Clone, Default)]
pub struct Consolidator {
    mapper: RegulationMapper,
}

impl Consolidator {
    pub fn new(mapper: RegulationMapper) -> Self {
        Self { mapper }
    }

    /// One validated verdict per field, in field order.
    pub fn consolidate(
        &self,
        fields: &[FieldDescriptor],
        local: &HashMap<String, ClassificationCandidate>,
        ai: &HashMap<String, ClassificationCandidate>,
        policy: &ConsolidationPolicy<'_>,
    ) -> Result<Vec<ConsolidatedClassification>> {
        fields
            .iter()
            .map(|field| {
                let key = field.field_key();
                let evidence = FieldEvidence::gather(&key, local, ai).ok_or_else(|| {
                    Error::Invariant(format!("no candidate for {}", key))
                })?;
                let verdict = self.verdict(field, evidence, policy);
                verdict.validate()?;
                tracing::debug!(
                    field = %verdict.field_key,
                    classification = %verdict.classification,
                    confidence = verdict.confidence,
                    needs_review = verdict.needs_review,
                    "Consolidated"
                );
                Ok(verdict)
            })
            .collect()
    }

    fn verdict(
        &self,
        field: &FieldDescriptor,
        evidence: FieldEvidence,
        policy: &ConsolidationPolicy<'_>,
    ) -> ConsolidatedClassification {
        let low = |confidence: f64| confidence < policy.review_threshold;

        match evidence {
            FieldEvidence::Local(local) => {
                let unresolved = policy.escalated.contains(&local.field_key)
                    && (policy.ai_attempted || local.label.is_sensitive());
                let reason = if unresolved {
                    Some(ReviewReason::UnresolvedEscalation)
                } else if low(local.confidence) {
                    Some(ReviewReason::LowConfidence)
                } else {
                    None
                };
                let rationale = local.rationale.clone();
                self.build(field, &local, Provenance::Local, reason, rationale, None, policy)
            }
            FieldEvidence::Ai(ai) => {
                let reason = low(ai.confidence).then_some(ReviewReason::LowConfidence);
                let rationale = ai.rationale.clone();
                self.build(field, &ai, Provenance::Ai, reason, rationale, None, policy)
            }
            FieldEvidence::Both { local, ai } if local.label == ai.label => {
                let mut merged = ai.clone();
                if merged.subtype.is_none() {
                    merged.subtype = local.subtype;
                }
                let reason = low(ai.confidence).then_some(ReviewReason::LowConfidence);
                let rationale = format!("local: {}; ai: {}", local.rationale, ai.rationale);
                self.build(field, &merged, Provenance::LocalAndAi, reason, rationale, None, policy)
            }
            FieldEvidence::Both { local, ai } => {
                let winner = if local.confidence > ai.confidence {
                    &local
                } else {
                    &ai
                };
                let rationale = format!(
                    "sources disagree (local {} {:.2}, ai {} {:.2}); provisional {}",
                    local.label, local.confidence, ai.label, ai.confidence, winner.label
                );
                let winner = winner.clone();
                tracing::debug!(field = %local.field_key, local = %local.label, ai = %ai.label, "Conflicting candidates");
                self.build(
                    field,
                    &winner,
                    Provenance::Conflict,
                    Some(ReviewReason::Conflict),
                    rationale,
                    Some(ConflictDetail { local, ai }),
                    policy,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        field: &FieldDescriptor,
        chosen: &ClassificationCandidate,
        source: Provenance,
        review_reason: Option<ReviewReason>,
        rationale: String,
        conflict: Option<ConflictDetail>,
        policy: &ConsolidationPolicy<'_>,
    ) -> ConsolidatedClassification {
        let classification = chosen.label;
        let subtype = if classification.is_sensitive() {
            chosen.subtype
        } else {
            None
        };
        let risk_level = classification.risk_level();
        ConsolidatedClassification {
            field_key: field.field_key(),
            table: field.table.clone(),
            column: field.column.clone(),
            classification,
            subtype,
            confidence: chosen.confidence,
            regulations: self.mapper.map_regulations(chosen, field, policy.scope),
            risk_level,
            risk_score: risk_level.score(),
            needs_review: review_reason.is_some(),
            reviewed: false,
            source,
            rationale,
            review_reason,
            conflict,
        }
    }
}

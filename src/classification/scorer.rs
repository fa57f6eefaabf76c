//! Confidence scoring for local matches
//!
//! Turns the rule hits collected by the matcher into a confidence value and a
//! label. Scoring is additive over weighted factors (alias exactness,
//! corroborating rules, domain context, declared type) followed by
//! multiplicative false-positive filters for flag-like column shapes.

use crate::classification::alias::{ContextHints, DeclaredType, NormalizedName, TypeFamily};
use crate::classification::types::{Label, Regulation, RegulationScope, Subtype};

/// Confidence for fields no rule matched.
pub const UNMATCHED_CONFIDENCE: f64 = 0.40;

/// Local confidence never reaches certainty; only a human verdict does.
pub const MAX_LOCAL_CONFIDENCE: f64 = 0.99;

const MIN_LOCAL_CONFIDENCE: f64 = 0.05;

/// Weight removed from an alias found by edit distance rather than exactly.
pub const FUZZY_PENALTY: f64 = 0.20;

/// Weight removed from a keyword found inside a compound token.
pub const SUBSTRING_PENALTY: f64 = 0.10;

/// Column names too generic to carry meaning on their own.
const GENERIC_NAMES: &[&str] = &[
    "name", "number", "code", "id", "value", "type", "data", "text", "description",
    "title", "key", "date", "address", "label", "info",
];

const FLAG_PREFIXES: &[&str] = &["is", "has", "can", "should", "allow", "use"];

const FLAG_SUFFIXES: &[&str] = &[
    "verified", "enabled", "disabled", "flag", "count", "type", "status", "format",
    "template", "sent", "optin", "opt", "visible", "valid", "confirmed", "hash", "length",
];

/// How a rule matched the column name.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    /// Compact name equals a dictionary alias
    ExactAlias,
    /// Compact name is one edit away from `alias`
    FuzzyAlias { alias: String },
    /// A keyword rule fired on the column tokens
    Token { keyword: String },
}

/// A single rule that matched a field.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleHit {
    pub subtype: Subtype,
    pub kind: RuleKind,
    /// Partial confidence contributed by this rule
    pub weight: f64,
}

impl RuleHit {
    fn describe(&self) -> String {
        match &self.kind {
            RuleKind::ExactAlias => format!("exact alias {} ({:.2})", self.subtype, self.weight),
            RuleKind::FuzzyAlias { alias } => {
                format!("fuzzy alias '{}' ({:.2})", alias, self.weight)
            }
            RuleKind::Token { keyword } => format!("token '{}' ({:.2})", keyword, self.weight),
        }
    }
}

/// Per-field inputs the scorer needs beyond the rule hits.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    pub column: &'a NormalizedName,
    pub declared: &'a DeclaredType,
    pub hints: ContextHints,
    pub scope: &'a RegulationScope,
}

/// Scored interpretation of a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub subtype: Subtype,
    pub label: Label,
    pub confidence: f64,
    pub rationale: String,
}

/// Weighted-factor confidence scorer.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    context_boost: f64,
    corroboration_bonus: f64,
    generic_penalty: f64,
    flag_factor: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            context_boost: 0.08,
            corroboration_bonus: 0.03,
            generic_penalty: 0.15,
            flag_factor: 0.5,
        }
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score one candidate subtype from its hits. Returns `None` if `hits` is empty.
    pub fn score(&self, subtype: Subtype, hits: &[RuleHit], ctx: &ScoringContext<'_>) -> Option<ScoredMatch> {
        let best = hits
            .iter()
            .max_by(|a, b| a.weight.total_cmp(&b.weight))?;

        let mut confidence = best.weight;
        let mut reasons: Vec<String> = hits.iter().map(RuleHit::describe).collect();

        let distinct_kinds = {
            let mut kinds: Vec<u8> = hits
                .iter()
                .map(|h| match h.kind {
                    RuleKind::ExactAlias => 0,
                    RuleKind::FuzzyAlias { .. } => 1,
                    RuleKind::Token { .. } => 2,
                })
                .collect();
            kinds.sort_unstable();
            kinds.dedup();
            kinds.len()
        };
        if distinct_kinds > 1 {
            confidence += self.corroboration_bonus * (distinct_kinds - 1) as f64;
            reasons.push(format!("{} rule kinds agree", distinct_kinds));
        }

        if self.context_applies(subtype, &ctx.hints) {
            confidence += self.context_boost;
            reasons.push("sensitive-domain context".to_string());
        }

        let type_adjust = type_adjustment(subtype, ctx.declared);
        if type_adjust != 0.0 {
            confidence += type_adjust;
            reasons.push(format!("declared type {} ({:+.2})", ctx.declared.base, type_adjust));
        }

        if GENERIC_NAMES.contains(&ctx.column.compact.as_str()) {
            confidence -= self.generic_penalty;
            reasons.push("generic column name".to_string());
        }

        // Dictionary aliases such as `blood_type` name the field outright
        let exact_alias = hits.iter().any(|h| h.kind == RuleKind::ExactAlias);
        if !exact_alias && is_flag_shaped(ctx.column) {
            confidence *= self.flag_factor;
            reasons.push("flag-like column shape".to_string());
        }

        let confidence = confidence.clamp(MIN_LOCAL_CONFIDENCE, MAX_LOCAL_CONFIDENCE);
        let label = label_for(Some(subtype), &ctx.hints, ctx.scope);

        Some(ScoredMatch {
            subtype,
            label,
            confidence,
            rationale: reasons.join("; "),
        })
    }

    fn context_applies(&self, subtype: Subtype, hints: &ContextHints) -> bool {
        if subtype.is_medical() {
            hints.healthcare
        } else {
            hints.person_domain || hints.healthcare
        }
    }
}

/// Label for a matched subtype in its field context.
///
/// Sensitive data is PHI when the subtype is medical, the names carry
/// healthcare terms, or the session is scoped to HIPAA.
pub fn label_for(subtype: Option<Subtype>, hints: &ContextHints, scope: &RegulationScope) -> Label {
    let Some(subtype) = subtype else {
        return Label::NonSensitive;
    };
    if subtype.is_medical() {
        return Label::Phi;
    }
    if !subtype.is_personal_identifier() {
        return Label::NonSensitive;
    }
    if hints.healthcare || scope.includes(Regulation::Hipaa) {
        Label::Phi
    } else {
        Label::Pii
    }
}

/// Whether a local confidence must be escalated to the AI classifier.
pub fn needs_escalation(confidence: f64, threshold: f64) -> bool {
    confidence < threshold
}

fn type_adjustment(subtype: Subtype, declared: &DeclaredType) -> f64 {
    match declared.family {
        TypeFamily::Boolean if subtype != Subtype::Gender => -0.35,
        TypeFamily::Binary => {
            if subtype == Subtype::Biometric {
                0.05
            } else {
                -0.25
            }
        }
        TypeFamily::Temporal => {
            if subtype == Subtype::DateOfBirth {
                0.05
            } else {
                -0.20
            }
        }
        TypeFamily::Numeric => match subtype {
            Subtype::DateOfBirth => -0.20,
            Subtype::Email | Subtype::Name | Subtype::Address | Subtype::Username => -0.25,
            _ => 0.0,
        },
        TypeFamily::Text => match (subtype, declared.length) {
            (Subtype::Ssn, Some(9 | 11)) if declared.is_fixed_char() => 0.05,
            (Subtype::Ssn, Some(9 | 11)) => 0.03,
            (Subtype::CreditCard, Some(16..=19)) => 0.05,
            (Subtype::PostalCode, Some(5..=10)) => 0.03,
            (Subtype::Ssn | Subtype::CreditCard | Subtype::PostalCode, Some(len)) if len < 4 => -0.20,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

fn is_flag_shaped(column: &NormalizedName) -> bool {
    if column.tokens.len() < 2 {
        return false;
    }
    let first = column.tokens.first().map(String::as_str).unwrap_or("");
    let last = column.tokens.last().map(String::as_str).unwrap_or("");
    FLAG_PREFIXES.contains(&first) || FLAG_SUFFIXES.contains(&last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::alias::normalize;

    fn ctx<'a>(
        column: &'a NormalizedName,
        declared: &'a DeclaredType,
        hints: ContextHints,
        scope: &'a RegulationScope,
    ) -> ScoringContext<'a> {
        ScoringContext {
            column,
            declared,
            hints,
            scope,
        }
    }

    fn exact(subtype: Subtype, weight: f64) -> RuleHit {
        RuleHit {
            subtype,
            kind: RuleKind::ExactAlias,
            weight,
        }
    }

    fn token(subtype: Subtype, keyword: &str, weight: f64) -> RuleHit {
        RuleHit {
            subtype,
            kind: RuleKind::Token {
                keyword: keyword.to_string(),
            },
            weight,
        }
    }

    #[test]
    fn test_exact_alias_with_type_and_context_clamps() {
        let column = normalize("ssn");
        let declared = DeclaredType::parse("CHAR(11)");
        let scope = RegulationScope::Auto;
        let hints = ContextHints {
            healthcare: true,
            ..Default::default()
        };
        let scored = ConfidenceScorer::new()
            .score(
                Subtype::Ssn,
                &[exact(Subtype::Ssn, 0.95), token(Subtype::Ssn, "ssn", 0.80)],
                &ctx(&column, &declared, hints, &scope),
            )
            .unwrap();
        assert_eq!(scored.confidence, MAX_LOCAL_CONFIDENCE);
        assert_eq!(scored.label, Label::Phi);
        assert!(scored.rationale.contains("declared type char"));
    }

    #[test]
    fn test_generic_name_penalized() {
        let column = normalize("name");
        let declared = DeclaredType::parse("VARCHAR(100)");
        let scope = RegulationScope::Auto;
        let scored = ConfidenceScorer::new()
            .score(
                Subtype::Name,
                &[token(Subtype::Name, "name", 0.50)],
                &ctx(&column, &declared, ContextHints::default(), &scope),
            )
            .unwrap();
        assert!((scored.confidence - 0.35).abs() < 1e-9);
        assert_eq!(scored.label, Label::Pii);
    }

    #[test]
    fn test_flag_shape_and_boolean_penalties() {
        let column = normalize("email_verified");
        let declared = DeclaredType::parse("BOOLEAN");
        let scope = RegulationScope::Auto;
        let scored = ConfidenceScorer::new()
            .score(
                Subtype::Email,
                &[token(Subtype::Email, "email", 0.70)],
                &ctx(&column, &declared, ContextHints::default(), &scope),
            )
            .unwrap();
        assert!(scored.confidence < 0.2);
        assert!(scored.rationale.contains("flag-like"));
    }

    #[test]
    fn test_exact_alias_skips_flag_shape() {
        let column = normalize("blood_type");
        let declared = DeclaredType::parse("VARCHAR(3)");
        let scope = RegulationScope::Auto;
        let scored = ConfidenceScorer::new()
            .score(
                Subtype::LabResult,
                &[exact(Subtype::LabResult, 0.85)],
                &ctx(&column, &declared, ContextHints::default(), &scope),
            )
            .unwrap();
        assert!((scored.confidence - 0.85).abs() < 1e-9);
        assert!(!scored.rationale.contains("flag-like"));
    }

    #[test]
    fn test_empty_hits_score_none() {
        let column = normalize("notes");
        let declared = DeclaredType::parse("TEXT");
        let scope = RegulationScope::Auto;
        assert!(ConfidenceScorer::new()
            .score(Subtype::Email, &[], &ctx(&column, &declared, ContextHints::default(), &scope))
            .is_none());
    }

    #[test]
    fn test_label_for_rules() {
        let none = ContextHints::default();
        let health = ContextHints {
            healthcare: true,
            ..Default::default()
        };
        let auto = RegulationScope::Auto;
        let hipaa: RegulationScope = "hipaa".parse().unwrap();

        assert_eq!(label_for(Some(Subtype::Diagnosis), &none, &auto), Label::Phi);
        assert_eq!(label_for(Some(Subtype::Email), &none, &auto), Label::Pii);
        assert_eq!(label_for(Some(Subtype::Email), &health, &auto), Label::Phi);
        assert_eq!(label_for(Some(Subtype::Email), &none, &hipaa), Label::Phi);
        assert_eq!(label_for(Some(Subtype::Other), &none, &auto), Label::NonSensitive);
        assert_eq!(label_for(None, &health, &hipaa), Label::NonSensitive);
    }

    #[test]
    fn test_needs_escalation_is_strict() {
        assert!(needs_escalation(0.69, 0.70));
        assert!(!needs_escalation(0.70, 0.70));
    }
}

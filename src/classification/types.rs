//! Core data model for field sensitivity classification

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Identity of a column under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub table: String,
    pub column: String,
    /// Declared SQL type, e.g. `VARCHAR(255)` or `CHAR(11)`
    #[serde(alias = "declaredType", default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl FieldDescriptor {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            data_type: data_type.into(),
            schema: None,
        }
    }

    /// Unique key of the field within a session (`table.column`).
    pub fn field_key(&self) -> String {
        format!("{}.{}", self.table, self.column)
    }
}

/// Sensitivity label assigned to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Pii,
    Phi,
    NonSensitive,
}

impl Label {
    pub fn is_sensitive(self) -> bool {
        !matches!(self, Label::NonSensitive)
    }

    pub fn risk_level(self) -> RiskLevel {
        match self {
            Label::Phi => RiskLevel::High,
            Label::Pii => RiskLevel::Medium,
            Label::NonSensitive => RiskLevel::Low,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Pii => write!(f, "PII"),
            Label::Phi => write!(f, "PHI"),
            Label::NonSensitive => write!(f, "NON_SENSITIVE"),
        }
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pii" => Ok(Label::Pii),
            "phi" => Ok(Label::Phi),
            "non_sensitive" | "nonsensitive" => Ok(Label::NonSensitive),
            other => Err(Error::InvalidInput(format!(
                "Unknown classification '{}'. Valid: PII, PHI, NON_SENSITIVE",
                other
            ))),
        }
    }
}

/// Specific kind of sensitive data a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Subtype {
    // Personal identifiers
    Name,
    Email,
    Phone,
    Address,
    PostalCode,
    DateOfBirth,
    Ssn,
    NationalId,
    Passport,
    DriversLicense,
    TaxId,
    IpAddress,
    Username,
    Gender,
    Ethnicity,
    Biometric,
    // Financial
    CreditCard,
    BankAccount,
    Iban,
    Salary,
    // Medical
    Diagnosis,
    Medication,
    MedicalRecordNumber,
    HealthPlanId,
    Procedure,
    LabResult,
    Allergy,
    /// Anything an external classifier reports that has no dedicated variant
    #[serde(other)]
    Other,
}

impl Subtype {
    pub fn is_medical(self) -> bool {
        matches!(
            self,
            Subtype::Diagnosis
                | Subtype::Medication
                | Subtype::MedicalRecordNumber
                | Subtype::HealthPlanId
                | Subtype::Procedure
                | Subtype::LabResult
                | Subtype::Allergy
        )
    }

    pub fn is_financial(self) -> bool {
        matches!(
            self,
            Subtype::CreditCard | Subtype::BankAccount | Subtype::Iban | Subtype::Salary
        )
    }

    /// Card data falls under PCI-DSS in addition to privacy law.
    pub fn is_card_data(self) -> bool {
        matches!(self, Subtype::CreditCard)
    }

    pub fn is_personal_identifier(self) -> bool {
        !self.is_medical() && self != Subtype::Other
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Subtype::Name => "NAME",
            Subtype::Email => "EMAIL",
            Subtype::Phone => "PHONE",
            Subtype::Address => "ADDRESS",
            Subtype::PostalCode => "POSTAL_CODE",
            Subtype::DateOfBirth => "DATE_OF_BIRTH",
            Subtype::Ssn => "SSN",
            Subtype::NationalId => "NATIONAL_ID",
            Subtype::Passport => "PASSPORT",
            Subtype::DriversLicense => "DRIVERS_LICENSE",
            Subtype::TaxId => "TAX_ID",
            Subtype::IpAddress => "IP_ADDRESS",
            Subtype::Username => "USERNAME",
            Subtype::Gender => "GENDER",
            Subtype::Ethnicity => "ETHNICITY",
            Subtype::Biometric => "BIOMETRIC",
            Subtype::CreditCard => "CREDIT_CARD",
            Subtype::BankAccount => "BANK_ACCOUNT",
            Subtype::Iban => "IBAN",
            Subtype::Salary => "SALARY",
            Subtype::Diagnosis => "DIAGNOSIS",
            Subtype::Medication => "MEDICATION",
            Subtype::MedicalRecordNumber => "MEDICAL_RECORD_NUMBER",
            Subtype::HealthPlanId => "HEALTH_PLAN_ID",
            Subtype::Procedure => "PROCEDURE",
            Subtype::LabResult => "LAB_RESULT",
            Subtype::Allergy => "ALLERGY",
            Subtype::Other => "OTHER",
        }
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regulation a sensitive field falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Regulation {
    #[serde(rename = "HIPAA")]
    Hipaa,
    #[serde(rename = "GDPR")]
    Gdpr,
    #[serde(rename = "CCPA")]
    Ccpa,
    #[serde(rename = "PCI-DSS")]
    PciDss,
}

impl Regulation {
    pub const ALL: [Regulation; 4] = [
        Regulation::Hipaa,
        Regulation::Gdpr,
        Regulation::Ccpa,
        Regulation::PciDss,
    ];
}

impl fmt::Display for Regulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hipaa => write!(f, "HIPAA"),
            Self::Gdpr => write!(f, "GDPR"),
            Self::Ccpa => write!(f, "CCPA"),
            Self::PciDss => write!(f, "PCI-DSS"),
        }
    }
}

impl FromStr for Regulation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hipaa" => Ok(Regulation::Hipaa),
            "gdpr" => Ok(Regulation::Gdpr),
            "ccpa" => Ok(Regulation::Ccpa),
            "pci-dss" | "pci_dss" | "pcidss" => Ok(Regulation::PciDss),
            other => Err(Error::InvalidInput(format!(
                "Unknown regulation '{}'. Valid: hipaa, gdpr, ccpa, pci-dss, or auto",
                other
            ))),
        }
    }
}

/// Regulations a session checks against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "ScopeRepr")]
pub enum RegulationScope {
    /// Derive regulations from classification and field semantics
    #[default]
    Auto,
    /// Caller-supplied, non-empty regulation list
    Explicit(BTreeSet<Regulation>),
}

impl RegulationScope {
    pub fn includes(&self, regulation: Regulation) -> bool {
        match self {
            RegulationScope::Auto => false,
            RegulationScope::Explicit(set) => set.contains(&regulation),
        }
    }

    /// Regulations to pass as a hint to an external classifier.
    pub fn hint(&self) -> Vec<Regulation> {
        match self {
            RegulationScope::Auto => Vec::new(),
            RegulationScope::Explicit(set) => set.iter().copied().collect(),
        }
    }
}

impl FromStr for RegulationScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(RegulationScope::Auto);
        }
        let set = trimmed
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Regulation::from_str)
            .collect::<Result<BTreeSet<_>>>()?;
        if set.is_empty() {
            return Err(Error::InvalidInput(
                "Regulation scope must be 'auto' or a non-empty regulation list".to_string(),
            ));
        }
        Ok(RegulationScope::Explicit(set))
    }
}

impl fmt::Display for RegulationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegulationScope::Auto => write!(f, "auto"),
            RegulationScope::Explicit(set) => {
                let names: Vec<String> = set.iter().map(|r| r.to_string()).collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<ScopeRepr> for RegulationScope {
    type Error = Error;

    fn try_from(repr: ScopeRepr) -> Result<Self> {
        match repr {
            ScopeRepr::Keyword(s) => s.parse(),
            ScopeRepr::List(items) => items.join(",").parse(),
        }
    }
}

impl From<RegulationScope> for ScopeRepr {
    fn from(scope: RegulationScope) -> Self {
        match scope {
            RegulationScope::Auto => ScopeRepr::Keyword("auto".to_string()),
            RegulationScope::Explicit(set) => {
                ScopeRepr::List(set.iter().map(|r| r.to_string()).collect())
            }
        }
    }
}

/// Which classifier produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Local,
    Ai,
}

/// One classifier's opinion about a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationCandidate {
    pub field_key: String,
    pub source: Source,
    pub label: Label,
    pub subtype: Option<Subtype>,
    /// Confidence in `label` (0.0 to 1.0)
    pub confidence: f64,
    pub rationale: String,
    /// Regulations suggested by the source itself (AI only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub regulations: BTreeSet<Regulation>,
}

/// Coarse risk bucket derived from the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Numeric risk on a 0-10 scale for consumers that aggregate exposure.
    pub fn score(self) -> u8 {
        match self {
            RiskLevel::Low => 3,
            RiskLevel::Medium => 6,
            RiskLevel::High => 9,
        }
    }
}

/// Where a consolidated verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    Local,
    Ai,
    LocalAndAi,
    Conflict,
    HumanReview,
}

/// Why a verdict is waiting for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewReason {
    /// LOCAL and AI disagree on the classification
    Conflict,
    /// The field was escalated but no AI verdict came back
    UnresolvedEscalation,
    /// Confidence is below the review threshold
    LowConfidence,
}

/// Both opinions for a field whose sources disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    pub local: ClassificationCandidate,
    pub ai: ClassificationCandidate,
}

/// The authoritative verdict for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedClassification {
    pub field_key: String,
    pub table: String,
    pub column: String,
    pub classification: Label,
    pub subtype: Option<Subtype>,
    pub confidence: f64,
    pub regulations: BTreeSet<Regulation>,
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    pub needs_review: bool,
    pub reviewed: bool,
    pub source: Provenance,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<ReviewReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetail>,
}

impl ConsolidatedClassification {
    /// Check the invariants every published verdict must hold.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Invariant(format!(
                "{}: confidence {} outside [0, 1]",
                self.field_key, self.confidence
            )));
        }
        if self.classification.is_sensitive() == self.regulations.is_empty() {
            return Err(Error::Invariant(format!(
                "{}: {} verdict with {} regulations",
                self.field_key,
                self.classification,
                self.regulations.len()
            )));
        }
        if self.risk_level != self.classification.risk_level() {
            return Err(Error::Invariant(format!(
                "{}: risk level {:?} does not match {}",
                self.field_key, self.risk_level, self.classification
            )));
        }
        Ok(())
    }
}

/// Audit record of a human override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewChange {
    pub field_key: String,
    pub old_classification: Label,
    pub new_classification: Label,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key() {
        let field = FieldDescriptor::new("patients", "ssn", "CHAR(11)");
        assert_eq!(field.field_key(), "patients.ssn");
    }

    #[test]
    fn test_field_descriptor_accepts_declared_type_alias() {
        let json = r#"{"table":"users","column":"email","declaredType":"TEXT"}"#;
        let field: FieldDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(field.data_type, "TEXT");
        assert!(field.schema.is_none());
    }

    #[test]
    fn test_label_serde() {
        assert_eq!(serde_json::to_string(&Label::NonSensitive).unwrap(), "\"NON_SENSITIVE\"");
        let label: Label = serde_json::from_str("\"PHI\"").unwrap();
        assert_eq!(label, Label::Phi);
        assert_eq!("non-sensitive".parse::<Label>().unwrap(), Label::NonSensitive);
        assert!("secret".parse::<Label>().is_err());
    }

    #[test]
    fn test_subtype_unknown_maps_to_other() {
        let subtype: Subtype = serde_json::from_str("\"FAVORITE_COLOR\"").unwrap();
        assert_eq!(subtype, Subtype::Other);
        let ssn: Subtype = serde_json::from_str("\"SSN\"").unwrap();
        assert_eq!(ssn, Subtype::Ssn);
        assert_eq!(Subtype::DateOfBirth.to_string(), "DATE_OF_BIRTH");
    }

    #[test]
    fn test_subtype_groups() {
        assert!(Subtype::Diagnosis.is_medical());
        assert!(!Subtype::Diagnosis.is_personal_identifier());
        assert!(Subtype::Iban.is_financial());
        assert!(Subtype::Email.is_personal_identifier());
        assert!(!Subtype::Other.is_personal_identifier());
    }

    #[test]
    fn test_regulation_display_and_parse() {
        assert_eq!(Regulation::PciDss.to_string(), "PCI-DSS");
        assert_eq!(serde_json::to_string(&Regulation::PciDss).unwrap(), "\"PCI-DSS\"");
        assert_eq!("pci_dss".parse::<Regulation>().unwrap(), Regulation::PciDss);
        assert!("sox".parse::<Regulation>().is_err());
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!("AUTO".parse::<RegulationScope>().unwrap(), RegulationScope::Auto);
        let scope: RegulationScope = "hipaa, gdpr".parse().unwrap();
        assert!(scope.includes(Regulation::Hipaa));
        assert!(scope.includes(Regulation::Gdpr));
        assert!(!scope.includes(Regulation::Ccpa));
        assert!("".parse::<RegulationScope>().is_err());
        assert!("hipaa,unknown".parse::<RegulationScope>().is_err());
    }

    #[test]
    fn test_scope_serde_forms() {
        let auto: RegulationScope = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, RegulationScope::Auto);

        let list: RegulationScope = serde_json::from_str(r#"["HIPAA","ccpa"]"#).unwrap();
        assert_eq!(list.hint(), vec![Regulation::Hipaa, Regulation::Ccpa]);

        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["HIPAA","CCPA"]"#);
        assert!(serde_json::from_str::<RegulationScope>("[]").is_err());
        assert!(serde_json::from_str::<RegulationScope>("\"everything\"").is_err());
    }

    #[test]
    fn test_risk_levels_are_monotonic() {
        assert_eq!(Label::Phi.risk_level(), RiskLevel::High);
        assert_eq!(Label::Pii.risk_level(), RiskLevel::Medium);
        assert_eq!(Label::NonSensitive.risk_level(), RiskLevel::Low);
        assert!(RiskLevel::Low.score() < RiskLevel::Medium.score());
        assert!(RiskLevel::Medium.score() < RiskLevel::High.score());
    }

    fn verdict(label: Label, regulations: BTreeSet<Regulation>) -> ConsolidatedClassification {
        ConsolidatedClassification {
            field_key: "t.c".to_string(),
            table: "t".to_string(),
            column: "c".to_string(),
            classification: label,
            subtype: None,
            confidence: 0.8,
            regulations,
            risk_level: label.risk_level(),
            risk_score: label.risk_level().score(),
            needs_review: false,
            reviewed: false,
            source: Provenance::Local,
            rationale: String::new(),
            review_reason: None,
            conflict: None,
        }
    }

    #[test]
    fn test_validate_regulation_invariant() {
        assert!(verdict(Label::NonSensitive, BTreeSet::new()).validate().is_ok());
        assert!(verdict(Label::Pii, BTreeSet::new()).validate().is_err());
        assert!(verdict(Label::NonSensitive, BTreeSet::from([Regulation::Gdpr]))
            .validate()
            .is_err());
        assert!(verdict(Label::Phi, BTreeSet::from([Regulation::Hipaa]))
            .validate()
            .is_ok());
    }
}

//! Hybrid field sensitivity classification
//!
//! A deterministic local pass (aliases, tokens, type and table context) scores
//! every field. Fields below the escalation threshold go to an external AI
//! classifier in a single batch; both opinions are then consolidated into one
//! verdict per field with regulation tags and review flags.

pub mod ai;
pub mod alias;
pub mod consolidate;
pub mod escalation;
pub mod handler;
pub mod matcher;
pub mod regulation;
pub mod scorer;
pub mod types;

pub use ai::{AiBatchRequest, AiClassifier, HttpAiClassifier};
pub use alias::{AliasTable, CustomAlias};
pub use consolidate::{ConsolidationPolicy, Consolidator};
pub use escalation::EscalationController;
pub use handler::{classification_router, ClassificationState};
pub use matcher::FieldMatcher;
pub use regulation::RegulationMapper;
pub use scorer::ConfidenceScorer;
pub use types::{
    ClassificationCandidate, ConsolidatedClassification, FieldDescriptor, Label, Provenance,
    Regulation, RegulationScope, ReviewChange, ReviewReason, RiskLevel, Source, Subtype,
};

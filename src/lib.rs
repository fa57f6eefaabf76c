//! SchemaSense - Hybrid Field Sensitivity Classification
//!
//! SchemaSense labels database fields as PII, PHI or non-sensitive, tags them
//! with the regulations that apply (HIPAA, GDPR, CCPA, PCI-DSS) and queues
//! uncertain verdicts for human review.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                       ClassificationEngine                          │
//! │                                                                    │
//! │  fields ──► FieldMatcher ──► ConfidenceScorer ──► LOCAL candidates  │
//! │             (aliases,        (type, context,           │           │
//! │              tokens)          penalties)               │           │
//! │                                     below threshold ───┤           │
//! │                                                        ▼           │
//! │                              EscalationController (one AI batch,   │
//! │                              deadline, recovery read, fallback)    │
//! │                                                        │           │
//! │  Consolidator + RegulationMapper ◄─────────────────────┘           │
//! │          │                                                         │
//! │          ▼                                                         │
//! │  SessionManager (verdicts, review queue, append-only change log)   │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`classification`]: matching, scoring, escalation, consolidation
//! - [`session`]: session state, review log and AI result stores
//! - [`engine`]: session orchestration
//! - [`api`]: HTTP API
//! - [`config`]: Configuration management

pub mod api;
pub mod classification;
pub mod config;
pub mod engine;
pub mod error;
pub mod session;

pub use config::SchemaSenseConfig;
pub use engine::{ClassificationEngine, ClassificationRequest};
pub use error::{Error, Result};

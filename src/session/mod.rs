//! Classification sessions and AI result storage

pub mod manager;
pub mod store;

pub use manager::{
    ClassificationSession, ReviewOutcome, ReviewQueueEntry, SessionHandle, SessionManager,
    SessionReport, SessionSettings, SessionSummary,
};
pub use store::{AiResults, FileResultStore, MemoryResultStore, SessionResultStore};

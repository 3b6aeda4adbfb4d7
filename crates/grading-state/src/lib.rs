//! Grading-State: SurrealDB Backend for the Grading Engine
//!
//! This crate provides the persistence layer for committee grading jobs.
//! It owns the record-store boundary: submissions, their job status, the
//! serialized checkpoint a retried job resumes from, and the final result.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: atomic status writes and immutable terminal records.
//!
//! ## Key Components
//!
//! - `SubmissionStore`: the async record-store trait
//! - `SurrealSubmissionStore`: SurrealDB implementation (memory, surrealkv, remote)
//! - `fakes::MemorySubmissionStore`: in-memory implementation for tests

mod error;
pub mod fakes;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use schema::{StatusPatch, SubmissionRow};
pub use storage_traits::{
    check_transition, JobStatus, StatusUpdate, StatusView, StorageResult, Submission,
    SubmissionId, SubmissionRecord, SubmissionStore,
};
pub use surreal_store::SurrealSubmissionStore;

/// Result type for grading-state operations
pub type Result<T> = std::result::Result<T, StateError>;

//! Error types for grading-state

use thiserror::Error;

/// Errors that can occur while connecting to or initialising the backend
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Errors surfaced through the [`crate::SubmissionStore`] trait
#[derive(Error, Debug)]
pub enum StorageError {
    /// No record exists for the submission id
    #[error("submission not found: {submission_id}")]
    SubmissionNotFound { submission_id: String },

    /// The record is terminal and can no longer change
    #[error("invalid transition for submission {submission_id}: {from} -> {to}")]
    InvalidTransition {
        submission_id: String,
        from: String,
        to: String,
    },

    /// A stored value could not be decoded
    #[error("corrupt record for submission {submission_id}: {reason}")]
    Corrupt {
        submission_id: String,
        reason: String,
    },

    /// Backend failure (connection, query, serialization)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}

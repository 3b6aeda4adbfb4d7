//! SurrealDB schema migrations and initialization
//!
//! This module provides initialization functions to set up all tables
//! with proper constraints and indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all grading tables in SurrealDB
///
/// This should be called once on first connection to set up the schema.
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing grading SurrealDB schema");

    init_submissions_table(db).await?;

    info!("Grading schema initialization complete");
    Ok(())
}

/// Initialize `submissions` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE submissions {
///   submission_id:  STRING (unique)
///   topic:          STRING
///   text:           STRING
///   status:         STRING (enum: PENDING | PROCESSING | DONE | FAILED, indexed)
///   attempt_count:  INT
///   checkpoint:     OBJECT? (sealed checkpoint envelope)
///   result:         OBJECT? (consolidated result)
///   error:          STRING?
///   created_at:     DATETIME (indexed)
///   updated_at:     DATETIME
/// }
/// ```
///
/// Constraints:
/// - `submission_id` is unique
/// - `status` transitions: PENDING → PROCESSING → DONE | FAILED
/// - DONE and FAILED rows are immutable (enforced by the guarded UPDATE)
async fn init_submissions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing submissions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS submissions SCHEMALESS
            PERMISSIONS
                FOR select FULL
                FOR create FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_submission_id ON TABLE submissions COLUMNS submission_id UNIQUE;

        -- Worker recovery scans by status
        DEFINE INDEX IF NOT EXISTS idx_status ON TABLE submissions COLUMNS status;

        DEFINE INDEX IF NOT EXISTS idx_created_at ON TABLE submissions COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    info!("submissions table initialized");
    Ok(())
}

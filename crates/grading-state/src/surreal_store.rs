//! SurrealDB-backed SubmissionStore implementation
//!
//! Uses `schema::SubmissionRow` for persistence, converting to/from
//! `storage_traits` types at the boundary.

use async_trait::async_trait;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{StatusPatch, SubmissionRow};
use crate::storage_traits::{
    check_transition, JobStatus, StatusUpdate, StorageResult, Submission, SubmissionId,
    SubmissionRecord, SubmissionStore,
};

/// Namespace and database used for every connection.
const NAMESPACE: &str = "grader";
const DATABASE: &str = "main";

/// Default on-disk location when no `SURREALDB_URL` is configured.
pub const DEFAULT_LOCAL_PATH: &str = ".grader/db";

/// SurrealDB-backed implementation of [`SubmissionStore`].
pub struct SurrealSubmissionStore {
    db: Surreal<Any>,
}

impl SurrealSubmissionStore {
    /// Create an in-memory instance for testing.
    ///
    /// Connects to `mem://`, selects `grader/main`, and runs `init_schema`.
    pub async fn in_memory() -> crate::Result<Self> {
        let store = Self::connect("mem://").await?;
        info!("SurrealSubmissionStore connected (in-memory)");
        Ok(store)
    }

    /// Connect to any SurrealDB endpoint (`mem://`, `surrealkv://path`, `ws://host`).
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self { db })
    }

    /// Create from environment variables.
    ///
    /// Uses `SURREALDB_URL` when set, otherwise local persistence under
    /// [`DEFAULT_LOCAL_PATH`].
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let store = Self::connect(&url).await?;
            info!("SurrealSubmissionStore connected ({})", url);
            return Ok(store);
        }
        Self::local(DEFAULT_LOCAL_PATH).await
    }

    /// Open (creating if needed) an on-disk store at `path`.
    pub async fn local(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let url = format!("surrealkv://{}", path.display());
        info!("using local persistence: {}", url);
        Self::connect(&url).await
    }

    // -- private helpers -----------------------------------------------------

    /// Fetch a submission row by ID, returning the DB row or SubmissionNotFound.
    async fn fetch_row(&self, id: &SubmissionId) -> StorageResult<SubmissionRow> {
        let sid = id.0.clone();
        let mut res = self
            .db
            .query("SELECT * FROM submissions WHERE submission_id = $sid")
            .bind(("sid", sid))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<SubmissionRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| StorageError::SubmissionNotFound {
                submission_id: id.0.clone(),
            })
    }
}

#[async_trait]
impl SubmissionStore for SurrealSubmissionStore {
    async fn create_submission(&self, topic: &str, text: &str) -> StorageResult<SubmissionId> {
        let id = SubmissionId::new();
        let row = SubmissionRow::new(id.0.clone(), topic.to_string(), text.to_string());

        debug!(submission_id = %id, "creating submission");

        let _created: Option<SubmissionRow> = self
            .db
            .create("submissions")
            .content(row)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn load(&self, id: &SubmissionId) -> StorageResult<Submission> {
        let record = self.fetch_row(id).await?.into_record()?;
        Ok(record.submission)
    }

    async fn save_status(&self, id: &SubmissionId, update: StatusUpdate) -> StorageResult<()> {
        if update.status == JobStatus::Pending {
            let current = self.fetch_row(id).await?.job_status()?;
            return check_transition(id, current, update.status);
        }

        let to = update.status;
        let patch = StatusPatch::from(update);
        let sid = id.0.clone();

        // One guarded statement: the status check and the write commit together.
        let mut res = self
            .db
            .query(
                "UPDATE submissions MERGE $patch \
                 WHERE submission_id = $sid AND status IN ['PENDING', 'PROCESSING'] \
                 RETURN AFTER",
            )
            .bind(("patch", patch))
            .bind(("sid", sid))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let updated: Vec<SubmissionRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if updated.is_empty() {
            // Nothing matched: either the row is missing or it is terminal.
            let current = self.fetch_row(id).await?.job_status()?;
            return check_transition(id, current, to);
        }

        debug!(submission_id = %id, status = %to, "status saved");
        Ok(())
    }

    async fn get_record(&self, id: &SubmissionId) -> StorageResult<SubmissionRecord> {
        self.fetch_row(id).await?.into_record()
    }

    async fn list_by_status(&self, status: JobStatus) -> StorageResult<Vec<SubmissionId>> {
        let wanted = status.to_string();
        let mut res = self
            .db
            .query("SELECT * FROM submissions WHERE status = $status ORDER BY created_at ASC")
            .bind(("status", wanted))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<SubmissionRow> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| SubmissionId(row.submission_id))
            .collect())
    }
}

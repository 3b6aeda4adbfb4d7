//! SurrealDB backend tests beyond the shared trait contract: on-disk
//! persistence and schema idempotence.

use grading_state::storage_traits::{JobStatus, StatusUpdate, SubmissionStore};
use grading_state::SurrealSubmissionStore;
use serde_json::json;

#[tokio::test]
async fn local_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    let id = {
        let store = SurrealSubmissionStore::local(&path).await.unwrap();
        let id = store
            .create_submission("Urban mobility", "A persisted essay.")
            .await
            .unwrap();
        store
            .save_status(
                &id,
                StatusUpdate::processing(1, Some(json!({"version": 1, "digest": "d"}))),
            )
            .await
            .unwrap();
        id
    };

    let reopened = SurrealSubmissionStore::local(&path).await.unwrap();
    let record = reopened.get_record(&id).await.unwrap();
    assert_eq!(record.submission.topic, "Urban mobility");
    assert_eq!(record.status, JobStatus::Processing);
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.checkpoint, Some(json!({"version": 1, "digest": "d"})));
}

#[tokio::test]
async fn schema_init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");

    drop(SurrealSubmissionStore::local(&path).await.unwrap());
    // A second connection re-runs every DEFINE statement.
    let store = SurrealSubmissionStore::local(&path).await.unwrap();
    assert!(store.list_by_status(JobStatus::Pending).await.unwrap().is_empty());
}

#[tokio::test]
async fn status_view_hides_attempt_count() {
    let store = SurrealSubmissionStore::in_memory().await.unwrap();
    let id = store.create_submission("t", "x").await.unwrap();
    store
        .save_status(&id, StatusUpdate::processing(4, None))
        .await
        .unwrap();

    let view = serde_json::to_value(store.get_status(&id).await.unwrap()).unwrap();
    assert_eq!(view["status"], "PROCESSING");
    assert!(view.get("attempt_count").is_none());
    assert!(view.get("checkpoint").is_none());
}

#[tokio::test]
async fn schema_defines_unique_submission_index() {
    let db = surrealdb::engine::any::connect("mem://").await.unwrap();
    db.use_ns("grader").use_db("main").await.unwrap();
    grading_state::migrations::init_schema(&db).await.unwrap();
    grading_state::migrations::init_schema(&db).await.unwrap();

    let create = "CREATE submissions CONTENT { submission_id: 'dup', status: 'PENDING' }";
    db.query(create).await.unwrap().check().unwrap();
    let duplicate = db.query(create).await.unwrap().check();
    assert!(duplicate.is_err(), "submission_id must be unique");
}

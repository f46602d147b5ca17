//! Integration test for the review-progress database.
//!
//! Exercises: open_db, migrate, detect_or_create_session, load_hunk_marks,
//! toggle_hunk_reviewed, update_session_timestamp.

use hunkwise_core::db;

fn temp_db_path(dir: &tempfile::TempDir) -> String {
    dir.path().join("progress.db").to_string_lossy().to_string()
}

#[tokio::test]
async fn full_session_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = temp_db_path(&dir);
    let conn = db::open_db(&path).await.unwrap();

    let version: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT MAX(version) FROM schema_version",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(version, 1, "schema_version should be 1");

    let journal: String = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row("PRAGMA journal_mode", [], |r| r.get(0))?)
        })
        .await
        .unwrap();
    assert_eq!(journal, "wal", "journal_mode should be wal");

    let pk_count: i64 = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>(db.query_row(
                "SELECT COUNT(*) FROM pragma_table_info('hunk_review_state') WHERE pk > 0",
                [],
                |r| r.get(0),
            )?)
        })
        .await
        .unwrap();
    assert_eq!(pk_count, 2, "hunk_review_state should have composite PK");

    let session = db::detect_or_create_session(&conn, "/tmp/proj", "2026-01-02T03:04:05Z")
        .await
        .unwrap();
    assert!(!session.id.is_empty(), "session ID should be non-empty UUID");
    assert_eq!(session.working_directory, "/tmp/proj");

    let resumed = db::detect_or_create_session(&conn, "/tmp/proj", "2026-01-02T03:04:05Z")
        .await
        .unwrap();
    assert_eq!(resumed.id, session.id, "same review should resume its session");

    let newer = db::detect_or_create_session(&conn, "/tmp/proj", "2026-02-01T00:00:00Z")
        .await
        .unwrap();
    assert_ne!(newer.id, session.id, "a rewritten review starts a new session");

    assert!(db::load_hunk_marks(&conn, &session.id).await.unwrap().is_empty());

    assert!(db::toggle_hunk_reviewed(&conn, &session.id, "src/main.rs::10").await.unwrap());
    assert!(!db::toggle_hunk_reviewed(&conn, &session.id, "src/main.rs::10").await.unwrap());
    assert!(db::toggle_hunk_reviewed(&conn, &session.id, "src/main.rs::10").await.unwrap());
    assert!(db::toggle_hunk_reviewed(&conn, &session.id, "src/main.rs::10#2").await.unwrap());
    assert!(db::toggle_hunk_reviewed(&conn, &session.id, "README.md::1").await.unwrap());
    assert!(!db::toggle_hunk_reviewed(&conn, &session.id, "README.md::1").await.unwrap());

    let marks = db::load_hunk_marks(&conn, &session.id).await.unwrap();
    assert_eq!(marks, ["src/main.rs::10", "src/main.rs::10#2"]);
    assert!(
        db::load_hunk_marks(&conn, &newer.id).await.unwrap().is_empty(),
        "marks are scoped to their session"
    );

    db::update_session_timestamp(&conn, &session.id).await.unwrap();

    let conn2 = db::open_db(&path).await.unwrap();
    let marks2 = db::load_hunk_marks(&conn2, &session.id).await.unwrap();
    assert_eq!(marks2.len(), 2, "marks should persist across connections");
}

#[tokio::test]
async fn reopening_does_not_rerun_migration() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = temp_db_path(&dir);

    let conn = db::open_db(&path).await.unwrap();
    db::detect_or_create_session(&conn, "/a", "").await.unwrap();
    drop(conn);

    let conn = db::open_db(&path).await.unwrap();
    let (versions, sessions): (i64, i64) = conn
        .call(|db| {
            Ok::<_, rusqlite::Error>((
                db.query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))?,
                db.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?,
            ))
        })
        .await
        .unwrap();
    assert_eq!(versions, 1);
    assert_eq!(sessions, 1);
}

/// DDL to create the schema_version tracking table.
///
/// Applied unconditionally on every DB open (before checking the version),
/// using `IF NOT EXISTS` so it is safe to run multiple times.
pub const SCHEMA_VERSION_DDL: &str = "
    CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER NOT NULL
    ) STRICT;
";

/// DDL for the v1 progress schema.
///
/// - `sessions`: one row per (working directory, review `createdAt`) pair,
///   keyed by UUID v4 text. `review_created_at` is the RFC 3339 stamp of the
///   review being read, or `''` for legacy reviews without one.
/// - `hunk_review_state`: per-hunk reviewed flag within a session, keyed by
///   the `"<file>::<startLine>[#N]"` hunk key.
///
/// Removing a session cascades to its marks.
pub const SCHEMA_V1_SQL: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id                TEXT    PRIMARY KEY,
        working_directory TEXT    NOT NULL,
        review_created_at TEXT    NOT NULL DEFAULT '',
        created_at        INTEGER NOT NULL,
        updated_at        INTEGER NOT NULL
    ) STRICT;

    CREATE INDEX IF NOT EXISTS sessions_by_review
        ON sessions (working_directory, review_created_at);

    CREATE TABLE IF NOT EXISTS hunk_review_state (
        session_id  TEXT    NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        hunk_key    TEXT    NOT NULL,
        reviewed    INTEGER NOT NULL DEFAULT 0,
        reviewed_at INTEGER,
        PRIMARY KEY (session_id, hunk_key)
    ) STRICT;
";

/// Runs forward-only schema migration to the latest version.
///
/// Idempotent: safe to call on every startup.
///
/// # Errors
///
/// Returns `rusqlite::Error` if the DDL fails or the version row cannot be read.
pub fn migrate(db: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    db.execute_batch(SCHEMA_VERSION_DDL)?;

    let version: i64 =
        db.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute_batch(SCHEMA_V1_SQL)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
        tx.commit()?;
    }

    Ok(())
}

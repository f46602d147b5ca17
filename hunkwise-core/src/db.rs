//! Review progress: per-hunk "reviewed" marks kept in a WAL-mode SQLite
//! database. This is viewer state only and never touches stored reviews.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

/// One progress session: the reading of one review of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub working_directory: String,
    pub review_created_at: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Default database location: `<data_dir>/hunkwise/progress.db`.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(crate::APP_NAME))
        .unwrap_or_else(|| PathBuf::from(".hunkwise"))
        .join("progress.db")
}

/// Opens (or creates) the SQLite database at `path`, configures WAL mode,
/// and applies schema migrations via the `schema_version` table.
///
/// `busy_timeout` is set through the `Connection` method rather than a PRAGMA
/// string so it takes effect regardless of pragma caching.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the file cannot be opened, WAL
/// configuration fails, or schema DDL fails.
pub async fn open_db(path: &str) -> Result<Connection, tokio_rusqlite::Error> {
    let conn = Connection::open(path).await?;

    conn.call(|db| -> rusqlite::Result<()> {
        db.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        db.busy_timeout(Duration::from_secs(5))?;
        // Leftover WAL from a previous run.
        db.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        crate::schema::migrate(db)
    })
    .await?;

    Ok(conn)
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Finds the session for `working_directory + review_created_at`, or creates
/// one.
///
/// A newly written review has a new `createdAt`, so it starts a fresh
/// session; reopening the viewer on the same review resumes the old one.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query or write transaction fails.
pub async fn detect_or_create_session(
    conn: &Connection,
    working_directory: &str,
    review_created_at: &str,
) -> Result<Session, tokio_rusqlite::Error> {
    let working_directory = working_directory.to_owned();
    let review_created_at = review_created_at.to_owned();

    conn.call(move |db| -> rusqlite::Result<Session> {
        let existing: Option<Session> = db
            .query_row(
                "SELECT id, working_directory, review_created_at, created_at, updated_at
                 FROM sessions
                 WHERE working_directory = ?1 AND review_created_at = ?2
                 ORDER BY updated_at DESC
                 LIMIT 1",
                rusqlite::params![&working_directory, &review_created_at],
                |r| {
                    Ok(Session {
                        id: r.get(0)?,
                        working_directory: r.get(1)?,
                        review_created_at: r.get(2)?,
                        created_at: r.get(3)?,
                        updated_at: r.get(4)?,
                    })
                },
            )
            .optional()?;

        let now = now_secs();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let session = match existing {
            Some(mut session) => {
                tx.execute(
                    "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![now, &session.id],
                )?;
                session.updated_at = now;
                session
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO sessions
                         (id, working_directory, review_created_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    rusqlite::params![&id, &working_directory, &review_created_at, now],
                )?;
                Session { id, working_directory, review_created_at, created_at: now, updated_at: now }
            }
        };
        tx.commit()?;
        Ok(session)
    })
    .await
}

/// Loads the hunk keys marked reviewed within `session_id`.
///
/// Hunks with no row, or with `reviewed = 0`, are absent from the result.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the query fails.
pub async fn load_hunk_marks(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<String>, tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();

    conn.call(move |db| -> rusqlite::Result<Vec<String>> {
        let mut stmt = db.prepare(
            "SELECT hunk_key FROM hunk_review_state
             WHERE session_id = ?1 AND reviewed = 1
             ORDER BY hunk_key",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![&session_id], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })
    .await
}

/// Toggles the reviewed flag for `hunk_key` within `session_id` and returns
/// the new state.
///
/// Uses an upsert inside `BEGIN IMMEDIATE`; `reviewed_at` is set when
/// marking and cleared when unmarking.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the upsert transaction fails.
pub async fn toggle_hunk_reviewed(
    conn: &Connection,
    session_id: &str,
    hunk_key: &str,
) -> Result<bool, tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();
    let hunk_key = hunk_key.to_owned();

    conn.call(move |db| -> rusqlite::Result<bool> {
        let now = now_secs();
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(
                "SELECT reviewed FROM hunk_review_state
                 WHERE session_id = ?1 AND hunk_key = ?2",
                rusqlite::params![&session_id, &hunk_key],
                |r| r.get::<_, bool>(0),
            )
            .optional()?
            .unwrap_or(false);

        let new_state = !current;
        let reviewed_at: Option<i64> = new_state.then_some(now);

        tx.execute(
            "INSERT INTO hunk_review_state (session_id, hunk_key, reviewed, reviewed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, hunk_key)
             DO UPDATE SET reviewed = excluded.reviewed,
                           reviewed_at = excluded.reviewed_at",
            rusqlite::params![&session_id, &hunk_key, new_state, reviewed_at],
        )?;
        tx.commit()?;
        Ok(new_state)
    })
    .await
}

/// Updates the `updated_at` timestamp for `session_id` to the current time.
///
/// Called on quit so the most recently used session sorts first.
///
/// # Errors
///
/// Returns `tokio_rusqlite::Error` if the transaction fails.
pub async fn update_session_timestamp(
    conn: &Connection,
    session_id: &str,
) -> Result<(), tokio_rusqlite::Error> {
    let session_id = session_id.to_owned();

    conn.call(move |db| -> rusqlite::Result<()> {
        let tx = db.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE sessions SET updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now_secs(), &session_id],
        )?;
        tx.commit()
    })
    .await
}

//! Journal schema creation and version check.

use crate::error::JournalError;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::info;

pub const SCHEMA_MAJOR_VERSION: i64 = 1;
pub const SCHEMA_MINOR_VERSION: i64 = 0;

const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS cases (
    case_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    created_date INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS case_name_idx ON cases(name);

CREATE TABLE IF NOT EXISTS ingest_jobs (
    job_id INTEGER PRIMARY KEY AUTOINCREMENT,
    data_source_name TEXT NOT NULL,
    start_time INTEGER,
    end_time INTEGER,
    status INTEGER NOT NULL,
    error_occurred INTEGER NOT NULL DEFAULT 0,
    case_id INTEGER NOT NULL REFERENCES cases(case_id) ON DELETE CASCADE
);
CREATE UNIQUE INDEX IF NOT EXISTS ingest_jobs_case_ds_idx ON ingest_jobs(case_id, data_source_name);
CREATE INDEX IF NOT EXISTS ingest_jobs_status_idx ON ingest_jobs(status);

CREATE TABLE IF NOT EXISTS db_versions (
    major_version INTEGER NOT NULL,
    minor_version INTEGER NOT NULL,
    revision INTEGER NOT NULL,
    creation_date INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS db_versions_idx ON db_versions(major_version, minor_version, revision);
";

/// Schema version recorded in `db_versions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub major: i64,
    pub minor: i64,
}

/// Create missing tables and check the recorded version. Safe to run on every open.
pub fn initialize(conn: &mut Connection) -> Result<SchemaVersion, JournalError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(CREATE_SCHEMA)?;

    let recorded: Option<(i64, i64)> = tx
        .query_row(
            "SELECT major_version, minor_version FROM db_versions
             ORDER BY major_version DESC, minor_version DESC, revision DESC LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let version = match recorded {
        Some((major, _)) if major > SCHEMA_MAJOR_VERSION => {
            return Err(JournalError::SchemaVersion {
                found: major,
                supported: SCHEMA_MAJOR_VERSION,
            });
        }
        Some((major, minor)) => SchemaVersion { major, minor },
        None => {
            tx.execute(
                "INSERT INTO db_versions (major_version, minor_version, revision, creation_date)
                 VALUES (?1, ?2, 0, ?3) ON CONFLICT DO NOTHING",
                rusqlite::params![
                    SCHEMA_MAJOR_VERSION,
                    SCHEMA_MINOR_VERSION,
                    chrono::Utc::now().timestamp_millis()
                ],
            )?;
            info!(
                major = SCHEMA_MAJOR_VERSION,
                minor = SCHEMA_MINOR_VERSION,
                "Created journal schema"
            );
            SchemaVersion {
                major: SCHEMA_MAJOR_VERSION,
                minor: SCHEMA_MINOR_VERSION,
            }
        }
    };

    tx.commit()?;
    Ok(version)
}

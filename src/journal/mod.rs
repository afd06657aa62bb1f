//! Job Journal
//!
//! Relational record of cases and their per-data-source ingest jobs, shared by
//! every host of a cluster through one SQLite database. Creation is an upsert
//! keyed by case name or by (case, data source); racing creators all receive
//! the single row that won. Mutations look the record up by id, update it and
//! return the updated row inside one immediate transaction.

pub mod records;
pub mod schema;

use crate::error::JournalError;
use crate::node_data::truncate_to_millis;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub use records::{CaseRecord, IngestJobRecord, IngestJobStatus};
pub use schema::SchemaVersion;

use records::{from_millis, to_millis};

const JOB_SELECT: &str = "
SELECT j.job_id, j.case_id, c.name, j.data_source_name, j.status,
       j.start_time, j.end_time, j.error_occurred
FROM ingest_jobs j INNER JOIN cases c ON c.case_id = j.case_id";

/// Connection options.
#[derive(Debug, Clone)]
pub struct JournalOptions {
    /// How long a writer waits for another process's transaction.
    pub busy_timeout: Duration,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

fn conversion_failure(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Integer,
        message.into(),
    )
}

fn timestamp_column(row: &Row<'_>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(column)? {
        None => Ok(None),
        Some(millis) => from_millis(millis)
            .map(Some)
            .ok_or_else(|| conversion_failure(column, format!("timestamp {} out of range", millis))),
    }
}

fn case_from_row(row: &Row<'_>) -> rusqlite::Result<CaseRecord> {
    Ok(CaseRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        created_date: timestamp_column(row, 2)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<IngestJobRecord> {
    let raw_status: i64 = row.get(4)?;
    let status = IngestJobStatus::from_db_value(raw_status)
        .ok_or_else(|| conversion_failure(4, format!("unknown status value {}", raw_status)))?;
    Ok(IngestJobRecord {
        id: row.get(0)?,
        case_id: row.get(1)?,
        case_name: row.get(2)?,
        data_source_name: row.get(3)?,
        status,
        start_time: timestamp_column(row, 5)?,
        end_time: timestamp_column(row, 6)?,
        error_occurred: row.get(7)?,
    })
}

/// Row conversion failures are corrupt data, everything else is the store.
fn store_error(err: rusqlite::Error) -> JournalError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(column, _, source) => {
            JournalError::CorruptRow(format!("column {}: {}", column, source))
        }
        other => JournalError::Unavailable(other),
    }
}

fn select_job(tx: &Transaction<'_>, job_id: i64) -> Result<Option<IngestJobRecord>, JournalError> {
    tx.query_row(
        &format!("{} WHERE j.job_id = ?1", JOB_SELECT),
        [job_id],
        job_from_row,
    )
    .optional()
    .map_err(store_error)
}

/// Handle on the journal database.
pub struct JobJournal {
    conn: Mutex<Connection>,
    schema_version: SchemaVersion,
}

impl JobJournal {
    /// Open the journal at `path`, creating the database and schema if needed.
    pub fn open(path: &Path, options: &JournalOptions) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        let journal = Self::from_connection(conn, options)?;
        info!(path = %path.display(), "Opened job journal");
        Ok(journal)
    }

    /// Private journal that disappears when dropped.
    pub fn open_in_memory() -> Result<Self, JournalError> {
        Self::from_connection(Connection::open_in_memory()?, &JournalOptions::default())
    }

    fn from_connection(mut conn: Connection, options: &JournalOptions) -> Result<Self, JournalError> {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let schema_version = schema::initialize(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<(), JournalError> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, err)| JournalError::Unavailable(err))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, JournalError>,
    ) -> Result<T, JournalError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// The case named `name`, created with `created_date` if it does not exist.
    ///
    /// An existing case keeps its original created date.
    pub fn get_or_create_case_record(
        &self,
        name: &str,
        created_date: Option<DateTime<Utc>>,
    ) -> Result<CaseRecord, JournalError> {
        let created_date = created_date.map(truncate_to_millis);
        self.write(|tx| {
            let inserted = tx.execute(
                "INSERT INTO cases (name, created_date) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                params![name, created_date.map(to_millis)],
            )?;
            if inserted > 0 {
                debug!(case = name, "Created case record");
            }
            tx.query_row(
                "SELECT case_id, name, created_date FROM cases WHERE name = ?1",
                [name],
                case_from_row,
            )
            .map_err(store_error)
        })
    }

    /// The job for a case's data source, created as pending if it does not exist.
    pub fn get_or_create_job_record(
        &self,
        case_id: i64,
        data_source_name: &str,
    ) -> Result<IngestJobRecord, JournalError> {
        self.write(|tx| {
            let case_exists = tx
                .query_row("SELECT 1 FROM cases WHERE case_id = ?1", [case_id], |_| Ok(()))
                .optional()?
                .is_some();
            if !case_exists {
                return Err(JournalError::NotFound {
                    kind: "case",
                    id: case_id,
                });
            }

            tx.execute(
                "INSERT INTO ingest_jobs (case_id, data_source_name, status, start_time, end_time, error_occurred)
                 VALUES (?1, ?2, ?3, NULL, NULL, 0) ON CONFLICT DO NOTHING",
                params![case_id, data_source_name, IngestJobStatus::Pending.db_value()],
            )?;
            tx.query_row(
                &format!(
                    "{} WHERE j.case_id = ?1 AND j.data_source_name = ?2",
                    JOB_SELECT
                ),
                params![case_id, data_source_name],
                job_from_row,
            )
            .map_err(store_error)
        })
    }

    /// Move a job to `status`. Running records `at` as the start time, done as
    /// the end time; pending records no time. Times are kept to the millisecond.
    pub fn set_job_status(
        &self,
        job_id: i64,
        status: IngestJobStatus,
        at: DateTime<Utc>,
    ) -> Result<IngestJobRecord, JournalError> {
        let at = truncate_to_millis(at);
        self.write(|tx| {
            let updated = match status {
                IngestJobStatus::Running => tx.execute(
                    "UPDATE ingest_jobs SET status = ?1, start_time = ?2 WHERE job_id = ?3",
                    params![status.db_value(), to_millis(at), job_id],
                )?,
                IngestJobStatus::Done => tx.execute(
                    "UPDATE ingest_jobs SET status = ?1, end_time = ?2 WHERE job_id = ?3",
                    params![status.db_value(), to_millis(at), job_id],
                )?,
                IngestJobStatus::Pending => tx.execute(
                    "UPDATE ingest_jobs SET status = ?1 WHERE job_id = ?2",
                    params![status.db_value(), job_id],
                )?,
            };
            if updated == 0 {
                return Err(JournalError::NotFound {
                    kind: "ingest job",
                    id: job_id,
                });
            }
            debug!(job_id, %status, "Updated ingest job status");
            select_job(tx, job_id)?.ok_or(JournalError::NotFound {
                kind: "ingest job",
                id: job_id,
            })
        })
    }

    /// Set or clear the error flag of a job, whatever its status.
    pub fn set_job_error(
        &self,
        job_id: i64,
        error_occurred: bool,
    ) -> Result<IngestJobRecord, JournalError> {
        self.write(|tx| {
            let updated = tx.execute(
                "UPDATE ingest_jobs SET error_occurred = ?1 WHERE job_id = ?2",
                params![error_occurred, job_id],
            )?;
            if updated == 0 {
                return Err(JournalError::NotFound {
                    kind: "ingest job",
                    id: job_id,
                });
            }
            select_job(tx, job_id)?.ok_or(JournalError::NotFound {
                kind: "ingest job",
                id: job_id,
            })
        })
    }

    /// Jobs currently in `status`, ordered by id.
    pub fn get_jobs(&self, status: IngestJobStatus) -> Result<Vec<IngestJobRecord>, JournalError> {
        self.query_jobs("WHERE j.status = ?1", status.db_value())
    }

    pub fn get_jobs_for_case(&self, case_id: i64) -> Result<Vec<IngestJobRecord>, JournalError> {
        self.query_jobs("WHERE j.case_id = ?1", case_id)
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<IngestJobRecord>, JournalError> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE j.job_id = ?1", JOB_SELECT),
            [job_id],
            job_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    pub fn get_case_record(&self, name: &str) -> Result<Option<CaseRecord>, JournalError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT case_id, name, created_date FROM cases WHERE name = ?1",
            [name],
            case_from_row,
        )
        .optional()
        .map_err(store_error)
    }

    /// Every case, ordered by id.
    pub fn get_cases(&self) -> Result<Vec<CaseRecord>, JournalError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT case_id, name, created_date FROM cases ORDER BY case_id")?;
        let rows = stmt.query_map([], case_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)
    }

    fn query_jobs(&self, filter: &str, value: i64) -> Result<Vec<IngestJobRecord>, JournalError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} {} ORDER BY j.job_id", JOB_SELECT, filter))?;
        let rows = stmt.query_map([value], job_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_error)
    }
}

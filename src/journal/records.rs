//! Journal record types.

use crate::types::EpochMillis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ingest job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IngestJobStatus {
    Pending,
    Running,
    Done,
}

impl IngestJobStatus {
    /// Value stored in the `status` column.
    pub fn db_value(self) -> i64 {
        match self {
            IngestJobStatus::Pending => 0,
            IngestJobStatus::Running => 1,
            IngestJobStatus::Done => 2,
        }
    }

    pub fn from_db_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(IngestJobStatus::Pending),
            1 => Some(IngestJobStatus::Running),
            2 => Some(IngestJobStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for IngestJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IngestJobStatus::Pending => "PENDING",
            IngestJobStatus::Running => "RUNNING",
            IngestJobStatus::Done => "DONE",
        })
    }
}

impl FromStr for IngestJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(IngestJobStatus::Pending),
            "RUNNING" => Ok(IngestJobStatus::Running),
            "DONE" => Ok(IngestJobStatus::Done),
            other => Err(format!("unknown ingest job status {:?}", other)),
        }
    }
}

/// A case known to the journal. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    pub id: i64,
    pub name: String,
    pub created_date: Option<DateTime<Utc>>,
}

/// One ingest job: a data source of a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestJobRecord {
    pub id: i64,
    pub case_id: i64,
    pub case_name: String,
    pub data_source_name: String,
    pub status: IngestJobStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Independent of status.
    pub error_occurred: bool,
}

pub(crate) fn to_millis(date: DateTime<Utc>) -> EpochMillis {
    date.timestamp_millis()
}

pub(crate) fn from_millis(millis: EpochMillis) -> Option<DateTime<Utc>> {
    crate::node_data::millis_to_datetime(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("running".parse::<IngestJobStatus>(), Ok(IngestJobStatus::Running));
        assert_eq!("DONE".parse::<IngestJobStatus>(), Ok(IngestJobStatus::Done));
        assert!("stalled".parse::<IngestJobStatus>().is_err());
        for status in [
            IngestJobStatus::Pending,
            IngestJobStatus::Running,
            IngestJobStatus::Done,
        ] {
            assert_eq!(IngestJobStatus::from_db_value(status.db_value()), Some(status));
        }
        assert_eq!(IngestJobStatus::from_db_value(7), None);
    }
}

//! Case Node Data
//!
//! Metadata stored in a case directory coordination node: format version,
//! the ingest errors flag and, from version 1 on, the case details.

pub mod codec;
pub mod store;

use crate::error::NodeDataError;
use bitflags::bitflags;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::path::Path;

pub use codec::{decode, decode_node, encode};
pub use store::{CaseMetadataSource, CaseNodeDataStore};

/// Format version written for newly created node data.
pub const CURRENT_VERSION: i32 = 1;

/// Format of the created date recorded in case metadata, before the zone label.
const CREATED_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Node data format versions this crate can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeDataVersion {
    /// Errors flag only; written solely when an auto ingest job hit an error.
    Legacy = 0,
    /// Adds directory, dates, names and deleted item flags.
    V1 = 1,
    /// Version 1 fields followed by a minor version number.
    V2 = 2,
}

impl NodeDataVersion {
    pub const CURRENT: NodeDataVersion = NodeDataVersion::V1;

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(NodeDataVersion::Legacy),
            1 => Some(NodeDataVersion::V1),
            2 => Some(NodeDataVersion::V2),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

bitflags! {
    /// Case components that have been deleted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeletedItems: u16 {
        const TEXT_INDEX = 1;
        const CASE_DB = 2;
        const CASE_DIR = 4;
        const DATA_SOURCES = 8;
        const MANIFEST_FILE_NODES = 16;
    }
}

/// Case details present in version 1 and later node data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDetails {
    pub directory: String,
    pub create_date: DateTime<Utc>,
    pub last_access_date: DateTime<Utc>,
    /// Unique, immutable case name.
    pub name: String,
    pub display_name: String,
    pub deleted_items: DeletedItems,
}

/// Metadata of a case as recorded in its metadata file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseMetadata {
    pub case_directory: String,
    pub case_name: String,
    pub case_display_name: String,
    /// `yyyy/MM/dd HH:mm:ss (zone)`
    pub created_date: String,
}

/// Node data stored at a case directory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseNodeData {
    version: NodeDataVersion,
    errors_occurred: bool,
    details: Option<CaseDetails>,
    minor_version: Option<i32>,
}

impl CaseNodeData {
    /// Node data at the current version. Dates are kept to the millisecond,
    /// the precision of the wire format.
    pub fn new(mut details: CaseDetails) -> Self {
        details.create_date = truncate_to_millis(details.create_date);
        details.last_access_date = truncate_to_millis(details.last_access_date);
        Self {
            version: NodeDataVersion::CURRENT,
            errors_occurred: false,
            details: Some(details),
            minor_version: None,
        }
    }

    /// Node data in the version 0 layout.
    pub fn legacy(errors_occurred: bool) -> Self {
        Self {
            version: NodeDataVersion::Legacy,
            errors_occurred,
            details: None,
            minor_version: None,
        }
    }

    /// Fresh node data for a newly created case. Last access is now, no flags set.
    pub fn from_metadata(metadata: &CaseMetadata) -> Result<Self, NodeDataError> {
        let create_date = parse_created_date(&metadata.created_date)?;
        Ok(Self::new(CaseDetails {
            directory: metadata.case_directory.clone(),
            create_date,
            last_access_date: now_millis(),
            name: metadata.case_name.clone(),
            display_name: metadata.case_display_name.clone(),
            deleted_items: DeletedItems::empty(),
        }))
    }

    pub(crate) fn from_parts(
        version: NodeDataVersion,
        errors_occurred: bool,
        details: Option<CaseDetails>,
        minor_version: Option<i32>,
    ) -> Self {
        Self {
            version,
            errors_occurred,
            details,
            minor_version,
        }
    }

    pub fn version(&self) -> NodeDataVersion {
        self.version
    }

    pub fn minor_version(&self) -> Option<i32> {
        self.minor_version
    }

    pub fn errors_occurred(&self) -> bool {
        self.errors_occurred
    }

    pub fn set_errors_occurred(&mut self, errors_occurred: bool) {
        self.errors_occurred = errors_occurred;
    }

    pub fn details(&self) -> Option<&CaseDetails> {
        self.details.as_ref()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.details.as_ref().map(|d| Path::new(d.directory.as_str()))
    }

    pub fn name(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.name.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.display_name.as_str())
    }

    pub fn create_date(&self) -> Option<DateTime<Utc>> {
        self.details.as_ref().map(|d| d.create_date)
    }

    pub fn last_access_date(&self) -> Option<DateTime<Utc>> {
        self.details.as_ref().map(|d| d.last_access_date)
    }

    fn details_mut(&mut self) -> Result<&mut CaseDetails, NodeDataError> {
        self.details
            .as_mut()
            .ok_or(NodeDataError::MissingCaseDetails)
    }

    /// Stored with millisecond precision.
    pub fn set_last_access_date(&mut self, date: DateTime<Utc>) -> Result<(), NodeDataError> {
        self.details_mut()?.last_access_date = truncate_to_millis(date);
        Ok(())
    }

    pub fn set_display_name(&mut self, display_name: &str) -> Result<(), NodeDataError> {
        self.details_mut()?.display_name = display_name.to_string();
        Ok(())
    }

    pub fn is_deleted_flag_set(&self, flag: DeletedItems) -> bool {
        self.details
            .as_ref()
            .map(|d| d.deleted_items.contains(flag))
            .unwrap_or(false)
    }

    pub fn set_deleted_flag(&mut self, flag: DeletedItems) -> Result<(), NodeDataError> {
        self.details_mut()?.deleted_items.insert(flag);
        Ok(())
    }

    /// Serialize to the node data wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NodeDataError> {
        codec::encode(self)
    }
}

pub(crate) fn truncate_to_millis(date: DateTime<Utc>) -> DateTime<Utc> {
    millis_to_datetime(date.timestamp_millis()).unwrap_or(date)
}

fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Parse a case metadata created date such as `2019/03/12 10:15:00 (UTC)`.
///
/// The zone label accepts UTC/GMT, numeric offsets (`+0100`, `-05:00`,
/// `GMT+01:00`) and the common North American abbreviations.
pub fn parse_created_date(value: &str) -> Result<DateTime<Utc>, NodeDataError> {
    let invalid = || NodeDataError::InvalidCreatedDate(value.to_string());
    let (stamp, zone) = match value.find(" (") {
        Some(idx) => (
            &value[..idx],
            value[idx + 2..].trim_end().trim_end_matches(')'),
        ),
        None => (value, "UTC"),
    };
    let naive =
        NaiveDateTime::parse_from_str(stamp.trim(), CREATED_DATE_FORMAT).map_err(|_| invalid())?;
    let offset = zone_offset(zone.trim()).ok_or_else(invalid)?;
    let local = offset.from_local_datetime(&naive).single().ok_or_else(invalid)?;
    Ok(local.with_timezone(&Utc))
}

fn zone_offset(zone: &str) -> Option<FixedOffset> {
    let hours = |h: i32| FixedOffset::east_opt(h * 3600);
    match zone.to_ascii_uppercase().as_str() {
        "" | "UTC" | "GMT" | "Z" => hours(0),
        "EST" | "CDT" => hours(-5),
        "EDT" => hours(-4),
        "CST" => hours(-6),
        "MST" => hours(-7),
        "MDT" => hours(-6),
        "PST" => hours(-8),
        "PDT" => hours(-7),
        other => {
            let numeric = other
                .strip_prefix("GMT")
                .or_else(|| other.strip_prefix("UTC"))
                .unwrap_or(other);
            parse_numeric_offset(numeric)
        }
    }
}

fn parse_numeric_offset(value: &str) -> Option<FixedOffset> {
    let (sign, rest) = match value.chars().next()? {
        '+' => (1, &value[1..]),
        '-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

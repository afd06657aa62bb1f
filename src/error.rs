//! Error types
//!
//! One enum per concern, wrapped by [`ApiError`] at the command surface.
//! "Not found" on a read and "lock not acquired" are not errors: reads return
//! `Ok(None)` and lock acquisition returns `Ok(None)`.

use thiserror::Error;

/// Errors produced while encoding or decoding case node data.
#[derive(Debug, Error)]
pub enum NodeDataError {
    #[error("Malformed node data: {0}")]
    Malformed(String),

    #[error("Field {field} is {len} bytes once encoded, limit is 65535")]
    FieldTooLong { field: &'static str, len: usize },

    #[error("Invalid case created date {0:?}")]
    InvalidCreatedDate(String),

    #[error("Node data has no case details (legacy version 0 record)")]
    MissingCaseDetails,
}

/// Errors produced by the coordination substrate and the services built on it.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Communication with the substrate failed; node and lock state is unknown.
    #[error("Coordination service unavailable during {operation} on {path}: {source}")]
    Unavailable {
        operation: &'static str,
        path: String,
        #[source]
        source: sled::Error,
    },

    #[error("Coordination namespace {0} is not initialized")]
    NamespaceNotInitialized(String),

    #[error("Corrupt lock record at {path}: {reason}")]
    LockRecordCorrupt { path: String, reason: String },

    #[error("Case metadata unavailable for {path}: {reason}")]
    MetadataUnavailable { path: String, reason: String },

    #[error("Failed to open coordination store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sled::Error,
    },

    /// The guarded operation completed but its lock could not be released.
    #[error("Lock on {node_path} not released after the guarded operation completed: {source}")]
    ReleaseFailed {
        node_path: String,
        #[source]
        source: Box<CoordinationError>,
    },

    #[error(transparent)]
    NodeData(#[from] NodeDataError),
}

/// Whole-run migration failures. Per-node failures are reported, not raised.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Destination namespace {root} already holds node data")]
    DestinationNotEmpty { root: String },

    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// Errors produced by the job journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A mutation targeted a record that does not exist.
    #[error("{kind} record {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Journal store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("Unsupported journal schema version {found}, max supported {supported}")]
    SchemaVersion { found: i64, supported: i64 },

    #[error("Corrupt journal row: {0}")]
    CorruptRow(String),

    #[error("Failed to prepare journal location {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error for CLI and library entry points.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    NodeData(#[from] NodeDataError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Lock on {node_path} not obtained within {timeout_ms} ms")]
    LockTimeout { node_path: String, timeout_ms: u64 },

    #[error("Unable to connect to cluster {endpoint}: no substrate at {path}")]
    ClusterUnavailable { endpoint: String, path: String },
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

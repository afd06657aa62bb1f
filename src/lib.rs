//! Casecoord: Multi-User Case Coordination
//!
//! Lets independent worker processes share a namespace of cases on a
//! coordination substrate: derived node paths per case, versioned case node
//! data, exclusive and shared locks on node paths, tolerant enumeration of case
//! nodes, cross-cluster namespace migration, and a relational journal of
//! per-data-source ingest jobs.

pub mod collector;
pub mod concurrency;
pub mod config;
pub mod coordination;
pub mod error;
pub mod journal;
pub mod logging;
pub mod migration;
pub mod namespace;
pub mod node_data;
pub mod tooling;
pub mod types;

pub use collector::{CollectionReport, NodeDataCollector};
pub use coordination::{CoordinationService, Lock, LockBroker, SledCoordinationService};
pub use error::{ApiError, CoordinationError, JournalError, MigrationError, NodeDataError};
pub use journal::JobJournal;
pub use migration::{MigrationReport, NamespaceMigrator};
pub use node_data::{CaseNodeData, CaseNodeDataStore};
pub use types::{CategoryNode, LockMode};

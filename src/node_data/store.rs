//! Reads and writes case node data at case directory nodes.
//!
//! Reading repairs what it finds: a missing, empty or undecodable payload is
//! rebuilt from the case metadata, and a version 0 payload is upgraded with its
//! errors flag carried forward. Repaired data is written back before returning.

use super::{CaseMetadata, CaseNodeData, NodeDataVersion};
use crate::coordination::CoordinationService;
use crate::error::{CoordinationError, NodeDataError};
use crate::namespace::case_directory_lock_name;
use crate::types::CategoryNode;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Supplies the metadata of a case, e.g. from its metadata file.
pub trait CaseMetadataSource {
    fn read_metadata(&self, case_directory: &Path) -> Result<CaseMetadata, CoordinationError>;
}

impl<F> CaseMetadataSource for F
where
    F: Fn(&Path) -> Result<CaseMetadata, CoordinationError>,
{
    fn read_metadata(&self, case_directory: &Path) -> Result<CaseMetadata, CoordinationError> {
        self(case_directory)
    }
}

/// Case node data persistence on a coordination substrate.
pub struct CaseNodeDataStore {
    service: Arc<dyn CoordinationService>,
}

impl CaseNodeDataStore {
    pub fn new(service: Arc<dyn CoordinationService>) -> Self {
        Self { service }
    }

    /// Build node data for a new case and write it to the case directory node.
    pub fn create_case_node_data(
        &self,
        metadata: &CaseMetadata,
    ) -> Result<CaseNodeData, CoordinationError> {
        let data = CaseNodeData::from_metadata(metadata)?;
        self.write_case_node_data(&data)?;
        info!(case = %metadata.case_name, "Created case node data");
        Ok(data)
    }

    /// Write node data to the node of the case directory it names.
    pub fn write_case_node_data(&self, data: &CaseNodeData) -> Result<(), CoordinationError> {
        let directory = data.directory().ok_or(NodeDataError::MissingCaseDetails)?;
        let node_path = case_directory_lock_name(directory);
        let bytes = data.to_bytes()?;
        self.service
            .set_node_data(CategoryNode::Cases, &node_path, &bytes)
    }

    /// Read the node data of a case, repairing or upgrading it when needed.
    pub fn read_case_node_data(
        &self,
        case_directory: &Path,
        metadata: &dyn CaseMetadataSource,
    ) -> Result<CaseNodeData, CoordinationError> {
        let node_path = case_directory_lock_name(case_directory);
        let raw = self.service.get_node_data(CategoryNode::Cases, &node_path)?;

        let carried_errors = match raw.as_deref() {
            None | Some([]) => {
                debug!(node_path = %node_path, "No node data, rebuilding from case metadata");
                false
            }
            Some(bytes) => match super::decode(bytes) {
                Ok(data) if data.version() >= NodeDataVersion::V1 => return Ok(data),
                Ok(legacy) => {
                    info!(node_path = %node_path, "Upgrading version 0 node data");
                    legacy.errors_occurred()
                }
                Err(e) => {
                    warn!(node_path = %node_path, error = %e, "Corrupt node data, rebuilding from case metadata");
                    false
                }
            },
        };

        let case_metadata = metadata.read_metadata(case_directory)?;
        let mut data = CaseNodeData::from_metadata(&case_metadata)?;
        data.set_errors_occurred(carried_errors);
        self.write_case_node_data(&data)?;
        Ok(data)
    }
}

//! Node data collection
//!
//! Enumerates the case directory nodes under the cases category and decodes
//! each one. Auxiliary lock nodes are skipped. A node that vanished, failed to
//! read or failed to decode is reported and skipped; only a failure to list the
//! category aborts the collection.

use crate::coordination::CoordinationService;
use crate::error::CoordinationError;
use crate::namespace::classify;
use crate::node_data::{decode_node, CaseNodeData};
use crate::types::CategoryNode;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a case node is missing from a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Deleted between listing and reading.
    Vanished,
    Malformed(String),
    ReadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub node_path: String,
    pub reason: SkipReason,
}

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct CollectionReport {
    pub records: Vec<CaseNodeData>,
    /// Auxiliary lock nodes seen and ignored.
    pub auxiliary: usize,
    pub skipped: Vec<SkippedNode>,
}

impl CollectionReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Collects the node data of every case.
pub struct NodeDataCollector {
    service: Arc<dyn CoordinationService>,
}

impl NodeDataCollector {
    pub fn new(service: Arc<dyn CoordinationService>) -> Self {
        Self { service }
    }

    /// Decoded node data of every case, skipping nodes that cannot be read.
    pub fn collect_all(&self) -> Result<Vec<CaseNodeData>, CoordinationError> {
        Ok(self.collect()?.records)
    }

    pub fn collect(&self) -> Result<CollectionReport, CoordinationError> {
        let node_paths = self.service.list_nodes(CategoryNode::Cases)?;
        let mut report = CollectionReport::default();

        for node_path in node_paths {
            if classify(&node_path).is_auxiliary() {
                report.auxiliary += 1;
                continue;
            }
            match self.read_node(&node_path) {
                Ok(data) => report.records.push(data),
                Err(reason) => {
                    match &reason {
                        SkipReason::Vanished => {
                            debug!(node_path = %node_path, "Case node vanished before it was read")
                        }
                        SkipReason::Malformed(e) | SkipReason::ReadFailed(e) => {
                            warn!(node_path = %node_path, error = %e, "Skipping case node")
                        }
                    }
                    report.skipped.push(SkippedNode { node_path, reason });
                }
            }
        }

        debug!(
            records = report.records.len(),
            auxiliary = report.auxiliary,
            skipped = report.skipped.len(),
            "Collected case node data"
        );
        Ok(report)
    }

    fn read_node(&self, node_path: &str) -> Result<CaseNodeData, SkipReason> {
        let bytes = self
            .service
            .get_node_data(CategoryNode::Cases, node_path)
            .map_err(|e| SkipReason::ReadFailed(e.to_string()))?;
        match bytes {
            None => Err(SkipReason::Vanished),
            Some(bytes) => {
                decode_node(Some(bytes.as_slice())).map_err(|e| SkipReason::Malformed(e.to_string()))
            }
        }
    }
}

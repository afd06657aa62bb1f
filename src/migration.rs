//! Namespace migration
//!
//! Copies every node of every category from a source substrate to a
//! destination substrate. Each destination node is written under a zero-wait
//! exclusive lock on the destination; a node whose lock is held elsewhere is
//! skipped for this pass. Per-node outcomes are collected in a report and a
//! single node's failure never stops the run.
//!
//! The destination is assumed to be quiescent apart from the migration.
//! Readers of partially migrated destination data are not coordinated with.

use crate::coordination::{CoordinationService, LockBroker};
use crate::error::{CoordinationError, MigrationError};
use crate::types::CategoryNode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Copy into a destination that already holds node data.
    pub allow_existing_namespace: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeOutcome {
    Copied { bytes: usize },
    /// Source node had no data; an empty destination node was created.
    CreatedEmpty,
    /// Destination node was locked by another writer.
    SkippedLocked,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub node_path: String,
    pub outcome: NodeOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub category: CategoryNode,
    /// Set when the source category could not be listed.
    pub listing_error: Option<String>,
    pub nodes: Vec<NodeReport>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub categories: Vec<CategoryReport>,
}

impl MigrationReport {
    fn count(&self, pred: impl Fn(&NodeOutcome) -> bool) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.nodes.iter())
            .filter(|n| pred(&n.outcome))
            .count()
    }

    pub fn copied(&self) -> usize {
        self.count(|o| matches!(o, NodeOutcome::Copied { .. } | NodeOutcome::CreatedEmpty))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, NodeOutcome::SkippedLocked))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, NodeOutcome::Failed(_)))
    }

    /// Every category listed and every node copied.
    pub fn is_complete(&self) -> bool {
        self.skipped() == 0
            && self.failed() == 0
            && self.categories.iter().all(|c| c.listing_error.is_none())
    }

    pub fn node(&self, category: CategoryNode, node_path: &str) -> Option<&NodeOutcome> {
        self.categories
            .iter()
            .filter(|c| c.category == category)
            .flat_map(|c| c.nodes.iter())
            .find(|n| n.node_path.eq_ignore_ascii_case(node_path.trim_start_matches('/')))
            .map(|n| &n.outcome)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for category in &self.categories {
            match &category.listing_error {
                Some(e) => writeln!(f, "{}: listing failed: {}", category.category, e)?,
                None => writeln!(f, "{}: {} nodes", category.category, category.nodes.len())?,
            }
            for node in &category.nodes {
                match &node.outcome {
                    NodeOutcome::SkippedLocked => {
                        writeln!(f, "  skipped (locked): {}", node.node_path)?
                    }
                    NodeOutcome::Failed(reason) => {
                        writeln!(f, "  failed: {}: {}", node.node_path, reason)?
                    }
                    _ => {}
                }
            }
        }
        write!(
            f,
            "copied {}, skipped {}, failed {}",
            self.copied(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Copies a namespace between two substrates.
pub struct NamespaceMigrator {
    source: Arc<dyn CoordinationService>,
    destination: Arc<dyn CoordinationService>,
    destination_locks: LockBroker,
    options: MigrationOptions,
}

impl NamespaceMigrator {
    pub fn new(
        source: Arc<dyn CoordinationService>,
        destination: Arc<dyn CoordinationService>,
        options: MigrationOptions,
    ) -> Self {
        let destination_locks = LockBroker::new(destination.clone());
        Self {
            source,
            destination,
            destination_locks,
            options,
        }
    }

    pub fn migrate(&self) -> Result<MigrationReport, MigrationError> {
        if self.destination.holds_namespace_data()? {
            if !self.options.allow_existing_namespace {
                return Err(MigrationError::DestinationNotEmpty {
                    root: self.destination.namespace_root().to_string(),
                });
            }
            warn!(
                root = %self.destination.namespace_root(),
                "Destination already holds node data, overwriting"
            );
        }
        self.destination.ensure_namespace()?;

        let mut report = MigrationReport::default();
        for category in CategoryNode::ALL {
            report.categories.push(self.migrate_category(category));
        }

        info!(
            copied = report.copied(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Namespace migration finished"
        );
        Ok(report)
    }

    fn migrate_category(&self, category: CategoryNode) -> CategoryReport {
        let node_paths = match self.source.list_nodes(category) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(%category, error = %e, "Failed to list source category");
                return CategoryReport {
                    category,
                    listing_error: Some(e.to_string()),
                    nodes: Vec::new(),
                };
            }
        };

        let nodes = node_paths
            .into_iter()
            .map(|node_path| {
                let outcome = match self.migrate_node(category, &node_path) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(%category, node_path = %node_path, error = %e, "Failed to migrate node");
                        NodeOutcome::Failed(e.to_string())
                    }
                };
                NodeReport { node_path, outcome }
            })
            .collect();

        CategoryReport {
            category,
            listing_error: None,
            nodes,
        }
    }

    fn migrate_node(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<NodeOutcome, CoordinationError> {
        // A node deleted since listing still gets a destination node
        let data = self.source.get_node_data(category, node_path)?;

        let lock = match self
            .destination_locks
            .try_get_exclusive_lock(category, node_path)?
        {
            Some(lock) => lock,
            None => {
                debug!(%category, node_path, "Destination node locked, skipping");
                return Ok(NodeOutcome::SkippedLocked);
            }
        };

        let outcome = match data {
            Some(bytes) => {
                self.destination.set_node_data(category, node_path, &bytes)?;
                NodeOutcome::Copied { bytes: bytes.len() }
            }
            None => {
                self.destination.create_node(category, node_path)?;
                NodeOutcome::CreatedEmpty
            }
        };
        lock.release()?;
        Ok(outcome)
    }
}

//! Core types shared by the coordination components.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level grouping node under the namespace root.
///
/// The order of [`CategoryNode::ALL`] is the order migration walks the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryNode {
    Cases,
    Manifests,
    Config,
    CentralRepo,
    HealthMonitor,
}

impl CategoryNode {
    pub const ALL: [CategoryNode; 5] = [
        CategoryNode::Cases,
        CategoryNode::Manifests,
        CategoryNode::Config,
        CategoryNode::CentralRepo,
        CategoryNode::HealthMonitor,
    ];

    /// Name of the category node in the substrate.
    pub fn display_name(&self) -> &'static str {
        match self {
            CategoryNode::Cases => "cases",
            CategoryNode::Manifests => "manifests",
            CategoryNode::Config => "config",
            CategoryNode::CentralRepo => "centralRepository",
            CategoryNode::HealthMonitor => "healthMonitor",
        }
    }
}

impl fmt::Display for CategoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lock grant kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    /// Any number of shared holders, no exclusive holder.
    Shared,
    /// Exactly one holder.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("shared"),
            LockMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// Milliseconds since the Unix epoch, the timestamp unit of every persisted format.
pub type EpochMillis = i64;

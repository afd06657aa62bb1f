//! Coordination Service
//!
//! Contract of the hierarchical, path-addressed coordination substrate shared
//! by every worker process, plus the lock broker built on it.
//!
//! Node paths are relative to a category node. The fully qualified path is
//! `/<namespace root>/<category>/<NODE PATH>`, with the node path upper-cased
//! so case directory paths compare the same on every platform.

pub mod lock;
pub mod sled_service;

use crate::error::CoordinationError;
use crate::types::{CategoryNode, LockMode};
use std::time::Duration;

pub use lock::{Lock, LockBroker};
pub use sled_service::SledCoordinationService;

/// Namespace root used when none is configured.
pub const DEFAULT_NAMESPACE_ROOT: &str = "autopsy";

/// Hierarchical node store with per-path locks.
///
/// Reads of absent nodes return `Ok(None)`. Lock attempts that lose to another
/// holder return `Ok(false)`. Any `Err` means the substrate could not be
/// reached or answered inconsistently, leaving node and lock state unknown.
pub trait CoordinationService: Send + Sync {
    /// Normalized namespace root, e.g. `/autopsy`.
    fn namespace_root(&self) -> &str;

    /// Create the category nodes under the namespace root. Idempotent.
    fn ensure_namespace(&self) -> Result<(), CoordinationError>;

    /// Whether any node other than the category nodes exists.
    fn holds_namespace_data(&self) -> Result<bool, CoordinationError>;

    /// Node paths under `category`.
    fn list_nodes(&self, category: CategoryNode) -> Result<Vec<String>, CoordinationError>;

    fn get_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<Vec<u8>>, CoordinationError>;

    /// Replace the payload of a node, creating the node if needed.
    fn set_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
        data: &[u8],
    ) -> Result<(), CoordinationError>;

    /// Create an empty node if it does not exist.
    fn create_node(&self, category: CategoryNode, node_path: &str)
        -> Result<(), CoordinationError>;

    /// Returns false when there was no such node.
    fn delete_node(&self, category: CategoryNode, node_path: &str)
        -> Result<bool, CoordinationError>;

    /// Single, non-blocking lock attempt on behalf of `owner`.
    fn try_acquire(
        &self,
        category: CategoryNode,
        node_path: &str,
        mode: LockMode,
        owner: &str,
    ) -> Result<bool, CoordinationError>;

    /// Drop `owner`'s grant on the path. Releasing a grant not held is a no-op.
    fn release(
        &self,
        category: CategoryNode,
        node_path: &str,
        owner: &str,
    ) -> Result<(), CoordinationError>;

    /// Park until the lock on the path may have been released, at most `timeout`.
    fn wait_for_release(&self, category: CategoryNode, node_path: &str, timeout: Duration) {
        let _ = (category, node_path);
        std::thread::sleep(timeout);
    }
}

/// Normalize a configured namespace root to `/root` form.
pub fn normalize_namespace_root(root: &str) -> String {
    let trimmed = root.trim().trim_matches('/');
    if trimmed.is_empty() {
        format!("/{}", DEFAULT_NAMESPACE_ROOT)
    } else {
        format!("/{}", trimmed)
    }
}

/// Path of a category node.
pub fn category_node_path(namespace_root: &str, category: CategoryNode) -> String {
    format!("{}/{}", namespace_root, category.display_name())
}

/// Fully qualified substrate path of a node.
///
/// Unix case directories already start with `/`; no second separator is added.
pub fn fully_qualified_node_path(
    namespace_root: &str,
    category: CategoryNode,
    node_path: &str,
) -> String {
    let category_path = category_node_path(namespace_root, category);
    let upper = node_path.to_uppercase();
    if upper.starts_with('/') {
        format!("{}{}", category_path, upper)
    } else {
        format!("{}/{}", category_path, upper)
    }
}

//! Embedded coordination substrate backed by sled.
//!
//! Two trees: `nodes` maps fully qualified node paths to payloads (an empty
//! value is a node with no data) and `locks` maps fully qualified node paths to
//! bincode-encoded [`LockRecord`]s. Lock records only change through
//! compare-and-swap, so concurrent acquirers sharing the database can never
//! both win. Locks belong to the session that opened the database and are
//! cleared when it is opened again.

use super::{
    category_node_path, fully_qualified_node_path, normalize_namespace_root, CoordinationService,
};
use crate::concurrency::LockWaiters;
use crate::error::CoordinationError;
use crate::types::{CategoryNode, EpochMillis, LockMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const NODES_TREE: &str = "nodes";
const LOCKS_TREE: &str = "locks";

/// Holder state of one lock path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockRecord {
    Exclusive {
        owner: String,
        acquired_at: EpochMillis,
    },
    Shared {
        owners: Vec<String>,
    },
}

impl LockRecord {
    fn holds(&self, owner: &str) -> bool {
        match self {
            LockRecord::Exclusive { owner: o, .. } => o == owner,
            LockRecord::Shared { owners } => owners.iter().any(|o| o == owner),
        }
    }
}

fn unavailable(
    operation: &'static str,
    path: &str,
) -> impl FnOnce(sled::Error) -> CoordinationError {
    let path = path.to_string();
    move |source| CoordinationError::Unavailable {
        operation,
        path,
        source,
    }
}

/// Coordination substrate stored in a local sled database.
pub struct SledCoordinationService {
    db: sled::Db,
    nodes: sled::Tree,
    locks: sled::Tree,
    namespace_root: String,
    waiters: LockWaiters,
}

impl SledCoordinationService {
    /// Open (or create) the substrate stored at `path`.
    pub fn open(path: &Path, namespace_root: &str) -> Result<Self, CoordinationError> {
        let db = sled::open(path).map_err(|source| CoordinationError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_db(db, namespace_root)
    }

    /// Substrate that lives only as long as this value.
    pub fn temporary(namespace_root: &str) -> Result<Self, CoordinationError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|source| CoordinationError::Open {
                path: "<temporary>".to_string(),
                source,
            })?;
        Self::from_db(db, namespace_root)
    }

    fn from_db(db: sled::Db, namespace_root: &str) -> Result<Self, CoordinationError> {
        let namespace_root = normalize_namespace_root(namespace_root);
        let nodes = db
            .open_tree(NODES_TREE)
            .map_err(unavailable("open tree", NODES_TREE))?;
        let locks = db
            .open_tree(LOCKS_TREE)
            .map_err(unavailable("open tree", LOCKS_TREE))?;

        let stale = locks.len();
        if stale > 0 {
            locks
                .clear()
                .map_err(unavailable("clear stale locks", &namespace_root))?;
            info!(count = stale, "Cleared lock records left by a previous session");
        }

        Ok(Self {
            db,
            nodes,
            locks,
            namespace_root,
            waiters: LockWaiters::new(),
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), CoordinationError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(unavailable("flush", &self.namespace_root))
    }

    /// Current lock record of a node, for diagnostics.
    pub fn lock_record(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<LockRecord>, CoordinationError> {
        let key = self.full_path(category, node_path);
        let current = self.locks.get(&key).map_err(unavailable("read lock", &key))?;
        current.map(|bytes| decode_record(&key, &bytes)).transpose()
    }

    fn full_path(&self, category: CategoryNode, node_path: &str) -> String {
        fully_qualified_node_path(&self.namespace_root, category, node_path)
    }

    fn category_roots(&self) -> Vec<String> {
        CategoryNode::ALL
            .iter()
            .map(|c| category_node_path(&self.namespace_root, *c))
            .collect()
    }
}

fn decode_record(key: &str, bytes: &[u8]) -> Result<LockRecord, CoordinationError> {
    bincode::deserialize(bytes).map_err(|e| CoordinationError::LockRecordCorrupt {
        path: key.to_string(),
        reason: e.to_string(),
    })
}

fn encode_record(key: &str, record: &LockRecord) -> Result<Vec<u8>, CoordinationError> {
    bincode::serialize(record).map_err(|e| CoordinationError::LockRecordCorrupt {
        path: key.to_string(),
        reason: e.to_string(),
    })
}

impl CoordinationService for SledCoordinationService {
    fn namespace_root(&self) -> &str {
        &self.namespace_root
    }

    fn ensure_namespace(&self) -> Result<(), CoordinationError> {
        for root in self.category_roots() {
            // Leaves an existing category node untouched
            self.nodes
                .compare_and_swap(&root, None::<&[u8]>, Some(Vec::<u8>::new()))
                .map_err(unavailable("create category node", &root))?
                .ok();
        }
        Ok(())
    }

    fn holds_namespace_data(&self) -> Result<bool, CoordinationError> {
        let roots = self.category_roots();
        let prefix = format!("{}/", self.namespace_root);
        for item in self.nodes.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(unavailable("scan namespace", &prefix))?;
            let key = String::from_utf8_lossy(&key);
            if !roots.iter().any(|r| r.as_str() == key) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn list_nodes(&self, category: CategoryNode) -> Result<Vec<String>, CoordinationError> {
        let category_path = category_node_path(&self.namespace_root, category);
        let exists = self
            .nodes
            .contains_key(&category_path)
            .map_err(unavailable("list nodes", &category_path))?;
        if !exists {
            return Err(CoordinationError::NamespaceNotInitialized(category_path));
        }

        let prefix = format!("{}/", category_path);
        let mut children = Vec::new();
        for item in self.nodes.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item.map_err(unavailable("list nodes", &category_path))?;
            let key = String::from_utf8_lossy(&key);
            children.push(key[prefix.len()..].to_string());
        }
        Ok(children)
    }

    fn get_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<Vec<u8>>, CoordinationError> {
        let key = self.full_path(category, node_path);
        let value = self.nodes.get(&key).map_err(unavailable("get node data", &key))?;
        if value.is_none() {
            debug!(path = %key, "Node not found");
        }
        Ok(value.map(|v| v.to_vec()))
    }

    fn set_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
        data: &[u8],
    ) -> Result<(), CoordinationError> {
        let key = self.full_path(category, node_path);
        self.nodes
            .insert(&key, data)
            .map_err(unavailable("set node data", &key))?;
        Ok(())
    }

    fn create_node(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<(), CoordinationError> {
        let key = self.full_path(category, node_path);
        self.nodes
            .compare_and_swap(&key, None::<&[u8]>, Some(Vec::<u8>::new()))
            .map_err(unavailable("create node", &key))?
            .ok();
        Ok(())
    }

    fn delete_node(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<bool, CoordinationError> {
        let key = self.full_path(category, node_path);
        let previous = self
            .nodes
            .remove(&key)
            .map_err(unavailable("delete node", &key))?;
        Ok(previous.is_some())
    }

    fn try_acquire(
        &self,
        category: CategoryNode,
        node_path: &str,
        mode: LockMode,
        owner: &str,
    ) -> Result<bool, CoordinationError> {
        let key = self.full_path(category, node_path);
        loop {
            let current = self.locks.get(&key).map_err(unavailable("acquire lock", &key))?;
            let record = current
                .as_ref()
                .map(|bytes| decode_record(&key, bytes))
                .transpose()?;

            let next = match (record, mode) {
                (None, LockMode::Exclusive) => LockRecord::Exclusive {
                    owner: owner.to_string(),
                    acquired_at: chrono::Utc::now().timestamp_millis(),
                },
                (None, LockMode::Shared) => LockRecord::Shared {
                    owners: vec![owner.to_string()],
                },
                (Some(LockRecord::Shared { mut owners }), LockMode::Shared) => {
                    owners.push(owner.to_string());
                    LockRecord::Shared { owners }
                }
                (Some(_), _) => return Ok(false),
            };

            let swapped = self
                .locks
                .compare_and_swap(&key, current.as_ref(), Some(encode_record(&key, &next)?))
                .map_err(unavailable("acquire lock", &key))?;
            if swapped.is_ok() {
                return Ok(true);
            }
            // Lost a race with another acquirer or releaser, re-read
        }
    }

    fn release(
        &self,
        category: CategoryNode,
        node_path: &str,
        owner: &str,
    ) -> Result<(), CoordinationError> {
        let key = self.full_path(category, node_path);
        loop {
            let current = self.locks.get(&key).map_err(unavailable("release lock", &key))?;
            let record = match current.as_ref() {
                Some(bytes) => decode_record(&key, bytes)?,
                None => return Ok(()),
            };
            if !record.holds(owner) {
                return Ok(());
            }

            let next = match record {
                LockRecord::Exclusive { .. } => None,
                LockRecord::Shared { owners } => {
                    let remaining: Vec<String> =
                        owners.into_iter().filter(|o| o != owner).collect();
                    if remaining.is_empty() {
                        None
                    } else {
                        Some(encode_record(
                            &key,
                            &LockRecord::Shared { owners: remaining },
                        )?)
                    }
                }
            };

            let swapped = self
                .locks
                .compare_and_swap(&key, current.as_ref(), next)
                .map_err(unavailable("release lock", &key))?;
            if swapped.is_ok() {
                self.waiters.notify_released(&key);
                return Ok(());
            }
        }
    }

    fn wait_for_release(&self, category: CategoryNode, node_path: &str, timeout: Duration) {
        let key = self.full_path(category, node_path);
        self.waiters.wait_for_release(&key, timeout);
    }
}

//! Lock broker
//!
//! Exclusive and shared locks keyed by node path. Acquisition either returns a
//! [`Lock`] guard or `None` when the grant could not be obtained in time;
//! contention is never an error. The guard cannot leave the thread that
//! acquired it and releases its grant exactly once.

use super::CoordinationService;
use crate::error::CoordinationError;
use crate::types::{CategoryNode, LockMode};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default interval between acquisition attempts while blocked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);
static SESSION_NONCE: OnceLock<u64> = OnceLock::new();

/// Unique holder identity for one acquisition: process, session, sequence.
fn next_owner_id() -> String {
    let nonce = SESSION_NONCE.get_or_init(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });
    let seq = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{:x}-{}", std::process::id(), nonce, seq)
}

/// Hands out locks on coordination nodes.
#[derive(Clone)]
pub struct LockBroker {
    service: Arc<dyn CoordinationService>,
    poll_interval: Duration,
}

impl LockBroker {
    pub fn new(service: Arc<dyn CoordinationService>) -> Self {
        Self {
            service,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn service(&self) -> &Arc<dyn CoordinationService> {
        &self.service
    }

    /// Exclusive lock without waiting.
    pub fn try_get_exclusive_lock(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<Lock>, CoordinationError> {
        self.acquire(category, node_path, LockMode::Exclusive, Duration::ZERO)
    }

    /// Exclusive lock, waiting up to `timeout`. A zero timeout is a single attempt.
    pub fn get_exclusive_lock(
        &self,
        category: CategoryNode,
        node_path: &str,
        timeout: Duration,
    ) -> Result<Option<Lock>, CoordinationError> {
        self.acquire(category, node_path, LockMode::Exclusive, timeout)
    }

    pub fn try_get_shared_lock(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<Lock>, CoordinationError> {
        self.acquire(category, node_path, LockMode::Shared, Duration::ZERO)
    }

    pub fn get_shared_lock(
        &self,
        category: CategoryNode,
        node_path: &str,
        timeout: Duration,
    ) -> Result<Option<Lock>, CoordinationError> {
        self.acquire(category, node_path, LockMode::Shared, timeout)
    }

    /// Run `f` while holding an exclusive lock on the node.
    ///
    /// Returns `Ok(None)` without running `f` when the lock was not obtained.
    /// The lock is released on every exit path, including unwinding. When `f`
    /// succeeded but the release fails, the error is
    /// [`CoordinationError::ReleaseFailed`]: the effects of `f` are in place
    /// and the grant lapses with the substrate session.
    pub fn with_exclusive_lock<T, E, F>(
        &self,
        category: CategoryNode,
        node_path: &str,
        timeout: Duration,
        f: F,
    ) -> Result<Option<T>, E>
    where
        E: From<CoordinationError>,
        F: FnOnce(&Lock) -> Result<T, E>,
    {
        let lock = match self.get_exclusive_lock(category, node_path, timeout)? {
            Some(lock) => lock,
            None => return Ok(None),
        };
        let result = f(&lock);
        match result {
            Ok(value) => {
                let node_path = lock.node_path().to_string();
                lock.release()
                    .map_err(|source| CoordinationError::ReleaseFailed {
                        node_path,
                        source: Box::new(source),
                    })?;
                Ok(Some(value))
            }
            // Drop releases the grant and logs if that fails too
            Err(e) => Err(e),
        }
    }

    fn acquire(
        &self,
        category: CategoryNode,
        node_path: &str,
        mode: LockMode,
        timeout: Duration,
    ) -> Result<Option<Lock>, CoordinationError> {
        let owner = next_owner_id();
        let deadline = Instant::now() + timeout;
        loop {
            if self.service.try_acquire(category, node_path, mode, &owner)? {
                debug!(%category, node_path, %mode, owner = %owner, "Lock acquired");
                return Ok(Some(Lock {
                    service: self.service.clone(),
                    category,
                    node_path: node_path.to_string(),
                    owner,
                    mode,
                    released: false,
                    _not_send: PhantomData,
                }));
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(%category, node_path, %mode, "Lock not acquired");
                return Ok(None);
            }
            let slice = (deadline - now).min(self.poll_interval);
            self.service.wait_for_release(category, node_path, slice);
        }
    }
}

/// A held grant on a node path.
///
/// Released by [`Lock::release`] or when dropped. Not `Send`: the grant must be
/// released on the thread that acquired it.
pub struct Lock {
    service: Arc<dyn CoordinationService>,
    category: CategoryNode,
    node_path: String,
    owner: String,
    mode: LockMode,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl Lock {
    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    pub fn category(&self) -> CategoryNode {
        self.category
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Release the grant, surfacing substrate failures.
    pub fn release(mut self) -> Result<(), CoordinationError> {
        self.released = true;
        self.service
            .release(self.category, &self.node_path, &self.owner)?;
        debug!(category = %self.category, node_path = %self.node_path, "Lock released");
        Ok(())
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self
            .service
            .release(self.category, &self.node_path, &self.owner)
        {
            warn!(
                category = %self.category,
                node_path = %self.node_path,
                error = %e,
                "Failed to release lock"
            );
        }
    }
}

impl std::fmt::Debug for Lock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("category", &self.category)
            .field("node_path", &self.node_path)
            .field("mode", &self.mode)
            .finish()
    }
}

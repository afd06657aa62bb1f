use casecoord::coordination::{CoordinationService, LockBroker, SledCoordinationService};
use casecoord::error::CoordinationError;
use casecoord::types::{CategoryNode, LockMode};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::support::substrate;

#[test]
fn concurrent_zero_wait_acquires_have_one_winner() {
    let broker = LockBroker::new(substrate());
    let barrier = Arc::new(Barrier::new(16));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let broker = broker.clone();
            let barrier = barrier.clone();
            let winners = winners.clone();
            thread::spawn(move || {
                barrier.wait();
                let lock = broker
                    .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/Race")
                    .unwrap();
                if lock.is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
                // Hold until every thread has attempted
                barrier.wait();
                drop(lock);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[test]
fn locks_on_different_paths_are_independent() {
    let broker = LockBroker::new(substrate());
    let a = broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/A")
        .unwrap();
    let b = broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/B")
        .unwrap();
    let other_category = broker
        .try_get_exclusive_lock(CategoryNode::Manifests, "/shared/cases/A")
        .unwrap();
    assert!(a.is_some() && b.is_some() && other_category.is_some());
}

#[test]
fn node_paths_lock_case_insensitively() {
    let broker = LockBroker::new(substrate());
    let _held = broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/Mixed")
        .unwrap()
        .unwrap();
    assert!(broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/SHARED/CASES/MIXED")
        .unwrap()
        .is_none());
}

#[test]
fn shared_holders_delay_exclusive_until_released() {
    let broker = LockBroker::new(substrate()).with_poll_interval(Duration::from_millis(5));
    let reader = broker
        .get_shared_lock(CategoryNode::Cases, "/c", Duration::ZERO)
        .unwrap()
        .unwrap();
    assert_eq!(reader.mode(), LockMode::Shared);

    let writer = {
        let broker = broker.clone();
        thread::spawn(move || {
            broker
                .get_exclusive_lock(CategoryNode::Cases, "/c", Duration::from_secs(5))
                .unwrap()
                .map(|lock| lock.mode())
        })
    };
    thread::sleep(Duration::from_millis(30));
    reader.release().unwrap();
    assert_eq!(writer.join().unwrap(), Some(LockMode::Exclusive));
}

#[test]
fn scoped_lock_released_when_closure_panics() {
    let broker = LockBroker::new(substrate());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let _: Result<Option<()>, CoordinationError> = broker.with_exclusive_lock(
            CategoryNode::Cases,
            "/shared/cases/Panics",
            Duration::ZERO,
            |_| panic!("worker crashed"),
        );
    }));
    assert!(outcome.is_err());
    assert!(broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/Panics")
        .unwrap()
        .is_some());
}

#[test]
fn with_exclusive_lock_skips_when_contended() {
    let broker = LockBroker::new(substrate());
    let _held = broker
        .try_get_exclusive_lock(CategoryNode::Cases, "/c")
        .unwrap()
        .unwrap();
    let mut ran = false;
    let result: Result<Option<()>, CoordinationError> =
        broker.with_exclusive_lock(CategoryNode::Cases, "/c", Duration::ZERO, |_| {
            ran = true;
            Ok(())
        });
    assert!(result.unwrap().is_none());
    assert!(!ran);
}

#[test]
fn reopening_substrate_drops_locks_of_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = SledCoordinationService::open(dir.path(), "autopsy").unwrap();
        service.ensure_namespace().unwrap();
        // A holder that never releases, as if its process crashed
        assert!(service
            .try_acquire(CategoryNode::Cases, "/c", LockMode::Exclusive, "crashed-holder")
            .unwrap());
        service.flush().unwrap();
    }
    let service = Arc::new(SledCoordinationService::open(dir.path(), "autopsy").unwrap());
    assert!(service
        .try_acquire(CategoryNode::Cases, "/c", LockMode::Exclusive, "next-session")
        .unwrap());
}

/// Substrate whose lock releases always fail.
struct FailingRelease {
    inner: Arc<SledCoordinationService>,
}

impl CoordinationService for FailingRelease {
    fn namespace_root(&self) -> &str {
        self.inner.namespace_root()
    }
    fn ensure_namespace(&self) -> Result<(), CoordinationError> {
        self.inner.ensure_namespace()
    }
    fn holds_namespace_data(&self) -> Result<bool, CoordinationError> {
        self.inner.holds_namespace_data()
    }
    fn list_nodes(&self, category: CategoryNode) -> Result<Vec<String>, CoordinationError> {
        self.inner.list_nodes(category)
    }
    fn get_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
    ) -> Result<Option<Vec<u8>>, CoordinationError> {
        self.inner.get_node_data(category, node_path)
    }
    fn set_node_data(
        &self,
        category: CategoryNode,
        node_path: &str,
        data: &[u8],
    ) -> Result<(), CoordinationError> {
        self.inner.set_node_data(category, node_path, data)
    }
    fn create_node(&self, category: CategoryNode, node_path: &str) -> Result<(), CoordinationError> {
        self.inner.create_node(category, node_path)
    }
    fn delete_node(&self, category: CategoryNode, node_path: &str) -> Result<bool, CoordinationError> {
        self.inner.delete_node(category, node_path)
    }
    fn try_acquire(
        &self,
        category: CategoryNode,
        node_path: &str,
        mode: LockMode,
        owner: &str,
    ) -> Result<bool, CoordinationError> {
        self.inner.try_acquire(category, node_path, mode, owner)
    }
    fn release(&self, _category: CategoryNode, node_path: &str, _owner: &str) -> Result<(), CoordinationError> {
        Err(CoordinationError::Unavailable {
            operation: "release lock",
            path: node_path.to_string(),
            source: sled::Error::Unsupported("connection reset".to_string()),
        })
    }
    fn wait_for_release(&self, category: CategoryNode, node_path: &str, timeout: Duration) {
        self.inner.wait_for_release(category, node_path, timeout)
    }
}

#[test]
fn release_failure_after_guarded_write_is_distinguishable() {
    let inner = substrate();
    let broker = LockBroker::new(Arc::new(FailingRelease {
        inner: inner.clone(),
    }));
    let result: Result<Option<()>, CoordinationError> = broker.with_exclusive_lock(
        CategoryNode::Cases,
        "/shared/cases/Written",
        Duration::ZERO,
        |lock| {
            broker
                .service()
                .set_node_data(lock.category(), lock.node_path(), b"payload")
        },
    );
    match result {
        Err(CoordinationError::ReleaseFailed { node_path, .. }) => {
            assert_eq!(node_path, "/shared/cases/Written")
        }
        other => panic!("expected ReleaseFailed, got {:?}", other),
    }
    assert_eq!(
        inner
            .get_node_data(CategoryNode::Cases, "/shared/cases/Written")
            .unwrap(),
        Some(b"payload".to_vec())
    );
}

use casecoord::collector::{NodeDataCollector, SkipReason};
use casecoord::coordination::{CoordinationService, SledCoordinationService};
use casecoord::error::CoordinationError;
use casecoord::namespace::{
    case_auto_ingest_log_lock_name, case_name_lock_name, case_resources_lock_name,
};
use casecoord::node_data::CaseNodeDataStore;
use casecoord::types::{CategoryNode, LockMode};
use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::support::{case_metadata, substrate};

fn populate(service: &Arc<SledCoordinationService>, valid: usize, malformed: usize) {
    let store = CaseNodeDataStore::new(service.clone());
    for i in 0..valid {
        let dir = format!("/shared/cases/Case{}_20210601_083000", i);
        store.create_case_node_data(&case_metadata(&dir)).unwrap();
        let path = Path::new(&dir);
        for aux in [
            case_name_lock_name(path),
            case_resources_lock_name(path),
            case_auto_ingest_log_lock_name(path),
        ] {
            service.create_node(CategoryNode::Cases, &aux).unwrap();
        }
    }
    for i in 0..malformed {
        // Version 1 header with the details cut off
        service
            .set_node_data(
                CategoryNode::Cases,
                &format!("/shared/cases/Broken{}", i),
                &[0, 0, 0, 1, 0, 0, 9],
            )
            .unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn collects_every_valid_case(valid in 0usize..6, malformed in 0usize..6) {
        let service = substrate();
        populate(&service, valid, malformed);

        let report = NodeDataCollector::new(service).collect().unwrap();
        prop_assert_eq!(report.records.len(), valid);
        prop_assert_eq!(report.auxiliary, valid * 3);
        prop_assert_eq!(report.skipped.len(), malformed);
    }
}

#[test]
fn legacy_nodes_are_collected_without_details() {
    let service = substrate();
    populate(&service, 2, 0);
    service
        .set_node_data(CategoryNode::Cases, "/shared/cases/Old", &[0, 0, 0, 0, 0xFF])
        .unwrap();

    let records = NodeDataCollector::new(service).collect_all().unwrap();
    assert_eq!(records.len(), 3);
    let legacy: Vec<_> = records.iter().filter(|r| r.details().is_none()).collect();
    assert_eq!(legacy.len(), 1);
    assert!(legacy[0].errors_occurred());
}

/// Substrate whose reads of one path fail or find nothing.
struct FaultyReads {
    inner: Arc<SledCoordinationService>,
    failing: &'static str,
    vanishing: &'static str,
}

impl CoordinationService for FaultyReads {
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
        if node_path.eq_ignore_ascii_case(self.failing.trim_start_matches('/')) {
            return Err(CoordinationError::Unavailable {
                operation: "get node data",
                path: node_path.to_string(),
                source: sled::Error::Unsupported("connection reset".to_string()),
            });
        }
        if node_path.eq_ignore_ascii_case(self.vanishing.trim_start_matches('/')) {
            return Ok(None);
        }
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
    fn release(&self, category: CategoryNode, node_path: &str, owner: &str) -> Result<(), CoordinationError> {
        self.inner.release(category, node_path, owner)
    }
    fn wait_for_release(&self, category: CategoryNode, node_path: &str, timeout: Duration) {
        self.inner.wait_for_release(category, node_path, timeout)
    }
}

#[test]
fn read_failures_and_vanished_nodes_are_skipped() {
    let inner = substrate();
    populate(&inner, 3, 0);
    let faulty = FaultyReads {
        inner,
        failing: "/shared/cases/Case0_20210601_083000",
        vanishing: "/shared/cases/Case1_20210601_083000",
    };

    let report = NodeDataCollector::new(Arc::new(faulty)).collect().unwrap();
    assert_eq!(report.records.len(), 1);
    assert!(!report.is_complete());
    let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason.clone()).collect();
    assert!(reasons.iter().any(|r| matches!(r, SkipReason::ReadFailed(_))));
    assert!(reasons.contains(&SkipReason::Vanished));
}

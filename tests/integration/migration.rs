use casecoord::coordination::{CoordinationService, LockBroker, SledCoordinationService};
use casecoord::error::MigrationError;
use casecoord::migration::{MigrationOptions, NamespaceMigrator, NodeOutcome};
use casecoord::node_data::{decode, CaseNodeDataStore};
use casecoord::types::CategoryNode;
use std::sync::Arc;

use super::support::{case_metadata, substrate};

fn seeded_source() -> Arc<SledCoordinationService> {
    let source = substrate();
    let store = CaseNodeDataStore::new(source.clone());
    for dir in ["/shared/cases/A", "/shared/cases/B", "/shared/cases/C"] {
        store.create_case_node_data(&case_metadata(dir)).unwrap();
    }
    source
        .set_node_data(CategoryNode::Manifests, "/input/m1.xml", b"<manifest/>")
        .unwrap();
    source
        .create_node(CategoryNode::HealthMonitor, "status")
        .unwrap();
    source
}

#[test]
fn locked_destination_node_is_skipped_and_rest_is_copied() {
    let source = seeded_source();
    let destination = substrate();

    let other_writer = LockBroker::new(destination.clone());
    let held = other_writer
        .try_get_exclusive_lock(CategoryNode::Cases, "/shared/cases/B")
        .unwrap()
        .unwrap();

    let report = NamespaceMigrator::new(
        source.clone(),
        destination.clone(),
        MigrationOptions::default(),
    )
    .migrate()
    .unwrap();

    assert_eq!(
        report.node(CategoryNode::Cases, "/shared/cases/B"),
        Some(&NodeOutcome::SkippedLocked)
    );
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.copied(), 4);
    assert!(!report.is_complete());
    assert!(destination
        .get_node_data(CategoryNode::Cases, "/shared/cases/B")
        .unwrap()
        .is_none());

    let copied = destination
        .get_node_data(CategoryNode::Cases, "/shared/cases/A")
        .unwrap()
        .unwrap();
    assert_eq!(decode(&copied).unwrap().name(), Some("A"));

    // A second pass picks up what the first one skipped
    held.release().unwrap();
    let retry = NamespaceMigrator::new(
        source,
        destination.clone(),
        MigrationOptions {
            allow_existing_namespace: true,
        },
    )
    .migrate()
    .unwrap();
    assert!(retry.is_complete());
    assert!(destination
        .get_node_data(CategoryNode::Cases, "/shared/cases/B")
        .unwrap()
        .is_some());
}

#[test]
fn empty_source_nodes_are_recreated_empty() {
    let source = seeded_source();
    let destination = substrate();
    let report = NamespaceMigrator::new(source, destination.clone(), MigrationOptions::default())
        .migrate()
        .unwrap();
    assert_eq!(
        report.node(CategoryNode::HealthMonitor, "status"),
        Some(&NodeOutcome::Copied { bytes: 0 })
    );
    assert_eq!(
        destination
            .get_node_data(CategoryNode::HealthMonitor, "status")
            .unwrap(),
        Some(Vec::new())
    );
}

#[test]
fn migration_walks_categories_in_fixed_order() {
    let report = NamespaceMigrator::new(seeded_source(), substrate(), MigrationOptions::default())
        .migrate()
        .unwrap();
    let order: Vec<_> = report.categories.iter().map(|c| c.category).collect();
    assert_eq!(order, CategoryNode::ALL.to_vec());
}

#[test]
fn populated_destination_is_refused_by_default() {
    let destination = substrate();
    destination
        .set_node_data(CategoryNode::Config, "existing", b"keep")
        .unwrap();
    let result =
        NamespaceMigrator::new(seeded_source(), destination.clone(), MigrationOptions::default())
            .migrate();
    assert!(matches!(result, Err(MigrationError::DestinationNotEmpty { .. })));
    assert_eq!(
        destination.get_node_data(CategoryNode::Config, "existing").unwrap(),
        Some(b"keep".to_vec())
    );
}

#[test]
fn migration_between_on_disk_clusters_persists() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_source();
    {
        let destination =
            Arc::new(SledCoordinationService::open(&dir.path().join("dst"), "autopsy").unwrap());
        let report = NamespaceMigrator::new(
            source.clone(),
            destination.clone(),
            MigrationOptions::default(),
        )
        .migrate()
        .unwrap();
        assert!(report.is_complete());
        destination.flush().unwrap();
    }
    let reopened = SledCoordinationService::open(&dir.path().join("dst"), "autopsy").unwrap();
    assert_eq!(
        reopened.list_nodes(CategoryNode::Cases).unwrap().len(),
        source.list_nodes(CategoryNode::Cases).unwrap().len()
    );
}

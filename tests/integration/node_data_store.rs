use casecoord::coordination::{CoordinationService, SledCoordinationService};
use casecoord::error::CoordinationError;
use casecoord::node_data::{
    decode, CaseMetadata, CaseNodeDataStore, DeletedItems, NodeDataVersion,
};
use casecoord::types::CategoryNode;
use chrono::{TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;

use super::support::case_metadata;

const CASE_DIR: &str = "/shared/cases/Robbery_20210601_083000";

fn metadata_source(dir: &Path) -> Result<CaseMetadata, CoordinationError> {
    Ok(case_metadata(&dir.to_string_lossy()))
}

#[test]
fn lifecycle_mutations_persist_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = Arc::new(SledCoordinationService::open(dir.path(), "autopsy").unwrap());
        service.ensure_namespace().unwrap();
        let store = CaseNodeDataStore::new(service.clone());
        let mut data = store.create_case_node_data(&case_metadata(CASE_DIR)).unwrap();

        data.set_errors_occurred(true);
        data.set_display_name("Robbery (closed)").unwrap();
        data.set_last_access_date(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        data.set_deleted_flag(DeletedItems::DATA_SOURCES).unwrap();
        store.write_case_node_data(&data).unwrap();
        service.flush().unwrap();
    }

    let service = Arc::new(SledCoordinationService::open(dir.path(), "autopsy").unwrap());
    let store = CaseNodeDataStore::new(service);
    let data = store
        .read_case_node_data(Path::new(CASE_DIR), &metadata_source)
        .unwrap();
    assert!(data.errors_occurred());
    assert_eq!(data.display_name(), Some("Robbery (closed)"));
    assert_eq!(
        data.last_access_date(),
        Some(Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap())
    );
    assert!(data.is_deleted_flag_set(DeletedItems::DATA_SOURCES));
    assert!(!data.is_deleted_flag_set(DeletedItems::CASE_DIR));
}

#[test]
fn legacy_error_flag_survives_upgrade() {
    let service = Arc::new(SledCoordinationService::temporary("autopsy").unwrap());
    service.ensure_namespace().unwrap();
    service
        .set_node_data(CategoryNode::Cases, CASE_DIR, &[0, 0, 0, 0, 0xFF])
        .unwrap();

    let store = CaseNodeDataStore::new(service.clone());
    let upgraded = store
        .read_case_node_data(Path::new(CASE_DIR), &metadata_source)
        .unwrap();
    assert_eq!(upgraded.version(), NodeDataVersion::V1);
    assert!(upgraded.errors_occurred());
    assert_eq!(upgraded.name(), Some("Robbery_20210601_083000"));

    let stored = service
        .get_node_data(CategoryNode::Cases, CASE_DIR)
        .unwrap()
        .unwrap();
    let reread = decode(&stored).unwrap();
    assert_eq!(reread.version(), NodeDataVersion::V1);
    assert!(reread.errors_occurred());
}

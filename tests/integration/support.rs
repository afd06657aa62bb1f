use casecoord::coordination::{CoordinationService, SledCoordinationService};
use casecoord::node_data::CaseMetadata;
use std::sync::Arc;

pub fn substrate() -> Arc<SledCoordinationService> {
    let service = SledCoordinationService::temporary("autopsy").unwrap();
    service.ensure_namespace().unwrap();
    Arc::new(service)
}

pub fn case_metadata(case_directory: &str) -> CaseMetadata {
    let name = case_directory
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(case_directory)
        .to_string();
    CaseMetadata {
        case_directory: case_directory.to_string(),
        case_name: name.clone(),
        case_display_name: name,
        created_date: "2021/06/01 08:30:00 (UTC)".to_string(),
    }
}

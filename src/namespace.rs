//! Case Node Namespace
//!
//! Maps a case directory path to the coordination node paths used to lock and
//! describe the case, and classifies arbitrary node paths back into those kinds.
//! Everything here is pure string manipulation.
//!
//! The derived paths cannot collide with a real case directory node: the
//! resources lock carries a fixed suffix, the auto ingest log lock is a file
//! inside the case directory, and the name lock is a bare name with no
//! separators.
//!
//! Known weak spot: a node path is classified as a name lock purely because it
//! contains no `/` or `\`. A case directory node whose path has no separators
//! would be misclassified. Existing deployments rely on this convention, so it
//! is kept as is.

use std::path::Path;

/// Suffix appended to a case directory path to form its resources lock node.
pub const RESOURCES_LOCK_SUFFIX: &str = "_RESOURCES";

/// File name of the auto ingest log inside a case directory.
pub const AUTO_INGEST_LOG_NAME: &str = "AUTO_INGEST_LOG.TXT";

/// Length of the `yyyyMMdd_HHmmss` stamp appended to case directory names.
const TIME_STAMP_LEN: usize = 15;

/// Kind of a node path found under the cases category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseNodeKind {
    /// The case directory node holding [`crate::node_data::CaseNodeData`].
    CaseDirectory,
    /// Case name lock node.
    NameLock,
    /// Case resources lock node.
    ResourcesLock,
    /// Auto ingest log lock node.
    AutoIngestLogLock,
}

impl CaseNodeKind {
    /// Auxiliary lock nodes carry no case data.
    pub fn is_auxiliary(&self) -> bool {
        !matches!(self, CaseNodeKind::CaseDirectory)
    }
}

fn path_str(case_directory: &Path) -> String {
    case_directory.to_string_lossy().into_owned()
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Separator style already used by `path`; forward slash when there is none.
fn separator_of(path: &str) -> char {
    if path.contains('\\') && !path.contains('/') {
        '\\'
    } else {
        '/'
    }
}

fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Remove a trailing `yyyyMMdd_HHmmss` stamp, if present.
fn remove_time_stamp(name: &str) -> &str {
    if name.len() < TIME_STAMP_LEN || !name.is_char_boundary(name.len() - TIME_STAMP_LEN) {
        return name;
    }
    let (head, stamp) = name.split_at(name.len() - TIME_STAMP_LEN);
    let bytes = stamp.as_bytes();
    let is_stamp = bytes.iter().enumerate().all(|(i, b)| {
        if i == 8 {
            *b == b'_'
        } else {
            b.is_ascii_digit()
        }
    });
    if is_stamp {
        head
    } else {
        name
    }
}

/// Node path of the case directory lock, which is also the node holding case data.
pub fn case_directory_lock_name(case_directory: &Path) -> String {
    path_str(case_directory)
}

/// Node path of the case name lock: the case directory name without its time stamp.
pub fn case_name_lock_name(case_directory: &Path) -> String {
    let path = path_str(case_directory);
    let segment = last_segment(&path);
    let name = remove_time_stamp(segment);
    if name.len() == segment.len() {
        return name.to_string();
    }
    name.strip_suffix('_').unwrap_or(name).to_string()
}

/// Node path of the case resources lock.
pub fn case_resources_lock_name(case_directory: &Path) -> String {
    format!("{}{}", path_str(case_directory), RESOURCES_LOCK_SUFFIX)
}

/// Node path of the auto ingest log lock.
pub fn case_auto_ingest_log_lock_name(case_directory: &Path) -> String {
    let path = path_str(case_directory);
    let separator = separator_of(&path);
    let base = path.trim_end_matches(is_separator);
    format!("{}{}{}", base, separator, AUTO_INGEST_LOG_NAME)
}

/// Whether `node_path` is a case name lock node path.
pub fn is_case_name_lock_name(node_path: &str) -> bool {
    !node_path.contains(is_separator)
}

/// Whether `node_path` is a case resources lock node path.
pub fn is_case_resources_lock_name(node_path: &str) -> bool {
    node_path
        .to_ascii_uppercase()
        .ends_with(RESOURCES_LOCK_SUFFIX)
}

/// Whether `node_path` is an auto ingest log lock node path.
pub fn is_case_auto_ingest_log_lock_name(node_path: &str) -> bool {
    node_path.contains(is_separator)
        && last_segment(node_path).eq_ignore_ascii_case(AUTO_INGEST_LOG_NAME)
}

/// Classify a node path found under the cases category.
pub fn classify(node_path: &str) -> CaseNodeKind {
    if is_case_resources_lock_name(node_path) {
        CaseNodeKind::ResourcesLock
    } else if is_case_auto_ingest_log_lock_name(node_path) {
        CaseNodeKind::AutoIngestLogLock
    } else if is_case_name_lock_name(node_path) {
        CaseNodeKind::NameLock
    } else {
        CaseNodeKind::CaseDirectory
    }
}

//! CLI Tooling
//!
//! Operator commands over a cluster's case namespace and the job journal.

use crate::collector::NodeDataCollector;
use crate::config::{CaseCoordConfig, ClusterEndpoint, ConfigLoader};
use crate::coordination::{
    fully_qualified_node_path, CoordinationService, LockBroker, SledCoordinationService,
};
use crate::error::ApiError;
use crate::journal::{CaseRecord, IngestJobRecord, IngestJobStatus, JobJournal};
use crate::namespace::{
    case_auto_ingest_log_lock_name, case_directory_lock_name, case_name_lock_name,
    case_resources_lock_name,
};
use crate::node_data::{decode, CaseNodeData, DeletedItems};
use crate::types::CategoryNode;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Case coordination CLI
#[derive(Parser)]
#[command(name = "casecoord")]
#[command(about = "Inspect the shared case namespace and the ingest job journal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Coordination cluster endpoint
    #[arg(long, default_value = "localhost:2181")]
    pub cluster: String,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply the logging flags over the configured logging section.
    pub fn apply_log_overrides(&self, config: &mut CaseCoordConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the category nodes of the namespace
    Init,
    /// Case node commands
    Cases {
        #[command(subcommand)]
        command: CaseCommands,
    },
    /// Job journal commands
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },
}

#[derive(Subcommand)]
pub enum CaseCommands {
    /// List the node data of every case
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the node data of one case
    Show {
        case_dir: PathBuf,
        /// Print the stored bytes as hex
        #[arg(long)]
        raw: bool,
    },
    /// Print the node paths derived from a case directory
    Paths { case_dir: PathBuf },
    /// Change the display name of a case, holding its case directory lock
    SetDisplayName {
        case_dir: PathBuf,
        display_name: String,
    },
}

#[derive(Subcommand)]
pub enum JournalCommands {
    /// List ingest jobs in a status
    Jobs {
        /// pending, running or done
        #[arg(long)]
        status: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List cases known to the journal
    Cases {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

/// CLI context holding loaded configuration and the target cluster.
pub struct CliContext {
    config: CaseCoordConfig,
    cluster: ClusterEndpoint,
}

impl CliContext {
    /// Load configuration and parse the cluster endpoint.
    pub fn new(config_path: Option<PathBuf>, cluster: &str) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_with_file(path)?,
            None => ConfigLoader::load()?,
        };
        Self::with_config(config, cluster)
    }

    pub fn with_config(config: CaseCoordConfig, cluster: &str) -> Result<Self, ApiError> {
        Ok(Self {
            config,
            cluster: cluster.parse()?,
        })
    }

    pub fn config(&self) -> &CaseCoordConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut CaseCoordConfig {
        &mut self.config
    }

    fn open_substrate(&self) -> Result<Arc<SledCoordinationService>, ApiError> {
        Ok(Arc::new(self.cluster.open(&self.config.coordination)?))
    }

    fn open_journal(&self) -> Result<JobJournal, ApiError> {
        let path = self.config.journal.resolve_path()?;
        Ok(JobJournal::open(&path, &self.config.journal.options())?)
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Init => {
                let substrate = self.open_substrate()?;
                substrate.ensure_namespace()?;
                substrate.flush()?;
                info!(cluster = %self.cluster, "Initialized namespace");
                Ok(format!(
                    "Initialized namespace {} on {}",
                    substrate.namespace_root(),
                    self.cluster
                ))
            }
            Commands::Cases { command } => self.execute_cases(command),
            Commands::Journal { command } => self.execute_journal(command),
        }
    }

    fn execute_cases(&self, command: &CaseCommands) -> Result<String, ApiError> {
        match command {
            CaseCommands::List { format } => {
                let substrate = self.open_substrate()?;
                let report = NodeDataCollector::new(substrate).collect()?;
                if format == "json" {
                    let cases: Vec<_> = report.records.iter().map(case_node_json).collect();
                    let out = json!({
                        "cases": cases,
                        "skipped": report.skipped,
                        "total": report.records.len(),
                    });
                    return to_pretty_json(&out);
                }
                let mut output = format_case_table(&report.records);
                if !report.skipped.is_empty() {
                    output.push_str(&format!(
                        "\nSkipped {} unreadable case node(s)",
                        report.skipped.len()
                    ));
                }
                Ok(output)
            }
            CaseCommands::Show { case_dir, raw } => {
                let substrate = self.open_substrate()?;
                let node_path = case_directory_lock_name(case_dir);
                let bytes = match substrate.get_node_data(CategoryNode::Cases, &node_path)? {
                    Some(bytes) => bytes,
                    None => return Ok(format!("No node for case directory {}", node_path)),
                };
                if *raw {
                    return Ok(hex::encode(&bytes));
                }
                Ok(format_case_node_text(&decode(&bytes)?))
            }
            CaseCommands::Paths { case_dir } => Ok(format_case_paths(
                &self.config.coordination.namespace_root,
                case_dir,
            )),
            CaseCommands::SetDisplayName {
                case_dir,
                display_name,
            } => {
                let data = self.set_display_name(case_dir, display_name)?;
                Ok(format_case_node_text(&data))
            }
        }
    }

    fn set_display_name(
        &self,
        case_dir: &Path,
        display_name: &str,
    ) -> Result<CaseNodeData, ApiError> {
        let substrate = self.open_substrate()?;
        let coordination = &self.config.coordination;
        let broker = LockBroker::new(substrate.clone())
            .with_poll_interval(coordination.lock_poll_interval());
        let node_path = case_directory_lock_name(case_dir);

        let updated = broker.with_exclusive_lock(
            CategoryNode::Cases,
            &node_path,
            coordination.lock_timeout(),
            |_| -> Result<CaseNodeData, ApiError> {
                let bytes = substrate
                    .get_node_data(CategoryNode::Cases, &node_path)?
                    .ok_or_else(|| {
                        ApiError::InvalidArgument(format!(
                            "No node for case directory {}",
                            node_path
                        ))
                    })?;
                let mut data = decode(&bytes)?;
                data.set_display_name(display_name)?;
                substrate.set_node_data(CategoryNode::Cases, &node_path, &data.to_bytes()?)?;
                Ok(data)
            },
        )?;
        let data = updated.ok_or_else(|| ApiError::LockTimeout {
            node_path: node_path.clone(),
            timeout_ms: coordination.lock_timeout_ms,
        })?;
        substrate.flush()?;
        info!(node_path = %node_path, display_name, "Updated case display name");
        Ok(data)
    }

    fn execute_journal(&self, command: &JournalCommands) -> Result<String, ApiError> {
        let journal = self.open_journal()?;
        let output = match command {
            JournalCommands::Jobs { status, format } => {
                let status: IngestJobStatus =
                    status.parse().map_err(ApiError::InvalidArgument)?;
                let jobs = journal.get_jobs(status)?;
                if format == "json" {
                    to_pretty_json(&json!({ "jobs": jobs, "total": jobs.len() }))?
                } else {
                    format_job_table(&jobs)
                }
            }
            JournalCommands::Cases { format } => {
                let cases = journal.get_cases()?;
                if format == "json" {
                    to_pretty_json(&json!({ "cases": cases, "total": cases.len() }))?
                } else {
                    format_journal_case_table(&cases)
                }
            }
        };
        journal.close()?;
        Ok(output)
    }
}

fn to_pretty_json(value: &serde_json::Value) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::InvalidArgument(format!("Failed to render JSON: {}", e)))
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn deleted_items_label(flags: DeletedItems) -> String {
    if flags.is_empty() {
        return "-".to_string();
    }
    flags
        .iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("|")
}

fn case_node_json(data: &CaseNodeData) -> serde_json::Value {
    json!({
        "version": data.version().as_raw(),
        "name": data.name(),
        "display_name": data.display_name(),
        "directory": data.details().map(|d| d.directory.as_str()),
        "create_date": data.create_date().map(|d| d.to_rfc3339()),
        "last_access_date": data.last_access_date().map(|d| d.to_rfc3339()),
        "errors_occurred": data.errors_occurred(),
        "deleted_items": data.details().map(|d| d.deleted_items.bits()).unwrap_or(0),
    })
}

fn format_case_table(records: &[CaseNodeData]) -> String {
    if records.is_empty() {
        return "No cases found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Name",
        "Display Name",
        "Directory",
        "Created",
        "Last Access",
        "Errors",
        "Deleted",
    ]);
    for data in records {
        let deleted = data
            .details()
            .map(|d| deleted_items_label(d.deleted_items))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            data.name().unwrap_or("-").to_string(),
            data.display_name().unwrap_or("-").to_string(),
            data.details()
                .map(|d| d.directory.clone())
                .unwrap_or_else(|| "-".to_string()),
            format_time(data.create_date()),
            format_time(data.last_access_date()),
            if data.errors_occurred() { "yes" } else { "no" }.to_string(),
            deleted,
        ]);
    }
    format!("{}\n\nTotal: {} case(s)", table, records.len())
}

fn format_case_node_text(data: &CaseNodeData) -> String {
    let mut output = format!("Version:          {}\n", data.version().as_raw());
    if let Some(minor) = data.minor_version() {
        output.push_str(&format!("Minor version:    {}\n", minor));
    }
    output.push_str(&format!(
        "Errors occurred:  {}\n",
        if data.errors_occurred() { "yes" } else { "no" }
    ));
    match data.details() {
        Some(details) => {
            output.push_str(&format!("Name:             {}\n", details.name));
            output.push_str(&format!("Display name:     {}\n", details.display_name));
            output.push_str(&format!("Directory:        {}\n", details.directory));
            output.push_str(&format!(
                "Created:          {}\n",
                format_time(Some(details.create_date))
            ));
            output.push_str(&format!(
                "Last access:      {}\n",
                format_time(Some(details.last_access_date))
            ));
            output.push_str(&format!(
                "Deleted items:    {}",
                deleted_items_label(details.deleted_items)
            ));
        }
        None => output.push_str("(legacy record, no case details)"),
    }
    output
}

fn format_case_paths(namespace_root: &str, case_dir: &Path) -> String {
    let root = crate::coordination::normalize_namespace_root(namespace_root);
    let rows = [
        ("Case directory", case_directory_lock_name(case_dir)),
        ("Name lock", case_name_lock_name(case_dir)),
        ("Resources lock", case_resources_lock_name(case_dir)),
        ("Auto ingest log", case_auto_ingest_log_lock_name(case_dir)),
    ];
    rows.iter()
        .map(|(label, path)| {
            format!(
                "{:<16} {}\n{:<16} {}",
                label,
                path,
                "",
                fully_qualified_node_path(&root, CategoryNode::Cases, path)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_job_table(jobs: &[IngestJobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Job", "Case", "Data Source", "Status", "Started", "Ended", "Error",
    ]);
    for job in jobs {
        table.add_row(vec![
            job.id.to_string(),
            job.case_name.clone(),
            job.data_source_name.clone(),
            job.status.to_string(),
            format_time(job.start_time),
            format_time(job.end_time),
            if job.error_occurred { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

fn format_journal_case_table(cases: &[CaseRecord]) -> String {
    if cases.is_empty() {
        return "No cases found.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Created"]);
    for case in cases {
        table.add_row(vec![
            case.id.to_string(),
            case.name.clone(),
            format_time(case.created_date),
        ]);
    }
    table.to_string()
}

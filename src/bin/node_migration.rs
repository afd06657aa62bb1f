//! Copies the coordination namespace of one cluster into another.

use anyhow::{bail, Context};
use casecoord::config::{ClusterEndpoint, ConfigLoader};
use casecoord::logging::init_logging;
use casecoord::migration::{MigrationOptions, MigrationReport, NamespaceMigrator};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "Input needs to be [Input Zookeeper IP Address] [Input Zookeeper Port Number] \
                     [Output Zookeeper IP Address] [Output Zookeeper Port Number]";

#[derive(Parser)]
#[command(name = "node-migration")]
#[command(about = "Copy every coordination node from a source cluster to a destination cluster")]
struct Args {
    source_host: Option<String>,
    source_port: Option<String>,
    destination_host: Option<String>,
    destination_port: Option<String>,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Copy into a destination that already holds node data
    #[arg(long)]
    allow_existing: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let endpoints = [
        &args.source_host,
        &args.source_port,
        &args.destination_host,
        &args.destination_port,
    ];
    if endpoints
        .iter()
        .any(|arg| arg.as_deref().map(str::trim).unwrap_or("").is_empty())
    {
        println!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(report) => {
            println!("{}", report);
            println!("Done...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<MigrationReport> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_with_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")?;
    if let Err(e) = init_logging(Some(&config.logging)) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let source = ClusterEndpoint::from_parts(
        args.source_host.as_deref().unwrap_or_default(),
        args.source_port.as_deref().unwrap_or_default(),
    )?;
    let destination = ClusterEndpoint::from_parts(
        args.destination_host.as_deref().unwrap_or_default(),
        args.destination_port.as_deref().unwrap_or_default(),
    )?;
    if source.resolve_path(&config.coordination)?
        == destination.resolve_path(&config.coordination)?
    {
        bail!("Source {} and destination {} are the same cluster", source, destination);
    }

    let source_service = source
        .open_existing(&config.coordination)
        .with_context(|| format!("Failed to open source cluster {}", source))?;
    let destination_service = Arc::new(
        destination
            .open(&config.coordination)
            .with_context(|| format!("Failed to open destination cluster {}", destination))?,
    );

    let migrator = NamespaceMigrator::new(
        Arc::new(source_service),
        destination_service.clone(),
        MigrationOptions {
            allow_existing_namespace: args.allow_existing,
        },
    );
    let report = migrator
        .migrate()
        .with_context(|| format!("Migration from {} to {} failed", source, destination))?;
    destination_service.flush()?;
    Ok(report)
}

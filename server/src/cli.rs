//! Command line: run the server, upload a file, or build a class catalog.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use graphload::broadcast::JobStatus;
use graphload::catalog::extract_from_ontology;
use graphload::client::{ClientError, GraphloadClient, PollPolicy, UploadResponse};
use graphload::config::{load_config_or_default, Config};
use graphload::document::DocumentFormat;
use graphload::error::{CatalogError, ConfigError};
use graphload::pipeline::ResultTab;
use thiserror::Error;

use crate::error::StartupError;
use crate::telemetry::init_logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload RDF documents into a triple store and analyze them", long_about = None)]
pub struct Cli {
    /// Config file (defaults to $GRAPHLOAD_CONFIG, then ./graphload.json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP upload service
    Serve {
        /// Listen address, overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Upload a file to a running service and wait for the result
    Upload {
        /// Turtle (.ttl) or N-Triples (.nt) file
        file: PathBuf,
        /// Tenant whose graph receives the data
        #[arg(short = 's', long = "state")]
        federal_state: String,
        /// Base URL of the service
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
        /// Process on the server before responding instead of polling
        #[arg(long)]
        sync: bool,
    },
    /// Build a class catalog from an ontology
    ExtractClasses {
        /// Ontology in Turtle or N-Triples
        ontology: PathBuf,
        /// Where to write the catalog; printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = load_config_or_default(cli.config.as_deref())?;
    init_logging(&config.logging);

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            crate::run_server(config)?;
            Ok(())
        }
        Command::Upload {
            file,
            federal_state,
            server,
            sync,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;
            runtime.block_on(upload(&server, &file, &federal_state, sync))
        }
        Command::ExtractClasses { ontology, output } => {
            extract_classes(&config, &ontology, output.as_deref())
        }
    }
}

async fn upload(
    server: &str,
    file: &Path,
    federal_state: &str,
    sync: bool,
) -> Result<(), CliError> {
    let client = GraphloadClient::new(server)?;

    let tabs = match client.upload_file(file, federal_state, sync).await? {
        UploadResponse::Inline(inline) => inline.tabs,
        UploadResponse::Accepted(accepted) => {
            println!("Job {} queued", accepted.job_id);
            let mut last_message = String::new();
            let snapshot = client
                .wait_for_completion(&accepted.job_id, PollPolicy::default(), |snapshot| {
                    if snapshot.job.message != last_message {
                        last_message = snapshot.job.message.clone();
                        println!(
                            "[{:>9}] {:5.1}%  {}",
                            snapshot.job.phase, snapshot.active_phase_progress, last_message
                        );
                    }
                })
                .await?;

            if snapshot.job.status != JobStatus::Success {
                return Err(CliError::JobFailed {
                    job_id: accepted.job_id,
                    message: snapshot
                        .job
                        .error_message
                        .unwrap_or_else(|| "unknown error".to_string()),
                });
            }
            snapshot.job.result_data.unwrap_or_default()
        }
    };

    for tab in tabs.iter() {
        match tab {
            ResultTab::Summary { content, .. } => println!("\n{}", content),
            ResultTab::Table { label, .. } => println!("  tab: {}", label),
        }
    }
    Ok(())
}

fn extract_classes(
    config: &Config,
    ontology: &Path,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let bytes = std::fs::read(ontology).map_err(|source| CliError::ReadFile {
        path: ontology.to_path_buf(),
        source,
    })?;
    let format = ontology
        .to_str()
        .and_then(DocumentFormat::from_filename)
        .unwrap_or(DocumentFormat::Turtle);

    let catalog = extract_from_ontology(&bytes, format)?;
    match output {
        Some(path) => {
            catalog.save(path)?;
            println!("Wrote {} classes to {}", catalog.len(), path.display());
            if Path::new(&config.catalog_path) != path {
                println!(
                    "Note: the server reads its catalog from {}",
                    config.catalog_path
                );
            }
        }
        None => {
            let json = serde_json::to_string_pretty(catalog.definitions())
                .map_err(CatalogError::from)?;
            println!("{}", json);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "graphload",
            "upload",
            "data.ttl",
            "--state",
            "BY",
            "--sync",
        ])
        .unwrap();
        match cli.command {
            Command::Upload {
                file,
                federal_state,
                server,
                sync,
            } => {
                assert_eq!(file, PathBuf::from("data.ttl"));
                assert_eq!(federal_state, "BY");
                assert_eq!(server, "http://localhost:5000");
                assert!(sync);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_extract_classes_writes_catalog() {
        let dir = tempfile::TempDir::new().unwrap();
        let ontology = dir.path().join("onto.ttl");
        std::fs::write(
            &ontology,
            r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
<http://example.org/School> a owl:Class ; rdfs:label "Schule"@de .
"#,
        )
        .unwrap();
        let output = dir.path().join("classes.json");

        extract_classes(&Config::default(), &ontology, Some(&output)).unwrap();

        let catalog = graphload::catalog::ClassCatalog::load(&output).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.classes()[0].label, "Schule");
    }
}

//! `orderflow`: inspect and edit sales documents stored as JSON.
//!
//! ```text
//! orderflow new-quotation | new-order
//! orderflow report <document.json>
//! orderflow apply <document.json> <commands.json>
//! ```

mod report;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use orderflow_core::{Aggregate, AggregateRoot, DocumentId, EngineSettings};
use orderflow_observability::LogFormat;
use orderflow_sales::{Document, DocumentCommand};

use crate::report::DocumentReport;

#[derive(Parser)]
#[command(name = "orderflow", about = "Inspect and edit sales documents stored as JSON", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Log output: json or compact; defaults to ORDERFLOW_LOG_FORMAT, then compact"
    )]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an empty draft quotation.
    NewQuotation,
    /// Print an empty customer order in status created.
    NewOrder,
    /// Print totals and per-line figures of a document.
    Report {
        #[arg(help = "Document JSON file")]
        path: PathBuf,
    },
    /// Apply a JSON array of commands and print the resulting document.
    Apply {
        #[arg(help = "Document JSON file")]
        document: PathBuf,
        #[arg(help = "JSON array of document commands")]
        commands: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let format = cli.log_format.unwrap_or_else(|| {
        std::env::var("ORDERFLOW_LOG_FORMAT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(LogFormat::Compact)
    });
    orderflow_observability::init_with(format);

    let settings = EngineSettings::from_env();
    run(cli.command, &settings)
}

fn run(command: Commands, settings: &EngineSettings) -> anyhow::Result<()> {
    match command {
        Commands::NewQuotation => print_json(&Document::new_quotation(DocumentId::new(), settings)),
        Commands::NewOrder => print_json(&Document::new_order(DocumentId::new(), settings)),
        Commands::Report { path } => {
            let document = read_document(&path)?;
            print_json(&DocumentReport::new(&document))
        }
        Commands::Apply { document, commands } => {
            let document = read_document(&document)?;
            let commands: Vec<DocumentCommand> = read_json(&commands)?;
            let document = apply_all(document, &commands)?;
            tracing::info!(
                document_id = %document.id(),
                commands = commands.len(),
                version = document.version(),
                "commands applied"
            );
            print_json(&document)
        }
    }
}

/// Run commands in order; the first rejected command aborts the whole batch.
fn apply_all(document: Document, commands: &[DocumentCommand]) -> anyhow::Result<Document> {
    commands
        .iter()
        .enumerate()
        .try_fold(document, |document, (index, command)| {
            document
                .execute(command)
                .with_context(|| format!("command #{} rejected", index + 1))
        })
}

fn read_document(path: &Path) -> anyhow::Result<Document> {
    let document: Document = read_json(path)?;
    // Derived fields in the file are not trusted.
    Ok(document.recalculated())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

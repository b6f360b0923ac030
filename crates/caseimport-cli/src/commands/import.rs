//! Import command - match a single document and collect its case.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use caseimport_core::error::SelectionError;
use caseimport_core::{
    CaseImportError, CaseImporter, DryCaseGenerator, ImportError, ImportLog, MemoryImportLog,
};

use super::{PreparedDocument, Registry, TemplateSource, load_config};
use crate::import_log::FileImportLog;

/// Arguments for the import command.
#[derive(Args)]
pub struct ImportArgs {
    /// Input document (.docx, or .doc when a converter is configured)
    #[arg(required = true)]
    input: PathBuf,

    #[command(flatten)]
    source: TemplateSource,

    /// Write the case record here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not record the import in the import log
    #[arg(long)]
    dry_run: bool,

    /// Print every failed rule when no template fits
    #[arg(long)]
    errors: bool,

    /// Import log file (default: `import.import_log` from the config)
    #[arg(long)]
    log: Option<PathBuf>,
}

pub async fn run(args: ImportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let registry = Registry::load(&config, &args.source)?;
    let prepared = PreparedDocument::prepare(&args.input, &config)?;

    let log: Arc<dyn ImportLog> = match args.log.or_else(|| config.import.import_log.clone()) {
        Some(path) if !args.dry_run => Arc::new(FileImportLog::new(path)),
        _ => Arc::new(MemoryImportLog::new()),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Matching {}", args.input.display()));

    let mut importer = CaseImporter::new(registry.providers(), Box::new(DryCaseGenerator::new()))
        .with_log(log)
        .store_errors(args.errors || registry.store_errors());
    let result = importer.import_from(prepared.source(), prepared.document());
    pb.finish_and_clear();

    let imported = match result {
        Ok(imported) => imported,
        Err(CaseImportError::Selection(SelectionError::NoFittingProvider { path, diagnostics })) => {
            eprintln!(
                "{} No template fits {}",
                style("✗").red(),
                path.display()
            );
            if args.errors {
                print_diagnostics(&diagnostics);
            } else {
                eprintln!("   Run with --errors to see the failed rules.");
            }
            anyhow::bail!("{} was not imported", path.display());
        }
        Err(e) => return Err(e.into()),
    };

    let output = serde_json::to_string_pretty(&imported.record)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} imported with {} to {}",
            style("✓").green(),
            args.input.display(),
            style(&imported.provider).cyan(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.dry_run {
        eprintln!("{} Dry run, import log untouched", style("ℹ").blue());
    }

    debug!("Total import time: {:?}", start.elapsed());

    Ok(())
}

/// Print diagnostics grouped by template.
pub fn print_diagnostics(diagnostics: &[ImportError]) {
    let mut current: Option<&str> = None;
    for diagnostic in diagnostics {
        if current != Some(diagnostic.source.as_str()) {
            eprintln!("  {}", style(&diagnostic.source).yellow());
            current = Some(diagnostic.source.as_str());
        }
        if diagnostic.detail.is_empty() {
            eprintln!("    - {}", diagnostic.cause);
        } else {
            eprintln!("    - {}: {}", diagnostic.cause, diagnostic.detail);
        }
    }
}

//! Batch import command for many documents.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use futures_util::StreamExt;
use futures_util::stream;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use caseimport_core::error::{GeneratorError, SelectionError};
use caseimport_core::selection::ImportedCase;
use caseimport_core::{
    CaseDataProvider, CaseGenerator, CaseImportError, CaseImporter, CaseRecord, DryCaseGenerator,
    ImportConfig, ImportError, ImportLog, MemoryImportLog,
};

use super::import::print_diagnostics;
use super::{PreparedDocument, Registry, TemplateSource, collect_files, load_config};
use crate::import_log::FileImportLog;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Directory or glob pattern of input documents
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    source: TemplateSource,

    /// Directory for one JSON case record per imported file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers (default: `batch.jobs` from the config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Per-file time limit in seconds, 0 for none
    #[arg(long)]
    timeout: Option<u64>,

    /// Continue on error (default: `batch.continue_on_error` from the config)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    continue_on_error: Option<bool>,

    /// Do not record imports in the import log
    #[arg(long)]
    dry_run: bool,

    /// Print every failed rule of unmatched files
    #[arg(long)]
    errors: bool,

    /// Import log file (default: `import.import_log` from the config)
    #[arg(long)]
    log: Option<PathBuf>,
}

/// Outcome of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileStatus {
    Imported,
    Skipped,
    Unmatched,
    Error,
}

impl FileStatus {
    fn as_str(self) -> &'static str {
        match self {
            FileStatus::Imported => "imported",
            FileStatus::Skipped => "skipped",
            FileStatus::Unmatched => "unmatched",
            FileStatus::Error => "error",
        }
    }
}

/// Result of importing a single file.
struct FileResult {
    path: PathBuf,
    status: FileStatus,
    provider: Option<String>,
    record: Option<CaseRecord>,
    error: Option<String>,
    diagnostics: Vec<ImportError>,
    processing_time_ms: u64,
}

impl FileResult {
    fn imported(path: PathBuf, imported: ImportedCase, start: Instant) -> Self {
        Self {
            path,
            status: FileStatus::Imported,
            provider: Some(imported.provider),
            record: Some(imported.record),
            error: None,
            diagnostics: Vec::new(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn failed(path: PathBuf, err: anyhow::Error, start: Instant) -> Self {
        let (status, diagnostics) = match err.downcast_ref::<CaseImportError>() {
            Some(CaseImportError::Selection(SelectionError::NoFittingProvider {
                diagnostics, ..
            })) => (FileStatus::Unmatched, diagnostics.clone()),
            Some(CaseImportError::Selection(SelectionError::AlreadyImported(_))) => {
                (FileStatus::Skipped, Vec::new())
            }
            _ => (FileStatus::Error, Vec::new()),
        };
        Self {
            path,
            status,
            provider: None,
            record: None,
            error: Some(err.to_string()),
            diagnostics,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Generator shared by every worker so reference numbers stay unique across the batch.
struct SharedGenerator(Arc<Mutex<DryCaseGenerator>>);

impl CaseGenerator for SharedGenerator {
    fn create_case(
        &mut self,
        provider: &mut dyn CaseDataProvider,
    ) -> caseimport_core::Result<CaseRecord> {
        let mut generator = self
            .0
            .lock()
            .map_err(|_| GeneratorError::Rejected("generator lock poisoned".to_string()))?;
        generator.create_case(provider)
    }
}

/// State shared by the workers.
struct BatchContext {
    config: ImportConfig,
    registry: Registry,
    log: Arc<dyn ImportLog>,
    generator: Arc<Mutex<DryCaseGenerator>>,
    store_errors: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let registry = Registry::load(&config, &args.source)?;

    let files = collect_files(&args.input, &registry)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to import with {} templates",
        style("ℹ").blue(),
        files.len(),
        registry.definitions().len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let jobs = args.jobs.unwrap_or(config.batch.jobs).max(1);
    let timeout_secs = args.timeout.unwrap_or(config.batch.file_timeout_secs);
    let limit = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));
    let continue_on_error = args
        .continue_on_error
        .unwrap_or(config.batch.continue_on_error);

    let log: Arc<dyn ImportLog> = match args.log.clone().or_else(|| config.import.import_log.clone()) {
        Some(path) if !args.dry_run => Arc::new(FileImportLog::new(path)),
        _ => Arc::new(MemoryImportLog::new()),
    };

    let context = Arc::new(BatchContext {
        store_errors: args.errors || registry.store_errors(),
        config,
        registry,
        log,
        generator: Arc::new(Mutex::new(DryCaseGenerator::new())),
    });

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    debug!("Importing with {} workers", jobs);
    let mut pending = stream::iter(files.into_iter().map(|path| {
        let context = Arc::clone(&context);
        import_with_limit(path, context, limit)
    }))
    .buffer_unordered(jobs);

    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        overall_pb.inc(1);
        if result.status == FileStatus::Error {
            let message = result.error.clone().unwrap_or_default();
            if continue_on_error {
                warn!("Failed to import {}: {}", result.path.display(), message);
            } else {
                overall_pb.abandon();
                error!("Failed to import {}: {}", result.path.display(), message);
                anyhow::bail!("Import failed: {}", message);
            }
        }
        results.push(result);
    }
    overall_pb.finish_with_message("Complete");
    results.sort_by(|a, b| a.path.cmp(&b.path));
    let base = common_base(results.iter().map(|r| r.path.as_path()));

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            if let Some(record) = &result.record {
                let output_path = output_dir
                    .join(relative_to(&base, &result.path))
                    .with_extension("json");
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&output_path, serde_json::to_string_pretty(record)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &base, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let count = |status: FileStatus| results.iter().filter(|r| r.status == status).count();
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} imported, {} skipped, {} unmatched, {} failed",
        style(count(FileStatus::Imported)).green(),
        style(count(FileStatus::Skipped)).dim(),
        style(count(FileStatus::Unmatched)).yellow(),
        style(count(FileStatus::Error)).red()
    );

    let problems: Vec<_> = results
        .iter()
        .filter(|r| matches!(r.status, FileStatus::Unmatched | FileStatus::Error))
        .collect();
    if !problems.is_empty() {
        println!();
        println!("{}", style("Not imported:").red());
        for result in problems {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
            if args.errors {
                print_diagnostics(&result.diagnostics);
            }
        }
    }

    Ok(())
}

async fn import_with_limit(
    path: PathBuf,
    context: Arc<BatchContext>,
    limit: Option<Duration>,
) -> FileResult {
    let start = Instant::now();
    let task_path = path.clone();
    let task = tokio::task::spawn_blocking(move || import_file(&task_path, &context));

    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                let err = anyhow::anyhow!("timed out after {}s", limit.as_secs());
                return FileResult::failed(path, err, start);
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(imported)) => FileResult::imported(path, imported, start),
        Ok(Err(err)) => FileResult::failed(path, err, start),
        Err(join_error) => FileResult::failed(path, join_error.into(), start),
    }
}

/// Import one file with a fresh set of providers.
fn import_file(path: &Path, context: &BatchContext) -> anyhow::Result<ImportedCase> {
    let prepared = PreparedDocument::prepare(path, &context.config)?;
    let generator = SharedGenerator(Arc::clone(&context.generator));
    let mut importer = CaseImporter::new(context.registry.providers(), Box::new(generator))
        .with_log(Arc::clone(&context.log))
        .store_errors(context.store_errors);
    Ok(importer.import_from(prepared.source(), prepared.document())?)
}

/// Deepest directory containing every path.
fn common_base<'a>(paths: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    let mut base: Option<PathBuf> = None;
    for path in paths {
        let parent = path.parent().unwrap_or(Path::new(""));
        base = Some(match base {
            None => parent.to_path_buf(),
            Some(base) => base
                .components()
                .zip(parent.components())
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    base.unwrap_or_default()
}

/// `path` below `base`, or its file name when it lies elsewhere.
fn relative_to<'a>(base: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(base)
        .ok()
        .filter(|relative| !relative.as_os_str().is_empty())
        .or_else(|| path.file_name().map(Path::new))
        .unwrap_or(Path::new("case"))
}

fn write_summary(path: &Path, base: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "provider",
        "internal_ref_number",
        "external_ref_number",
        "patient",
        "visit_date",
        "failed_rules",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = relative_to(base, &result.path).to_string_lossy();
        let record = result.record.as_ref();
        let visit_date = record
            .and_then(|r| r.visit.date)
            .map(|d| d.to_string())
            .unwrap_or_default();
        let failed_rules = result.diagnostics.len().to_string();
        let processing_time_ms = result.processing_time_ms.to_string();

        wtr.write_record([
            &*filename,
            result.status.as_str(),
            result.provider.as_deref().unwrap_or(""),
            record.map(|r| r.internal_ref_number.as_str()).unwrap_or(""),
            record.map(|r| r.external_ref_number.as_str()).unwrap_or(""),
            record.map(|r| r.patient.name.as_str()).unwrap_or(""),
            visit_date.as_str(),
            failed_rules.as_str(),
            processing_time_ms.as_str(),
            result.error.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

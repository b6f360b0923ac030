//! Stats command - how many documents each template recognises.

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use caseimport_core::{ImportError, ProviderStatistics, all_fitting};

use super::import::print_diagnostics;
use super::{PreparedDocument, Registry, TemplateSource, collect_files, load_config};

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    /// Directory or glob pattern of input documents
    #[arg(required = true)]
    input: String,

    #[command(flatten)]
    source: TemplateSource,

    /// List files that more than one template fits
    #[arg(long)]
    show_multiple: bool,

    /// List files no template fits, with their failed rules
    #[arg(long)]
    show_unmatched: bool,

    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(args: StatsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = Registry::load(&config, &args.source)?;
    let files = collect_files(&args.input, &registry)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    let mut providers = registry.providers();
    if args.show_unmatched {
        for provider in &mut providers {
            provider.set_store_errors(true);
        }
    }
    let mut stats = ProviderStatistics::for_providers(&providers);
    let mut unmatched_errors: Vec<(usize, Vec<ImportError>)> = Vec::new();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    for path in &files {
        pb.set_message(path.display().to_string());
        let outcome = PreparedDocument::prepare(path, &config)
            .and_then(|prepared| Ok(all_fitting(prepared.document(), &mut providers)?));
        match outcome {
            Ok(fitted) => {
                if fitted.is_empty() && args.show_unmatched {
                    let errors = providers
                        .iter()
                        .flat_map(|p| p.errors().iter().cloned())
                        .collect();
                    unmatched_errors.push((stats.unmatched.len(), errors));
                }
                stats.record(path, &fitted);
            }
            Err(e) => {
                warn!("Cannot evaluate {}: {}", path.display(), e);
                stats.record_failure(path, e);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let width = stats
        .providers
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0)
        .max("Template".len());
    println!("{:<width$}  {:>6}", style("Template").bold(), style("Files").bold());
    for count in &stats.providers {
        println!("{:<width$}  {:>6}", count.name, count.fitted);
    }
    println!();
    println!(
        "{} {} of {} files importable ({:.1}%)",
        style("ℹ").blue(),
        stats.importable(),
        stats.total_files,
        stats.percent()
    );
    if !stats.failures.is_empty() {
        println!("{} {} files could not be read", style("✗").red(), stats.failures.len());
        for (path, reason) in &stats.failures {
            println!("  - {}: {}", path.display(), reason);
        }
    }

    if args.show_multiple && !stats.overlaps.is_empty() {
        println!();
        println!("{}", style("Fitted by more than one template:").yellow());
        for overlap in &stats.overlaps {
            println!("  - {}: {}", overlap.path.display(), overlap.providers.join(", "));
        }
    }

    if args.show_unmatched && !stats.unmatched.is_empty() {
        println!();
        println!("{}", style("Not fitted by any template:").red());
        for (index, path) in stats.unmatched.iter().enumerate() {
            println!("  - {}", path.display());
            if let Some((_, errors)) = unmatched_errors.iter().find(|(i, _)| *i == index) {
                print_diagnostics(errors);
            }
        }
    }

    Ok(())
}

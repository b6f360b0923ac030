//! Templates command - list definitions and explain verdicts.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use caseimport_core::TemplateDefinition;

use super::import::print_diagnostics;
use super::{PreparedDocument, Registry, TemplateSource, load_config};

/// Arguments for the templates command.
#[derive(Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    command: TemplatesCommand,
}

#[derive(Subcommand)]
enum TemplatesCommand {
    /// List the templates in registry order
    List(ListArgs),

    /// Evaluate every template against a document and show failed rules
    Check(CheckArgs),

    /// Check template files for mistakes that no document can satisfy
    Validate {
        /// Template definition files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    source: TemplateSource,

    /// Also print the effective rules
    #[arg(long)]
    rules: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Input document
    document: PathBuf,

    #[command(flatten)]
    source: TemplateSource,
}

pub async fn run(args: TemplatesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        TemplatesCommand::List(list) => list_templates(list, config_path),
        TemplatesCommand::Check(check) => check_document(check, config_path),
        TemplatesCommand::Validate { files } => validate_files(&files),
    }
}

fn list_templates(args: ListArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = Registry::load(&config, &args.source)?;

    for (index, definition) in registry.definitions().iter().enumerate() {
        let rules = definition.effective_rules();
        println!(
            "{:>3}. {} ({}) {} fields, {} checkpoints, {} rules",
            index + 1,
            style(&definition.name).cyan(),
            definition.extensions.join(", "),
            definition.map.fields.len(),
            definition.map.checkpoints.len(),
            rules.len()
        );
        if args.rules {
            for entry in rules.entries() {
                let names: Vec<&str> = entry.rules.iter().map(|r| r.name()).collect();
                println!("       {} {}", entry.accessor, style(names.join(", ")).dim());
            }
        }
    }
    Ok(())
}

fn check_document(args: CheckArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = Registry::load(&config, &args.source)?;
    let prepared = PreparedDocument::prepare(&args.document, &config)?;

    let mut first_fit: Option<String> = None;
    for mut provider in registry.providers() {
        provider.set_store_errors(true);
        provider.init(prepared.document());
        match provider.is_fit() {
            Ok(true) => {
                println!("{} {}", style("✓").green(), provider.name());
                if first_fit.is_none() {
                    first_fit = Some(provider.name().to_string());
                }
            }
            Ok(false) => {
                println!("{} {}", style("✗").red(), provider.name());
                print_diagnostics(provider.errors());
            }
            Err(e) => {
                println!("{} {}: {}", style("!").yellow(), provider.name(), e);
            }
        }
    }

    println!();
    match first_fit {
        Some(name) => println!(
            "{} {} would be imported with {}",
            style("ℹ").blue(),
            args.document.display(),
            style(name).cyan()
        ),
        None => println!(
            "{} No template fits {}",
            style("ℹ").blue(),
            args.document.display()
        ),
    }
    Ok(())
}

fn validate_files(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut failed = 0;
    for file in files {
        let problems = match TemplateDefinition::from_file(file) {
            Ok(definition) => definition.problems(),
            Err(e) => vec![e],
        };
        if problems.is_empty() {
            println!("{} {}", style("✓").green(), file.display());
        } else {
            failed += 1;
            println!("{} {}", style("✗").red(), file.display());
            for problem in &problems {
                println!("    - {}", problem);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} template files have problems", failed, files.len());
    }
    Ok(())
}

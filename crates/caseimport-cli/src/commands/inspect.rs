//! Inspect command - show what the providers see in a document.

use std::path::PathBuf;

use clap::Args;
use console::style;

use caseimport_core::{DocumentReader, TableNode, TablePath};

use super::{PreparedDocument, load_config};

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Input document
    #[arg(required = true)]
    input: PathBuf,

    /// Only show the node at this path, e.g. `0,2,1`
    #[arg(short, long)]
    path: Option<String>,

    /// Print the root table as JSON
    #[arg(long)]
    json: bool,

    /// Print the plain text instead of the tables
    #[arg(long)]
    text: bool,

    /// List embedded images
    #[arg(long)]
    images: bool,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let prepared = PreparedDocument::prepare(&args.input, &config)?;
    let reader = config.reader();

    if args.text {
        println!("{}", reader.plain_text(prepared.document())?);
    } else {
        let tables = config.extractor().extract(&reader.open(prepared.document())?);
        let (root, node) = match &args.path {
            Some(raw) => {
                let path = parse_path(raw)?;
                let node = tables.resolve(&path)?;
                (path, node)
            }
            None => (TablePath::default(), &tables.tables),
        };

        if args.json {
            println!("{}", serde_json::to_string_pretty(node)?);
        } else {
            let mut steps = root.steps().to_vec();
            print_leaves(node, &mut steps);
        }
    }

    if args.images {
        let images = reader.images(prepared.document())?;
        println!();
        println!("{} {} embedded images", style("ℹ").blue(), images.len());
        for image in &images {
            println!(
                "  {} {} bytes {}",
                image.name,
                image.content.len(),
                style(image.fingerprint()).dim()
            );
        }
    }

    Ok(())
}

/// Parse `0,2,1` or `[0,2,1]`.
fn parse_path(raw: &str) -> anyhow::Result<TablePath> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if inner.trim().is_empty() {
        return Ok(TablePath::default());
    }
    let steps = inner
        .split(',')
        .map(|step| {
            step.trim()
                .parse::<usize>()
                .map_err(|e| anyhow::anyhow!("Invalid path step {:?} in {}: {}", step, raw, e))
        })
        .collect::<anyhow::Result<Vec<usize>>>()?;
    Ok(TablePath::new(steps))
}

/// Print every leaf with the path that reaches it.
fn print_leaves(node: &TableNode, steps: &mut Vec<usize>) {
    match node {
        TableNode::Text(text) => {
            println!("{} {}", style(TablePath::new(steps.clone())).cyan(), text);
        }
        TableNode::List(items) => {
            for (index, item) in items.iter().enumerate() {
                steps.push(index);
                print_leaves(item, steps);
                steps.pop();
            }
        }
    }
}

//! Path resolution against the root table.

use super::{TableNode, TablePath};
use crate::error::{PathFailure, ResolveError};

/// Walk `path` left to right, indexing into nested sequences.
pub fn resolve<'a>(root: &'a TableNode, path: &TablePath) -> Result<&'a TableNode, ResolveError> {
    let mut current = root;
    for (depth, &index) in path.steps().iter().enumerate() {
        let items = current.as_list().ok_or_else(|| ResolveError::PathNotFound {
            path: path.clone(),
            depth,
            reason: PathFailure::NotAList,
        })?;
        current = items.get(index).ok_or_else(|| ResolveError::PathNotFound {
            path: path.clone(),
            depth,
            reason: PathFailure::MissingIndex,
        })?;
    }
    Ok(current)
}

/// Whether `path` resolves.
pub fn exists_at(root: &TableNode, path: &TablePath) -> bool {
    resolve(root, path).is_ok()
}

/// Collapse a sub-tree into one string.
///
/// A leaf is returned unchanged. For a sequence, leaves are trimmed and the
/// non-empty ones joined with a single space in depth-first order.
pub fn flatten_to_string(node: &TableNode) -> String {
    match node {
        TableNode::Text(text) => text.clone(),
        TableNode::List(_) => {
            let mut parts = Vec::new();
            collect_leaves(node, &mut parts);
            parts.join(" ")
        }
    }
}

fn collect_leaves<'a>(node: &'a TableNode, parts: &mut Vec<&'a str>) {
    match node {
        TableNode::Text(text) => {
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        TableNode::List(items) => {
            for item in items {
                collect_leaves(item, parts);
            }
        }
    }
}

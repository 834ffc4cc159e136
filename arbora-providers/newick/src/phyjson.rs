//! PhyJSON document parsing via `serde_json`.
//!
//! The document shape is a `trees` array of nested node objects: each node
//! carries an optional `label`, an optional branch `length`, and an
//! optional `children` array. Leaves are nodes without children.

use arbora_core::{NodeId, Tree, TreeBuilder};
use serde::Deserialize;

use crate::ReaderError;

const FORMAT: &str = "phyjson";

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    trees: Vec<TreeEntry>,
}

// Tree names and other sidecar fields are accepted and ignored.
#[derive(Debug, Deserialize)]
struct TreeEntry {
    root: NodeEntry,
}

#[derive(Debug, Deserialize)]
struct NodeEntry {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    children: Vec<NodeEntry>,
}

pub(crate) fn parse_trees(input: &str) -> Result<Vec<Tree>, ReaderError> {
    let document: Document = serde_json::from_str(input).map_err(|err| ReaderError::Parse {
        format: FORMAT,
        position: 0,
        message: err.to_string(),
    })?;

    document
        .trees
        .into_iter()
        .map(|entry| {
            let mut builder = TreeBuilder::new();
            let root = lower_node(&entry.root, &mut builder);
            Ok(builder.finish(root))
        })
        .collect()
}

fn lower_node(entry: &NodeEntry, builder: &mut TreeBuilder) -> NodeId {
    let id = if entry.children.is_empty() {
        match &entry.label {
            Some(label) => builder.leaf(label.clone()),
            None => builder.unlabelled_leaf(),
        }
    } else {
        let children: Vec<NodeId> = entry
            .children
            .iter()
            .map(|child| lower_node(child, builder))
            .collect();
        let id = builder.join_children(children);
        if let Some(label) = &entry.label {
            builder.set_label(id, label.clone());
        }
        id
    };
    if let Some(length) = entry.length {
        builder.set_branch_length(id, length);
    }
    id
}

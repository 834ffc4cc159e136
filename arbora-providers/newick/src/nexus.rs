//! Nexus `trees` block parsing.
//!
//! Scans for a case-insensitive `begin trees; ... end;` block, applies the
//! optional `translate` table to leaf labels, and hands each `tree NAME =
//! ...` statement to the Newick parser (which already skips the `[&R]`
//! rootedness annotation).

use std::collections::HashMap;

use arbora_core::Tree;

use crate::{newick, ReaderError};

const FORMAT: &str = "nexus";

pub(crate) fn parse_trees(input: &str) -> Result<Vec<Tree>, ReaderError> {
    // ASCII lowering keeps byte offsets aligned with the original input.
    let lower = input.to_ascii_lowercase();
    let begin = lower
        .find("begin trees")
        .ok_or_else(|| parse_error(0, "no `begin trees` block"))?;
    let block_start = begin
        + lower[begin..]
            .find(';')
            .ok_or_else(|| parse_error(begin, "unterminated `begin trees` statement"))?
        + 1;

    let mut translate: HashMap<String, String> = HashMap::new();
    let mut trees = Vec::new();

    let mut offset = block_start;
    for statement in input[block_start..].split(';') {
        let position = offset;
        offset += statement.len() + 1;

        let trimmed = statement.trim();
        let keyword = trimmed
            .split_whitespace()
            .next()
            .map(str::to_ascii_lowercase);
        match keyword.as_deref() {
            None => continue,
            Some("end") | Some("endblock") => break,
            Some("translate") => {
                let body = &trimmed["translate".len()..];
                parse_translate(body, position, &mut translate)?;
            }
            Some("tree") => {
                let newick_text = trimmed
                    .split_once('=')
                    .map(|(_, rest)| rest)
                    .ok_or_else(|| parse_error(position, "tree statement without `=`"))?;
                let mut parsed = newick::parse_trees(&format!("{newick_text};"))?;
                let mut tree = parsed
                    .pop()
                    .ok_or_else(|| parse_error(position, "tree statement without a tree"))?;
                tree.rename_leaves(&translate);
                trees.push(tree);
            }
            Some(_) => continue,
        }
    }

    Ok(trees)
}

fn parse_translate(
    body: &str,
    position: usize,
    translate: &mut HashMap<String, String>,
) -> Result<(), ReaderError> {
    for entry in body.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (token, label) = entry
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_error(position, "translate entry without a label"))?;
        let label = label.trim().trim_matches('\'');
        translate.insert(token.trim().to_owned(), label.to_owned());
    }
    Ok(())
}

fn parse_error(position: usize, message: &str) -> ReaderError {
    ReaderError::Parse {
        format: FORMAT,
        position,
        message: message.to_owned(),
    }
}

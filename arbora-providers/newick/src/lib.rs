//! Tree-reader collaborator for the Arbora core.
//!
//! Turns byte strings into [`arbora_core::Tree`] values. Newick and Nexus
//! are parsed natively; PhyJSON goes through `serde_json`. PhyloXML and
//! NeXML are recognised by the auto-detector but rejected as unsupported —
//! no XML stack ships with this workspace. Parsed trees are validated
//! strictly binary before they are handed to the caller, and node heights
//! are derived from branch lengths.

mod newick;
mod nexus;
mod phyjson;

use std::fmt;

use arbora_core::{ArboraError, Tree};
use thiserror::Error;

/// Supported (and recognised-but-unsupported) tree formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TreeFormat {
    /// Detect the format from the first marker token.
    Auto,
    /// Newick strings, one tree per `;`-terminated statement.
    Newick,
    /// Nexus files with a `trees` block and optional translate table.
    Nexus,
    /// PhyloXML (recognised, not supported).
    PhyloXml,
    /// NeXML (recognised, not supported).
    NexML,
    /// PhyJSON documents.
    PhyJson,
}

impl fmt::Display for TreeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Newick => "newick",
            Self::Nexus => "nexus",
            Self::PhyloXml => "phyloxml",
            Self::NexML => "nexml",
            Self::PhyJson => "phyjson",
        })
    }
}

/// Errors surfaced while reading trees.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReaderError {
    /// The input matched no recognisable format.
    #[error("input matches no recognisable tree format")]
    FormatUnknown,
    /// The format was recognised but this reader does not parse it.
    #[error("{format} input is recognised but not supported by this reader")]
    UnsupportedFormat {
        /// Name of the rejected format.
        format: &'static str,
    },
    /// The parser rejected the input.
    #[error("failed to parse {format} input at byte {position}: {message}")]
    Parse {
        /// Format the parser was attempting.
        format: &'static str,
        /// Byte offset of the failure.
        position: usize,
        /// Description of the failure.
        message: String,
    },
    /// The input parsed but contained no trees.
    #[error("{format} input contains no trees")]
    EmptyInput {
        /// Format the parser was attempting.
        format: &'static str,
    },
    /// A parsed tree violated the strictly-binary contract.
    #[error(transparent)]
    Malformed(#[from] ArboraError),
}

impl From<ReaderError> for ArboraError {
    fn from(error: ReaderError) -> Self {
        match error {
            ReaderError::FormatUnknown => ArboraError::FormatUnknown,
            ReaderError::UnsupportedFormat { format } => ArboraError::ParseFailure {
                format: format.to_owned(),
                message: "recognised but not supported by this reader".to_owned(),
            },
            ReaderError::Parse {
                format,
                position,
                message,
            } => ArboraError::ParseFailure {
                format: format.to_owned(),
                message: format!("at byte {position}: {message}"),
            },
            ReaderError::EmptyInput { format } => ArboraError::ParseFailure {
                format: format.to_owned(),
                message: "input contains no trees".to_owned(),
            },
            ReaderError::Malformed(inner) => inner,
        }
    }
}

/// Guesses the format from the first non-whitespace marker token.
///
/// `(` opens Newick, `#nexus` (case-insensitive) opens Nexus, `<?xml` with
/// a `phyloxml` or `nexml` marker selects the XML dialects, `{` opens
/// PhyJSON, and anything else falls back to Newick.
///
/// # Errors
/// Returns [`ReaderError::FormatUnknown`] for empty input or XML without a
/// recognisable dialect marker.
pub fn detect_format(input: &str) -> Result<TreeFormat, ReaderError> {
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return Err(ReaderError::FormatUnknown);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("#nexus") {
        return Ok(TreeFormat::Nexus);
    }
    if lower.starts_with("<?xml") || lower.starts_with('<') {
        if lower.contains("phyloxml") {
            return Ok(TreeFormat::PhyloXml);
        }
        if lower.contains("nexml") {
            return Ok(TreeFormat::NexML);
        }
        return Err(ReaderError::FormatUnknown);
    }
    match trimmed.as_bytes()[0] {
        b'(' => Ok(TreeFormat::Newick),
        b'{' => Ok(TreeFormat::PhyJson),
        _ => Ok(TreeFormat::Newick),
    }
}

/// Reads an ordered sequence of rooted binary trees from `input`.
///
/// Trees come back with heights derived from their branch lengths.
///
/// # Errors
/// Returns [`ReaderError::FormatUnknown`] when detection fails,
/// [`ReaderError::UnsupportedFormat`] for the XML dialects,
/// [`ReaderError::Parse`] on parser failures, [`ReaderError::EmptyInput`]
/// when no tree is present, and [`ReaderError::Malformed`] when a parsed
/// tree is not strictly binary.
///
/// # Examples
/// ```
/// use arbora_providers_newick::{read_trees, TreeFormat};
///
/// let trees = read_trees("((A:1,B:1):1,C:2);", TreeFormat::Auto)
///     .expect("well-formed newick");
/// assert_eq!(trees.len(), 1);
/// assert_eq!(trees[0].tip_labels(), ["A", "B", "C"]);
/// ```
pub fn read_trees(input: &str, format: TreeFormat) -> Result<Vec<Tree>, ReaderError> {
    let resolved = match format {
        TreeFormat::Auto => detect_format(input)?,
        other => other,
    };
    let (mut trees, format_name) = match resolved {
        TreeFormat::Newick => (newick::parse_trees(input)?, "newick"),
        TreeFormat::Nexus => (nexus::parse_trees(input)?, "nexus"),
        TreeFormat::PhyJson => (phyjson::parse_trees(input)?, "phyjson"),
        TreeFormat::PhyloXml => {
            return Err(ReaderError::UnsupportedFormat { format: "phyloxml" })
        }
        TreeFormat::NexML => return Err(ReaderError::UnsupportedFormat { format: "nexml" }),
        TreeFormat::Auto => unreachable!("auto resolves before dispatch"),
    };

    if trees.is_empty() {
        return Err(ReaderError::EmptyInput {
            format: format_name,
        });
    }
    for (index, tree) in trees.iter_mut().enumerate() {
        tree.validate_binary(index)?;
        tree.assign_heights_from_branch_lengths();
    }
    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("((A,B),C);", TreeFormat::Newick)]
    #[case("  \n((A,B),C);", TreeFormat::Newick)]
    #[case("#NEXUS\nbegin trees; tree t = ((A,B),C); end;", TreeFormat::Nexus)]
    #[case("#nexus\nbegin trees; end;", TreeFormat::Nexus)]
    #[case("{\"trees\": []}", TreeFormat::PhyJson)]
    #[case("A;", TreeFormat::Newick)]
    #[case("<?xml version=\"1.0\"?><phyloxml/>", TreeFormat::PhyloXml)]
    #[case("<?xml version=\"1.0\"?><nexml/>", TreeFormat::NexML)]
    fn detection_follows_marker_tokens(#[case] input: &str, #[case] expected: TreeFormat) {
        let detected = detect_format(input).expect("markers are recognisable");
        assert_eq!(detected, expected);
    }

    #[rstest]
    #[case("")]
    #[case("   \n\t ")]
    #[case("<?xml version=\"1.0\"?><unrelated/>")]
    fn unrecognisable_input_is_reported(#[case] input: &str) {
        let err = detect_format(input).expect_err("no marker to detect");
        assert!(matches!(err, ReaderError::FormatUnknown));
    }

    #[test]
    fn xml_dialects_are_rejected_as_unsupported() {
        let err = read_trees("<?xml version=\"1.0\"?><phyloxml/>", TreeFormat::Auto)
            .expect_err("phyloxml is unsupported");
        assert!(matches!(
            err,
            ReaderError::UnsupportedFormat { format: "phyloxml" }
        ));
    }

    #[test]
    fn polytomies_fail_fast() {
        let err = read_trees("(A,B,C);", TreeFormat::Newick).expect_err("polytomy");
        let core: ArboraError = err.into();
        assert_eq!(core.code(), arbora_core::ArboraErrorCode::MalformedTree);
    }

    #[test]
    fn heights_are_derived() {
        let trees = read_trees("((A:1,B:1):1,C:2);", TreeFormat::Newick).expect("well-formed");
        let root = trees[0].root();
        assert_eq!(trees[0].node(root).height(), Some(2.0));
    }
}

//! Error types for the Arbora core library.
//!
//! Defines the error enum exposed by the public API, a flat code enum with
//! stable machine-readable identifiers for logging surfaces, and a convenient
//! result alias.

use std::fmt;

use thiserror::Error;

/// Stable codes describing [`ArboraError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ArboraErrorCode {
    /// Too few trees for the requested operation.
    InsufficientTrees,
    /// A tree violated the strictly-binary contract.
    MalformedTree,
    /// A leaf label was absent from the frozen taxon index.
    TaxonUnknown,
    /// Input bytes matched no recognisable tree format.
    FormatUnknown,
    /// An upstream parser rejected the input.
    ParseFailure,
    /// A numerical routine failed or was handed invalid input.
    NumericFailure,
    /// A progress callback requested cooperative cancellation.
    Cancelled,
    /// A configured parameter was outside its valid range.
    InvalidConfiguration,
}

impl ArboraErrorCode {
    /// Return the stable machine-readable representation of this error code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientTrees => "ARBORA_INSUFFICIENT_TREES",
            Self::MalformedTree => "ARBORA_MALFORMED_TREE",
            Self::TaxonUnknown => "ARBORA_TAXON_UNKNOWN",
            Self::FormatUnknown => "ARBORA_FORMAT_UNKNOWN",
            Self::ParseFailure => "ARBORA_PARSE_FAILURE",
            Self::NumericFailure => "ARBORA_NUMERIC_FAILURE",
            Self::Cancelled => "ARBORA_CANCELLED",
            Self::InvalidConfiguration => "ARBORA_INVALID_CONFIGURATION",
        }
    }
}

impl fmt::Display for ArboraErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced by the Arbora core.
///
/// Every variant names the offending object so failures surface with enough
/// context to act on: the taxon label, the tree index, the numeric routine.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ArboraError {
    /// Too few trees for the requested operation.
    #[error("{operation} requires at least {needed} trees but received {got}")]
    InsufficientTrees {
        /// Operation that imposed the minimum.
        operation: &'static str,
        /// Minimum number of trees required.
        needed: usize,
        /// Number of trees actually supplied.
        got: usize,
    },
    /// A tree violated the strictly-binary contract, or a leaf carried
    /// neither a label nor a usable id.
    #[error("tree {tree_index} is malformed: {detail}")]
    MalformedTree {
        /// Position of the offending tree in the input sequence.
        tree_index: usize,
        /// Human-readable description naming the offending node.
        detail: String,
    },
    /// A leaf label was absent from the frozen taxon index.
    #[error("taxon `{label}` in tree {tree_index} is not in the taxon index")]
    TaxonUnknown {
        /// Label that failed to resolve.
        label: String,
        /// Position of the tree that carried the label.
        tree_index: usize,
    },
    /// Input bytes matched no recognisable tree format.
    #[error("input matches no recognisable tree format")]
    FormatUnknown,
    /// An upstream parser rejected the input.
    #[error("failed to parse {format} input: {message}")]
    ParseFailure {
        /// Format the parser was attempting.
        format: String,
        /// Underlying parser message.
        message: String,
    },
    /// A numerical routine failed or was handed invalid input.
    #[error("{routine} failed: {message}")]
    NumericFailure {
        /// Name of the numeric routine.
        routine: &'static str,
        /// Description of the failure.
        message: String,
    },
    /// A progress callback requested cooperative cancellation.
    #[error("cancelled by progress callback during {stage}")]
    Cancelled {
        /// Stage that was interrupted.
        stage: &'static str,
    },
    /// A configured parameter was outside its valid range.
    #[error("{parameter} must be {requirement} (got {got})")]
    InvalidConfiguration {
        /// Name of the offending parameter.
        parameter: &'static str,
        /// Human-readable constraint the value violated.
        requirement: &'static str,
        /// The rejected value, rendered.
        got: String,
    },
}

impl ArboraError {
    /// Retrieve the stable [`ArboraErrorCode`] for this error.
    pub const fn code(&self) -> ArboraErrorCode {
        match self {
            Self::InsufficientTrees { .. } => ArboraErrorCode::InsufficientTrees,
            Self::MalformedTree { .. } => ArboraErrorCode::MalformedTree,
            Self::TaxonUnknown { .. } => ArboraErrorCode::TaxonUnknown,
            Self::FormatUnknown => ArboraErrorCode::FormatUnknown,
            Self::ParseFailure { .. } => ArboraErrorCode::ParseFailure,
            Self::NumericFailure { .. } => ArboraErrorCode::NumericFailure,
            Self::Cancelled { .. } => ArboraErrorCode::Cancelled,
            Self::InvalidConfiguration { .. } => ArboraErrorCode::InvalidConfiguration,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, ArboraError>;

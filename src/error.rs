//! Error types for every stage of mutant generation.

use std::path::PathBuf;

use thiserror::Error;

/// The source could not be turned into a syntax tree.
#[derive(Debug, Error)]
pub enum FrontEndError {
    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
}

impl FrontEndError {
    pub fn parse(err: &syn::Error) -> Self {
        let start = err.span().start();
        FrontEndError::Parse {
            line: start.line,
            column: start.column,
            message: err.to_string(),
        }
    }
}

/// Invalid edit against the rewrite overlay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("range {start}..{end} is outside the {len}-byte source")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("range {start}..{end} partially overlaps an earlier edit at {other_start}..{other_end}")]
    Overlap {
        start: usize,
        end: usize,
        other_start: usize,
        other_end: usize,
    },
}

/// A mutator could not complete an accepted match.
///
/// Any of these aborts the current mutant; the ledger transaction of the
/// failing call is discarded.
#[derive(Debug, Error)]
pub enum MutateError {
    /// A structural prerequisite of the strategy is missing, e.g. an outer
    /// loop without a nested loop.
    #[error("{mutator} at line {line}: {reason}")]
    Precondition {
        mutator: String,
        line: u32,
        reason: String,
    },

    #[error("{mutator}: binding `{name}` missing from match")]
    MissingBinding { mutator: String, name: &'static str },

    #[error("{mutator} at line {line}: {source}")]
    Rewrite {
        mutator: String,
        line: u32,
        #[source]
        source: RewriteError,
    },
}

impl MutateError {
    pub fn precondition(mutator: &str, line: u32, reason: impl Into<String>) -> Self {
        MutateError::Precondition {
            mutator: mutator.to_string(),
            line,
            reason: reason.into(),
        }
    }

    pub fn missing_binding(mutator: &str, name: &'static str) -> Self {
        MutateError::MissingBinding {
            mutator: mutator.to_string(),
            name,
        }
    }

    pub fn rewrite(mutator: &str, line: u32, source: RewriteError) -> Self {
        MutateError::Rewrite {
            mutator: mutator.to_string(),
            line,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unknown mutation operator `{0}`")]
    UnknownOperator(String),
}

/// Failure of one mutant, attributed to its operator and index so the batch
/// can skip it and continue.
#[derive(Debug, Error)]
pub enum MutantError {
    #[error("operator {operator}, mutant {index}: {source}")]
    Mutate {
        operator: String,
        index: usize,
        #[source]
        source: MutateError,
    },

    #[error("operator {operator}, mutant {index}: {source}")]
    Report {
        operator: String,
        index: usize,
        #[source]
        source: ReportError,
    },

    #[error("operator {operator}, mutant {index}: ledger of {mutator} not drained before reuse")]
    DirtyLedger {
        operator: String,
        index: usize,
        mutator: String,
    },

    #[error("operator {operator}: {source}")]
    FrontEnd {
        operator: String,
        #[source]
        source: FrontEndError,
    },

    #[error("failed to persist mutant {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

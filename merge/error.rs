//! # Error taxonomy
//!
//! Every failure in a merge run is fatal. The variants below carry enough context
//! (the offending path, line, or value and, where it helps, the full set of valid
//! alternatives) for the binary to print a diagnostic and stop.

use crate::types::{ComparisonIndex, SubsetKey};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Cannot parse file '{}' at line {line_number}: {reason}\n  line content: \"{line}\"",
        .path.display()
    )]
    Parse {
        path: PathBuf,
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("File name convention not recognized for '{}': {reason}", .path.display())]
    FormatConvention { path: PathBuf, reason: String },

    #[error(
        "Sample size resolution failed due to a coincidental collision of total sample sizes in comparison {comparison}: \
         size is {} cases and {} controls for both [{}] and [{}]\npreviously stored values are:{}",
        .key.cases,
        .key.controls,
        .first_members.join(", "),
        .second_members.join(", "),
        format_known_keys(.known)
    )]
    Collision {
        comparison: ComparisonIndex,
        key: SubsetKey,
        first_members: Vec<String>,
        second_members: Vec<String>,
        known: Vec<SubsetKey>,
    },

    #[error(
        "Combinatorial sample size lookup failed: comparison {comparison}; expected {observed}\navailable:{}",
        format_known_keys(.known)
    )]
    SampleSizeResolution {
        comparison: ComparisonIndex,
        observed: SubsetKey,
        known: Vec<SubsetKey>,
    },

    #[error("Usage error: {0}")]
    Usage(String),
}

impl MergeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MergeError::Io {
            path: path.into(),
            source,
        }
    }
}

fn format_known_keys(known: &[SubsetKey]) -> String {
    if known.is_empty() {
        return " (none)".to_string();
    }
    known.iter().map(|key| format!(" {key}")).collect()
}

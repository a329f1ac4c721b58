use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a split run.
#[derive(Debug, Error)]
pub enum Error {
    /// The input path is missing or is not a regular file.
    #[error("input path '{}' must be an existing file, not a folder", .0.display())]
    InputNotFound(PathBuf),

    /// None of size, rows or group column was given.
    #[error("either a size limit, a row limit or a group column must be specified")]
    NoCriterionSpecified,

    /// An allow-list only makes sense when rows are grouped.
    #[error("an allow-list requires a group column")]
    AllowListWithoutGroupColumn,

    #[error("the allow-list contains no usable entries")]
    EmptyAllowList,

    /// A row's group column was empty or absent.
    #[error("empty key found in column {column} on line {line}")]
    InvalidGroupKey { line: u64, column: usize },

    /// The input has no rows at all, so there is no header to copy.
    #[error("input has no header row")]
    MissingHeader,

    #[error("invalid size '{0}': expected a number with an optional kB, MB or GB suffix")]
    InvalidSize(String),

    #[error("{0} limit must be greater than zero")]
    InvalidLimit(&'static str),

    #[error("output file prefix cannot be empty")]
    InvalidPrefix,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

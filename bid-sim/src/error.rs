use std::path::PathBuf;

use polars::prelude::PolarsError;

/// Failures that cross the file boundary or break table construction.
///
/// Per-row numeric edge cases never show up here; stages resolve those
/// locally and report them as diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("input file '{}' not found", path.display())]
    InputNotFound { path: PathBuf },

    #[error("unsupported table format for '{}' (expected .xlsx, .csv or .parquet)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to read table from '{}': {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("failed to read workbook '{}': {source}", path.display())]
    WorkbookRead {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("workbook '{}' has no header row", path.display())]
    EmptyWorkbook { path: PathBuf },

    #[error("failed to write table to '{}': {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("failed to write workbook '{}': {source}", path.display())]
    WorkbookWrite {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("column '{column}' has {found} rows, table has {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("table conversion failed: {0}")]
    Frame(#[from] PolarsError),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

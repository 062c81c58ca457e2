//! Error taxonomy for the reconciliation engine.
//!
//! Engine code (`source`, `reconcile`, `batch`) returns [`ReconError`] so that
//! batch workers can record failures per file. The CLI and writers wrap these
//! in `anyhow` with context. A schema mismatch is not an error: it is a
//! [`Classification`](crate::issues::Classification) of the comparison result.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Cannot open {path:?}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot list folder {path:?}")]
    UnreadableFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Row {row} of {path:?} is not valid {encoding}")]
    MalformedEncoding {
        path: PathBuf,
        row: usize,
        encoding: &'static str,
    },
    #[error("Unsupported file type {path:?} (expected csv, tsv, txt, xlsx, xlsm, xls or ods)")]
    UnsupportedFormat { path: PathBuf },
    #[error("Malformed record in {path:?}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Cannot read workbook {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },
    #[error("Row {row} of {sheet} has no column {column} ({width} cell(s) present)")]
    ShortRow {
        sheet: String,
        row: usize,
        column: usize,
        width: usize,
    },
    #[error("No original file matches '{file}' (looked for prefix '{prefix}')")]
    PairingFailure { file: String, prefix: String },
}

pub type ReconResult<T> = std::result::Result<T, ReconError>;

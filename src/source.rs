//! Tabular source reader: turns a delimited text file or a workbook into a
//! header row plus a lazy sequence of string rows.
//!
//! Delimited files stream straight from disk; the file handle lives inside
//! [`Rows`] and is released when the rows are dropped, whether they were
//! fully consumed or the comparison returned early. Workbooks are decoded
//! eagerly by `calamine` (first sheet only) and replayed from memory.
//!
//! Workbook cells are stringified so a numeric cell and its text form compare
//! equal: empty cells become `""`, integral floats print without a fraction
//! and booleans print as `TRUE`/`FALSE`. Date cells print as
//! `YYYY-MM-DD HH:MM:SS`. Empty header cells are dropped.

use std::{
    fmt,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{
    error::{ReconError, ReconResult},
    io_utils,
};

const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited(u8),
    Workbook,
}

impl SourceFormat {
    pub fn detect(path: &Path, delimiter: Option<u8>) -> ReconResult<Self> {
        match io_utils::extension_of(path) {
            Some(ext) if DELIMITED_EXTENSIONS.contains(&ext.as_str()) => Ok(
                SourceFormat::Delimited(io_utils::resolve_input_delimiter(path, delimiter)),
            ),
            Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) => Ok(SourceFormat::Workbook),
            _ => Err(ReconError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Options shared by every file read in a run.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Overrides extension-based delimiter detection for delimited files.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

/// A header plus the rows that follow it.
#[derive(Debug)]
pub struct Sheet {
    label: String,
    pub fields: Vec<String>,
    pub rows: Rows,
}

impl Sheet {
    /// Builds a sheet from rows already in memory.
    pub fn from_rows(label: impl Into<String>, fields: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            label: label.into(),
            fields,
            rows: Rows::buffered(rows),
        }
    }

    /// Name used in error messages (the file path for sheets read from disk).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn into_parts(self) -> (String, Vec<String>, Rows) {
        (self.label, self.fields, self.rows)
    }
}

/// Lazy row sequence. Yields `Err` for records that cannot be read or decoded.
pub struct Rows {
    inner: RowsInner,
}

enum RowsInner {
    Delimited {
        records: csv::ByteRecordsIntoIter<BufReader<File>>,
        path: PathBuf,
        encoding: &'static Encoding,
        // 1-based line of the next record; the header is row 1
        row: usize,
    },
    Buffered(std::vec::IntoIter<Vec<String>>),
}

impl Rows {
    fn buffered(rows: Vec<Vec<String>>) -> Self {
        Self {
            inner: RowsInner::Buffered(rows.into_iter()),
        }
    }
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            RowsInner::Delimited { path, row, .. } => f
                .debug_struct("Rows")
                .field("path", path)
                .field("row", row)
                .finish(),
            RowsInner::Buffered(rows) => f
                .debug_struct("Rows")
                .field("remaining", &rows.len())
                .finish(),
        }
    }
}

impl Iterator for Rows {
    type Item = ReconResult<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowsInner::Buffered(rows) => rows.next().map(Ok),
            RowsInner::Delimited {
                records,
                path,
                encoding,
                row,
            } => {
                let record = records.next()?;
                *row += 1;
                Some(decode_row(record, path, encoding, *row))
            }
        }
    }
}

fn decode_row(
    record: Result<csv::ByteRecord, csv::Error>,
    path: &Path,
    encoding: &'static Encoding,
    row: usize,
) -> ReconResult<Vec<String>> {
    let record = record.map_err(|source| ReconError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    io_utils::decode_record(&record, encoding).ok_or_else(|| ReconError::MalformedEncoding {
        path: path.to_path_buf(),
        row,
        encoding: encoding.name(),
    })
}

/// Opens `path` and reads its header. Data rows are read on demand.
pub fn open_sheet(path: &Path, options: &ReadOptions) -> ReconResult<Sheet> {
    match SourceFormat::detect(path, options.delimiter)? {
        SourceFormat::Delimited(delimiter) => open_delimited(path, delimiter, options.encoding),
        SourceFormat::Workbook => open_workbook(path),
    }
}

fn open_delimited(path: &Path, delimiter: u8, encoding: &'static Encoding) -> ReconResult<Sheet> {
    let file = File::open(path).map_err(|source| ReconError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut records = io_utils::open_csv_reader_from_file(file, delimiter).into_byte_records();
    let mut fields = match records.next() {
        Some(header) => decode_row(header, path, encoding, 1)?,
        None => Vec::new(),
    };
    io_utils::strip_bom(&mut fields);
    debug!(
        "Opened {:?} with {} field(s) (delimiter '{}', encoding {})",
        path,
        fields.len(),
        crate::printable_delimiter(delimiter),
        encoding.name()
    );
    Ok(Sheet {
        label: path.display().to_string(),
        fields,
        rows: Rows {
            inner: RowsInner::Delimited {
                records,
                path: path.to_path_buf(),
                encoding,
                row: 1,
            },
        },
    })
}

fn open_workbook(path: &Path) -> ReconResult<Sheet> {
    // Surface a missing or locked file as unreadable rather than as a parse failure.
    File::open(path).map_err(|source| ReconError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    })?;
    let workbook_error = |message: String| ReconError::Workbook {
        path: path.to_path_buf(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|e| workbook_error(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| workbook_error(e.to_string()))?,
        None => return Err(workbook_error("workbook contains no sheets".to_string())),
    };

    let mut rows = range.rows();
    let fields = rows
        .next()
        .map(|header| {
            header
                .iter()
                .filter(|cell| !is_blank(cell))
                .map(cell_to_string)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let data = rows
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    debug!(
        "Read {:?}: {} field(s), {} data row(s) from the first sheet",
        path,
        fields.len(),
        data.len()
    );
    Ok(Sheet {
        label: path.display().to_string(),
        fields,
        rows: Rows::buffered(data),
    })
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Stringifies a workbook cell the way it reads in the spreadsheet.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::Error(e) => format!("#{e:?}"),
        Data::DateTime(dt) => match dt.as_datetime().filter(|_| dt.is_datetime()) {
            Some(value) => value.format(DATETIME_FORMAT).to_string(),
            None => dt.as_f64().to_string(),
        },
    }
}

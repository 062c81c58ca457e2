//! Row reconciliation: key-based matching and cell-by-cell comparison of an
//! uploaded sheet against its original.
//!
//! The uploaded sheet is loaded into a hash index keyed by its identifier
//! column; the original sheet is then streamed once, forward-only. The
//! comparison is one-directional: uploaded rows whose key never appears in
//! the original are not reported. Duplicate uploaded keys resolve to the last
//! row read.

use std::{collections::HashMap, path::Path};

use log::debug;

use crate::{
    error::{ReconError, ReconResult},
    issues::{ComparisonResult, IssueRecord, result_name},
    progress::{PercentTracker, ProgressObserver, percent_of},
    schema_match::{SchemaOutcome, match_fields},
    source::{ReadOptions, Sheet, open_sheet},
};

// Share of the progress bar spent hashing the uploaded sheet.
const HASHING_PERCENT: usize = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Zero-based key column in the original sheet.
    pub original_key: usize,
    /// Zero-based key column in the uploaded sheet.
    pub uploaded_key: usize,
    /// Trim leading and trailing whitespace before comparing cells. Reported
    /// values are never trimmed.
    pub ignore_whitespace: bool,
}

/// Opens both files and reconciles them. The result is named after the
/// original file.
pub fn compare_files(
    original_path: &Path,
    uploaded_path: &Path,
    options: &ReconcileOptions,
    read: &ReadOptions,
    observer: &dyn ProgressObserver,
) -> ReconResult<ComparisonResult> {
    let name = result_name(original_path);
    debug!("Comparing {:?} against {:?}", uploaded_path, original_path);
    let uploaded = open_sheet(uploaded_path, read)?;
    let original = open_sheet(original_path, read)?;
    reconcile(&name, original, uploaded, options, observer)
}

/// Compares `uploaded` against `original`, consuming both sheets.
///
/// Returns a schema-mismatch result without reading any row when an original
/// field is absent from the uploaded header.
pub fn reconcile(
    name: &str,
    original: Sheet,
    uploaded: Sheet,
    options: &ReconcileOptions,
    observer: &dyn ProgressObserver,
) -> ReconResult<ComparisonResult> {
    let column_map = match match_fields(&original.fields, &uploaded.fields) {
        SchemaOutcome::Mismatch { missing_columns } => {
            debug!(
                "{name}: {} original field(s) missing from the uploaded header",
                missing_columns.len()
            );
            return Ok(ComparisonResult::schema_mismatch(
                name,
                original.fields,
                uploaded.fields,
                missing_columns,
            ));
        }
        SchemaOutcome::Matched(map) => map.project(&original.fields).unwrap_or_default(),
    };

    let mut tracker = PercentTracker::new();
    observer.on_status(&format!("Caching uploaded sheet {name}"));
    tracker.report(0, observer);

    let (uploaded_label, uploaded_fields, uploaded_rows) = uploaded.into_parts();
    let mut uploaded_index: HashMap<String, Vec<String>> = HashMap::new();
    for (row_idx, row) in uploaded_rows.enumerate() {
        let row = row?;
        let key = cell(&row, options.uploaded_key, &uploaded_label, row_idx)?.to_string();
        // later rows replace earlier ones with the same key
        uploaded_index.insert(key, row);
    }
    tracker.report(HASHING_PERCENT, observer);
    debug!("{name}: indexed {} uploaded key(s)", uploaded_index.len());

    observer.on_status(&format!("Comparing sheet {name}"));
    let (original_label, original_fields, original_rows) = original.into_parts();
    let mut issues = Vec::new();
    for (row_idx, row) in original_rows.enumerate() {
        let original_row = row?;
        let key = cell(&original_row, options.original_key, &original_label, row_idx)?;
        match uploaded_index.get(key) {
            None => issues.push(IssueRecord::missing_row(original_row, options.original_key)),
            Some(uploaded_row) => {
                let mismatched_columns = compare_row(
                    &original_row,
                    uploaded_row,
                    &column_map,
                    options.ignore_whitespace,
                    (original_label.as_str(), uploaded_label.as_str()),
                    row_idx,
                )?;
                if !mismatched_columns.is_empty() {
                    let uploaded_row = column_map
                        .iter()
                        .map(|&idx| uploaded_row[idx].clone())
                        .collect();
                    issues.push(IssueRecord::CellMismatch {
                        original_row,
                        uploaded_row,
                        mismatched_columns,
                    });
                }
            }
        }
        let scanned = percent_of(row_idx + 1, uploaded_index.len());
        tracker.report(
            HASHING_PERCENT + scanned * (100 - HASHING_PERCENT) / 100,
            observer,
        );
    }
    tracker.report(100, observer);
    observer.on_status(&format!("Finished comparing {name}"));
    debug!("{name}: {} issue(s)", issues.len());

    Ok(ComparisonResult::from_row_scan(
        name,
        original_fields,
        uploaded_fields,
        issues,
    ))
}

/// Original-order column positions whose values differ. Every mapped uploaded
/// cell is bounds-checked here, so callers may index `uploaded` afterwards.
fn compare_row(
    original: &[String],
    uploaded: &[String],
    column_map: &[usize],
    ignore_whitespace: bool,
    labels: (&str, &str),
    row_idx: usize,
) -> ReconResult<Vec<usize>> {
    let mut mismatched = Vec::new();
    for (column, &uploaded_column) in column_map.iter().enumerate() {
        let left = cell(original, column, labels.0, row_idx)?;
        let right = cell(uploaded, uploaded_column, labels.1, row_idx)?;
        if !cells_match(left, right, ignore_whitespace) {
            mismatched.push(column);
        }
    }
    Ok(mismatched)
}

pub fn cells_match(left: &str, right: &str, ignore_whitespace: bool) -> bool {
    if ignore_whitespace {
        left.trim() == right.trim()
    } else {
        left == right
    }
}

fn cell<'a>(row: &'a [String], column: usize, sheet: &str, row_idx: usize) -> ReconResult<&'a str> {
    row.get(column)
        .map(String::as_str)
        .ok_or_else(|| ReconError::ShortRow {
            sheet: sheet.to_string(),
            // data rows start on line 2, below the header
            row: row_idx + 2,
            column,
            width: row.len(),
        })
}

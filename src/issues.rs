//! Issue model: the findings of one file-pair comparison.
//!
//! A [`ComparisonResult`] is assembled by the reconciler and handed off by
//! value; its classification is derived from the issues it was built with,
//! so the two can never disagree.

use std::{path::Path, slice};

use serde::Serialize;

/// Placeholder written into every non-key cell of the synthetic uploaded row
/// reported for an original row with no uploaded counterpart.
pub const MISSING: &str = "MISSING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueRecord {
    /// The original row's key does not occur in the uploaded sheet.
    MissingRow {
        original_row: Vec<String>,
        uploaded_row: Vec<String>,
        key_index: usize,
    },
    /// Both sheets hold the key but at least one mapped cell differs.
    /// `uploaded_row` is re-projected into original-field order.
    CellMismatch {
        original_row: Vec<String>,
        uploaded_row: Vec<String>,
        mismatched_columns: Vec<usize>,
    },
    /// Original fields absent from the uploaded header, by original position.
    SchemaMismatch {
        original_fields: Vec<String>,
        uploaded_fields: Vec<String>,
        missing_columns: Vec<usize>,
    },
}

impl IssueRecord {
    pub fn missing_row(original_row: Vec<String>, key_index: usize) -> Self {
        let key = original_row.get(key_index).cloned().unwrap_or_default();
        let uploaded_row = (0..original_row.len())
            .map(|idx| {
                if idx == key_index {
                    key.clone()
                } else {
                    MISSING.to_string()
                }
            })
            .collect();
        IssueRecord::MissingRow {
            original_row,
            uploaded_row,
            key_index,
        }
    }

    /// Left-hand row as written to issue logs.
    pub fn original_row(&self) -> &[String] {
        match self {
            IssueRecord::MissingRow { original_row, .. }
            | IssueRecord::CellMismatch { original_row, .. } => original_row,
            IssueRecord::SchemaMismatch {
                original_fields, ..
            } => original_fields,
        }
    }

    /// Right-hand row as written to issue logs.
    pub fn uploaded_row(&self) -> &[String] {
        match self {
            IssueRecord::MissingRow { uploaded_row, .. }
            | IssueRecord::CellMismatch { uploaded_row, .. } => uploaded_row,
            IssueRecord::SchemaMismatch {
                uploaded_fields, ..
            } => uploaded_fields,
        }
    }

    /// Column positions to highlight. A missing row highlights its key cell.
    pub fn highlighted_columns(&self) -> &[usize] {
        match self {
            IssueRecord::MissingRow { key_index, .. } => slice::from_ref(key_index),
            IssueRecord::CellMismatch {
                mismatched_columns, ..
            } => mismatched_columns,
            IssueRecord::SchemaMismatch {
                missing_columns, ..
            } => missing_columns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Clean,
    HasDiscrepancies,
    SchemaMismatch,
}

impl Classification {
    pub fn message(self) -> &'static str {
        match self {
            Classification::Clean => "No issues found.",
            Classification::HasDiscrepancies => "Discrepancies found, please check the issue log.",
            Classification::SchemaMismatch => {
                "Columns fields don't match, please check the issue log."
            }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::Clean => "clean",
            Classification::HasDiscrepancies => "discrepancies",
            Classification::SchemaMismatch => "schema mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    name: String,
    classification: Classification,
    original_fields: Vec<String>,
    uploaded_fields: Vec<String>,
    issues: Vec<IssueRecord>,
}

impl ComparisonResult {
    /// Result of a completed row scan; `Clean` when `issues` is empty.
    pub fn from_row_scan(
        name: impl Into<String>,
        original_fields: Vec<String>,
        uploaded_fields: Vec<String>,
        issues: Vec<IssueRecord>,
    ) -> Self {
        let classification = if issues.is_empty() {
            Classification::Clean
        } else {
            Classification::HasDiscrepancies
        };
        Self {
            name: name.into(),
            classification,
            original_fields,
            uploaded_fields,
            issues,
        }
    }

    /// Terminal result when original fields are absent from the uploaded header.
    pub fn schema_mismatch(
        name: impl Into<String>,
        original_fields: Vec<String>,
        uploaded_fields: Vec<String>,
        missing_columns: Vec<usize>,
    ) -> Self {
        let issue = IssueRecord::SchemaMismatch {
            original_fields: original_fields.clone(),
            uploaded_fields: uploaded_fields.clone(),
            missing_columns,
        };
        Self {
            name: name.into(),
            classification: Classification::SchemaMismatch,
            original_fields,
            uploaded_fields,
            issues: vec![issue],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn issues(&self) -> &[IssueRecord] {
        &self.issues
    }

    pub fn original_fields(&self) -> &[String] {
        &self.original_fields
    }

    pub fn uploaded_fields(&self) -> &[String] {
        &self.uploaded_fields
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn missing_row_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, IssueRecord::MissingRow { .. }))
            .count()
    }

    pub fn cell_mismatch_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, IssueRecord::CellMismatch { .. }))
            .count()
    }
}

/// Result name for a file: its base name up to the first `.`.
pub fn result_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.split('.').next().unwrap_or(name).to_string())
        .unwrap_or_else(|| path.display().to_string())
}

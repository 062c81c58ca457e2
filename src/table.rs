use std::{borrow::Cow, fmt::Write as _};

use crate::{batch::BatchFailure, issues::ComparisonResult};

const SUMMARY_HEADERS: [&str; 5] = ["name", "status", "issues", "missing rows", "cell mismatches"];

/// One summary row per result, then one per failed file.
pub fn summary_rows(results: &[ComparisonResult], failures: &[BatchFailure]) -> Vec<Vec<String>> {
    let mut rows = results
        .iter()
        .map(|result| {
            vec![
                result.name().to_string(),
                result.classification().label().to_string(),
                result.issues().len().to_string(),
                result.missing_row_count().to_string(),
                result.cell_mismatch_count().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    rows.sort();
    rows.extend(failures.iter().map(|failure| {
        let name = failure
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        vec![
            name,
            format!("failed: {}", failure.error),
            "-".into(),
            "-".into(),
            "-".into(),
        ]
    }));
    rows
}

pub fn render_summary(results: &[ComparisonResult], failures: &[BatchFailure]) -> String {
    let headers = SUMMARY_HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    render_table(&headers, &summary_rows(results, failures))
}

/// Left-aligned columns separated by two spaces, with a dashed rule under the header.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let rule = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end_matches(' ').to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

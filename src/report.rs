//! Issue logs: a plain-text `ORI |`/`UPL |` listing or a spreadsheet with the
//! mismatched cells filled.
//!
//! Logs are named `issues_<result name>_<UTC timestamp>` and never overwrite
//! an existing file; a numeric suffix is added instead. Results without issues
//! produce no file.

use std::{
    fmt::Write as _,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, info};
use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook};
use serde::{Deserialize, Serialize};

use crate::{
    issues::{ComparisonResult, IssueRecord},
    pool::{run_pool, worker_count},
    progress::{ProgressObserver, percent_of},
};

pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";
const ORIGINAL_FILL: u32 = 0x26B688;
const UPLOADED_FILL: u32 = 0xFF8080;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Text,
    #[default]
    Xlsx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn issue_log_path(dir: &Path, name: &str, format: OutputFormat, at: &DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "issues_{name}_{}.{}",
        timestamp(at),
        format.extension()
    ))
}

/// Renders every issue as an `ORI |` line, an `UPL |` line and a blank line.
/// Highlighted cells are wrapped in `<|` and `|>`.
pub fn render_text(result: &ComparisonResult) -> String {
    let mut output = String::new();
    for issue in result.issues() {
        let highlighted = issue.highlighted_columns();
        let _ = writeln!(output, "{}", render_line("ORI |", issue.original_row(), highlighted));
        let _ = writeln!(output, "{}", render_line("UPL |", issue.uploaded_row(), highlighted));
        output.push('\n');
    }
    output
}

fn render_line(label: &str, cells: &[String], highlighted: &[usize]) -> String {
    let rendered = cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            if highlighted.contains(&idx) {
                format!(" <|{cell}|>")
            } else {
                format!(" {cell}")
            }
        })
        .join("");
    format!("{label}{rendered}")
}

/// Builds the spreadsheet log in memory.
///
/// Row 1 carries the original fields from column B. Each issue adds an `ORI`
/// row and a `UPL` row; highlighted cells are filled green on the original
/// row and red on the uploaded row.
pub fn render_xlsx(result: &ComparisonResult) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let original_fill = Format::new()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(ORIGINAL_FILL));
    let uploaded_fill = Format::new()
        .set_pattern(FormatPattern::Solid)
        .set_background_color(Color::RGB(UPLOADED_FILL));

    let sheet = workbook.add_worksheet();
    for (col, field) in result.original_fields().iter().enumerate() {
        sheet
            .write_string(0, excel_col(col + 1)?, field)
            .context("Writing header cell")?;
    }

    let mut row = 1u32;
    for issue in result.issues() {
        for (label, cells, fill) in [
            ("ORI", issue.original_row(), &original_fill),
            ("UPL", issue.uploaded_row(), &uploaded_fill),
        ] {
            sheet
                .write_string(row, 0, label)
                .context("Writing row label")?;
            for (idx, value, highlighted) in row_layout(cells, issue.highlighted_columns()) {
                let col = excel_col(idx + 1)?;
                let written = match (highlighted, value.is_empty()) {
                    (true, true) => sheet.write_blank(row, col, fill),
                    (true, false) => sheet.write_string_with_format(row, col, value, fill),
                    (false, _) => sheet.write_string(row, col, value),
                };
                written.with_context(|| format!("Writing cell at row {}", row + 1))?;
            }
            row += 1;
        }
    }

    workbook.save_to_buffer().context("Encoding issue workbook")
}

/// Cells of one log row with their highlight flag. Highlighted positions past
/// the end of `cells` (columns the uploaded header lacks) become empty cells
/// so the gap still shows up filled.
fn row_layout<'a>(cells: &'a [String], highlighted: &[usize]) -> Vec<(usize, &'a str, bool)> {
    let mut layout = cells
        .iter()
        .enumerate()
        .map(|(idx, value)| (idx, value.as_str(), highlighted.contains(&idx)))
        .collect::<Vec<_>>();
    layout.extend(
        highlighted
            .iter()
            .filter(|idx| **idx >= cells.len())
            .sorted_unstable()
            .dedup()
            .map(|idx| (*idx, "", true)),
    );
    layout
}

fn excel_col(idx: usize) -> Result<u16> {
    u16::try_from(idx).with_context(|| format!("Column {idx} exceeds the spreadsheet limit"))
}

/// Writes the issue log for `result` into `dir`. Returns `None` when the
/// result has no issues.
pub fn write_result(
    result: &ComparisonResult,
    dir: &Path,
    format: OutputFormat,
    at: &DateTime<Utc>,
) -> Result<Option<PathBuf>> {
    if !result.has_issues() {
        debug!("{}: no issues, nothing written", result.name());
        return Ok(None);
    }
    let contents = match format {
        OutputFormat::Text => render_text(result).into_bytes(),
        OutputFormat::Xlsx => render_xlsx(result)
            .with_context(|| format!("Rendering issues for {}", result.name()))?,
    };
    fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
    let path = issue_log_path(dir, result.name(), format, at);
    let (mut file, path) = create_unique(&path)?;
    file.write_all(&contents)
        .with_context(|| format!("Writing issue log {path:?}"))?;
    file.flush()
        .with_context(|| format!("Flushing issue log {path:?}"))?;
    info!("Wrote issues to {}", path.display());
    Ok(Some(path))
}

/// Creates `path`, or `<stem>_2.<ext>`, `<stem>_3.<ext>`... if it is taken.
fn create_unique(path: &Path) -> Result<(File, PathBuf)> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut candidate = path.to_path_buf();
    let mut attempt = 1usize;
    loop {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((file, candidate)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                attempt += 1;
                candidate = path.with_file_name(format!("{stem}_{attempt}.{extension}"));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Creating issue log {candidate:?}"));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchWriteOptions {
    pub format: OutputFormat,
    pub parallel: bool,
    pub jobs: Option<usize>,
}

/// Writes every result with issues into a fresh `issues_<timestamp>` folder
/// under `output_dir`. Returns `None`, creating nothing, when no result has
/// issues.
pub fn write_batch(
    results: &[ComparisonResult],
    output_dir: &Path,
    options: &BatchWriteOptions,
    observer: &dyn ProgressObserver,
) -> Result<Option<PathBuf>> {
    let to_write = results
        .iter()
        .filter(|result| result.has_issues())
        .collect::<Vec<_>>();
    if to_write.is_empty() {
        observer.on_status("Done! No issues found");
        return Ok(None);
    }

    let at = Utc::now();
    let folder = output_dir.join(format!("issues_{}", timestamp(&at)));
    fs::create_dir_all(&folder).with_context(|| format!("Creating log folder {folder:?}"))?;
    observer.on_status(&format!("Logging issues to {}", folder.display()));
    observer.on_progress(0);

    let total = to_write.len();
    if options.parallel {
        let workers = worker_count(total, options.jobs);
        run_pool(
            to_write,
            workers,
            |result| write_result(result, &folder, options.format, &at),
            |done, total| observer.on_progress(percent_of(done, total) as u8),
        )
        .into_iter()
        .collect::<Result<Vec<_>>>()?;
    } else {
        for (idx, result) in to_write.into_iter().enumerate() {
            observer.on_status(&format!("Creating issue log for {}", result.name()));
            write_result(result, &folder, options.format, &at)?;
            observer.on_progress(percent_of(idx + 1, total) as u8);
        }
    }

    observer.on_status(&format!("Done! Check {}", folder.display()));
    Ok(Some(folder))
}

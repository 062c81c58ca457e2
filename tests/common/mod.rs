#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use sheet_recon::source::Sheet;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Creates (if needed) and returns a subdirectory of the workspace.
    pub fn dir(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::create_dir_all(&path).expect("create workspace subdirectory");
        path
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook. Cells that parse as numbers are stored
    /// as numbers; empty strings leave the cell blank.
    pub fn write_xlsx(&self, name: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                if let Ok(number) = cell.parse::<f64>() {
                    sheet
                        .write_number(r as u32, c as u16, number)
                        .expect("write number");
                } else {
                    sheet
                        .write_string(r as u32, c as u16, *cell)
                        .expect("write string");
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

pub fn strings(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// In-memory sheet whose first row is the header.
pub fn sheet(rows: &[&[&str]]) -> Sheet {
    let mut rows = rows.iter().map(|r| strings(r));
    let fields = rows.next().unwrap_or_default();
    Sheet::from_rows("memory", fields, rows.collect())
}

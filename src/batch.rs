//! Folder batches: pairs uploaded files with originals by filename prefix and
//! reconciles every pair.
//!
//! Files follow the `<prefix>-<anything>.<csv|xlsx>` convention; the prefix
//! is everything before the first `-`. Two originals sharing a prefix resolve
//! to the one listed last.
//!
//! In sequential mode the first failure aborts the batch. In parallel mode a
//! failing pair is recorded and the remaining pairs still run.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    error::{ReconError, ReconResult},
    io_utils,
    issues::ComparisonResult,
    pool::{run_pool, worker_count},
    progress::{NoopObserver, ProgressObserver, percent_of},
    reconcile::{ReconcileOptions, compare_files},
    source::ReadOptions,
};

pub const PAIRABLE_EXTENSIONS: &[&str] = &["csv", "xlsx"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub reconcile: ReconcileOptions,
    pub read: ReadOptions,
    pub mode: ExecutionMode,
    /// Upper bound on parallel workers; `None` uses the available parallelism.
    pub jobs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePair {
    pub original: PathBuf,
    pub uploaded: PathBuf,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub file: PathBuf,
    pub error: ReconError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<ComparisonResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Text before the first `-` of the file stem; the whole stem when there is none.
pub fn file_prefix(path: &Path) -> &str {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.split('-').next().unwrap_or(stem)
}

/// Files directly under `folder` with a pairable extension, sorted by name.
pub fn list_tabular_files(folder: &Path) -> ReconResult<Vec<PathBuf>> {
    let unreadable = |source: std::io::Error| ReconError::UnreadableFolder {
        path: folder.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(folder).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        let pairable = io_utils::extension_of(&path)
            .is_some_and(|ext| PAIRABLE_EXTENSIONS.contains(&ext.as_str()));
        if pairable && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Prefix → original file lookup.
#[derive(Debug, Default)]
pub struct PairIndex {
    by_prefix: HashMap<String, PathBuf>,
}

impl PairIndex {
    pub fn new(originals: &[PathBuf]) -> Self {
        let mut by_prefix = HashMap::with_capacity(originals.len());
        for path in originals {
            if let Some(previous) = by_prefix.insert(file_prefix(path).to_string(), path.clone()) {
                debug!("{:?} replaces {:?} for its prefix", path, previous);
            }
        }
        Self { by_prefix }
    }

    pub fn resolve(&self, uploaded: &Path) -> ReconResult<FilePair> {
        let prefix = file_prefix(uploaded);
        match self.by_prefix.get(prefix) {
            Some(original) => Ok(FilePair {
                original: original.clone(),
                uploaded: uploaded.to_path_buf(),
            }),
            None => Err(ReconError::PairingFailure {
                file: display_name(uploaded),
                prefix: prefix.to_string(),
            }),
        }
    }
}

/// Reconciles every uploaded file in `uploaded_dir` against its original in
/// `original_dir`.
pub fn compare_folders(
    original_dir: &Path,
    uploaded_dir: &Path,
    options: &BatchOptions,
    observer: &dyn ProgressObserver,
) -> ReconResult<BatchOutcome> {
    observer.on_status("Processing files.");
    let originals = list_tabular_files(original_dir)?;
    let uploads = list_tabular_files(uploaded_dir)?;
    info!(
        "Pairing {} uploaded file(s) against {} original(s)",
        uploads.len(),
        originals.len()
    );
    let index = PairIndex::new(&originals);
    let outcome = match options.mode {
        ExecutionMode::Sequential => run_sequential(&index, &uploads, options, observer)?,
        ExecutionMode::Parallel => run_parallel(&index, uploads, options, observer),
    };
    observer.on_status("Finished processing files.");
    Ok(outcome)
}

fn run_sequential(
    index: &PairIndex,
    uploads: &[PathBuf],
    options: &BatchOptions,
    observer: &dyn ProgressObserver,
) -> ReconResult<BatchOutcome> {
    let mut results = Vec::with_capacity(uploads.len());
    for uploaded in uploads {
        let pair = index.resolve(uploaded)?;
        let result = compare_files(
            &pair.original,
            &pair.uploaded,
            &options.reconcile,
            &options.read,
            observer,
        )?;
        results.push(result);
        observer.on_status(&format!(
            "Completed processing of {}",
            display_name(uploaded)
        ));
    }
    Ok(BatchOutcome {
        results,
        failures: Vec::new(),
    })
}

fn run_parallel(
    index: &PairIndex,
    uploads: Vec<PathBuf>,
    options: &BatchOptions,
    observer: &dyn ProgressObserver,
) -> BatchOutcome {
    let workers = worker_count(uploads.len(), options.jobs);
    info!("Comparing {} pair(s) on {workers} worker(s)", uploads.len());
    observer.on_progress(0);
    let outputs = run_pool(
        uploads,
        workers,
        |uploaded| {
            index
                .resolve(&uploaded)
                .and_then(|pair| {
                    compare_files(
                        &pair.original,
                        &pair.uploaded,
                        &options.reconcile,
                        &options.read,
                        &NoopObserver,
                    )
                })
                .map_err(|error| {
                    warn!("{}: {error}", display_name(&uploaded));
                    BatchFailure {
                        file: uploaded,
                        error,
                    }
                })
        },
        |done, total| observer.on_progress(percent_of(done, total) as u8),
    );
    let (results, failures) = outputs.into_iter().partition_result();
    BatchOutcome { results, failures }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

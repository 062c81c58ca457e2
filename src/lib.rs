pub mod batch;
pub mod cli;
pub mod error;
pub mod io_utils;
pub mod issues;
pub mod pool;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod schema_match;
pub mod settings;
pub mod source;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    batch::{BatchFailure, ExecutionMode},
    cli::{BatchArgs, Cli, Commands, CommonArgs, CompareArgs, SettingsAction, SettingsArgs},
    issues::ComparisonResult,
    progress::LogObserver,
    report::BatchWriteOptions,
    settings::Settings,
};

pub use crate::error::{ReconError, ReconResult};
pub use crate::issues::{Classification, IssueRecord, MISSING};
pub use crate::reconcile::{ReconcileOptions, compare_files, reconcile};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheet_recon", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Compare(args) => handle_compare(&args),
        Commands::Batch(args) => handle_batch(&args),
        Commands::Settings(args) => handle_settings(&args),
    }
}

fn effective_settings(common: &CommonArgs) -> Result<Settings> {
    let settings = Settings::load_or_default(common.config.as_deref())?.merged_with(common);
    debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

fn handle_compare(args: &CompareArgs) -> Result<()> {
    ensure_file(&args.original, "Original")?;
    ensure_file(&args.uploaded, "Uploaded")?;
    let settings = effective_settings(&args.common)?;
    info!(
        "Comparing '{}' against '{}' (keys {}/{}{})",
        args.uploaded.display(),
        args.original.display(),
        settings.original_key,
        settings.uploaded_key,
        if settings.ignore_whitespace {
            ", ignoring whitespace"
        } else {
            ""
        }
    );
    let result = compare_files(
        &args.original,
        &args.uploaded,
        &settings.reconcile_options(),
        &settings.read_options()?,
        &LogObserver,
    )
    .with_context(|| format!("Comparing {:?} with {:?}", args.uploaded, args.original))?;
    info!("{}: {}", result.name(), result.classification().message());

    if !args.common.no_write {
        report::write_result(
            &result,
            &settings.output_dir,
            settings.output_format,
            &Utc::now(),
        )?;
    }
    print_results(std::slice::from_ref(&result), &[], args.common.json)
}

fn handle_batch(args: &BatchArgs) -> Result<()> {
    ensure_dir(&args.original, "Original")?;
    ensure_dir(&args.uploaded, "Uploaded")?;
    let mut settings = effective_settings(&args.common)?;
    if let Some(jobs) = args.jobs {
        settings.jobs = Some(usize::from(jobs));
    }
    let mode = if args.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Parallel
    };
    let options = settings.batch_options(mode)?;
    let outcome = batch::compare_folders(&args.original, &args.uploaded, &options, &LogObserver)
        .with_context(|| {
            format!(
                "Comparing folder {:?} with {:?}",
                args.uploaded, args.original
            )
        })?;

    let flagged = outcome
        .results
        .iter()
        .filter(|result| result.has_issues())
        .count();
    info!(
        "Batch complete: {} pair(s) compared, {} with issues, {} failed",
        outcome.results.len(),
        flagged,
        outcome.failures.len()
    );

    if !args.common.no_write {
        let write_options = BatchWriteOptions {
            format: settings.output_format,
            parallel: mode == ExecutionMode::Parallel,
            jobs: settings.jobs,
        };
        report::write_batch(
            &outcome.results,
            &settings.output_dir,
            &write_options,
            &LogObserver,
        )?;
    }
    print_results(&outcome.results, &outcome.failures, args.common.json)?;

    if !outcome.is_complete() {
        for failure in &outcome.failures {
            warn!("{:?}: {}", failure.file, failure.error);
        }
        bail!("{} file(s) could not be compared", outcome.failures.len());
    }
    Ok(())
}

fn handle_settings(args: &SettingsArgs) -> Result<()> {
    match &args.action {
        SettingsAction::Init { path, force } => {
            if path.exists() && !force {
                bail!("Settings file {path:?} already exists (use --force to overwrite)");
            }
            Settings::default()
                .save(path)
                .with_context(|| format!("Writing settings to {path:?}"))?;
            info!("Default settings written to {:?}", path);
            Ok(())
        }
        SettingsAction::Show { config } => {
            let settings = Settings::load_or_default(config.as_deref())?;
            print!("{}", settings.to_yaml_string()?);
            Ok(())
        }
    }
}

fn print_results(
    results: &[ComparisonResult],
    failures: &[BatchFailure],
    json: bool,
) -> Result<()> {
    if json {
        let failures = failures
            .iter()
            .map(|failure| {
                serde_json::json!({
                    "file": failure.file,
                    "error": failure.error.to_string(),
                })
            })
            .collect::<Vec<_>>();
        let document = serde_json::json!({ "results": results, "failures": failures });
        let rendered =
            serde_json::to_string_pretty(&document).context("Serializing results to JSON")?;
        println!("{rendered}");
    } else {
        print!("{}", table::render_summary(results, failures));
    }
    Ok(())
}

fn ensure_file(path: &Path, role: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(anyhow!("{role} file {path:?} does not exist"))
    }
}

fn ensure_dir(path: &Path, role: &str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(anyhow!("{role} folder {path:?} does not exist"))
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

//! Persistent run settings stored as YAML.
//!
//! Every key is optional; missing keys fall back to [`Settings::default`].
//! Command-line flags take precedence over the file.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    batch::{BatchOptions, ExecutionMode},
    cli::{CommonArgs, parse_delimiter},
    io_utils,
    reconcile::ReconcileOptions,
    report::OutputFormat,
    source::ReadOptions,
};

pub const DEFAULT_SETTINGS_FILE: &str = "sheet-recon.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub output_format: OutputFormat,
    pub original_key: usize,
    pub uploaded_key: usize,
    pub output_dir: PathBuf,
    pub ignore_whitespace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Xlsx,
            original_key: 0,
            uploaded_key: 0,
            output_dir: PathBuf::from("."),
            ignore_whitespace: false,
            delimiter: None,
            input_encoding: None,
            jobs: None,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening settings file {path:?}"))?;
        let settings: Settings = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing settings YAML {path:?}"))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads `path` when given; otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating settings directory {parent:?}"))?;
        }
        let file = File::create(path).with_context(|| format!("Creating settings file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing settings YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing settings to YAML")
    }

    fn validate(&self) -> Result<()> {
        if let Some(delimiter) = &self.delimiter {
            parse_delimiter(delimiter).map_err(|e| anyhow!("Invalid delimiter setting: {e}"))?;
        }
        io_utils::resolve_encoding(self.input_encoding.as_deref())?;
        if self.jobs == Some(0) {
            return Err(anyhow!("jobs must be at least 1"));
        }
        Ok(())
    }

    /// Applies command-line overrides on top of these settings.
    pub fn merged_with(mut self, args: &CommonArgs) -> Self {
        if let Some(format) = args.format {
            self.output_format = format;
        }
        if let Some(key) = args.original_key {
            self.original_key = key;
        }
        if let Some(key) = args.uploaded_key {
            self.uploaded_key = key;
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(ignore) = args.ignore_whitespace_override() {
            self.ignore_whitespace = ignore;
        }
        if let Some(delimiter) = args.delimiter {
            self.delimiter = Some((delimiter as char).to_string());
        }
        if let Some(encoding) = &args.input_encoding {
            self.input_encoding = Some(encoding.clone());
        }
        self
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            original_key: self.original_key,
            uploaded_key: self.uploaded_key,
            ignore_whitespace: self.ignore_whitespace,
        }
    }

    pub fn read_options(&self) -> Result<ReadOptions> {
        let delimiter = self
            .delimiter
            .as_deref()
            .map(parse_delimiter)
            .transpose()
            .map_err(|e| anyhow!("Invalid delimiter: {e}"))?;
        Ok(ReadOptions {
            delimiter,
            encoding: io_utils::resolve_encoding(self.input_encoding.as_deref())?,
        })
    }

    pub fn batch_options(&self, mode: ExecutionMode) -> Result<BatchOptions> {
        Ok(BatchOptions {
            reconcile: self.reconcile_options(),
            read: self.read_options()?,
            mode,
            jobs: self.jobs,
        })
    }
}

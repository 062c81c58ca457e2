use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::report::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile uploaded CSV/XLSX data against its source of truth",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compare one uploaded file against its original
    Compare(CompareArgs),
    /// Compare every uploaded file in a folder against originals paired by filename prefix
    Batch(BatchArgs),
    /// Create or inspect the settings file
    Settings(SettingsArgs),
}

/// Flags shared by `compare` and `batch`. Unset flags fall back to the settings file.
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Settings file providing defaults for the flags below
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Zero-based key column in the original file(s)
    #[arg(long = "original-key")]
    pub original_key: Option<usize>,
    /// Zero-based key column in the uploaded file(s)
    #[arg(long = "uploaded-key")]
    pub uploaded_key: Option<usize>,
    /// Ignore leading and trailing whitespace when comparing cells
    #[arg(short = 'w', long = "ignore-whitespace", overrides_with = "no_ignore_whitespace")]
    pub ignore_whitespace: bool,
    /// Compare whitespace exactly, even if the settings file says otherwise
    #[arg(long = "no-ignore-whitespace", overrides_with = "ignore_whitespace")]
    pub no_ignore_whitespace: bool,
    /// Issue log format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
    /// Directory receiving issue logs
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Delimiter for delimited inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of delimited inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Print results as JSON instead of a summary table
    #[arg(long)]
    pub json: bool,
    /// Skip writing issue logs
    #[arg(long = "no-write")]
    pub no_write: bool,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Original (source of truth) CSV or XLSX file
    #[arg(long)]
    pub original: PathBuf,
    /// Uploaded CSV or XLSX file to validate
    #[arg(long)]
    pub uploaded: PathBuf,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Folder of original files named `<prefix>-<anything>.<csv|xlsx>`
    #[arg(long)]
    pub original: PathBuf,
    /// Folder of uploaded files, paired with originals by prefix
    #[arg(long)]
    pub uploaded: PathBuf,
    /// Process one pair at a time and stop at the first failure
    #[arg(long)]
    pub sequential: bool,
    /// Maximum parallel workers (defaults to available parallelism)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Write a settings file populated with the defaults
    Init {
        /// Destination file
        #[arg(short, long, default_value = crate::settings::DEFAULT_SETTINGS_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective settings as YAML
    Show {
        /// Settings file to read (defaults only when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl CommonArgs {
    /// Whitespace handling requested on the command line, if any. The later
    /// of the two opposing flags wins.
    pub fn ignore_whitespace_override(&self) -> Option<bool> {
        if self.ignore_whitespace {
            Some(true)
        } else if self.no_ignore_whitespace {
            Some(false)
        } else {
            None
        }
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn delimiter_aliases_resolve() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("pipe"), Ok(b'|'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("é").is_err());
    }

    #[test]
    fn batch_flags_parse() {
        let cli = Cli::try_parse_from([
            "sheet-recon",
            "batch",
            "--original",
            "o",
            "--uploaded",
            "u",
            "--sequential",
            "--original-key",
            "1",
            "-f",
            "text",
        ])
        .unwrap();
        let Commands::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert!(args.sequential);
        assert_eq!(args.common.original_key, Some(1));
        assert_eq!(args.common.format, Some(OutputFormat::Text));
        assert_eq!(args.common.uploaded_key, None);
    }

    #[test]
    fn last_whitespace_flag_wins() {
        let parse = |flags: &[&str]| {
            let mut argv = vec!["sheet-recon", "compare", "--original", "o", "--uploaded", "u"];
            argv.extend_from_slice(flags);
            let Commands::Compare(args) = Cli::try_parse_from(argv).unwrap().command else {
                panic!("expected compare");
            };
            args.common.ignore_whitespace_override()
        };
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["-w"]), Some(true));
        assert_eq!(parse(&["--no-ignore-whitespace"]), Some(false));
        assert_eq!(parse(&["-w", "--no-ignore-whitespace"]), Some(false));
        assert_eq!(parse(&["--no-ignore-whitespace", "-w"]), Some(true));
    }
}

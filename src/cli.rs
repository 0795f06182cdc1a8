//! Command-line interface module for docfile.
//!
//! This module handles all CLI-related functionality including:
//! - Argument definitions
//! - Merging command-line switches with the configuration file
//! - Orchestrating the filing pass and reporting its outcome

use crate::config::{Config, ConfigError};
use crate::filing::{self, FilingOptions, FilingOutcome, FilingPlan};
use crate::identify;
use crate::importer::Importer;
use crate::mover::MoveFailure;
use crate::output::OutputFormatter;
use crate::report::{JsonReport, ReportSink, TextReport};
use clap::{ArgAction, Parser, ValueEnum};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Move and rename downloaded files to a documents tree mirroring the chart of accounts.
#[derive(Debug, Clone, Parser)]
#[command(name = "docfile", version, about)]
pub struct FileArgs {
    /// Files or directories to search for importable documents.
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Root of the documents tree to move the files to.
    #[arg(short = 'o', long = "output", visible_aliases = ["output-dir", "destination"])]
    pub output: Option<PathBuf>,

    /// Configuration file (defaults to ./.docfile.toml or ~/.config/docfile/config.toml).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Just print where the files would be moved; don't actually move them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Don't overwrite destination files with the same name.
    #[arg(long)]
    pub no_overwrite: bool,

    /// Don't create missing destination directories.
    #[arg(long)]
    pub no_mkdirs: bool,

    /// Keep filenames as they are instead of stripping unsafe characters.
    #[arg(long)]
    pub no_idify: bool,

    /// Format of the per-file report written to stdout.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    /// Increase log verbosity (-v: info, -vv: debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Report formats available on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    None,
}

impl ReportFormat {
    /// Whether stdout carries only the report, with status lines left out.
    pub fn is_machine_readable(self) -> bool {
        self == ReportFormat::Json
    }
}

/// How a command-line run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Files were moved.
    Filed(usize),
    /// Dry run; this many files would have been moved.
    DryRun(usize),
    /// Some files failed to resolve; nothing was moved.
    Aborted { errors: usize },
}

impl RunStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Filed(_) | RunStatus::DryRun(_) => 0,
            RunStatus::Aborted { .. } => 1,
        }
    }
}

/// Errors that stop a command-line run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no destination given: use --output or set `destination` in [filing]")]
    MissingDestination,

    #[error("output directory does not exist: {}", .0.display())]
    DestinationNotFound(PathBuf),

    #[error(transparent)]
    Move(#[from] MoveFailure),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Move(_) => 1,
            _ => 2,
        }
    }
}

/// Defaults of the command line: create directories, overwrite, idify.
pub fn default_cli_options() -> FilingOptions {
    FilingOptions {
        dry_run: false,
        mkdirs: true,
        overwrite: true,
        idify: true,
    }
}

/// Runs the CLI with the importers declared in the configuration file.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use docfile::cli::{run_cli, FileArgs};
///
/// let args = FileArgs::parse_from(["docfile", "-n", "-o", "/docs", "/downloads"]);
/// match run_cli(&args) {
///     Ok(status) => println!("{:?}", status),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run_cli(args: &FileArgs) -> Result<RunStatus, CliError> {
    run_with_importers(args, Vec::new())
}

/// Runs the CLI with `importers` placed ahead of the configured ones.
///
/// This is the entry point for programs that define their own [`Importer`]
/// implementations in Rust.
pub fn run_with_importers(
    args: &FileArgs,
    mut importers: Vec<Box<dyn Importer>>,
) -> Result<RunStatus, CliError> {
    let config = Config::load(args.config.as_deref())?;

    let destination = args
        .output
        .clone()
        .or_else(|| config.filing.destination.clone())
        .ok_or(CliError::MissingDestination)?;
    if !destination.is_dir() {
        return Err(CliError::DestinationNotFound(destination));
    }

    let options = resolve_options(args, &config);
    importers.extend(config.build_importers()?);
    let filters = config.filters.clone().compile()?;

    let quiet = args.report.is_machine_readable();
    if importers.is_empty() {
        tracing::warn!("no importers configured");
        if !quiet {
            OutputFormatter::warning("No importers configured; nothing can be recognized.");
        }
    }
    if !quiet {
        let prefix = if options.dry_run { "DRY RUN: " } else { "" };
        OutputFormatter::info(&format!(
            "{}Filing into: {}",
            prefix,
            destination.display()
        ));
    }

    let matches = identify::find_imports(&importers, args.inputs.clone(), &filters);

    let mut text_report;
    let mut json_report;
    let sink: Option<&mut dyn ReportSink> = match args.report {
        ReportFormat::Text => {
            text_report = TextReport::new(io::stdout());
            Some(&mut text_report)
        }
        ReportFormat::Json => {
            json_report = JsonReport::new(io::stdout());
            Some(&mut json_report)
        }
        ReportFormat::None => None,
    };

    let plan = filing::plan(matches, &destination, &options, sink);
    for error in &plan.errors {
        OutputFormatter::error(&error.to_string());
    }
    let counts = account_counts(&plan, &destination);

    let progress = (!quiet && !options.dry_run && !plan.has_errors())
        .then(|| OutputFormatter::create_progress_bar(plan.jobs.len() as u64));

    let outcome = filing::carry_out(plan, &options, |job| {
        if let Some(pb) = &progress {
            pb.set_message(job.destination().display().to_string());
            pb.inc(1);
        }
    });
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    match outcome? {
        FilingOutcome::Performed(jobs) => {
            if !quiet {
                OutputFormatter::summary_table(&counts);
                OutputFormatter::success(&format!("Filed {} document(s).", jobs.len()));
            }
            Ok(RunStatus::Filed(jobs.len()))
        }
        FilingOutcome::DryRun(plan) => {
            if !quiet {
                OutputFormatter::summary_table(&counts);
                OutputFormatter::dry_run_notice(&format!(
                    "{} file(s) would be moved. No files were modified.",
                    plan.jobs.len()
                ));
            }
            Ok(RunStatus::DryRun(plan.jobs.len()))
        }
        FilingOutcome::Aborted(plan) => {
            OutputFormatter::error(&format!(
                "{} file(s) could not be filed; no files were moved.",
                plan.errors.len()
            ));
            Ok(RunStatus::Aborted {
                errors: plan.errors.len(),
            })
        }
    }
}

/// Script defaults, then the `[filing]` table, then command-line switches.
fn resolve_options(args: &FileArgs, config: &Config) -> FilingOptions {
    let mut options = config.filing.apply(default_cli_options());
    if args.dry_run {
        options.dry_run = true;
    }
    if args.no_overwrite {
        options.overwrite = false;
    }
    if args.no_mkdirs {
        options.mkdirs = false;
    }
    if args.no_idify {
        options.idify = false;
    }
    options
}

fn account_counts(plan: &FilingPlan, destination: &Path) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for job in &plan.jobs {
        if let Some((account, _, _)) = filing::parse_destination(destination, job.destination()) {
            *counts.entry(account).or_insert(0) += 1;
        }
    }
    counts
}

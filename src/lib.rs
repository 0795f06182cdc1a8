//! docfile - file downloaded documents into a tree mirroring a chart of accounts
//!
//! This library recognizes downloaded files with a list of importers,
//! resolves the account, date and clean name of each one, and moves them
//! all at once under `<destination>/<Account/Path>/<YYYY-MM-DD>.<name>`.
//! Nothing is moved when any file fails to resolve.

pub mod account;
pub mod cli;
pub mod config;
pub mod file_memo;
pub mod filing;
pub mod identify;
pub mod importer;
pub mod mover;
pub mod output;
pub mod report;

pub use config::{CompiledFilters, Config, ConfigError, FilterRules};
pub use file_memo::FileMemo;
pub use filing::{
    DateSource, FilingError, FilingJob, FilingOptions, FilingOutcome, FilingPlan, Resolution, file,
};
pub use identify::{MatchResult, find_imports};
pub use importer::{Importer, RuleImporter};
pub use mover::{MoveError, MoveFailure};
pub use report::{JsonReport, ReportSink, TextReport};

pub use cli::{FileArgs, run_cli};

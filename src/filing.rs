//! Resolution of matched files into filing jobs, and the filing pass itself.
//!
//! For every file claimed by at least one importer this module settles on a
//! single owning account, a date and a clean name, and computes where the file
//! belongs under the documents tree:
//!
//! ```text
//! <destination>/<Account/As/Path>/<YYYY-MM-DD>.<clean name>
//! ```
//!
//! Problems are collected per file rather than raised, so one pass surfaces
//! all of them. Files are only moved when the whole batch resolved cleanly.

use crate::account;
use crate::config::CompiledFilters;
use crate::identify::{self, MatchResult};
use crate::importer::Importer;
use crate::mover::{self, MoveFailure};
use crate::report::{ReportEntry, ReportSink};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Format of the date prefix on filed documents.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static SPACES_AND_PARENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ ()]+").expect("valid regex"));
static UNDERSCORES_AROUND_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_*\._*").expect("valid regex"));
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid regex"));
static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid regex"));

/// Switches controlling how files are filed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilingOptions {
    /// Report what would happen without moving anything.
    pub dry_run: bool,
    /// Create missing destination directories.
    pub mkdirs: bool,
    /// Replace files that already exist at the destination.
    pub overwrite: bool,
    /// Strip whitespace and unsafe characters from filed names.
    pub idify: bool,
}

/// A single move from a source file to its resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingJob {
    source: PathBuf,
    destination: PathBuf,
}

impl FilingJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }
}

/// Where the date of a filed document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// The importer extracted it from the file.
    Extracted,
    /// Fallback on the file's last modification time.
    Mtime,
}

impl fmt::Display for DateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateSource::Extracted => write!(f, "extracted"),
            DateSource::Mtime => write!(f, "mtime"),
        }
    }
}

/// Everything decided about one file before validation against the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source: PathBuf,
    pub importer: String,
    pub account: String,
    pub date: NaiveDate,
    pub date_source: DateSource,
    pub destination: PathBuf,
}

/// A per-file problem that prevents the file from being filed.
#[derive(Debug, Error)]
pub enum FilingError {
    #[error("{}: no account provided by importers: {}", .path.display(), .importers.join(", "))]
    NoAccount { path: PathBuf, importers: Vec<String> },

    #[error("{}: ambiguous accounts from many importers: {}", .path.display(), .accounts.join(", "))]
    AmbiguousAccounts { path: PathBuf, accounts: Vec<String> },

    #[error("{}: invalid account '{}' from importers: {}", .path.display(), .account, .importers.join(", "))]
    InvalidAccount {
        path: PathBuf,
        account: String,
        importers: Vec<String>,
    },

    #[error("{}: cannot read file: {source}", .path.display())]
    SourceUnreadable { path: PathBuf, source: io::Error },

    #[error("{}: destination directory '{}' does not exist", .path.display(), .directory.display())]
    MissingDirectory { path: PathBuf, directory: PathBuf },

    #[error("{}: destination file '{}' already exists", .path.display(), .destination.display())]
    DestinationExists { path: PathBuf, destination: PathBuf },

    #[error(
        "{}: destination '{}' is already claimed by {}",
        .path.display(),
        .destination.display(),
        .claimed_by.display()
    )]
    DuplicateDestination {
        path: PathBuf,
        destination: PathBuf,
        claimed_by: PathBuf,
    },

    /// The destination is a file that is itself being filed, possibly this one.
    #[error(
        "{}: destination '{}' is the input file {}",
        .path.display(),
        .destination.display(),
        .occupied_by.display()
    )]
    DestinationIsSource {
        path: PathBuf,
        destination: PathBuf,
        occupied_by: PathBuf,
    },
}

impl FilingError {
    /// The source file the error is about.
    pub fn path(&self) -> &Path {
        match self {
            FilingError::NoAccount { path, .. }
            | FilingError::AmbiguousAccounts { path, .. }
            | FilingError::InvalidAccount { path, .. }
            | FilingError::SourceUnreadable { path, .. }
            | FilingError::MissingDirectory { path, .. }
            | FilingError::DestinationExists { path, .. }
            | FilingError::DuplicateDestination { path, .. }
            | FilingError::DestinationIsSource { path, .. } => path,
        }
    }
}

/// The result of resolving a whole batch: jobs ready to run and per-file errors.
#[derive(Debug, Default)]
pub struct FilingPlan {
    pub jobs: Vec<FilingJob>,
    pub errors: Vec<FilingError>,
    /// Candidate files no importer recognized.
    pub unmatched: Vec<PathBuf>,
}

impl FilingPlan {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// What a filing pass ended up doing.
#[derive(Debug)]
pub enum FilingOutcome {
    /// Every job was carried out, in order.
    Performed(Vec<FilingJob>),
    /// Dry run requested; nothing was moved.
    DryRun(FilingPlan),
    /// At least one file failed to resolve; nothing was moved.
    Aborted(FilingPlan),
}

/// Resolves the account, date and destination of a matched file.
///
/// The account must be agreed on by every importer that provides one. The
/// first matching importer, in configuration order, supplies the date and
/// the clean filename.
pub fn resolve(
    matched: &MatchResult<'_>,
    destination: &Path,
    options: &FilingOptions,
) -> Result<Resolution, FilingError> {
    let memo = &matched.memo;
    let source = memo.path().to_path_buf();

    let accounts: BTreeSet<String> = matched
        .importers
        .iter()
        .filter_map(|importer| importer.file_account(memo))
        .collect();

    let Some(importer) = matched.importers.first() else {
        return Err(FilingError::NoAccount {
            path: source,
            importers: Vec::new(),
        });
    };

    let account = match accounts.len() {
        0 => {
            return Err(FilingError::NoAccount {
                path: source,
                importers: matched.importer_names(),
            });
        }
        1 => accounts.into_iter().next().unwrap_or_default(),
        _ => {
            return Err(FilingError::AmbiguousAccounts {
                path: source,
                accounts: accounts.into_iter().collect(),
            });
        }
    };

    // The account becomes directories under the root, so it must not escape it.
    if !account::is_valid(&account) {
        return Err(FilingError::InvalidAccount {
            path: source,
            account,
            importers: matched.importer_names(),
        });
    }

    let (date, date_source) = match importer.file_date(memo) {
        Some(date) => (date, DateSource::Extracted),
        None => {
            let date = memo
                .mtime_date()
                .map_err(|e| FilingError::SourceUnreadable {
                    path: source.clone(),
                    source: e,
                })?;
            (date, DateSource::Mtime)
        }
    };

    let clean_name = match importer.file_name(memo) {
        Some(name) => {
            if DATE_PREFIX.is_match(&name) {
                tracing::warn!(
                    importer = importer.name(),
                    name = %name,
                    "importer file_name() should not date the returned filename"
                );
            }
            name
        }
        None => memo.name(),
    };

    // Only keep the last component of whatever the importer returned.
    let mut basename = Path::new(&clean_name)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| memo.name());

    if options.idify {
        basename = idify(&basename);
    }

    let destination = destination_path(destination, &account, date, &basename);

    Ok(Resolution {
        source,
        importer: importer.name().to_string(),
        account,
        date,
        date_source,
        destination,
    })
}

/// Checks a resolution against the filesystem and the jobs already planned.
///
/// `sources` maps the canonical path of every matched file to its path as found.
fn validate(
    resolution: &Resolution,
    options: &FilingOptions,
    claimed: &HashMap<PathBuf, PathBuf>,
    sources: &HashMap<PathBuf, PathBuf>,
) -> Result<(), FilingError> {
    if let Ok(canonical) = fs::canonicalize(&resolution.destination)
        && let Some(occupied_by) = sources.get(&canonical)
    {
        return Err(FilingError::DestinationIsSource {
            path: resolution.source.clone(),
            destination: resolution.destination.clone(),
            occupied_by: occupied_by.clone(),
        });
    }

    if let Some(directory) = resolution.destination.parent()
        && !options.mkdirs
        && !directory.exists()
    {
        return Err(FilingError::MissingDirectory {
            path: resolution.source.clone(),
            directory: directory.to_path_buf(),
        });
    }

    if !options.overwrite && resolution.destination.exists() {
        return Err(FilingError::DestinationExists {
            path: resolution.source.clone(),
            destination: resolution.destination.clone(),
        });
    }

    if let Some(first) = claimed.get(&resolution.destination) {
        return Err(FilingError::DuplicateDestination {
            path: resolution.source.clone(),
            destination: resolution.destination.clone(),
            claimed_by: first.clone(),
        });
    }

    Ok(())
}

/// Resolves every match into a job or an error without touching any file.
///
/// Unrecognized files are recorded as unmatched and produce neither. When a
/// sink is given, it sees one entry per candidate file. A destination that
/// lands on any matched file is an error, so no move can overwrite an input.
pub fn plan<'a>(
    matches: impl IntoIterator<Item = MatchResult<'a>>,
    destination: &Path,
    options: &FilingOptions,
    mut sink: Option<&mut dyn ReportSink>,
) -> FilingPlan {
    let mut plan = FilingPlan::default();
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    let matches: Vec<MatchResult<'a>> = matches.into_iter().collect();
    let sources: HashMap<PathBuf, PathBuf> = matches
        .iter()
        .filter(|matched| matched.is_matched())
        .filter_map(|matched| {
            let path = matched.memo.path();
            fs::canonicalize(path)
                .ok()
                .map(|canonical| (canonical, path.to_path_buf()))
        })
        .collect();

    for matched in matches {
        if !matched.is_matched() {
            if let Some(sink) = sink.as_deref_mut() {
                sink.unmatched(matched.memo.path());
            }
            plan.unmatched.push(matched.memo.path().to_path_buf());
            continue;
        }

        let (resolution, error) = match resolve(&matched, destination, options) {
            Ok(resolution) => {
                let error = validate(&resolution, options, &claimed, &sources).err();
                (Some(resolution), error)
            }
            Err(e) => (None, Some(e)),
        };

        if let Some(sink) = sink.as_deref_mut() {
            let importers = matched.importer_names();
            sink.record(&ReportEntry::new(
                matched.memo.path(),
                &importers,
                resolution.as_ref(),
                error.as_ref(),
            ));
        }

        match (resolution, error) {
            (_, Some(error)) => {
                tracing::error!("{error}");
                plan.errors.push(error);
            }
            (Some(resolution), None) => {
                claimed.insert(resolution.destination.clone(), resolution.source.clone());
                plan.jobs.push(FilingJob::new(resolution.source, resolution.destination));
            }
            (None, None) => {}
        }
    }

    plan
}

/// Carries out a plan, unless it has errors or this is a dry run.
///
/// `on_moved` is called after each file lands at its destination.
pub fn carry_out(
    plan: FilingPlan,
    options: &FilingOptions,
    on_moved: impl FnMut(&FilingJob),
) -> Result<FilingOutcome, MoveFailure> {
    if plan.has_errors() {
        tracing::warn!(errors = plan.errors.len(), "filing errors found, not moving any file");
        return Ok(FilingOutcome::Aborted(plan));
    }
    if options.dry_run {
        return Ok(FilingOutcome::DryRun(plan));
    }

    let performed = mover::execute(plan.jobs, options.mkdirs, on_moved)?;
    Ok(FilingOutcome::Performed(performed))
}

/// Files every recognized file under `inputs` into the `destination` tree.
///
/// This is the whole pass: discovery, matching, resolution, and then an
/// all-or-nothing move. Nothing is moved if any file failed to resolve or
/// if `options.dry_run` is set.
pub fn file(
    importers: &[Box<dyn Importer>],
    inputs: Vec<PathBuf>,
    destination: &Path,
    options: &FilingOptions,
    filters: &CompiledFilters,
    sink: Option<&mut dyn ReportSink>,
) -> Result<FilingOutcome, MoveFailure> {
    let matches = identify::find_imports(importers, inputs, filters);
    let plan = plan(matches, destination, options, sink);
    carry_out(plan, options, |_| {})
}

/// Builds `<root>/<account path>/<date>.<name>`, lexically normalized.
pub fn destination_path(root: &Path, account: &str, date: NaiveDate, name: &str) -> PathBuf {
    let filename = format!("{}.{}", date.format(DATE_FORMAT), name);
    normalize_path(&root.join(account::to_path(account)).join(filename))
}

/// Splits a filed path back into its account, date and clean name.
///
/// Returns `None` if `path` is not under `root` or does not carry a date prefix.
pub fn parse_destination(root: &Path, path: &Path) -> Option<(String, NaiveDate, String)> {
    let relative = normalize_path(path)
        .strip_prefix(normalize_path(root))
        .ok()?
        .to_path_buf();
    let filename = relative.file_name()?.to_str()?;
    let account = account::from_path(relative.parent()?)?;

    let (date, name) = filename.split_once('.')?;
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?;
    Some((account, date, name.to_string()))
}

/// Turns a filename into a token safe for filesystems and URLs.
///
/// Runs of spaces and parentheses become a single underscore, underscores
/// next to a dot are dropped, and anything else outside `[A-Za-z0-9._-]` is
/// removed.
///
/// ```
/// use docfile::filing::idify;
///
/// assert_eq!(idify("Statement (June 2014) .pdf"), "Statement_June_2014.pdf");
/// ```
pub fn idify(name: &str) -> String {
    let name = SPACES_AND_PARENS.replace_all(name, "_");
    let name = UNDERSCORES_AROUND_DOT.replace_all(&name, ".");
    UNSAFE_CHARS.replace_all(&name, "").to_string()
}

/// Removes `.` components and folds `..` into its parent, without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_memo::FileMemo;
    use std::fs;
    use tempfile::TempDir;

    struct Fixed {
        name: &'static str,
        account: Option<&'static str>,
        date: Option<NaiveDate>,
        file_name: Option<&'static str>,
    }

    impl Fixed {
        fn account(name: &'static str, account: &'static str) -> Self {
            Self {
                name,
                account: Some(account),
                date: None,
                file_name: None,
            }
        }
    }

    impl Importer for Fixed {
        fn name(&self) -> &str {
            self.name
        }
        fn identify(&self, _file: &FileMemo) -> bool {
            true
        }
        fn file_account(&self, _file: &FileMemo) -> Option<String> {
            self.account.map(str::to_string)
        }
        fn file_date(&self, _file: &FileMemo) -> Option<NaiveDate> {
            self.date
        }
        fn file_name(&self, _file: &FileMemo) -> Option<String> {
            self.file_name.map(str::to_string)
        }
    }

    fn matched<'a>(path: &Path, importers: &[&'a dyn Importer]) -> MatchResult<'a> {
        MatchResult {
            memo: FileMemo::new(path),
            importers: importers.to_vec(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_single_importer_extracted_date() {
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            ..Fixed::account("bank", "Assets:Bank:Checking")
        };
        let m = matched(Path::new("/downloads/statement.pdf"), &[&importer]);

        let resolution = resolve(&m, Path::new("/docs"), &FilingOptions::default()).unwrap();
        assert_eq!(resolution.account, "Assets:Bank:Checking");
        assert_eq!(resolution.date_source, DateSource::Extracted);
        assert_eq!(
            resolution.destination,
            PathBuf::from("/docs/Assets/Bank/Checking/2014-06-08.statement.pdf")
        );
    }

    #[test]
    fn test_mtime_fallback_reads_file_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("statement.pdf");
        fs::write(&file, "pdf").unwrap();

        let importer = Fixed::account("bank", "Assets:Bank");
        let m = matched(&file, &[&importer]);
        let resolution = resolve(&m, Path::new("/docs"), &FilingOptions::default()).unwrap();

        assert_eq!(resolution.date_source, DateSource::Mtime);
        assert_eq!(resolution.date, m.memo.mtime_date().unwrap());
    }

    #[test]
    fn test_missing_file_without_date_is_unreadable() {
        let importer = Fixed::account("bank", "Assets:Bank");
        let m = matched(Path::new("/does/not/exist.pdf"), &[&importer]);
        assert!(matches!(
            resolve(&m, Path::new("/docs"), &FilingOptions::default()),
            Err(FilingError::SourceUnreadable { .. })
        ));
    }

    #[test]
    fn test_account_resolution_errors() {
        let a = Fixed::account("a", "Assets:A");
        let b = Fixed::account("b", "Assets:B");
        let silent = Fixed {
            account: None,
            ..Fixed::account("silent", "Assets:A")
        };
        let path = Path::new("/downloads/invoice.csv");
        let options = FilingOptions::default();

        match resolve(&matched(path, &[&a, &b]), Path::new("/docs"), &options) {
            Err(FilingError::AmbiguousAccounts { accounts, .. }) => {
                assert_eq!(accounts, vec!["Assets:A", "Assets:B"]);
            }
            other => panic!("expected ambiguous accounts, got {other:?}"),
        }

        match resolve(&matched(path, &[&silent]), Path::new("/docs"), &options) {
            Err(FilingError::NoAccount { importers, .. }) => assert_eq!(importers, vec!["silent"]),
            other => panic!("expected no account, got {other:?}"),
        }
    }

    #[test]
    fn test_agreeing_importers_and_first_importer_wins() {
        let first = Fixed {
            date: Some(date(2020, 1, 2)),
            file_name: Some("first.pdf"),
            ..Fixed::account("first", "Assets:A")
        };
        let second = Fixed {
            date: Some(date(1999, 9, 9)),
            file_name: Some("second.pdf"),
            ..Fixed::account("second", "Assets:A")
        };
        let silent = Fixed {
            account: None,
            ..Fixed::account("silent", "Assets:Z")
        };
        let m = matched(Path::new("/in/x.pdf"), &[&first, &silent, &second]);
        let resolution = resolve(&m, Path::new("/docs"), &FilingOptions::default()).unwrap();

        assert_eq!(resolution.importer, "first");
        assert_eq!(
            resolution.destination,
            PathBuf::from("/docs/Assets/A/2020-01-02.first.pdf")
        );
    }

    #[test]
    fn test_importer_name_is_reduced_to_basename_and_idified() {
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            file_name: Some("sub/dir/My Statement (June).PDF"),
            ..Fixed::account("bank", "Assets:Bank")
        };
        let m = matched(Path::new("/in/x.pdf"), &[&importer]);
        let options = FilingOptions {
            idify: true,
            ..FilingOptions::default()
        };
        let resolution = resolve(&m, Path::new("/docs/./tree/../"), &options).unwrap();

        assert_eq!(
            resolution.destination,
            PathBuf::from("/docs/Assets/Bank/2014-06-08.My_Statement_June.PDF")
        );
    }

    #[test]
    fn test_date_prefixed_importer_name_is_kept() {
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            file_name: Some("2014-06-08.statement.pdf"),
            ..Fixed::account("bank", "Assets:Bank")
        };
        let m = matched(Path::new("/in/x.pdf"), &[&importer]);
        let resolution = resolve(&m, Path::new("/docs"), &FilingOptions::default()).unwrap();
        assert_eq!(
            resolution.destination,
            PathBuf::from("/docs/Assets/Bank/2014-06-08.2014-06-08.statement.pdf")
        );
    }

    #[test]
    fn test_plan_skips_unmatched_and_flags_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            file_name: Some("statement.pdf"),
            ..Fixed::account("bank", "Assets:Bank")
        };
        let matches = vec![
            matched(Path::new("/in/a.pdf"), &[&importer]),
            matched(Path::new("/in/unknown.txt"), &[]),
            matched(Path::new("/in/b.pdf"), &[&importer]),
        ];
        let options = FilingOptions {
            mkdirs: true,
            ..FilingOptions::default()
        };

        let plan = plan(matches, temp_dir.path(), &options, None);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.unmatched, vec![PathBuf::from("/in/unknown.txt")]);
        assert_eq!(plan.errors.len(), 1);
        assert!(matches!(
            &plan.errors[0],
            FilingError::DuplicateDestination { claimed_by, .. } if claimed_by == Path::new("/in/a.pdf")
        ));
    }

    #[test]
    fn test_validation_against_filesystem() {
        let temp_dir = TempDir::new().unwrap();
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            ..Fixed::account("bank", "Assets:Bank")
        };
        let m = || vec![matched(Path::new("/in/statement.pdf"), &[&importer])];

        let missing = plan(m(), temp_dir.path(), &FilingOptions::default(), None);
        assert!(matches!(missing.errors[0], FilingError::MissingDirectory { .. }));

        let filed = temp_dir.path().join("Assets/Bank/2014-06-08.statement.pdf");
        fs::create_dir_all(filed.parent().unwrap()).unwrap();
        fs::write(&filed, "old").unwrap();

        let exists = plan(m(), temp_dir.path(), &FilingOptions::default(), None);
        assert!(matches!(exists.errors[0], FilingError::DestinationExists { .. }));

        let overwrite = FilingOptions {
            overwrite: true,
            ..FilingOptions::default()
        };
        let ok = plan(m(), temp_dir.path(), &overwrite, None);
        assert!(!ok.has_errors());
        assert_eq!(ok.jobs[0].destination(), filed);
    }

    #[test]
    fn test_account_escaping_root_is_rejected() {
        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            ..Fixed::account("sneaky", "Assets:..:..:outside")
        };
        let rooted = Fixed {
            date: Some(date(2014, 6, 8)),
            ..Fixed::account("rooted", "Assets:/etc")
        };
        let options = FilingOptions::default();

        for importer in [&importer as &dyn Importer, &rooted] {
            let m = matched(Path::new("/in/x.pdf"), &[importer]);
            match resolve(&m, Path::new("/docs"), &options) {
                Err(FilingError::InvalidAccount { importers, .. }) => {
                    assert_eq!(importers, vec![importer.name().to_string()]);
                }
                other => panic!("expected invalid account, got {other:?}"),
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let dry = FilingOptions {
            dry_run: true,
            mkdirs: true,
            ..FilingOptions::default()
        };
        let plan = plan(
            vec![matched(Path::new("/in/x.pdf"), &[&importer])],
            &temp_dir.path().join("docs"),
            &dry,
            None,
        );
        assert!(plan.jobs.is_empty());
        assert!(matches!(plan.errors[0], FilingError::InvalidAccount { .. }));
    }

    #[test]
    fn test_destination_on_input_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let filed = temp_dir.path().join("Assets/Bank/2014-06-08.statement.pdf");
        fs::create_dir_all(filed.parent().unwrap()).unwrap();
        fs::write(&filed, "precious").unwrap();
        let download = temp_dir.path().join("a.pdf");
        fs::write(&download, "new").unwrap();

        let importer = Fixed {
            date: Some(date(2014, 6, 8)),
            file_name: Some("statement.pdf"),
            ..Fixed::account("bank", "Assets:Bank")
        };
        let options = FilingOptions {
            mkdirs: true,
            overwrite: true,
            idify: true,
            ..FilingOptions::default()
        };

        // The already filed document comes back as an input alongside a new download.
        let plan = plan(
            vec![matched(&download, &[&importer]), matched(&filed, &[&importer])],
            temp_dir.path(),
            &options,
            None,
        );

        assert!(plan.jobs.is_empty());
        assert_eq!(plan.errors.len(), 2);
        assert!(plan.errors.iter().all(|e| matches!(
            e,
            FilingError::DestinationIsSource { occupied_by, .. } if occupied_by == &filed
        )));
        assert!(matches!(
            carry_out(plan, &options, |_| {}),
            Ok(FilingOutcome::Aborted(_))
        ));
        assert_eq!(fs::read_to_string(&filed).unwrap(), "precious");
        assert_eq!(fs::read_to_string(&download).unwrap(), "new");
    }

    #[test]
    fn test_destination_round_trip() {
        let root = Path::new("/docs");
        let path = destination_path(root, "Liabilities:CreditCard:Visa", date(2015, 12, 31), "bill.pdf");
        assert_eq!(
            parse_destination(root, &path),
            Some((
                "Liabilities:CreditCard:Visa".to_string(),
                date(2015, 12, 31),
                "bill.pdf".to_string()
            ))
        );
        assert_eq!(parse_destination(Path::new("/elsewhere"), &path), None);
    }

    #[test]
    fn test_idify() {
        assert_eq!(idify("Bank Statement.pdf"), "Bank_Statement.pdf");
        assert_eq!(idify("a (b) _.csv"), "a_b.csv");
        assert_eq!(idify("résumé&co.txt"), "rsumco.txt");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize_path(Path::new("../a/..")), PathBuf::from(".."));
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn test_dry_run_and_errors_do_not_move() {
        let plan_with_error = FilingPlan {
            errors: vec![FilingError::NoAccount {
                path: PathBuf::from("/in/x"),
                importers: vec![],
            }],
            ..FilingPlan::default()
        };
        let options = FilingOptions::default();
        assert!(matches!(
            carry_out(plan_with_error, &options, |_| {}),
            Ok(FilingOutcome::Aborted(_))
        ));

        let dry = FilingOptions {
            dry_run: true,
            ..FilingOptions::default()
        };
        let plan = FilingPlan {
            jobs: vec![FilingJob::new("/in/does-not-exist", "/out/x")],
            ..FilingPlan::default()
        };
        assert!(matches!(carry_out(plan, &dry, |_| {}), Ok(FilingOutcome::DryRun(_))));
    }
}

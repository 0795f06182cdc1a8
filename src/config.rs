//! Filing configuration.
//!
//! Configuration is stored in TOML and covers three things: default filing
//! switches, which candidate files are considered at all, and the
//! declarative importers used to recognize files.
//!
//! # Configuration File Format
//!
//! ```toml
//! [filing]
//! destination = "/home/user/documents"
//! mkdirs = true
//! overwrite = false
//!
//! [filters]
//! enable_hidden_files = false
//! max_file_size = 8388608
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part", "**/tmp/**"]
//! extensions = ["crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [[importer]]
//! name = "bank-checking"
//! account = "Assets:Bank:Checking"
//! filename = '^statement.*\.pdf$'
//! ```

use crate::filing::FilingOptions;
use crate::importer::{Importer, ImporterError, RuleConfig, RuleImporter};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Files larger than this are skipped unless configured otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_NAME: &str = ".docfile.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern provided with the actual error reason.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    /// An `[[importer]]` entry could not be built.
    #[error(transparent)]
    Importer(#[from] ImporterError),

    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(#[from] std::io::Error),
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filing: FilingSection,

    #[serde(default)]
    pub filters: FilterRules,

    #[serde(default, rename = "importer")]
    pub importers: Vec<RuleConfig>,
}

/// The `[filing]` table. Unset switches keep the caller's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingSection {
    /// Root of the documents tree, used when none is given on the command line.
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub mkdirs: Option<bool>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub idify: Option<bool>,
}

impl FilingSection {
    /// Applies the switches set in this table on top of `defaults`.
    pub fn apply(&self, defaults: FilingOptions) -> FilingOptions {
        FilingOptions {
            dry_run: self.dry_run.unwrap_or(defaults.dry_run),
            mkdirs: self.mkdirs.unwrap_or(defaults.mkdirs),
            overwrite: self.overwrite.unwrap_or(defaults.overwrite),
            idify: self.idify.unwrap_or(defaults.idify),
        }
    }
}

/// Rules deciding which candidate files are handed to importers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Files larger than this many bytes are skipped.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from filing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.part", "**/tmp/**").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude, case-insensitive.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.docfile.toml` in the current directory
    /// 3. Look for `~/.config/docfile/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found fails to parse.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("docfile")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), importers = config.importers.len(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Build the configured importers, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate importer names, invalid accounts or invalid regexes.
    pub fn build_importers(&self) -> Result<Vec<Box<dyn Importer>>, ConfigError> {
        let mut names = HashSet::new();
        let mut importers: Vec<Box<dyn Importer>> = Vec::with_capacity(self.importers.len());

        for rule in &self.importers {
            if !names.insert(rule.name.as_str()) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "duplicate importer name '{}'",
                    rule.name
                )));
            }
            importers.push(Box::new(RuleImporter::from_config(rule.clone())?));
        }

        Ok(importers)
    }
}

impl FilterRules {
    /// Compile rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

/// Pre-compiled filter rules for matching candidate files.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    max_file_size: u64,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: FilterRules) -> Result<Self, ConfigError> {
        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            max_file_size: rules.max_file_size,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Size limit in bytes for candidate files.
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Check if a file should be handed to importers.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden file filter - if hidden and disabled, exclude
    /// 3. Exact filename match - if matched, exclude
    /// 4. File extension match - if matched, exclude
    /// 5. Glob pattern match - if matched, exclude
    /// 6. Regex pattern match - if matched, exclude
    /// 7. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_any(&self.include_patterns, file_path) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches_any(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    /// Check if a directory should be walked into.
    ///
    /// Hidden directories are skipped unless hidden files are enabled or an
    /// include pattern names the directory.
    pub fn should_descend(&self, dir_path: &Path) -> bool {
        let hidden = dir_path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        !hidden || self.enable_hidden_files || self.matches_any(&self.include_patterns, dir_path)
    }

    fn matches_any(&self, patterns: &[Pattern], path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(path))
    }
}

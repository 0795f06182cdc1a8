//! The importer capability and a declarative, configuration-driven importer.
//!
//! An importer recognizes files of one particular source (a bank's PDF
//! statements, a broker's CSV exports, ...) and tells the filer which account
//! owns them, what date they carry and what they should be called.

use crate::account;
use crate::file_memo::{DEFAULT_HEAD_BYTES, FileMemo};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file recognizer and metadata extractor.
///
/// Absent answers are `None`, never a sentinel value. Implementations must
/// handle I/O errors from the [`FileMemo`] themselves.
pub trait Importer {
    /// A unique, human-readable name used in reports.
    fn name(&self) -> &str;

    /// Returns true if this importer claims the file.
    fn identify(&self, file: &FileMemo) -> bool;

    /// The account that owns the file.
    fn file_account(&self, file: &FileMemo) -> Option<String>;

    /// The date the document refers to, if it can be extracted.
    fn file_date(&self, _file: &FileMemo) -> Option<NaiveDate> {
        None
    }

    /// A cleaned-up filename, without any date prefix.
    fn file_name(&self, _file: &FileMemo) -> Option<String> {
        None
    }
}

/// Errors raised while building an importer from its configuration.
#[derive(Debug, Error)]
pub enum ImporterError {
    #[error("importer '{name}': invalid account '{account}'")]
    InvalidAccount { name: String, account: String },

    #[error("importer '{name}': invalid {field} regex '{pattern}': {reason}")]
    InvalidRegex {
        name: String,
        field: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("importer '{name}': date regex '{pattern}' needs exactly one capture group")]
    DateCaptureGroup { name: String, pattern: String },
}

/// Date extraction rule: a regex with one capture group and a chrono format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRule {
    pub regex: String,
    pub format: String,
}

/// Declarative importer definition, as read from an `[[importer]]` table.
///
/// ```toml
/// [[importer]]
/// name = "bank-checking"
/// account = "Assets:Bank:Checking"
/// filename = '^statement.*\.pdf$'
/// mime = "application/pdf"
/// date = { regex = 'Period ending (\d{2}/\d{2}/\d{4})', format = "%m/%d/%Y" }
/// rename = "statement.pdf"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub account: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: Option<DateRule>,
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default = "default_head_bytes")]
    pub head_bytes: usize,
}

fn default_head_bytes() -> usize {
    DEFAULT_HEAD_BYTES
}

/// An importer that matches files by name, MIME type and content patterns.
///
/// A file is claimed only when every configured matcher agrees. A rule with
/// no matchers claims nothing.
#[derive(Debug)]
pub struct RuleImporter {
    name: String,
    account: String,
    filename: Option<Regex>,
    mime: Option<String>,
    content: Option<Regex>,
    date: Option<(Regex, String)>,
    rename: Option<String>,
    head_bytes: usize,
}

impl RuleImporter {
    /// Compiles a rule, validating its account and regexes up front.
    pub fn from_config(config: RuleConfig) -> Result<Self, ImporterError> {
        if !account::is_valid(&config.account) {
            return Err(ImporterError::InvalidAccount {
                name: config.name,
                account: config.account,
            });
        }

        let compile = |field: &'static str, pattern: &str| {
            Regex::new(pattern).map_err(|e| ImporterError::InvalidRegex {
                name: config.name.clone(),
                field,
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };

        let filename = config
            .filename
            .as_deref()
            .map(|p| compile("filename", p))
            .transpose()?;
        let content = config
            .content
            .as_deref()
            .map(|p| compile("content", p))
            .transpose()?;
        let date = match &config.date {
            Some(rule) => {
                let regex = compile("date", &rule.regex)?;
                // captures_len counts the implicit whole-match group.
                if regex.captures_len() != 2 {
                    return Err(ImporterError::DateCaptureGroup {
                        name: config.name.clone(),
                        pattern: rule.regex.clone(),
                    });
                }
                Some((regex, rule.format.clone()))
            }
            None => None,
        };

        Ok(Self {
            name: config.name,
            account: config.account,
            filename,
            mime: config.mime,
            content,
            date,
            rename: config.rename,
            head_bytes: config.head_bytes,
        })
    }

    fn head(&self, file: &FileMemo) -> Option<String> {
        match file.head(self.head_bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(importer = %self.name, path = %file.path().display(), error = %e, "cannot read file head");
                None
            }
        }
    }

    fn extract_date(&self, text: &str) -> Option<NaiveDate> {
        let (regex, format) = self.date.as_ref()?;
        let captured = regex.captures(text)?.get(1)?.as_str();
        match NaiveDate::parse_from_str(captured, format) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::debug!(importer = %self.name, captured, error = %e, "date did not parse");
                None
            }
        }
    }
}

impl Importer for RuleImporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn identify(&self, file: &FileMemo) -> bool {
        if self.filename.is_none() && self.mime.is_none() && self.content.is_none() {
            return false;
        }

        if let Some(regex) = &self.filename
            && !regex.is_match(&file.name())
        {
            return false;
        }

        if let Some(expected) = &self.mime {
            match file.mimetype() {
                Ok(Some(mime)) if mime == expected => {}
                Ok(_) => return false,
                Err(e) => {
                    tracing::debug!(importer = %self.name, path = %file.path().display(), error = %e, "cannot sniff mime type");
                    return false;
                }
            }
        }

        if let Some(regex) = &self.content {
            match self.head(file) {
                Some(text) if regex.is_match(&text) => {}
                _ => return false,
            }
        }

        true
    }

    fn file_account(&self, _file: &FileMemo) -> Option<String> {
        Some(self.account.clone())
    }

    fn file_date(&self, file: &FileMemo) -> Option<NaiveDate> {
        self.date.as_ref()?;
        self.head(file)
            .and_then(|text| self.extract_date(&text))
            .or_else(|| self.extract_date(&file.name()))
    }

    fn file_name(&self, _file: &FileMemo) -> Option<String> {
        self.rename.clone()
    }
}

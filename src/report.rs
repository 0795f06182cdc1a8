//! Audit trail of filing decisions.
//!
//! A [`ReportSink`] is told about every candidate file: the importers that
//! claimed it, the account and date that were resolved, where it would go,
//! and why it could not be filed. Dry runs and aborted runs are inspected
//! through this trail.

use crate::filing::{DateSource, FilingError, Resolution};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// One filing decision, ready to be written out.
#[derive(Debug, Serialize)]
pub struct ReportEntry<'a> {
    pub source: &'a Path,
    pub matched: &'a [String],
    pub importer: Option<&'a str>,
    pub account: Option<&'a str>,
    pub date: Option<NaiveDate>,
    pub date_source: Option<DateSource>,
    pub destination: Option<&'a Path>,
    pub error: Option<String>,
}

impl<'a> ReportEntry<'a> {
    pub fn new(
        source: &'a Path,
        matched: &'a [String],
        resolution: Option<&'a Resolution>,
        error: Option<&FilingError>,
    ) -> Self {
        Self {
            source,
            matched,
            importer: resolution
                .map(|r| r.importer.as_str())
                .or_else(|| matched.first().map(String::as_str)),
            account: resolution.map(|r| r.account.as_str()),
            date: resolution.map(|r| r.date),
            date_source: resolution.map(|r| r.date_source),
            destination: resolution.map(|r| r.destination.as_path()),
            error: error.map(ToString::to_string),
        }
    }
}

/// Receives filing decisions as they are made.
pub trait ReportSink {
    /// A candidate file that no importer recognized.
    fn unmatched(&mut self, source: &Path);

    /// A file claimed by at least one importer, resolved or not.
    fn record(&mut self, entry: &ReportEntry<'_>);
}

/// Human-readable report, one block per file.
///
/// ```text
/// === /downloads/statement.pdf
///   Importer:    bank
///   Account:     Assets:Bank:Checking
///   Date:        2014-06-08 (from mtime)
///   Destination: /docs/Assets/Bank/Checking/2014-06-08.statement.pdf
/// ```
pub struct TextReport<W: Write> {
    writer: W,
}

impl<W: Write> TextReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_entry(&mut self, entry: &ReportEntry<'_>) -> io::Result<()> {
        let w = &mut self.writer;
        writeln!(w, "=== {}", entry.source.display())?;
        writeln!(w, "  Importer:    {}", entry.importer.unwrap_or("-"))?;
        if entry.matched.len() > 1 {
            writeln!(w, "  Matched:     {}", entry.matched.join(", "))?;
        }
        if let Some(account) = entry.account {
            writeln!(w, "  Account:     {}", account)?;
        }
        if let (Some(date), Some(source)) = (entry.date, entry.date_source) {
            writeln!(w, "  Date:        {} (from {})", date, source)?;
        }
        if let Some(destination) = entry.destination {
            writeln!(w, "  Destination: {}", destination.display())?;
        }
        if let Some(error) = &entry.error {
            writeln!(w, "  Error:       {}", error)?;
        }
        writeln!(w)
    }
}

impl<W: Write> ReportSink for TextReport<W> {
    fn unmatched(&mut self, source: &Path) {
        let result = writeln!(self.writer, "=== {}\n  Importer:    -\n", source.display());
        if let Err(e) = result {
            tracing::warn!(error = %e, "cannot write report");
        }
    }

    fn record(&mut self, entry: &ReportEntry<'_>) {
        if let Err(e) = self.write_entry(entry) {
            tracing::warn!(error = %e, "cannot write report");
        }
    }
}

/// Machine-readable report, one JSON object per line.
pub struct JsonReport<W: Write> {
    writer: W,
}

impl<W: Write> JsonReport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, entry: &ReportEntry<'_>) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        writeln!(self.writer)
    }
}

impl<W: Write> ReportSink for JsonReport<W> {
    fn unmatched(&mut self, source: &Path) {
        self.record(&ReportEntry::new(source, &[], None, None));
    }

    fn record(&mut self, entry: &ReportEntry<'_>) {
        if let Err(e) = self.write_line(entry) {
            tracing::warn!(error = %e, "cannot write report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolution() -> Resolution {
        Resolution {
            source: PathBuf::from("/in/statement.pdf"),
            importer: "bank".to_string(),
            account: "Assets:Bank:Checking".to_string(),
            date: NaiveDate::from_ymd_opt(2014, 6, 8).unwrap(),
            date_source: DateSource::Mtime,
            destination: PathBuf::from("/docs/Assets/Bank/Checking/2014-06-08.statement.pdf"),
        }
    }

    #[test]
    fn test_text_report_block() {
        let resolution = resolution();
        let matched = vec!["bank".to_string()];
        let mut report = TextReport::new(Vec::new());
        report.record(&ReportEntry::new(
            &resolution.source,
            &matched,
            Some(&resolution),
            None,
        ));

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert_eq!(
            text,
            "=== /in/statement.pdf\n\
             \x20 Importer:    bank\n\
             \x20 Account:     Assets:Bank:Checking\n\
             \x20 Date:        2014-06-08 (from mtime)\n\
             \x20 Destination: /docs/Assets/Bank/Checking/2014-06-08.statement.pdf\n\n"
        );
    }

    #[test]
    fn test_text_report_error_and_unmatched() {
        let error = FilingError::AmbiguousAccounts {
            path: PathBuf::from("/in/invoice.csv"),
            accounts: vec!["Assets:A".to_string(), "Assets:B".to_string()],
        };
        let matched = vec!["a".to_string(), "b".to_string()];
        let mut report = TextReport::new(Vec::new());
        report.unmatched(Path::new("/in/notes.txt"));
        report.record(&ReportEntry::new(
            Path::new("/in/invoice.csv"),
            &matched,
            None,
            Some(&error),
        ));

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert!(text.starts_with("=== /in/notes.txt\n  Importer:    -\n\n"));
        assert!(text.contains("=== /in/invoice.csv\n  Importer:    a\n"));
        assert!(text.contains("  Matched:     a, b\n"));
        assert!(text.contains("ambiguous accounts from many importers: Assets:A, Assets:B"));
    }

    #[test]
    fn test_unresolved_file_names_primary_importer() {
        let error = FilingError::NoAccount {
            path: PathBuf::from("/in/receipt.pdf"),
            importers: vec!["receipts".to_string()],
        };
        let matched = vec!["receipts".to_string()];
        let mut report = TextReport::new(Vec::new());
        report.record(&ReportEntry::new(
            Path::new("/in/receipt.pdf"),
            &matched,
            None,
            Some(&error),
        ));

        let text = String::from_utf8(report.into_inner()).unwrap();
        assert!(text.starts_with("=== /in/receipt.pdf\n  Importer:    receipts\n  Error:"));
        assert!(!text.contains("Importer:    -"));
    }

    #[test]
    fn test_json_report_lines() {
        let resolution = resolution();
        let matched = vec!["bank".to_string()];
        let mut report = JsonReport::new(Vec::new());
        report.record(&ReportEntry::new(
            &resolution.source,
            &matched,
            Some(&resolution),
            None,
        ));
        report.unmatched(Path::new("/in/notes.txt"));

        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["account"], "Assets:Bank:Checking");
        assert_eq!(lines[0]["date"], "2014-06-08");
        assert_eq!(lines[0]["date_source"], "mtime");
        assert!(lines[1]["importer"].is_null());
        assert_eq!(lines[1]["matched"], serde_json::json!([]));
    }
}

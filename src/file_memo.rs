//! Memoized access to a candidate file.
//!
//! Several importers usually interrogate the same file (its name, its MIME
//! type, the first few kilobytes of text). A [`FileMemo`] computes each of
//! these views on first use and keeps it for the lifetime of the memo, so the
//! file is read from disk at most once no matter how many importers ask.

use chrono::{DateTime, Local, NaiveDate};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Number of bytes importers inspect at the start of a file unless told otherwise.
pub const DEFAULT_HEAD_BYTES: usize = 8192;

/// A file path plus lazily computed, cached views of its content and metadata.
///
/// Construction does no I/O. Failures while computing a view are returned to
/// the caller and are not cached, so a later call retries the read.
#[derive(Debug)]
pub struct FileMemo {
    path: PathBuf,
    contents: OnceCell<Vec<u8>>,
    mimetype: OnceCell<Option<String>>,
    mtime_date: OnceCell<NaiveDate>,
    heads: RefCell<HashMap<usize, String>>,
}

impl FileMemo {
    /// Creates a memo for `path` without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: OnceCell::new(),
            mimetype: OnceCell::new(),
            mtime_date: OnceCell::new(),
            heads: RefCell::new(HashMap::new()),
        }
    }

    /// The full path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The base name of the file, or an empty string for a path without one.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// The lowercased extension of the file, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    /// The raw bytes of the file, read once.
    pub fn contents(&self) -> io::Result<&[u8]> {
        if let Some(bytes) = self.contents.get() {
            return Ok(bytes.as_slice());
        }
        let bytes = fs::read(&self.path)?;
        Ok(self.contents.get_or_init(|| bytes).as_slice())
    }

    /// The first `max_bytes` of the file decoded as text.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected, so binary
    /// files still produce something an importer can pattern-match against.
    pub fn head(&self, max_bytes: usize) -> io::Result<String> {
        if let Some(text) = self.heads.borrow().get(&max_bytes) {
            return Ok(text.clone());
        }
        let contents = self.contents()?;
        let text = String::from_utf8_lossy(&contents[..contents.len().min(max_bytes)]).to_string();
        self.heads.borrow_mut().insert(max_bytes, text.clone());
        Ok(text)
    }

    /// The MIME type of the file, sniffed from its content.
    ///
    /// Binary formats are recognized by their magic bytes. Files with no known
    /// signature that decode as UTF-8 are reported as `text/csv` when they
    /// carry a `.csv` extension and `text/plain` otherwise.
    pub fn mimetype(&self) -> io::Result<Option<&str>> {
        if let Some(mime) = self.mimetype.get() {
            return Ok(mime.as_deref());
        }
        let contents = self.contents()?;
        let mime = match infer::get(contents) {
            Some(kind) => Some(kind.mime_type().to_string()),
            None if std::str::from_utf8(contents).is_ok() => {
                if self.extension().as_deref() == Some("csv") {
                    Some("text/csv".to_string())
                } else {
                    Some("text/plain".to_string())
                }
            }
            None => None,
        };
        Ok(self.mimetype.get_or_init(|| mime).as_deref())
    }

    /// The calendar date of the file's last modification, in local time.
    pub fn mtime_date(&self) -> io::Result<NaiveDate> {
        if let Some(date) = self.mtime_date.get() {
            return Ok(*date);
        }
        let modified = fs::metadata(&self.path)?.modified()?;
        let date = DateTime::<Local>::from(modified).date_naive();
        Ok(*self.mtime_date.get_or_init(|| date))
    }
}

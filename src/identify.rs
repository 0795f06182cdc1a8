//! Discovery of candidate files and matching them against importers.

use crate::config::CompiledFilters;
use crate::file_memo::FileMemo;
use crate::importer::Importer;
use std::path::PathBuf;
use walkdir::{DirEntry, WalkDir};

/// A candidate file and the importers that claimed it, in configuration order.
///
/// An empty importer list means nobody recognized the file.
pub struct MatchResult<'a> {
    pub memo: FileMemo,
    pub importers: Vec<&'a dyn Importer>,
}

impl MatchResult<'_> {
    /// Returns true if at least one importer claimed the file.
    pub fn is_matched(&self) -> bool {
        !self.importers.is_empty()
    }

    /// Names of the matching importers, in configuration order.
    pub fn importer_names(&self) -> Vec<String> {
        self.importers.iter().map(|imp| imp.name().to_string()).collect()
    }
}

/// Walks `inputs` and yields every candidate file with the importers that claim it.
///
/// Inputs may be files or directories; directories are walked recursively,
/// depth-first, visiting entries of each directory in file-name order. Files
/// rejected by `filters` are not yielded. The sequence is lazy and single-pass:
/// each file is matched only when the caller pulls it.
pub fn find_imports<'a>(
    importers: &'a [Box<dyn Importer>],
    inputs: Vec<PathBuf>,
    filters: &'a CompiledFilters,
) -> impl Iterator<Item = MatchResult<'a>> + 'a {
    inputs
        .into_iter()
        .flat_map(move |input| candidate_files(input, filters))
        .map(move |path| identify_file(importers, path))
}

fn candidate_files(input: PathBuf, filters: &CompiledFilters) -> impl Iterator<Item = PathBuf> + '_ {
    if !input.exists() {
        tracing::warn!(path = %input.display(), "input does not exist, skipping");
    }

    WalkDir::new(input)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || filters.should_descend(entry.path())
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(move |entry| accepts(filters, entry))
        .map(DirEntry::into_path)
}

fn accepts(filters: &CompiledFilters, entry: &DirEntry) -> bool {
    if !filters.should_include(entry.path()) {
        tracing::debug!(path = %entry.path().display(), "excluded by filters");
        return false;
    }

    match entry.metadata() {
        Ok(metadata) if metadata.len() > filters.max_file_size() => {
            tracing::debug!(
                path = %entry.path().display(),
                size = metadata.len(),
                "file too large, skipping"
            );
            false
        }
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(path = %entry.path().display(), error = %e, "cannot stat file");
            false
        }
    }
}

fn identify_file(importers: &[Box<dyn Importer>], path: PathBuf) -> MatchResult<'_> {
    let memo = FileMemo::new(path);
    let matched: Vec<&dyn Importer> = importers
        .iter()
        .map(|importer| importer.as_ref())
        .filter(|importer| importer.identify(&memo))
        .collect();

    let names: Vec<&str> = matched.iter().map(|imp| imp.name()).collect();
    tracing::debug!(path = %memo.path().display(), importers = ?names, "identified");

    MatchResult {
        memo,
        importers: matched,
    }
}

//! Moving filed documents into place.
//!
//! Files are moved by copying them to their destination and only then
//! removing the source, so a destination on another device (an encrypted
//! volume, a network mount) works the same as one on the same filesystem.
//! A move onto the source itself is refused before anything is written.

use crate::filing::FilingJob;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while moving a single file.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The destination directory is missing and may not be created.
    #[error("destination directory '{}' does not exist", .path.display())]
    MissingDirectory { path: PathBuf },

    /// Failed to create the destination directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Source and destination are the same file; copying would truncate it.
    #[error("{} and {} are the same file", .from.display(), .to.display())]
    SameFile { from: PathBuf, to: PathBuf },

    /// Copying stopped partway; the source is intact and the destination may be partial.
    #[error(
        "failed to copy {} to {}: {source}; the source was kept, check the destination by hand",
        .from.display(),
        .to.display()
    )]
    PartialCopy {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The copy succeeded but the source could not be removed.
    #[error("copied {} but failed to remove it: {source}", .path.display())]
    SourceRemovalFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type for single-file moves.
pub type MoveResult<T> = Result<T, MoveError>;

/// A batch that stopped at a failing move.
///
/// Jobs after the failing one were not attempted.
#[derive(Debug, Error)]
#[error("{error} ({} file(s) were moved before the failure)", .completed.len())]
pub struct MoveFailure {
    /// Jobs that completed before the failure, in order.
    pub completed: Vec<FilingJob>,
    /// The job that failed.
    pub job: FilingJob,
    #[source]
    pub error: MoveError,
}

/// Moves `src` to `dst`, possibly across devices.
///
/// The destination directory is created when `mkdirs` is set. The source
/// is removed only after the whole file was copied.
///
/// # Examples
///
/// ```no_run
/// use docfile::mover::move_xdev_file;
/// use std::path::Path;
///
/// let result = move_xdev_file(
///     Path::new("/downloads/statement.pdf"),
///     Path::new("/mnt/docs/Assets/Bank/2014-06-08.statement.pdf"),
///     true,
/// );
///
/// if let Err(e) = result {
///     eprintln!("Move failed: {}", e);
/// }
/// ```
pub fn move_xdev_file(src: &Path, dst: &Path, mkdirs: bool) -> MoveResult<()> {
    if let Some(dst_dir) = dst.parent()
        && !dst_dir.as_os_str().is_empty()
        && !dst_dir.exists()
    {
        if !mkdirs {
            return Err(MoveError::MissingDirectory {
                path: dst_dir.to_path_buf(),
            });
        }
        fs::create_dir_all(dst_dir).map_err(|e| MoveError::DirectoryCreationFailed {
            path: dst_dir.to_path_buf(),
            source: e,
        })?;
    }

    if let (Ok(from), Ok(to)) = (fs::canonicalize(src), fs::canonicalize(dst))
        && from == to
    {
        return Err(MoveError::SameFile {
            from: src.to_path_buf(),
            to: dst.to_path_buf(),
        });
    }

    fs::copy(src, dst).map_err(|e| MoveError::PartialCopy {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;

    fs::remove_file(src).map_err(|e| MoveError::SourceRemovalFailed {
        path: src.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

/// Runs `jobs` in order, stopping at the first failure.
///
/// `on_moved` is called after each successful move. Returns the jobs that
/// were carried out.
pub fn execute(
    jobs: Vec<FilingJob>,
    mkdirs: bool,
    mut on_moved: impl FnMut(&FilingJob),
) -> Result<Vec<FilingJob>, MoveFailure> {
    let mut completed = Vec::with_capacity(jobs.len());

    for job in jobs {
        if let Err(error) = move_xdev_file(job.source(), job.destination(), mkdirs) {
            tracing::error!(source = %job.source().display(), error = %error, "move failed, stopping");
            return Err(MoveFailure {
                completed,
                job,
                error,
            });
        }
        tracing::info!(
            source = %job.source().display(),
            destination = %job.destination().display(),
            "moved"
        );
        on_moved(&job);
        completed.push(job);
    }

    Ok(completed)
}

//! Failure attribution and output cleanup

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::domain::errors::MergeError;
use crate::error::MediaError;

/// Turns toolkit faults into merge errors and removes output on failure.
/// Logs identify clips by index only.
pub struct FailureReporter {
    output: PathBuf,
}

impl FailureReporter {
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
        }
    }

    /// Clip `index` could not be opened or demuxed
    pub fn unreadable(index: usize, cause: &MediaError) -> MergeError {
        warn!(clip_index = index, error = %cause, "Clip could not be read");
        MergeError::ClipUnreadable { index }
    }

    /// Clip `index` opened but carries no audio or video
    pub fn no_media_tracks(index: usize) -> MergeError {
        warn!(clip_index = index, "Clip has no audio or video tracks");
        MergeError::ClipUnreadable { index }
    }

    /// Non-indexed fault while producing the output
    pub fn write_failure(stage: &str, cause: &MediaError) -> MergeError {
        error!(stage, error = %cause, "Output write failed");
        MergeError::WriteFailure(format!("{}: {}", stage, cause))
    }

    /// Pass `result` through; on error, make sure nothing is left at the
    /// output path before surfacing it.
    pub fn conclude<T>(&self, result: Result<T, MergeError>) -> Result<T, MergeError> {
        if let Err(err) = &result {
            let removed = self.discard_output();
            error!(
                code = err.code(),
                clip_index = ?err.clip_index(),
                removed_output = removed,
                "Merge aborted: {}",
                err
            );
        }
        result
    }

    /// Remove the output file if present. Safe to call repeatedly; returns
    /// whether a file was removed.
    pub fn discard_output(&self) -> bool {
        match fs::remove_file(&self.output) {
            Ok(()) => {
                debug!("Removed output file after failure");
                true
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(error = %e, "Failed to remove output file");
                false
            }
        }
    }
}

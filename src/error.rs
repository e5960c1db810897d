//! Error types for the `sub2srt` crate.
//!
//! This module defines [`Sub2SrtError`], the unified error type returned by
//! all fallible operations in the crate, and [`ProcessFailure`], which
//! describes a single failed external invocation. Errors carry enough
//! context (paths, command lines, exit codes, captured stderr) to reproduce
//! the failing step by hand.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::{io::Error as IoError, path::PathBuf};

use image::ImageError;
use thiserror::Error;

/// A failed invocation of an external tool.
///
/// Produced by the process runner when a command cannot be started or exits
/// with a non-zero status. The captured stderr is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// The command line, rendered for display.
    pub command: String,
    /// Exit code, or `None` when the process never started or was killed
    /// by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error (or the tail of the combined output for
    /// live-window runs).
    pub stderr: String,
}

impl Display for ProcessFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.exit_code {
            Some(code) => write!(f, "`{}` exited with code {code}", self.command)?,
            None => write!(f, "`{}` did not run to completion", self.command)?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProcessFailure {}

/// The unified error type for all `sub2srt` operations.
///
/// Every public method that can fail returns `Result<T, Sub2SrtError>`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Sub2SrtError {
    /// A required external binary or runtime could not be located.
    #[error("Missing dependency `{tool}`: {hint}")]
    MissingDependency {
        /// Name of the tool that was looked up.
        tool: String,
        /// How to make the tool available.
        hint: String,
    },

    /// An expected input artifact does not exist.
    #[error("Not found: {}: {reason}", path.display())]
    NotFound {
        /// The path that was expected to exist.
        path: PathBuf,
        /// What was being looked for.
        reason: String,
    },

    /// A directory input holds more than one container file.
    #[error(
        "Ambiguous input: {} contains {} container files",
        directory.display(),
        candidates.len()
    )]
    AmbiguousInput {
        /// The directory that was searched.
        directory: PathBuf,
        /// Every container found, sorted by path.
        candidates: Vec<PathBuf>,
    },

    /// The input exists but cannot be processed.
    #[error("Invalid input {}: {reason}", path.display())]
    InvalidInput {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// An external process failed to start or exited non-zero.
    #[error("Process failed: {0}")]
    Process(#[from] ProcessFailure),

    /// A live-window run was interrupted. The child has already been
    /// terminated when this is returned.
    #[error("Process interrupted: `{command}`")]
    Interrupted {
        /// The command line that was running.
        command: String,
    },

    /// Track extraction from a container failed.
    #[error("Failed to export tracks from {}: {source}", container.display())]
    Export {
        /// The container being demuxed.
        container: PathBuf,
        /// The failed demuxer invocation.
        #[source]
        source: ProcessFailure,
    },

    /// Conversion of a binary subtitle stream into an event list failed.
    #[error("Failed to convert {}: {reason}", input.display())]
    Conversion {
        /// The binary subtitle file being converted.
        input: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A language code could not be resolved.
    #[error("Invalid language code: {0:?}")]
    InvalidLanguage(String),

    /// A frame timecode could not be converted.
    #[error("Invalid timecode {value:?}: {reason}")]
    InvalidTimecode {
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The XML event list is unreadable or lacks required metadata.
    #[error("Malformed event list {}: {reason}", path.display())]
    MalformedEvents {
        /// Path of the event list.
        path: PathBuf,
        /// What was missing or invalid.
        reason: String,
    },

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while loading or normalising a cue
    /// bitmap.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,
}

impl Sub2SrtError {
    /// Returns `true` when the error must stop the whole pipeline run rather
    /// than only the job that raised it.
    ///
    /// A missing binary fails every later job the same way, and an
    /// interrupt or cancellation is a request to stop.
    pub fn stops_run(&self) -> bool {
        matches!(
            self,
            Sub2SrtError::MissingDependency { .. }
                | Sub2SrtError::Interrupted { .. }
                | Sub2SrtError::Cancelled
        )
    }

    pub(crate) fn not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Sub2SrtError::NotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Sub2SrtError::InvalidInput {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

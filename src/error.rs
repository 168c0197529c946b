#![allow(non_shorthand_field_patterns)]
#![doc = "Error handling primitives shared across the ghloc crate."]
// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! The derive emitted by [`masterror::Error`] expands pattern matches that
//! trigger the `non_shorthand_field_patterns` lint. The lint is disabled for
//! the module to keep the generated implementations warning-free.

use std::path::{Path, PathBuf};

use crate::pipeline::PipelineStage;

/// Unified error type returned by the snapshot pipeline, the store, the
/// renderers and the CLI.
///
/// Variants carry enough context to diagnose a failed push from the server
/// logs alone. Secrets such as installation tokens never appear in messages;
/// the fetcher redacts them before constructing [`Error::Clone`].
#[derive(Debug, masterror::Error)]
pub enum Error {
    /// Wraps I/O errors on a known filesystem location.
    #[error("i/o failure at {path:?}: {source}")]
    Io {
        /// Location that triggered the failure.
        path:   PathBuf,
        /// Underlying I/O error.
        source: std::io::Error
    },
    /// Directory traversal failed while counting a workspace.
    #[error("failed to walk {path:?}: {message}")]
    Walk {
        /// Root of the walk.
        path:    PathBuf,
        /// Description reported by the walker.
        message: String
    },
    /// `git clone` exited unsuccessfully.
    #[error("git clone of {repository} failed: {output}")]
    Clone {
        /// `owner/repo` being cloned.
        repository: String,
        /// Combined stdout and stderr of the subprocess, token redacted.
        output:     String
    },
    /// SQLite reported an error.
    #[error("snapshot store error: {source}")]
    Store {
        /// Underlying SQLite error.
        source: rusqlite::Error
    },
    /// Returned when input violates invariants.
    #[error("invalid input: {message}")]
    Validation {
        /// Human readable message describing the validation problem.
        message: String
    },
    /// Service errors when interacting with external APIs.
    #[error("service error: {message}")]
    Service {
        /// Human readable message describing the service error.
        message: String
    },
    /// Wraps JSON encoding and decoding errors.
    #[error("failed to (de)serialize JSON: {source}")]
    Serialize {
        /// Source error from serde_json.
        source: serde_json::Error
    },
    /// A push pipeline stage failed; the invocation was abandoned.
    #[error("push pipeline failed while {stage}: {reason}")]
    Pipeline {
        /// Stage that was running when the failure happened.
        stage:  PipelineStage,
        /// Failure reported by the stage.
        reason: Box<Error>
    }
}

impl Error {
    /// Constructs a validation error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the validation failure.
    pub fn validation<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Validation {
            message: message.into()
        }
    }

    /// Constructs a service error from the provided displayable value.
    ///
    /// # Parameters
    ///
    /// * `message` - Human-readable description of the service error.
    pub fn service<M>(message: M) -> Self
    where
        M: Into<String>
    {
        Self::Service {
            message: message.into()
        }
    }

    /// Wraps `self` as the failure of a pipeline stage.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        Self::Pipeline {
            stage,
            reason: Box::new(self)
        }
    }

    /// Formats the error for diagnostics without the variant name.
    ///
    /// The returned string matches the [`std::fmt::Display`] implementation.
    pub fn to_display_string(&self) -> String {
        format!("{self}")
    }
}

impl From<rusqlite::Error> for Error {
    fn from(source: rusqlite::Error) -> Self {
        Self::Store {
            source
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::Serialize {
            source
        }
    }
}

impl From<masterror::AppError> for Error {
    fn from(error: masterror::AppError) -> Self {
        Self::Service {
            message: error.to_string()
        }
    }
}

/// Creates an [`Error::Io`] variant capturing the failing path and source.
///
/// # Parameters
///
/// * `path` - Location that triggered the error.
/// * `source` - I/O error reported by the operating system.
pub fn io_error(path: &Path, source: std::io::Error) -> Error {
    Error::Io {
        path: path.to_path_buf(),
        source
    }
}

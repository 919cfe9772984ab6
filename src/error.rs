//! Errors raised while turning a virtual path into bytes.
//!
//! None of these are fatal to the process: each one is scoped to the single
//! navigation or protocol fetch that triggered it, and the shell surfaces it
//! as a failed load in the requesting window.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a bundle resource lookup.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The virtual path resolves outside the bundle root. Security violation:
    /// nothing is served.
    #[error("path escapes the bundle root: {0}")]
    PathEscape(String),

    /// The resolved path has no backing file.
    #[error("resource not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read (permissions, truncation...).
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ResourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// HTTP status used when the error is reported through the bundle protocol.
    pub fn status(&self) -> u16 {
        match self {
            Self::PathEscape(_) => 403,
            Self::NotFound(_) => 404,
            Self::Io { .. } => 500,
        }
    }
}

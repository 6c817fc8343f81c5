// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use crate::stream::StreamError;

/// Failures while loading or playing a source.
///
/// Everything except [`Error::Config`] only costs the affected source its
/// place in the play-list.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: StreamError,
    },
    #[error("{}: {source}", path.display())]
    CorruptStream {
        path: PathBuf,
        #[source]
        source: StreamError,
    },
    #[error("{0}")]
    Config(String),
}

impl Error {
    /// Attach a path to a stream failure, keeping corruption distinct from I/O.
    pub fn stream(path: impl Into<PathBuf>, source: StreamError) -> Self {
        let path = path.into();
        match source {
            StreamError::Corrupt { .. } => Error::CorruptStream { path, source },
            source => Error::Io { path, source },
        }
    }
}

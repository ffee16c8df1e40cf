//! Error taxonomy for sources, planners and readers.

use std::io;
use thiserror::Error;

/// Result alias for the source/reader API.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SourceError {
    /// A required source field was never set.
    #[error("need to set the {field} of a BoundedSource")]
    Configuration { field: &'static str },

    /// The format library could not be resolved or failed to discover splits.
    #[error("split planning failed: {message}")]
    Planning {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Listing failed while estimating size. Recovered to an estimate of 0 by callers.
    #[error("size estimation failed for {resource}: {source}")]
    Estimation {
        resource: String,
        #[source]
        source: io::Error,
    },

    /// The per-split cursor failed or was interrupted mid-read.
    #[error("read failed on {split}: {source}")]
    Read {
        split: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot find an encoding for type {0}")]
    UnsupportedType(String),

    #[error("no current element")]
    NoCurrentElement,

    #[error("{op}() is not valid while the reader is {state}")]
    IllegalState { op: &'static str, state: &'static str },

    /// A split handle could not be built from, or decoded back into, a descriptor.
    #[error("split handle error: {0}")]
    Split(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl SourceError {
    pub(crate) fn planning(message: impl Into<String>, source: Option<io::Error>) -> Self {
        SourceError::Planning {
            message: message.into(),
            source,
        }
    }

    /// True when a read failed because the backend observed an interruption.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            SourceError::Read { source, .. } if source.kind() == io::ErrorKind::Interrupted
        )
    }
}

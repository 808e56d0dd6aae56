//! Error types for accelerator construction and configuration.

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors that abort an accelerator build.
///
/// Degenerate geometry is never reported here; the builder recovers from it
/// by forcing leaves.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to allocate {what} ({requested} more elements)")]
    Allocation {
        what: &'static str,
        requested: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("Too many primitive references for 32-bit indices: {count}")]
    IndexOverflow { count: usize },
}

/// Result type for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while reading accelerator parameters.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid accelerator parameters: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reserve room for `additional` more elements, reporting failure as a
/// [`BuildError::Allocation`].
pub(crate) fn try_reserve<T>(
    vec: &mut Vec<T>,
    additional: usize,
    what: &'static str,
) -> BuildResult<()> {
    vec.try_reserve(additional)
        .map_err(|source| BuildError::Allocation {
            what,
            requested: additional,
            source,
        })
}

/// Convert a count or offset into a 32-bit index.
pub(crate) fn to_index(count: usize) -> BuildResult<u32> {
    u32::try_from(count).map_err(|_| BuildError::IndexOverflow { count })
}

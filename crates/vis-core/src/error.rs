//! Error types surfaced to query and subscription callers.
//!
//! Updates for unknown paths are not errors: the store reports them through
//! [`ChangeResult`](crate::store::ChangeResult) and the caller only logs them.

use thiserror::Error;

use crate::path::PatternError;

/// Errors returned by store queries and subscription management.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisError {
    /// The path pattern could not be compiled.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] PatternError),

    /// A query matched no path, or an unsubscribe referenced an unknown id.
    #[error("Not found: {0}")]
    NotFound(String),
}

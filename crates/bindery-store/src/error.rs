#![forbid(unsafe_code)]

//! Store error taxonomy.
//!
//! Configuration mistakes (bad path syntax, root-path writes) surface as
//! `Err` at the call site. A listener callback failure is logged and
//! dispatch continues; a predicate failure aborts the flush as
//! [`StoreError::Predicate`], because a broken predicate is a programming
//! error rather than a data condition.

use bindery_path::PathError;

/// Boxed error type returned by listener callbacks and function predicates.
pub type FaultError = Box<dyn std::error::Error>;

/// Errors surfaced by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Invalid path syntax or a write at the root path.
    Path(PathError),
    /// A function predicate failed while matching a touched path; the flush
    /// was aborted. Carries the listener description and the touched path.
    Predicate {
        listener: String,
        touched: String,
        source: FaultError,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(e) => write!(f, "path error: {e}"),
            Self::Predicate {
                listener,
                touched,
                source,
            } => write!(
                f,
                "predicate of listener '{listener}' failed on path '{touched}': {source}"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Path(e) => Some(e),
            Self::Predicate { source, .. } => Some(source.as_ref()),
        }
    }
}

impl From<PathError> for StoreError {
    fn from(e: PathError) -> Self {
        Self::Path(e)
    }
}

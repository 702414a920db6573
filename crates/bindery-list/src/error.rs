#![forbid(unsafe_code)]

//! List binding error type.

use bindery_store::StoreError;

/// Fatal errors raised while binding or updating a list.
///
/// Recoverable misses (unknown node, item not found, non-array path) are
/// `Option`/`bool` returns with `tracing` diagnostics, not errors.
#[derive(Debug)]
pub enum ListError {
    /// The container did not hold exactly one structural child to serve as
    /// the row template.
    ContainerShape {
        /// Number of children actually found.
        children: usize,
    },
    /// A store operation failed (path syntax, predicate fault).
    Store(StoreError),
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContainerShape { children } => write!(
                f,
                "list container must hold exactly one template child, found {children}"
            ),
            Self::Store(err) => write!(f, "store error: {err}"),
        }
    }
}

impl std::error::Error for ListError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ContainerShape { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ListError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<bindery_path::PathError> for ListError {
    fn from(err: bindery_path::PathError) -> Self {
        Self::Store(StoreError::Path(err))
    }
}

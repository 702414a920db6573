#![forbid(unsafe_code)]

//! Virtualized, identity-preserving list binding over a bindery store.
//!
//! The engine is headless: hosts supply the rendered container through the
//! [`ListTarget`] trait and binding rewrites through [`BindingRewriter`],
//! and drive time explicitly (`now_ms` arguments everywhere, no clock
//! reads), which keeps every behavior deterministic under test.
//!
//! A [`ListBinding`] watches one array path, filters it (visibility
//! predicate each pass, needle filter at a lower throttled cadence),
//! computes a render window per the configured [`Virtualization`] mode,
//! and reconciles the container against that window while preserving node
//! identity per item.

pub mod binding;
pub mod error;
pub mod options;
pub mod target;
pub mod throttle;

pub use binding::{BindingState, ListBinding};
pub use error::ListError;
pub use options::{Align, Columns, ListOptions, Virtualization};
pub use target::{BindingRewriter, ListTarget, NodeId};
pub use throttle::Throttle;

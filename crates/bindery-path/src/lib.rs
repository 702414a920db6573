#![forbid(unsafe_code)]

//! Path grammar and path-addressed access for the bindery state graph.
//!
//! A [`Path`] addresses one node inside an arbitrary `serde_json::Value`
//! tree. Three segment kinds compose:
//!
//! - property keys (`user.name`),
//! - non-negative indices (`rows[3]`),
//! - id-matches (`rows[id=17]`, `rows[meta.key=a=b]`) that select the first
//!   element whose field stringifies to the given value.
//!
//! [`get`], [`set`], and [`delete`] evaluate a path against a value graph.
//! `get` never fails on missing intermediates; `set` auto-vivifies them.
//!
//! # Invariants
//!
//! 1. `Path::to_string()` round-trips through [`parse`] for every valid path.
//! 2. `get(set(root, p, v), p) == Some(v)` for every non-root path `p`.
//! 3. `set` returns `Ok(true)` iff the addressed value actually changed.
//! 4. Bracket contents are scanned greedily to the matching `]`, so id
//!    values may contain `=`, `.`, and other punctuation.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Result |
//! |---------|-------|--------|
//! | Missing intermediate on read | Sparse graph | `get` returns `None` |
//! | Missing intermediate on write | Sparse graph | Auto-vivified |
//! | Write at the root path | Caller bug | `Err(PathError::EmptyWritePath)` |
//! | Malformed brackets | Bad path string | `Err(PathError::...)` |

pub mod access;
pub mod error;
pub mod path;

pub use access::{delete, get, get_mut, id_string, set};
pub use error::PathError;
pub use path::{Path, Segment, parse};

#![forbid(unsafe_code)]

//! Path-addressable reactive store for bindery.
//!
//! This crate provides the mutable state registry and everything that makes
//! it observable:
//!
//! - [`Store`]: a cheap-clone handle over one mutable value graph plus the
//!   notification state. Single-threaded (`Rc<RefCell<..>>` internally).
//! - [`View`]: a path-aware window onto a graph location, created lazily on
//!   read. Writes through a view validate the path, suppress no-op writes,
//!   and touch the written path.
//! - [`BoxedScalar`]: a leaf accessor carrying path + store handle, for
//!   primitives that cannot carry metadata themselves.
//! - The notification engine: [`Store::observe`] / [`Store::touch`] /
//!   [`Store::updates`], with prefix-deduped coalescing and id-path touch
//!   synthesis for registered arrays.
//!
//! # Invariants
//!
//! 1. A view's accessors always agree with `get(registry, path)`.
//! 2. Only writes through the store/view API notify; external mutation of
//!    data obtained via `Store::get` needs a manual [`Store::touch`].
//! 3. Identical-value writes touch nothing.
//! 4. Any number of touches within one turn coalesce into a single flush;
//!    [`Store::updates`] is the only way to drive/await that flush.
//! 5. An id-path-registered array guarantees every index touch inside it
//!    produces a matching id-keyed touch when the id resolves.
//! 6. Listeners added or removed mid-flush never affect paths already
//!    dispatched in that flush.

pub mod error;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod view;

pub use error::{FaultError, StoreError};
pub use notify::{Ack, ObserverGuard, ObserverHandle, Predicate, Verdict};
pub use scheduler::{DeferredScheduler, Scheduler};
pub use store::Store;
pub use view::{BoxedScalar, Leaf, Mode, Reading, SetArg, View};

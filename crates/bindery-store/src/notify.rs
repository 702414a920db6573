#![forbid(unsafe_code)]

//! Listener registry types for the notification engine.
//!
//! A listener is a (predicate, callback) pair. Predicates come in three
//! shapes: a path (bidirectional-prefix test, so ancestor and descendant
//! listeners both fire), a regex over the canonical path string, or an
//! arbitrary function. Both the predicate and the callback can ask for the
//! listener's removal — the two call sites are intentional and both are
//! honored.
//!
//! Dispatch walks a snapshot of the listener list taken at flush start;
//! removal is a tombstone flag checked per dispatch, so listeners added or
//! removed mid-flush cannot affect paths already dispatched.

use std::cell::{Cell, RefCell};

use bindery_path::{Path, PathError, parse};
use regex::Regex;

use crate::error::FaultError;
use crate::store::Store;

/// Outcome of testing a predicate against a touched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The listener's callback should run for this path.
    Hit,
    /// No match; try the next path.
    Miss,
    /// Unregister this listener without running its callback.
    Remove,
}

/// Outcome a callback reports after handling a touched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// Stay registered.
    Keep,
    /// Unregister this listener.
    Remove,
}

type PredicateFn = Box<dyn Fn(&Path) -> Result<Verdict, FaultError>>;

/// How a listener decides which touched paths it cares about.
pub enum Predicate {
    /// Bidirectional-prefix match against a fixed path.
    Path(Path),
    /// Regex match against the canonical path string.
    Pattern(Regex),
    /// Arbitrary function; may fail (aborting the flush) or self-remove.
    Func(PredicateFn),
}

impl Predicate {
    /// Path predicate from a path string.
    pub fn path(s: &str) -> Result<Self, PathError> {
        Ok(Self::Path(parse(s)?))
    }

    /// Regex predicate over the canonical path string.
    #[must_use]
    pub fn pattern(re: Regex) -> Self {
        Self::Pattern(re)
    }

    /// Function predicate.
    #[must_use]
    pub fn func(f: impl Fn(&Path) -> Result<Verdict, FaultError> + 'static) -> Self {
        Self::Func(Box::new(f))
    }

    pub(crate) fn test(&self, touched: &Path) -> Result<Verdict, FaultError> {
        match self {
            Self::Path(p) => Ok(if p.overlaps(touched) {
                Verdict::Hit
            } else {
                Verdict::Miss
            }),
            Self::Pattern(re) => Ok(if re.is_match(&touched.to_string()) {
                Verdict::Hit
            } else {
                Verdict::Miss
            }),
            Self::Func(f) => f(touched),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Path(p) => format!("path({p})"),
            Self::Pattern(re) => format!("pattern({})", re.as_str()),
            Self::Func(_) => "func".to_string(),
        }
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Predicate::{}", self.describe())
    }
}

pub(crate) type Callback = Box<dyn FnMut(&Path) -> Result<Ack, FaultError>>;

/// One registered listener.
pub(crate) struct Observer {
    pub id: u64,
    pub description: String,
    pub predicate: Predicate,
    pub callback: RefCell<Callback>,
    /// Tombstone honored by in-flight dispatch snapshots.
    pub removed: Cell<bool>,
}

/// Opaque id naming a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(pub(crate) u64);

/// RAII wrapper that unobserves on drop.
///
/// The explicit-disposal counterpart of holding subscriptions in a scope:
/// a binding that owns guards tears all of its listeners down by dropping.
pub struct ObserverGuard {
    store: Store,
    handle: Option<ObserverHandle>,
}

impl ObserverGuard {
    pub(crate) fn new(store: Store, handle: ObserverHandle) -> Self {
        Self {
            store,
            handle: Some(handle),
        }
    }

    /// The wrapped handle.
    #[must_use]
    pub fn handle(&self) -> ObserverHandle {
        self.handle.expect("guard not yet dropped")
    }

    /// Unobserve now instead of at drop time.
    pub fn release(mut self) {
        if let Some(h) = self.handle.take() {
            self.store.unobserve(h);
        }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            self.store.unobserve(h);
        }
    }
}

impl std::fmt::Debug for ObserverGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverGuard")
            .field("handle", &self.handle)
            .finish()
    }
}

/// A touched path waiting for the next flush.
#[derive(Debug, Clone)]
pub(crate) struct PendingTouch {
    pub path: Path,
    /// Synthesized id-keyed touches never re-trigger synthesis.
    pub id_keyed: bool,
}

/// Mutable notification state owned by the store.
pub(crate) struct NotifyState {
    pub observers: Vec<std::rc::Rc<Observer>>,
    pub next_id: u64,
    pub pending: Vec<PendingTouch>,
    pub flush_scheduled: bool,
    pub in_flush: bool,
    /// Registered array path -> id-paths, for index -> id touch synthesis.
    pub id_paths: ahash::AHashMap<Path, Vec<String>>,
}

impl NotifyState {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
            pending: Vec::new(),
            flush_scheduled: false,
            in_flush: false,
            id_paths: ahash::AHashMap::new(),
        }
    }

    /// Append a touch with prefix-dedup: the new path is dropped when an
    /// already-pending path is equal to it or a prefix of it.
    pub fn enqueue(&mut self, path: Path, id_keyed: bool) -> bool {
        if self.pending.iter().any(|t| t.path.is_prefix_of(&path)) {
            return false;
        }
        self.pending.push(PendingTouch { path, id_keyed });
        true
    }
}

#![forbid(unsafe_code)]

//! Path-aware views over the registry.
//!
//! A [`View`] is an ephemeral `(store, path, mode)` value bound to a live
//! graph location. Two views of the same path are behaviorally equivalent
//! but not identical. Raw and boxed mode share one mechanism and differ
//! only in leaf handling: raw mode reads leaf scalars as plain values,
//! boxed mode wraps them as [`BoxedScalar`]s so primitives can carry a
//! path and subscribe/bind affordances.
//!
//! There is no operator overloading here on purpose: a wrapped primitive
//! never compares equal to the raw primitive. Views and boxed scalars
//! expose an explicit [`View::value`] / [`BoxedScalar::value`] accessor,
//! and only `.value()` equality is meaningful.
//!
//! Metadata never shadows data: data access ([`View::at`]) and layer
//! metadata ([`View::value`], [`View::path`], [`View::observe`]) are
//! distinct methods, so a data property named `value` or `path` is always
//! reachable.

use bindery_path::{Path, access, parse};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::notify::{Ack, ObserverGuard, ObserverHandle, Predicate};
use crate::store::Store;

/// Leaf handling mode, inherited by child views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Leaves read as plain values.
    Raw,
    /// Leaves read as [`BoxedScalar`]s.
    Boxed,
}

/// A scalar leaf as produced by [`View::read`], per the view's mode.
#[derive(Debug, Clone)]
pub enum Leaf {
    /// Raw mode: the plain value.
    Value(Value),
    /// Boxed mode: a path-carrying accessor.
    Boxed(BoxedScalar),
}

/// Result of reading a property through a view.
#[derive(Debug, Clone)]
pub enum Reading {
    /// Nothing at that path.
    Missing,
    /// An object or array node: a child view at the extended path.
    Node(View),
    /// A scalar leaf, wrapped per the view's mode.
    Leaf(Leaf),
}

/// A value being written through a view. Views and boxed scalars used as
/// write arguments are unwrapped to their current raw value first.
pub enum SetArg {
    Value(Value),
    FromView(View),
    FromBoxed(BoxedScalar),
}

impl SetArg {
    pub(crate) fn resolve(self) -> Value {
        match self {
            Self::Value(v) => v,
            Self::FromView(view) => view.value().unwrap_or(Value::Null),
            Self::FromBoxed(boxed) => boxed.value().unwrap_or(Value::Null),
        }
    }
}

impl From<Value> for SetArg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<View> for SetArg {
    fn from(v: View) -> Self {
        Self::FromView(v)
    }
}

impl From<&View> for SetArg {
    fn from(v: &View) -> Self {
        Self::FromView(v.clone())
    }
}

impl From<BoxedScalar> for SetArg {
    fn from(b: BoxedScalar) -> Self {
        Self::FromBoxed(b)
    }
}

impl From<&BoxedScalar> for SetArg {
    fn from(b: &BoxedScalar) -> Self {
        Self::FromBoxed(b.clone())
    }
}

impl From<bool> for SetArg {
    fn from(v: bool) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<i64> for SetArg {
    fn from(v: i64) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<f64> for SetArg {
    fn from(v: f64) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<&str> for SetArg {
    fn from(v: &str) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<String> for SetArg {
    fn from(v: String) -> Self {
        Self::Value(Value::from(v))
    }
}

/// Path-aware window onto a graph location.
#[derive(Clone)]
pub struct View {
    store: Store,
    path: Path,
    mode: Mode,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("path", &self.path.to_string())
            .field("mode", &self.mode)
            .finish()
    }
}

impl View {
    pub(crate) fn new(store: Store, path: Path, mode: Mode) -> Self {
        Self { store, path, mode }
    }

    /// The store this view reads from.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The view's path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The view's leaf handling mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Child view at the path extended by `key`, same mode.
    ///
    /// `key` may be a compound (`"a.b[0]"`, `"rows[id=7].name"`), which
    /// resolves as one compound traversal.
    pub fn at(&self, key: &str) -> Result<View, StoreError> {
        let suffix = parse(key)?;
        Ok(View::new(
            self.store.clone(),
            self.path.join(&suffix),
            self.mode,
        ))
    }

    /// Child view at `[index]`, same mode.
    #[must_use]
    pub fn index(&self, index: usize) -> View {
        View::new(self.store.clone(), self.path.child_index(index), self.mode)
    }

    /// Child view at `[key_path=value]`, same mode.
    #[must_use]
    pub fn by_id(&self, key_path: &str, value: &str) -> View {
        View::new(
            self.store.clone(),
            self.path.child_id(key_path, value),
            self.mode,
        )
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Snapshot of the current value; always agrees with the registry.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.store.get(&self.path)
    }

    /// Whether anything exists at the view's path.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.store.with(&self.path, |_| ()).is_some()
    }

    /// Element count of an array node, entry count of an object node.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.store.with(&self.path, |v| match v {
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        })?
    }

    /// Whether the node is an empty container (or not a container at all).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len().unwrap_or(0) == 0
    }

    /// Read a property: a container yields a child view, a scalar yields a
    /// leaf per the view's mode, nothing yields [`Reading::Missing`].
    pub fn read(&self, key: &str) -> Result<Reading, StoreError> {
        let child = self.at(key)?;
        let leaf = self.store.with(child.path(), |v| match v {
            Value::Object(_) | Value::Array(_) => None,
            scalar => Some(scalar.clone()),
        });
        Ok(match leaf {
            None => Reading::Missing,
            Some(None) => Reading::Node(child),
            Some(Some(scalar)) => match self.mode {
                Mode::Raw => Reading::Leaf(Leaf::Value(scalar)),
                Mode::Boxed => Reading::Leaf(Leaf::Boxed(BoxedScalar::new(
                    self.store.clone(),
                    child.path.clone(),
                ))),
            },
        })
    }

    /// Boxed accessor at the view's own path.
    #[must_use]
    pub fn boxed(&self) -> BoxedScalar {
        BoxedScalar::new(self.store.clone(), self.path.clone())
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Write `key` under this view. The key is validated against the path
    /// grammar; view/boxed arguments are unwrapped; unchanged values are
    /// neither written nor touched.
    pub fn set(&self, key: &str, value: impl Into<SetArg>) -> Result<bool, StoreError> {
        let suffix = parse(key)?;
        let full = self.path.join(&suffix);
        self.store.set(&full, value.into().resolve())
    }

    /// Write at the view's own path (the boxed-mode `value` write).
    pub fn set_value(&self, value: impl Into<SetArg>) -> Result<bool, StoreError> {
        self.store.set(&self.path, value.into().resolve())
    }

    /// Remove the entry at `key` under this view.
    pub fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let suffix = parse(key)?;
        Ok(self.store.delete(&self.path.join(&suffix)))
    }

    /// Declare the view's path dirty (for mutations done outside the view).
    pub fn touch(&self) {
        self.store.touch(&self.path);
    }

    /// Path listener on the view's path (bidirectional prefix).
    pub fn observe(&self, mut callback: impl FnMut(&Path) + 'static) -> ObserverHandle {
        self.store.observe(Predicate::Path(self.path.clone()), move |p| {
            callback(p);
            Ok(Ack::Keep)
        })
    }

    /// [`View::observe`] wrapped in an RAII guard.
    pub fn observe_guard(&self, mut callback: impl FnMut(&Path) + 'static) -> ObserverGuard {
        self.store.observe_guard(Predicate::Path(self.path.clone()), move |p| {
            callback(p);
            Ok(Ack::Keep)
        })
    }

    // ── Array mutators ──────────────────────────────────────────────
    //
    // Each unwraps view/boxed arguments, delegates to the underlying
    // Vec<Value>, then touches the array's path — but only when the
    // operation actually changed something, matching the no-op suppression
    // of scalar writes. A view whose path does not address an array logs a
    // diagnostic and returns None/false.

    fn with_array<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Vec<Value>) -> (T, bool),
    ) -> Option<T> {
        let out = self.store.with_registry_mut(|registry| {
            let node = access::get_mut(registry, &self.path)?;
            let items = node.as_array_mut()?;
            Some(f(items))
        });
        match out {
            Some((value, changed)) => {
                if changed {
                    self.store.touch(&self.path);
                }
                Some(value)
            }
            None => {
                debug!(path = %self.path, op, "array mutator missed (not an array)");
                None
            }
        }
    }

    /// Append an item; returns the new length.
    pub fn push(&self, item: impl Into<SetArg>) -> Option<usize> {
        let value = item.into().resolve();
        self.with_array("push", |items| {
            items.push(value);
            (items.len(), true)
        })
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Option<Value> {
        self.with_array("pop", |items| {
            let removed = items.pop();
            let changed = removed.is_some();
            (removed, changed)
        })
        .flatten()
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Option<Value> {
        self.with_array("shift", |items| {
            if items.is_empty() {
                (None, false)
            } else {
                (Some(items.remove(0)), true)
            }
        })
        .flatten()
    }

    /// Prepend an item; returns the new length.
    pub fn unshift(&self, item: impl Into<SetArg>) -> Option<usize> {
        let value = item.into().resolve();
        self.with_array("unshift", |items| {
            items.insert(0, value);
            (items.len(), true)
        })
    }

    /// Remove `delete_count` items at `start` and insert `insert` in their
    /// place; returns the removed items. Out-of-range arguments clamp.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        insert: Vec<SetArg>,
    ) -> Option<Vec<Value>> {
        let inserted: Vec<Value> = insert.into_iter().map(SetArg::resolve).collect();
        self.with_array("splice", |items| {
            let inserting = !inserted.is_empty();
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            let removed: Vec<Value> = items.splice(start..end, inserted).collect();
            let changed = inserting || !removed.is_empty();
            (removed, changed)
        })
    }

    /// Overwrite `[start, end)` with clones of `value` (clamped).
    pub fn fill(&self, value: impl Into<SetArg>, start: usize, end: usize) -> bool {
        let value = value.into().resolve();
        self.with_array("fill", |items| {
            let start = start.min(items.len());
            let end = end.min(items.len());
            let mut changed = false;
            for slot in &mut items[start..end] {
                if *slot != value {
                    *slot = value.clone();
                    changed = true;
                }
            }
            ((), changed)
        })
        .is_some()
    }

    /// Copy `src` over the range starting at `dest` (clamped).
    pub fn copy_within(&self, src: std::ops::Range<usize>, dest: usize) -> bool {
        self.with_array("copy_within", |items| {
            let len = items.len();
            let src_start = src.start.min(len);
            let src_end = src.end.min(len);
            let copied: Vec<Value> = items[src_start..src_end].to_vec();
            let mut changed = false;
            for (offset, value) in copied.into_iter().enumerate() {
                let target = dest + offset;
                if target >= len {
                    break;
                }
                if items[target] != value {
                    items[target] = value;
                    changed = true;
                }
            }
            ((), changed)
        })
        .is_some()
    }

    /// Reverse the array in place.
    pub fn reverse(&self) -> bool {
        self.with_array("reverse", |items| {
            items.reverse();
            ((), items.len() > 1)
        })
        .is_some()
    }

    /// Sort the array in place with a comparator.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> std::cmp::Ordering) -> bool {
        self.with_array("sort", |items| {
            let sorted = items
                .windows(2)
                .all(|pair| compare(&pair[0], &pair[1]) != std::cmp::Ordering::Greater);
            if !sorted {
                items.sort_by(&mut compare);
            }
            ((), !sorted)
        })
        .is_some()
    }
}

/// Accessor for a scalar leaf, because primitives cannot carry metadata.
///
/// Holds no state: every access resolves through the closed-over path
/// against the registry, so distinct instances for the same path are always
/// consistent, and `Display` always reflects the current value, never a
/// stale snapshot.
#[derive(Clone)]
pub struct BoxedScalar {
    store: Store,
    path: Path,
}

impl BoxedScalar {
    pub(crate) fn new(store: Store, path: Path) -> Self {
        Self { store, path }
    }

    /// The boxed path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current underlying value.
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.store.get(&self.path)
    }

    /// Write at the boxed path.
    pub fn set(&self, value: impl Into<SetArg>) -> Result<bool, StoreError> {
        self.store.set(&self.path, value.into().resolve())
    }

    /// Path listener on the boxed path.
    pub fn observe(&self, mut callback: impl FnMut(&Path) + 'static) -> ObserverHandle {
        self.store.observe(Predicate::Path(self.path.clone()), move |p| {
            callback(p);
            Ok(Ack::Keep)
        })
    }
}

impl std::fmt::Display for BoxedScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{}", access::id_string(&v)),
            None => write!(f, "null"),
        }
    }
}

impl std::fmt::Debug for BoxedScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedScalar")
            .field("path", &self.path.to_string())
            .field("value", &self.value())
            .finish()
    }
}

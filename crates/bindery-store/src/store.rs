#![forbid(unsafe_code)]

//! The registry handle and the flush machinery.
//!
//! [`Store`] wraps one mutable value graph plus the notification state in a
//! cheap-clone, single-threaded handle. Writes through the store suppress
//! no-op updates, touch the written path, and coalesce touches behind a
//! pending flag until [`Store::updates`] drives the flush.
//!
//! # Dispatch ordering
//!
//! Pending paths are dispatched in insertion order against a snapshot of
//! the listener list taken at flush start. A listener callback failure is
//! logged and dispatch continues; a predicate failure aborts the flush
//! (remaining paths are dropped) with the listener description and the
//! touched path attached.

use std::cell::RefCell;
use std::rc::Rc;

use bindery_path::{Path, Segment, access, parse};
use serde_json::Value;
use tracing::{debug, error, trace};

use crate::error::{FaultError, StoreError};
use crate::notify::{Ack, Callback, NotifyState, Observer, ObserverGuard, ObserverHandle, Predicate, Verdict};
use crate::scheduler::{DeferredScheduler, Scheduler};
use crate::view::{Mode, View};

struct StoreInner {
    registry: Value,
    notify: NotifyState,
}

/// Handle to one mutable state graph and its notification engine.
///
/// Clones share the same graph. Create views with [`Store::view`] /
/// [`Store::boxed_view`] for path-aware reads and writes.
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
    scheduler: Rc<dyn Scheduler>,
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            scheduler: Rc::clone(&self.scheduler),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("listeners", &inner.notify.observers.len())
            .field("pending", &inner.notify.pending.len())
            .finish()
    }
}

impl Store {
    /// Create an empty store (object root) with the inert default scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(DeferredScheduler)
    }

    /// Create a store whose idle-to-dirty transitions notify `scheduler`.
    pub fn with_scheduler(scheduler: impl Scheduler + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                registry: Value::Object(serde_json::Map::new()),
                notify: NotifyState::new(),
            })),
            scheduler: Rc::new(scheduler),
        }
    }

    // ── Graph access ────────────────────────────────────────────────

    /// Snapshot of the value at `path`, or `None` when missing.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Value> {
        let inner = self.inner.borrow();
        access::get(&inner.registry, path).cloned()
    }

    /// [`Store::get`] from a path string.
    pub fn get_str(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.get(&parse(path)?))
    }

    /// Borrow the value at `path` without cloning.
    pub fn with<T>(&self, path: &Path, f: impl FnOnce(&Value) -> T) -> Option<T> {
        let inner = self.inner.borrow();
        access::get(&inner.registry, path).map(f)
    }

    /// Write `value` at `path`. Returns `Ok(true)` iff the value differed
    /// and was written; only then is the path touched.
    pub fn set(&self, path: &Path, value: Value) -> Result<bool, StoreError> {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            access::set(&mut inner.registry, path, value)?
        };
        if changed {
            self.touch(path);
        } else {
            trace!(path = %path, "set suppressed (unchanged)");
        }
        Ok(changed)
    }

    /// [`Store::set`] from a path string.
    pub fn set_str(&self, path: &str, value: Value) -> Result<bool, StoreError> {
        self.set(&parse(path)?, value)
    }

    /// Remove the entry at `path`; touches when something was removed.
    pub fn delete(&self, path: &Path) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            access::delete(&mut inner.registry, path)
        };
        if removed {
            self.touch(path);
        } else {
            debug!(path = %path, "delete missed");
        }
        removed
    }

    /// Run `f` with mutable access to the whole registry, then touch
    /// nothing. Used by view array mutators, which touch explicitly.
    pub(crate) fn with_registry_mut<T>(&self, f: impl FnOnce(&mut Value) -> T) -> T {
        let mut inner = self.inner.borrow_mut();
        f(&mut inner.registry)
    }

    // ── Views ───────────────────────────────────────────────────────

    /// Root view in raw mode (leaves read as plain values).
    #[must_use]
    pub fn view(&self) -> View {
        View::new(self.clone(), Path::root(), Mode::Raw)
    }

    /// Root view in boxed mode (leaves read as [`BoxedScalar`]s).
    ///
    /// [`BoxedScalar`]: crate::view::BoxedScalar
    #[must_use]
    pub fn boxed_view(&self) -> View {
        View::new(self.clone(), Path::root(), Mode::Boxed)
    }

    // ── Touch + flush ───────────────────────────────────────────────

    /// Declare that the value at `path` may have changed.
    ///
    /// Touches coalesce with prefix-dedup; the first touch of an idle turn
    /// invokes the scheduler's `schedule_once` exactly once. For each
    /// registered array id-path, an index touch inside that array also
    /// enqueues the matching id-keyed touch when the id resolves.
    pub fn touch(&self, path: &Path) {
        let need_schedule = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let synthesized = synthesize(&inner.registry, &inner.notify.id_paths, path);
            let mut added = inner.notify.enqueue(path.clone(), false);
            for synth in synthesized {
                trace!(original = %path, synthesized = %synth, "id-path touch synthesis");
                added |= inner.notify.enqueue(synth, true);
            }
            if added && !inner.notify.flush_scheduled {
                inner.notify.flush_scheduled = true;
                true
            } else {
                false
            }
        };
        if need_schedule {
            self.scheduler.schedule_once();
        }
    }

    /// Whether a flush is currently scheduled.
    #[must_use]
    pub fn has_pending_flush(&self) -> bool {
        self.inner.borrow().notify.flush_scheduled
    }

    /// Drive the scheduled flush, if any, and return after it completes.
    ///
    /// The single asynchronous boundary of the system: any number of
    /// touches within one turn coalesce into the one dispatch that happens
    /// here. Re-entrant calls from inside a listener callback return
    /// immediately; freshly touched paths wait for the next turn.
    pub fn updates(&self) -> Result<(), StoreError> {
        let (touched, observers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.notify.in_flush || !inner.notify.flush_scheduled {
                return Ok(());
            }
            inner.notify.flush_scheduled = false;
            inner.notify.in_flush = true;
            (
                std::mem::take(&mut inner.notify.pending),
                inner.notify.observers.clone(),
            )
        };
        debug!(
            paths = touched.len(),
            synthesized = touched.iter().filter(|t| t.id_keyed).count(),
            listeners = observers.len(),
            "flush"
        );

        for pending in &touched {
            for obs in &observers {
                if obs.removed.get() {
                    continue;
                }
                let verdict = match obs.predicate.test(&pending.path) {
                    Ok(v) => v,
                    Err(source) => {
                        self.end_flush();
                        return Err(StoreError::Predicate {
                            listener: obs.description.clone(),
                            touched: pending.path.to_string(),
                            source,
                        });
                    }
                };
                match verdict {
                    Verdict::Miss => {}
                    Verdict::Remove => obs.removed.set(true),
                    Verdict::Hit => {
                        match (obs.callback.borrow_mut())(&pending.path) {
                            Ok(Ack::Keep) => {}
                            Ok(Ack::Remove) => obs.removed.set(true),
                            Err(e) => error!(
                                listener = %obs.description,
                                path = %pending.path,
                                error = %e,
                                "listener callback failed; dispatch continues"
                            ),
                        }
                    }
                }
            }
        }

        self.end_flush();
        Ok(())
    }

    fn end_flush(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.notify.in_flush = false;
        inner.notify.observers.retain(|o| !o.removed.get());
    }

    // ── Listeners ───────────────────────────────────────────────────

    /// Register a listener. The callback may report [`Ack::Remove`] to
    /// unregister itself; a returned error is logged, not propagated.
    pub fn observe(
        &self,
        predicate: Predicate,
        callback: impl FnMut(&Path) -> Result<Ack, FaultError> + 'static,
    ) -> ObserverHandle {
        let description = predicate.describe();
        self.observe_named(description, predicate, callback)
    }

    /// [`Store::observe`] with an explicit description used in diagnostics.
    pub fn observe_named(
        &self,
        description: impl Into<String>,
        predicate: Predicate,
        callback: impl FnMut(&Path) -> Result<Ack, FaultError> + 'static,
    ) -> ObserverHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.notify.next_id;
        inner.notify.next_id += 1;
        inner.notify.observers.push(Rc::new(Observer {
            id,
            description: description.into(),
            predicate,
            callback: RefCell::new(Box::new(callback) as Callback),
            removed: std::cell::Cell::new(false),
        }));
        ObserverHandle(id)
    }

    /// Path listener with an infallible callback that never self-removes.
    pub fn on_path(
        &self,
        path: &str,
        mut callback: impl FnMut(&Path) + 'static,
    ) -> Result<ObserverHandle, StoreError> {
        let predicate = Predicate::path(path)?;
        Ok(self.observe(predicate, move |p| {
            callback(p);
            Ok(Ack::Keep)
        }))
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn unobserve(&self, handle: ObserverHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let mut found = false;
        for obs in &inner.notify.observers {
            if obs.id == handle.0 && !obs.removed.get() {
                obs.removed.set(true);
                found = true;
            }
        }
        if found && !inner.notify.in_flush {
            inner.notify.observers.retain(|o| !o.removed.get());
        }
        if !found {
            debug!(handle = handle.0, "unobserve missed");
        }
        found
    }

    /// Register a listener wrapped in an RAII guard that unobserves on
    /// drop.
    pub fn observe_guard(
        &self,
        predicate: Predicate,
        callback: impl FnMut(&Path) -> Result<Ack, FaultError> + 'static,
    ) -> ObserverGuard {
        let handle = self.observe(predicate, callback);
        ObserverGuard::new(self.clone(), handle)
    }

    // ── Id-path registry ────────────────────────────────────────────

    /// Register `id_path` for the array at `array_path`, enabling
    /// index-to-id touch synthesis.
    pub fn register_array_id_path(
        &self,
        array_path: &Path,
        id_path: &str,
    ) -> Result<(), StoreError> {
        parse(id_path)?;
        let mut inner = self.inner.borrow_mut();
        let ids = inner.notify.id_paths.entry(array_path.clone()).or_default();
        if !ids.iter().any(|p| p == id_path) {
            ids.push(id_path.to_string());
        }
        Ok(())
    }

    /// Remove one id-path registration. Returns whether it existed.
    pub fn unregister_array_id_path(&self, array_path: &Path, id_path: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let Some(ids) = inner.notify.id_paths.get_mut(array_path) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|p| p != id_path);
        let removed = ids.len() != before;
        if ids.is_empty() {
            inner.notify.id_paths.remove(array_path);
        }
        removed
    }
}

/// Id-keyed touches synthesized from an index touch inside a registered
/// array: `<arrayPath>[<idPath>=<idValue>]<suffix>` for every registered
/// id-path whose value resolves on that element.
fn synthesize(
    registry: &Value,
    id_paths: &ahash::AHashMap<Path, Vec<String>>,
    touched: &Path,
) -> Vec<Path> {
    let mut out = Vec::new();
    for (array_path, ids) in id_paths {
        let alen = array_path.len();
        if touched.len() <= alen || !array_path.is_prefix_of(touched) {
            continue;
        }
        let Segment::Index(n) = &touched.segments()[alen] else {
            continue;
        };
        let Some(element) = access::get(registry, &array_path.child_index(*n)) else {
            continue;
        };
        for id_path in ids {
            let Ok(kp) = parse(id_path) else { continue };
            let Some(id_value) = access::get(element, &kp) else {
                continue;
            };
            let mut synth = array_path.child_id(id_path.clone(), access::id_string(id_value));
            for segment in &touched.segments()[alen + 1..] {
                synth.push(segment.clone());
            }
            out.push(synth);
        }
    }
    out
}

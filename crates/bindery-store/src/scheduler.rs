#![forbid(unsafe_code)]

//! Flush scheduling hook.
//!
//! The store coalesces touches behind a pending flag. When the flag flips
//! from idle to dirty, [`Scheduler::schedule_once`] fires exactly once so a
//! host can arrange for [`Store::updates`](crate::Store::updates) to run at
//! the end of the current turn (task queue, timer, frame callback). The
//! default [`DeferredScheduler`] does nothing: tests and simple hosts call
//! `updates()` themselves.

/// Host hook invoked when a flush becomes pending.
///
/// Implementations must not call back into the store synchronously; they
/// should defer to their host's task-queue primitive and let that deferred
/// task call `updates()`.
pub trait Scheduler {
    /// Called at most once per idle-to-dirty transition.
    fn schedule_once(&self);
}

/// The default scheduler: a pure latch, no side effects.
///
/// With this scheduler the pending flag is the whole mechanism — whoever
/// owns the event loop calls `updates()` to drain it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredScheduler;

impl Scheduler for DeferredScheduler {
    fn schedule_once(&self) {}
}

/// Counting scheduler used by crate tests to assert schedule cadence.
#[cfg(test)]
pub(crate) struct CountingScheduler(pub std::rc::Rc<std::cell::Cell<usize>>);

#[cfg(test)]
impl Scheduler for CountingScheduler {
    fn schedule_once(&self) {
        self.0.set(self.0.get() + 1);
    }
}

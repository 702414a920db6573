#![forbid(unsafe_code)]

//! The list binding engine.
//!
//! A [`ListBinding`] owns a host container (via [`ListTarget`]), watches one
//! array in the store, and keeps a window of instantiated template clones in
//! sync with the filtered collection. Item nodes are identity-mapped — keyed
//! by the item's id value when an id-path is configured, by source index
//! otherwise — so updates that do not change an item's key reuse that item's
//! node untouched.
//!
//! # Invariants
//!
//! 1. Container children are exactly the identity map's nodes, in window
//!    order; the identity map never maps two keys to one node.
//! 2. A pure append repositions nothing: existing nodes keep their slots.
//! 3. Padding sentinels account for every off-window row, so total scroll
//!    extent tracks the whole collection.
//! 4. Re-entrant updates are dropped, not deadlocked.
//!
//! # Failure modes
//!
//! | Condition | Behavior |
//! |---|---|
//! | Container without exactly one template child | `ListError::ContainerShape`, fatal |
//! | Bound path is not an array | renders empty, `debug!` diagnostic |
//! | `scroll_to_item` on an absent item | returns `false`, `debug!` diagnostic |
//! | Duplicate id values in one window | later duplicates skipped, `warn!` |

use ahash::{AHashMap, AHashSet};
use bindery_path::{Path, access, parse};
use bindery_store::{Ack, ObserverGuard, Predicate, Store};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::error::ListError;
use crate::options::{Align, ListOptions, Virtualization};
use crate::target::{BindingRewriter, ListTarget, NodeId};
use crate::throttle::Throttle;

/// Binding lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// Torn down (or never bound); updates are no-ops.
    Uninitialized,
    /// Template extracted, observers live, ready to update.
    Bound,
    /// An update pass is running.
    Updating,
}

/// Identity of one rendered item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ItemKey {
    Id(String),
    Index(usize),
}

struct Interp {
    t: f64,
    frac: f64,
    row_count: usize,
    cols: usize,
    min_row_height: f64,
}

/// Computed window over the filtered collection.
struct Window {
    /// First filtered position rendered.
    first: usize,
    /// One past the last filtered position rendered.
    last: usize,
    leading: f64,
    trailing: f64,
    /// Present in interpolated mode; drives post-reconcile pad measurement.
    interp: Option<Interp>,
}

impl Window {
    fn whole(count: usize) -> Self {
        Self {
            first: 0,
            last: count,
            leading: 0.0,
            trailing: 0.0,
            interp: None,
        }
    }
}

/// Binds one store array to one host container.
pub struct ListBinding<T: ListTarget, R: BindingRewriter> {
    store: Store,
    array_path: Path,
    target: T,
    rewriter: R,
    options: ListOptions,
    id_key: Option<Path>,
    state: BindingState,
    template: Option<NodeId>,
    identity: AHashMap<ItemKey, NodeId>,
    /// Source indices surviving the visible predicate and custom filter.
    filtered: Vec<usize>,
    /// Last custom-filter selection, reused between filter runs.
    filter_selection: Option<Vec<usize>>,
    needle: Value,
    filter_bypass: bool,
    geometry: Throttle,
    filter_throttle: Throttle,
    data_dirty: Rc<Cell<bool>>,
    observers: Vec<ObserverGuard>,
    last_window: Option<(usize, usize)>,
    last_pads: (f64, f64),
}

impl<T: ListTarget, R: BindingRewriter> ListBinding<T, R> {
    /// Bind `array_path` to `target`.
    ///
    /// The container must hold exactly one child, which is removed and kept
    /// as the row template. The configured id-path, if any, is registered
    /// with the store so index touches inside the array synthesize id-keyed
    /// touches.
    pub fn bind(
        store: &Store,
        array_path: &str,
        mut target: T,
        rewriter: R,
        options: ListOptions,
    ) -> Result<Self, ListError> {
        let array_path = parse(array_path)?;
        let children = target.child_count();
        let template = match (children, target.child_at(0)) {
            (1, Some(node)) => node,
            _ => return Err(ListError::ContainerShape { children }),
        };
        target.remove_child(template);
        target.set_leading_pad(0.0);
        target.set_trailing_pad(0.0);

        let id_key = match &options.id_path {
            Some(id_path) => {
                store.register_array_id_path(&array_path, id_path)?;
                Some(parse(id_path)?)
            }
            None => None,
        };

        let data_dirty = Rc::new(Cell::new(true));
        let mut observers = Vec::new();
        {
            let flag = Rc::clone(&data_dirty);
            observers.push(store.observe_guard(
                Predicate::Path(array_path.clone()),
                move |_| {
                    flag.set(true);
                    Ok(Ack::Keep)
                },
            ));
        }
        if let Some(needle_path) = &options.needle_path {
            let flag = Rc::clone(&data_dirty);
            observers.push(store.observe_guard(Predicate::Path(parse(needle_path)?), move |_| {
                flag.set(true);
                Ok(Ack::Keep)
            }));
        }

        debug!(path = %array_path, "list bound");
        Ok(Self {
            store: store.clone(),
            array_path,
            target,
            rewriter,
            geometry: Throttle::new(options.update_throttle_ms),
            filter_throttle: Throttle::new(options.filter_throttle_ms),
            options,
            id_key,
            state: BindingState::Bound,
            template: Some(template),
            identity: AHashMap::new(),
            filtered: Vec::new(),
            filter_selection: None,
            needle: Value::Null,
            filter_bypass: false,
            data_dirty,
            observers,
            last_window: None,
            last_pads: (0.0, 0.0),
        })
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> BindingState {
        self.state
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn array_path(&self) -> &Path {
        &self.array_path
    }

    /// The host container (host keeps geometry current through this).
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }

    #[must_use]
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Whether an update is outstanding (data changed or a geometry call
    /// was absorbed by the throttle).
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.data_dirty.get() || self.geometry.has_pending()
    }

    // ── Driving ─────────────────────────────────────────────────────

    /// Geometry event (scroll or resize). Throttled: the leading event
    /// updates immediately, the trailing one is picked up by
    /// [`ListBinding::run_pending`].
    pub fn on_geometry(&mut self, now_ms: u64) {
        if self.geometry.ready(now_ms) {
            self.update(now_ms, true);
        }
    }

    /// Host poll point: runs the trailing geometry update and any update
    /// owed to data changes.
    pub fn run_pending(&mut self, now_ms: u64) {
        if self.geometry.run_pending(now_ms) {
            self.update(now_ms, true);
        }
        if self.data_dirty.get() {
            self.update(now_ms, false);
        }
    }

    /// Set the filter needle. Written through to `needle_path` when one is
    /// configured; either way the next update recomputes the filter
    /// regardless of the filter throttle.
    pub fn filter(&mut self, needle: Value) {
        if let Some(needle_path) = &self.options.needle_path {
            if let Err(err) = self.store.set_str(needle_path, needle.clone()) {
                warn!(%err, "needle write failed");
            }
        }
        self.needle = needle;
        self.filter_bypass = true;
        self.data_dirty.set(true);
    }

    /// One full pass: read, filter, window, reconcile, pad.
    ///
    /// `is_slice` marks geometry-only causes (scroll/resize): when set and
    /// nothing about the window changed, reconciliation is skipped —
    /// except in interpolated mode, which re-measures padding every pass.
    pub fn update(&mut self, now_ms: u64, is_slice: bool) {
        match self.state {
            BindingState::Updating => {
                debug!(path = %self.array_path, "re-entrant update dropped");
                return;
            }
            BindingState::Uninitialized => {
                debug!(path = %self.array_path, "update on torn-down binding");
                return;
            }
            BindingState::Bound => {}
        }
        self.state = BindingState::Updating;
        self.data_dirty.set(false);

        let items: Vec<Value> = self
            .store
            .with(&self.array_path, |v| v.as_array().cloned())
            .flatten()
            .unwrap_or_else(|| {
                debug!(path = %self.array_path, "bound path is not an array");
                Vec::new()
            });
        self.recompute_filtered(&items, now_ms);

        let window = self.compute_window(self.filtered.len());
        let unchanged = self.last_window == Some((window.first, window.last))
            && self.last_pads == (window.leading, window.trailing);
        if is_slice && self.options.visible.is_none() && unchanged && window.interp.is_none() {
            trace!(path = %self.array_path, "window unchanged, reconcile skipped");
            self.state = BindingState::Bound;
            return;
        }

        self.reconcile(&items, window.first, window.last);

        let (leading, trailing) = match &window.interp {
            Some(interp) => self.measure_interpolated_pads(interp),
            None => (window.leading, window.trailing),
        };
        self.target.set_leading_pad(leading);
        self.target.set_trailing_pad(trailing);
        self.last_pads = (leading, trailing);
        self.last_window = Some((window.first, window.last));
        self.state = BindingState::Bound;
    }

    // ── Step 1: filtering ───────────────────────────────────────────

    fn recompute_filtered(&mut self, items: &[Value], now_ms: u64) {
        let visible_idx: Vec<usize> = match &self.options.visible {
            Some(predicate) => items
                .iter()
                .enumerate()
                .filter(|(_, item)| predicate(item))
                .map(|(i, _)| i)
                .collect(),
            None => (0..items.len()).collect(),
        };

        let Some(filter) = &self.options.filter else {
            self.filtered = visible_idx;
            return;
        };

        // The throttle advances even on a bypassed run, so an explicit
        // filter() call starts a fresh interval.
        let throttle_due = self.filter_throttle.ready(now_ms);
        let due = throttle_due || self.filter_bypass;
        if due {
            self.filter_bypass = false;
            let needle = match &self.options.needle_path {
                Some(needle_path) => self
                    .store
                    .get_str(needle_path)
                    .ok()
                    .flatten()
                    .unwrap_or(Value::Null),
                None => self.needle.clone(),
            };
            let subset: Vec<Value> = visible_idx.iter().map(|&i| items[i].clone()).collect();
            let picked = filter(&subset, &needle);
            let selection: Vec<usize> = picked
                .into_iter()
                .filter_map(|p| visible_idx.get(p).copied())
                .collect();
            trace!(kept = selection.len(), total = items.len(), "filter ran");
            self.filter_selection = Some(selection);
        }

        // Between filter runs the previous selection is reused, minus
        // indices no longer visible.
        self.filtered = match &self.filter_selection {
            Some(selection) => selection
                .iter()
                .copied()
                .filter(|i| visible_idx.binary_search(i).is_ok())
                .collect(),
            None => visible_idx,
        };
    }

    // ── Step 2: windowing ───────────────────────────────────────────

    fn compute_window(&self, count: usize) -> Window {
        if count == 0 {
            return Window::whole(0);
        }
        match self.options.virtualization {
            Virtualization::None => Window::whole(count),
            Virtualization::Fixed {
                row_height,
                columns,
                row_chunk,
            } => {
                let cols = columns.resolve(self.target.container_cross_size());
                let chunk = row_chunk.max(1);
                let row_count = count.div_ceil(cols);
                let viewport = self.target.viewport_size();
                let scroll = self.target.scroll_offset().max(0.0);

                let visible_rows =
                    (((viewport / row_height).ceil() as usize) + chunk).min(row_count);
                let mut first_row = (scroll / row_height).floor() as usize;
                first_row = (first_row / chunk) * chunk;
                // Never let the window hang past the end of the collection.
                first_row = first_row.min(row_count - visible_rows);

                let first = first_row * cols;
                let last = ((first_row + visible_rows) * cols).min(count);
                Window {
                    first,
                    last,
                    leading: first_row as f64 * row_height,
                    trailing: (row_count - first_row - visible_rows) as f64 * row_height,
                    interp: None,
                }
            }
            Virtualization::Interpolated {
                min_row_height,
                columns,
            } => {
                let cols = columns.resolve(self.target.container_cross_size());
                let row_count = count.div_ceil(cols);
                let viewport = self.target.viewport_size();
                let visible_rows =
                    (((viewport / min_row_height).ceil() as usize) + 1).min(row_count);

                let est_extent = row_count as f64 * min_row_height;
                let max_scroll = (est_extent - viewport).max(0.0);
                let scroll = self.target.scroll_offset().clamp(0.0, max_scroll);
                let t = if max_scroll > 0.0 {
                    (scroll / max_scroll).clamp(0.0, 1.0)
                } else {
                    0.0
                };

                // Fractional row position across the scrollable span.
                let span = (row_count - visible_rows) as f64 + 1.0;
                let position = t * span;
                let first_row =
                    (position.floor() as usize).min(row_count - visible_rows);
                let frac = position - first_row as f64;

                let first = first_row * cols;
                let last = ((first_row + visible_rows) * cols).min(count);
                Window {
                    first,
                    last,
                    leading: 0.0,
                    trailing: 0.0,
                    interp: Some(Interp {
                        t,
                        frac,
                        row_count,
                        cols,
                        min_row_height,
                    }),
                }
            }
        }
    }

    /// Interpolated-mode padding, measured after reconcile against the
    /// nodes actually rendered: pin-to-top and pin-to-bottom placements
    /// blended by the scroll fraction, shifted back by the sub-row offset.
    fn measure_interpolated_pads(&self, interp: &Interp) -> (f64, f64) {
        let rendered = self.target.rendered_extent();
        let viewport = self.target.viewport_size();
        let scroll = self.target.scroll_offset();
        let est_extent = interp.row_count as f64 * interp.min_row_height;

        // Node count over the column factor gives rows, not nodes.
        let rows_rendered = self.identity.len().div_ceil(interp.cols).max(1) as f64;
        let avg_row = (rendered / rows_rendered).max(interp.min_row_height);

        let pin_top = scroll;
        let pin_bottom = scroll + viewport - rendered;
        let leading =
            (pin_top * (1.0 - interp.t) + pin_bottom * interp.t - interp.frac * avg_row).max(0.0);
        let trailing = (est_extent - leading - rendered).max(0.0);
        (leading, trailing)
    }

    // ── Steps 4–5: reconcile + reposition ───────────────────────────

    fn reconcile(&mut self, items: &[Value], first: usize, last: usize) {
        let mut desired: Vec<(ItemKey, usize)> = Vec::with_capacity(last - first);
        let mut seen: AHashSet<ItemKey> = AHashSet::with_capacity(last - first);
        for &src in &self.filtered[first..last] {
            let key = self.key_for(&items[src], src);
            if seen.insert(key.clone()) {
                desired.push((key, src));
            } else {
                warn!(path = %self.array_path, index = src, "duplicate item key skipped");
            }
        }

        // Evict nodes whose item left the window.
        let stale: Vec<(ItemKey, NodeId)> = self
            .identity
            .iter()
            .filter(|(key, _)| !seen.contains(key))
            .map(|(key, &node)| (key.clone(), node))
            .collect();
        for (key, node) in stale {
            self.identity.remove(&key);
            self.target.remove_child(node);
            self.target.dispose(node);
        }

        // Ensure every desired item has a node, repositioning only where
        // order deviates (pure append moves nothing).
        for (position, (key, src)) in desired.iter().enumerate() {
            let node = match self.identity.get(key) {
                Some(&node) => node,
                None => {
                    let Some(template) = self.template else {
                        warn!(path = %self.array_path, "template missing, reconcile aborted");
                        return;
                    };
                    let node = self.target.instantiate(template);
                    let item_path = self.item_path(key, *src);
                    self.rewriter.rewrite(node, &item_path);
                    self.identity.insert(key.clone(), node);
                    self.target.insert_child(node, position);
                    node
                }
            };
            if self.target.child_at(position) != Some(node) {
                self.target.remove_child(node);
                self.target.insert_child(node, position);
            }
        }
        trace!(
            path = %self.array_path,
            rendered = self.identity.len(),
            window = last - first,
            "reconciled"
        );
    }

    fn key_for(&self, item: &Value, src: usize) -> ItemKey {
        match &self.id_key {
            Some(key_path) => match access::get(item, key_path) {
                Some(id) => ItemKey::Id(access::id_string(id)),
                None => ItemKey::Index(src),
            },
            None => ItemKey::Index(src),
        }
    }

    fn item_path(&self, key: &ItemKey, src: usize) -> Path {
        match (key, &self.options.id_path) {
            (ItemKey::Id(id), Some(id_path)) => {
                self.array_path.child_id(id_path.clone(), id.clone())
            }
            _ => self.array_path.child_index(src),
        }
    }

    // ── Item-level operations ───────────────────────────────────────

    /// Scroll so `item` lands per `align`. Virtualized modes compute the
    /// target offset analytically; non-virtualized lists scroll the item's
    /// node into view.
    pub fn scroll_to_item(&mut self, item: &Value, align: Align) -> bool {
        let items: Vec<Value> = self
            .store
            .with(&self.array_path, |v| v.as_array().cloned())
            .flatten()
            .unwrap_or_default();
        // `filtered` may be stale relative to the array (a touch can land
        // between updates), so an out-of-range source index is a miss, not
        // a panic.
        let Some(position) = self
            .filtered
            .iter()
            .position(|&src| {
                items
                    .get(src)
                    .is_some_and(|candidate| self.same_item(item, candidate))
            })
        else {
            debug!(path = %self.array_path, "scroll_to_item: item not in bound collection");
            return false;
        };

        match self.options.virtualization {
            Virtualization::None => {
                let src = self.filtered[position];
                let key = self.key_for(&items[src], src);
                match self.identity.get(&key) {
                    Some(&node) => {
                        self.target.scroll_into_view(node);
                        true
                    }
                    None => {
                        debug!(path = %self.array_path, "scroll_to_item: item has no node");
                        false
                    }
                }
            }
            Virtualization::Fixed {
                row_height,
                columns,
                ..
            } => self.scroll_to_row(position, self.filtered.len(), columns, row_height, align),
            Virtualization::Interpolated {
                min_row_height,
                columns,
            } => {
                // Heights vary; min_row_height gives the analytic estimate.
                self.scroll_to_row(position, self.filtered.len(), columns, min_row_height, align)
            }
        }
    }

    fn scroll_to_row(
        &mut self,
        position: usize,
        count: usize,
        columns: crate::options::Columns,
        row_height: f64,
        align: Align,
    ) -> bool {
        let cols = columns.resolve(self.target.container_cross_size());
        let row = position / cols;
        let row_count = count.div_ceil(cols);
        let viewport = self.target.viewport_size();
        let extent = row_count as f64 * row_height;
        let max_scroll = (extent - viewport).max(0.0);
        let top = row as f64 * row_height;

        let offset = match align {
            Align::Start => top,
            Align::Middle => top - (viewport - row_height) / 2.0,
            Align::End => top + row_height - viewport,
            Align::Nearest => {
                let scroll = self.target.scroll_offset();
                if top >= scroll && top + row_height <= scroll + viewport {
                    return true;
                }
                if top < scroll {
                    top
                } else {
                    top + row_height - viewport
                }
            }
        };
        self.target.scroll_to(offset.clamp(0.0, max_scroll));
        true
    }

    fn same_item(&self, wanted: &Value, candidate: &Value) -> bool {
        match &self.id_key {
            Some(key_path) => access::get(wanted, key_path) == access::get(candidate, key_path),
            None => wanted == candidate,
        }
    }

    /// Current value of the item a rendered node is bound to.
    #[must_use]
    pub fn bound_item(&self, node: NodeId) -> Option<Value> {
        let key = self
            .identity
            .iter()
            .find(|&(_, &mapped)| mapped == node)
            .map(|(key, _)| key.clone());
        let Some(key) = key else {
            debug!(path = %self.array_path, node = node.0, "bound_item: unknown node");
            return None;
        };
        let src = match &key {
            ItemKey::Index(i) => *i,
            ItemKey::Id(_) => 0,
        };
        self.store.get(&self.item_path(&key, src))
    }

    /// Remove the item behind `node` from the underlying array (through the
    /// store, so it touches and notifies).
    pub fn delete_bound_item(&mut self, node: NodeId) -> bool {
        let Some(item) = self.bound_item(node) else {
            return false;
        };
        let items: Vec<Value> = self
            .store
            .with(&self.array_path, |v| v.as_array().cloned())
            .flatten()
            .unwrap_or_default();
        let Some(index) = items.iter().position(|candidate| self.same_item(&item, candidate))
        else {
            debug!(path = %self.array_path, "delete_bound_item: item vanished");
            return false;
        };
        let Ok(view) = self.store.view().at(&self.array_path.to_string()) else {
            return false;
        };
        view.splice(index, 1, Vec::new()).is_some()
    }

    /// Release nodes, observers, and the id-path registration.
    pub fn teardown(&mut self) {
        for (_, node) in self.identity.drain() {
            self.target.remove_child(node);
            self.target.dispose(node);
        }
        if let Some(template) = self.template.take() {
            self.target.dispose(template);
        }
        if let Some(id_path) = &self.options.id_path {
            self.store.unregister_array_id_path(&self.array_path, id_path);
        }
        self.observers.clear();
        self.target.set_leading_pad(0.0);
        self.target.set_trailing_pad(0.0);
        self.last_window = None;
        self.last_pads = (0.0, 0.0);
        self.state = BindingState::Uninitialized;
        debug!(path = %self.array_path, "list torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Columns, ListOptions};
    use serde_json::json;

    // ── Mock host ───────────────────────────────────────────────────

    #[derive(Default)]
    struct MockTarget {
        children: Vec<NodeId>,
        next_id: u64,
        disposed: Vec<NodeId>,
        leading: f64,
        trailing: f64,
        viewport: f64,
        scroll: f64,
        cross: f64,
        node_extent: f64,
        moves: usize,
        scrolled_to: Option<f64>,
        into_view: Option<NodeId>,
    }

    impl MockTarget {
        fn with_template(viewport: f64, cross: f64, node_extent: f64) -> Self {
            Self {
                children: vec![NodeId(1)],
                next_id: 1,
                viewport,
                cross,
                node_extent,
                ..Self::default()
            }
        }
    }

    impl ListTarget for MockTarget {
        fn child_count(&self) -> usize {
            self.children.len()
        }
        fn child_at(&self, index: usize) -> Option<NodeId> {
            self.children.get(index).copied()
        }
        fn insert_child(&mut self, node: NodeId, index: usize) {
            self.children.insert(index.min(self.children.len()), node);
        }
        fn remove_child(&mut self, node: NodeId) {
            if let Some(pos) = self.children.iter().position(|&n| n == node) {
                self.children.remove(pos);
                self.moves += 1;
            }
        }
        fn instantiate(&mut self, _template: NodeId) -> NodeId {
            self.next_id += 1;
            NodeId(self.next_id)
        }
        fn dispose(&mut self, node: NodeId) {
            self.disposed.push(node);
        }
        fn set_leading_pad(&mut self, size: f64) {
            self.leading = size;
        }
        fn set_trailing_pad(&mut self, size: f64) {
            self.trailing = size;
        }
        fn viewport_size(&self) -> f64 {
            self.viewport
        }
        fn scroll_offset(&self) -> f64 {
            self.scroll
        }
        fn container_cross_size(&self) -> f64 {
            self.cross
        }
        fn rendered_extent(&self) -> f64 {
            self.children.len() as f64 * self.node_extent
        }
        fn scroll_to(&mut self, offset: f64) {
            self.scroll = offset;
            self.scrolled_to = Some(offset);
        }
        fn scroll_into_view(&mut self, node: NodeId) {
            self.into_view = Some(node);
        }
    }

    #[derive(Default)]
    struct RecordingRewriter {
        rewrites: Vec<(NodeId, String)>,
    }

    impl BindingRewriter for RecordingRewriter {
        fn rewrite(&mut self, node: NodeId, item_path: &Path) {
            self.rewrites.push((node, item_path.to_string()));
        }
    }

    impl BindingRewriter for () {
        fn rewrite(&mut self, _node: NodeId, _item_path: &Path) {}
    }

    fn rows(n: usize) -> Value {
        Value::Array(
            (0..n)
                .map(|i| json!({ "id": i, "name": format!("row {i}") }))
                .collect(),
        )
    }

    fn store_with_rows(n: usize) -> Store {
        let store = Store::new();
        store.set_str("rows", rows(n)).unwrap();
        store.updates().unwrap();
        store
    }

    fn bind(
        store: &Store,
        target: MockTarget,
        options: ListOptions,
    ) -> ListBinding<MockTarget, RecordingRewriter> {
        ListBinding::bind(store, "rows", target, RecordingRewriter::default(), options).unwrap()
    }

    // ── Binding ─────────────────────────────────────────────────────

    #[test]
    fn bind_requires_exactly_one_template_child() {
        let store = store_with_rows(3);
        let mut target = MockTarget::with_template(100.0, 100.0, 10.0);
        target.children.push(NodeId(99));
        let err = ListBinding::bind(&store, "rows", target, (), ListOptions::new()).err();
        assert!(matches!(err, Some(ListError::ContainerShape { children: 2 })));

        let empty = MockTarget::default();
        let err = ListBinding::bind(&store, "rows", empty, (), ListOptions::new()).err();
        assert!(matches!(err, Some(ListError::ContainerShape { children: 0 })));
    }

    #[test]
    fn bind_extracts_the_template() {
        let store = store_with_rows(0);
        let binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new(),
        );
        assert_eq!(binding.target().child_count(), 0);
        assert_eq!(binding.state(), BindingState::Bound);
    }

    #[test]
    fn non_virtualized_renders_everything_with_id_paths() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 3);
        assert_eq!(binding.target().leading, 0.0);
        assert_eq!(binding.target().trailing, 0.0);
        let paths: Vec<&str> = binding
            .rewriter
            .rewrites
            .iter()
            .map(|(_, p)| p.as_str())
            .collect();
        assert_eq!(paths, ["rows[id=0]", "rows[id=1]", "rows[id=2]"]);
    }

    #[test]
    fn index_keyed_rewrites_use_indices() {
        let store = store_with_rows(2);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new(),
        );
        binding.update(0, false);
        let paths: Vec<&str> = binding
            .rewriter
            .rewrites
            .iter()
            .map(|(_, p)| p.as_str())
            .collect();
        assert_eq!(paths, ["rows[0]", "rows[1]"]);
    }

    // ── Fixed-height windowing ──────────────────────────────────────

    fn fixed(row_height: f64, chunk: usize) -> Virtualization {
        Virtualization::Fixed {
            row_height,
            columns: Columns::Explicit(1),
            row_chunk: chunk,
        }
    }

    #[test]
    fn fixed_window_is_bounded_and_padded() {
        let store = store_with_rows(1000);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(fixed(20.0, 4)),
        );
        binding.update(0, false);
        // ceil(200 / 20) + 4 = 14 rows of one column.
        assert_eq!(binding.target().child_count(), 14);
        assert_eq!(binding.target().leading, 0.0);
        assert_eq!(binding.target().trailing, (1000.0 - 14.0) * 20.0);
    }

    #[test]
    fn fixed_window_bound_is_monotone_in_viewport() {
        let store = store_with_rows(1000);
        let mut previous = 0;
        for viewport in [50.0, 120.0, 300.0, 900.0] {
            let mut binding = bind(
                &store,
                MockTarget::with_template(viewport, 100.0, 20.0),
                ListOptions::new().virtualization(fixed(20.0, 2)),
            );
            binding.update(0, false);
            let rendered = binding.target().child_count();
            let bound = ((viewport / 20.0).ceil() as usize + 2).min(1000);
            assert_eq!(rendered, bound);
            assert!(rendered >= previous, "window grows with the viewport");
            previous = rendered;
        }
    }

    #[test]
    fn fixed_window_never_exceeds_item_count() {
        let store = store_with_rows(5);
        let mut binding = bind(
            &store,
            MockTarget::with_template(1000.0, 100.0, 20.0),
            ListOptions::new().virtualization(fixed(20.0, 8)),
        );
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 5);
        assert_eq!(binding.target().leading, 0.0);
        assert_eq!(binding.target().trailing, 0.0);
    }

    #[test]
    fn fixed_window_follows_scroll_in_chunks() {
        let store = store_with_rows(1000);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(fixed(20.0, 4)),
        );
        // Row 13 with chunk 4 aligns the window to row 12.
        binding.target_mut().scroll = 20.0 * 13.0;
        binding.update(0, false);
        assert_eq!(binding.target().leading, 12.0 * 20.0);
        let first = binding.bound_item(binding.target().child_at(0).unwrap()).unwrap();
        assert_eq!(first["id"], json!(12));
    }

    #[test]
    fn fixed_window_clamps_at_the_end() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().virtualization(fixed(20.0, 4)),
        );
        binding.target_mut().scroll = 1_000_000.0;
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 14);
        assert_eq!(binding.target().trailing, 0.0);
        assert_eq!(binding.target().leading, (100.0 - 14.0) * 20.0);
    }

    #[test]
    fn multi_column_window_counts_cells() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 300.0, 50.0),
            ListOptions::new().virtualization(Virtualization::Fixed {
                row_height: 50.0,
                columns: Columns::FromItemWidth(100.0), // 3 columns
                row_chunk: 1,
            }),
        );
        binding.update(0, false);
        // ceil(100/50) + 1 = 3 rows × 3 columns.
        assert_eq!(binding.target().child_count(), 9);
    }

    // ── Early exit ──────────────────────────────────────────────────

    #[test]
    fn geometry_update_with_unchanged_window_skips_reconcile() {
        let store = store_with_rows(1000);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().virtualization(fixed(20.0, 4)),
        );
        binding.update(0, false);
        let moves_before = binding.target().moves;
        let instantiated = binding.target().next_id;
        binding.target_mut().scroll = 5.0; // still inside row 0, same chunk
        binding.update(100, true);
        assert_eq!(binding.target().moves, moves_before);
        assert_eq!(binding.target().next_id, instantiated);
    }

    // ── Identity preservation ───────────────────────────────────────

    #[test]
    fn non_key_update_reuses_nodes() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let before: Vec<NodeId> = binding.target().children.clone();

        store.set_str("rows[1].name", json!("renamed")).unwrap();
        store.updates().unwrap();
        binding.run_pending(50);

        assert_eq!(binding.target().children, before, "nodes survive unchanged");
        assert!(binding.target().disposed.is_empty());
    }

    #[test]
    fn removal_disposes_only_the_removed_node() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let before = binding.target().children.clone();
        let victim = before[1];

        let view = store.view().at("rows").unwrap();
        view.splice(1, 1, Vec::new()).unwrap();
        store.updates().unwrap();
        binding.run_pending(50);

        assert_eq!(binding.target().children, vec![before[0], before[2]]);
        assert_eq!(binding.target().disposed, vec![victim]);
    }

    #[test]
    fn pure_append_moves_nothing() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let moves_before = binding.target().moves;

        store.view().at("rows").unwrap().push(json!({ "id": 3, "name": "row 3" }));
        store.updates().unwrap();
        binding.run_pending(50);

        assert_eq!(binding.target().child_count(), 4);
        assert_eq!(
            binding.target().moves,
            moves_before,
            "append repositions no existing node"
        );
    }

    #[test]
    fn reorder_moves_minimally() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let before = binding.target().children.clone();

        store.view().at("rows").unwrap().reverse();
        store.updates().unwrap();
        binding.run_pending(50);

        let after = binding.target().children.clone();
        assert_eq!(after, vec![before[2], before[1], before[0]]);
        assert!(binding.target().disposed.is_empty(), "reorder never disposes");
    }

    // ── Filtering ───────────────────────────────────────────────────

    #[test]
    fn visible_predicate_hides_items() {
        let store = store_with_rows(4);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new()
                .id_path("id")
                .visible(|item| item["id"].as_i64().unwrap_or(0) % 2 == 0),
        );
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 2);
    }

    #[test]
    fn filter_runs_at_lower_cadence_and_bypass_wins() {
        let store = store_with_rows(10);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new()
                .id_path("id")
                .filter_throttle_ms(250)
                .filter(|items, needle| {
                    let wanted = needle.as_i64().unwrap_or(i64::MAX);
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| item["id"].as_i64().unwrap_or(-1) < wanted)
                        .map(|(pos, _)| pos)
                        .collect()
                }),
        );
        binding.filter(json!(3));
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 3);

        // Inside the filter interval the previous selection is reused.
        binding.needle = json!(5);
        binding.data_dirty.set(true);
        binding.update(100, false);
        assert_eq!(binding.target().child_count(), 3, "filter not yet due");

        // An explicit filter() bypasses the throttle.
        binding.filter(json!(5));
        binding.update(110, false);
        assert_eq!(binding.target().child_count(), 5);
    }

    #[test]
    fn needle_path_feeds_the_filter() {
        let store = store_with_rows(10);
        store.set_str("search", json!(2)).unwrap();
        store.updates().unwrap();
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new()
                .id_path("id")
                .needle_path("search")
                .filter(|items, needle| {
                    let wanted = needle.as_i64().unwrap_or(i64::MAX);
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| item["id"].as_i64().unwrap_or(-1) < wanted)
                        .map(|(pos, _)| pos)
                        .collect()
                }),
        );
        binding.update(0, false);
        assert_eq!(binding.target().child_count(), 2);
    }

    // ── Throttled driving ───────────────────────────────────────────

    #[test]
    fn geometry_events_are_throttled_with_a_trailing_run() {
        let store = store_with_rows(1000);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().virtualization(fixed(20.0, 1)),
        );
        binding.update(0, false);

        binding.target_mut().scroll = 400.0;
        binding.on_geometry(10); // leading: runs
        let leading_after_first = binding.target().leading;
        assert!(leading_after_first > 0.0);

        binding.target_mut().scroll = 800.0;
        binding.on_geometry(20); // absorbed
        assert_eq!(binding.target().leading, leading_after_first);
        assert!(binding.needs_update());

        binding.run_pending(60); // trailing
        assert!(binding.target().leading > leading_after_first);
    }

    #[test]
    fn store_changes_mark_the_binding_dirty() {
        let store = store_with_rows(2);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        assert!(!binding.needs_update());

        store.view().at("rows").unwrap().push(json!({ "id": 2 }));
        store.updates().unwrap();
        assert!(binding.needs_update());
        binding.run_pending(50);
        assert_eq!(binding.target().child_count(), 3);
    }

    // ── Interpolated mode ───────────────────────────────────────────

    #[test]
    fn interpolated_pads_preserve_estimated_extent() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 25.0),
            ListOptions::new().id_path("id").virtualization(Virtualization::Interpolated {
                min_row_height: 20.0,
                columns: Columns::Explicit(1),
            }),
        );
        binding.update(0, false);
        // visible rows = ceil(100/20) + 1 = 6; each measures 25.
        assert_eq!(binding.target().child_count(), 6);
        let rendered = binding.target().rendered_extent();
        let total = binding.target().leading + rendered + binding.target().trailing;
        assert!((total - 100.0 * 20.0).abs() < 1e-6, "pads preserve estimated extent");
        assert_eq!(binding.target().leading, 0.0, "pinned to top at scroll 0");
    }

    #[test]
    fn interpolated_remeasures_even_when_window_is_unchanged() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 25.0),
            ListOptions::new().id_path("id").virtualization(Virtualization::Interpolated {
                min_row_height: 20.0,
                columns: Columns::Explicit(1),
            }),
        );
        binding.update(0, false);
        // Node heights change without any index-window change.
        binding.target_mut().node_extent = 40.0;
        binding.update(100, true);
        let rendered = binding.target().rendered_extent();
        assert!(
            binding.target().trailing <= 100.0 * 20.0 - rendered + 0.001,
            "trailing pad tracks the re-measured extent"
        );
    }

    #[test]
    fn interpolated_scroll_reaches_the_tail() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(Virtualization::Interpolated {
                min_row_height: 20.0,
                columns: Columns::Explicit(1),
            }),
        );
        binding.target_mut().scroll = 100.0 * 20.0 - 100.0; // max scroll
        binding.update(0, false);
        let last_node = binding
            .target()
            .child_at(binding.target().child_count() - 1)
            .unwrap();
        let last = binding.bound_item(last_node).unwrap();
        assert_eq!(last["id"], json!(99), "window reaches the final item");
    }

    #[test]
    fn interpolated_multi_column_pads_average_per_row() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(Virtualization::Interpolated {
                min_row_height: 20.0,
                columns: Columns::Explicit(2),
            }),
        );
        binding.target_mut().scroll = 450.0; // t = 0.5 across 50 rows
        binding.update(0, false);

        // 6 visible rows of 2 columns = 12 nodes; the sub-row shift uses
        // the per-row average, not the per-node one.
        assert_eq!(binding.target().child_count(), 12);
        let rendered = binding.target().rendered_extent();
        let avg_row = rendered / 6.0;
        let expected = 0.5 * 450.0 + 0.5 * (450.0 + 100.0 - rendered) - 0.5 * avg_row;
        assert!((binding.target().leading - expected).abs() < 1e-6);
    }

    // ── scroll_to_item ──────────────────────────────────────────────

    #[test]
    fn scroll_to_item_fixed_aligns_start_and_end() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(fixed(20.0, 1)),
        );
        binding.update(0, false);

        assert!(binding.scroll_to_item(&json!({ "id": 50 }), Align::Start));
        assert_eq!(binding.target().scrolled_to, Some(50.0 * 20.0));

        assert!(binding.scroll_to_item(&json!({ "id": 50 }), Align::End));
        assert_eq!(binding.target().scrolled_to, Some(50.0 * 20.0 + 20.0 - 200.0));
    }

    #[test]
    fn scroll_to_item_clamps_and_handles_nearest() {
        let store = store_with_rows(100);
        let mut binding = bind(
            &store,
            MockTarget::with_template(200.0, 100.0, 20.0),
            ListOptions::new().id_path("id").virtualization(fixed(20.0, 1)),
        );
        binding.update(0, false);

        // Already fully visible: no scroll issued.
        assert!(binding.scroll_to_item(&json!({ "id": 2 }), Align::Nearest));
        assert_eq!(binding.target().scrolled_to, None);

        // Start alignment near the tail clamps to max scroll.
        assert!(binding.scroll_to_item(&json!({ "id": 99 }), Align::Start));
        assert_eq!(binding.target().scrolled_to, Some(100.0 * 20.0 - 200.0));
    }

    #[test]
    fn scroll_to_item_non_virtual_uses_scroll_into_view() {
        let store = store_with_rows(5);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        assert!(binding.scroll_to_item(&json!({ "id": 3 }), Align::Nearest));
        let node = binding.target().into_view.unwrap();
        assert_eq!(binding.bound_item(node).unwrap()["id"], json!(3));
    }

    #[test]
    fn scroll_to_missing_item_fails_quietly() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        assert!(!binding.scroll_to_item(&json!({ "id": 999 }), Align::Start));
        assert_eq!(binding.target().scrolled_to, None);
    }

    #[test]
    fn scroll_to_item_tolerates_a_shrunken_array() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);

        // The array shrinks before the host polls again, so the cached
        // source indices overshoot the current array.
        store.set_str("rows", rows(1)).unwrap();
        store.updates().unwrap();
        assert!(!binding.scroll_to_item(&json!({ "id": 2 }), Align::Start));
        assert_eq!(binding.target().scrolled_to, None);
    }

    // ── Item-level operations ───────────────────────────────────────

    #[test]
    fn bound_item_resolves_current_values() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let node = binding.target().child_at(1).unwrap();
        assert_eq!(binding.bound_item(node).unwrap()["name"], json!("row 1"));

        store.set_str("rows[1].name", json!("edited")).unwrap();
        assert_eq!(binding.bound_item(node).unwrap()["name"], json!("edited"));

        assert!(binding.bound_item(NodeId(12345)).is_none());
    }

    #[test]
    fn delete_bound_item_removes_through_the_store() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let node = binding.target().child_at(1).unwrap();
        assert!(binding.delete_bound_item(node));

        let remaining = store.get_str("rows").unwrap().unwrap();
        assert_eq!(remaining.as_array().unwrap().len(), 2);
        // The deletion touched the array, so the binding owes an update.
        store.updates().unwrap();
        assert!(binding.needs_update());
        binding.run_pending(50);
        assert_eq!(binding.target().child_count(), 2);
    }

    // ── Teardown ────────────────────────────────────────────────────

    #[test]
    fn teardown_releases_everything() {
        let store = store_with_rows(3);
        let mut binding = bind(
            &store,
            MockTarget::with_template(100.0, 100.0, 10.0),
            ListOptions::new().id_path("id"),
        );
        binding.update(0, false);
        let rendered = binding.target().children.clone();
        binding.teardown();

        assert_eq!(binding.state(), BindingState::Uninitialized);
        assert_eq!(binding.target().child_count(), 0);
        for node in rendered {
            assert!(binding.target().disposed.contains(&node));
        }
        // Observers are gone: store changes no longer mark the binding.
        store.set_str("rows[0].name", json!("zzz")).unwrap();
        store.updates().unwrap();
        assert!(!binding.needs_update());
        // Updates after teardown are no-ops.
        binding.update(100, false);
        assert_eq!(binding.target().child_count(), 0);
    }
}

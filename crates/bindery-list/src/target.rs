#![forbid(unsafe_code)]

//! Host-side interfaces consumed by the binding engine.
//!
//! The engine is headless: it never touches a real scene graph or DOM-like
//! tree directly. The host supplies the container and its geometry through
//! [`ListTarget`], and binding rewrites through [`BindingRewriter`]. Node
//! handles are opaque [`NodeId`]s; the engine only stores and compares them.

use bindery_path::Path;

/// Opaque handle to a host-owned node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// The container the list renders into, as seen by the engine.
///
/// Child indices address *item* nodes only; the leading/trailing padding
/// sentinels are managed by the host behind `set_leading_pad` /
/// `set_trailing_pad` and never appear in `child_count` / `child_at`.
///
/// Sizes and offsets are in one host-defined unit (typically pixels) along
/// the scroll axis; `container_cross_size` is the perpendicular extent used
/// to derive column counts.
pub trait ListTarget {
    /// Number of item nodes currently in the container.
    fn child_count(&self) -> usize;

    /// Item node at `index`, if present.
    fn child_at(&self, index: usize) -> Option<NodeId>;

    /// Insert `node` so it becomes the item at `index`.
    fn insert_child(&mut self, node: NodeId, index: usize);

    /// Detach `node` from the container without disposing it.
    fn remove_child(&mut self, node: NodeId);

    /// Deep-clone `template` into a fresh, detached subtree.
    fn instantiate(&mut self, template: NodeId) -> NodeId;

    /// Release a detached node and its subtree.
    fn dispose(&mut self, node: NodeId);

    /// Size of the leading padding sentinel.
    fn set_leading_pad(&mut self, size: f64);

    /// Size of the trailing padding sentinel.
    fn set_trailing_pad(&mut self, size: f64);

    /// Scroll-axis extent of the visible viewport.
    fn viewport_size(&self) -> f64;

    /// Current scroll offset.
    fn scroll_offset(&self) -> f64;

    /// Cross-axis extent of the container (for column derivation).
    fn container_cross_size(&self) -> f64;

    /// Measured scroll-axis extent of the currently rendered item nodes.
    /// Only consulted in variable-height mode.
    fn rendered_extent(&self) -> f64;

    /// Scroll the container to `offset`.
    fn scroll_to(&mut self, offset: f64);

    /// Bring `node` into the viewport (non-virtualized lists).
    fn scroll_into_view(&mut self, node: NodeId);
}

/// Rewrites a freshly instantiated node's relative bindings against the
/// absolute path of the item it will render.
pub trait BindingRewriter {
    /// Called once per instantiation, before the node is inserted.
    fn rewrite(&mut self, node: NodeId, item_path: &Path);
}

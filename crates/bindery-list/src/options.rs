#![forbid(unsafe_code)]

//! List binding configuration.

use serde_json::Value;

/// Hidden/visible predicate over one item.
pub type VisibleFn = Box<dyn Fn(&Value) -> bool>;

/// Custom filter: given the visible items and the current needle, returns
/// the positions (into the given slice) that survive.
pub type FilterFn = Box<dyn Fn(&[Value], &Value) -> Vec<usize>>;

/// How column count is derived in virtualized modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Columns {
    /// A fixed column count.
    Explicit(usize),
    /// Container cross-axis size divided by item cross-axis size, floored,
    /// never below 1.
    FromItemWidth(f64),
}

impl Columns {
    /// Resolve to a concrete count against the container's cross size.
    #[must_use]
    pub fn resolve(self, cross_size: f64) -> usize {
        match self {
            Self::Explicit(n) => n.max(1),
            Self::FromItemWidth(w) => {
                if w > 0.0 {
                    ((cross_size / w).floor() as usize).max(1)
                } else {
                    1
                }
            }
        }
    }
}

/// Windowing strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Virtualization {
    /// Every item gets a node; no padding.
    None,
    /// All rows share one known height; window and padding are analytic.
    Fixed {
        row_height: f64,
        columns: Columns,
        /// Window alignment and overscan granularity, in rows.
        row_chunk: usize,
    },
    /// Row heights vary; `min_row_height` bounds them from below and the
    /// window position is interpolated from the scroll fraction.
    Interpolated {
        min_row_height: f64,
        columns: Columns,
    },
}

/// Scroll alignment for [`scroll_to_item`].
///
/// [`scroll_to_item`]: crate::binding::ListBinding::scroll_to_item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Item's leading edge at the viewport's leading edge.
    Start,
    /// Item centered in the viewport.
    Middle,
    /// Item's trailing edge at the viewport's trailing edge.
    End,
    /// Shortest scroll that makes the item fully visible; no scroll if it
    /// already is.
    Nearest,
}

/// Builder-style configuration for a [`ListBinding`].
///
/// [`ListBinding`]: crate::binding::ListBinding
pub struct ListOptions {
    pub(crate) id_path: Option<String>,
    pub(crate) visible: Option<VisibleFn>,
    pub(crate) filter: Option<FilterFn>,
    pub(crate) needle_path: Option<String>,
    pub(crate) virtualization: Virtualization,
    pub(crate) update_throttle_ms: u64,
    pub(crate) filter_throttle_ms: u64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ListOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id_path: None,
            visible: None,
            filter: None,
            needle_path: None,
            virtualization: Virtualization::None,
            update_throttle_ms: 33,
            filter_throttle_ms: 250,
        }
    }

    /// Key each item by the value at this sub-path rather than by index.
    /// Registered with the store's id-path registry at bind time.
    #[must_use]
    pub fn id_path(mut self, id_path: impl Into<String>) -> Self {
        self.id_path = Some(id_path.into());
        self
    }

    /// Per-item visibility predicate, applied every update.
    #[must_use]
    pub fn visible(mut self, predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        self.visible = Some(Box::new(predicate));
        self
    }

    /// Needle-driven filter, applied at the filter throttle's lower cadence.
    #[must_use]
    pub fn filter(mut self, filter: impl Fn(&[Value], &Value) -> Vec<usize> + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Store path the needle is read from on each filter run.
    #[must_use]
    pub fn needle_path(mut self, path: impl Into<String>) -> Self {
        self.needle_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn virtualization(mut self, virtualization: Virtualization) -> Self {
        self.virtualization = virtualization;
        self
    }

    /// Geometry (scroll/resize) throttle interval. Default 33ms.
    #[must_use]
    pub fn update_throttle_ms(mut self, ms: u64) -> Self {
        self.update_throttle_ms = ms;
        self
    }

    /// Filter recomputation throttle interval. Default 250ms.
    #[must_use]
    pub fn filter_throttle_ms(mut self, ms: u64) -> Self {
        self.filter_throttle_ms = ms;
        self
    }
}

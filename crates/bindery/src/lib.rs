#![forbid(unsafe_code)]

//! Public facade over the bindery crates.
//!
//! Pulls the path language (`bindery-path`), the reactive store
//! (`bindery-store`), and the list binding engine (`bindery-list`) into one
//! dependency, with a [`prelude`] for the common surface.
//!
//! ```
//! use bindery::prelude::*;
//! use serde_json::json;
//!
//! let store = Store::new();
//! store.set_str("app.title", json!("hello")).unwrap();
//! store.updates().unwrap();
//! assert_eq!(
//!     store.view().at("app.title").unwrap().value(),
//!     Some(json!("hello"))
//! );
//! ```

pub use bindery_list as list;
pub use bindery_path as path;
pub use bindery_store as store;

/// The common working surface.
pub mod prelude {
    pub use bindery_list::{
        Align, BindingRewriter, BindingState, Columns, ListBinding, ListError, ListOptions,
        ListTarget, NodeId, Virtualization,
    };
    pub use bindery_path::{Path, PathError, Segment, parse};
    pub use bindery_store::{
        Ack, BoxedScalar, Leaf, Mode, ObserverGuard, ObserverHandle, Predicate, Reading,
        Scheduler, SetArg, Store, StoreError, Verdict, View,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use serde_json::json;

    #[test]
    fn end_to_end_write_observe_read() {
        let store = Store::new();
        store.set_str("todo.items", json!([{ "id": 1, "done": false }])).unwrap();
        store.updates().unwrap();

        let fired = std::rc::Rc::new(std::cell::Cell::new(0));
        let flag = std::rc::Rc::clone(&fired);
        store.on_path("todo.items", move |_| flag.set(flag.get() + 1)).unwrap();

        let items = store.view().at("todo.items").unwrap();
        items.set("[0].done", true).unwrap();
        store.updates().unwrap();

        assert_eq!(fired.get(), 1);
        assert_eq!(
            store.get_str("todo.items[id=1].done").unwrap(),
            Some(json!(true))
        );
    }
}

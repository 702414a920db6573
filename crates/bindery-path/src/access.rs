#![forbid(unsafe_code)]

//! Path evaluation against a `serde_json::Value` graph.
//!
//! Reads are total: a missing intermediate yields `None`, never an error.
//! Writes auto-vivify missing intermediates (objects for key segments,
//! arrays for index and id-match segments) and report whether the addressed
//! value actually changed, which is what lets the store suppress no-op
//! touches.

use serde_json::Value;

use crate::error::PathError;
use crate::path::{Path, Segment, parse};

/// Canonical string form of a value used for id-match comparison.
///
/// Strings compare by their contents (no quotes); everything else by its
/// JSON serialization, so `17`, `17.0`, and `"17"` stringify to `"17"`,
/// `"17.0"`, and `"17"` respectively.
#[must_use]
pub fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn an id-match value string back into a seed value for vivification.
fn id_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    Value::from(raw)
}

fn id_position(items: &[Value], key_path: &Path, value: &str) -> Option<usize> {
    items
        .iter()
        .position(|elt| get(elt, key_path).map(id_string).as_deref() == Some(value))
}

fn step<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match segment {
        Segment::Key(k) => node.as_object()?.get(k),
        Segment::Index(n) => node.as_array()?.get(*n),
        Segment::IdMatch { key_path, value } => {
            let kp = parse(key_path).ok()?;
            let items = node.as_array()?;
            let idx = id_position(items, &kp, value)?;
            items.get(idx)
        }
    }
}

/// Read the value at `path`, or `None` when any step is missing.
#[must_use]
pub fn get<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = step(node, segment)?;
    }
    Some(node)
}

/// Mutable counterpart of [`get`]; does not vivify.
pub fn get_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut node = root;
    for segment in path.segments() {
        node = match segment {
            Segment::Key(k) => node.as_object_mut()?.get_mut(k)?,
            Segment::Index(n) => node.as_array_mut()?.get_mut(*n)?,
            Segment::IdMatch { key_path, value } => {
                let kp = parse(key_path).ok()?;
                let idx = id_position(node.as_array()?, &kp, value)?;
                node.as_array_mut()?.get_mut(idx)?
            }
        };
    }
    Some(node)
}

fn ensure_object(node: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(serde_json::Map::new());
    }
    node.as_object_mut().expect("just ensured object")
}

fn ensure_array(node: &mut Value) -> &mut Vec<Value> {
    if !node.is_array() {
        *node = Value::Array(Vec::new());
    }
    node.as_array_mut().expect("just ensured array")
}

fn descend_vivify<'a>(node: &'a mut Value, segment: &Segment) -> Result<&'a mut Value, PathError> {
    match segment {
        Segment::Key(k) => {
            let map = ensure_object(node);
            Ok(map.entry(k.clone()).or_insert(Value::Null))
        }
        Segment::Index(n) => {
            let items = ensure_array(node);
            while items.len() <= *n {
                items.push(Value::Null);
            }
            Ok(&mut items[*n])
        }
        Segment::IdMatch { key_path, value } => {
            let kp = parse(key_path)?;
            let items = ensure_array(node);
            let idx = match id_position(items, &kp, value) {
                Some(i) => i,
                None => {
                    // Vivify a fresh element carrying the id field so the
                    // path keeps resolving on subsequent steps.
                    let mut elt = Value::Null;
                    set(&mut elt, &kp, id_value(value))?;
                    items.push(elt);
                    items.len() - 1
                }
            };
            Ok(&mut items[idx])
        }
    }
}

fn write_leaf(parent: &mut Value, segment: &Segment, value: Value) -> Result<bool, PathError> {
    match segment {
        Segment::Key(k) => {
            let map = ensure_object(parent);
            if map.get(k) == Some(&value) {
                return Ok(false);
            }
            map.insert(k.clone(), value);
            Ok(true)
        }
        Segment::Index(n) => {
            let items = ensure_array(parent);
            while items.len() <= *n {
                items.push(Value::Null);
            }
            if items[*n] == value {
                return Ok(false);
            }
            items[*n] = value;
            Ok(true)
        }
        Segment::IdMatch { key_path, value: id } => {
            let kp = parse(key_path)?;
            let items = ensure_array(parent);
            match id_position(items, &kp, id) {
                Some(i) => {
                    if items[i] == value {
                        return Ok(false);
                    }
                    items[i] = value;
                    Ok(true)
                }
                // Upsert-by-append: a non-existent id-match appends the
                // assigned element.
                None => {
                    items.push(value);
                    Ok(true)
                }
            }
        }
    }
}

/// Write `value` at `path`, vivifying missing intermediates.
///
/// Returns `Ok(true)` iff the addressed value differed and was written.
/// Writing at the root path is always an error.
pub fn set(root: &mut Value, path: &Path, value: Value) -> Result<bool, PathError> {
    let segments = path.segments();
    let Some((last, intermediates)) = segments.split_last() else {
        return Err(PathError::EmptyWritePath);
    };
    let mut node = root;
    for segment in intermediates {
        node = descend_vivify(node, segment)?;
    }
    write_leaf(node, last, value)
}

/// Remove the entry addressed by `path`. Returns whether anything was
/// removed; missing targets (including the root path) are a no-op.
pub fn delete(root: &mut Value, path: &Path) -> bool {
    let Some(last) = path.last() else {
        return false;
    };
    let parent_path = path.parent().expect("non-root path has a parent");
    let Some(parent) = get_mut(root, &parent_path) else {
        return false;
    };
    match last {
        Segment::Key(k) => parent
            .as_object_mut()
            .is_some_and(|map| map.remove(k).is_some()),
        Segment::Index(n) => parent.as_array_mut().is_some_and(|items| {
            if *n < items.len() {
                items.remove(*n);
                true
            } else {
                false
            }
        }),
        Segment::IdMatch { key_path, value } => {
            let Ok(kp) = parse(key_path) else {
                return false;
            };
            parent.as_array_mut().is_some_and(|items| {
                match id_position(items, &kp, value) {
                    Some(i) => {
                        items.remove(i);
                        true
                    }
                    None => false,
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(s: &str) -> Path {
        parse(s).expect(s)
    }

    #[test]
    fn get_simple_key() {
        let obj = json!({ "foo": 17 });
        assert_eq!(get(&obj, &p("foo")), Some(&json!(17)));
    }

    #[test]
    fn get_missing_intermediate_is_none() {
        let obj = json!({ "a": { "b": 1 } });
        assert_eq!(get(&obj, &p("a.x.y")), None);
        assert_eq!(get(&obj, &p("z[3].q")), None);
    }

    #[test]
    fn set_then_get_round_trip() {
        let mut obj = json!({ "foo": 17 });
        assert_eq!(set(&mut obj, &p("foo"), json!(-11)), Ok(true));
        assert_eq!(get(&obj, &p("foo")), Some(&json!(-11)));
    }

    #[test]
    fn set_identical_value_reports_unchanged() {
        let mut obj = json!({ "foo": 17 });
        assert_eq!(set(&mut obj, &p("foo"), json!(-11)), Ok(true));
        assert_eq!(set(&mut obj, &p("foo"), json!(-11)), Ok(false));
    }

    #[test]
    fn set_root_path_is_an_error() {
        let mut obj = json!({});
        assert_eq!(
            set(&mut obj, &Path::root(), json!(1)),
            Err(PathError::EmptyWritePath)
        );
    }

    #[test]
    fn set_vivifies_objects() {
        let mut obj = json!({});
        set(&mut obj, &p("a.b.c"), json!(3)).unwrap();
        assert_eq!(obj, json!({ "a": { "b": { "c": 3 } } }));
    }

    #[test]
    fn set_vivifies_arrays_with_null_fill() {
        let mut obj = json!({});
        set(&mut obj, &p("rows[2].name"), json!("x")).unwrap();
        assert_eq!(obj, json!({ "rows": [null, null, { "name": "x" }] }));
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut obj = json!({ "a": 5 });
        set(&mut obj, &p("a.b"), json!(1)).unwrap();
        assert_eq!(obj, json!({ "a": { "b": 1 } }));
    }

    #[test]
    fn id_match_finds_element() {
        let obj = json!({
            "movieObjs": [
                { "id": 17, "title": "first" },
                { "id": 123, "title": "second" },
            ]
        });
        assert_eq!(
            get(&obj, &p("movieObjs[id=123]")),
            Some(&json!({ "id": 123, "title": "second" }))
        );
        assert_eq!(
            get(&obj, &p("movieObjs[id=123].title")),
            Some(&json!("second"))
        );
    }

    #[test]
    fn id_match_compares_by_stringification() {
        let obj = json!({ "rows": [{ "id": "abc" }, { "id": 7 }] });
        assert_eq!(get(&obj, &p("rows[id=abc]")), Some(&json!({ "id": "abc" })));
        assert_eq!(get(&obj, &p("rows[id=7]")), Some(&json!({ "id": 7 })));
    }

    #[test]
    fn id_match_with_dotted_key_path() {
        let obj = json!({ "rows": [{ "meta": { "key": "x" }, "v": 1 }] });
        assert_eq!(
            get(&obj, &p("rows[meta.key=x].v")),
            Some(&json!(1))
        );
    }

    #[test]
    fn set_id_match_updates_in_place() {
        let mut obj = json!({ "rows": [{ "id": 1, "v": "a" }, { "id": 2, "v": "b" }] });
        let changed = set(&mut obj, &p("rows[id=2].v"), json!("c")).unwrap();
        assert!(changed);
        assert_eq!(obj["rows"][1]["v"], json!("c"));
    }

    #[test]
    fn set_missing_id_match_appends() {
        let mut obj = json!({ "rows": [{ "id": 1 }] });
        set(&mut obj, &p("rows[id=9]"), json!({ "id": 9, "v": "new" })).unwrap();
        assert_eq!(obj["rows"][1], json!({ "id": 9, "v": "new" }));
    }

    #[test]
    fn intermediate_id_match_vivifies_with_id_field() {
        let mut obj = json!({ "rows": [] });
        set(&mut obj, &p("rows[id=4].name"), json!("n")).unwrap();
        assert_eq!(obj["rows"][0], json!({ "id": 4, "name": "n" }));
    }

    #[test]
    fn delete_key() {
        let mut obj = json!({ "a": 1, "b": 2 });
        assert!(delete(&mut obj, &p("a")));
        assert_eq!(obj, json!({ "b": 2 }));
        assert!(!delete(&mut obj, &p("a")));
    }

    #[test]
    fn delete_index_shifts_tail() {
        let mut obj = json!({ "rows": [1, 2, 3] });
        assert!(delete(&mut obj, &p("rows[1]")));
        assert_eq!(obj["rows"], json!([1, 3]));
        assert!(!delete(&mut obj, &p("rows[5]")));
    }

    #[test]
    fn delete_by_id() {
        let mut obj = json!({ "rows": [{ "id": 1 }, { "id": 2 }] });
        assert!(delete(&mut obj, &p("rows[id=1]")));
        assert_eq!(obj["rows"], json!([{ "id": 2 }]));
    }

    #[test]
    fn delete_root_is_noop() {
        let mut obj = json!({ "a": 1 });
        assert!(!delete(&mut obj, &Path::root()));
        assert_eq!(obj, json!({ "a": 1 }));
    }

    #[test]
    fn get_mut_allows_in_place_edit() {
        let mut obj = json!({ "rows": [{ "id": 1, "n": 0 }] });
        *get_mut(&mut obj, &p("rows[id=1].n")).unwrap() = json!(5);
        assert_eq!(obj["rows"][0]["n"], json!(5));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn key_strategy() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,6}"
        }

        fn path_strategy() -> impl Strategy<Value = Path> {
            proptest::collection::vec(
                prop_oneof![
                    key_strategy().prop_map(Segment::Key),
                    (0usize..5).prop_map(Segment::Index),
                ],
                1..5,
            )
            .prop_map(|mut segments| {
                // A path starting with an index writes into a root array; keep
                // the root an object like the registry does.
                if let Segment::Index(_) = segments[0] {
                    segments.insert(0, Segment::Key("root".into()));
                }
                Path::from_segments(segments)
            })
        }

        proptest! {
            #[test]
            fn parse_display_round_trip(path in path_strategy()) {
                let reparsed = parse(&path.to_string()).unwrap();
                prop_assert_eq!(reparsed, path);
            }

            #[test]
            fn set_get_round_trip(path in path_strategy(), v in -1000i64..1000) {
                let mut root = serde_json::json!({});
                set(&mut root, &path, serde_json::json!(v)).unwrap();
                prop_assert_eq!(get(&root, &path), Some(&serde_json::json!(v)));
            }

            #[test]
            fn second_identical_set_is_a_noop(path in path_strategy(), v in -1000i64..1000) {
                let mut root = serde_json::json!({});
                prop_assert!(set(&mut root, &path, serde_json::json!(v)).unwrap());
                prop_assert!(!set(&mut root, &path, serde_json::json!(v)).unwrap());
            }
        }
    }
}

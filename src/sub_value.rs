//! Nested property access for `get_sub`/`set_sub`.
//!
//! A path is a sequence of property names. Objects are traversed by key, arrays by decimal index.

use serde_json::Map;
use serde_json::Value;

use crate::codec::kind_of;
use crate::error::Error;
use crate::error::Result;

/// Path segments that are never traversed or assigned.
pub const RESERVED_SEGMENTS: &[&str] = &["__proto__"];

/// How many `null`s an assignment past the end of an array may insert before the new element.
pub const MAX_ARRAY_PADDING: usize = 1024;

#[inline]
fn is_reserved(segment: &str) -> bool {
    RESERVED_SEGMENTS.contains(&segment)
}

fn path_repr<S: AsRef<str>>(path: &[S]) -> String {
    serde_json::to_string(&path.iter().map(|s| s.as_ref()).collect::<Vec<_>>()).unwrap_or_default()
}

/// Walks `path` from `value`. Anything missing or not traversable on the way yields `None`.
pub fn lookup<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let mut cursor = value;
    for segment in path {
        let segment = segment.as_ref();
        if is_reserved(segment) {
            return None;
        }
        cursor = match cursor {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}

/// Returns `base` with the property at `path` set to `value`, creating missing intermediate objects.
///
/// Fails without touching anything if the path crosses a primitive, indexes an array with a non-numeric segment, or
/// contains a reserved segment. An empty path replaces the whole value.
pub fn assign<S: AsRef<str>>(key: &str, base: Option<Value>, path: &[S], value: Value) -> Result<Value> {
    if let Some(segment) = path.iter().map(|s| s.as_ref()).find(|s| is_reserved(s)) {
        return Err(Error::path_type(
            key,
            format!(
                "Refusing to modify object prototype via property {} (key: {key:?}, path: {})",
                Value::from(segment),
                path_repr(path)
            ),
        ));
    }

    let mut root = base.unwrap_or(Value::Null);
    let mut cursor = &mut root;

    for (idx, segment) in path.iter().enumerate() {
        let segment = segment.as_ref();
        if cursor.is_null() {
            *cursor = Value::Object(Map::new());
        }
        cursor = match cursor {
            Value::Object(map) => map.entry(segment.to_owned()).or_insert(Value::Null),
            Value::Array(items) => {
                let Ok(pos) = segment.parse::<usize>()
                else {
                    return Err(Error::path_type(
                        key,
                        format!(
                            "Cannot set non-index property {} on array (key: {key:?}, path: {})",
                            Value::from(segment),
                            path_repr(&path[..=idx])
                        ),
                    ));
                };
                if pos.saturating_sub(items.len()) > MAX_ARRAY_PADDING {
                    return Err(Error::path_type(
                        key,
                        format!(
                            "Array index {pos} is too far past the end of array of length {} (key: {key:?}, path: {})",
                            items.len(),
                            path_repr(&path[..=idx])
                        ),
                    ));
                }
                if pos >= items.len() {
                    items.resize(pos + 1, Value::Null);
                }
                &mut items[pos]
            }
            other => {
                return Err(Error::path_type(
                    key,
                    format!(
                        "Cannot set property {} on non-object {} {} (key: {key:?}, path: {})",
                        Value::from(segment),
                        kind_of(other),
                        other,
                        path_repr(&path[..=idx])
                    ),
                ));
            }
        };
    }

    *cursor = value;
    Ok(root)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lookup_walks_objects_and_arrays() {
        let v = json!({"a": {"b": [10, {"c": "deep"}]}});
        assert_eq!(lookup(&v, &["a", "b", "1", "c"]), Some(&json!("deep")));
        assert_eq!(lookup(&v, &["a", "b", "0"]), Some(&json!(10)));
        assert_eq!(lookup(&v, &[] as &[&str]), Some(&v));
    }

    #[test]
    fn lookup_misses_are_none() {
        let v = json!({"a": "str", "list": [1]});
        assert_eq!(lookup(&v, &["missing"]), None);
        assert_eq!(lookup(&v, &["a", "length"]), None);
        assert_eq!(lookup(&v, &["list", "x"]), None);
        assert_eq!(lookup(&v, &["list", "5"]), None);
        assert_eq!(lookup(&v, &["__proto__"]), None);
    }

    #[test]
    fn assign_creates_intermediate_objects() {
        let v = assign("k", None, &["a", "b"], json!(1)).unwrap();
        assert_eq!(v, json!({"a": {"b": 1}}));

        let v = assign("k", Some(json!({"a": {"x": 0}, "z": null})), &["a", "y"], json!(2)).unwrap();
        assert_eq!(v, json!({"a": {"x": 0, "y": 2}, "z": null}));

        let v = assign("k", Some(json!({"z": null})), &["z", "q"], json!(true)).unwrap();
        assert_eq!(v, json!({"z": {"q": true}}));
    }

    #[test]
    fn assign_into_arrays() {
        let v = assign("k", Some(json!({"l": [1]})), &["l", "2"], json!(3)).unwrap();
        assert_eq!(v, json!({"l": [1, null, 3]}));

        let err = assign("k", Some(json!({"l": []})), &["l", "x"], json!(3)).unwrap_err();
        assert!(err.is_path_type());
    }

    #[test]
    fn assign_bounds_array_growth() {
        for index in ["18446744073709551615", "1000000000000", "1026"] {
            let err = assign("k", Some(json!({"l": [1]})), &["l", index], json!(1)).unwrap_err();
            assert!(err.is_path_type(), "{index}: {err:?}");
            assert!(err.to_string().contains(index), "{err}");
        }

        // Exactly at the limit still pads.
        let v = assign("k", Some(json!({"l": [1]})), &["l", "1025"], json!(2)).unwrap();
        let items = v["l"].as_array().unwrap();
        assert_eq!(items.len(), 1026);
        assert_eq!(items[1025], json!(2));
        assert!(items[1..1025].iter().all(Value::is_null));
    }

    #[test]
    fn assign_refuses_primitives() {
        let err = assign("k", Some(json!("hello world")), &["sub"], json!("x")).unwrap_err();
        assert!(err.is_path_type());
        let msg = err.to_string();
        assert!(msg.contains("\"sub\""), "{msg}");
        assert!(msg.contains("non-object"), "{msg}");

        let err = assign("k", Some(json!({"a": 5})), &["a", "b", "c"], json!(1)).unwrap_err();
        assert!(err.to_string().contains("[\"a\",\"b\"]"), "{err}");
    }

    #[test]
    fn assign_refuses_reserved_segments_anywhere() {
        for path in [vec!["__proto__"], vec!["a", "__proto__", "b"]] {
            let err = assign("k", Some(json!({})), &path, json!("v")).unwrap_err();
            assert!(err.is_path_type());
            assert!(err.to_string().contains("__proto__"));
        }
    }

    #[test]
    fn empty_path_replaces_everything() {
        assert_eq!(
            assign("k", Some(json!({"a": 1})), &[] as &[&str], json!([1])).unwrap(),
            json!([1])
        );
    }
}

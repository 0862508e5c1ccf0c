use serde_json::{Map, Value};

/**
 * Read a nested value by dot-separated path (e.g. "address.city").
 */
pub fn value_at_path<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/**
 * Write a nested value by dot-separated path, creating intermediate objects.
 * Sibling keys are left untouched. Non-object values along the path are
 * replaced by objects.
 */
pub fn set_value_at_path(record: &mut Value, path: &str, value: Value) {
    if !record.is_object() {
        *record = Value::Object(Map::new());
    }
    let map = record.as_object_mut().expect("record is an object");

    match path.find('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some(idx) => {
            let (head, rest) = (&path[..idx], &path[idx + 1..]);
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            set_value_at_path(child, rest, value);
        }
    }
}

/**
 * Build a minimal fragment object holding only `path` (and its value from
 * `record`). An empty object when the path does not resolve.
 */
pub fn pick_at_path(record: &Value, path: &str) -> Value {
    let mut fragment = Value::Object(Map::new());

    if let Some(value) = value_at_path(record, path) {
        set_value_at_path(&mut fragment, path, value.clone());
    }

    fragment
}

/**
 * Recursive object merge. Objects merge key-by-key; anything else in `src`
 * overwrites the destination value.
 */
pub fn deep_merge(dest: &mut Value, src: &Value) {
    match (dest, src) {
        (Value::Object(dest_map), Value::Object(src_map)) => {
            for (key, src_val) in src_map {
                match dest_map.get_mut(key) {
                    Some(dest_val) if dest_val.is_object() && src_val.is_object() => {
                        deep_merge(dest_val, src_val);
                    }
                    _ => {
                        dest_map.insert(key.clone(), src_val.clone());
                    }
                }
            }
        }
        (dest, src) => {
            *dest = src.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_should_read_a_nested_value() {
        let record = json!({ "address": { "city": "Pasadena", "zip": "91101" } });

        assert_eq!(
            value_at_path(&record, "address.city"),
            Some(&json!("Pasadena"))
        );
        assert_eq!(value_at_path(&record, "address.state"), None);
        assert_eq!(value_at_path(&record, "missing.city"), None);
    }

    #[test]
    fn it_should_set_a_nested_value_without_touching_siblings() {
        let mut record = json!({ "address": { "city": "Pasadena", "zip": "91101" } });

        set_value_at_path(&mut record, "address.city", json!("Glendale"));

        assert_eq!(
            record,
            json!({ "address": { "city": "Glendale", "zip": "91101" } })
        );
    }

    #[test]
    fn it_should_create_intermediate_objects() {
        let mut record = json!({});

        set_value_at_path(&mut record, "a.b.c", json!(1));

        assert_eq!(record, json!({ "a": { "b": { "c": 1 } } }));
    }

    #[test]
    fn it_should_pick_only_the_given_path() {
        let record = json!({
            "name": "cafe",
            "address": { "city": "Pasadena", "zip": "91101" }
        });

        let fragment = pick_at_path(&record, "address.city");

        assert_eq!(fragment, json!({ "address": { "city": "Pasadena" } }));
    }

    #[test]
    fn it_should_pick_an_empty_fragment_for_a_missing_path() {
        let record = json!({ "name": "cafe" });

        assert_eq!(pick_at_path(&record, "address.city"), json!({}));
    }

    #[test]
    fn it_should_merge_objects_recursively() {
        let mut dest = json!({ "a": { "x": 1, "y": 2 }, "b": 3 });
        let src = json!({ "a": { "y": 9, "z": 10 } });

        deep_merge(&mut dest, &src);

        assert_eq!(dest, json!({ "a": { "x": 1, "y": 9, "z": 10 }, "b": 3 }));
    }

    #[test]
    fn it_should_overwrite_non_object_values() {
        let mut dest = json!({ "a": [1, 2, 3] });
        let src = json!({ "a": 7 });

        deep_merge(&mut dest, &src);

        assert_eq!(dest, json!({ "a": 7 }));
    }
}

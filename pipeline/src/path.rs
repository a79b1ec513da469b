//! Dot-notation JSON path get/set, used by `LookupRule`.
//!
//! `resolve_path` mirrors the get-only helper used elsewhere in the
//! surrounding codebase for topic field extraction; `set_path` is its
//! write-side counterpart, creating intermediate objects as needed.

use serde_json::Value;

pub(crate) fn resolve_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

pub(crate) fn set_path(value: &mut Value, path: &str, new_value: Value) -> Result<(), String> {
    let segments: Vec<&str> = path.split('.').collect();
    set_path_segments(value, &segments, new_value)
}

fn set_path_segments(value: &mut Value, segments: &[&str], new_value: Value) -> Result<(), String> {
    let (head, rest) = segments
        .split_first()
        .ok_or_else(|| "empty json path".to_string())?;

    if head.is_empty() {
        return Err("empty path segment".to_string());
    }

    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    let obj = value
        .as_object_mut()
        .expect("value was just coerced into an object");

    if rest.is_empty() {
        obj.insert((*head).to_string(), new_value);
        return Ok(());
    }

    let entry = obj
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_path_segments(entry, rest, new_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve_path_walks_nested_objects() {
        let value = json!({ "customer": { "id": "123" } });
        assert_eq!(resolve_path(&value, "customer.id"), Some(&json!("123")));
    }

    #[test]
    fn resolve_path_returns_none_for_missing_segment() {
        let value = json!({ "customer": { "id": "123" } });
        assert_eq!(resolve_path(&value, "customer.name"), None);
    }

    #[test]
    fn set_path_creates_missing_intermediate_objects() {
        let mut value = json!({ "method": "GET", "customer": { "id": "123" } });
        set_path(&mut value, "customer.details.name", json!("Big Company")).unwrap();
        set_path(&mut value, "customer.details.plan", json!("Premium")).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "GET",
                "customer": {
                    "id": "123",
                    "details": { "name": "Big Company", "plan": "Premium" }
                }
            })
        );
    }
}

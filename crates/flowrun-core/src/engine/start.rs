//! Start data preparation for the preview profile.
//!
//! The editor stores the start node's inputs as `fields: [{key, value}]`.
//! With expansion enabled the threaded object is built from that list
//! instead of the raw payload.

use serde_json::{Map, Value};

/// Build the start object from a `fields` list, if the payload has one.
///
/// Entries without a non-empty `key` are skipped. With `parse_json`, string
/// values are parsed as JSON when they parse (`"14"` becomes `14`) and kept
/// as strings otherwise. A payload without a `fields` array is returned as is.
pub fn expand_fields(data: Map<String, Value>, parse_json: bool) -> Map<String, Value> {
    let Some(Value::Array(fields)) = data.get("fields") else {
        return data;
    };

    let mut out = Map::new();
    for field in fields {
        let Some(key) = field.get("key").and_then(Value::as_str).filter(|k| !k.is_empty()) else {
            continue;
        };
        let value = match field.get("value") {
            Some(Value::String(raw)) if parse_json => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            Some(other) => other.clone(),
            None => Value::Null,
        };
        out.insert(key.to_string(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fields_become_object() {
        let data = obj(json!({
            "fields": [
                { "key": "age", "value": "14" },
                { "key": "active", "value": "true" },
                { "key": "name", "value": "Ada" },
                { "key": "", "value": "ignored" },
                { "value": "no key" }
            ]
        }));

        let out = expand_fields(data, true);
        assert_eq!(
            Value::Object(out),
            json!({ "age": 14, "active": true, "name": "Ada" })
        );
    }

    #[test]
    fn test_raw_strings_without_parsing() {
        let data = obj(json!({ "fields": [{ "key": "age", "value": "14" }] }));
        let out = expand_fields(data, false);
        assert_eq!(out["age"], json!("14"));
    }

    #[test]
    fn test_payload_without_fields_is_unchanged() {
        let data = obj(json!({ "foo": "bar" }));
        assert_eq!(expand_fields(data.clone(), true), data);
    }
}

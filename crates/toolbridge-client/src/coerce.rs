//! Normalization of tool arguments against the tool's input schema.
//!
//! Callers (and models) often hand over nested structures pre-serialized as
//! strings. Before a call is sent, any string sitting where the schema
//! declares an object, or an array of objects, is parsed and substituted.
//!
//! The rules:
//!
//! - Only strings are touched, and only where the declared types exclude
//!   `string`.
//! - The parsed value replaces the string only if it is the declared
//!   container kind. Anything else leaves the string as it was.
//! - A string that fails to parse is logged and passed through.
//!
//! Coercion is idempotent: a value that has already been parsed is an object
//! or array, never a string, so a second pass leaves it alone.
//!
//! ```rust
//! use serde_json::json;
//! use toolbridge_client::coerce::coerce_arguments;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {"filter": {"type": "object"}}
//! });
//! let args = coerce_arguments(&schema, json!({"filter": "{\"owner\": \"me\"}"}));
//! assert_eq!(args, json!({"filter": {"owner": "me"}}));
//! ```

use serde_json::Value;
use tracing::{debug, trace, warn};

const MAX_DEPTH: usize = 32;
const MAX_REF_HOPS: usize = 16;
const UNION_KEYWORDS: [&str; 3] = ["anyOf", "oneOf", "allOf"];

/// Return `arguments` with embedded JSON strings parsed where `schema`
/// declares structured values.
#[must_use]
pub fn coerce_arguments(schema: &Value, arguments: Value) -> Value {
    let mut arguments = arguments;
    Walker { root: schema }.coerce(schema, &mut arguments, "$", 0);
    arguments
}

/// Which shapes a schema position accepts.
#[derive(Debug, Default, Clone, Copy)]
struct Accepts {
    object: bool,
    array_of_object: bool,
    string: bool,
}

impl Accepts {
    fn merge(&mut self, other: Self) {
        self.object |= other.object;
        self.array_of_object |= other.array_of_object;
        self.string |= other.string;
    }

    fn wants_parse(self) -> bool {
        !self.string && (self.object || self.array_of_object)
    }

    fn admits(self, parsed: &Value) -> bool {
        match parsed {
            Value::Object(_) => self.object,
            Value::Array(items) => self.array_of_object && items.iter().all(Value::is_object),
            _ => false,
        }
    }
}

struct Walker<'a> {
    root: &'a Value,
}

impl<'a> Walker<'a> {
    fn coerce(&self, schema: &'a Value, value: &mut Value, path: &str, depth: usize) {
        if depth > MAX_DEPTH {
            return;
        }
        let schema = self.resolve(schema);

        let replacement = match &*value {
            Value::String(raw) => self.parse_embedded(schema, raw, path),
            _ => None,
        };
        if let Some(parsed) = replacement {
            *value = parsed;
        }

        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if let Some(child_schema) = self.property_schema(schema, key, 0) {
                        self.coerce(child_schema, child, &format!("{path}.{key}"), depth + 1);
                    }
                }
            }
            Value::Array(items) => {
                if let Some(item_schema) = self.items_schema(schema, 0) {
                    for (index, item) in items.iter_mut().enumerate() {
                        self.coerce(item_schema, item, &format!("{path}[{index}]"), depth + 1);
                    }
                }
            }
            _ => {}
        }
    }

    fn parse_embedded(&self, schema: &'a Value, raw: &str, path: &str) -> Option<Value> {
        let accepts = self.accepts(schema, 0);
        if !accepts.wants_parse() {
            return None;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(parsed) if accepts.admits(&parsed) => {
                trace!(path, "Parsed embedded JSON argument");
                Some(parsed)
            }
            Ok(_) => {
                debug!(path, "Embedded JSON does not match the declared type, passing string through");
                None
            }
            Err(e) => {
                warn!(path, error = %e, "Argument is not valid JSON, passing string through");
                None
            }
        }
    }

    /// Follow local `$ref` pointers.
    fn resolve(&self, mut schema: &'a Value) -> &'a Value {
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = schema.get("$ref").and_then(Value::as_str) else {
                return schema;
            };
            match reference
                .strip_prefix('#')
                .and_then(|pointer| self.root.pointer(pointer))
            {
                Some(target) => schema = target,
                None => {
                    debug!(reference, "Ignoring unresolvable schema reference");
                    return schema;
                }
            }
        }
        schema
    }

    fn branches(&self, schema: &'a Value) -> Vec<&'a Value> {
        UNION_KEYWORDS
            .iter()
            .filter_map(|keyword| schema.get(*keyword).and_then(Value::as_array))
            .flatten()
            .map(|branch| self.resolve(branch))
            .collect()
    }

    fn accepts(&self, schema: &'a Value, depth: usize) -> Accepts {
        let schema = self.resolve(schema);
        let mut accepts = Accepts::default();

        let declared: Vec<&str> = match schema.get("type") {
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if declared.is_empty() && schema.get("properties").is_some() {
            accepts.object = true;
        }
        for name in declared {
            match name {
                "object" => accepts.object = true,
                "string" => accepts.string = true,
                "array" if depth < MAX_DEPTH => {
                    if let Some(items) = schema.get("items").filter(|i| i.is_object()) {
                        accepts.array_of_object |= self.accepts(items, depth + 1).object;
                    }
                }
                _ => {}
            }
        }

        if depth < MAX_DEPTH {
            for branch in self.branches(schema) {
                accepts.merge(self.accepts(branch, depth + 1));
            }
        }
        accepts
    }

    fn property_schema(&self, schema: &'a Value, key: &str, depth: usize) -> Option<&'a Value> {
        let schema = self.resolve(schema);
        if let Some(property) = schema.get("properties").and_then(|p| p.get(key)) {
            return Some(property);
        }
        if depth < MAX_DEPTH {
            for branch in self.branches(schema) {
                if let Some(property) = self.property_schema(branch, key, depth + 1) {
                    return Some(property);
                }
            }
        }
        schema.get("additionalProperties").filter(|a| a.is_object())
    }

    fn items_schema(&self, schema: &'a Value, depth: usize) -> Option<&'a Value> {
        let schema = self.resolve(schema);
        if let Some(items) = schema.get("items").filter(|i| i.is_object()) {
            return Some(items);
        }
        if depth < MAX_DEPTH {
            for branch in self.branches(schema) {
                if let Some(items) = self.items_schema(branch, depth + 1) {
                    return Some(items);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "filter": {"type": "object", "properties": {"tags": {"type": "array", "items": {"type": "string"}}}},
                "rows": {"type": "array", "items": {"$ref": "#/$defs/row"}},
                "options": {"anyOf": [{"type": "object"}, {"type": "null"}]},
                "either": {"type": ["object", "string"]},
                "count": {"type": "integer"}
            },
            "$defs": {
                "row": {"type": "object", "properties": {"meta": {"type": "object"}}}
            }
        })
    }

    #[test]
    fn test_object_property_string_is_parsed() {
        let args = coerce_arguments(&schema(), json!({"filter": "{\"owner\": \"me\"}"}));
        assert_eq!(args, json!({"filter": {"owner": "me"}}));
    }

    #[test]
    fn test_string_typed_property_is_untouched() {
        let args = json!({"query": "{\"looks\": \"like json\"}", "count": 3});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_union_accepting_string_is_untouched() {
        let args = json!({"either": "{\"a\": 1}"});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_union_branches_declare_object() {
        let args = coerce_arguments(&schema(), json!({"options": "{\"verbose\": true}"}));
        assert_eq!(args, json!({"options": {"verbose": true}}));
    }

    #[test]
    fn test_array_of_objects_through_ref() {
        let args = coerce_arguments(
            &schema(),
            json!({"rows": "[{\"meta\": \"{\\\"k\\\": 1}\"}]"}),
        );
        assert_eq!(args, json!({"rows": [{"meta": {"k": 1}}]}));
    }

    #[test]
    fn test_items_walked_in_place() {
        let args = coerce_arguments(
            &schema(),
            json!({"rows": [{"meta": "{\"k\": 2}"}, {"meta": {"k": 3}}]}),
        );
        assert_eq!(args, json!({"rows": [{"meta": {"k": 2}}, {"meta": {"k": 3}}]}));
    }

    #[test]
    fn test_type_mismatch_keeps_string() {
        let args = json!({"filter": "[1, 2]", "rows": "{\"not\": \"an array\"}"});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_invalid_json_keeps_string() {
        let args = json!({"filter": "owner=me"});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let once = coerce_arguments(&schema(), json!({"filter": "{\"owner\": \"me\"}"}));
        let twice = coerce_arguments(&schema(), once.clone());
        assert_eq!(once, twice);

        let parsed = json!({"filter": {"owner": "me"}, "rows": [{"meta": {}}]});
        assert_eq!(coerce_arguments(&schema(), parsed.clone()), parsed);
    }

    #[test]
    fn test_double_encoded_string_is_not_parsed_twice() {
        let inner = json!({"owner": "me"}).to_string();
        let double = serde_json::to_string(&inner).unwrap();
        let args = json!({"filter": double});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_unknown_properties_pass_through() {
        let args = json!({"extra": "{\"a\": 1}"});
        assert_eq!(coerce_arguments(&schema(), args.clone()), args);
    }

    #[test]
    fn test_additional_properties_schema() {
        let schema = json!({
            "type": "object",
            "additionalProperties": {"type": "object"}
        });
        let args = coerce_arguments(&schema, json!({"anything": "{\"x\": 1}"}));
        assert_eq!(args, json!({"anything": {"x": 1}}));
    }

    #[test]
    fn test_whole_arguments_object_as_string() {
        let args = coerce_arguments(&schema(), json!("{\"count\": 1}"));
        assert_eq!(args, json!({"count": 1}));
    }
}

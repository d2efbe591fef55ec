use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A type the model can be asked to produce.
///
/// Blanket-implemented for anything that is `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Self-contained tool input schema for this type.
    ///
    /// Every object is closed (`additionalProperties: false`) and lists all of
    /// its properties as required, and `$ref`s into `definitions` are inlined
    /// so the schema carries no external references.
    fn tool_schema() -> Value {
        let root = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        let definitions = root
            .get("definitions")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let mut schema = resolve(root, &definitions);
        if let Value::Object(map) = &mut schema {
            map.remove("definitions");
            map.remove("$schema");
        }
        schema
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Inline references and close objects in one walk.
fn resolve(value: Value, definitions: &Map<String, Value>) -> Value {
    match value {
        Value::Object(map) => resolve_object(map, definitions),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| resolve(v, definitions))
                .collect(),
        ),
        other => other,
    }
}

fn resolve_object(mut map: Map<String, Value>, definitions: &Map<String, Value>) -> Value {
    if let Some(target) = map
        .get("$ref")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix("#/definitions/"))
        .and_then(|name| definitions.get(name))
    {
        return resolve(target.clone(), definitions);
    }

    // schemars wraps documented references as a single-element allOf.
    if let Some(Value::Array(all_of)) = map.get("allOf") {
        if all_of.len() == 1 {
            let inner = all_of[0].clone();
            return resolve(inner, definitions);
        }
    }

    if map.get("type").and_then(Value::as_str) == Some("object") {
        map.insert("additionalProperties".into(), Value::Bool(false));
        if let Some(Value::Object(props)) = map.get("properties") {
            let required = props.keys().cloned().map(Value::String).collect();
            map.insert("required".into(), Value::Array(required));
        }
    }

    let resolved = map
        .into_iter()
        .map(|(k, v)| {
            // Definitions are dropped at the root; don't walk them.
            if k == "definitions" {
                (k, v)
            } else {
                (k, resolve(v, definitions))
            }
        })
        .collect();
    Value::Object(resolved)
}

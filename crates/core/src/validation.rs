//! Validate tool call arguments against JSON Schema before execution.

use serde_json::Value;

/// Validate tool arguments against a JSON Schema.
///
/// Performs top-level validation: schema type check, required field presence,
/// and property type verification (one level into arrays of objects, which is
/// as deep as the built-in tool schemas go). Returns `Ok(())` when valid,
/// `Err(message)` describing the first violation found.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), String> {
    validate_at("", args, schema)
}

fn validate_at(path: &str, args: &Value, schema: &Value) -> Result<(), String> {
    if let Some(schema_type) = schema.get("type").and_then(Value::as_str)
        && !value_matches_type(args, schema_type)
    {
        return Err(match path {
            "" => format!("expected {schema_type} arguments, got {}", json_type_name(args)),
            _ => format!(
                "field '{path}' expected type '{schema_type}', got {}",
                json_type_name(args)
            ),
        });
    }

    if let (Some(required), Some(obj)) = (
        schema.get("required").and_then(Value::as_array),
        args.as_object(),
    ) {
        for name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(name) {
                return Err(format!("missing required field '{}'", join(path, name)));
            }
        }
    }

    if let (Some(properties), Some(obj)) = (
        schema.get("properties").and_then(Value::as_object),
        args.as_object(),
    ) {
        for (key, value) in obj {
            if let Some(prop_schema) = properties.get(key) {
                validate_at(&join(path, key), value, prop_schema)?;
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), args.as_array()) {
        for (i, item) in array.iter().enumerate() {
            validate_at(&format!("{path}[{i}]"), item, items)?;
        }
    }

    Ok(())
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

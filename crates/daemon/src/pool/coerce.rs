// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input-schema argument coercion.
//!
//! CLI arguments arrive as strings; tool input schemas usually want typed
//! values. Before dispatch, string arguments are re-typed according to the
//! declared property type. Values that already have the right shape pass
//! through untouched, and properties the schema does not mention are left
//! alone — the server is the authority on unknown keys.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CoerceError(String);

/// Coerce `args` against raw input-schema bytes. An empty or unparseable
/// schema passes arguments through unchanged.
pub fn coerce_arguments(
    args: Map<String, Value>,
    schema: &[u8],
) -> Result<Map<String, Value>, CoerceError> {
    if schema.is_empty() {
        return Ok(args);
    }
    let schema: Value = match serde_json::from_slice(schema) {
        Ok(value) => value,
        Err(_) => return Ok(args),
    };
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(args);
    };

    let mut coerced = Map::with_capacity(args.len());
    for (key, value) in args {
        let declared = properties.get(&key).and_then(|p| p.get("type")).and_then(Value::as_str);
        let value = match declared {
            Some(ty) => coerce_value(&key, ty, value)?,
            None => value,
        };
        coerced.insert(key, value);
    }
    Ok(coerced)
}

fn coerce_value(key: &str, ty: &str, value: Value) -> Result<Value, CoerceError> {
    let Value::String(text) = value else {
        // Already structured; let the server validate it.
        return Ok(value);
    };

    match ty {
        "string" => Ok(Value::String(text)),
        "integer" => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| type_error(key, ty, &text)),
        "number" => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| type_error(key, ty, &text)),
        "boolean" => match text.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(type_error(key, ty, &text)),
        },
        "array" | "object" => {
            let parsed: Value =
                serde_json::from_str(&text).map_err(|_| type_error(key, ty, &text))?;
            let matches = (ty == "array" && parsed.is_array())
                || (ty == "object" && parsed.is_object());
            if matches {
                Ok(parsed)
            } else {
                Err(type_error(key, ty, &text))
            }
        }
        _ => Ok(Value::String(text)),
    }
}

fn type_error(key: &str, ty: &str, text: &str) -> CoerceError {
    CoerceError(format!("expected {ty} for {key}, got {text:?}"))
}

#[cfg(test)]
#[path = "coerce_tests.rs"]
mod tests;

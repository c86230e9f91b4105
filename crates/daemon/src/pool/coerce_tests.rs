// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Map, Value};

use super::*;

const SCHEMA: &[u8] = br#"{
    "type": "object",
    "properties": {
        "query": {"type": "string"},
        "count": {"type": "integer"},
        "ratio": {"type": "number"},
        "flag": {"type": "boolean"},
        "tags": {"type": "array"},
        "options": {"type": "object"}
    }
}"#;

fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[test]
fn strings_coerce_to_declared_scalar_types() {
    let coerced = coerce_arguments(
        args(&[
            ("count", json!("5")),
            ("ratio", json!("2.5")),
            ("flag", json!("true")),
            ("query", json!("hello")),
        ]),
        SCHEMA,
    )
    .unwrap();

    assert_eq!(coerced["count"], json!(5));
    assert_eq!(coerced["ratio"], json!(2.5));
    assert_eq!(coerced["flag"], json!(true));
    assert_eq!(coerced["query"], json!("hello"));
}

#[test]
fn strings_coerce_to_arrays_and_objects() {
    let coerced = coerce_arguments(
        args(&[("tags", json!("[\"a\",\"b\"]")), ("options", json!("{\"k\":1}"))]),
        SCHEMA,
    )
    .unwrap();

    assert_eq!(coerced["tags"], json!(["a", "b"]));
    assert_eq!(coerced["options"], json!({"k": 1}));
}

#[test]
fn already_typed_values_pass_through() {
    let coerced = coerce_arguments(args(&[("count", json!(7)), ("flag", json!(false))]), SCHEMA)
        .unwrap();
    assert_eq!(coerced["count"], json!(7));
    assert_eq!(coerced["flag"], json!(false));
}

#[test]
fn undeclared_keys_pass_through_untouched() {
    let coerced = coerce_arguments(args(&[("mystery", json!("keep-me"))]), SCHEMA).unwrap();
    assert_eq!(coerced["mystery"], json!("keep-me"));
}

#[test]
fn unparseable_scalar_is_an_error() {
    let err = coerce_arguments(args(&[("count", json!("five"))]), SCHEMA).unwrap_err();
    assert!(err.to_string().contains("expected integer for count"), "got: {err}");
}

#[test]
fn bad_boolean_is_an_error() {
    assert!(coerce_arguments(args(&[("flag", json!("yes"))]), SCHEMA).is_err());
}

#[test]
fn wrong_container_shape_is_an_error() {
    // Valid JSON, but not an array.
    assert!(coerce_arguments(args(&[("tags", json!("{\"k\":1}"))]), SCHEMA).is_err());
}

#[test]
fn empty_schema_passes_everything_through() {
    let input = args(&[("anything", json!("5"))]);
    let coerced = coerce_arguments(input.clone(), b"").unwrap();
    assert_eq!(coerced, input);
}

#[test]
fn unparseable_schema_passes_everything_through() {
    let input = args(&[("anything", json!("5"))]);
    let coerced = coerce_arguments(input.clone(), b"{ not json").unwrap();
    assert_eq!(coerced, input);
}

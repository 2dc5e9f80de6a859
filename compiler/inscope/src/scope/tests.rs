#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::binder::bindings;
use pretty_assertions::assert_eq;

fn sample() -> ScopeResult {
    ScopeResult::new(
        bindings([("a", 1), ("b", 2)]),
        bindings([("b", 20), ("c", 30)]),
        Value::str("done"),
        WrapOptions::default(),
    )
}

#[test]
fn test_inner_wins_lookup() {
    let scope = sample();
    assert_eq!(scope.get("a"), Some(&Value::Int(1)));
    assert_eq!(scope.get("b"), Some(&Value::Int(20)));
    assert_eq!(scope["c"], Value::Int(30));
    assert_eq!(scope.get("d"), None);
    assert!(scope.contains("a"));
    assert!(!scope.contains("d"));
}

#[test]
fn test_iteration_lists_outer_then_inner_only() {
    let scope = sample();
    let keys: Vec<&str> = scope.keys().map(Name::as_str).collect();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert_eq!(scope.len(), 3);
    let values: Vec<Value> = scope.iter().map(|(_, v)| v.clone()).collect();
    assert_eq!(values, vec![Value::Int(1), Value::Int(20), Value::Int(30)]);
}

#[test]
#[should_panic(expected = "name 'zzz' is not in scope")]
fn test_index_panics_on_absent_name() {
    let _ = &sample()["zzz"];
}

#[test]
fn test_return_value_is_out_of_band() {
    let scope = sample();
    assert_eq!(scope.return_value(), &Value::str("done"));
    assert!(!scope.keys().any(|k| k.as_str() == "done"));
}

#[test]
fn test_equality_as_a_mapping() {
    let scope = sample();
    assert_eq!(scope, bindings([("c", 30), ("b", 20), ("a", 1)]));
    let same_mapping = ScopeResult::new(
        bindings([("a", 1)]),
        bindings([("b", 20), ("c", 30)]),
        Value::None,
        WrapOptions::default(),
    );
    assert_eq!(scope, same_mapping);
}

#[test]
fn test_display() {
    assert_eq!(sample().to_string(), "Scope({'a': 1, 'b': 20, 'c': 30})");
}

#[test]
fn test_empty_scope() {
    let scope = ScopeResult::new(
        Bindings::default(),
        Bindings::default(),
        Value::None,
        WrapOptions::default(),
    );
    assert!(scope.is_empty());
    assert_eq!(scope.len(), 0);
    assert_eq!(scope.to_string(), "Scope({})");
}

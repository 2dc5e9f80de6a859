//! Shared helpers for the engine's integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use inscope::{
    wrap, Bindings, Method, Module, Name, NameSet, Runtime, ScopeError, ScopeResult,
    ScopedFunction, WrapOptions,
};
use inscope_vm::silent_handler;

/// Both capture methods, for tests that must hold under either.
pub const METHODS: [Method; 2] = [Method::Transform, Method::Trace];

pub fn load(source: &str) -> Module {
    Runtime::builder()
        .print_handler(silent_handler())
        .build()
        .load(source, "fixture")
        .unwrap()
}

pub fn wrap_named(
    module: &Module,
    function: &str,
    mappings: &[Bindings],
    method: Method,
) -> Result<ScopedFunction, ScopeError> {
    wrap(
        module.get(function).unwrap(),
        mappings,
        WrapOptions::new().method(method),
    )
}

pub fn names(set: &NameSet) -> Vec<&'static str> {
    set.iter().map(|n| n.as_str()).collect()
}

pub fn keys(scope: &ScopeResult) -> Vec<&'static str> {
    scope.keys().map(Name::as_str).collect()
}

pub fn inner_keys(scope: &ScopeResult) -> Vec<&'static str> {
    scope.inner().keys().map(|n| n.as_str()).collect()
}

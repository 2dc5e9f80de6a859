//! The process-wide default method.
//!
//! Kept in its own binary with a single test: the default is global state,
//! and the environment variable is only read on first use.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

mod common;

use common::load;
use inscope::config::METHOD_ENV_VAR;
use inscope::{default_method, set_default_method, wrap, Method, WrapOptions};
use pretty_assertions::assert_eq;

#[test]
fn default_method_follows_environment_then_setter() {
    std::env::set_var(METHOD_ENV_VAR, " Trace ");
    assert_eq!(default_method(), Method::Trace);

    let module = load("def f() { a = 1 }");
    let f = module.get("f").unwrap();
    let traced = wrap(&f, &[], WrapOptions::default()).unwrap();
    assert_eq!(traced.method(), Method::Trace);

    set_default_method(Method::Transform);
    assert_eq!(default_method(), Method::Transform);
    assert_eq!(
        wrap(&f, &[], WrapOptions::default()).unwrap().method(),
        Method::Transform
    );
    // Already built wrappers keep what they resolved.
    assert_eq!(traced.method(), Method::Trace);

    set_default_method(Method::Trace);
    set_default_method(Method::Default);
    assert_eq!(default_method(), Method::Transform);

    std::env::set_var(METHOD_ENV_VAR, "trace");
    assert_eq!(default_method(), Method::Transform);
}

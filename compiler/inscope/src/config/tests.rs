#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_wrap_options_defaults_and_setters() {
    let options = WrapOptions::default();
    assert!(options.use_closures);
    assert!(options.use_globals);
    assert_eq!(options.method, Method::Default);
    assert_eq!(options.transform_reach, DEFAULT_TRANSFORM_REACH);

    let options = WrapOptions::new()
        .use_closures(false)
        .method(Method::Trace)
        .transform_reach(10);
    assert!(!options.use_closures);
    assert_eq!(options.method, Method::Trace);
    assert_eq!(options.transform_reach, 10);
}

#[test]
fn test_bind_to_options_inherit_unset_fields() {
    let inherited = WrapOptions::new()
        .use_globals(false)
        .method(Method::Trace)
        .transform_reach(40);
    let merged = BindToOptions::new().use_closures(false).over(inherited);
    assert_eq!(
        merged,
        WrapOptions {
            use_closures: false,
            use_globals: false,
            method: Method::Trace,
            transform_reach: 40,
        }
    );
}

#[test]
fn test_resolved_options_never_use_default() {
    assert_ne!(WrapOptions::default().resolved().method, Method::Default);
    assert_ne!(default_method(), Method::Default);
    assert_eq!(
        WrapOptions::new().method(Method::Trace).resolved().method,
        Method::Trace
    );
}

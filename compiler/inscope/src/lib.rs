//! Inscope - call a function and keep its inner scope.
//!
//! Wrapping a guest function produces a [`ScopedFunction`]. Calling it runs
//! the body in an environment built from supplied mappings, the function's
//! closures, its module globals and the builtins, and returns a
//! [`ScopeResult`]: every name the body bound, layered over the names it
//! inherited, plus the return value.
//!
//! # Architecture
//!
//! - [`resolver`]: which outer names a body needs, nested bodies included
//! - [`binder`]: where each of those names gets its value, and which are missing
//! - [`capture`]: recovering the locals, by bytecode rewrite or frame tracing
//! - [`scope`]: the read-only result view and its generator counterpart
//!
//! ```text
//! let runtime = Runtime::new();
//! let module = runtime.load("def f() {\n  c = b + 1\n}", "demo")?;
//! let f = wrap(module.get("f").unwrap(), &[bindings([("b", 2)])], WrapOptions::default())?;
//! let scope = f.call(Args::new())?.into_scope()?;
//! assert_eq!(scope["c"], Value::Int(3));
//! ```

pub mod binder;
pub mod capture;
pub mod config;
mod errors;
pub mod resolver;
pub mod scope;
mod scoped;

use std::sync::Once;

pub use binder::{bindings, Bindings, Environment};
pub use capture::{rewrite, CaptureObserver, Method, DEFAULT_TRANSFORM_REACH};
pub use config::{default_method, set_default_method, BindToOptions, WrapOptions};
pub use errors::ScopeError;
pub use resolver::{NameSet, Requirements};
pub use scope::{ScopeGenerator, ScopeResult};
pub use scoped::{Args, IntoTarget, Outcome, ScopedFunction, Status, Target};

pub use inscope_ir::Name;
pub use inscope_vm::{LoadError, Module, Runtime, Value};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset; safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// Wrap `target` for scope capture.
pub fn wrap(
    target: impl IntoTarget,
    mappings: &[Bindings],
    options: WrapOptions,
) -> Result<ScopedFunction, ScopeError> {
    ScopedFunction::new(target, mappings, options)
}

/// Wrap with default options and call once.
pub fn call_once(target: impl IntoTarget, args: Args) -> Result<Outcome, ScopeError> {
    wrap(target, &[], WrapOptions::default())?.call(args)
}

/// Fix the mappings now, wrap the function later.
pub fn bind_with<T: IntoTarget>(
    mappings: Vec<Bindings>,
) -> impl FnOnce(T) -> Result<ScopedFunction, ScopeError> {
    move |target| wrap(target, &mappings, WrapOptions::default())
}

/// Fix the arguments now, wrap and call the function later.
pub fn call_with<T: IntoTarget>(args: Args) -> impl FnOnce(T) -> Result<Outcome, ScopeError> {
    move |target| call_once(target, args)
}

//! Configuration: per-wrap options and the process-wide default method.

use std::sync::OnceLock;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::capture::{Method, DEFAULT_TRANSFORM_REACH};

/// Environment variable read once for the initial default method.
pub const METHOD_ENV_VAR: &str = "INSCOPE_METHOD";

static DEFAULT_METHOD: OnceLock<RwLock<Method>> = OnceLock::new();

fn slot() -> &'static RwLock<Method> {
    DEFAULT_METHOD.get_or_init(|| RwLock::new(initial_method()))
}

fn initial_method() -> Method {
    let Ok(value) = std::env::var(METHOD_ENV_VAR) else {
        return Method::Transform;
    };
    match value.parse::<Method>() {
        Ok(Method::Default) => Method::Transform,
        Ok(method) => {
            debug!(%method, "default capture method taken from {METHOD_ENV_VAR}");
            method
        }
        Err(err) => {
            warn!(%err, "ignoring {METHOD_ENV_VAR}; using transform");
            Method::Transform
        }
    }
}

/// The method `Method::Default` stands for. Never `Method::Default` itself.
pub fn default_method() -> Method {
    *slot().read()
}

/// Change the process-wide default. `Method::Default` restores transform.
///
/// Already constructed wrappers keep the method they resolved.
pub fn set_default_method(method: Method) {
    let method = match method {
        Method::Default => Method::Transform,
        other => other,
    };
    *slot().write() = method;
    debug!(%method, "default capture method set");
}

/// Options for [`wrap`](crate::wrap).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WrapOptions {
    /// Fill closure variables from the function's own cells.
    pub use_closures: bool,
    /// Fill global names from the function's defining module.
    pub use_globals: bool,
    pub method: Method,
    /// Longest forward jump from a return to the transform capture tail.
    pub transform_reach: usize,
}

impl Default for WrapOptions {
    fn default() -> Self {
        WrapOptions {
            use_closures: true,
            use_globals: true,
            method: Method::Default,
            transform_reach: DEFAULT_TRANSFORM_REACH,
        }
    }
}

impl WrapOptions {
    pub fn new() -> Self {
        WrapOptions::default()
    }

    #[must_use]
    pub fn use_closures(mut self, yes: bool) -> Self {
        self.use_closures = yes;
        self
    }

    #[must_use]
    pub fn use_globals(mut self, yes: bool) -> Self {
        self.use_globals = yes;
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn transform_reach(mut self, reach: usize) -> Self {
        self.transform_reach = reach;
        self
    }

    /// Replace `Method::Default` with the current process default.
    pub(crate) fn resolved(self) -> Self {
        WrapOptions {
            method: self.method.resolve(),
            ..self
        }
    }
}

/// Overrides for [`ScopeResult::bind_to`](crate::ScopeResult::bind_to).
///
/// Unset fields inherit from the wrapper that produced the scope.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BindToOptions {
    pub use_closures: Option<bool>,
    pub use_globals: Option<bool>,
    pub method: Option<Method>,
}

impl BindToOptions {
    pub fn new() -> Self {
        BindToOptions::default()
    }

    #[must_use]
    pub fn use_closures(mut self, yes: bool) -> Self {
        self.use_closures = Some(yes);
        self
    }

    #[must_use]
    pub fn use_globals(mut self, yes: bool) -> Self {
        self.use_globals = Some(yes);
        self
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub(crate) fn over(self, inherited: WrapOptions) -> WrapOptions {
        WrapOptions {
            use_closures: self.use_closures.unwrap_or(inherited.use_closures),
            use_globals: self.use_globals.unwrap_or(inherited.use_globals),
            method: self.method.unwrap_or(inherited.method),
            transform_reach: inherited.transform_reach,
        }
    }
}

#[cfg(test)]
mod tests;

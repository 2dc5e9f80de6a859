//! Building the outer environment of a wrapped function.
//!
//! Each required name is resolved through a fixed chain: supplied
//! mappings (latest first), then the function's closure cells for closure
//! names, or its defining globals and the builtin table for global names.
//! Names that fall off the end are missing.

use inscope_ir::Name;
use inscope_vm::{FunctionObject, NameMap, Value};
use tracing::debug;

use crate::resolver::{NameSet, Requirements};

/// A name to value mapping, in insertion order.
pub type Bindings = NameMap;

/// Where each required name of a function comes from.
///
/// A name can be both a closure variable of the body and a global read by
/// a nested body. The two are resolved independently: `cells` feeds the
/// closure, `globals` feeds the call-time global namespace. `outer` is the
/// caller-facing union, closure values first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Environment {
    /// Required names with a concrete value.
    pub outer: Bindings,
    /// Required names with no value anywhere.
    pub missing: NameSet,
    /// Required names left to the builtin table at call time.
    pub builtins: NameSet,
    /// Values for the body's closure cells.
    pub cells: Bindings,
    /// Values for the global namespace the call runs in.
    pub globals: Bindings,
}

impl Environment {
    pub fn resolve(
        requirements: &Requirements,
        function: &FunctionObject,
        mappings: &[Bindings],
        use_closures: bool,
        use_globals: bool,
    ) -> Environment {
        Environment::resolve_over(None, requirements, function, mappings, use_closures, use_globals)
    }

    /// Resolve again with `mappings` layered over this environment.
    pub fn rebind(
        &self,
        requirements: &Requirements,
        function: &FunctionObject,
        mappings: &[Bindings],
        use_closures: bool,
        use_globals: bool,
    ) -> Environment {
        Environment::resolve_over(
            Some(self),
            requirements,
            function,
            mappings,
            use_closures,
            use_globals,
        )
    }

    fn resolve_over(
        base: Option<&Environment>,
        requirements: &Requirements,
        function: &FunctionObject,
        mappings: &[Bindings],
        use_closures: bool,
        use_globals: bool,
    ) -> Environment {
        let supplied = merge(mappings);
        let closure_values: NameMap = function
            .closure_values()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        let mut env = Environment::default();
        for &name in &requirements.closures {
            let value = supplied
                .get(&name)
                .or_else(|| base.and_then(|b| b.cells.get(&name)))
                .or_else(|| use_closures.then(|| closure_values.get(&name)).flatten());
            match value {
                Some(value) => {
                    env.cells.insert(name, value.clone());
                }
                None => {
                    env.missing.insert(name);
                }
            }
        }
        for &name in &requirements.globals {
            let value = supplied
                .get(&name)
                .or_else(|| base.and_then(|b| b.globals.get(&name)))
                .cloned()
                .or_else(|| use_globals.then(|| function.globals.vars.get(name)).flatten());
            match value {
                Some(value) => {
                    env.globals.insert(name, value);
                }
                None if function.globals.builtins.contains(name) => {
                    env.builtins.insert(name);
                }
                None => {
                    env.missing.insert(name);
                }
            }
        }

        for (name, value) in env.cells.iter().chain(&env.globals) {
            if !env.missing.contains(name) && !env.outer.contains_key(name) {
                env.outer.insert(*name, value.clone());
            }
        }

        debug!(
            function = %function.qualname(),
            outer = env.outer.len(),
            missing = ?env.missing.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            builtins = ?env.builtins.iter().map(|n| n.as_str()).collect::<Vec<_>>(),
            "environment resolved"
        );
        env
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Later mappings override earlier ones.
pub fn merge(mappings: &[Bindings]) -> Bindings {
    let mut merged = Bindings::default();
    for mapping in mappings {
        merged.extend(mapping.iter().map(|(k, v)| (*k, v.clone())));
    }
    merged
}

/// Build [`Bindings`] from string keys.
pub fn bindings<K, V, I>(pairs: I) -> Bindings
where
    K: AsRef<str>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (Name::intern(k.as_ref()), v.into()))
        .collect()
}

#[cfg(test)]
mod tests;

//! Runtime construction and module loading.

use std::rc::Rc;

use inscope_compile::CompileError;
use inscope_ir::Name;
use inscope_parse::ParseError;
use tracing::debug;

use crate::builtins::builtin_table;
use crate::errors::VmError;
use crate::interp::{call_value, run_module};
use crate::namespace::{Builtins, Globals, Namespace};
use crate::print_handler::{stdout_handler, SharedPrintHandler};
use crate::value::{FunctionObject, Value};

/// Default cap on nested guest frames.
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// Failure to load a module.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("error while running module: {0}")]
    Run(#[from] VmError),
}

/// An interpreter instance: builtins plus configuration.
///
/// Modules loaded by one runtime share its builtins, print handler and
/// recursion budget.
pub struct Runtime {
    builtins: Rc<Builtins>,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Runtime::builder().build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub fn builtins(&self) -> &Rc<Builtins> {
        &self.builtins
    }

    /// Output captured by the print handler, if it captures.
    pub fn output(&self) -> String {
        self.builtins.print.get_output()
    }

    /// Parse, compile and execute `source` as a fresh module.
    #[tracing::instrument(level = "debug", skip(self, source))]
    pub fn load(&self, source: &str, module_name: &str) -> Result<Module, LoadError> {
        let tree = inscope_parse::parse(source)?;
        let code = inscope_compile::compile_module(&tree, module_name)?;
        let globals = Globals::new(Namespace::new(), Rc::clone(&self.builtins));
        run_module(code, globals.clone())?;
        debug!(module = module_name, globals = globals.vars.len(), "module loaded");
        Ok(Module {
            name: module_name.into(),
            globals,
        })
    }

    /// Call any callable value.
    pub fn call(
        &self,
        callee: &Value,
        args: &[Value],
        kwargs: &[(Name, Value)],
    ) -> Result<Value, VmError> {
        call_value(&self.builtins, callee, args, kwargs)
    }
}

/// Builder for [`Runtime`].
pub struct RuntimeBuilder {
    print_handler: Option<SharedPrintHandler>,
    recursion_limit: usize,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        RuntimeBuilder {
            print_handler: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl RuntimeBuilder {
    /// Where `print` output goes. Defaults to stdout.
    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.print_handler = Some(handler);
        self
    }

    /// Maximum nesting of guest frames before `RecursionError`.
    #[must_use]
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn build(self) -> Runtime {
        let print = self.print_handler.unwrap_or_else(stdout_handler);
        Runtime {
            builtins: Rc::new(Builtins::new(builtin_table(), print, self.recursion_limit)),
        }
    }
}

/// A loaded module: its name and global namespace.
pub struct Module {
    name: Rc<str>,
    globals: Globals,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// A module-level global.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.vars.get(Name::intern(name))
    }

    /// A module-level function.
    pub fn function(&self, name: &str) -> Option<Rc<FunctionObject>> {
        self.get(name)?.as_function().cloned()
    }
}

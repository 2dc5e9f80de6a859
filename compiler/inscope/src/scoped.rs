//! Wrapped functions.

use std::rc::Rc;

use inscope_ir::Name;
use inscope_vm::{call_function, ClosureCell, FunctionObject, Globals, Namespace, Value};
use tracing::debug;

use crate::binder::{bindings, Bindings, Environment};
use crate::capture::{CapturePlan, Method};
use crate::config::WrapOptions;
use crate::errors::ScopeError;
use crate::resolver::{NameSet, Requirements};
use crate::scope::{ScopeGenerator, ScopeResult, ScopeSeed};

/// Arguments for a wrapped call.
#[derive(Clone, Debug, Default)]
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(Name, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Args::default()
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.keywords.push((Name::intern(name), value.into()));
        self
    }
}

/// What a wrapped call produced.
pub enum Outcome {
    Scope(ScopeResult),
    /// The body is a generator; drain it to reach the scope.
    Generator(ScopeGenerator),
}

impl Outcome {
    /// The scope, draining a generator first if needed.
    pub fn into_scope(self) -> Result<ScopeResult, ScopeError> {
        match self {
            Outcome::Scope(scope) => Ok(scope),
            Outcome::Generator(generator) => generator.into_scope(),
        }
    }

    pub fn as_scope(&self) -> Option<&ScopeResult> {
        match self {
            Outcome::Scope(scope) => Some(scope),
            Outcome::Generator(_) => None,
        }
    }

    pub fn into_generator(self) -> Option<ScopeGenerator> {
        match self {
            Outcome::Generator(generator) => Some(generator),
            Outcome::Scope(_) => None,
        }
    }
}

/// Something that can be wrapped.
pub enum Target {
    Function(Rc<FunctionObject>),
    /// An existing wrapper; its outer environment sits beneath new mappings.
    Scoped(ScopedFunction),
}

pub trait IntoTarget {
    fn into_target(self) -> Result<Target, ScopeError>;
}

impl IntoTarget for Target {
    fn into_target(self) -> Result<Target, ScopeError> {
        Ok(self)
    }
}

impl IntoTarget for Rc<FunctionObject> {
    fn into_target(self) -> Result<Target, ScopeError> {
        Ok(Target::Function(self))
    }
}

impl IntoTarget for &Rc<FunctionObject> {
    fn into_target(self) -> Result<Target, ScopeError> {
        Ok(Target::Function(Rc::clone(self)))
    }
}

impl IntoTarget for &Value {
    fn into_target(self) -> Result<Target, ScopeError> {
        match self {
            Value::Function(function) => Ok(Target::Function(Rc::clone(function))),
            other => Err(ScopeError::NotAFunction {
                found: other.type_name(),
            }),
        }
    }
}

impl IntoTarget for Value {
    fn into_target(self) -> Result<Target, ScopeError> {
        (&self).into_target()
    }
}

impl IntoTarget for ScopedFunction {
    fn into_target(self) -> Result<Target, ScopeError> {
        Ok(Target::Scoped(self))
    }
}

impl IntoTarget for &ScopedFunction {
    fn into_target(self) -> Result<Target, ScopeError> {
        Ok(Target::Scoped(self.clone()))
    }
}

/// Whether a wrapper can be called yet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Ready,
    /// Some free variables have no binding.
    Missing,
}

/// A function prepared for scope capture.
///
/// Construction does all the checking: the body kind, the capture layout
/// and the environment. Binding more names produces a new wrapper and
/// leaves this one untouched.
#[derive(Clone)]
pub struct ScopedFunction {
    function: Rc<FunctionObject>,
    requirements: Rc<Requirements>,
    env: Environment,
    options: WrapOptions,
    plan: CapturePlan,
}

impl ScopedFunction {
    pub fn new(
        target: impl IntoTarget,
        mappings: &[Bindings],
        options: WrapOptions,
    ) -> Result<ScopedFunction, ScopeError> {
        let options = options.resolved();
        match target.into_target()? {
            Target::Function(function) => {
                let requirements = Rc::new(Requirements::of(&function.code));
                ScopedFunction::assemble(function, requirements, None, None, mappings, options)
            }
            Target::Scoped(scoped) => {
                let plan = (scoped.options == options).then_some(scoped.plan);
                ScopedFunction::assemble(
                    scoped.function,
                    scoped.requirements,
                    plan,
                    Some(&scoped.env),
                    mappings,
                    options,
                )
            }
        }
    }

    fn assemble(
        function: Rc<FunctionObject>,
        requirements: Rc<Requirements>,
        plan: Option<CapturePlan>,
        base: Option<&Environment>,
        mappings: &[Bindings],
        options: WrapOptions,
    ) -> Result<ScopedFunction, ScopeError> {
        let plan = match plan {
            Some(plan) => plan,
            None => CapturePlan::build(&function.code, options.method, options.transform_reach)?,
        };
        let (closures, globals) = (options.use_closures, options.use_globals);
        let env = match base {
            Some(base) => base.rebind(&requirements, &function, mappings, closures, globals),
            None => Environment::resolve(&requirements, &function, mappings, closures, globals),
        };
        debug!(
            function = %function.qualname(),
            method = %options.method,
            ready = env.is_complete(),
            "scoped function built"
        );
        Ok(ScopedFunction {
            function,
            requirements,
            env,
            options,
            plan,
        })
    }

    /// Call the body and capture its scope.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(function = %self.function.qualname(), method = %self.options.method)
    )]
    pub fn call(&self, args: Args) -> Result<Outcome, ScopeError> {
        if !self.env.missing.is_empty() {
            return Err(ScopeError::UnresolvedName {
                names: self.env.missing.iter().copied().collect(),
            });
        }
        let original = &self.function.code;
        let (code, capture) = self.plan.prepare(original);
        let globals = Globals::new(
            Namespace::from(self.env.globals.clone()),
            Rc::clone(&self.function.globals.builtins),
        );
        let closure = original
            .freevars
            .iter()
            .map(|name| Rc::new(ClosureCell::new(self.env.cells.get(name).cloned())))
            .collect();
        let runnable = Rc::new(FunctionObject {
            code,
            globals,
            defaults: self.function.defaults.clone(),
            kwdefaults: self.function.kwdefaults.clone(),
            closure,
        });
        let seed = ScopeSeed {
            outer: self.env.outer.clone(),
            closures: self.requirements.closures.clone(),
            options: self.options,
            function: Rc::clone(&original.qualname),
        };

        let value = capture
            .run(|| call_function(&runnable, &args.positional, &args.keywords))
            .map_err(ScopeError::from_body)?;
        match value {
            Value::Generator(generator) if original.is_generator() => Ok(Outcome::Generator(
                ScopeGenerator::new(generator, capture, seed),
            )),
            terminal => seed.scope(&capture, terminal).map(Outcome::Scope),
        }
    }

    /// A new wrapper with `mapping` layered over this one's environment.
    pub fn bind(&self, mapping: impl Into<Bindings>) -> Result<ScopedFunction, ScopeError> {
        self.bind_all(&[mapping.into()])
    }

    /// Layer several mappings; later ones win.
    pub fn bind_all(&self, mappings: &[Bindings]) -> Result<ScopedFunction, ScopeError> {
        ScopedFunction::new(self, mappings, self.options)
    }

    pub fn bind_kw<K, V, I>(&self, pairs: I) -> Result<ScopedFunction, ScopeError>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.bind(bindings(pairs))
    }

    pub fn status(&self) -> Status {
        if self.env.missing.is_empty() {
            Status::Ready
        } else {
            Status::Missing
        }
    }

    pub fn missing(&self) -> &NameSet {
        &self.env.missing
    }

    pub fn outer(&self) -> &Bindings {
        &self.env.outer
    }

    /// Required names left to the builtin table.
    pub fn builtin_names(&self) -> &NameSet {
        &self.env.builtins
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// The resolved method; never `Method::Default`.
    pub fn method(&self) -> Method {
        self.options.method
    }

    pub fn use_closures(&self) -> bool {
        self.options.use_closures
    }

    pub fn use_globals(&self) -> bool {
        self.options.use_globals
    }

    pub fn options(&self) -> WrapOptions {
        self.options
    }

    /// The wrapped function, unmodified.
    pub fn function(&self) -> &Rc<FunctionObject> {
        &self.function
    }
}

#[cfg(test)]
mod tests;

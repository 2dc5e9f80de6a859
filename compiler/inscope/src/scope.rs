//! The result of a wrapped call: a read-only view over outer and inner
//! bindings, plus the body's return value.

use std::fmt;
use std::ops::Index;
use std::rc::Rc;

use inscope_ir::Name;
use inscope_vm::{Generator, Resume, Value};

use crate::binder::Bindings;
use crate::capture::Capture;
use crate::config::{BindToOptions, WrapOptions};
use crate::errors::ScopeError;
use crate::resolver::NameSet;
use crate::scoped::{Args, IntoTarget, Outcome, ScopedFunction};

/// Outer and inner bindings of one finished call.
///
/// Lookups check the inner bindings first. Iteration lists every outer key,
/// then the inner keys not already listed. The return value is kept apart
/// from the mapping.
#[derive(Clone)]
pub struct ScopeResult {
    outer: Bindings,
    inner: Bindings,
    return_value: Value,
    options: WrapOptions,
}

impl ScopeResult {
    pub(crate) fn new(
        outer: Bindings,
        inner: Bindings,
        return_value: Value,
        options: WrapOptions,
    ) -> Self {
        ScopeResult {
            outer,
            inner,
            return_value,
            options,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_name(Name::intern(key))
    }

    pub fn get_name(&self, name: Name) -> Option<&Value> {
        self.inner.get(&name).or_else(|| self.outer.get(&name))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.outer.len() + self.inner_only().count()
    }

    pub fn is_empty(&self) -> bool {
        self.outer.is_empty() && self.inner.is_empty()
    }

    fn inner_only(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.inner
            .iter()
            .filter(|(name, _)| !self.outer.contains_key(*name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, &Value)> {
        self.outer
            .iter()
            .map(|(name, value)| (*name, self.inner.get(name).unwrap_or(value)))
            .chain(self.inner_only().map(|(name, value)| (*name, value)))
    }

    pub fn keys(&self) -> impl Iterator<Item = Name> + '_ {
        self.iter().map(|(name, _)| name)
    }

    /// Bindings inherited from the environment.
    pub fn outer(&self) -> &Bindings {
        &self.outer
    }

    /// Bindings made by the call; never includes closure variables.
    pub fn inner(&self) -> &Bindings {
        &self.inner
    }

    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// The whole view as one mapping, in iteration order.
    pub fn to_bindings(&self) -> Bindings {
        self.iter().map(|(name, value)| (name, value.clone())).collect()
    }

    /// Wrap `target` with this scope as its outer environment.
    pub fn bind_to(
        &self,
        target: impl IntoTarget,
        options: BindToOptions,
    ) -> Result<ScopedFunction, ScopeError> {
        ScopedFunction::new(target, &[self.to_bindings()], options.over(self.options))
    }

    /// [`bind_to`](Self::bind_to) with inherited options, then call.
    pub fn call(&self, target: impl IntoTarget, args: Args) -> Result<Outcome, ScopeError> {
        self.bind_to(target, BindToOptions::default())?.call(args)
    }

    /// Curried [`call`](Self::call): fix the arguments now, the function later.
    pub fn call_with<T: IntoTarget>(
        &self,
        args: Args,
    ) -> impl FnOnce(T) -> Result<Outcome, ScopeError> + '_ {
        move |target| self.call(target, args)
    }
}

impl Index<&str> for ScopeResult {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        match self.get(key) {
            Some(value) => value,
            None => panic!("name '{key}' is not in scope"),
        }
    }
}

impl PartialEq for ScopeResult {
    fn eq(&self, other: &ScopeResult) -> bool {
        self.to_bindings() == other.to_bindings()
    }
}

impl PartialEq<Bindings> for ScopeResult {
    fn eq(&self, other: &Bindings) -> bool {
        self.to_bindings() == *other
    }
}

impl From<&ScopeResult> for Bindings {
    fn from(scope: &ScopeResult) -> Self {
        scope.to_bindings()
    }
}

impl From<ScopeResult> for Bindings {
    fn from(scope: ScopeResult) -> Self {
        scope.to_bindings()
    }
}

impl fmt::Display for ScopeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", Value::dict_from_names(&self.to_bindings()).repr())
    }
}

impl fmt::Debug for ScopeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeResult")
            .field("outer", &self.outer)
            .field("inner", &self.inner)
            .field("return_value", &self.return_value)
            .finish()
    }
}

/// Everything needed to turn a terminal value into a [`ScopeResult`].
pub(crate) struct ScopeSeed {
    pub(crate) outer: Bindings,
    pub(crate) closures: NameSet,
    pub(crate) options: WrapOptions,
    pub(crate) function: Rc<str>,
}

impl ScopeSeed {
    pub(crate) fn scope(&self, capture: &Capture, terminal: Value) -> Result<ScopeResult, ScopeError> {
        let (return_value, mut inner) = capture.finish(terminal, &self.function)?;
        for name in &self.closures {
            inner.shift_remove(name);
        }
        Ok(ScopeResult::new(
            self.outer.clone(),
            inner,
            return_value,
            self.options,
        ))
    }
}

/// Lazy result of calling a wrapped generator body.
///
/// Yields the body's values. Once the body returns, [`scope`](Self::scope)
/// holds the final bindings and the `return` value. A generator abandoned
/// early never has a scope. The first error ends the iteration.
pub struct ScopeGenerator {
    generator: Rc<Generator>,
    capture: Capture,
    seed: ScopeSeed,
    scope: Option<ScopeResult>,
    done: bool,
}

impl ScopeGenerator {
    pub(crate) fn new(generator: Rc<Generator>, capture: Capture, seed: ScopeSeed) -> Self {
        ScopeGenerator {
            generator,
            capture,
            seed,
            scope: None,
            done: false,
        }
    }

    /// The terminal scope, once the body has returned.
    pub fn scope(&self) -> Option<&ScopeResult> {
        self.scope.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    /// Drain the remaining values and return the terminal scope.
    pub fn into_scope(mut self) -> Result<ScopeResult, ScopeError> {
        for item in self.by_ref() {
            item?;
        }
        self.scope.ok_or_else(|| ScopeError::MalformedCapture {
            function: self.seed.function.to_string(),
        })
    }
}

impl Iterator for ScopeGenerator {
    type Item = Result<Value, ScopeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let generator = &self.generator;
        match self.capture.run(|| generator.resume()) {
            Ok(Resume::Yielded(value)) => Some(Ok(value)),
            Ok(Resume::Returned(terminal)) => {
                self.done = true;
                match self.seed.scope(&self.capture, terminal) {
                    Ok(scope) => {
                        self.scope = Some(scope);
                        None
                    }
                    Err(err) => Some(Err(err)),
                }
            }
            Err(err) => {
                self.done = true;
                Some(Err(ScopeError::from_body(err)))
            }
        }
    }
}

#[cfg(test)]
mod tests;

//! Runtime values.
//!
//! Scalars are stored inline; everything else is reference counted. Lists
//! and dicts are shared and mutable (`Rc<RefCell<..>>`), tuples and strings
//! are shared and immutable.
//!
//! Equality ([`PartialEq`]) is structural for scalars and containers and
//! identity for objects (functions, classes, instances, generators, markers).

mod key;
mod objects;
mod repr;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use inscope_compile::{CodeObject, Constant, Marker};
use inscope_ir::Name;
use rustc_hash::FxBuildHasher;

use crate::errors::ExceptionKind;
use crate::generator::Generator;
use crate::interp::IterState;

pub use key::Key;
pub use objects::{
    BoundMethod, BuiltinFn, BuiltinFunction, ClassObject, ClosureCell, ExceptionValue,
    FunctionObject, Instance, RangeValue,
};

/// Insertion-ordered dict storage.
pub type DictMap = IndexMap<Key, Value, FxBuildHasher>;

/// Insertion-ordered name to value map.
pub type NameMap = IndexMap<Name, Value, FxBuildHasher>;

#[derive(Clone)]
pub enum Value {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<DictMap>>),
    Range(RangeValue),
    Function(Rc<FunctionObject>),
    Builtin(Rc<BuiltinFunction>),
    BoundMethod(Rc<BoundMethod>),
    Class(Rc<ClassObject>),
    Instance(Rc<Instance>),
    Generator(Rc<Generator>),
    Iterator(Rc<RefCell<IterState>>),
    Exception(Rc<ExceptionValue>),
    /// A builtin exception class such as `ValueError`.
    ExceptionType(ExceptionKind),
    /// Closure cell; only seen on the value stack while building closures.
    Cell(Rc<ClosureCell>),
    Marker(Marker),
    /// Code object; only seen on the value stack before `MakeFunction`.
    Code(Rc<CodeObject>),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn dict(map: DictMap) -> Value {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    /// Dict with string keys, in map order.
    pub fn dict_from_names(map: &NameMap) -> Value {
        let dict = map
            .iter()
            .map(|(name, value)| (Key::Str(Rc::from(name.as_str())), value.clone()))
            .collect();
        Value::dict(dict)
    }

    pub fn from_constant(constant: &Constant) -> Value {
        match constant {
            Constant::None => Value::None,
            Constant::Ellipsis => Value::Ellipsis,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(Rc::clone(s)),
            Constant::Code(code) => Value::Code(Rc::clone(code)),
            Constant::Names(names) => {
                Value::Tuple(names.iter().map(|n| Value::str(n.as_str())).collect())
            }
            Constant::Marker(marker) => Value::Marker(marker.clone()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Ellipsis => "ellipsis",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::BoundMethod(_) => "method",
            Value::Class(_) => "type",
            Value::Instance(i) => i.class.name.as_str(),
            Value::Generator(_) => "generator",
            Value::Iterator(_) => "iterator",
            Value::Exception(e) => e.kind.as_str(),
            Value::ExceptionType(_) => "type",
            Value::Cell(_) => "cell",
            Value::Marker(_) => "marker",
            Value::Code(_) => "code",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(map) => !map.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            _ => true,
        }
    }

    /// `is` comparison.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
            _ => self.is_same_object(other),
        }
    }

    fn is_same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Generator(a), Value::Generator(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            (Value::Exception(a), Value::Exception(b)) => Rc::ptr_eq(a, b),
            (Value::ExceptionType(a), Value::ExceptionType(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => Rc::ptr_eq(a, b),
            (Value::Code(a), Value::Code(b)) => Rc::ptr_eq(a, b),
            (Value::Marker(a), Value::Marker(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_function(&self) -> Option<&Rc<FunctionObject>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a tuple, if this is one.
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and comparisons; bools count as ints.
    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)] // mixed arithmetic widens ints to floats
    pub(crate) fn to_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => a == b,
                _ => a.to_f64() == b.to_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Range(a), Value::Range(b)) => a == b,
            _ => self.is_same_object(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Rc<FunctionObject>> for Value {
    fn from(f: Rc<FunctionObject>) -> Self {
        Value::Function(f)
    }
}

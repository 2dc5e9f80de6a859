//! Hashable dict keys.

use std::rc::Rc;

use super::Value;
use crate::errors::{type_error, VmError};

/// The hashable subset of [`Value`]: scalars, strings and tuples of keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    None,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
    Tuple(Rc<[Key]>),
}

impl Key {
    pub fn from_value(value: &Value) -> Result<Key, VmError> {
        match value {
            Value::None => Ok(Key::None),
            Value::Bool(b) => Ok(Key::Bool(*b)),
            Value::Int(i) => Ok(Key::Int(*i)),
            Value::Str(s) => Ok(Key::Str(Rc::clone(s))),
            Value::Tuple(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Result<Rc<[Key]>, _>>()
                .map(Key::Tuple),
            other => Err(type_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::None => Value::None,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Str(s) => Value::Str(Rc::clone(s)),
            Key::Tuple(items) => Value::Tuple(items.iter().map(Key::to_value).collect()),
        }
    }

    pub fn str(s: &str) -> Key {
        Key::Str(Rc::from(s))
    }
}

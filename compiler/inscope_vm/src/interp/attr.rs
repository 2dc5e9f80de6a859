//! Attribute and subscript access.

use std::rc::Rc;

use inscope_ir::Name;

use crate::builtins::method;
use crate::errors::{
    attribute_error, class_attribute_error, index_error, key_error, type_error, VmError,
};
use crate::value::{BoundMethod, Key, Number, Value};

pub(crate) fn get_attr(object: &Value, name: Name) -> Result<Value, VmError> {
    match object {
        Value::Instance(instance) => {
            if let Some(value) = instance.attrs.borrow().get(&name) {
                return Ok(value.clone());
            }
            match instance.class.lookup(name) {
                Some(function @ Value::Function(_)) => Ok(bind(object, function)),
                Some(value) => Ok(value),
                None => Err(attribute_error(instance.class.name.as_str(), name)),
            }
        }
        Value::Class(class) => match (class.lookup(name), name.as_str()) {
            (Some(value), _) => Ok(value),
            (None, "__name__") => Ok(Value::str(class.name.as_str())),
            (None, _) => Err(class_attribute_error(class.name, name)),
        },
        Value::Function(function) => match name.as_str() {
            "__name__" => Ok(Value::str(function.name().as_str())),
            "__qualname__" => Ok(Value::str(function.qualname())),
            _ => Err(attribute_error("function", name)),
        },
        Value::Exception(exception) => match name.as_str() {
            "args" => Ok(Value::tuple(vec![Value::str(&exception.message)])),
            _ => Err(attribute_error(exception.kind.as_str(), name)),
        },
        other => method(other, name)
            .map(|builtin| bind(other, Value::Builtin(builtin)))
            .ok_or_else(|| attribute_error(other.type_name(), name)),
    }
}

fn bind(receiver: &Value, function: Value) -> Value {
    Value::BoundMethod(Rc::new(BoundMethod {
        receiver: receiver.clone(),
        function,
    }))
}

pub(crate) fn set_attr(object: &Value, name: Name, value: Value) -> Result<(), VmError> {
    match object {
        Value::Instance(instance) => {
            instance.attrs.borrow_mut().insert(name, value);
            Ok(())
        }
        Value::Class(class) => {
            class.namespace.set(name, value);
            Ok(())
        }
        other => Err(attribute_error(other.type_name(), name)),
    }
}

/// Resolve a possibly negative index against `len`.
fn normalize_index(index: &Value, len: usize, what: &str) -> Result<usize, VmError> {
    let Some(Number::Int(i)) = index.as_number() else {
        return Err(type_error(format!(
            "{what} indices must be integers, not {}",
            index.type_name()
        )));
    };
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if i < 0 { i + len_i } else { i };
    usize::try_from(resolved)
        .ok()
        .filter(|&r| r < len)
        .ok_or_else(|| index_error(format!("{what} index out of range")))
}

pub(crate) fn get_item(container: &Value, index: &Value) -> Result<Value, VmError> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let at = normalize_index(index, items.len(), "list")?;
            Ok(items[at].clone())
        }
        Value::Tuple(items) => {
            let at = normalize_index(index, items.len(), "tuple")?;
            Ok(items[at].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let at = normalize_index(index, chars.len(), "string")?;
            Ok(Value::str(chars[at].encode_utf8(&mut [0; 4])))
        }
        Value::Range(range) => {
            let at = normalize_index(index, range.len(), "range object")?;
            range
                .get(at)
                .map(Value::Int)
                .ok_or_else(|| index_error("range object index out of range"))
        }
        Value::Dict(map) => {
            let key = Key::from_value(index)?;
            map.borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| key_error(index.repr()))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

pub(crate) fn set_item(container: &Value, index: &Value, value: Value) -> Result<(), VmError> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let at = normalize_index(index, items.len(), "list assignment")?;
            items[at] = value;
            Ok(())
        }
        Value::Dict(map) => {
            map.borrow_mut().insert(Key::from_value(index)?, value);
            Ok(())
        }
        other => Err(type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

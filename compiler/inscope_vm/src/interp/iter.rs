//! Iteration protocol.

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{not_iterable, VmError};
use crate::value::{RangeValue, Value};

/// Cursor state behind a `Value::Iterator`.
///
/// `Enumerate` and `Zip` hold their sources as iterator values (`Iterator`
/// or `Generator`).
pub enum IterState {
    /// Live view over a list; sees appends made during iteration.
    List {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    Items {
        items: Rc<[Value]>,
        index: usize,
    },
    Range {
        range: RangeValue,
        index: usize,
    },
    Enumerate {
        inner: Value,
        count: i64,
    },
    Zip {
        inners: Vec<Value>,
    },
}

impl IterState {
    pub(crate) fn into_value(self) -> Value {
        Value::Iterator(Rc::new(RefCell::new(self)))
    }

    fn step(&mut self) -> Result<Option<Value>, VmError> {
        match self {
            IterState::List { items, index } => {
                let item = items.borrow().get(*index).cloned();
                *index += usize::from(item.is_some());
                Ok(item)
            }
            IterState::Items { items, index } => {
                let item = items.get(*index).cloned();
                *index += usize::from(item.is_some());
                Ok(item)
            }
            IterState::Range { range, index } => {
                let item = range.get(*index).map(Value::Int);
                *index += usize::from(item.is_some());
                Ok(item)
            }
            IterState::Enumerate { inner, count } => match next_item(inner)? {
                Some(item) => {
                    let pair = Value::tuple(vec![Value::Int(*count), item]);
                    *count += 1;
                    Ok(Some(pair))
                }
                None => Ok(None),
            },
            IterState::Zip { inners } => {
                if inners.is_empty() {
                    return Ok(None);
                }
                let mut row = Vec::with_capacity(inners.len());
                for inner in inners.iter() {
                    match next_item(inner)? {
                        Some(item) => row.push(item),
                        None => return Ok(None),
                    }
                }
                Ok(Some(Value::tuple(row)))
            }
        }
    }
}

/// `iter(value)`.
pub(crate) fn make_iter(value: &Value) -> Result<Value, VmError> {
    let state = match value {
        Value::List(items) => IterState::List {
            items: Rc::clone(items),
            index: 0,
        },
        Value::Tuple(items) => IterState::Items {
            items: Rc::clone(items),
            index: 0,
        },
        Value::Str(s) => IterState::Items {
            items: s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect(),
            index: 0,
        },
        // Keys are snapshotted; mutating the dict mid-loop doesn't disturb iteration.
        Value::Dict(map) => IterState::Items {
            items: map.borrow().keys().map(|k| k.to_value()).collect(),
            index: 0,
        },
        Value::Range(range) => IterState::Range {
            range: *range,
            index: 0,
        },
        Value::Iterator(_) | Value::Generator(_) => return Ok(value.clone()),
        other => return Err(not_iterable(other)),
    };
    Ok(state.into_value())
}

/// Advance an iterator value; `None` once exhausted.
pub(crate) fn next_item(iter: &Value) -> Result<Option<Value>, VmError> {
    match iter {
        Value::Iterator(state) => state.borrow_mut().step(),
        Value::Generator(generator) => generator.next_value(),
        other => Err(not_iterable(other)),
    }
}

/// Drain any iterable into a vector.
pub(crate) fn collect_iterable(value: &Value) -> Result<Vec<Value>, VmError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        _ => {
            let iter = make_iter(value)?;
            let mut items = Vec::new();
            while let Some(item) = next_item(&iter)? {
                items.push(item);
            }
            Ok(items)
        }
    }
}

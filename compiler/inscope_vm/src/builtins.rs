//! Builtin functions, methods and exception classes.
//!
//! Builtins are plain function pointers ([`BuiltinFn`]); methods take
//! their receiver as the first positional argument and are bound on
//! attribute access.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use inscope_ir::ast::BinaryOp;
use inscope_ir::Name;

use crate::errors::{
    index_error, integer_overflow, stop_iteration, type_error, value_error, ExceptionKind,
    VmError, VmResult,
};
use crate::interp::{
    binary, build_class, collect_iterable, make_iter, next_item, order, IterState,
};
use crate::namespace::Builtins;
use crate::value::{
    BuiltinFn, BuiltinFunction, ClassObject, DictMap, Key, NameMap, Number, RangeValue, Value,
};

fn builtin(name: &'static str, func: BuiltinFn) -> Rc<BuiltinFunction> {
    Rc::new(BuiltinFunction { name, func })
}

/// The builtin namespace installed in every runtime.
pub(crate) fn builtin_table() -> NameMap {
    let functions: [(&'static str, BuiltinFn); 21] = [
        ("print", print),
        ("len", len),
        ("min", min),
        ("max", max),
        ("abs", abs),
        ("sum", sum),
        ("range", range),
        ("list", list),
        ("tuple", tuple),
        ("dict", dict),
        ("str", str),
        ("int", int),
        ("float", float),
        ("bool", bool),
        ("repr", repr),
        ("next", next),
        ("iter", iter),
        ("sorted", sorted),
        ("enumerate", enumerate),
        ("zip", zip),
        ("isinstance", isinstance),
    ];
    let mut table: NameMap = functions
        .into_iter()
        .map(|(name, func)| (Name::intern(name), Value::Builtin(builtin(name, func))))
        .collect();
    for kind in ExceptionKind::ALL {
        table.insert(Name::intern(kind.as_str()), Value::ExceptionType(kind));
    }
    table
}

/// The callable pushed by `LoadBuildClass`.
pub(crate) fn build_class_builtin() -> Value {
    Value::Builtin(builtin("__build_class__", build_class_entry))
}

/// `__build_class__(body, name, *bases)`.
fn build_class_entry(_: &Rc<Builtins>, args: &[Value], _: &[(Name, Value)]) -> VmResult {
    let [Value::Function(body), Value::Str(name), bases @ ..] = args else {
        return Err(type_error("__build_class__: expected a class body and a name"));
    };
    let bases = bases
        .iter()
        .map(|base| match base {
            Value::Class(class) => Ok(Rc::clone(class)),
            other => Err(type_error(format!(
                "class bases must be classes, not '{}'",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<Rc<ClassObject>>, _>>()?;
    build_class(body, Name::intern(name), bases)
}

/// Builtin method `name` of `receiver`'s type.
pub(crate) fn method(receiver: &Value, name: Name) -> Option<Rc<BuiltinFunction>> {
    let (label, func): (&'static str, BuiltinFn) = match (receiver, name.as_str()) {
        (Value::List(_), "append") => ("append", list_append),
        (Value::List(_), "pop") => ("pop", list_pop),
        (Value::Dict(_), "get") => ("get", dict_get),
        (Value::Dict(_), "keys") => ("keys", dict_keys),
        (Value::Dict(_), "values") => ("values", dict_values),
        (Value::Dict(_), "items") => ("items", dict_items),
        (Value::Str(_), "upper") => ("upper", str_upper),
        (Value::Str(_), "lower") => ("lower", str_lower),
        (Value::Str(_), "join") => ("join", str_join),
        _ => return None,
    };
    Some(builtin(label, func))
}

// Argument checking

fn no_kwargs(name: &str, kwargs: &[(Name, Value)]) -> VmResult<()> {
    match kwargs.first() {
        Some((key, _)) => Err(type_error(format!(
            "{name}() got an unexpected keyword argument '{key}'"
        ))),
        None => Ok(()),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> VmResult<()> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let (bound, n) = if min == max {
        ("exactly", min)
    } else if args.len() < min {
        ("at least", min)
    } else {
        ("at most", max)
    };
    Err(type_error(format!(
        "{name}() takes {bound} {n} argument{} ({} given)",
        if n == 1 { "" } else { "s" },
        args.len()
    )))
}

/// Positional-only call with `min..=max` arguments.
fn positional<'a>(
    name: &str,
    args: &'a [Value],
    kwargs: &[(Name, Value)],
    min: usize,
    max: usize,
) -> VmResult<&'a [Value]> {
    no_kwargs(name, kwargs)?;
    arity(name, args, min, max)?;
    Ok(args)
}

fn int_arg(name: &str, value: &Value) -> VmResult<i64> {
    match value.as_number() {
        Some(Number::Int(i)) => Ok(i),
        _ => Err(type_error(format!(
            "{name}() argument must be an int, not '{}'",
            value.type_name()
        ))),
    }
}

fn receiver_list(args: &[Value]) -> VmResult<&Rc<RefCell<Vec<Value>>>> {
    match args.first() {
        Some(Value::List(items)) => Ok(items),
        _ => Err(type_error("descriptor requires a 'list' object")),
    }
}

fn receiver_dict(args: &[Value]) -> VmResult<&Rc<RefCell<DictMap>>> {
    match args.first() {
        Some(Value::Dict(map)) => Ok(map),
        _ => Err(type_error("descriptor requires a 'dict' object")),
    }
}

fn receiver_str(args: &[Value]) -> VmResult<&str> {
    match args.first() {
        Some(Value::Str(s)) => Ok(s),
        _ => Err(type_error("descriptor requires a 'str' object")),
    }
}

fn usize_to_int(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

// Functions

fn print(builtins: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let mut sep = " ".to_string();
    let mut end = "\n".to_string();
    for (key, value) in kwargs {
        let slot = match key.as_str() {
            "sep" => &mut sep,
            "end" => &mut end,
            _ => {
                return Err(type_error(format!(
                    "print() got an unexpected keyword argument '{key}'"
                )))
            }
        };
        match value {
            Value::None => {}
            Value::Str(s) => *slot = s.to_string(),
            other => {
                return Err(type_error(format!(
                    "{key} must be None or a string, not {}",
                    other.type_name()
                )))
            }
        }
    }
    let line = args
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(&sep);
    builtins.print.print(&line);
    builtins.print.print(&end);
    Ok(Value::None)
}

fn len(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let [value] = positional("len", args, kwargs, 1, 1)? else {
        return Err(type_error("len() takes exactly one argument"));
    };
    let n = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(map) => map.borrow().len(),
        Value::Range(range) => range.len(),
        other => {
            return Err(type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(usize_to_int(n))
}

fn extreme(
    name: &str,
    args: &[Value],
    kwargs: &[(Name, Value)],
    want: Ordering,
) -> VmResult {
    no_kwargs(name, kwargs)?;
    let items = match args {
        [] => return Err(type_error(format!("{name} expected at least 1 argument, got 0"))),
        [iterable] => collect_iterable(iterable)?,
        many => many.to_vec(),
    };
    let mut items = items.into_iter();
    let mut best = items
        .next()
        .ok_or_else(|| value_error(format!("{name}() arg is an empty sequence")))?;
    for item in items {
        let ordering = order(&item, &best).ok_or_else(|| {
            type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                if want == Ordering::Less { "<" } else { ">" },
                item.type_name(),
                best.type_name()
            ))
        })?;
        if ordering == want {
            best = item;
        }
    }
    Ok(best)
}

fn min(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    extreme("min", args, kwargs, Ordering::Less)
}

fn max(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    extreme("max", args, kwargs, Ordering::Greater)
}

fn abs(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let [value] = positional("abs", args, kwargs, 1, 1)? else {
        return Err(type_error("abs() takes exactly one argument"));
    };
    match value.as_number() {
        Some(Number::Int(i)) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| integer_overflow("abs")),
        Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(type_error(format!(
            "bad operand type for abs(): '{}'",
            value.type_name()
        ))),
    }
}

fn sum(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("sum", args, kwargs, 1, 2)?;
    let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
    for item in collect_iterable(&args[0])? {
        total = binary(BinaryOp::Add, &total, &item)?;
    }
    Ok(total)
}

fn range(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("range", args, kwargs, 1, 3)?;
    let ints = args
        .iter()
        .map(|a| int_arg("range", a))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(type_error("range expected at most 3 arguments")),
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(RangeValue { start, stop, step }))
}

fn list(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("list", args, kwargs, 0, 1)?;
    match args.first() {
        Some(iterable) => Ok(Value::list(collect_iterable(iterable)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

fn tuple(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("tuple", args, kwargs, 0, 1)?;
    match args.first() {
        Some(Value::Tuple(items)) => Ok(Value::Tuple(Rc::clone(items))),
        Some(iterable) => Ok(Value::tuple(collect_iterable(iterable)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn dict(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    arity("dict", args, 0, 1)?;
    let mut map = DictMap::default();
    match args.first() {
        Some(Value::Dict(source)) => {
            map.extend(source.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Some(pairs) => {
            for pair in collect_iterable(pairs)? {
                let [key, value]: [Value; 2] = collect_iterable(&pair)?.try_into().map_err(|_| {
                    value_error("dictionary update sequence element has wrong length")
                })?;
                map.insert(Key::from_value(&key)?, value);
            }
        }
        None => {}
    }
    for (key, value) in kwargs {
        map.insert(Key::str(key.as_str()), value.clone());
    }
    Ok(Value::dict(map))
}

fn str(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("str", args, kwargs, 0, 1)?;
    Ok(match args.first() {
        Some(value) => Value::str(&value.to_display_string()),
        None => Value::str(""),
    })
}

fn repr(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let [value] = positional("repr", args, kwargs, 1, 1)? else {
        return Err(type_error("repr() takes exactly one argument"));
    };
    Ok(Value::str(&value.repr()))
}

#[allow(clippy::cast_possible_truncation)] // int(x) truncates toward zero by definition
fn int(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("int", args, kwargs, 0, 1)?;
    match args.first() {
        None => Ok(Value::Int(0)),
        Some(text @ Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            value_error(format!(
                "invalid literal for int() with base 10: {}",
                text.repr()
            ))
        }),
        Some(value) => match value.as_number() {
            Some(Number::Int(i)) => Ok(Value::Int(i)),
            Some(Number::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
            Some(Number::Float(_)) => Err(value_error(
                "cannot convert float NaN or infinity to integer",
            )),
            None => Err(type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                value.type_name()
            ))),
        },
    }
}

fn float(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("float", args, kwargs, 0, 1)?;
    match args.first() {
        None => Ok(Value::Float(0.0)),
        Some(text @ Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            value_error(format!("could not convert string to float: {}", text.repr()))
        }),
        Some(value) => value
            .as_number()
            .map(|n| Value::Float(n.to_f64()))
            .ok_or_else(|| {
                type_error(format!(
                    "float() argument must be a string or a number, not '{}'",
                    value.type_name()
                ))
            }),
    }
}

fn bool(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("bool", args, kwargs, 0, 1)?;
    Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
}

fn next(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("next", args, kwargs, 1, 2)?;
    if !matches!(args[0], Value::Iterator(_) | Value::Generator(_)) {
        return Err(type_error(format!(
            "'{}' object is not an iterator",
            args[0].type_name()
        )));
    }
    match (next_item(&args[0])?, args.get(1)) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(stop_iteration()),
    }
}

fn iter(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("iter", args, kwargs, 1, 1)?;
    make_iter(&args[0])
}

fn sorted(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    arity("sorted", args, 1, 1)?;
    let mut reverse = false;
    for (key, value) in kwargs {
        match key.as_str() {
            "reverse" => reverse = value.is_truthy(),
            _ => {
                return Err(type_error(format!(
                    "sorted() got an unexpected keyword argument '{key}'"
                )))
            }
        }
    }
    let mut items = collect_iterable(&args[0])?;
    let mut mismatch = None;
    items.sort_by(|a, b| {
        order(a, b).unwrap_or_else(|| {
            mismatch.get_or_insert_with(|| {
                type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                ))
            });
            Ordering::Equal
        })
    });
    if let Some(err) = mismatch {
        return Err(err);
    }
    if reverse {
        items.reverse();
    }
    Ok(Value::list(items))
}

fn enumerate(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    arity("enumerate", args, 1, 1)?;
    let mut count = 0;
    for (key, value) in kwargs {
        match key.as_str() {
            "start" => count = int_arg("enumerate", value)?,
            _ => {
                return Err(type_error(format!(
                    "enumerate() got an unexpected keyword argument '{key}'"
                )))
            }
        }
    }
    Ok(IterState::Enumerate {
        inner: make_iter(&args[0])?,
        count,
    }
    .into_value())
}

fn zip(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    no_kwargs("zip", kwargs)?;
    let inners = args.iter().map(make_iter).collect::<Result<Vec<_>, _>>()?;
    Ok(IterState::Zip { inners }.into_value())
}

fn isinstance(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let [object, class] = positional("isinstance", args, kwargs, 2, 2)? else {
        return Err(type_error("isinstance expected 2 arguments"));
    };
    Ok(Value::Bool(is_instance(object, class)?))
}

fn is_instance(object: &Value, class: &Value) -> VmResult<bool> {
    match class {
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(object, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Class(class) => Ok(match object {
            Value::Instance(instance) => instance.class.is_subclass_of(class),
            _ => false,
        }),
        Value::ExceptionType(kind) => Ok(match object {
            Value::Exception(exception) => exception.kind.is_subclass_of(*kind),
            _ => false,
        }),
        Value::Builtin(function) => {
            let type_name = object.type_name();
            Ok(match function.name {
                "int" => matches!(object, Value::Int(_) | Value::Bool(_)),
                "list" | "tuple" | "dict" | "str" | "float" | "bool" | "range" => {
                    function.name == type_name
                }
                _ => return Err(isinstance_arg_error()),
            })
        }
        _ => Err(isinstance_arg_error()),
    }
}

fn isinstance_arg_error() -> VmError {
    type_error("isinstance() arg 2 must be a type or tuple of types")
}

// Methods

fn list_append(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("append", args, kwargs, 2, 2)?;
    receiver_list(args)?.borrow_mut().push(args[1].clone());
    Ok(Value::None)
}

fn list_pop(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("pop", args, kwargs, 1, 2)?;
    let mut items = receiver_list(args)?.borrow_mut();
    if items.is_empty() {
        return Err(index_error("pop from empty list"));
    }
    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let index = match args.get(1) {
        Some(index) => int_arg("pop", index)?,
        None => -1,
    };
    let resolved = if index < 0 { index + len } else { index };
    let at = usize::try_from(resolved)
        .ok()
        .filter(|&at| at < items.len())
        .ok_or_else(|| index_error("pop index out of range"))?;
    Ok(items.remove(at))
}

fn dict_get(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("get", args, kwargs, 2, 3)?;
    let key = Key::from_value(&args[1])?;
    let found = receiver_dict(args)?.borrow().get(&key).cloned();
    Ok(found.or_else(|| args.get(2).cloned()).unwrap_or(Value::None))
}

fn dict_keys(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("keys", args, kwargs, 1, 1)?;
    let keys = receiver_dict(args)?.borrow().keys().map(Key::to_value).collect();
    Ok(Value::list(keys))
}

fn dict_values(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("values", args, kwargs, 1, 1)?;
    let values = receiver_dict(args)?.borrow().values().cloned().collect();
    Ok(Value::list(values))
}

fn dict_items(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("items", args, kwargs, 1, 1)?;
    let items = receiver_dict(args)?
        .borrow()
        .iter()
        .map(|(k, v)| Value::tuple(vec![k.to_value(), v.clone()]))
        .collect();
    Ok(Value::list(items))
}

fn str_upper(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("upper", args, kwargs, 1, 1)?;
    Ok(Value::str(&receiver_str(args)?.to_uppercase()))
}

fn str_lower(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("lower", args, kwargs, 1, 1)?;
    Ok(Value::str(&receiver_str(args)?.to_lowercase()))
}

fn str_join(_: &Rc<Builtins>, args: &[Value], kwargs: &[(Name, Value)]) -> VmResult {
    let args = positional("join", args, kwargs, 2, 2)?;
    let sep = receiver_str(args)?;
    let parts = collect_iterable(&args[1])?
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Str(s) => Ok(s.to_string()),
            other => Err(type_error(format!(
                "sequence item {i}: expected str instance, {} found",
                other.type_name()
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::str(&parts.join(sep)))
}

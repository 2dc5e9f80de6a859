//! `repr()` and `str()` renderings.

use std::fmt::{self, Write as _};

use super::{Key, Value};

impl Value {
    /// Source-like `repr`: strings quoted, containers recursive.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write_repr(&mut out, self);
        out
    }

    /// Display form: strings render raw, everything else as `repr`.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Exception(e) => e.message.clone(),
            other => other.repr(),
        }
    }
}

fn write_repr(out: &mut String, value: &Value) -> fmt::Result {
    match value {
        Value::None => out.write_str("None"),
        Value::Ellipsis => out.write_str("Ellipsis"),
        Value::Bool(true) => out.write_str("True"),
        Value::Bool(false) => out.write_str("False"),
        Value::Int(i) => write!(out, "{i}"),
        Value::Float(f) => write_float(out, *f),
        Value::Str(s) => write_str_literal(out, s),
        Value::List(items) => {
            out.push('[');
            write_items(out, &items.borrow())?;
            out.push(']');
            Ok(())
        }
        Value::Tuple(items) => {
            out.push('(');
            write_items(out, items)?;
            if items.len() == 1 {
                out.push(',');
            }
            out.push(')');
            Ok(())
        }
        Value::Dict(map) => {
            out.push('{');
            for (i, (key, value)) in map.borrow().iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_key(out, key)?;
                out.push_str(": ");
                write_repr(out, value)?;
            }
            out.push('}');
            Ok(())
        }
        Value::Range(r) => {
            if r.step == 1 {
                write!(out, "range({}, {})", r.start, r.stop)
            } else {
                write!(out, "range({}, {}, {})", r.start, r.stop, r.step)
            }
        }
        Value::Function(f) => write!(out, "<function {}>", f.qualname()),
        Value::Builtin(b) => write!(out, "<built-in function {}>", b.name),
        Value::BoundMethod(m) => match &m.function {
            Value::Function(f) => write!(
                out,
                "<bound method {} of {}>",
                f.qualname(),
                m.receiver.repr()
            ),
            Value::Builtin(b) => write!(
                out,
                "<built-in method {} of {} object>",
                b.name,
                m.receiver.type_name()
            ),
            other => write!(out, "<bound method {}>", other.repr()),
        },
        Value::Class(c) => write!(out, "<class '{}'>", c.name),
        Value::Instance(i) => write!(out, "<{} object>", i.class.name),
        Value::Generator(g) => write!(out, "<generator object {}>", g.qualname()),
        Value::Iterator(_) => out.write_str("<iterator>"),
        Value::Exception(e) => {
            write!(out, "{}(", e.kind)?;
            if !e.message.is_empty() {
                write_str_literal(out, &e.message)?;
            }
            out.push(')');
            Ok(())
        }
        Value::ExceptionType(kind) => write!(out, "<class '{kind}'>"),
        Value::Cell(_) => out.write_str("<cell>"),
        Value::Marker(m) => write!(out, "{m}"),
        Value::Code(c) => write!(out, "<code object {}>", c.qualname),
    }
}

fn write_items(out: &mut String, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_repr(out, item)?;
    }
    Ok(())
}

fn write_key(out: &mut String, key: &Key) -> fmt::Result {
    write_repr(out, &key.to_value())
}

fn write_float(out: &mut String, f: f64) -> fmt::Result {
    if f.is_nan() {
        out.write_str("nan")
    } else if f.is_infinite() {
        out.write_str(if f > 0.0 { "inf" } else { "-inf" })
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        write!(out, "{f:.1}")
    } else {
        write!(out, "{f}")
    }
}

fn write_str_literal(out: &mut String, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    Ok(())
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

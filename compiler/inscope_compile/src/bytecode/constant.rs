//! Constant pool entries.

use std::fmt;
use std::rc::Rc;

use inscope_ir::Name;

use super::CodeObject;

/// An entry of a code object's constant pool.
#[derive(Clone, Debug)]
pub enum Constant {
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Code(Rc<CodeObject>),
    /// Keyword names consumed by `CallKw`.
    Names(Rc<[Name]>),
    Marker(Marker),
}

impl Constant {
    /// Whether two constants may share one pool slot.
    ///
    /// Floats compare by bit pattern so `0.0` and `-0.0` stay distinct;
    /// code objects and markers compare by identity.
    pub fn same_slot(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::None, Constant::None) | (Constant::Ellipsis, Constant::Ellipsis) => true,
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Str(a), Constant::Str(b)) => a == b,
            (Constant::Names(a), Constant::Names(b)) => a == b,
            (Constant::Code(a), Constant::Code(b)) => Rc::ptr_eq(a, b),
            (Constant::Marker(a), Constant::Marker(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::None => f.write_str("None"),
            Constant::Ellipsis => f.write_str("Ellipsis"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Str(s) => write!(f, "{s:?}"),
            Constant::Code(code) => write!(f, "<code {}>", code.qualname),
            Constant::Names(names) => {
                f.write_str("(")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}", name.as_str())?;
                }
                f.write_str(")")
            }
            Constant::Marker(marker) => write!(f, "{marker}"),
        }
    }
}

/// An object that is only ever equal to itself.
///
/// Clones share identity; two separately created markers never compare
/// equal, whatever their labels.
#[derive(Clone)]
pub struct Marker(Rc<str>);

impl Marker {
    pub fn new(label: &str) -> Self {
        Marker(Rc::from(label))
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Marker {}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker({:?} @ {:p})", &*self.0, Rc::as_ptr(&self.0))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<marker {}>", self.0)
    }
}

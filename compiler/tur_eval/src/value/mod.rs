//! Runtime values.
//!
//! Every heap variant is `Arc`-shared, so cloning a value is O(1) and values
//! move freely between task threads. Lists are immutable once built.
//!
//! # Equality
//!
//! `PartialEq` is the language's equality: primitives compare by value (ints
//! and floats numerically), lists element-wise, everything else by identity.
//! The flow scheduler decides whether a cell changed with the stricter
//! [`Value::same_as`].

mod native;
mod object;

use std::fmt;
use std::sync::Arc;

use tur_ir::{Command, Name};

use crate::callable::FunctionValue;
use crate::channel::Channel;
use crate::errors::EvalError;
use crate::task::TaskHandle;

pub use native::{NativeFn, NativeFunction};
pub use object::{ClassValue, FieldProvider, ObjectValue};
pub(crate) use object::require_field;

/// Runtime value.
#[derive(Clone)]
pub enum Value {
    /// Absent value (`none`).
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Object(ObjectValue),
    Class(ClassValue),
    /// Closure, macro or chain, possibly curried.
    Function(FunctionValue),
    /// A callable implemented in Rust.
    Native(NativeFunction),
    Task(TaskHandle),
    Channel(Channel),
    /// An unevaluated macro argument.
    Command(Arc<Command>),
    /// A captured failure (`get_err`, exception messages).
    Error(Arc<EvalError>),
    /// A flow control marker returned by a cell.
    Sentinel(Sentinel),
}

/// Markers a flow cell returns instead of a value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sentinel {
    /// `fini`: the cell is done. It keeps its last value and is never
    /// scheduled again.
    Fini,
    /// `non_mutat`: this run leaves the cell's value alone and schedules
    /// nothing.
    NonMutat,
}

impl Sentinel {
    pub fn name(self) -> &'static str {
        match self {
            Sentinel::Fini => "fini",
            Sentinel::NonMutat => "non_mutat",
        }
    }
}

impl Value {
    /// Create a string value.
    #[inline]
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Create a list value.
    #[inline]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Create an error value.
    #[inline]
    pub fn error(err: EvalError) -> Self {
        Value::Error(Arc::new(err))
    }

    /// Type name used in messages and type declarations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "num",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "lst",
            Value::Object(_) => "obj",
            Value::Class(_) => "cls",
            Value::Function(f) if f.is_macro() => "macro",
            Value::Function(_) | Value::Native(_) => "fn",
            Value::Task(_) => "task",
            Value::Channel(_) => "que",
            Value::Command(_) => "command",
            Value::Error(_) => "err",
            Value::Sentinel(_) => "sentinel",
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Truthiness for conditions: `none`, `false`, zero and empty
    /// strings/lists are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// Integer view, accepting whole floats.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            #[expect(
                clippy::cast_possible_truncation,
                reason = "guarded by the fract() check"
            )]
            Value::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            _ => None,
        }
    }

    /// Float view, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            #[expect(clippy::cast_precision_loss, reason = "numeric widening")]
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Whether a flow cell producing `other` after `self` left its value
    /// unchanged. Unlike `==`, numbers must agree in type and a NaN is the
    /// same as any other NaN.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => false,
            (Value::Float(a), Value::Float(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::List(a), Value::List(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y)))
            }
            _ => self == other,
        }
    }

    /// Field-provider view of this value, if it has fields.
    pub fn as_field_provider(&self) -> Option<&dyn FieldProvider> {
        match self {
            Value::Object(obj) => Some(obj),
            Value::Class(cls) => Some(cls),
            Value::Task(task) => Some(task),
            Value::Channel(channel) => Some(channel),
            Value::Function(func) => Some(&**func),
            _ => None,
        }
    }

    /// Whether this value accepts one of the declared type names.
    /// An empty declaration accepts everything.
    pub fn fits(&self, types: &[Name]) -> bool {
        types.is_empty() || types.iter().any(|t| self.fits_type(t.as_str()))
    }

    fn fits_type(&self, type_name: &str) -> bool {
        match type_name {
            "any" => true,
            "some" => !self.is_none(),
            "fn" => matches!(self, Value::Function(_) | Value::Native(_)),
            builtin if self.type_name() == builtin => true,
            class_name => match self {
                Value::Object(obj) => obj
                    .class()
                    .is_some_and(|cls| cls.is_subclass_of(class_name)),
                _ => false,
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            (Value::Task(a), Value::Task(b)) => a.ptr_eq(b),
            (Value::Channel(a), Value::Channel(b)) => a.ptr_eq(b),
            (Value::Command(a), Value::Command(b)) => Arc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Arc::ptr_eq(a, b),
            (Value::Sentinel(a), Value::Sentinel(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value], debug: bool) -> fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        if debug {
            write!(f, "{item:?}")?;
        } else {
            write!(f, "{item}")?;
        }
    }
    write!(f, "]")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => write_list(f, items, false),
            Value::Object(obj) => write!(f, "{obj}"),
            Value::Class(cls) => write!(f, "class {}", cls.name()),
            Value::Function(func) => write!(f, "fn {}", func.name()),
            Value::Native(native) => write!(f, "native {}", native.name()),
            Value::Task(task) => write!(f, "task {}", task.name()),
            Value::Channel(_) => write!(f, "channel"),
            Value::Command(_) => write!(f, "<command>"),
            Value::Error(err) => write!(f, "{err}"),
            Value::Sentinel(sentinel) => write!(f, "{}", sentinel.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => write_list(f, items, true),
            Value::Error(err) => write!(f, "Error({:?})", err.kind),
            other => write!(f, "{other}"),
        }
    }
}

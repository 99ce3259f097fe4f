//! Objects, classes and the field-provider capability.
//!
//! Objects and classes keep their fields in a `Context`: a class body runs
//! in the class Context, an instance gets a Context whose parent is the
//! class Context, and `Context::open` exposes any Context as an object.

use std::fmt;
use std::sync::Arc;

use tur_ir::Name;

use super::Value;
use crate::context::Context;
use crate::errors::{undefined_field, EvalError};

/// Uniform field access over heterogeneous value kinds.
pub trait FieldProvider {
    /// Field value, or `None` when the field does not exist.
    fn get_field(&self, name: &str) -> Option<Value>;

    /// Field names, in definition order where the kind has one.
    fn fields(&self) -> Vec<Name>;

    /// Assign a field.
    fn set_field(&self, name: &Name, _value: Value) -> Result<(), EvalError> {
        Err(EvalError::new(format!(
            "you cannot set the field '{name}' on this value"
        )))
    }
}

// Objects

struct ObjectInner {
    class: Option<ClassValue>,
    fields: Context,
}

/// An object: optional class plus a field Context.
#[derive(Clone)]
pub struct ObjectValue(Arc<ObjectInner>);

impl ObjectValue {
    pub fn new(class: Option<ClassValue>, fields: Context) -> Self {
        ObjectValue(Arc::new(ObjectInner { class, fields }))
    }

    /// A classless object with no fields (the `{meta}` collector).
    pub fn empty() -> Self {
        Self::new(None, Context::new())
    }

    #[inline]
    pub fn class(&self) -> Option<&ClassValue> {
        self.0.class.as_ref()
    }

    /// The Context holding this object's fields.
    #[inline]
    pub fn context(&self) -> &Context {
        &self.0.fields
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FieldProvider for ObjectValue {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.0
            .fields
            .get_frame(name)
            .or_else(|| self.class().and_then(|cls| cls.get_method(name)))
    }

    fn fields(&self) -> Vec<Name> {
        self.0
            .fields
            .keys()
            .into_iter()
            .filter(|name| !name.is_special())
            .collect()
    }

    fn set_field(&self, name: &Name, value: Value) -> Result<(), EvalError> {
        self.0.fields.local(name.clone(), value)
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cls) = self.class() {
            write!(f, "{}", cls.name())?;
        }
        write!(f, "{{")?;
        for (i, name) in self.fields().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.0.fields.get_frame(name.as_str()) {
                Some(Value::Object(inner)) if inner.ptr_eq(self) => write!(f, "{name}: <self>")?,
                Some(value) => write!(f, "{name}: {value}")?,
                None => write!(f, "{name}")?,
            }
        }
        write!(f, "}}")
    }
}

// Classes

struct ClassInner {
    name: Name,
    parents: Vec<ClassValue>,
    context: Context,
}

/// A class: name, parent classes and the Context its body ran in.
#[derive(Clone)]
pub struct ClassValue(Arc<ClassInner>);

impl ClassValue {
    pub fn new(name: Name, parents: Vec<ClassValue>, context: Context) -> Self {
        ClassValue(Arc::new(ClassInner {
            name,
            parents,
            context,
        }))
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.0.name
    }

    #[inline]
    pub fn context(&self) -> &Context {
        &self.0.context
    }

    pub fn parents(&self) -> &[ClassValue] {
        &self.0.parents
    }

    /// Look up a member defined by this class or, depth first, its parents.
    pub fn get_method(&self, name: &str) -> Option<Value> {
        self.0
            .context
            .get_frame(name)
            .or_else(|| self.0.parents.iter().find_map(|p| p.get_method(name)))
    }

    /// Whether `ctx` is the body Context of this class or of an ancestor.
    pub fn owns_context(&self, ctx: &Context) -> bool {
        self.0.context.ptr_eq(ctx) || self.0.parents.iter().any(|p| p.owns_context(ctx))
    }

    /// Whether this class is `name` or inherits from it.
    pub fn is_subclass_of(&self, name: &str) -> bool {
        self.0.name.as_str() == name || self.0.parents.iter().any(|p| p.is_subclass_of(name))
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FieldProvider for ClassValue {
    fn get_field(&self, name: &str) -> Option<Value> {
        self.get_method(name)
    }

    fn fields(&self) -> Vec<Name> {
        self.0
            .context
            .keys()
            .into_iter()
            .filter(|name| !name.is_special())
            .collect()
    }
}

/// Field lookup that fails with `UndefinedField` instead of returning `None`.
pub(crate) fn require_field(value: &Value, field: &str) -> Result<Value, EvalError> {
    value
        .as_field_provider()
        .and_then(|provider| provider.get_field(field))
        .ok_or_else(|| undefined_field(field, value.type_name()))
}

//! Variable slots.

use tur_ir::Name;

use crate::errors::{frozen_variable, type_mismatch, EvalError};
use crate::value::Value;

/// A value slot with a frozen flag and optional accepted type names.
#[derive(Clone, Debug)]
pub struct Variable {
    value: Value,
    frozen: bool,
    types: Vec<Name>,
}

impl Variable {
    /// An untyped, unfrozen variable.
    pub fn new(value: Value) -> Self {
        Variable {
            value,
            frozen: false,
            types: Vec::new(),
        }
    }

    /// A typed variable; fails when `value` does not fit `types`.
    pub fn typed(name: &str, value: Value, types: Vec<Name>) -> Result<Self, EvalError> {
        if !value.fits(&types) {
            return Err(type_mismatch(name, &types, value.type_name()));
        }
        Ok(Variable {
            value,
            frozen: false,
            types,
        })
    }

    #[inline]
    pub fn get(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[inline]
    pub fn types(&self) -> &[Name] {
        &self.types
    }

    #[inline]
    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Type-checked assignment honoring the frozen flag.
    pub(crate) fn set(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        if self.frozen {
            return Err(frozen_variable(name));
        }
        self.set_forced(name, value)
    }

    /// Type-checked assignment ignoring the frozen flag.
    pub(crate) fn set_forced(&mut self, name: &str, value: Value) -> Result<(), EvalError> {
        if !value.fits(&self.types) {
            return Err(type_mismatch(name, &self.types, value.type_name()));
        }
        self.value = value;
        Ok(())
    }

    /// A frozen copy, used by task snapshots.
    pub(crate) fn frozen_copy(&self) -> Self {
        Variable {
            value: self.value.clone(),
            frozen: true,
            types: self.types.clone(),
        }
    }

    /// Add the types of `other` not already accepted. An empty list on
    /// either side means any type, so the result is empty too.
    pub(crate) fn merge_types(&mut self, other: &[Name]) {
        if other.is_empty() {
            self.types.clear();
            return;
        }
        if self.types.is_empty() {
            return;
        }
        for t in other {
            if !self.types.contains(t) {
                self.types.push(t.clone());
            }
        }
    }
}

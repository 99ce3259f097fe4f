//! Declared parameter lists.
//!
//! A parameter list is the callee side of argument binding: an ordered set
//! of parameters plus the optional `[rest]`, `{meta}` and trailing `closure`
//! collectors. Identifiers are unique across all of them.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::{Command, Name};

/// How a parameter may be supplied at the call site.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// Only by position. A named argument with this name goes to `meta`.
    PositionalOnly,
    /// Only by name. Positional arguments skip it.
    NamedOnly,
    /// Either way.
    PositionalOrNamed,
}

impl ParamKind {
    /// Whether a positional argument may fill this parameter.
    #[inline]
    pub fn accepts_positional(self) -> bool {
        !matches!(self, ParamKind::NamedOnly)
    }
}

/// A single declared parameter.
#[derive(Clone, Debug)]
pub struct Parameter {
    pub identifier: Name,
    pub kind: ParamKind,
    /// Accepted type names. Empty means any.
    pub types: Vec<Name>,
    /// Evaluated in the caller's Context when the argument is missing.
    pub default: Option<Arc<Command>>,
}

impl Parameter {
    /// A positional-or-named parameter without types or default.
    pub fn new(identifier: impl Into<Name>) -> Self {
        Parameter {
            identifier: identifier.into(),
            kind: ParamKind::PositionalOrNamed,
            types: Vec::new(),
            default: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: Command) -> Self {
        self.default = Some(Arc::new(default));
        self
    }

    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<Name>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }
}

/// Error building a parameter list.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParamError {
    #[error("parameter '{0}' is declared more than once")]
    Duplicate(Name),
}

/// An ordered parameter list with its optional collectors.
#[derive(Clone, Debug, Default)]
pub struct ParameterList {
    parameters: Vec<Parameter>,
    rest: Option<Name>,
    meta: Option<Name>,
    closure: Option<Name>,
}

impl ParameterList {
    /// Build a parameter list, rejecting duplicate identifiers.
    pub fn new(
        parameters: Vec<Parameter>,
        rest: Option<Name>,
        meta: Option<Name>,
        closure: Option<Name>,
    ) -> Result<Self, ParamError> {
        let mut seen = FxHashSet::default();
        let names = parameters
            .iter()
            .map(|p| &p.identifier)
            .chain(rest.iter())
            .chain(meta.iter())
            .chain(closure.iter());
        for name in names {
            if !seen.insert(name.clone()) {
                return Err(ParamError::Duplicate(name.clone()));
            }
        }
        Ok(ParameterList {
            parameters,
            rest,
            meta,
            closure,
        })
    }

    /// A list of plain positional-or-named parameters.
    pub fn simple<I, N>(names: I) -> Result<Self, ParamError>
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        let params = names.into_iter().map(Parameter::new).collect();
        Self::new(params, None, None, None)
    }

    #[inline]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn rest(&self) -> Option<&Name> {
        self.rest.as_ref()
    }

    #[inline]
    pub fn meta(&self) -> Option<&Name> {
        self.meta.as_ref()
    }

    #[inline]
    pub fn closure(&self) -> Option<&Name> {
        self.closure.as_ref()
    }

    /// Number of declared parameters, collectors excluded.
    #[inline]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Iterate the default expressions (used by the command visitor).
    pub fn defaults(&self) -> impl Iterator<Item = &Command> {
        self.parameters.iter().filter_map(|p| p.default.as_deref())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;

//! User-defined callables: closures, macros and chains, with curried state.
//!
//! A `Callable` is immutable once built. Currying, uncurrying and
//! reclosing produce a new `Callable`; the value a script holds never
//! changes under it.

mod call;

use std::fmt;
use std::sync::Arc;

use tur_ir::{FunctionDef, FunctionKind, Name, ParameterList};

use crate::binder::CallArg;
use crate::context::Context;
use crate::errors::{curry_conflict, not_callable, not_curried, EvalError};
use crate::value::{FieldProvider, Value};

/// Shared handle stored in `Value::Function`.
pub type FunctionValue = Arc<Callable>;

/// What runs when the callable is invoked.
#[derive(Clone, Debug)]
pub enum Body {
    /// A closure or macro literal.
    Function(Arc<FunctionDef>),
    /// `first ## second`: the result of `first` is the sole argument of
    /// `second`.
    Chain { first: Value, second: Value },
}

#[derive(Clone)]
pub struct Callable {
    name: Name,
    body: Body,
    /// Defining Context. `None` for callables created outside any scope.
    captured: Option<Context>,
    curried_self: Option<Value>,
    curried_args: Vec<CallArg>,
}

impl Callable {
    /// A closure or macro capturing `captured`.
    pub fn from_def(def: Arc<FunctionDef>, captured: Option<Context>) -> Self {
        let name = def
            .name
            .clone()
            .unwrap_or_else(|| Name::new(match def.kind {
                FunctionKind::Closure => "closure",
                FunctionKind::Macro => "macro",
            }));
        Callable {
            name,
            body: Body::Function(def),
            captured,
            curried_self: None,
            curried_args: Vec::new(),
        }
    }

    /// Compose two callables. Both must be callable values.
    pub fn chain(first: Value, second: Value) -> Result<Self, EvalError> {
        for part in [&first, &second] {
            if !is_callable(part) {
                return Err(not_callable(part.type_name()));
            }
        }
        let name = Name::new(format!(
            "{}##{}",
            callable_name(&first),
            callable_name(&second)
        ));
        Ok(Callable {
            name,
            body: Body::Chain { first, second },
            captured: None,
            curried_self: None,
            curried_args: Vec::new(),
        })
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[inline]
    pub fn captured(&self) -> Option<&Context> {
        self.captured.as_ref()
    }

    /// The function definition, `None` for chains.
    pub fn def(&self) -> Option<&Arc<FunctionDef>> {
        match &self.body {
            Body::Function(def) => Some(def),
            Body::Chain { .. } => None,
        }
    }

    pub fn params(&self) -> Option<&ParameterList> {
        self.def().map(|def| &def.params)
    }

    /// Whether arguments reach this callable unevaluated. A chain is a
    /// macro when its first element is.
    pub fn is_macro(&self) -> bool {
        match &self.body {
            Body::Function(def) => def.kind == FunctionKind::Macro,
            Body::Chain { first, .. } => matches!(first, Value::Function(f) if f.is_macro()),
        }
    }

    #[inline]
    pub fn curried_self(&self) -> Option<&Value> {
        self.curried_self.as_ref()
    }

    #[inline]
    pub fn curried_args(&self) -> &[CallArg] {
        &self.curried_args
    }

    pub fn is_curried(&self) -> bool {
        self.curried_self.is_some() || !self.curried_args.is_empty()
    }

    /// Number of pre-bound arguments.
    pub fn curried_arity(&self) -> usize {
        self.curried_args.len()
    }

    /// A copy with `receiver` bound as self and `args` appended to any
    /// arguments curried before. Fails when a different receiver is
    /// already bound.
    pub fn curried(&self, receiver: Option<Value>, args: Vec<CallArg>) -> Result<Self, EvalError> {
        let mut copy = self.clone();
        if let Some(receiver) = receiver {
            match &copy.curried_self {
                Some(existing) if *existing != receiver => return Err(curry_conflict()),
                Some(_) => {}
                None => copy.curried_self = Some(receiver),
            }
        }
        copy.curried_args.extend(args);
        Ok(copy)
    }

    /// Drop all curried state (`levels == None`) or the most recent
    /// `levels` curried arguments.
    pub fn uncurried(&self, levels: Option<usize>) -> Result<Self, EvalError> {
        if !self.is_curried() {
            return Err(not_curried(self.name.as_str()));
        }
        let mut copy = self.clone();
        match levels {
            None => {
                copy.curried_self = None;
                copy.curried_args.clear();
            }
            Some(levels) => {
                let keep = copy.curried_args.len().saturating_sub(levels);
                copy.curried_args.truncate(keep);
            }
        }
        Ok(copy)
    }

    /// A copy capturing `context` instead of the original defining scope.
    pub fn reclosed(&self, context: Context) -> Self {
        Callable {
            captured: Some(context),
            ..self.clone()
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("macro", &self.is_macro())
            .field("curried_args", &self.curried_args.len())
            .field("curried_self", &self.curried_self.is_some())
            .finish()
    }
}

impl FieldProvider for Callable {
    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::string(self.name.as_str())),
            _ => None,
        }
    }

    fn fields(&self) -> Vec<Name> {
        vec![Name::new("name")]
    }
}

/// Whether `value` can be invoked.
pub fn is_callable(value: &Value) -> bool {
    matches!(
        value,
        Value::Function(_) | Value::Native(_) | Value::Class(_)
    )
}

fn callable_name(value: &Value) -> String {
    match value {
        Value::Function(f) => f.name().to_string(),
        Value::Native(n) => n.name().to_string(),
        Value::Class(c) => c.name().to_string(),
        other => other.type_name().to_string(),
    }
}

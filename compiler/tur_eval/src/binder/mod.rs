//! Argument binding.
//!
//! Maps the arguments of one call onto a declared `ParameterList` and
//! defines the resulting bindings in the callee Context.
//!
//! Arguments are processed in call order:
//!
//! 1. A spread list feeds its elements in as positionals; a spread field
//!    provider feeds its fields in as named arguments, leniently (unknown
//!    names are dropped when there is no `{meta}`); a spread `none` feeds
//!    nothing.
//! 2. The last unnamed argument goes to the trailing `closure` parameter
//!    when one is declared and every positional-eligible parameter is
//!    already filled. Nothing after it is processed.
//! 3. An unnamed argument fills the next free positional-eligible
//!    parameter, else goes to `[rest]`.
//! 4. A named argument fills its parameter. Positional-only names and
//!    unknown names go to `{meta}`.
//!
//! Unfilled parameters then take their default, evaluated in the caller's
//! Context, and `rest`/`meta`/`closure` are always bound.

use smallvec::SmallVec;
use tur_ir::{Name, ParameterList};

use crate::context::Context;
use crate::errors::{
    duplicate_argument, invalid_spread, missing_argument, positional_only_by_name,
    too_many_arguments, unknown_argument, EvalError,
};
use crate::interpreter::Interpreter;
use crate::value::{ObjectValue, Value};

/// One argument of a call, after evaluation (or, for macros, wrapped as an
/// unevaluated command value).
#[derive(Clone, Debug)]
pub struct CallArg {
    pub name: Option<Name>,
    pub spread: bool,
    pub value: Value,
}

impl CallArg {
    pub fn positional(value: Value) -> Self {
        CallArg {
            name: None,
            spread: false,
            value,
        }
    }

    pub fn named(name: impl Into<Name>, value: Value) -> Self {
        CallArg {
            name: Some(name.into()),
            spread: false,
            value,
        }
    }

    pub fn spread(value: Value) -> Self {
        CallArg {
            name: None,
            spread: true,
            value,
        }
    }
}

/// Slots of one call, filled in argument order.
struct Slots<'p> {
    params: &'p ParameterList,
    values: SmallVec<[Option<Value>; 8]>,
    rest: Vec<Value>,
    meta: Vec<(Name, Value)>,
    closure: Option<Value>,
}

impl<'p> Slots<'p> {
    fn new(params: &'p ParameterList) -> Self {
        Slots {
            params,
            values: SmallVec::from_elem(None, params.len()),
            rest: Vec::new(),
            meta: Vec::new(),
            closure: None,
        }
    }

    fn positionals_filled(&self) -> bool {
        self.params
            .parameters()
            .iter()
            .zip(&self.values)
            .all(|(p, v)| !p.kind.accepts_positional() || v.is_some())
    }

    fn accept(&mut self, arg: CallArg, lenient: bool) -> Result<(), EvalError> {
        if arg.spread {
            return self.spread(arg.value);
        }
        match arg.name {
            Some(name) => self.named(name, arg.value, lenient),
            None => self.positional(arg.value),
        }
    }

    fn spread(&mut self, value: Value) -> Result<(), EvalError> {
        tracing::trace!(kind = value.type_name(), "spreading argument");
        match &value {
            Value::None => Ok(()),
            Value::List(items) => {
                for item in items.iter() {
                    self.positional(item.clone())?;
                }
                Ok(())
            }
            Value::Channel(ch) => {
                for item in ch.drain()? {
                    self.positional(item)?;
                }
                Ok(())
            }
            Value::Task(task) => {
                for item in task.yielder().to_parent.drain()? {
                    self.positional(item)?;
                }
                Ok(())
            }
            other => {
                let provider = other
                    .as_field_provider()
                    .ok_or_else(|| invalid_spread(other.type_name()))?;
                for field in provider.fields() {
                    if let Some(field_value) = provider.get_field(field.as_str()) {
                        self.named(field, field_value, true)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn positional(&mut self, value: Value) -> Result<(), EvalError> {
        let free = self
            .params
            .parameters()
            .iter()
            .zip(&self.values)
            .position(|(p, v)| p.kind.accepts_positional() && v.is_none());
        match free {
            Some(index) => {
                self.values[index] = Some(value);
                Ok(())
            }
            None if self.params.rest().is_some() => {
                self.rest.push(value);
                Ok(())
            }
            None => Err(too_many_arguments()),
        }
    }

    fn named(&mut self, name: Name, value: Value, lenient: bool) -> Result<(), EvalError> {
        let has_meta = self.params.meta().is_some();
        let index = self
            .params
            .parameters()
            .iter()
            .position(|p| p.identifier == name);
        match index {
            Some(index) => {
                let param = &self.params.parameters()[index];
                if param.kind == tur_ir::ParamKind::PositionalOnly {
                    if has_meta {
                        self.meta.push((name, value));
                        return Ok(());
                    }
                    return Err(positional_only_by_name(name.as_str()));
                }
                if self.values[index].is_some() {
                    return Err(duplicate_argument(name.as_str()));
                }
                self.values[index] = Some(value);
                Ok(())
            }
            None if has_meta => {
                self.meta.push((name, value));
                Ok(())
            }
            None if lenient => Ok(()),
            None => Err(unknown_argument(name.as_str())),
        }
    }
}

/// Bind `args` to `params` in `target`.
///
/// Defaults are evaluated in `caller`. With `freeze` every binding created
/// here is frozen; `init` chains bind unfrozen so a parent `init` can keep
/// writing the same receiver.
pub fn bind_arguments(
    interp: &mut Interpreter,
    params: &ParameterList,
    args: Vec<CallArg>,
    target: &Context,
    caller: &Context,
    freeze: bool,
) -> Result<(), EvalError> {
    let mut slots = Slots::new(params);
    let count = args.len();
    for (i, arg) in args.into_iter().enumerate() {
        let is_last = i + 1 == count;
        if is_last
            && params.closure().is_some()
            && arg.name.is_none()
            && !arg.spread
            && slots.positionals_filled()
        {
            tracing::trace!("binding trailing closure argument");
            slots.closure = Some(arg.value);
            break;
        }
        slots.accept(arg, false)?;
    }

    let Slots {
        values,
        rest,
        meta,
        closure,
        ..
    } = slots;

    for (param, value) in params.parameters().iter().zip(values) {
        let value = match value {
            Some(value) => value,
            None => match &param.default {
                Some(default) => interp.execute(default, caller)?,
                None => return Err(missing_argument(param.identifier.as_str())),
            },
        };
        target.define(param.identifier.clone(), value, param.types.clone())?;
        if freeze {
            target.freeze(param.identifier.as_str())?;
        }
    }

    if let Some(name) = params.rest() {
        bind_collector(target, name, Value::list(rest), freeze)?;
    }
    if let Some(name) = params.meta() {
        let object = ObjectValue::empty();
        for (field, value) in meta {
            object.context().local(field, value)?;
        }
        bind_collector(target, name, Value::Object(object), freeze)?;
    }
    if let Some(name) = params.closure() {
        bind_collector(target, name, closure.unwrap_or(Value::None), freeze)?;
    }
    Ok(())
}

fn bind_collector(target: &Context, name: &Name, value: Value, freeze: bool) -> Result<(), EvalError> {
    target.define(name.clone(), value, Vec::new())?;
    if freeze {
        target.freeze(name.as_str())?;
    }
    Ok(())
}

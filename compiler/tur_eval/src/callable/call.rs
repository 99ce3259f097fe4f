//! Call dispatch.
//!
//! Every invocation goes through `Interpreter::call_value`. What Context the
//! body runs in depends on how it was reached:
//!
//! - plain call: a child of the captured Context, with `me` and `.` bound
//! - method on an object: a child of the object's field Context (or of the
//!   captured Context for closures stored in fields), with `this`, `cls`
//!   and `.` bound
//! - method on a class: a child of the class Context; for `init` called
//!   while a `this` is in scope, arguments stay unfrozen and whatever the
//!   body binds is merged back into the calling Context
//! - calling a class: instantiation, running `init` against the new object

use std::sync::Arc;

use tur_ir::{special, Argument, Command, FunctionDef, Name};

use super::{Body, FunctionValue};
use crate::binder::{bind_arguments, CallArg};
use crate::context::Context;
use crate::errors::{
    not_callable, too_many_arguments, type_mismatch, undefined_field, ControlFlow, EvalError,
    EvalResult,
};
use crate::interpreter::{CallFrame, Interpreter};
use crate::value::{require_field, ClassValue, FieldProvider, ObjectValue, Value};

/// The value a method was looked up on, and the name it was looked up by.
struct Receiver {
    value: Value,
    method: Name,
}

fn takes_commands(callee: &Value) -> bool {
    matches!(callee, Value::Function(f) if f.is_macro())
}

fn frozen_name(ctx: &Context, name: &str, value: Value) {
    ctx.bind_frozen(Name::new(name), value);
}

impl Interpreter {
    /// Evaluate call-site arguments. For macros the arguments stay
    /// unevaluated command values; spreads are always evaluated.
    pub(crate) fn eval_args(
        &mut self,
        args: &[Argument],
        ctx: &Context,
        lazy: bool,
    ) -> Result<Vec<CallArg>, EvalError> {
        args.iter()
            .map(|arg| {
                let value = if lazy && !arg.spread {
                    Value::Command(Arc::clone(&arg.expr))
                } else {
                    self.execute(&arg.expr, ctx)?
                };
                Ok(CallArg {
                    name: arg.name.clone(),
                    spread: arg.spread,
                    value,
                })
            })
            .collect()
    }

    pub(crate) fn eval_call(
        &mut self,
        callee: &Command,
        args: &[Argument],
        ctx: &Context,
    ) -> EvalResult {
        let callee = self.execute(callee, ctx)?;
        let args = self.eval_args(args, ctx, takes_commands(&callee))?;
        self.call_value(&callee, args, ctx)
    }

    pub(crate) fn eval_method_call(
        &mut self,
        receiver: &Command,
        method: &Name,
        args: &[Argument],
        ctx: &Context,
    ) -> EvalResult {
        let receiver = self.execute(receiver, ctx)?;
        let callee = lookup_method(&receiver, method.as_str())?;
        let args = self.eval_args(args, ctx, takes_commands(&callee))?;
        self.call_method(&receiver, method, &callee, args, ctx)
    }

    /// `f.(args)` and `obj.m.(args)`: partial application. On a field
    /// access the object is curried as self.
    pub(crate) fn eval_curry(
        &mut self,
        callee: &Command,
        args: &[Argument],
        ctx: &Context,
    ) -> EvalResult {
        let (callee, receiver) = match callee {
            Command::FieldAccess { object, field } => {
                let object = self.execute(object, ctx)?;
                let method = require_field(&object, field.as_str())?;
                (method, Some(object))
            }
            other => (self.execute(other, ctx)?, None),
        };
        let Value::Function(func) = &callee else {
            return Err(not_callable(callee.type_name()));
        };
        let args = self.eval_args(args, ctx, func.is_macro())?;
        let receiver = receiver.filter(|r| matches!(r, Value::Object(_) | Value::Class(_)));
        Ok(Value::Function(Arc::new(func.curried(receiver, args)?)))
    }

    /// Invoke any callable value with already evaluated arguments.
    pub fn call_value(&mut self, callee: &Value, args: Vec<CallArg>, caller: &Context) -> EvalResult {
        match callee {
            Value::Function(func) => self.invoke(func, None, args, caller),
            Value::Native(native) => {
                let values = native_args(native.name(), args)?;
                native.call(self, caller, values)
            }
            Value::Class(class) => self.instantiate(class, args, caller),
            other => Err(not_callable(other.type_name())),
        }
    }

    /// Invoke `callee`, found as `method` on `receiver`.
    pub fn call_method(
        &mut self,
        receiver: &Value,
        method: &Name,
        callee: &Value,
        args: Vec<CallArg>,
        caller: &Context,
    ) -> EvalResult {
        match (callee, receiver) {
            (Value::Function(func), Value::Object(_) | Value::Class(_)) => {
                let receiver = Receiver {
                    value: receiver.clone(),
                    method: method.clone(),
                };
                self.invoke(func, Some(receiver), args, caller)
            }
            _ => self.call_value(callee, args, caller),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(callee = %func.name()))]
    fn invoke(
        &mut self,
        func: &FunctionValue,
        receiver: Option<Receiver>,
        args: Vec<CallArg>,
        caller: &Context,
    ) -> EvalResult {
        let args = if func.curried_args().is_empty() {
            args
        } else {
            func.curried_args().iter().cloned().chain(args).collect()
        };
        let receiver = receiver.or_else(|| {
            func.curried_self().map(|value| Receiver {
                value: value.clone(),
                method: func.name().clone(),
            })
        });
        match func.body() {
            Body::Chain { first, second } => {
                let intermediate = self.call_value(first, args, caller)?;
                self.call_value(second, vec![CallArg::positional(intermediate)], caller)
            }
            Body::Function(def) => {
                self.call_stack.push(CallFrame {
                    name: func.name().clone(),
                })?;
                let result = match self.enter(func, def, receiver, args, caller) {
                    Err(err) => match err.control_flow {
                        Some(ControlFlow::Return(value)) => Ok(value),
                        None => Err(self.call_stack.attach_backtrace(err)),
                    },
                    ok => ok,
                };
                self.call_stack.pop();
                let value = result?;
                if !value.fits(&def.return_types) {
                    return Err(type_mismatch(
                        func.name().as_str(),
                        &def.return_types,
                        value.type_name(),
                    ));
                }
                Ok(value)
            }
        }
    }

    /// Build the call Context, bind the arguments and run the body.
    fn enter(
        &mut self,
        func: &FunctionValue,
        def: &FunctionDef,
        receiver: Option<Receiver>,
        args: Vec<CallArg>,
        caller: &Context,
    ) -> EvalResult {
        match receiver {
            Some(Receiver {
                value: Value::Object(obj),
                method,
            }) => {
                let ctx = method_scope(func, &obj).wrap();
                frozen_name(&ctx, special::THIS, Value::Object(obj.clone()));
                frozen_name(
                    &ctx,
                    special::CLS,
                    obj.class().cloned().map_or(Value::None, Value::Class),
                );
                frozen_name(&ctx, special::METHOD, Value::string(method.as_str()));
                ctx.set_caller(caller);
                bind_arguments(self, &def.params, args, &ctx, caller, true)?;
                self.execute(&def.body, &ctx)
            }
            Some(Receiver {
                value: Value::Class(class),
                method,
            }) => {
                if method.as_str() == "init" {
                    if let Some(this) = caller.get_local(special::THIS) {
                        return self.run_init(def, &class, this, args, caller, caller);
                    }
                }
                let ctx = class.context().wrap();
                frozen_name(&ctx, special::METHOD, Value::string(method.as_str()));
                ctx.set_caller(caller);
                bind_arguments(self, &def.params, args, &ctx, caller, true)?;
                self.execute(&def.body, &ctx)
            }
            _ => {
                let ctx = match func.captured() {
                    Some(captured) => captured.wrap(),
                    None => caller.thread(),
                };
                frozen_name(&ctx, special::ME, Value::Function(Arc::clone(func)));
                frozen_name(&ctx, special::METHOD, Value::string(func.name().as_str()));
                ctx.set_caller(caller);
                bind_arguments(self, &def.params, args, &ctx, caller, true)?;
                self.execute(&def.body, &ctx)
            }
        }
    }

    /// Run an `init` body for `this`. Arguments stay unfrozen; everything
    /// the body binds, except the special names, lands in `merge_into`.
    fn run_init(
        &mut self,
        def: &FunctionDef,
        class: &ClassValue,
        this: Value,
        args: Vec<CallArg>,
        caller: &Context,
        merge_into: &Context,
    ) -> EvalResult {
        let ctx = class.context().wrap();
        frozen_name(&ctx, special::METHOD, Value::string("init"));
        frozen_name(&ctx, special::THIS, this);
        frozen_name(&ctx, special::CLS, Value::Class(class.clone()));
        ctx.set_caller(caller);
        bind_arguments(self, &def.params, args, &ctx, caller, false)?;
        let result = self.execute(&def.body, &ctx);
        merge_into.merge_from(&ctx, &special::ALL)?;
        result
    }

    /// Calling a class: create the object and run `init` on it.
    #[tracing::instrument(level = "debug", skip_all, fields(class = %class.name()))]
    fn instantiate(&mut self, class: &ClassValue, args: Vec<CallArg>, caller: &Context) -> EvalResult {
        let fields = class.context().wrap();
        let object = ObjectValue::new(Some(class.clone()), fields.clone());
        match class.get_method("init") {
            Some(Value::Function(init)) => {
                let Body::Function(def) = init.body() else {
                    return Err(not_callable(init.name().as_str()));
                };
                self.call_stack.push(CallFrame {
                    name: Name::new(format!("{}.init", class.name())),
                })?;
                let this = Value::Object(object.clone());
                let result = match self.run_init(def, class, this, args, caller, &fields) {
                    Err(err) if err.control_flow.is_some() => Ok(Value::None),
                    Err(err) => Err(self.call_stack.attach_backtrace(err)),
                    ok => ok,
                };
                self.call_stack.pop();
                result?;
            }
            Some(other) => return Err(not_callable(other.type_name())),
            None if !args.is_empty() => return Err(too_many_arguments()),
            None => {}
        }
        Ok(Value::Object(object))
    }
}

/// The parent of a method's call Context on `obj`: the object's fields,
/// unless the callable captured a scope of its own outside the class.
fn method_scope(func: &FunctionValue, obj: &ObjectValue) -> Context {
    match func.captured() {
        Some(captured) if !obj.class().is_some_and(|cls| cls.owns_context(captured)) => {
            captured.clone()
        }
        _ => obj.context().clone(),
    }
}

/// Resolve `method` on `receiver`, falling back to the catch-all `.` field.
fn lookup_method(receiver: &Value, method: &str) -> EvalResult {
    let provider: &dyn FieldProvider = receiver
        .as_field_provider()
        .ok_or_else(|| undefined_field(method, receiver.type_name()))?;
    provider
        .get_field(method)
        .or_else(|| provider.get_field(special::METHOD))
        .ok_or_else(|| undefined_field(method, receiver.type_name()))
}

/// Natives take positional values only; spread lists are expanded.
fn native_args(name: &Name, args: Vec<CallArg>) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(arg_name) = arg.name {
            return Err(EvalError::new(format!(
                "built-in '{name}' does not take named argument '{arg_name}'"
            )));
        }
        match (arg.spread, arg.value) {
            (true, Value::List(items)) => values.extend(items.iter().cloned()),
            (true, Value::None) => {}
            (true, other) => return Err(crate::errors::invalid_spread(other.type_name())),
            (false, value) => values.push(value),
        }
    }
    Ok(values)
}

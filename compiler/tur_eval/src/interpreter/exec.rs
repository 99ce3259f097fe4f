//! Per-command execution.

use std::sync::Arc;

use tur_ir::{BinaryOp, ClassDef, Command, FunctionDef, Literal};

use super::{operators, Interpreter};
use crate::callable::Callable;
use crate::context::Context;
use crate::errors::{yield_outside_task, EvalError, EvalResult};
use crate::value::{require_field, ClassValue, Value};

impl Interpreter {
    pub(super) fn exec(&mut self, command: &Command, ctx: &Context) -> EvalResult {
        match command {
            Command::Literal(literal) => Ok(literal_value(literal)),
            Command::Identifier(name) => ctx.get(name.as_str()),
            Command::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.execute(item, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::list(values))
            }
            Command::Block(commands) => self.execute_sequence(commands, &ctx.wrap()),
            Command::Let { name, types, value } => {
                let value = self.execute(value, ctx)?;
                ctx.define(name.clone(), value.clone(), types.clone())?;
                Ok(value)
            }
            Command::Pin(names) => {
                for name in names {
                    ctx.freeze(name.as_str())?;
                }
                Ok(Value::None)
            }
            Command::Unlet(name) => {
                ctx.unlet(name.as_str())?;
                Ok(Value::None)
            }
            Command::Global { name, value } => match value {
                Some(value) => {
                    let value = self.execute(value, ctx)?;
                    ctx.global_with(name.clone(), value.clone())?;
                    Ok(value)
                }
                None => {
                    ctx.global(name.clone())?;
                    Ok(Value::None)
                }
            },
            Command::Assign { name, value } => {
                let value = self.execute(value, ctx)?;
                ctx.update(name.as_str(), value.clone())?;
                Ok(value)
            }
            Command::FieldAccess { object, field } => {
                let object = self.execute(object, ctx)?;
                require_field(&object, field.as_str())
            }
            Command::Binary { op, left, right } => self.exec_binary(*op, left, right, ctx),
            Command::Unary { op, operand } => {
                let operand = self.execute(operand, ctx)?;
                operators::unary(*op, &operand)
            }
            Command::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.execute(condition, ctx)?.is_truthy() {
                    self.execute(then_branch, ctx)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, ctx)
                } else {
                    Ok(Value::None)
                }
            }
            Command::While { condition, body } => {
                let mut last = Value::None;
                while self.execute(condition, ctx)?.is_truthy() {
                    last = self.execute(body, &ctx.wrap())?;
                }
                Ok(last)
            }
            Command::Return(value) => {
                let value = match value {
                    Some(value) => self.execute(value, ctx)?,
                    None => Value::None,
                };
                Err(EvalError::return_with(value))
            }
            Command::Function(def) => define_function(def, ctx),
            Command::Class(def) => self.exec_class(def, ctx),
            Command::Call { callee, args } => self.eval_call(callee, args, ctx),
            Command::MethodCall {
                receiver,
                method,
                args,
            } => self.eval_method_call(receiver, method, args, ctx),
            Command::Curry { callee, args } => self.eval_curry(callee, args, ctx),
            Command::Chain { first, second } => {
                let first = self.execute(first, ctx)?;
                let second = self.execute(second, ctx)?;
                Ok(Value::Function(Arc::new(Callable::chain(first, second)?)))
            }
            Command::Async { body, options } => crate::task::eval_async(self, body, options, ctx),
            Command::Await { target, timeout } => {
                let target = self.execute(target, ctx)?;
                let timeout = match timeout {
                    Some(timeout) => Some(self.execute(timeout, ctx)?),
                    None => None,
                };
                crate::task::await_value(&target, timeout.as_ref())
            }
            Command::Yield { value, condition } => self.exec_yield(value, condition.as_deref(), ctx),
            Command::Flow(def) => crate::flow::run_flow(self, def, ctx),
            Command::Export(names) => {
                for name in names {
                    ctx.add_export(name.clone());
                }
                Ok(Value::None)
            }
        }
    }

    fn exec_binary(
        &mut self,
        op: BinaryOp,
        left: &Command,
        right: &Command,
        ctx: &Context,
    ) -> EvalResult {
        let left = self.execute(left, ctx)?;
        match op {
            BinaryOp::And if !left.is_truthy() => return Ok(Value::Bool(false)),
            BinaryOp::Or if left.is_truthy() => return Ok(Value::Bool(true)),
            _ => {}
        }
        let right = self.execute(right, ctx)?;
        operators::binary(op, &left, &right)
    }

    fn exec_class(&mut self, def: &ClassDef, ctx: &Context) -> EvalResult {
        let parents = def
            .parents
            .iter()
            .map(|parent| match ctx.get(parent.as_str())? {
                Value::Class(cls) => Ok(cls),
                other => Err(EvalError::new(format!(
                    "'{parent}' is not a class but {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let class_ctx = ctx.wrap();
        let class = ClassValue::new(def.name.clone(), parents, class_ctx.clone());
        class_ctx.bind(tur_ir::Name::new(tur_ir::special::CLS), Value::Class(class.clone()));
        self.execute_sequence(&def.body, &class_ctx)?;
        let value = Value::Class(class);
        ctx.local(def.name.clone(), value.clone())?;
        Ok(value)
    }

    fn exec_yield(
        &mut self,
        value: &Command,
        condition: Option<&Command>,
        ctx: &Context,
    ) -> EvalResult {
        if let Some(condition) = condition {
            if !self.execute(condition, ctx)?.is_truthy() {
                return Ok(Value::None);
            }
        }
        let value = self.execute(value, ctx)?;
        let yielder = self.yielder().ok_or_else(yield_outside_task)?;
        yielder.to_parent.send(value.clone())?;
        Ok(value)
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::Str(Arc::clone(s)),
    }
}

/// A function literal becomes a callable capturing `ctx`; named ones are
/// also bound there.
fn define_function(def: &Arc<FunctionDef>, ctx: &Context) -> EvalResult {
    let value = Value::Function(Arc::new(Callable::from_def(
        Arc::clone(def),
        Some(ctx.clone()),
    )));
    if let Some(name) = &def.name {
        ctx.local(name.clone(), value.clone())?;
    }
    Ok(value)
}

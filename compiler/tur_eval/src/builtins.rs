//! Built-in functions.
//!
//! The engine needs a handful of natives to be usable on its own: output,
//! `sleep`, channel construction, the callable toolkit (`curry`, `uncurry`,
//! `reclose`, ...), `evaluate` for macro bodies and `incoming` for tasks.
//! `install` puts them into the global table so every Context, task
//! snapshots included, resolves them, along with the flow sentinels `fini`
//! and `non_mutat`.

use std::sync::Arc;
use std::time::Instant;

use tur_ir::Name;

use crate::binder::CallArg;
use crate::callable::FunctionValue;
use crate::channel::Channel;
use crate::context::Context;
use crate::errors::{yield_outside_task, EvalError, EvalErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::task::seconds;
use crate::value::{NativeFunction, Sentinel, Value};

/// Install every built-in into the global table of `ctx`.
pub fn install(ctx: &Context) {
    let natives: [(&str, fn(&mut Interpreter, &Context, Vec<Value>) -> EvalResult); 12] = [
        ("print", print),
        ("println", println),
        ("sleep", sleep),
        ("channel", channel),
        ("curry", curry),
        ("uncurry", uncurry),
        ("curried_arity", curried_arity),
        ("is_curried", is_curried),
        ("reclose", reclose),
        ("evaluate", evaluate),
        ("incoming", incoming),
        ("type", type_of),
    ];
    for (name, func) in natives {
        let native = NativeFunction::new(name, func);
        ctx.set_global(native.name().clone(), Value::Native(native));
    }
    for sentinel in [Sentinel::Fini, Sentinel::NonMutat] {
        ctx.set_global(Name::new(sentinel.name()), Value::Sentinel(sentinel));
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::None)
}

fn function_arg(builtin: &str, args: &[Value]) -> Result<FunctionValue, EvalError> {
    match args.first() {
        Some(Value::Function(func)) => Ok(Arc::clone(func)),
        other => Err(EvalError::new(format!(
            "'{builtin}' needs a function or macro as first argument, got {}",
            other.map_or("nothing", Value::type_name)
        ))),
    }
}

fn output(interp: &Interpreter, ctx: &Context, args: &[Value], newline: bool) -> EvalResult {
    let text: String = args.iter().map(ToString::to_string).collect();
    let handler = ctx
        .print_target()
        .unwrap_or_else(|| Arc::clone(interp.print_handler()));
    if newline {
        handler.println(&text);
    } else {
        handler.print(&text);
    }
    Ok(Value::None)
}

fn print(interp: &mut Interpreter, ctx: &Context, args: Vec<Value>) -> EvalResult {
    output(interp, ctx, &args, false)
}

fn println(interp: &mut Interpreter, ctx: &Context, args: Vec<Value>) -> EvalResult {
    output(interp, ctx, &args, true)
}

/// `sleep(seconds)`: returns the seconds actually slept.
fn sleep(interp: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    let duration = seconds(&arg(&args, 0))?;
    let start = Instant::now();
    std::thread::sleep(duration);
    interp.step()?;
    Ok(Value::Float(start.elapsed().as_secs_f64()))
}

/// `channel()` is unbounded, `channel(n)` holds at most `n` items.
fn channel(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    let capacity = match args.first() {
        None | Some(Value::None) => None,
        Some(value) => Some(
            value
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    EvalError::new(format!("channel capacity must be a count, got {value}"))
                })?,
        ),
    };
    Ok(Value::Channel(Channel::new(capacity)))
}

/// `curry(f, [args])`
fn curry(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    let func = function_arg("curry", &args)?;
    let curried: Vec<CallArg> = match arg(&args, 1) {
        Value::List(items) => items.iter().cloned().map(CallArg::positional).collect(),
        Value::None => Vec::new(),
        single => vec![CallArg::positional(single)],
    };
    Ok(Value::Function(Arc::new(func.curried(None, curried)?)))
}

/// `uncurry(f)` drops all curried state, `uncurry(f, n)` the last `n`
/// curried arguments.
fn uncurry(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    let func = function_arg("uncurry", &args)?;
    let levels = match arg(&args, 1) {
        Value::None => None,
        value => Some(
            value
                .as_int()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| EvalError::new(format!("cannot uncurry {value} levels")))?,
        ),
    };
    Ok(Value::Function(Arc::new(func.uncurried(levels)?)))
}

fn curried_arity(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    let func = function_arg("curried_arity", &args)?;
    Ok(Value::Int(
        i64::try_from(func.curried_arity()).unwrap_or(i64::MAX),
    ))
}

fn is_curried(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    Ok(Value::Bool(
        matches!(args.first(), Some(Value::Function(func)) if func.is_curried()),
    ))
}

/// `reclose(f)`: the same callable, closed over the calling Context.
fn reclose(_: &mut Interpreter, ctx: &Context, args: Vec<Value>) -> EvalResult {
    let func = function_arg("reclose", &args)?;
    Ok(Value::Function(Arc::new(func.reclosed(ctx.clone()))))
}

/// `evaluate(cmd)`: run an unevaluated macro argument in the Context of
/// the macro's caller. Other values are already evaluated.
fn evaluate(interp: &mut Interpreter, ctx: &Context, args: Vec<Value>) -> EvalResult {
    match arg(&args, 0) {
        Value::Command(command) => {
            let target = ctx.caller().unwrap_or_else(|| ctx.clone());
            interp.execute(&command, &target)
        }
        other => Ok(other),
    }
}

/// `incoming()`: inside a task, the next value the spawner sent; `none`
/// once the spawner closed the channel.
fn incoming(interp: &mut Interpreter, _: &Context, _: Vec<Value>) -> EvalResult {
    let yielder = interp.yielder().ok_or_else(yield_outside_task)?;
    match yielder.to_child.receive() {
        Err(err) if err.kind == EvalErrorKind::ChannelClosed => Ok(Value::None),
        other => other,
    }
}

fn type_of(_: &mut Interpreter, _: &Context, args: Vec<Value>) -> EvalResult {
    Ok(Value::string(arg(&args, 0).type_name()))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tur_ir::{Argument, Command};

    fn call(name: &str, args: Vec<Command>) -> Command {
        Command::call(
            Command::ident(name),
            args.into_iter().map(Argument::positional).collect(),
        )
    }

    fn setup() -> (Interpreter, Context) {
        let interp = Interpreter::builder()
            .mode(crate::EvalMode::TestRun)
            .build();
        let ctx = Context::new();
        install(&ctx);
        (interp, ctx)
    }

    #[test]
    fn println_goes_to_the_interpreter_handler() {
        let (mut interp, ctx) = setup();
        interp
            .run(&call("println", vec![Command::string("a"), Command::int(1)]), &ctx)
            .unwrap();
        assert_eq!(interp.print_handler().get_output(), "a1\n");
    }

    #[test]
    fn print_target_on_context_wins() {
        let (mut interp, ctx) = setup();
        let target = crate::print_handler::buffer_handler();
        let scope = ctx.wrap();
        scope.set_print_target(Arc::clone(&target));
        interp
            .run(&call("print", vec![Command::string("x")]), &scope)
            .unwrap();
        assert_eq!(target.get_output(), "x");
        assert_eq!(interp.print_handler().get_output(), "");
    }

    #[test]
    fn channel_builtin_respects_capacity() {
        let (mut interp, ctx) = setup();
        let value = interp.run(&call("channel", vec![Command::int(2)]), &ctx).unwrap();
        let Value::Channel(ch) = value else {
            panic!("expected a channel");
        };
        assert_eq!(ch.capacity(), Some(2));
        let unbounded = interp.run(&call("channel", Vec::new()), &ctx).unwrap();
        assert!(matches!(unbounded, Value::Channel(ch) if ch.capacity().is_none()));
    }

    #[test]
    fn incoming_outside_task_fails() {
        let (mut interp, ctx) = setup();
        let err = interp.run(&call("incoming", Vec::new()), &ctx).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::YieldOutsideTask);
    }

    #[test]
    fn evaluate_passes_plain_values_through() {
        let (mut interp, ctx) = setup();
        let value = interp.run(&call("evaluate", vec![Command::int(4)]), &ctx).unwrap();
        assert_eq!(value, Value::Int(4));
    }

    #[test]
    fn sleep_reports_elapsed_seconds() {
        let (mut interp, ctx) = setup();
        let value = interp
            .run(&call("sleep", vec![Command::float(0.01)]), &ctx)
            .unwrap();
        assert!(value.as_float().unwrap() >= 0.01);
    }

    #[test]
    fn flow_sentinels_are_globals() {
        let (mut interp, ctx) = setup();
        let fini = interp.run(&Command::ident("fini"), &ctx).unwrap();
        assert_eq!(fini, Value::Sentinel(Sentinel::Fini));
        let scope = ctx.thread();
        let non_mutat = interp.run(&Command::ident("non_mutat"), &scope).unwrap();
        assert_eq!(non_mutat.to_string(), "non_mutat");
        assert_eq!(non_mutat.type_name(), "sentinel");
    }

    #[test]
    fn type_names() {
        let (mut interp, ctx) = setup();
        let value = interp
            .run(&call("type", vec![Command::string("s")]), &ctx)
            .unwrap();
        assert_eq!(value, Value::string("str"));
    }
}

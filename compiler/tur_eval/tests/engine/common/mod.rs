//! Shared setup for engine tests.

use tur_eval::{builtins, Context, EvalMode, EvalResult, Interpreter};
use tur_ir::{Argument, Command, FunctionDef, Name, ParameterList};

/// A test-mode interpreter and a root Context with the built-ins installed.
pub fn setup() -> (Interpreter, Context) {
    let ctx = Context::new();
    builtins::install(&ctx);
    (Interpreter::builder().mode(EvalMode::TestRun).build(), ctx)
}

/// Run `commands` as one block in a fresh setup.
pub fn eval(commands: Vec<Command>) -> EvalResult {
    let (mut interp, ctx) = setup();
    run(&mut interp, &ctx, commands)
}

/// Run `commands` directly in `ctx`, so their bindings stay visible.
pub fn run(interp: &mut Interpreter, ctx: &Context, commands: Vec<Command>) -> EvalResult {
    let mut last = Ok(tur_eval::Value::None);
    for command in commands {
        last = interp.run(&command, ctx);
        if last.is_err() {
            break;
        }
    }
    last
}

/// `name(args)` with positional arguments only.
pub fn call(name: &str, args: Vec<Command>) -> Command {
    Command::call(
        Command::ident(name),
        args.into_iter().map(Argument::positional).collect(),
    )
}

/// `fn name(params) { body }`
pub fn function(name: &str, params: ParameterList, body: Command) -> Command {
    Command::function(FunctionDef::closure(Some(Name::new(name)), params, body))
}

pub fn names(list: &[&str]) -> Vec<Name> {
    list.iter().map(|n| Name::new(*n)).collect()
}

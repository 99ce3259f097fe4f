//! The command-tree interpreter.
//!
//! One `Interpreter` runs one sequential command stream: the main program,
//! a task body or a flow cell. It owns everything that is per-stream:
//!
//! - `Fuel`: the step budget, deadline and stop token checked by `step()`
//! - `CallStack`: live frames for depth limits and backtraces
//! - the print handler used when no Context print target is set
//! - the `Yielder` when the stream is a task body
//!
//! Scope state lives in `Context`s, which are shared; interpreters are
//! not. A task gets a fresh interpreter built by `spawn_child`.

mod builder;
mod call_stack;
mod exec;
mod fuel;
mod operators;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tur_ir::{Command, Name};

use crate::channel::Yielder;
use crate::context::Context;
use crate::errors::{ControlFlow, EvalResult};
use crate::eval_mode::EvalMode;
use crate::print_handler::SharedPrintHandler;
use crate::stack::ensure_sufficient_stack;

pub use builder::InterpreterBuilder;
pub use call_stack::{CallFrame, CallStack};
pub use fuel::{Fuel, StopToken};

/// Counter for generated task names, shared by every interpreter spawned
/// from the same root.
#[derive(Clone, Debug, Default)]
pub(crate) struct TaskCounter(Arc<AtomicU64>);

impl TaskCounter {
    pub(crate) fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct Interpreter {
    name: Name,
    mode: EvalMode,
    fuel: Fuel,
    pub(crate) call_stack: CallStack,
    print_handler: SharedPrintHandler,
    yielder: Option<Yielder>,
    pub(crate) task_counter: TaskCounter,
}

impl Interpreter {
    /// An interpreter in `Interpret` mode printing to stdout.
    pub fn new() -> Self {
        InterpreterBuilder::new().build()
    }

    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder::new()
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[inline]
    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    #[inline]
    pub fn fuel(&self) -> &Fuel {
        &self.fuel
    }

    #[inline]
    pub fn print_handler(&self) -> &SharedPrintHandler {
        &self.print_handler
    }

    /// The channel pair of the task this interpreter runs, if any.
    #[inline]
    pub fn yielder(&self) -> Option<&Yielder> {
        self.yielder.as_ref()
    }

    #[inline]
    pub fn stop_token(&self) -> &StopToken {
        self.fuel.stop_token()
    }

    /// Burn one unit of fuel. The single budget and cancellation check.
    #[inline]
    pub fn step(&mut self) -> Result<(), crate::errors::EvalError> {
        self.fuel.step()
    }

    /// Execute one command.
    pub fn execute(&mut self, command: &Command, ctx: &Context) -> EvalResult {
        self.step()?;
        ensure_sufficient_stack(|| self.exec(command, ctx))
    }

    /// Execute a top-level program: a `return` outside any function ends
    /// the program with its value.
    pub fn run(&mut self, command: &Command, ctx: &Context) -> EvalResult {
        match self.execute(command, ctx) {
            Err(err) => match err.control_flow {
                Some(ControlFlow::Return(value)) => Ok(value),
                None => Err(self.call_stack.attach_backtrace(err)),
            },
            ok => ok,
        }
    }

    /// Execute a sequence in `ctx`, yielding the last value (none when empty).
    pub fn execute_sequence(&mut self, commands: &[Command], ctx: &Context) -> EvalResult {
        let mut last = crate::value::Value::None;
        for command in commands {
            last = self.execute(command, ctx)?;
        }
        Ok(last)
    }

    /// The interpreter for a task spawned from this one: same mode, print
    /// handler and name counter; fresh call stack, its own yielder and stop
    /// token, and the tighter of the inherited and requested limits.
    pub(crate) fn spawn_child(
        &self,
        name: Name,
        yielder: Yielder,
        stop: StopToken,
        steps: Option<u64>,
        time: Option<Duration>,
    ) -> Interpreter {
        let limit = match (self.mode.step_limit(), steps) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        InterpreterBuilder::new()
            .name(name)
            .mode(self.mode)
            .print_handler(Arc::clone(&self.print_handler))
            .yielder(yielder)
            .stop_token(stop)
            .step_limit(limit)
            .time_limit(time)
            .task_counter(self.task_counter.clone())
            .build()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

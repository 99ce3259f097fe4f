//! `InterpreterBuilder` for configuring an `Interpreter`.

use std::time::Duration;

use tur_ir::Name;

use super::{CallStack, Fuel, Interpreter, StopToken, TaskCounter};
use crate::channel::Yielder;
use crate::eval_mode::EvalMode;
use crate::print_handler::{buffer_handler, stdout_handler, SharedPrintHandler};

/// Builder for `Interpreter`.
///
/// The mode supplies defaults (step limit, depth limit, output capture);
/// explicit settings override them.
#[derive(Default)]
pub struct InterpreterBuilder {
    name: Option<Name>,
    mode: EvalMode,
    print_handler: Option<SharedPrintHandler>,
    step_limit: Option<Option<u64>>,
    time_limit: Option<Duration>,
    max_depth: Option<Option<usize>>,
    yielder: Option<Yielder>,
    stop: Option<StopToken>,
    task_counter: Option<TaskCounter>,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name shown in backtraces and task handles. Defaults to `main`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Name>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Default is a buffer in `TestRun` mode, stdout otherwise.
    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.print_handler = Some(handler);
        self
    }

    /// Override the mode's step limit. `None` removes it.
    #[must_use]
    pub fn step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    /// Override the mode's call depth limit. `None` removes it.
    #[must_use]
    pub fn max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn yielder(mut self, yielder: Yielder) -> Self {
        self.yielder = Some(yielder);
        self
    }

    #[must_use]
    pub fn stop_token(mut self, stop: StopToken) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub(crate) fn task_counter(mut self, counter: TaskCounter) -> Self {
        self.task_counter = Some(counter);
        self
    }

    pub fn build(self) -> Interpreter {
        let mode = self.mode;
        let print_handler = self.print_handler.unwrap_or_else(|| {
            if mode.captures_output() {
                buffer_handler()
            } else {
                stdout_handler()
            }
        });
        let step_limit = self.step_limit.unwrap_or_else(|| mode.step_limit());
        let max_depth = self.max_depth.unwrap_or_else(|| mode.max_recursion_depth());
        Interpreter {
            name: self.name.unwrap_or_else(|| Name::new("main")),
            mode,
            fuel: Fuel::new(step_limit, self.time_limit, self.stop.unwrap_or_default()),
            call_stack: CallStack::new(max_depth),
            print_handler,
            yielder: self.yielder,
            task_counter: self.task_counter.unwrap_or_default(),
        }
    }
}

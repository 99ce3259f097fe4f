//! Tur Eval - execution engine for Turicum command trees.
//!
//! # Architecture
//!
//! - `Context`: lexical scopes with freezing, a shared global table and
//!   the private snapshots tasks start from
//! - `binder`: maps call-site arguments onto declared parameters
//! - `Callable`: closures, macros and chains with curried state
//! - `Channel`: bounded blocking queues; a pair forms a task's `Yielder`
//! - `task`: `async`/`await` on named threads
//! - `flow`: the reactive cell scheduler
//! - `Interpreter`: executes commands, owns the call stack and the fuel
//!   budget every step is charged to
//!
//! Programs arrive as `tur_ir::Command` trees; parsing is not part of this
//! crate.

mod binder;
pub mod builtins;
mod callable;
mod channel;
mod context;
pub mod errors;
mod eval_mode;
mod flow;
pub mod interpreter;
mod print_handler;
mod stack;
pub mod task;
mod value;

use std::sync::Once;

pub use binder::{bind_arguments, CallArg};
pub use callable::{is_callable, Body, Callable, FunctionValue};
pub use channel::{Channel, Message, Yielder};
pub use context::{Context, Variable};
pub use errors::{ControlFlow, EvalBacktrace, EvalError, EvalErrorKind, EvalResult};
pub use eval_mode::EvalMode;
pub use interpreter::{Interpreter, InterpreterBuilder, StopToken};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler,
};
pub use task::{ListenerId, TaskHandle, TaskOptions};
pub use value::{
    ClassValue, FieldProvider, NativeFn, NativeFunction, ObjectValue, Sentinel, Value,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call more than once. Does nothing unless `RUST_LOG` is set, e.g.
/// `RUST_LOG=tur_eval=debug`. With `TURICUM_LOG_TREE` set, spans are
/// rendered as an indented tree instead of flat lines.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        if std::env::var_os("TURICUM_LOG_TREE").is_some() {
            tracing_subscriber::registry()
                .with(
                    tracing_tree::HierarchicalLayer::new(2)
                        .with_targets(true)
                        .with_thread_names(true),
                )
                .with(filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_level(true)
                        .with_thread_names(true),
                )
                .with(filter)
                .init();
        }
    });
}

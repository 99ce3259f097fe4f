//! Error types for command execution.
//!
//! # Structured Error Categories
//!
//! `EvalErrorKind` carries the typed category; `EvalError` wraps it with the
//! rendered message, an optional cause, an optional backtrace and notes.
//! Factory functions (e.g., `undefined_variable()`) are the public API for
//! creating errors; they populate both `kind` and `message`.
//!
//! `return` travels on the error path as a `ControlFlow` signal and is
//! consumed at the call boundary, never surfacing as a failure.

use std::fmt;

use tur_ir::Name;

use crate::value::Value;

/// Result of executing a command.
pub type EvalResult = Result<Value, EvalError>;

/// Non-error signals carried on the error path.
#[derive(Clone, Debug)]
pub enum ControlFlow {
    /// `return` with its value.
    Return(Value),
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalErrorKind {
    // Scope
    #[error("variable '{name}' is undefined")]
    UndefinedVariable { name: String },
    #[error("variable '{name}' is pinned")]
    FrozenVariableAssignment { name: String },
    #[error("variable '{name}' is already defined")]
    AlreadyDefined { name: String },
    #[error("variable '{name}' is already pinned")]
    AlreadyFrozen { name: String },
    #[error("variable '{name}' is not defined in the local context, you cannot unlet it")]
    NotLocal { name: String },

    // Binding
    #[error("parameter '{name}' is not defined")]
    MissingArgument { name: String },
    #[error("too many parameters, and there is no [rest] specified")]
    TooManyArguments,
    #[error("parameter '{name}' is already defined")]
    DuplicateArgument { name: String },
    #[error("the parameter '{name}' is not defined and there is no {{meta}} parameter")]
    UnknownArgument { name: String },
    #[error("the parameter '{name}' is positional only, specified by name and there is no {{meta}} parameter")]
    PositionalOnlyByName { name: String },
    #[error("you can only spread objects and lists, not '{type_name}'")]
    InvalidSpread { type_name: String },
    #[error("value of type '{got}' does not fit declared type [{expected}] of '{name}'")]
    TypeMismatch {
        name: String,
        expected: String,
        got: String,
    },

    // Callables
    #[error("{type_name} is not callable")]
    NotCallable { type_name: String },
    #[error("cannot curry a method to different objects")]
    CurryConflict,
    #[error("'{name}' is not curried")]
    NotCurried { name: String },
    #[error("no field '{field}' on {type_name}")]
    UndefinedField { field: String, type_name: String },
    #[error("maximum recursion depth exceeded (limit: {depth})")]
    StackOverflow { depth: usize },

    // Operators
    #[error("division by zero")]
    DivisionByZero,
    #[error("cannot apply operator `{op}` to `{left}` and `{right}`")]
    BinaryTypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    // Concurrency
    #[error("channel is closed")]
    ChannelClosed,
    #[error("yield is used outside of an async task")]
    YieldOutsideTask,
    #[error("task '{task}' failed")]
    TaskExecutionFailure { task: String },
    #[error("task stopped")]
    TaskStopped,
    #[error("step limit {limit} reached")]
    StepLimitReached { limit: u64 },
    #[error("time limit reached")]
    TimeLimitReached,

    // Flow
    #[error("flow '{flow}' timed out after {millis} ms")]
    FlowTimeout { flow: String, millis: u128 },
    #[error("task limit has been reached in flow '{flow}' after {scheduled} tasks")]
    FlowLimitExceeded { flow: String, scheduled: u64 },
    #[error("invalid flow '{flow}': {reason}")]
    InvalidFlow { flow: String, reason: String },

    /// Catch-all for errors without a structured category.
    #[error("{message}")]
    Custom { message: String },
}

/// A single frame in an evaluation backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Function, method or task name.
    pub name: String,
}

/// Snapshot of the call stack at an error site.
///
/// Captured from `CallStack` when an error leaves a call frame. A task's
/// failure keeps the backtrace of the task's own interpreter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "stack backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            writeln!(f, "  {i}: {}", frame.name)?;
        }
        Ok(())
    }
}

/// Evaluation error.
#[derive(Clone, Debug)]
pub struct EvalError {
    /// Structured error category.
    pub kind: EvalErrorKind,
    /// Human-readable message, rendered from `kind`.
    pub message: String,
    /// The failure this one wraps (task and flow failures).
    pub cause: Option<Box<EvalError>>,
    /// Set for control flow signals that travel on the error path.
    pub control_flow: Option<ControlFlow>,
    /// Call stack at the error site.
    pub backtrace: Option<EvalBacktrace>,
    /// Secondary context.
    pub notes: Vec<String>,
}

impl EvalError {
    /// Create an error with just a message (`Custom` kind).
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(EvalErrorKind::Custom {
            message: message.clone(),
        })
        .with_message(message)
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            cause: None,
            control_flow: None,
            backtrace: None,
            notes: Vec::new(),
        }
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }

    /// Create a `return` signal.
    pub fn return_with(value: Value) -> Self {
        let mut err = Self::from_kind(EvalErrorKind::Custom {
            message: "return".to_string(),
        });
        err.control_flow = Some(ControlFlow::Return(value));
        err
    }

    /// Attach the wrapped failure.
    #[must_use]
    pub fn with_cause(mut self, cause: EvalError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attach a backtrace unless one is already present.
    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        if self.backtrace.is_none() && !backtrace.is_empty() {
            self.backtrace = Some(backtrace);
        }
        self
    }

    /// Add a context note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Check if this error is a control flow signal.
    #[inline]
    pub fn is_control_flow(&self) -> bool {
        self.control_flow.is_some()
    }

    /// The innermost wrapped failure (self when there is no cause).
    pub fn root_cause(&self) -> &EvalError {
        let mut current = self;
        while let Some(cause) = &current.cause {
            current = cause;
        }
        current
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        for note in &self.notes {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

// Scope errors

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn frozen_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FrozenVariableAssignment {
        name: name.to_string(),
    })
}

#[cold]
pub fn already_defined(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::AlreadyDefined {
        name: name.to_string(),
    })
}

#[cold]
pub fn already_frozen(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::AlreadyFrozen {
        name: name.to_string(),
    })
}

#[cold]
pub fn not_local(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotLocal {
        name: name.to_string(),
    })
}

// Binding errors

#[cold]
pub fn missing_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MissingArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn too_many_arguments() -> EvalError {
    EvalError::from_kind(EvalErrorKind::TooManyArguments)
}

#[cold]
pub fn duplicate_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DuplicateArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn unknown_argument(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnknownArgument {
        name: name.to_string(),
    })
}

#[cold]
pub fn positional_only_by_name(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::PositionalOnlyByName {
        name: name.to_string(),
    })
}

#[cold]
pub fn invalid_spread(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidSpread {
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn type_mismatch(name: &str, expected: &[Name], got: &str) -> EvalError {
    let expected = expected
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        name: name.to_string(),
        expected,
        got: got.to_string(),
    })
}

// Callable errors

#[cold]
pub fn not_callable(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn curry_conflict() -> EvalError {
    EvalError::from_kind(EvalErrorKind::CurryConflict)
}

#[cold]
pub fn not_curried(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCurried {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_field(field: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedField {
        field: field.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn recursion_limit_exceeded(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

// Operator errors

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn binary_type_mismatch(op: &str, left: &str, right: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::BinaryTypeMismatch {
        op: op.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    })
}

// Concurrency errors

#[cold]
pub fn channel_closed() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ChannelClosed)
}

#[cold]
pub fn yield_outside_task() -> EvalError {
    EvalError::from_kind(EvalErrorKind::YieldOutsideTask)
}

/// Wrap a failure raised inside a task so the awaiting side sees it
/// attributed to that task, with the task's own backtrace.
#[cold]
pub fn task_execution_failure(task: &str, cause: EvalError) -> EvalError {
    let backtrace = cause.backtrace.clone();
    let mut err = EvalError::from_kind(EvalErrorKind::TaskExecutionFailure {
        task: task.to_string(),
    })
    .with_cause(cause);
    err.backtrace = backtrace;
    err
}

#[cold]
pub fn task_stopped() -> EvalError {
    EvalError::from_kind(EvalErrorKind::TaskStopped)
}

#[cold]
pub fn step_limit_reached(limit: u64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StepLimitReached { limit })
}

#[cold]
pub fn time_limit_reached() -> EvalError {
    EvalError::from_kind(EvalErrorKind::TimeLimitReached)
}

// Flow errors

#[cold]
pub fn flow_timeout(flow: &str, millis: u128) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FlowTimeout {
        flow: flow.to_string(),
        millis,
    })
}

#[cold]
pub fn flow_limit_exceeded(flow: &str, scheduled: u64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FlowLimitExceeded {
        flow: flow.to_string(),
        scheduled,
    })
}

#[cold]
pub fn invalid_flow(flow: &str, reason: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidFlow {
        flow: flow.to_string(),
        reason: reason.into(),
    })
}

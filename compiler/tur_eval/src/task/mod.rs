//! Asynchronous evaluation.
//!
//! `async` runs a command on its own named thread. The task never sees the
//! spawner's scopes: it starts from a frozen snapshot of every binding
//! visible at the spawn point, wrapped so the body can shadow with `let`.
//! Only the global table and the task's `Yielder` channels are shared.
//!
//! Completion is published once into the handle. Waiters block on a
//! condition variable; racers (`await [t1, t2]`, the flow loop) register a
//! `crossbeam` sender and receive the handle that finished. A racer that
//! gives up unsubscribes again.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self as xchan, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use tur_ir::{AsyncOptions, Command, Name};

use crate::channel::Yielder;
use crate::context::Context;
use crate::errors::{task_execution_failure, EvalError, EvalResult};
use crate::interpreter::{CallFrame, Interpreter, StopToken};
use crate::value::{FieldProvider, NativeFunction, Value};

/// Spawn options, evaluated.
#[derive(Clone, Debug, Default)]
pub struct TaskOptions {
    /// Capacity of the spawner-to-task channel.
    pub in_capacity: Option<usize>,
    /// Capacity of the task-to-spawner channel.
    pub out_capacity: Option<usize>,
    pub steps: Option<u64>,
    pub time: Option<Duration>,
}

impl TaskOptions {
    fn evaluate(
        interp: &mut Interpreter,
        options: &AsyncOptions,
        ctx: &Context,
    ) -> Result<Self, EvalError> {
        let mut eval = |command: &Option<Box<Command>>| -> Result<Option<Value>, EvalError> {
            match command {
                Some(command) => interp.execute(command, ctx).map(Some),
                None => Ok(None),
            }
        };
        Ok(TaskOptions {
            in_capacity: eval(&options.in_capacity)?
                .map(|v| count(&v, "in"))
                .transpose()?,
            out_capacity: eval(&options.out_capacity)?
                .map(|v| count(&v, "out"))
                .transpose()?,
            steps: eval(&options.steps)?
                .map(|v| count(&v, "steps").map(|n| u64::try_from(n).unwrap_or(u64::MAX)))
                .transpose()?,
            time: eval(&options.time)?.map(|v| seconds(&v)).transpose()?,
        })
    }
}

fn count(value: &Value, option: &str) -> Result<usize, EvalError> {
    value
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            EvalError::new(format!(
                "option '{option}' must be a non-negative integer, got {}",
                value.type_name()
            ))
        })
}

/// A duration given in (possibly fractional) seconds.
pub(crate) fn seconds(value: &Value) -> Result<Duration, EvalError> {
    value
        .as_float()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| EvalError::new(format!("'{value}' is not a valid number of seconds")))
}

/// Registration of a completion listener on one task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

struct TaskState {
    result: Option<Result<Value, EvalError>>,
    listeners: Vec<(ListenerId, Sender<TaskHandle>)>,
    next_listener: u64,
}

struct TaskInner {
    name: RwLock<Name>,
    state: Mutex<TaskState>,
    done: Condvar,
    yielder: Yielder,
    stop: StopToken,
}

/// Handle to a spawned task. Cloning shares the task.
#[derive(Clone)]
pub struct TaskHandle(Arc<TaskInner>);

impl TaskHandle {
    fn new(name: Name, yielder: Yielder, stop: StopToken) -> Self {
        TaskHandle(Arc::new(TaskInner {
            name: RwLock::new(name),
            state: Mutex::new(TaskState {
                result: None,
                listeners: Vec::new(),
                next_listener: 0,
            }),
            done: Condvar::new(),
            yielder,
            stop,
        }))
    }

    pub fn name(&self) -> Name {
        self.0.name.read().clone()
    }

    pub fn set_name(&self, name: Name) {
        *self.0.name.write() = name;
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    #[inline]
    pub fn yielder(&self) -> &Yielder {
        &self.0.yielder
    }

    pub fn is_done(&self) -> bool {
        self.0.state.lock().result.is_some()
    }

    /// The outcome, if the task has finished.
    pub fn result(&self) -> Option<Result<Value, EvalError>> {
        self.0.state.lock().result.clone()
    }

    /// Block until the task finishes. A failure inside the task comes back
    /// as `TaskExecutionFailure`.
    pub fn wait(&self) -> EvalResult {
        let mut state = self.0.state.lock();
        loop {
            if let Some(result) = &state.result {
                return result.clone();
            }
            self.0.done.wait(&mut state);
        }
    }

    /// Block at most `timeout`. `None` when the task is still running; it
    /// keeps running. A timeout past the end of the clock waits without
    /// limit.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<EvalResult> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.wait());
        };
        let mut state = self.0.state.lock();
        loop {
            if let Some(result) = &state.result {
                return Some(result.clone());
            }
            if self.0.done.wait_until(&mut state, deadline).timed_out() {
                return state.result.clone();
            }
        }
    }

    /// Ask the task to stop at its next step and close its channels.
    pub fn stop(&self) {
        self.0.stop.stop();
        self.0.yielder.close();
    }

    /// Send this handle on `listener` once the task finishes (immediately
    /// when it already has).
    pub fn subscribe(&self, listener: Sender<TaskHandle>) -> ListenerId {
        let mut state = self.0.state.lock();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        if state.result.is_some() {
            drop(state);
            // A dropped receiver means nobody waits any more.
            let _ = listener.send(self.clone());
        } else {
            state.listeners.push((id, listener));
        }
        id
    }

    /// Drop a listener that has not been notified yet.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.0
            .state
            .lock()
            .listeners
            .retain(|(listener, _)| *listener != id);
    }

    fn complete(&self, result: EvalResult) {
        let listeners = {
            let mut state = self.0.state.lock();
            state.result = Some(result);
            std::mem::take(&mut state.listeners)
        };
        self.0.done.notify_all();
        self.0.yielder.to_parent.close();
        for (_, listener) in listeners {
            let _ = listener.send(self.clone());
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name())
            .field("done", &self.is_done())
            .finish()
    }
}

const TASK_METHODS: [&str; 14] = [
    "name",
    "set_name",
    "is_done",
    "get",
    "is_err",
    "get_err",
    "send",
    "close",
    "receive",
    "try_receive",
    "next",
    "has_next",
    "stop",
    "is_stopped",
];

impl FieldProvider for TaskHandle {
    fn get_field(&self, name: &str) -> Option<Value> {
        let task = self.clone();
        let method = match name {
            "name" => NativeFunction::new(name, move |_, _, _| {
                Ok(Value::string(task.name().as_str()))
            }),
            "set_name" => NativeFunction::new(name, move |_, _, args| {
                let new_name = args.first().map(ToString::to_string).unwrap_or_default();
                task.set_name(Name::new(new_name));
                Ok(Value::None)
            }),
            "is_done" => NativeFunction::new(name, move |_, _, _| Ok(Value::Bool(task.is_done()))),
            "get" => NativeFunction::new(name, move |_, _, _| task.wait()),
            "is_err" => NativeFunction::new(name, move |_, _, _| {
                Ok(Value::Bool(task.wait().is_err()))
            }),
            "get_err" => NativeFunction::new(name, move |_, _, _| {
                Ok(task.wait().err().map_or(Value::None, Value::error))
            }),
            "send" => NativeFunction::new(name, move |_, _, args| {
                let value = args.into_iter().next().unwrap_or(Value::None);
                task.yielder().to_child.send(value).map(|()| Value::None)
            }),
            "close" => NativeFunction::new(name, move |_, _, _| {
                task.yielder().to_child.close();
                Ok(Value::None)
            }),
            "receive" | "next" => {
                NativeFunction::new(name, move |_, _, _| task.yielder().to_parent.receive())
            }
            "try_receive" => NativeFunction::new(name, move |_, _, _| {
                Ok(task.yielder().to_parent.try_receive().unwrap_or(Value::None))
            }),
            "has_next" => NativeFunction::new(name, move |_, _, _| {
                Ok(Value::Bool(task.yielder().to_parent.has_next()))
            }),
            "stop" => NativeFunction::new(name, move |_, _, _| {
                task.stop();
                Ok(Value::None)
            }),
            "is_stopped" => NativeFunction::new(name, move |_, _, _| {
                Ok(Value::Bool(task.0.stop.is_stopped()))
            }),
            _ => return None,
        };
        Some(Value::Native(method))
    }

    fn fields(&self) -> Vec<Name> {
        TASK_METHODS.iter().map(|m| Name::new(m)).collect()
    }
}

/// Start `command` as a task of `interp`, isolated from `ctx` by a
/// snapshot.
pub fn spawn(
    interp: &Interpreter,
    command: Arc<Command>,
    options: TaskOptions,
    ctx: &Context,
) -> Result<TaskHandle, EvalError> {
    let name = Name::new(format!("task-{}", interp.task_counter.next()));
    spawn_named(interp, name, command, options, &ctx.snapshot())
}

/// Start `command` in a wrap of `root`, which must already be private to
/// the task.
pub(crate) fn spawn_named(
    interp: &Interpreter,
    name: Name,
    command: Arc<Command>,
    options: TaskOptions,
    root: &Context,
) -> Result<TaskHandle, EvalError> {
    let yielder = Yielder::new(options.in_capacity, options.out_capacity);
    let stop = StopToken::new();
    let handle = TaskHandle::new(name.clone(), yielder.clone(), stop.clone());
    let mut child = interp.spawn_child(name.clone(), yielder, stop, options.steps, options.time);
    let task_ctx = root.wrap();
    let completion = handle.clone();
    let span = tracing::debug_span!("task", name = %name);
    tracing::debug!(task = %name, steps = ?options.steps, "spawning task");

    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _guard = span.enter();
            let frame = CallFrame {
                name: child.name().clone(),
            };
            let result = child
                .call_stack
                .push(frame)
                .and_then(|()| child.run(&command, &task_ctx))
                .map_err(|err| {
                    tracing::debug!(error = %err, "task failed");
                    task_execution_failure(child.name().as_str(), err)
                });
            completion.complete(result);
        })
        .map_err(|err| EvalError::new(format!("cannot start task '{name}': {err}")))?;
    Ok(handle)
}

/// `async body`. A list body spawns one task per element.
pub(crate) fn eval_async(
    interp: &mut Interpreter,
    body: &Arc<Command>,
    options: &AsyncOptions,
    ctx: &Context,
) -> EvalResult {
    let options = TaskOptions::evaluate(interp, options, ctx)?;
    match &**body {
        Command::List(items) => {
            let handles = items
                .iter()
                .map(|item| {
                    spawn(interp, Arc::new(item.clone()), options.clone(), ctx).map(Value::Task)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::list(handles))
        }
        _ => spawn(interp, Arc::clone(body), options, ctx).map(Value::Task),
    }
}

/// `await target [timeout]`. A task is waited for, a list of tasks is
/// raced, any other value is already complete. A timeout that elapses
/// yields `none`.
pub(crate) fn await_value(target: &Value, timeout: Option<&Value>) -> EvalResult {
    let timeout = timeout.map(seconds).transpose()?;
    match target {
        Value::Task(task) => match timeout {
            Some(timeout) => task.wait_timeout(timeout).unwrap_or(Ok(Value::None)),
            None => task.wait(),
        },
        Value::List(items) => race(items, timeout),
        other => Ok(other.clone()),
    }
}

/// Wait for the first task of `items` to finish. Non-task elements count as
/// finished already.
fn race(items: &[Value], timeout: Option<Duration>) -> EvalResult {
    let mut tasks = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Task(task) => tasks.push(task),
            other => return Ok(other.clone()),
        }
    }
    if tasks.is_empty() {
        return Ok(Value::None);
    }
    let (tx, rx) = xchan::unbounded();
    let subscriptions: Vec<(&TaskHandle, ListenerId)> = tasks
        .into_iter()
        .map(|task| (task, task.subscribe(tx.clone())))
        .collect();
    drop(tx);
    let winner = match timeout {
        Some(timeout) => rx.recv_timeout(timeout).ok(),
        None => rx.recv().ok(),
    };
    for (task, id) in subscriptions {
        task.unsubscribe(id);
    }
    match winner {
        Some(winner) => winner.wait(),
        None if timeout.is_some() => Ok(Value::None),
        None => Err(EvalError::new("no task in the list can finish")),
    }
}

//! Reactive flows.
//!
//! A flow is a fixed set of named cells. Each cell runs as a task on a
//! frozen snapshot of the flow's shared Context; when it finishes, the
//! orchestrating loop compares its value with the one recorded for the cell
//! and, only when it changed, records it and schedules every cell reading
//! it. The shared Context is written by the loop alone, after a cell has
//! finished.
//!
//! Every cell carries a generation, bumped each time a new value is
//! recorded for it. A run captures the generation when it is scheduled and
//! its result is discarded as stale if the cell was recorded in between.
//!
//! A cell returning `fini` is stopped: it keeps its last value and is never
//! scheduled again. A cell returning `non_mutat` records nothing and
//! schedules nothing.
//!
//! # Termination
//!
//! Scheduling stops when the exit condition holds, when the reschedule
//! limit is used up (`FlowLimitExceeded`) or at the timeout
//! (`FlowTimeout`). Cells already running are never interrupted: the loop
//! keeps draining them and discards their results. The first cell failure
//! aborts the flow.

mod graph;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self as xchan, Receiver, RecvTimeoutError, Sender};
use tur_ir::{Command, FlowDef, Name};

use crate::context::Context;
use crate::errors::{flow_limit_exceeded, flow_timeout, EvalError, EvalResult};
use crate::interpreter::Interpreter;
use crate::task::{seconds, spawn_named, TaskHandle, TaskOptions};
use crate::value::{Sentinel, Value};

use graph::FlowGraph;

const UNNAMED: &str = "#unnamed";

/// Run the flow `def` in a child of `ctx` and evaluate its result
/// expression there.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(flow = def.id.as_ref().map_or(UNNAMED, Name::as_str))
)]
pub(crate) fn run_flow(interp: &mut Interpreter, def: &Arc<FlowDef>, ctx: &Context) -> EvalResult {
    let id = def.id.as_ref().map_or(UNNAMED, Name::as_str);
    let graph = FlowGraph::analyze(id, &def.cells)?;
    let shared = ctx.wrap();
    let limit = match &def.limit {
        Some(limit) => Some(flow_limit(id, &interp.execute(limit, &shared)?)?),
        None => None,
    };
    let timeout = match &def.timeout {
        Some(timeout) => Some(seconds(&interp.execute(timeout, &shared)?)?),
        None => None,
    };

    let (done_tx, done_rx) = xchan::unbounded();
    let mut run = FlowRun {
        id,
        def,
        graph,
        shared,
        in_flight: Vec::new(),
        generations: vec![0; def.cells.len()],
        stopped: vec![false; def.cells.len()],
        done_tx,
        done_rx,
        remaining: limit,
        scheduled: 0,
        deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
        timeout,
        exiting: false,
        stop_reason: None,
    };
    run.start(interp)?;
    run.drive(interp)?;
    if let Some(err) = run.stop_reason {
        return Err(err);
    }
    match &def.result {
        Some(result) => interp.execute(result, &run.shared),
        None => Ok(Value::None),
    }
}

fn flow_limit(flow: &str, value: &Value) -> Result<u64, EvalError> {
    value
        .as_int()
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            EvalError::new(format!(
                "the limit of flow '{flow}' must be a non-negative integer, got {value}"
            ))
        })
}

/// One scheduled execution of a cell.
struct CellRun {
    task: TaskHandle,
    cell: usize,
    /// The cell's generation when the run was scheduled.
    generation: u64,
}

/// A finished cell run.
struct CellResult {
    cell: usize,
    generation: u64,
    value: Value,
}

/// State of one flow execution.
struct FlowRun<'a> {
    id: &'a str,
    def: &'a FlowDef,
    graph: FlowGraph,
    shared: Context,
    /// Running cell tasks.
    in_flight: Vec<CellRun>,
    /// Number of values recorded for each cell.
    generations: Vec<u64>,
    /// Cells that returned `fini`.
    stopped: Vec<bool>,
    done_tx: Sender<TaskHandle>,
    done_rx: Receiver<TaskHandle>,
    /// Reschedules still allowed, `None` when unlimited.
    remaining: Option<u64>,
    scheduled: u64,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    /// Set once no further cell may be scheduled.
    exiting: bool,
    /// The failure reported once the in-flight cells have drained.
    stop_reason: Option<EvalError>,
}

impl FlowRun<'_> {
    /// Run every entry cell, apply all their results, then schedule their
    /// dependents.
    fn start(&mut self, interp: &Interpreter) -> Result<(), EvalError> {
        for cell in self.graph.entries().to_vec() {
            self.schedule(interp, cell)?;
        }
        let mut finished = Vec::with_capacity(self.in_flight.len());
        while !self.in_flight.is_empty() {
            let task = self.receive()?;
            finished.push(self.finish(&task)?);
        }
        let mut changed = Vec::new();
        for result in finished {
            let cell = result.cell;
            if self.apply(result)? {
                changed.push(cell);
            }
        }
        for cell in changed {
            self.schedule_readers(interp, cell)?;
        }
        Ok(())
    }

    /// The event loop: apply results until nothing is in flight.
    fn drive(&mut self, interp: &mut Interpreter) -> Result<(), EvalError> {
        while !self.in_flight.is_empty() {
            let task = match self.deadline {
                Some(deadline) => match self.done_rx.recv_deadline(deadline) {
                    Ok(task) => Some(task),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return Err(self.lost()),
                },
                None => Some(self.receive()?),
            };
            self.check_deadline();
            let Some(task) = task else {
                continue;
            };
            let result = self.finish(&task)?;
            let cell = result.cell;
            if self.exiting {
                tracing::debug!(cell = %self.cell_id(cell), "discarding result after exit");
                continue;
            }
            if self.exit_condition_met(interp) {
                tracing::debug!(cell = %self.cell_id(cell), "exit condition met");
                self.exiting = true;
                continue;
            }
            if self.apply(result)? {
                self.schedule_dependents(interp, cell)?;
            }
        }
        Ok(())
    }

    fn receive(&self) -> Result<TaskHandle, EvalError> {
        self.done_rx.recv().map_err(|_| self.lost())
    }

    fn lost(&self) -> EvalError {
        EvalError::new(format!("flow '{}' lost track of its cells", self.id))
    }

    fn check_deadline(&mut self) {
        let Some(deadline) = self.deadline else {
            return;
        };
        if Instant::now() >= deadline {
            self.deadline = None;
            if !self.exiting {
                let millis = self.timeout.unwrap_or_default().as_millis();
                tracing::debug!(millis, "flow timed out");
                self.exiting = true;
                self.stop_reason = Some(flow_timeout(self.id, millis));
            }
        }
    }

    fn cell_id(&self, cell: usize) -> &Name {
        &self.def.cells[cell].id
    }

    /// Start `cell` on a snapshot of the shared Context.
    fn schedule(&mut self, interp: &Interpreter, cell: usize) -> Result<(), EvalError> {
        let def = &self.def.cells[cell];
        let name = Name::new(format!("{}:{}", def.id, interp.task_counter.next()));
        tracing::debug!(cell = %def.id, task = %name, "scheduling cell");
        let task = spawn_named(
            interp,
            name,
            Arc::clone(&def.command),
            TaskOptions::default(),
            &self.shared.snapshot(),
        )?;
        task.subscribe(self.done_tx.clone());
        self.in_flight.push(CellRun {
            task,
            cell,
            generation: self.generations[cell],
        });
        Ok(())
    }

    /// Schedule every reader of `cell` that is not stopped and return how
    /// many were started.
    fn schedule_readers(&mut self, interp: &Interpreter, cell: usize) -> Result<u64, EvalError> {
        let mut count = 0;
        for dependent in self.graph.dependents(cell).to_vec() {
            if self.stopped[dependent] {
                continue;
            }
            self.schedule(interp, dependent)?;
            count += 1;
        }
        Ok(count)
    }

    /// Schedule the readers of `cell`, charging them to the limit.
    fn schedule_dependents(&mut self, interp: &Interpreter, cell: usize) -> Result<(), EvalError> {
        let count = self.schedule_readers(interp, cell)?;
        self.scheduled += count;
        if let Some(remaining) = self.remaining {
            if count >= remaining {
                self.exiting = true;
                self.stop_reason = Some(flow_limit_exceeded(self.id, self.scheduled));
            } else {
                self.remaining = Some(remaining - count);
            }
        }
        Ok(())
    }

    /// Remove a finished task from the in-flight set and take its value.
    /// A failed cell fails the flow.
    fn finish(&mut self, task: &TaskHandle) -> Result<CellResult, EvalError> {
        let position = self
            .in_flight
            .iter()
            .position(|run| run.task.ptr_eq(task))
            .ok_or_else(|| self.lost())?;
        let CellRun {
            cell, generation, ..
        } = self.in_flight.swap_remove(position);
        let value = task
            .wait()
            .map_err(|err| err.with_note(format!("while in flow '{}'", self.id)))?;
        Ok(CellResult {
            cell,
            generation,
            value,
        })
    }

    /// Apply a finished run to the cell state. Returns whether the readers
    /// of the cell have to run again.
    fn apply(&mut self, result: CellResult) -> Result<bool, EvalError> {
        let CellResult {
            cell,
            generation,
            value,
        } = result;
        match value {
            Value::Sentinel(Sentinel::Fini) => {
                tracing::debug!(cell = %self.cell_id(cell), "cell stopped");
                self.stopped[cell] = true;
                self.generations[cell] += 1;
                Ok(false)
            }
            Value::Sentinel(Sentinel::NonMutat) => Ok(false),
            value => self.record(cell, generation, value),
        }
    }

    /// Record `value` for `cell` if it is not stale and differs from the
    /// recorded one.
    fn record(&mut self, cell: usize, generation: u64, value: Value) -> Result<bool, EvalError> {
        let name = self.cell_id(cell).clone();
        if generation != self.generations[cell] {
            tracing::debug!(cell = %name, generation, "discarding stale result");
            return Ok(false);
        }
        if self
            .shared
            .get_frame(name.as_str())
            .is_some_and(|old| old.same_as(&value))
        {
            tracing::debug!(cell = %name, "cell value unchanged");
            return Ok(false);
        }
        self.shared.local(name, value)?;
        self.generations[cell] += 1;
        Ok(true)
    }

    /// Evaluate the exit condition on the shared Context. A failing
    /// condition counts as not met.
    fn exit_condition_met(&self, interp: &mut Interpreter) -> bool {
        self.def
            .exit_condition
            .as_deref()
            .is_some_and(|condition: &Command| {
                interp
                    .execute(condition, &self.shared)
                    .is_ok_and(|value| value.is_truthy())
            })
    }
}

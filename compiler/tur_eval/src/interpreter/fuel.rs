//! Execution budget and cooperative cancellation.
//!
//! Every executed command burns one unit of fuel through
//! `Interpreter::step()`. That single check enforces the step limit, the
//! wall-clock deadline and the stop token, so a task can be bounded or
//! stopped without interrupting its thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::{step_limit_reached, task_stopped, time_limit_reached, EvalError};

/// Shared stop flag. Cloning shares the flag.
#[derive(Clone, Debug, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; the interpreter observes it at its next step.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Step counter with optional limits.
#[derive(Clone, Debug, Default)]
pub struct Fuel {
    steps: u64,
    limit: Option<u64>,
    deadline: Option<Instant>,
    stop: StopToken,
}

impl Fuel {
    pub fn new(limit: Option<u64>, time_limit: Option<Duration>, stop: StopToken) -> Self {
        Fuel {
            steps: 0,
            limit,
            deadline: time_limit.and_then(|d| Instant::now().checked_add(d)),
            stop,
        }
    }

    /// Burn one step.
    #[inline]
    pub fn step(&mut self) -> Result<(), EvalError> {
        self.steps = self.steps.saturating_add(1);
        if let Some(limit) = self.limit {
            if self.steps > limit {
                return Err(step_limit_reached(limit));
            }
        }
        if self.stop.is_stopped() {
            return Err(task_stopped());
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(time_limit_reached());
            }
        }
        Ok(())
    }

    #[inline]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    #[inline]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub fn stop_token(&self) -> &StopToken {
        &self.stop
    }
}

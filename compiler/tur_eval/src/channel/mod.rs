//! Bounded FIFO message queues.
//!
//! A `Channel` is a mutex-guarded deque with two condition variables, one
//! signalled when an item arrives and one when a slot frees up. Blocking
//! operations wait on them; `try_*` operations never wait. Closing wakes
//! every waiter.
//!
//! Two channels paired as a `Yielder` connect a task with its spawner.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tur_ir::Name;

use crate::errors::{channel_closed, EvalError};
use crate::value::{FieldProvider, NativeFunction, Value};

/// One queued item.
#[derive(Clone, Debug)]
pub enum Message {
    Value(Value),
    /// A failure forwarded to the receiver; receiving it re-raises it.
    Exception(EvalError),
}

struct State {
    queue: VecDeque<Message>,
    closed: bool,
}

struct ChannelInner {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

/// A shared queue handle. Cloning shares the queue.
#[derive(Clone)]
pub struct Channel(Arc<ChannelInner>);

impl Channel {
    /// `None` is unbounded. A capacity of zero is raised to one.
    pub fn new(capacity: Option<usize>) -> Self {
        Channel(Arc::new(ChannelInner {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: capacity.map(|c| c.max(1)),
        }))
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    #[inline]
    pub fn capacity(&self) -> Option<usize> {
        self.0.capacity
    }

    fn is_full(&self, state: &State) -> bool {
        self.0
            .capacity
            .is_some_and(|cap| state.queue.len() >= cap)
    }

    fn push(&self, mut state: parking_lot::MutexGuard<'_, State>, message: Message) {
        state.queue.push_back(message);
        drop(state);
        self.0.not_empty.notify_one();
    }

    /// Enqueue, waiting for a free slot. Fails once the channel is closed.
    pub fn send(&self, value: Value) -> Result<(), EvalError> {
        self.send_message(Message::Value(value))
    }

    /// Enqueue a failure for the receiver to re-raise.
    pub fn send_exception(&self, err: EvalError) -> Result<(), EvalError> {
        self.send_message(Message::Exception(err))
    }

    fn send_message(&self, message: Message) -> Result<(), EvalError> {
        let mut state = self.0.state.lock();
        loop {
            if state.closed {
                return Err(channel_closed());
            }
            if !self.is_full(&state) {
                self.push(state, message);
                return Ok(());
            }
            self.0.not_full.wait(&mut state);
        }
    }

    /// Enqueue without waiting. `false` when full or closed.
    pub fn try_send(&self, value: Value) -> bool {
        let state = self.0.state.lock();
        if state.closed || self.is_full(&state) {
            return false;
        }
        self.push(state, Message::Value(value));
        true
    }

    fn pop(&self, state: &mut State) -> Option<Message> {
        let message = state.queue.pop_front();
        if message.is_some() {
            self.0.not_full.notify_one();
        }
        message
    }

    /// Dequeue, waiting for an item. Fails on an empty closed channel, and
    /// re-raises exception messages.
    pub fn receive(&self) -> Result<Value, EvalError> {
        let mut state = self.0.state.lock();
        loop {
            if let Some(message) = self.pop(&mut state) {
                return unwrap_message(message);
            }
            if state.closed {
                return Err(channel_closed());
            }
            self.0.not_empty.wait(&mut state);
        }
    }

    /// Dequeue, waiting at most `timeout`. `Ok(None)` when it elapses. A
    /// timeout past the end of the clock waits without limit.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<Option<Value>, EvalError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.receive().map(Some);
        };
        let mut state = self.0.state.lock();
        loop {
            if let Some(message) = self.pop(&mut state) {
                return unwrap_message(message).map(Some);
            }
            if state.closed {
                return Err(channel_closed());
            }
            if self
                .0
                .not_empty
                .wait_until(&mut state, deadline)
                .timed_out()
                && state.queue.is_empty()
            {
                return Ok(None);
            }
        }
    }

    /// Dequeue without waiting. `None` when empty; exception messages come
    /// back as error values.
    pub fn try_receive(&self) -> Option<Value> {
        let mut state = self.0.state.lock();
        self.pop(&mut state).map(|message| match message {
            Message::Value(value) => value,
            Message::Exception(err) => Value::error(err),
        })
    }

    /// Wait until an item is available (`true`) or the channel is closed and
    /// drained (`false`).
    pub fn has_next(&self) -> bool {
        let mut state = self.0.state.lock();
        loop {
            if !state.queue.is_empty() {
                return true;
            }
            if state.closed {
                return false;
            }
            self.0.not_empty.wait(&mut state);
        }
    }

    /// Close the channel. Queued items stay receivable. Idempotent.
    pub fn close(&self) {
        let mut state = self.0.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.0.not_empty.notify_all();
        self.0.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.0.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.0.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive until the channel is closed and drained.
    pub fn drain(&self) -> Result<Vec<Value>, EvalError> {
        let mut items = Vec::new();
        while self.has_next() {
            items.push(self.receive()?);
        }
        Ok(items)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn unwrap_message(message: Message) -> Result<Value, EvalError> {
    match message {
        Message::Value(value) => Ok(value),
        Message::Exception(err) => Err(err),
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("capacity", &self.0.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

const CHANNEL_METHODS: [&str; 9] = [
    "send",
    "receive",
    "try_send",
    "try_receive",
    "close",
    "is_closed",
    "has_next",
    "next",
    "size",
];

impl FieldProvider for Channel {
    fn get_field(&self, name: &str) -> Option<Value> {
        let ch = self.clone();
        let method = match name {
            "send" | "try_send" => {
                let blocking = name == "send";
                NativeFunction::new(name, move |_, _, args| {
                    let value = args.into_iter().next().unwrap_or(Value::None);
                    if blocking {
                        ch.send(value).map(|()| Value::None)
                    } else {
                        Ok(Value::Bool(ch.try_send(value)))
                    }
                })
            }
            "receive" | "next" => NativeFunction::new(name, move |_, _, _| ch.receive()),
            "try_receive" => {
                NativeFunction::new(name, move |_, _, _| Ok(ch.try_receive().unwrap_or(Value::None)))
            }
            "close" => NativeFunction::new(name, move |_, _, _| {
                ch.close();
                Ok(Value::None)
            }),
            "is_closed" => NativeFunction::new(name, move |_, _, _| Ok(Value::Bool(ch.is_closed()))),
            "has_next" => NativeFunction::new(name, move |_, _, _| Ok(Value::Bool(ch.has_next()))),
            "size" => NativeFunction::new(name, move |_, _, _| {
                Ok(Value::Int(i64::try_from(ch.len()).unwrap_or(i64::MAX)))
            }),
            _ => return None,
        };
        Some(Value::Native(method))
    }

    fn fields(&self) -> Vec<Name> {
        CHANNEL_METHODS.iter().map(|m| Name::new(m)).collect()
    }
}

/// The channel pair connecting a task with its spawner.
#[derive(Clone, Debug)]
pub struct Yielder {
    /// Task to spawner (`yield`).
    pub to_parent: Channel,
    /// Spawner to task (`handle.send`, `incoming()` inside the task).
    pub to_child: Channel,
}

impl Yielder {
    pub fn new(in_capacity: Option<usize>, out_capacity: Option<usize>) -> Self {
        Yielder {
            to_parent: Channel::new(out_capacity),
            to_child: Channel::new(in_capacity),
        }
    }

    pub fn close(&self) {
        self.to_parent.close();
        self.to_child.close();
    }
}

//=============================================
// joss/interpreter/concurrency.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Futures, channels and task spawning
// Objective: Back `async`/`await` with a process-wide tokio blocking pool and
//            provide blocking FIFO channels with an explicit closed state
//=============================================

use std::collections::VecDeque;
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::thread;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tracing::debug;

use super::errors::{RuntimeError, Signal};
use super::value::Value;

//=============================================
//            Section 1: Task Runtime
//=============================================

/// Native stack for every thread that evaluates script code. Sized so the
/// default call depth limit trips long before the stack runs out.
pub const SCRIPT_STACK_SIZE: usize = 32 * 1024 * 1024;
const MAX_TASK_THREADS: usize = 256;

static TASK_RUNTIME: OnceCell<Runtime> = OnceCell::new();

fn task_runtime() -> Result<&'static Runtime, RuntimeError> {
    TASK_RUNTIME
        .get_or_try_init(|| {
            Builder::new_current_thread()
                .thread_name("joss-task")
                .thread_stack_size(SCRIPT_STACK_SIZE)
                .max_blocking_threads(MAX_TASK_THREADS)
                .build()
        })
        .map_err(RuntimeError::from)
}

//Function: on_script_stack
//Purpose: Run `job` to completion on a scoped thread with SCRIPT_STACK_SIZE
//Inputs: job: FnOnce() -> R (may borrow from the caller)
//Returns: Result<R, RuntimeError> (Io when the thread cannot be spawned)
pub(crate) fn on_script_stack<F, R>(job: F) -> Result<R, RuntimeError>
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("joss-script".to_string())
            .stack_size(SCRIPT_STACK_SIZE)
            .spawn_scoped(scope, job)?;
        match worker.join() {
            Ok(value) => Ok(value),
            Err(payload) => panic::resume_unwind(payload),
        }
    })
}

/// Outcome of one task: its value, or the signal that escaped it.
pub type TaskOutcome = Result<Value, Signal>;

//Function: spawn_task
//Purpose: Run `job` on an independently scheduled worker
//Inputs: job: FnOnce() -> TaskOutcome
//Returns: Result<FutureHandle, RuntimeError> (returned before the job runs)
pub fn spawn_task<F>(job: F) -> Result<FutureHandle, RuntimeError>
where
    F: FnOnce() -> TaskOutcome + Send + 'static,
{
    let runtime = task_runtime()?;
    let (sender, receiver) = oneshot::channel();
    runtime.spawn_blocking(move || {
        let outcome = job();
        if let Err(signal) = &outcome {
            debug!(fault = ?signal, "async task finished with a fault");
        }
        // The future may have been dropped without being awaited.
        let _ = sender.send(outcome);
    });
    Ok(FutureHandle(Arc::new(Mutex::new(FutureState::Pending(
        receiver,
    )))))
}

//=============================================
//            Section 2: Futures
//=============================================

enum FutureState {
    Pending(oneshot::Receiver<TaskOutcome>),
    Ready(TaskOutcome),
}

/// Completion handle for one spawned task.
#[derive(Clone)]
pub struct FutureHandle(Arc<Mutex<FutureState>>);

impl FutureHandle {
    /// A future that is already resolved.
    pub fn ready(outcome: TaskOutcome) -> Self {
        FutureHandle(Arc::new(Mutex::new(FutureState::Ready(outcome))))
    }

    //Function: wait
    //Purpose: Block until the task completes and return its outcome
    //Inputs: &self
    //Returns: TaskOutcome (repeat waits observe the same outcome)
    pub fn wait(&self) -> TaskOutcome {
        let mut state = self.0.lock();
        let outcome = match std::mem::replace(&mut *state, FutureState::Ready(Ok(Value::Nil))) {
            FutureState::Pending(receiver) => receiver.blocking_recv().unwrap_or_else(|_| {
                Err(Signal::Error(RuntimeError::TaskFailed(
                    "task ended without producing a result".to_string(),
                )))
            }),
            FutureState::Ready(outcome) => outcome,
        };
        *state = FutureState::Ready(outcome.clone());
        outcome
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.0.lock(), FutureState::Ready(_))
    }
}

impl fmt::Debug for FutureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<future>")
    }
}

//=============================================/*
//  A fault inside a task is stored in its future and only resurfaces when
//  the future is awaited.
//============================================*/
//=============================================
//            Section 3: Channels
//=============================================

struct ChannelState {
    queue: VecDeque<Value>,
    capacity: usize,
    closed: bool,
    sent: u64,
    received: u64,
}

struct ChannelInner {
    state: Mutex<ChannelState>,
    changed: Condvar,
}

/// FIFO message queue. Capacity 0 is a rendezvous: `send` returns once a
/// receiver has taken the value.
#[derive(Clone)]
pub struct Channel(Arc<ChannelInner>);

impl Channel {
    pub fn new(capacity: usize) -> Self {
        Channel(Arc::new(ChannelInner {
            state: Mutex::new(ChannelState {
                queue: VecDeque::new(),
                capacity,
                closed: false,
                sent: 0,
                received: 0,
            }),
            changed: Condvar::new(),
        }))
    }

    pub fn send(&self, value: Value) -> Result<(), RuntimeError> {
        let mut state = self.0.state.lock();
        let limit = state.capacity.max(1);
        while !state.closed && state.queue.len() >= limit {
            self.0.changed.wait(&mut state);
        }
        if state.closed {
            return Err(RuntimeError::ChannelClosed);
        }

        state.queue.push_back(value);
        state.sent += 1;
        let ticket = state.sent;
        self.0.changed.notify_all();

        if state.capacity == 0 {
            while state.received < ticket && !state.closed {
                self.0.changed.wait(&mut state);
            }
        }
        Ok(())
    }

    /// Blocks while empty; `None` once the channel is closed and drained.
    pub fn recv(&self) -> Option<Value> {
        let mut state = self.0.state.lock();
        loop {
            if let Some(value) = state.queue.pop_front() {
                state.received += 1;
                self.0.changed.notify_all();
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.0.changed.wait(&mut state);
        }
    }

    pub fn close(&self) -> Result<(), RuntimeError> {
        let mut state = self.0.state.lock();
        if state.closed {
            return Err(RuntimeError::InvalidOperation(
                "close of closed channel".to_string(),
            ));
        }
        state.closed = true;
        self.0.changed.notify_all();
        Ok(())
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

    pub fn ptr_eq(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock();
        f.debug_struct("Channel")
            .field("capacity", &state.capacity)
            .field("buffered", &state.queue.len())
            .field("closed", &state.closed)
            .finish()
    }
}

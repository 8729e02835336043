//! Ordered write queue with a dedicated consumer thread.
//!
//! Decouples a producer (the media pipeline fanning packets out) from a
//! sink whose writes may block (a client socket). The producer only ever
//! appends to a channel; a background thread runs the queued tasks one by
//! one, in order.

use std::fmt;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;

/// Default maximum number of pending tasks per queue.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 256;

/// A unit of deferred work, with everything it needs bound at enqueue time.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Why [`WriteQueue::queue`] rejected a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The consumer is too far behind; the task was dropped.
    #[error("write queue is full")]
    Full,
    /// The queue is not running (never started, or stopped).
    #[error("write queue is closed")]
    Closed,
}

enum State {
    Idle,
    Running {
        tx: Sender<Task>,
        handle: JoinHandle<()>,
    },
    Stopped {
        handle: Option<JoinHandle<()>>,
    },
}

/// FIFO of write tasks drained by one consumer thread.
///
/// Lifecycle: `Idle` → [`start`](Self::start) → `Running` →
/// [`stop`](Self::stop) → `Stopped`. Both transitions are idempotent and
/// may be called from any thread, concurrently with [`queue`](Self::queue).
///
/// The channel itself grows without bound; `capacity` is a safety limit
/// on pending tasks beyond which [`queue`](Self::queue) returns
/// [`QueueError::Full`] so the caller can drop the packet for this one
/// subscriber.
///
/// Tasks queued before `stop` are still executed: the consumer drains the
/// channel before exiting, so a final RTCP BYE is not lost on teardown.
pub struct WriteQueue {
    name: String,
    capacity: usize,
    state: Mutex<State>,
}

impl WriteQueue {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            capacity: capacity.max(1),
            state: Mutex::new(State::Idle),
        }
    }

    /// Spawn the consumer thread. No-op if already running or stopped.
    pub fn start(&self) -> std::io::Result<()> {
        let mut state = self.state.lock();
        if !matches!(*state, State::Idle) {
            return Ok(());
        }

        let (tx, rx) = unbounded::<Task>();
        let handle = thread::Builder::new()
            .name(format!("writer-{}", self.name))
            .spawn(move || {
                for task in rx.iter() {
                    task();
                }
            })?;

        *state = State::Running { tx, handle };
        tracing::debug!(queue = %self.name, capacity = self.capacity, "write queue started");
        Ok(())
    }

    /// Append a task. Never waits for the consumer.
    pub fn queue(&self, task: Task) -> Result<(), QueueError> {
        let state = self.state.lock();
        let State::Running { tx, .. } = &*state else {
            return Err(QueueError::Closed);
        };

        if tx.len() >= self.capacity {
            return Err(QueueError::Full);
        }

        tx.send(task).map_err(|_| QueueError::Closed)
    }

    /// Close the queue. Tasks already queued still run; later ones are rejected.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Stopped { handle: None }) {
            State::Running { tx, handle } => {
                // Dropping the only sender lets the consumer drain and exit.
                drop(tx);
                *state = State::Stopped {
                    handle: Some(handle),
                };
                tracing::debug!(queue = %self.name, "write queue stopped");
            }
            previous @ State::Stopped { .. } => *state = previous,
            State::Idle => {}
        }
    }

    /// Wait for the consumer to finish draining after [`stop`](Self::stop).
    ///
    /// Returns immediately if the queue is not stopped, if it was already
    /// joined, or when called from the consumer thread itself.
    pub fn join(&self) {
        let handle = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Stopped { handle } => handle.take(),
                _ => None,
            }
        };

        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::warn!(queue = %self.name, "write queue consumer panicked");
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        match &*self.state.lock() {
            State::Running { tx, .. } => tx.len(),
            _ => 0,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }
}

impl fmt::Debug for WriteQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

use crate::error::Result;
use crate::queue::{QueueError, Task, WriteQueue};

/// A client receiving one or more medias of a [`Stream`](super::Stream).
///
/// Each reader owns one [`WriteQueue`]. Every media it subscribes to pushes
/// its packets there, so all writes to the reader's connection happen on a
/// single consumer thread, in production order.
#[derive(Debug)]
pub struct UnicastReader {
    id: String,
    queue: WriteQueue,
}

impl UnicastReader {
    pub fn new(id: &str, queue_capacity: usize) -> Self {
        Self {
            id: id.to_string(),
            queue: WriteQueue::new(id, queue_capacity),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Start delivering (typically on PLAY). Packets distributed before
    /// this are dropped.
    pub fn start(&self) -> Result<()> {
        self.queue.start()?;
        tracing::debug!(reader = %self.id, "reader started");
        Ok(())
    }

    /// Stop accepting packets. Those already queued are still written.
    pub fn close(&self) {
        self.queue.stop();
    }

    /// Wait until queued packets have been written after [`close`](Self::close).
    pub fn join(&self) {
        self.queue.join();
    }

    /// Packets waiting to be written.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub(crate) fn enqueue(&self, task: Task) -> std::result::Result<(), QueueError> {
        self.queue.queue(task)
    }
}

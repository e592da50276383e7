//! Hand-off between the reactor and the worker threads.
//!
//! The reactor enqueues finished requests; a fixed pool of OS threads
//! dequeues and handles them. Workers may block, the reactor never does.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

/// Thread-safe FIFO. `None` is the stop sentinel.
pub struct DispatchQueue<T> {
    items: Mutex<VecDeque<Option<T>>>,
    not_empty: Condvar,
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DispatchQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends an item and wakes one waiting worker.
    pub fn enqueue(&self, item: T) {
        self.push(Some(item));
    }

    fn push(&self, item: Option<T>) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(item);
        self.not_empty.notify_one();
    }

    /// Blocks until an item is available. `None` means stop.
    pub fn dequeue(&self) -> Option<T> {
        let mut items = self
            .not_empty
            .wait_while(
                self.items.lock().unwrap_or_else(PoisonError::into_inner),
                |items| items.is_empty(),
            )
            .unwrap_or_else(PoisonError::into_inner);
        items.pop_front().flatten()
    }

    /// Drops every pending item and returns how many there were.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        let count = items.iter().filter(|item| item.is_some()).count();
        items.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed set of worker threads serving one [`DispatchQueue`].
pub struct WorkerPool<T: Send + 'static> {
    queue: Arc<DispatchQueue<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn start<F>(count: usize, queue: Arc<DispatchQueue<T>>, handler: F) -> io::Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut workers = Vec::with_capacity(count.max(1));

        for index in 0..count.max(1) {
            let queue = queue.clone();
            let handler = handler.clone();
            let worker = thread::Builder::new()
                .name(format!("weft-worker-{index}"))
                .spawn(move || {
                    debug!(worker = index, "Worker is running");
                    loop {
                        match queue.dequeue() {
                            Some(item) => handler(item),
                            None => {
                                // Pass the sentinel on so the next worker stops too.
                                queue.push(None);
                                break;
                            }
                        }
                    }
                    debug!(worker = index, "Worker stopped");
                })?;
            workers.push(worker);
        }

        info!(workers = workers.len(), "Worker pool started");
        Ok(Self { queue, workers })
    }

    pub fn queue(&self) -> &Arc<DispatchQueue<T>> {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Drops pending items, stops every worker and waits for them.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        let dropped = self.queue.clear();
        if dropped > 0 {
            info!(dropped, "Dropped pending requests");
        }

        self.queue.push(None);
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
        info!("All workers have been stopped");
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Serial task queue.
//!
//! Every remote request and every pull-side local write is funnelled through a
//! single worker thread so operations land in exactly the order they were
//! submitted. Tasks report failure through their `Result`; the worker logs the
//! error (or a panic) and moves on to the next task.

use anyhow::{anyhow, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// A deferred unit of work owned by the queue until it has run
pub type QueueTask = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn increment(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count += 1;
        }
    }

    fn decrement(&self) {
        if let Ok(mut count) = self.count.lock() {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.idle.notify_all();
            }
        }
    }
}

/// FIFO queue drained by one worker thread
pub struct TaskQueue {
    sender: Mutex<Option<Sender<QueueTask>>>,
    pending: Arc<Pending>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Start the worker thread
    pub fn new() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<QueueTask>();
        let pending = Arc::new(Pending::default());
        let worker_pending = Arc::clone(&pending);

        let worker = thread::Builder::new()
            .name("sync-queue".to_string())
            .spawn(move || {
                for task in receiver {
                    match panic::catch_unwind(AssertUnwindSafe(task)) {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => log::error!("Queued task failed: {e:#}"),
                        Err(_) => log::error!("Queued task panicked"),
                    }
                    worker_pending.decrement();
                }
            })
            .map_err(|e| anyhow!("Failed to spawn queue worker: {e}"))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            pending,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueue a task; never blocks on the task itself
    pub fn append<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let guard = self
            .sender
            .lock()
            .map_err(|_| anyhow!("Task queue lock poisoned"))?;
        let sender = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Task queue is shut down"))?;

        self.pending.increment();
        if sender.send(Box::new(task)).is_err() {
            self.pending.decrement();
            return Err(anyhow!("Task queue worker has stopped"));
        }
        Ok(())
    }

    /// Number of tasks submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.count.lock().map(|c| *c).unwrap_or(0)
    }

    /// Block until every submitted task, including ones queued by running tasks, has finished
    pub fn wait_idle(&self) {
        let Ok(mut count) = self.pending.count.lock() else {
            return;
        };
        while *count > 0 {
            count = match self.pending.idle.wait(count) {
                Ok(c) => c,
                Err(_) => return,
            };
        }
    }

    /// Close the queue and join the worker once it has drained
    pub fn shutdown(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

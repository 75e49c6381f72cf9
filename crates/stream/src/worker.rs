//! Dedicated worker thread with a serial task queue.
//!
//! Tasks run one at a time in post order. Replies travel back to the owning
//! context over a channel, in the order the tasks finished.

use crate::error::{StreamError, StreamResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A single named thread executing posted tasks serially.
pub struct WorkerContext {
    name: String,
    tasks: Option<mpsc::UnboundedSender<Task>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerContext {
    /// Start the worker thread.
    pub fn spawn(name: &str) -> StreamResult<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = name.to_string();
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(worker = %thread_name, "Worker started");
                while let Some(task) = rx.blocking_recv() {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(worker = %thread_name, "Worker task panicked");
                    }
                }
                debug!(worker = %thread_name, "Worker stopped");
            })
            .map_err(StreamError::WorkerSpawn)?;

        Ok(Self {
            name: name.to_string(),
            tasks: Some(tx),
            thread: Some(thread),
        })
    }

    /// Thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `task`. Returns `false` once the worker has been stopped.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tasks {
            Some(tx) => tx.send(Box::new(task)).is_ok(),
            None => false,
        }
    }

    /// Queue `task` and send its result to `reply` when it finishes.
    ///
    /// If `task` panics, `recover` builds the reply from the panic message, so
    /// the owner always hears back about every posted task.
    pub fn post_and_reply<R, F, P>(
        &self,
        task: F,
        recover: P,
        reply: mpsc::UnboundedSender<R>,
    ) -> bool
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
        P: FnOnce(String) -> R + Send + 'static,
    {
        let worker = self.name.clone();
        self.post(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!(worker = %worker, %message, "Worker task panicked");
                recover(message)
            });
            // The receiver is gone only after the owner tore down.
            let _ = reply.send(result);
        })
    }

    /// Let queued tasks finish, then join the thread. Idempotent.
    pub fn stop(&mut self) {
        self.tasks.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(worker = %self.name, "Worker thread panicked during shutdown");
            }
        }
    }

    /// Whether [`stop`](Self::stop) has run
    pub fn is_stopped(&self) -> bool {
        self.thread.is_none()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker task panicked".to_string()
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        self.stop();
    }
}

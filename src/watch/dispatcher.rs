//! Ordered listener worker pool
//!
//! ```text
//! fire handler ──submit(listener, event)──┐
//!                                          │ hash(event.path) % workers
//!              ┌───────────────┬───────────┴───┐
//!              ▼               ▼               ▼
//!         [queue 0]       [queue 1]  ...  [queue n-1]   (crossbeam, unbounded)
//!              │               │               │
//!          worker 0        worker 1        worker n-1   (dedicated threads)
//!              │               │               │
//!        listener.on_event(&event), errors and panics caught and logged
//! ```
//!
//! A path always hashes to the same worker, so its events are delivered
//! in submission order and never overlap. Different paths on different
//! workers run concurrently.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::Listener;
use super::WatchEvent;

struct Job {
    listener: Arc<dyn Listener>,
    event: WatchEvent,
}

struct Worker {
    sender: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed-size pool of ordered workers
pub struct Dispatcher {
    workers: Vec<Worker>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("workers", &self.workers.len()).finish()
    }
}

impl Dispatcher {
    /// Spawns `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let workers = (0..size)
            .map(|index| {
                let (sender, receiver) = unbounded();
                let handle = std::thread::Builder::new()
                    .name(format!("watch-dispatcher-{index}"))
                    .spawn(move || run_worker(index, receiver))
                    .map_err(|e| error!("failed to spawn dispatcher worker {index}: {e}"))
                    .ok();
                Worker {
                    sender: handle.as_ref().map(|_| sender),
                    handle,
                }
            })
            .collect();

        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `event` on the worker owning `event.path`.
    ///
    /// Never blocks; the listener runs later on that worker's thread.
    pub fn submit(
        &self,
        listener: Arc<dyn Listener>,
        event: WatchEvent,
    ) {
        let index = self.worker_index(&event.path);
        let path = event.path.clone();
        let sent = self.workers[index]
            .sender
            .as_ref()
            .map(|sender| sender.send(Job { listener, event }).is_ok())
            .unwrap_or(false);

        if sent {
            trace!(path = %path, worker = index, "event submitted");
        } else {
            warn!(path = %path, worker = index, "dispatcher worker unavailable, event dropped");
        }
    }

    /// Worker that serves `path`
    pub fn worker_index(
        &self,
        path: &str,
    ) -> usize {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        (hasher.finish() % self.workers.len() as u64) as usize
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Closing the queues lets each worker drain what is left and exit.
        for worker in &mut self.workers {
            worker.sender.take();
        }

        let current = std::thread::current().id();
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                // Dropped from inside a listener: joining ourselves would deadlock.
                if handle.thread().id() == current {
                    continue;
                }
                let _ = handle.join();
            }
        }
    }
}

fn run_worker(
    index: usize,
    receiver: Receiver<Job>,
) {
    debug!(worker = index, "dispatcher worker started");

    for job in receiver {
        let Job { listener, event } = job;
        match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
            Ok(Ok(())) => {
                trace!(path = %event.path, kind = ?event.kind, "listener invoked");
            }
            Ok(Err(e)) => {
                error!(path = %event.path, kind = ?event.kind, "listener failed: {e}");
            }
            Err(_) => {
                error!(path = %event.path, kind = ?event.kind, "listener panicked");
            }
        }
    }

    debug!(worker = index, "dispatcher worker stopped");
}

//! Bounded event queue drained by a fixed pool of workers.
//!
//! The HTTP layer pushes parsed events with [`WorkerPool::try_enqueue`], which
//! never waits: a full queue is reported immediately so the caller can shed
//! load. Workers pull from the shared receiver until the cancellation token
//! fires, finishing the event in hand before exiting.

use crate::engine::RuleEngine;
use crate::event::Event;
use std::sync::{Arc, PoisonError};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default number of events buffered ahead of the workers
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Reasons an event could not be queued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("event queue is full")]
    QueueFull,

    #[error("event queue is closed")]
    Closed,
}

/// Handle to the queue and its workers
#[derive(Debug)]
pub struct WorkerPool {
    sender: mpsc::Sender<Arc<Event>>,
    token: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create the queue and spawn `workers` tasks draining it into `engine`.
    ///
    /// Zero values fall back to the defaults. Must be called from inside a
    /// tokio runtime.
    pub fn start(
        engine: Arc<RuleEngine>,
        capacity: usize,
        workers: usize,
        token: CancellationToken,
    ) -> Self {
        let capacity = if capacity == 0 { DEFAULT_QUEUE_CAPACITY } else { capacity };
        let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };

        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&engine),
                    Arc::clone(&receiver),
                    token.clone(),
                ))
            })
            .collect();

        info!(capacity, workers, "Started worker pool");

        Self {
            sender,
            token,
            handles: std::sync::Mutex::new(handles),
        }
    }

    /// Queue `event` without waiting
    pub fn try_enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        if self.token.is_cancelled() {
            return Err(EnqueueError::Closed);
        }

        self.sender
            .try_send(Arc::new(event))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            })
    }

    /// Events waiting for a worker
    pub fn queue_size(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Token observed by the workers
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop accepting events and wait for every worker to exit.
    ///
    /// Events still queued when the token fires are dropped. Calling this
    /// twice is harmless.
    pub async fn shutdown(&self) {
        self.token.cancel();

        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!(dropped = self.queue_size(), "Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    engine: Arc<RuleEngine>,
    receiver: Arc<Mutex<mpsc::Receiver<Arc<Event>>>>,
    token: CancellationToken,
) {
    debug!(worker_id, "Worker started");

    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                event = receiver.recv() => event,
            }
        };

        let Some(event) = next else {
            break;
        };

        let report = engine.process_event(event).await;
        debug!(
            worker_id,
            rules_evaluated = report.rules_evaluated,
            matched = report.matched_rules.len(),
            "Worker finished event"
        );
    }

    debug!(worker_id, "Worker stopped");
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

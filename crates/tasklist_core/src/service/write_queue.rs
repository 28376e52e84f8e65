//! Per-key serial write-through queue.
//!
//! # Responsibility
//! - Deliver list snapshots to the store in the order they were enqueued.
//! - Retry failed writes per `RetryPolicy` and report final failures.
//! - Track in-flight and failed writes so store echoes can be recognized as
//!   stale.
//!
//! # Invariants
//! - One worker per `ListKey`; a worker never runs two writes concurrently.
//! - Keys never wait on each other.
//! - A failed write is reported, never rolled back into memory.

use crate::config::RetryPolicy;
use crate::model::task::{ListKey, Task};
use crate::store::ListStore;
use log::{debug, error, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A write that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    pub key: ListKey,
    pub attempts: u32,
    /// Rendered store error.
    pub message: String,
}

enum WriteCommand {
    Persist(Vec<Task>),
    Flush(oneshot::Sender<()>),
}

#[derive(Default)]
struct KeyWrites {
    in_flight: AtomicUsize,
    unsaved: AtomicBool,
}

/// Per-key write bookkeeping shared by the queue workers and the manager.
///
/// A key is settled when nothing is in flight and its most recent write
/// succeeded. Only then can the store hold the same list as memory.
#[derive(Default)]
pub(crate) struct PendingWrites {
    todo: KeyWrites,
    completed: KeyWrites,
}

impl PendingWrites {
    fn slot(&self, key: ListKey) -> &KeyWrites {
        match key {
            ListKey::Todo => &self.todo,
            ListKey::Completed => &self.completed,
        }
    }

    pub(crate) fn is_settled(&self, key: ListKey) -> bool {
        let slot = self.slot(key);
        slot.in_flight.load(Ordering::Acquire) == 0 && !slot.unsaved.load(Ordering::Acquire)
    }

    fn begin(&self, key: ListKey) {
        self.slot(key).in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Records the outcome before releasing the in-flight slot, so a reader
    /// that observes zero in flight also observes the outcome.
    fn finish(&self, key: ListKey, saved: bool) {
        let slot = self.slot(key);
        slot.unsaved.store(!saved, Ordering::Release);
        slot.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn abandon(&self, key: ListKey) {
        self.slot(key).in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct WriteQueue {
    todo: mpsc::UnboundedSender<WriteCommand>,
    completed: mpsc::UnboundedSender<WriteCommand>,
    pending: Arc<PendingWrites>,
}

impl WriteQueue {
    /// Spawns one worker per key on the current tokio runtime.
    pub(crate) fn spawn(
        store: Arc<dyn ListStore>,
        retry: RetryPolicy,
        failures: broadcast::Sender<PersistenceFailure>,
    ) -> Self {
        let pending = Arc::new(PendingWrites::default());
        let spawn_worker = |key: ListKey| {
            let (tx, rx) = mpsc::unbounded_channel();
            let worker = Worker {
                key,
                store: Arc::clone(&store),
                retry,
                failures: failures.clone(),
                pending: Arc::clone(&pending),
            };
            tokio::spawn(worker.run(rx));
            tx
        };

        Self {
            todo: spawn_worker(ListKey::Todo),
            completed: spawn_worker(ListKey::Completed),
            pending,
        }
    }

    pub(crate) fn pending(&self) -> Arc<PendingWrites> {
        Arc::clone(&self.pending)
    }

    fn sender(&self, key: ListKey) -> &mpsc::UnboundedSender<WriteCommand> {
        match key {
            ListKey::Todo => &self.todo,
            ListKey::Completed => &self.completed,
        }
    }

    /// Queues a full-list snapshot for `key`. Never blocks.
    ///
    /// Callers must enqueue while holding the state lock so queue order
    /// matches mutation order.
    pub(crate) fn enqueue(&self, key: ListKey, tasks: Vec<Task>) {
        self.pending.begin(key);
        if self.sender(key).send(WriteCommand::Persist(tasks)).is_err() {
            self.pending.abandon(key);
            error!(
                "event=write_enqueue module=write_queue status=error key={} error_code=worker_stopped",
                key
            );
        }
    }

    /// Waits until every write queued before this call has been attempted.
    pub(crate) async fn flush(&self) {
        for key in ListKey::ALL {
            let (done_tx, done_rx) = oneshot::channel();
            if self.sender(key).send(WriteCommand::Flush(done_tx)).is_err() {
                continue;
            }
            // A dropped sender means the worker stopped; nothing left to wait for.
            let _ = done_rx.await;
        }
    }
}

struct Worker {
    key: ListKey,
    store: Arc<dyn ListStore>,
    retry: RetryPolicy,
    failures: broadcast::Sender<PersistenceFailure>,
    pending: Arc<PendingWrites>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                WriteCommand::Persist(tasks) => {
                    let saved = self.persist(tasks).await;
                    self.pending.finish(self.key, saved);
                }
                WriteCommand::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(
            "event=write_worker_stop module=write_queue status=ok key={}",
            self.key
        );
    }

    async fn persist(&self, tasks: Vec<Task>) -> bool {
        let len = tasks.len();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let delay = self.retry.backoff_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.store.write(self.key, tasks.clone()).await {
                Ok(()) => {
                    debug!(
                        "event=list_persist module=write_queue status=ok key={} len={} attempt={}",
                        self.key, len, attempt
                    );
                    return true;
                }
                Err(err) => {
                    warn!(
                        "event=list_persist module=write_queue status=retryable key={} len={} attempt={} max_attempts={} error={}",
                        self.key, len, attempt, max_attempts, err
                    );
                    last_error = Some(err);
                }
            }
        }

        let message = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "write not attempted".to_string());
        error!(
            "event=list_persist module=write_queue status=error key={} len={} attempts={} error={}",
            self.key, len, max_attempts, message
        );
        // No receivers just means nobody is listening for failures.
        let _ = self.failures.send(PersistenceFailure {
            key: self.key,
            attempts: max_attempts,
            message,
        });
        false
    }
}

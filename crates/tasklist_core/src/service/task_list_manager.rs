//! Task list manager: the single owner of both task lists.
//!
//! # Responsibility
//! - Hold the authoritative in-memory `todo` and `completed` lists.
//! - Apply add/delete/complete mutations and write each touched list through
//!   to the store.
//! - Mirror store emissions into memory and publish every change to observers.
//!
//! # Invariants
//! - Mutations never suspend and are atomic with respect to observers.
//! - Indices are validated against the current lists, under the state lock,
//!   before anything is removed.
//! - A persistence failure never rolls back memory.
//! - A store emission replaces memory only when the key is settled (no
//!   write in flight, last write succeeded) and the emission still matches
//!   the store's current value. Anything else is an echo of an older
//!   snapshot and is skipped.

use crate::config::ManagerConfig;
use crate::model::task::{ListKey, Task, TaskLists, TaskValidationError};
use crate::service::write_queue::{PendingWrites, PersistenceFailure, WriteQueue};
use crate::store::{ListStore, ListStream};
use log::{debug, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

const FAILURE_CHANNEL_CAPACITY: usize = 32;

/// Errors returned by index-based mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListError {
    IndexOutOfRange {
        list: ListKey,
        index: usize,
        len: usize,
    },
}

impl Display for TaskListError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { list, index, len } => {
                write!(f, "index {index} out of range for {list} with {len} task(s)")
            }
        }
    }
}

impl Error for TaskListError {}

/// Owner of the todo and completed lists.
///
/// Construct one per process with [`TaskListManager::initialize`] and hand it
/// (usually behind an `Arc`) to whatever presents the lists.
pub struct TaskListManager {
    state: Arc<watch::Sender<TaskLists>>,
    writes: WriteQueue,
    failures: broadcast::Sender<PersistenceFailure>,
    mirrors: Vec<JoinHandle<()>>,
}

impl TaskListManager {
    /// Subscribes to both store keys, hydrates memory from the first value of
    /// each, and starts mirroring later emissions.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn initialize(store: Arc<dyn ListStore>, config: ManagerConfig) -> Self {
        let mut lists = TaskLists::default();
        let mut streams = Vec::with_capacity(ListKey::ALL.len());
        for key in ListKey::ALL {
            let mut stream = store.subscribe(key);
            if let Some(initial) = stream.next().await {
                *lists.list_mut(key) = initial;
            }
            streams.push((key, stream));
        }

        info!(
            "event=manager_init module=manager status=ok todo_len={} completed_len={} write_attempts={}",
            lists.todo.len(),
            lists.completed.len(),
            config.write_retry.max_attempts
        );

        let (state, _) = watch::channel(lists);
        let state = Arc::new(state);
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let writes = WriteQueue::spawn(
            Arc::clone(&store),
            config.write_retry,
            failures.clone(),
        );

        let mirrors = streams
            .into_iter()
            .map(|(key, stream)| {
                tokio::spawn(mirror_store(
                    key,
                    stream,
                    Arc::clone(&store),
                    Arc::clone(&state),
                    writes.pending(),
                ))
            })
            .collect();

        Self {
            state,
            writes,
            failures,
            mirrors,
        }
    }

    /// Appends a task to `todo` and returns its index.
    ///
    /// Blank text, or text longer than `MAX_TASK_CHARS`, is ignored: returns
    /// `None` and issues no write.
    pub fn add_task(&self, text: &str) -> Option<usize> {
        let task = match Task::new_bounded(text) {
            Ok(task) => task,
            Err(err) => {
                debug!(
                    "event=task_add module=manager status=ignored reason={}",
                    rejection_code(err)
                );
                return None;
            }
        };

        let mut index = 0;
        self.state.send_modify(|lists| {
            lists.todo.push(task);
            index = lists.todo.len() - 1;
            self.writes.enqueue(ListKey::Todo, lists.todo.clone());
        });

        info!(
            "event=task_add module=manager status=ok index={}",
            index
        );
        Some(index)
    }

    /// Removes and returns `todo[index]`.
    pub fn delete_task(&self, index: usize) -> Result<Task, TaskListError> {
        self.take_at(ListKey::Todo, index, None)
    }

    /// Moves `todo[index]` to the end of `completed` and returns it.
    pub fn complete_task(&self, index: usize) -> Result<Task, TaskListError> {
        self.take_at(ListKey::Todo, index, Some(ListKey::Completed))
    }

    /// Removes and returns `completed[index]`.
    pub fn delete_completed_task(&self, index: usize) -> Result<Task, TaskListError> {
        self.take_at(ListKey::Completed, index, None)
    }

    pub fn todo(&self) -> Vec<Task> {
        self.state.borrow().todo.clone()
    }

    pub fn completed(&self) -> Vec<Task> {
        self.state.borrow().completed.clone()
    }

    pub fn snapshot(&self) -> TaskLists {
        self.state.borrow().clone()
    }

    /// Observes every change to either list.
    pub fn subscribe(&self) -> watch::Receiver<TaskLists> {
        self.state.subscribe()
    }

    /// Receives writes that failed after all retry attempts.
    pub fn persistence_failures(&self) -> broadcast::Receiver<PersistenceFailure> {
        self.failures.subscribe()
    }

    /// Waits for every write issued before this call to finish.
    pub async fn flush(&self) {
        self.writes.flush().await;
    }

    fn take_at(
        &self,
        from: ListKey,
        index: usize,
        append_to: Option<ListKey>,
    ) -> Result<Task, TaskListError> {
        let mut outcome = Err(TaskListError::IndexOutOfRange {
            list: from,
            index,
            len: 0,
        });

        self.state.send_if_modified(|lists| {
            let len = lists.list(from).len();
            if index >= len {
                outcome = Err(TaskListError::IndexOutOfRange {
                    list: from,
                    index,
                    len,
                });
                return false;
            }

            let task = lists.list_mut(from).remove(index);
            self.writes.enqueue(from, lists.list(from).to_vec());
            if let Some(to) = append_to {
                lists.list_mut(to).push(task.clone());
                self.writes.enqueue(to, lists.list(to).to_vec());
            }
            outcome = Ok(task);
            true
        });

        match &outcome {
            Ok(_) => info!(
                "event=task_remove module=manager status=ok list={} index={} moved_to={}",
                from,
                index,
                append_to.map_or("none", ListKey::storage_key)
            ),
            Err(err) => info!(
                "event=task_remove module=manager status=rejected list={} index={} error={}",
                from, index, err
            ),
        }
        outcome
    }
}

impl Drop for TaskListManager {
    fn drop(&mut self) {
        for mirror in &self.mirrors {
            mirror.abort();
        }
    }
}

async fn mirror_store(
    key: ListKey,
    mut stream: ListStream,
    store: Arc<dyn ListStore>,
    state: Arc<watch::Sender<TaskLists>>,
    pending: Arc<PendingWrites>,
) {
    while let Some(tasks) = stream.next().await {
        let len = tasks.len();
        let mut outcome = MirrorOutcome::Unchanged;
        // Mutations enqueue under this lock, so the write state read here
        // cannot change before the replacement lands.
        state.send_if_modified(|lists| {
            if !pending.is_settled(key) {
                outcome = MirrorOutcome::Unsaved;
                return false;
            }
            if store.load(key) != tasks {
                outcome = MirrorOutcome::Superseded;
                return false;
            }
            let slot = lists.list_mut(key);
            if *slot == tasks {
                return false;
            }
            *slot = tasks;
            outcome = MirrorOutcome::Applied;
            true
        });
        debug!(
            "event=store_emit module=manager status={} key={} len={}",
            outcome.as_str(),
            key,
            len
        );
    }
}

/// What happened to one store emission.
enum MirrorOutcome {
    Applied,
    Unchanged,
    /// Memory holds writes the store has not accepted yet.
    Unsaved,
    /// A newer value is already in the store and will be delivered next.
    Superseded,
}

impl MirrorOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Unsaved => "skipped_unsaved",
            Self::Superseded => "skipped_superseded",
        }
    }
}

fn rejection_code(err: TaskValidationError) -> &'static str {
    match err {
        TaskValidationError::Blank => "blank",
        TaskValidationError::TooLong { .. } => "too_long",
    }
}

//! Persistent store contracts and implementations.
//!
//! # Responsibility
//! - Define the keyed list store the task list manager writes through to.
//! - Provide a durable SQLite store and an in-process memory store.
//!
//! # Invariants
//! - `subscribe` yields the current value first, then the value after every
//!   completed write, including writes issued by this process.
//! - `write` replaces the whole list for a key; there is no partial merge.
//! - Writes to the same key are applied and published one at a time.

use crate::db::DbError;
use crate::model::task::{ListKey, Task, TaskLists};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::pin::Pin;
use tokio::sync::{watch, Mutex, MutexGuard};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryListStore;
pub use sqlite_store::SqliteListStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Change stream for one list key.
pub type ListStream = Pin<Box<dyn Stream<Item = Vec<Task>> + Send>>;

/// Persistence-layer error.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Persisted rows violate list invariants.
    InvalidData(String),
    /// Blocking storage task panicked or was cancelled.
    Task(String),
    /// Failure reported by a non-SQLite backend.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted list data: {message}"),
            Self::Task(message) => write!(f, "storage task failed: {message}"),
            Self::Backend(message) => write!(f, "store backend failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Task(_) | Self::Backend(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Keyed, durable storage for ordered task lists.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Returns the value currently held for `key`.
    fn load(&self, key: ListKey) -> Vec<Task>;

    /// Subscribes to `key`; the stream starts with the current value.
    fn subscribe(&self, key: ListKey) -> ListStream;

    /// Replaces the stored list for `key`.
    async fn write(&self, key: ListKey, tasks: Vec<Task>) -> StoreResult<()>;
}

struct KeyChannel {
    tx: watch::Sender<Vec<Task>>,
    write_lock: Mutex<()>,
}

impl KeyChannel {
    fn new(initial: Vec<Task>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            tx,
            write_lock: Mutex::new(()),
        }
    }
}

/// Per-key publish channels shared by the store implementations.
pub(crate) struct KeyChannels {
    todo: KeyChannel,
    completed: KeyChannel,
}

impl KeyChannels {
    pub(crate) fn new(initial: TaskLists) -> Self {
        Self {
            todo: KeyChannel::new(initial.todo),
            completed: KeyChannel::new(initial.completed),
        }
    }

    fn channel(&self, key: ListKey) -> &KeyChannel {
        match key {
            ListKey::Todo => &self.todo,
            ListKey::Completed => &self.completed,
        }
    }

    pub(crate) fn current(&self, key: ListKey) -> Vec<Task> {
        self.channel(key).tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self, key: ListKey) -> ListStream {
        Box::pin(WatchStream::new(self.channel(key).tx.subscribe()))
    }

    /// Serializes writers of one key; hold the guard across write + publish.
    pub(crate) async fn lock_writes(&self, key: ListKey) -> MutexGuard<'_, ()> {
        self.channel(key).write_lock.lock().await
    }

    pub(crate) fn publish(&self, key: ListKey, tasks: Vec<Task>) {
        self.channel(key).tx.send_replace(tasks);
    }
}

//! In-process list store.
//!
//! Holds both lists in watch channels only. Nothing survives the process;
//! useful for ephemeral sessions and as a test double with real
//! subscription semantics.

use super::{KeyChannels, ListStore, ListStream, StoreResult};
use crate::model::task::{ListKey, Task, TaskLists};
use async_trait::async_trait;

pub struct MemoryListStore {
    channels: KeyChannels,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::with_lists(TaskLists::default())
    }

    /// Creates a store pre-seeded with `lists`.
    pub fn with_lists(lists: TaskLists) -> Self {
        Self {
            channels: KeyChannels::new(lists),
        }
    }
}

impl Default for MemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    fn load(&self, key: ListKey) -> Vec<Task> {
        self.channels.current(key)
    }

    fn subscribe(&self, key: ListKey) -> ListStream {
        self.channels.subscribe(key)
    }

    async fn write(&self, key: ListKey, tasks: Vec<Task>) -> StoreResult<()> {
        let _guard = self.channels.lock_writes(key).await;
        self.channels.publish(key, tasks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryListStore;
    use crate::model::task::{ListKey, Task, TaskLists};
    use crate::store::ListStore;
    use tokio_stream::StreamExt;

    fn tasks(values: &[&str]) -> Vec<Task> {
        values.iter().map(|value| Task::parse(value).unwrap()).collect()
    }

    #[tokio::test]
    async fn subscribe_yields_seeded_value_then_writes() {
        let store = MemoryListStore::with_lists(TaskLists {
            todo: tasks(&["a"]),
            completed: Vec::new(),
        });

        let mut stream = store.subscribe(ListKey::Todo);
        assert_eq!(stream.next().await.unwrap(), tasks(&["a"]));

        store.write(ListKey::Todo, tasks(&["a", "b"])).await.unwrap();
        assert_eq!(stream.next().await.unwrap(), tasks(&["a", "b"]));
        assert!(store.load(ListKey::Completed).is_empty());
    }
}

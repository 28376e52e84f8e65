//! SQLite-backed list store.
//!
//! # Responsibility
//! - Persist both task lists in the `list_items` table.
//! - Publish every committed write to subscribers of that key.
//!
//! # Invariants
//! - Each write replaces all rows of one key inside a single transaction.
//! - Rows are stored with their list index, so order and duplicates survive
//!   a restart.
//! - Blocking SQLite work never runs on the async executor threads.
//! - Read paths reject invalid persisted rows instead of masking them.

use super::{KeyChannels, ListStore, ListStream, StoreError, StoreResult};
use crate::db::open_db;
use crate::model::task::{ListKey, Task, TaskLists};
use async_trait::async_trait;
use log::{debug, error, info};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct SqliteListStore {
    db_path: PathBuf,
    channels: KeyChannels,
}

impl SqliteListStore {
    /// Opens (creating and migrating if needed) the database at `db_path`
    /// and loads both lists.
    pub async fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let started_at = Instant::now();

        let lists = match with_connection(db_path.clone(), |conn| load_lists(conn)).await {
            Ok(lists) => lists,
            Err(err) => {
                error!(
                    "event=store_open module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=store_open module=store status=ok duration_ms={} todo_len={} completed_len={}",
            started_at.elapsed().as_millis(),
            lists.todo.len(),
            lists.completed.len()
        );

        Ok(Self {
            db_path,
            channels: KeyChannels::new(lists),
        })
    }
}

#[async_trait]
impl ListStore for SqliteListStore {
    fn load(&self, key: ListKey) -> Vec<Task> {
        self.channels.current(key)
    }

    fn subscribe(&self, key: ListKey) -> ListStream {
        self.channels.subscribe(key)
    }

    async fn write(&self, key: ListKey, tasks: Vec<Task>) -> StoreResult<()> {
        let _guard = self.channels.lock_writes(key).await;
        let started_at = Instant::now();

        let rows = tasks.clone();
        with_connection(self.db_path.clone(), move |conn| {
            replace_list(conn, key, &rows)
        })
        .await?;

        debug!(
            "event=store_write module=store status=ok key={} len={} duration_ms={}",
            key,
            tasks.len(),
            started_at.elapsed().as_millis()
        );
        self.channels.publish(key, tasks);
        Ok(())
    }
}

async fn with_connection<T, F>(db_path: PathBuf, func: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = open_db(&db_path)?;
        func(&mut conn)
    })
    .await
    .map_err(|err| StoreError::Task(err.to_string()))?
}

fn load_lists(conn: &Connection) -> StoreResult<TaskLists> {
    let mut stmt = conn.prepare(
        "SELECT list_key, position, content
         FROM list_items
         ORDER BY list_key ASC, position ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut lists = TaskLists::default();

    while let Some(row) = rows.next()? {
        let key_text: String = row.get(0)?;
        let key = ListKey::from_storage_key(&key_text).ok_or_else(|| {
            StoreError::InvalidData(format!("unknown list key `{key_text}` in list_items"))
        })?;
        let position: i64 = row.get(1)?;
        let content: String = row.get(2)?;
        let task = Task::parse(&content).map_err(|err| {
            StoreError::InvalidData(format!("{key}[{position}]: {err}"))
        })?;
        lists.list_mut(key).push(task);
    }

    Ok(lists)
}

fn replace_list(conn: &mut Connection, key: ListKey, tasks: &[Task]) -> StoreResult<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM list_items WHERE list_key = ?1;",
        [key.storage_key()],
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO list_items (list_key, position, content) VALUES (?1, ?2, ?3);",
        )?;
        for (position, task) in tasks.iter().enumerate() {
            let position = i64::try_from(position).map_err(|_| {
                StoreError::InvalidData(format!("{key} position {position} overflows i64"))
            })?;
            insert.execute(params![key.storage_key(), position, task.as_str()])?;
        }
    }
    tx.commit()?;
    Ok(())
}

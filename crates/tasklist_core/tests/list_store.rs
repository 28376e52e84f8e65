use rusqlite::Connection;
use tasklist_core::db::{open_db, DbError};
use tasklist_core::{ListKey, ListStore, SqliteListStore, StoreError, Task};
use tokio_stream::StreamExt;

fn tasks(values: &[&str]) -> Vec<Task> {
    values.iter().map(|value| Task::parse(value).unwrap()).collect()
}

#[tokio::test]
async fn fresh_database_yields_empty_lists() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteListStore::open(dir.path().join("tasks.db"))
        .await
        .expect("fresh database should open");

    assert!(store.load(ListKey::Todo).is_empty());
    assert!(store.load(ListKey::Completed).is_empty());
}

#[tokio::test]
async fn write_preserves_order_and_duplicates_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let store = SqliteListStore::open(&path)
        .await
        .expect("fresh database should open");
    store
        .write(ListKey::Todo, tasks(&["zeta", "alpha", "zeta", "mid"]))
        .await
        .expect("list write");
    store
        .write(ListKey::Completed, tasks(&["done"]))
        .await
        .expect("list write");
    drop(store);

    let reopened = SqliteListStore::open(&path)
        .await
        .expect("existing database should reopen");
    assert_eq!(
        reopened.load(ListKey::Todo),
        tasks(&["zeta", "alpha", "zeta", "mid"])
    );
    assert_eq!(reopened.load(ListKey::Completed), tasks(&["done"]));
}

#[tokio::test]
async fn write_replaces_only_the_target_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let store = SqliteListStore::open(&path)
        .await
        .expect("fresh database should open");
    store.write(ListKey::Todo, tasks(&["a", "b", "c"])).await.expect("list write");
    store.write(ListKey::Completed, tasks(&["x"])).await.expect("list write");
    store.write(ListKey::Todo, tasks(&["c"])).await.expect("list write");

    let conn = open_db(&path).unwrap();
    let rows = list_rows(&conn);
    assert_eq!(
        rows,
        vec![
            ("completed_list".to_string(), 0, "x".to_string()),
            ("todo_list".to_string(), 0, "c".to_string()),
        ]
    );
}

#[tokio::test]
async fn subscribe_delivers_current_value_then_each_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteListStore::open(dir.path().join("tasks.db"))
        .await
        .expect("fresh database should open");
    store.write(ListKey::Todo, tasks(&["first"])).await.expect("list write");

    let mut stream = store.subscribe(ListKey::Todo);
    assert_eq!(stream.next().await.unwrap(), tasks(&["first"]));

    store
        .write(ListKey::Todo, tasks(&["first", "second"]))
        .await
        .expect("list write");
    assert_eq!(stream.next().await.unwrap(), tasks(&["first", "second"]));

    store.write(ListKey::Todo, Vec::new()).await.expect("list write");
    assert_eq!(stream.next().await.unwrap(), Vec::<Task>::new());
}

#[tokio::test]
async fn blank_persisted_rows_are_rejected_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO list_items (list_key, position, content) VALUES ('todo_list', 0, '   ');",
        [],
    )
    .unwrap();
    drop(conn);

    let err = SqliteListStore::open(&path)
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(err, StoreError::InvalidData(_)), "{err}");
}

#[tokio::test]
async fn newer_schema_surfaces_as_db_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    let err = SqliteListStore::open(&path)
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(
        err,
        StoreError::Db(DbError::UnsupportedSchemaVersion { db_version: 42, .. })
    ));
}

fn list_rows(conn: &Connection) -> Vec<(String, i64, String)> {
    let mut stmt = conn
        .prepare("SELECT list_key, position, content FROM list_items ORDER BY list_key, position;")
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap();
    rows.collect::<Result<Vec<_>, _>>().unwrap()
}

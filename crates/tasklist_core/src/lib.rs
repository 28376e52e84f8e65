//! Core state and persistence logic for the task list app.
//! This crate is the single source of truth for task list invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, CoreConfig, ManagerConfig, RetryPolicy};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{ListKey, Task, TaskLists, TaskValidationError, MAX_TASK_CHARS};
pub use service::task_list_manager::{TaskListError, TaskListManager};
pub use service::write_queue::PersistenceFailure;
pub use store::{
    ListStore, ListStream, MemoryListStore, SqliteListStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Core use-case services.
//!
//! # Responsibility
//! - Own task list state and orchestrate write-through persistence.
//! - Keep presentation callers decoupled from storage details.

pub mod task_list_manager;
pub mod write_queue;

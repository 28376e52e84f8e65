//! Task list domain model.
//!
//! # Responsibility
//! - Define the canonical task value and list identifiers used by core logic.
//!
//! # Invariants
//! - Tasks are identified only by text and position; there are no ids.

pub mod task;

//! Background Tasks Module
//!
//! # Tasks
//! - TTL Cleanup: Sweeps expired records from the in-memory driver

mod cleanup;

pub use cleanup::spawn_cleanup_task;

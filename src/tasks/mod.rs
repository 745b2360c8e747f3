//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cleanup: sweeps expired and outdated smart cache entries

mod cleanup;

pub use cleanup::spawn_cleanup_task;

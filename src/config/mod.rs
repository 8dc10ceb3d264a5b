// src/config/mod.rs
pub mod watch;

pub use watch::{WatchConfig, WorkflowSettings};

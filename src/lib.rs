// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod change_detector;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod format;
pub mod identity;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod seen_cache;
pub mod state;
pub mod window;
pub mod workflow;

// ---- Re-exports for stable public API ----
pub use crate::config::WatchConfig;
pub use crate::identity::{canonical_key, CanonicalKey};
pub use crate::ingest::types::{Listing, RejectReason, SourceProvider};
pub use crate::pipeline::{run_workflow, RunContext, RunReport};
pub use crate::workflow::{WorkflowKind, WorkflowProfile};

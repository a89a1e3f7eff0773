//! Accounting of parsed events into per-process, per-stack sample buckets.
//!
//! This module turns the event stream into:
//! - A thread → process registry
//! - Per-process run-level (concurrency) tracking
//! - Interned stacks, locations and functions
//! - Load histograms, optionally rescaled to real time

pub mod ingest;
pub mod interner;
pub mod metrics;
pub mod resolver;
pub mod tracker;

// Re-export main types and functions
pub use ingest::{Ingest, IngestOptions, IngestSnapshot, IngestStats, SampleBucket};
pub use interner::{load_frame_name, stack_hash, Stack, StackId, StackInterner};
pub use metrics::{rescale, rescale_count, LoadHistogram, LoadReport, Rescaled};
pub use resolver::ThreadRegistry;
pub use tracker::{Process, ProcessTable};

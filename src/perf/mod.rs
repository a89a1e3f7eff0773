//! Trace acquisition.
//!
//! This module handles:
//! - Running `perf script` over a recorded `perf.data`
//! - Moving trace lines from a reader thread to the accounting thread

pub mod pipeline;
pub mod script;

pub use pipeline::{ingest_reader, spawn_ingest, IngestHandle, IngestOutcome};
pub use script::{PerfExit, PerfProcess, PerfScript};

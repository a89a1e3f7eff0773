//! perf-runlevel
//!
//! Concurrency-aware CPU profiles reconstructed from `perf` traces.
//!
//! A process that runs more threads collects proportionally more samples per
//! second of wall time. This crate follows scheduler switch events to estimate
//! how many threads each process had on-CPU when every sample was taken,
//! tags stacks with that run-level, and can rescale sample counts so the
//! profile reflects real time rather than CPU time.
//!
//! This crate provides the core implementation for the `perf-runlevel` CLI
//! tool.
//!
//! ## Getting Started
//!
//! ```bash
//! perf record -e cycles -e sched:sched_switch -a -g -- ./app
//! perf-runlevel profile -i perf.data -o profile.pb.gz
//! ```

pub mod aggregator;
pub mod commands;
pub mod flamegraph;
pub mod output;
pub mod parser;
pub mod perf;
pub mod profile;
pub mod utils;

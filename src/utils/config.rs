//! Configuration and constants for the CLI.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

// Event names as printed by `perf script` (matched as " <name>:")
pub const DEFAULT_SWITCH_EVENT: &str = "sched:sched_switch";
pub const DEFAULT_SAMPLE_EVENT: &str = "cycles";

// Key markers inside the sched_switch trace payload
pub const PREV_PID_MARKER: &str = " prev_pid=";
pub const NEXT_PID_MARKER: &str = " next_pid=";

/// Symbol perf prints for frames it could not resolve
pub const UNRESOLVED_SYMBOL: &str = "[unknown]";

/// Prefix of the synthetic outermost frame carrying the run-level
pub const LOAD_FRAME_PREFIX: &str = "LOAD";

// Profile period: one sample stands for 250us of cpu time
pub const SAMPLE_PERIOD_NS: i64 = 250_000;
pub const PERIOD_TYPE: (&str, &str) = ("cpu", "nanoseconds");
pub const SAMPLE_TYPES: [(&str, &str); 2] = [("samples", "count"), ("cpu", "nanoseconds")];

// perf invocation
pub const DEFAULT_PERF_BINARY: &str = "perf";
pub const DEFAULT_PERF_INPUT: &str = "perf.data";
pub const PERF_SCRIPT_FIELDS: &str = "pid,tid,cpu,event,trace,ip,sym";

// Reader -> accounting hand-off
pub const LINE_BATCH_SIZE: usize = 1024;
pub const CHANNEL_CAPACITY: usize = 64;
pub const READ_BUFFER_SIZE: usize = 1 << 20;

/// Width of the histogram bar for the busiest run-level
pub const HISTOGRAM_BAR_WIDTH: f64 = 100.0;

/// Longest slice of an offending line kept in a diagnostic
pub const DIAGNOSTIC_CONTEXT_LEN: usize = 160;

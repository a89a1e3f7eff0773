//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Why a single trace line was rejected by the tokenizer.
///
/// These never escape the parser: they become diagnostics and the line is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceParseError {
    #[error("no pid in header")]
    MissingPid,

    #[error("expected '/' after pid")]
    MissingTidDelimiter,

    #[error("no tid in header")]
    MissingTid,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid number for '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid frame address: {0}")]
    InvalidAddress(String),
}

/// Errors that can occur while ingesting a trace stream
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read trace: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to start ingest thread: {0}")]
    Spawn(std::io::Error),

    #[error("ingest thread terminated without reporting completion")]
    Disconnected,

    #[error("ingest thread panicked")]
    Panicked,
}

/// Errors that can occur while selecting and emitting the subject process
#[derive(Error, Debug)]
pub enum FinalizeError {
    #[error("no process with samples observed in trace")]
    NoProcess,

    #[error("process {0} has no samples in trace")]
    ProcessNotFound(u32),
}

/// Errors that can occur while launching `perf script`
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to start {binary}: {source}")]
    SpawnFailed {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to pipe perf output: {0}")]
    PipeUnavailable(&'static str),

    #[error("failed to wait for perf: {0}")]
    WaitFailed(std::io::Error),
}

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("Empty stack data")]
    EmptyStacks,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Flamegraph output is not UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Failed to render flamegraph: {0}")]
    Render(String),
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Failed to encode pprof: {0}")]
    EncodeFailed(#[from] prost::EncodeError),

    #[error("Failed to decode pprof: {0}")]
    DecodeFailed(#[from] prost::DecodeError),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

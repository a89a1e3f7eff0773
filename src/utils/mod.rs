//! Utility modules for configuration, error handling, and diagnostics.

pub mod config;
pub mod diagnostics;
pub mod error;

// Re-export commonly used error types for convenience
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, LogSink, Severity};
pub use error::{
    CaptureError, FinalizeError, FlamegraphError, IngestError, OutputError, TraceParseError,
};

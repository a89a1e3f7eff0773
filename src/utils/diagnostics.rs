//! Structured diagnostics for anomalies that never abort a run.
//!
//! The trace is assumed lossy: malformed lines, misaccounted samples and odd
//! rescale results are reported through a [`DiagnosticSink`] and processing
//! continues. The CLI logs them; tests collect them into a `Vec`.

use crate::utils::config::DIAGNOSTIC_CONTEXT_LEN;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// What went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A switch line whose header or pid fields could not be parsed
    MalformedSwitch(String),
    /// A sample header that could not be parsed
    MalformedSample(String),
    /// A repeat stack reported a different run-level than its bucket
    MisaccountedSample { observed: u32, recorded: u32 },
    /// Rescaled count came out negative or non-finite
    RescaleUnderflow {
        count: u64,
        max_run: u32,
        run_level: u32,
    },
    /// Rescaled count or running total exceeded the counter range
    RescaleOverflow {
        total: u64,
        count: u64,
        run_level: u32,
    },
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MalformedSwitch(reason) => {
                write!(f, "malformed switch line: {}", reason)
            }
            DiagnosticKind::MalformedSample(reason) => {
                write!(f, "malformed sample line: {}", reason)
            }
            DiagnosticKind::MisaccountedSample { observed, recorded } => {
                write!(f, "misaccounted sample: {} -> {}", observed, recorded)
            }
            DiagnosticKind::RescaleUnderflow {
                count,
                max_run,
                run_level,
            } => {
                write!(f, "underflow: {} {} {}", count, max_run, run_level)
            }
            DiagnosticKind::RescaleOverflow {
                total,
                count,
                run_level,
            } => {
                write!(f, "overflow: {} {} {}", total, count, run_level)
            }
        }
    }
}

/// One reported anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// 1-based input line, when the anomaly came from the parser
    pub line: Option<u64>,
    /// The offending input (truncated) or other free-form context
    pub context: String,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            line: None,
            context: String::new(),
        }
    }

    /// Anomaly that left a wrong value in the emitted profile
    pub fn error(kind: DiagnosticKind) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(kind)
        }
    }

    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = truncate(context, DIAGNOSTIC_CONTEXT_LEN).to_string();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(f, "{}", self.kind)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context)?;
        }
        Ok(())
    }
}

/// Receiver for diagnostics
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn report(&mut self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Forwards diagnostics to the `log` facade and keeps a count
#[derive(Debug, Default)]
pub struct LogSink {
    reported: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reported(&self) -> u64 {
        self.reported
    }
}

impl DiagnosticSink for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.reported += 1;
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

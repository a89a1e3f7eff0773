//! Trace parsing.
//!
//! This module handles:
//! - Classifying `perf script` lines (switch, sample, noise)
//! - Extracting header and payload fields without a general parser
//! - Assembling sample blocks into typed events

pub mod event;
pub mod stream;
pub mod tokenizer;

// Re-export main types
pub use event::{ContextSwitch, Event, Frame, SampleEvent};
pub use stream::{parse_events, read_trace_line, EventParser, EventStream};
pub use tokenizer::{EventMatcher, LineKind};

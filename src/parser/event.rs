//! Typed events recognised in a `perf script` trace.

use crate::utils::config::UNRESOLVED_SYMBOL;

/// A single captured stack frame (`<hex address> <symbol>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u64,
    pub symbol: String,
}

impl Frame {
    pub fn new(address: u64, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
        }
    }

    /// True when perf could not resolve a symbol for this address
    pub fn is_unresolved(&self) -> bool {
        self.symbol == UNRESOLVED_SYMBOL
    }
}

/// A `sched:sched_switch` record.
///
/// `pid`/`tid` come from the line header (the cpu's current task as perf sees
/// it); `prev_tid`/`next_tid` are the `prev_pid=`/`next_pid=` payload fields,
/// which despite their names are thread ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSwitch {
    pub pid: u32,
    pub tid: u32,
    pub cpu: Option<u32>,
    pub prev_tid: u32,
    pub next_tid: u32,
}

/// A sampling-event record with its call chain, innermost frame first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleEvent {
    pub pid: u32,
    pub tid: u32,
    pub cpu: Option<u32>,
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ContextSwitch(ContextSwitch),
    Sample(SampleEvent),
}

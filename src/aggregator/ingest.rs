//! Ingest phase: routes parsed events into the accounting tables.
//!
//! [`Ingest`] owns every mutable table (thread registry, processes, interned
//! stacks). It is driven one event at a time and, once the stream is
//! exhausted, consumed into an immutable [`IngestSnapshot`] for finalize.

use super::interner::{StackId, StackInterner};
use super::resolver::ThreadRegistry;
use super::tracker::{Process, ProcessTable};
use crate::parser::{ContextSwitch, Event, EventParser, Frame, SampleEvent};
use crate::utils::config::{DEFAULT_SAMPLE_EVENT, DEFAULT_SWITCH_EVENT};
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use log::debug;

/// Options that affect what gets accounted during ingest
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Only account samples of this pid (switches are never filtered)
    pub target_pid: Option<u32>,

    /// Account samples taken before the process became multithreaded
    pub include_init: bool,

    /// Drop frames perf could not symbolize before interning
    pub drop_unresolved: bool,

    pub switch_event: String,
    pub sample_event: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            target_pid: None,
            include_init: true,
            drop_unresolved: false,
            switch_event: DEFAULT_SWITCH_EVENT.to_string(),
            sample_event: DEFAULT_SAMPLE_EVENT.to_string(),
        }
    }
}

impl IngestOptions {
    /// Parser recognising the configured event names
    pub fn parser(&self) -> EventParser {
        EventParser::new(&self.switch_event, &self.sample_event)
    }
}

/// All samples of one process that share a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBucket {
    pub stack_hash: u64,
    /// Fixed by the first observation, never updated
    pub run_level: u32,
    pub raw_count: u64,
    pub stack: StackId,
}

impl SampleBucket {
    fn new(stack_hash: u64, run_level: u32, stack: StackId) -> Self {
        Self {
            stack_hash,
            run_level,
            raw_count: 0,
            stack,
        }
    }
}

/// Counters for the debug log
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub switches: u64,
    pub samples: u64,
    pub samples_accepted: u64,
}

/// Owner of all accounting state during ingest
#[derive(Debug, Default)]
pub struct Ingest {
    options: IngestOptions,
    registry: ThreadRegistry,
    processes: ProcessTable,
    interner: StackInterner,
    stats: IngestStats,
}

impl Ingest {
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn handle<S: DiagnosticSink>(&mut self, event: Event, sink: &mut S) {
        match event {
            Event::ContextSwitch(switch) => self.on_switch(&switch),
            Event::Sample(sample) => self.on_sample(sample, sink),
        }
    }

    fn on_switch(&mut self, switch: &ContextSwitch) {
        self.stats.switches += 1;
        self.registry.record(switch.tid, switch.pid);

        let from_pid = self.registry.resolve_and_record(switch.prev_tid);
        let to_pid = self.registry.resolve_and_record(switch.next_tid);
        self.processes.apply_switch(from_pid, to_pid);
    }

    fn on_sample<S: DiagnosticSink>(&mut self, sample: SampleEvent, sink: &mut S) {
        self.stats.samples += 1;
        self.registry.record(sample.tid, sample.pid);

        if let Some(target) = self.options.target_pid {
            if target != sample.pid {
                return;
            }
        }

        let process = self.processes.get_or_create(sample.pid);
        if !self.options.include_init && !process.multithreaded {
            return;
        }

        let run_level = process.sampling_run_level();
        *process.load_histogram.entry(run_level).or_insert(0) += 1;

        let frames: Vec<Frame> = if self.options.drop_unresolved {
            sample
                .frames
                .into_iter()
                .filter(|f| !f.is_unresolved())
                .collect()
        } else {
            sample.frames
        };

        let (hash, stack) = self.interner.intern(&frames, run_level);
        let bucket = process
            .buckets
            .entry(hash)
            .or_insert_with(|| SampleBucket::new(hash, run_level, stack));
        if bucket.run_level != run_level {
            sink.report(Diagnostic::warning(DiagnosticKind::MisaccountedSample {
                observed: run_level,
                recorded: bucket.run_level,
            }));
        }
        bucket.raw_count += 1;
        process.total_samples += 1;
        self.stats.samples_accepted += 1;
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn interner(&self) -> &StackInterner {
        &self.interner
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// End ingest. No event can be accounted after this.
    pub fn finish(self) -> IngestSnapshot {
        debug!(
            "Ingest finished: {} switches, {}/{} samples accepted, {} processes, {} threads, {} stacks",
            self.stats.switches,
            self.stats.samples_accepted,
            self.stats.samples,
            self.processes.len(),
            self.registry.len(),
            self.interner.stack_count()
        );
        IngestSnapshot {
            processes: self.processes,
            interner: self.interner,
            stats: self.stats,
        }
    }
}

/// Read-only result of ingest, handed to finalize
#[derive(Debug, Clone)]
pub struct IngestSnapshot {
    processes: ProcessTable,
    interner: StackInterner,
    stats: IngestStats,
}

impl IngestSnapshot {
    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn process(&self, pid: u32) -> Option<&Process> {
        self.processes.get(pid)
    }

    pub fn interner(&self) -> &StackInterner {
        &self.interner
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

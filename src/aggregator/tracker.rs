//! Per-process run-level tracking from scheduler switches.
//!
//! `run_level` approximates how many threads of a process are on a cpu right
//! now: +1 when one of its threads is switched in, -1 (floored at zero) when
//! one is switched out. A trace that starts mid-execution or drops events
//! makes the count drift; we clamp and carry on.

use super::ingest::SampleBucket;
use std::collections::{BTreeMap, HashMap};

/// Accounting state for one observed process
#[derive(Debug, Clone)]
pub struct Process {
    pub pid: u32,
    /// Samples accepted for this process
    pub total_samples: u64,
    pub run_level: u32,
    /// Sticky: set once `run_level` has exceeded 1
    pub multithreaded: bool,
    /// Samples per run-level at capture time
    pub load_histogram: BTreeMap<u32, u64>,
    /// One bucket per distinct stack hash
    pub buckets: HashMap<u64, SampleBucket>,
}

impl Process {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            total_samples: 0,
            run_level: 0,
            multithreaded: false,
            load_histogram: BTreeMap::new(),
            buckets: HashMap::new(),
        }
    }

    pub fn switch_in(&mut self) {
        self.run_level = self.run_level.saturating_add(1);
        if self.run_level > 1 {
            self.multithreaded = true;
        }
    }

    pub fn switch_out(&mut self) {
        self.run_level = self.run_level.saturating_sub(1);
    }

    /// Run-level to account a sample at. A sampled thread is running, so a
    /// zero (trace started mid-run) counts as one.
    pub fn sampling_run_level(&self) -> u32 {
        self.run_level.max(1)
    }
}

/// All processes seen in the trace, created lazily
#[derive(Debug, Default, Clone)]
pub struct ProcessTable {
    processes: HashMap<u32, Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, pid: u32) -> &mut Process {
        self.processes
            .entry(pid)
            .or_insert_with(|| Process::new(pid))
    }

    pub fn get(&self, pid: u32) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// Apply one switch: `from_pid` loses a running thread, `to_pid` gains one
    pub fn apply_switch(&mut self, from_pid: u32, to_pid: u32) {
        self.get_or_create(from_pid).switch_out();
        self.get_or_create(to_pid).switch_in();
    }

    /// Process with the most accepted samples; ties go to the lowest pid
    pub fn busiest(&self) -> Option<&Process> {
        self.processes
            .values()
            .filter(|p| p.total_samples > 0)
            .max_by(|a, b| {
                a.total_samples
                    .cmp(&b.total_samples)
                    .then_with(|| b.pid.cmp(&a.pid))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

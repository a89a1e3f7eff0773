//! Thread id → process id resolution.
//!
//! The trace only tells us a thread's owner on the header of its own event
//! lines. Switch payloads name bare thread ids, so anything not seen in a
//! header yet is assumed to be a main thread (tid == pid). That guess can
//! misattribute threads that show up in a switch before their first header.

use std::collections::HashMap;

/// Growing `tid -> pid` map; entries are overwritten, never removed
#[derive(Debug, Default, Clone)]
pub struct ThreadRegistry {
    owners: HashMap<u32, u32>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authoritative owner from an event header
    pub fn record(&mut self, tid: u32, pid: u32) {
        self.owners.insert(tid, pid);
    }

    /// Owner of `tid`, falling back to `tid` itself when unknown.
    ///
    /// A recorded owner of 0 counts as unknown: only the idle task has pid 0.
    pub fn resolve(&self, tid: u32) -> u32 {
        match self.owners.get(&tid) {
            Some(&pid) if pid != 0 => pid,
            _ => tid,
        }
    }

    /// Resolve `tid` and remember the answer
    pub fn resolve_and_record(&mut self, tid: u32) -> u32 {
        let pid = self.resolve(tid);
        self.owners.insert(tid, pid);
        pid
    }

    pub fn owner(&self, tid: u32) -> Option<u32> {
        self.owners.get(&tid).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_thread_is_its_own_process() {
        let registry = ThreadRegistry::new();
        assert_eq!(registry.resolve(4242), 4242);
    }

    #[test]
    fn test_recorded_owner_wins() {
        let mut registry = ThreadRegistry::new();
        registry.record(101, 100);
        assert_eq!(registry.resolve(101), 100);
        assert_eq!(registry.resolve_and_record(101), 100);
    }

    #[test]
    fn test_zero_owner_falls_back_to_tid() {
        let mut registry = ThreadRegistry::new();
        registry.record(7, 0);
        assert_eq!(registry.resolve(7), 7);
        registry.record(0, 0);
        assert_eq!(registry.resolve(0), 0);
    }

    #[test]
    fn test_heuristic_entry_is_overwritten_by_header() {
        let mut registry = ThreadRegistry::new();
        assert_eq!(registry.resolve_and_record(101), 101);
        registry.record(101, 100);
        assert_eq!(registry.owner(101), Some(100));
        assert_eq!(registry.len(), 1);
    }
}

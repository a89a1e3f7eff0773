//! Stack interning.
//!
//! Every sampled call chain becomes a [`Stack`] of canonical [`Location`]s,
//! each pointing at a canonical [`Function`]. Stacks are keyed by a 64-bit
//! digest of their address sequence, so the output size is bounded by the
//! number of distinct stacks rather than the number of samples. Symbol text
//! plays no part in identity; perf occasionally resolves the same address
//! differently and that must not split a stack.

use crate::parser::Frame;
use crate::utils::config::LOAD_FRAME_PREFIX;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

pub type LocationId = u64;
pub type FunctionId = u64;

/// Index of an interned stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: LocationId,
    pub address: u64,
    pub function_id: FunctionId,
}

/// Innermost frame first; the last location is the synthetic `LOAD <n>` frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub hash: u64,
    pub locations: Vec<LocationId>,
}

/// Synthetic run-level frames live in their own key space so that a small
/// run-level can never alias a real instruction address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LocationKey {
    Address(u64),
    RunLevel(u32),
}

/// Name of the synthetic leaf frame for `run_level`
pub fn load_frame_name(run_level: u32) -> String {
    format!("{} {}", LOAD_FRAME_PREFIX, run_level)
}

/// SHA-256 over the little-endian address sequence (run-level last),
/// truncated to its first 8 bytes
pub fn stack_hash(frames: &[Frame], run_level: u32) -> u64 {
    let mut hasher = Sha256::new();
    for frame in frames {
        hasher.update(frame.address.to_le_bytes());
    }
    hasher.update(u64::from(run_level).to_le_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(id)
}

/// Canonical stack, location and function tables
#[derive(Debug, Default, Clone)]
pub struct StackInterner {
    stack_index: HashMap<u64, StackId>,
    stacks: Vec<Stack>,
    location_index: HashMap<LocationKey, LocationId>,
    locations: Vec<Location>,
    function_index: HashMap<String, FunctionId>,
    functions: Vec<Function>,
}

impl StackInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `frames` plus the run-level frame; returns the stack hash and id.
    ///
    /// Only the first occurrence of a hash allocates anything.
    pub fn intern(&mut self, frames: &[Frame], run_level: u32) -> (u64, StackId) {
        let hash = stack_hash(frames, run_level);
        if let Some(&id) = self.stack_index.get(&hash) {
            return (hash, id);
        }

        let mut locations = Vec::with_capacity(frames.len() + 1);
        for frame in frames {
            let key = LocationKey::Address(frame.address);
            let loc = self.intern_location(key, frame.address, &frame.symbol);
            locations.push(loc);
        }
        let load_name = load_frame_name(run_level);
        locations.push(self.intern_location(
            LocationKey::RunLevel(run_level),
            u64::from(run_level),
            &load_name,
        ));

        let id = StackId(self.stacks.len());
        self.stacks.push(Stack { hash, locations });
        self.stack_index.insert(hash, id);
        (hash, id)
    }

    fn intern_location(&mut self, key: LocationKey, address: u64, symbol: &str) -> LocationId {
        if let Some(&id) = self.location_index.get(&key) {
            return id;
        }
        let function_id = self.intern_function(symbol);
        let id = self.locations.len() as LocationId + 1;
        self.locations.push(Location {
            id,
            address,
            function_id,
        });
        self.location_index.insert(key, id);
        id
    }

    fn intern_function(&mut self, name: &str) -> FunctionId {
        if let Some(&id) = self.function_index.get(name) {
            return id;
        }
        let id = self.functions.len() as FunctionId + 1;
        self.functions.push(Function {
            id,
            name: name.to_string(),
        });
        self.function_index.insert(name.to_string(), id);
        id
    }

    pub fn stack(&self, id: StackId) -> Option<&Stack> {
        self.stacks.get(id.0)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.locations.get(index)
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.functions.get(index)
    }

    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(entries: &[(u64, &str)]) -> Vec<Frame> {
        entries.iter().map(|(a, s)| Frame::new(*a, *s)).collect()
    }

    #[test]
    fn test_symbol_text_does_not_affect_identity() {
        let mut interner = StackInterner::new();
        let (h1, id1) = interner.intern(&frames(&[(0x10, "foo"), (0x20, "main")]), 1);
        let (h2, id2) = interner.intern(&frames(&[(0x10, "foo.cold"), (0x20, "[unknown]")]), 1);

        assert_eq!(h1, h2);
        assert_eq!(id1, id2);
        assert_eq!(interner.stack_count(), 1);
        // first symbol seen for an address is kept
        let loc = interner.location(1).unwrap();
        assert_eq!(interner.function(loc.function_id).unwrap().name, "foo");
    }

    #[test]
    fn test_run_level_distinguishes_stacks() {
        let mut interner = StackInterner::new();
        let f = frames(&[(0x10, "foo")]);
        let (h1, _) = interner.intern(&f, 1);
        let (h2, _) = interner.intern(&f, 2);
        assert_ne!(h1, h2);
        assert_eq!(interner.stack_count(), 2);
        // 0x10 shared, plus LOAD 1 and LOAD 2
        assert_eq!(interner.location_count(), 3);
    }

    #[test]
    fn test_load_frame_is_trailing() {
        let mut interner = StackInterner::new();
        let (_, id) = interner.intern(&frames(&[(0x10, "foo"), (0x20, "main")]), 3);
        let stack = interner.stack(id).unwrap();
        assert_eq!(stack.locations.len(), 3);

        let last = interner.location(*stack.locations.last().unwrap()).unwrap();
        assert_eq!(last.address, 3);
        assert_eq!(interner.function(last.function_id).unwrap().name, "LOAD 3");
    }

    #[test]
    fn test_load_frame_does_not_alias_small_address() {
        let mut interner = StackInterner::new();
        interner.intern(&frames(&[(2, "tiny")]), 2);
        // address 2 and LOAD 2 are distinct locations and functions
        assert_eq!(interner.location_count(), 2);
        assert_eq!(interner.function_count(), 2);
    }

    #[test]
    fn test_functions_interned_by_name() {
        let mut interner = StackInterner::new();
        interner.intern(&frames(&[(0x10, "memcpy"), (0x20, "main")]), 1);
        interner.intern(&frames(&[(0x11, "memcpy"), (0x20, "main")]), 1);
        // memcpy, main, LOAD 1
        assert_eq!(interner.function_count(), 3);
        assert_eq!(interner.location_count(), 4);
    }

    #[test]
    fn test_lookup_out_of_range() {
        let interner = StackInterner::new();
        assert!(interner.location(0).is_none());
        assert!(interner.function(1).is_none());
    }

    #[test]
    fn test_stack_hash_is_order_sensitive() {
        let a = stack_hash(&frames(&[(1, "a"), (2, "b")]), 1);
        let b = stack_hash(&frames(&[(2, "b"), (1, "a")]), 1);
        assert_ne!(a, b);
    }
}

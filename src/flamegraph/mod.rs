//! Flamegraph generation using the inferno library.
//!
//! This module converts the emitted profile into collapsed stacks and renders
//! them as an interactive SVG flamegraph, one tower per run-level.

pub mod generator;

// Re-export main types
pub use generator::{collapsed_stacks, generate_flamegraph, CollapsedStack, FlamegraphConfig};

//! Profile artifact schema and the finalize phase that produces it.

pub mod emitter;
pub mod schema;

pub use emitter::{finalize, select_subject, FinalizeOptions, Finalized};
pub use schema::{Function, Location, Profile, ProfileSummary, Sample, ValueType};

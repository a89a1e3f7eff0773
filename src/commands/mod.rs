//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod models;
pub mod profile;
pub mod utils;

// Re-export main command functions
pub use models::{OutputFormat, ProfileArgs, TraceSource};
pub use profile::{execute_profile, validate_args};
pub use utils::{display_version, validate_profile_file};

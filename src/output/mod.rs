//! Output writers for profile data and flamegraphs.
//!
//! This module handles writing data to disk in various formats:
//! - JSON profiles (readable back for validation)
//! - Gzipped pprof protobuf
//! - SVG flamegraphs

pub mod json;
pub mod pprof;
pub mod svg;

use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use json::{profile_to_string, read_profile, write_profile};
pub use pprof::{decode_pprof, encode_pprof, to_pprof, write_pprof};
pub use svg::write_svg;

/// Reject empty or directory paths and create missing parent directories
pub(crate) fn prepare_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

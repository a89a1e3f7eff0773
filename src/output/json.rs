//! JSON profile output writer.
//!
//! Writes Profile structs to JSON files with proper formatting.

use super::prepare_output_path;
use crate::profile::Profile;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Write a profile to a JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - Path cannot be created or is invalid
pub fn write_profile(profile: &Profile, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing profile to: {}", output_path.display());
    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, profile).map_err(OutputError::SerializationFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    info!(
        "Profile written successfully ({} bytes)",
        calculate_file_size(output_path)
    );

    Ok(())
}

pub fn profile_to_string(profile: &Profile) -> Result<String, OutputError> {
    serde_json::to_string_pretty(profile).map_err(OutputError::SerializationFailed)
}

fn calculate_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Read a profile from a JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - File read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_profile(input_path: impl AsRef<Path>) -> Result<Profile, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading profile from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let profile: Profile =
        serde_json::from_reader(BufReader::new(file)).map_err(OutputError::SerializationFailed)?;

    debug!(
        "Profile loaded: version {}, pid {}, {} samples",
        profile.version,
        profile.summary.pid,
        profile.samples.len()
    );

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Function, Location, ProfileSummary, Sample, ValueType};
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn create_test_profile() -> Profile {
        Profile {
            version: "1.0.0".to_string(),
            generated_at: "2024-01-01T00:00:00+00:00".to_string(),
            summary: ProfileSummary {
                pid: 100,
                total_samples: 3,
                avg_load: 1.0,
                max_load: 1,
                rescaled: true,
            },
            period: 250_000,
            period_type: ValueType::new("cpu", "nanoseconds"),
            sample_types: vec![
                ValueType::new("samples", "count"),
                ValueType::new("cpu", "nanoseconds"),
            ],
            samples: vec![Sample {
                values: vec![3, 750_000],
                location_ids: vec![1, 2],
                run_level: 1,
            }],
            locations: vec![
                Location {
                    id: 1,
                    address: 0x4005d6,
                    function_id: 1,
                },
                Location {
                    id: 2,
                    address: 1,
                    function_id: 2,
                },
            ],
            functions: vec![
                Function {
                    id: 1,
                    name: "compute".to_string(),
                },
                Function {
                    id: 2,
                    name: "LOAD 1".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_write_and_read_profile() {
        let profile = create_test_profile();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_profile(&profile, path).unwrap();
        let loaded = read_profile(path).unwrap();

        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_value_type_field_is_named_type() {
        let json = profile_to_string(&create_test_profile()).unwrap();
        assert!(json.contains("\"type\": \"cpu\""));
        assert!(!json.contains("\"kind\""));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/profile.json");

        write_profile(&create_test_profile(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_read_rejects_non_profile_json() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{\"hello\": 1}").unwrap();
        assert!(matches!(
            read_profile(temp_file.path()),
            Err(OutputError::SerializationFailed(_))
        ));
    }
}

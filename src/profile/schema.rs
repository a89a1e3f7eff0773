//! Output schema for the profile artifact.
//!
//! This mirrors the pprof data model (samples over a location/function
//! table, a period and value types) so the same struct can be written as
//! JSON or encoded as a pprof protobuf.

use serde::{Deserialize, Serialize};

/// Top-level profile structure written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when profile was generated (RFC 3339)
    pub generated_at: String,

    pub summary: ProfileSummary,

    /// Nanoseconds of cpu time one sample stands for
    pub period: i64,
    pub period_type: ValueType,

    /// Meaning of each entry of `Sample::values`
    pub sample_types: Vec<ValueType>,

    pub samples: Vec<Sample>,
    pub locations: Vec<Location>,
    pub functions: Vec<Function>,
}

/// Subject process summary, as printed on the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub pid: u32,
    pub total_samples: u64,
    pub avg_load: f64,
    pub max_load: u32,
    /// Whether sample values were rescaled to real time
    pub rescaled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueType {
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
}

impl ValueType {
    pub fn new(kind: &str, unit: &str) -> Self {
        Self {
            kind: kind.to_string(),
            unit: unit.to_string(),
        }
    }
}

/// One stack with its weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// `[count, count * period]`
    pub values: Vec<i64>,
    /// Innermost first; the last entry is the `LOAD <n>` frame
    pub location_ids: Vec<u64>,
    pub run_level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    pub address: u64,
    pub function_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: u64,
    pub name: String,
}

impl Profile {
    pub fn function_name(&self, function_id: u64) -> Option<&str> {
        self.functions
            .iter()
            .find(|f| f.id == function_id)
            .map(|f| f.name.as_str())
    }

    /// Frame names of a sample, innermost first
    pub fn sample_frames(&self, sample: &Sample) -> Vec<&str> {
        sample
            .location_ids
            .iter()
            .filter_map(|id| self.locations.iter().find(|l| l.id == *id))
            .map(|l| self.function_name(l.function_id).unwrap_or("?"))
            .collect()
    }
}

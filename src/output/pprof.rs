//! pprof output writer.
//!
//! Converts the profile artifact to the `perftools.profiles.Profile` protobuf
//! and writes it gzip-compressed, which is what `go tool pprof` and most
//! pprof viewers expect.

use super::prepare_output_path;
use crate::profile::Profile;
use crate::utils::error::OutputError;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use log::{debug, info};
use prost::Message;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const GZIP_COMPRESSION_LEVEL: u32 = 6;

/// The subset of `profile.proto` we emit. Field tags match upstream.
pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Profile {
        #[prost(message, repeated, tag = "1")]
        pub sample_type: Vec<ValueType>,
        #[prost(message, repeated, tag = "2")]
        pub sample: Vec<Sample>,
        #[prost(message, repeated, tag = "4")]
        pub location: Vec<Location>,
        #[prost(message, repeated, tag = "5")]
        pub function: Vec<Function>,
        /// `string_table[0]` must always be `""`
        #[prost(string, repeated, tag = "6")]
        pub string_table: Vec<String>,
        #[prost(int64, tag = "9")]
        pub time_nanos: i64,
        #[prost(message, optional, tag = "11")]
        pub period_type: Option<ValueType>,
        #[prost(int64, tag = "12")]
        pub period: i64,
        #[prost(int64, repeated, tag = "13")]
        pub comment: Vec<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ValueType {
        #[prost(int64, tag = "1")]
        pub r#type: i64,
        #[prost(int64, tag = "2")]
        pub unit: i64,
    }

    /// The leaf is at `location_id[0]`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Sample {
        #[prost(uint64, repeated, tag = "1")]
        pub location_id: Vec<u64>,
        #[prost(int64, repeated, tag = "2")]
        pub value: Vec<i64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Location {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(uint64, tag = "3")]
        pub address: u64,
        #[prost(message, repeated, tag = "4")]
        pub line: Vec<Line>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Line {
        #[prost(uint64, tag = "1")]
        pub function_id: u64,
        #[prost(int64, tag = "2")]
        pub line: i64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Function {
        #[prost(uint64, tag = "1")]
        pub id: u64,
        #[prost(int64, tag = "2")]
        pub name: i64,
        #[prost(int64, tag = "3")]
        pub system_name: i64,
    }
}

/// Deduplicating string table with `""` at index 0
#[derive(Debug)]
struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, i64>,
}

impl StringTable {
    fn new() -> Self {
        let mut table = Self {
            strings: Vec::new(),
            index: HashMap::new(),
        };
        table.intern("");
        table
    }

    fn intern(&mut self, s: &str) -> i64 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as i64;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), idx);
        idx
    }

    fn into_strings(self) -> Vec<String> {
        self.strings
    }
}

fn timestamp_nanos(generated_at: &str) -> i64 {
    DateTime::parse_from_rfc3339(generated_at)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
        .timestamp_nanos_opt()
        .unwrap_or(0)
}

/// Build the protobuf message for a profile
pub fn to_pprof(profile: &Profile) -> proto::Profile {
    let mut strings = StringTable::new();

    let sample_type = profile
        .sample_types
        .iter()
        .map(|vt| proto::ValueType {
            r#type: strings.intern(&vt.kind),
            unit: strings.intern(&vt.unit),
        })
        .collect();
    let period_type = Some(proto::ValueType {
        r#type: strings.intern(&profile.period_type.kind),
        unit: strings.intern(&profile.period_type.unit),
    });

    let function = profile
        .functions
        .iter()
        .map(|f| {
            let name = strings.intern(&f.name);
            proto::Function {
                id: f.id,
                name,
                system_name: name,
            }
        })
        .collect();

    let location = profile
        .locations
        .iter()
        .map(|l| proto::Location {
            id: l.id,
            address: l.address,
            line: vec![proto::Line {
                function_id: l.function_id,
                line: 1,
            }],
        })
        .collect();

    let sample = profile
        .samples
        .iter()
        .map(|s| proto::Sample {
            location_id: s.location_ids.clone(),
            value: s.values.clone(),
        })
        .collect();

    let comment = vec![strings.intern(&format!(
        "pid={} avgload={:.1} maxload={}",
        profile.summary.pid, profile.summary.avg_load, profile.summary.max_load
    ))];

    proto::Profile {
        sample_type,
        sample,
        location,
        function,
        time_nanos: timestamp_nanos(&profile.generated_at),
        period_type,
        period: profile.period,
        comment,
        string_table: strings.into_strings(),
    }
}

/// Protobuf-encode and gzip a profile
pub fn encode_pprof(profile: &Profile) -> Result<Vec<u8>, OutputError> {
    let message = to_pprof(profile);
    let mut buf = Vec::with_capacity(message.encoded_len());
    message.encode(&mut buf)?;

    let mut gz = GzBuilder::new().write(Vec::new(), Compression::new(GZIP_COMPRESSION_LEVEL));
    gz.write_all(&buf)?;
    let compressed = gz.finish()?;
    debug!(
        "Encoded pprof: {} bytes raw, {} bytes gzipped",
        buf.len(),
        compressed.len()
    );
    Ok(compressed)
}

/// Inverse of [`encode_pprof`]
pub fn decode_pprof(bytes: &[u8]) -> Result<proto::Profile, OutputError> {
    let mut raw = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut raw)?;
    Ok(proto::Profile::decode(raw.as_slice())?)
}

/// Write a profile as a gzipped pprof file
pub fn write_pprof(profile: &Profile, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing pprof profile to: {}", output_path.display());
    prepare_output_path(output_path)?;

    let bytes = encode_pprof(profile)?;
    let mut writer = BufWriter::new(File::create(output_path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!("pprof written successfully ({} bytes)", bytes.len());
    Ok(())
}

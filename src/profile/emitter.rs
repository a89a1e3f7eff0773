//! Finalize phase: pick the subject process, rescale, emit the profile.
//!
//! Runs exactly once on an [`IngestSnapshot`]; nothing here mutates the
//! snapshot.

use super::schema::{Function, Location, Profile, ProfileSummary, Sample, ValueType};
use crate::aggregator::{
    rescale, IngestSnapshot, LoadHistogram, LoadReport, Process, SampleBucket,
};
use crate::utils::config::{PERIOD_TYPE, SAMPLE_PERIOD_NS, SAMPLE_TYPES, SCHEMA_VERSION};
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::utils::error::FinalizeError;
use chrono::Utc;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Options that affect selection and emission
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    /// Subject pid; `None` picks the process with the most samples
    pub target_pid: Option<u32>,

    /// Rescale counts to real time
    pub realtime: bool,

    /// Only emit buckets at this run-level
    pub load_filter: Option<u32>,

    pub period: i64,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            target_pid: None,
            realtime: true,
            load_filter: None,
            period: SAMPLE_PERIOD_NS,
        }
    }
}

/// Output of finalize
#[derive(Debug, Clone)]
pub struct Finalized {
    pub profile: Profile,
    pub report: LoadReport,
}

/// The process the profile is about
pub fn select_subject(
    snapshot: &IngestSnapshot,
    target_pid: Option<u32>,
) -> Result<&Process, FinalizeError> {
    match target_pid {
        Some(pid) => snapshot
            .process(pid)
            .filter(|p| p.total_samples > 0)
            .ok_or(FinalizeError::ProcessNotFound(pid)),
        None => snapshot.processes().busiest().ok_or(FinalizeError::NoProcess),
    }
}

/// Select, rescale and emit
pub fn finalize<S: DiagnosticSink>(
    snapshot: &IngestSnapshot,
    options: &FinalizeOptions,
    sink: &mut S,
) -> Result<Finalized, FinalizeError> {
    let process = select_subject(snapshot, options.target_pid)?;
    info!(
        "Subject process {} ({} samples, {} stacks)",
        process.pid,
        process.total_samples,
        process.buckets.len()
    );

    let raw = LoadHistogram::from_counts(&process.load_histogram);
    let max_run = raw.max_level();

    let (weights, rescaled) = if options.realtime {
        let rescaled = rescale(process, max_run, sink);
        (rescaled.weights, Some(rescaled.histogram))
    } else {
        let weights = process
            .buckets
            .values()
            .map(|b| (b.stack_hash, b.raw_count))
            .collect();
        (weights, None)
    };

    let report = LoadReport {
        pid: process.pid,
        max_run,
        raw,
        rescaled,
    };
    let profile = emit(snapshot, process, &weights, &report, options, sink);

    Ok(Finalized { profile, report })
}

/// `[count, count * period]` saturated to `i64`; the flag is set when anything was clamped
fn sample_values(weight: u64, period: i64) -> (Vec<i64>, bool) {
    let (count, count_clamped) = match i64::try_from(weight) {
        Ok(count) => (count, false),
        Err(_) => (i64::MAX, true),
    };
    match count.checked_mul(period) {
        Some(value) => (vec![count, value], count_clamped),
        None => (vec![count, count.saturating_mul(period)], true),
    }
}

/// Build the artifact from the subject's buckets.
///
/// Only locations and functions reachable from emitted samples are included.
fn emit<S: DiagnosticSink>(
    snapshot: &IngestSnapshot,
    process: &Process,
    weights: &HashMap<u64, u64>,
    report: &LoadReport,
    options: &FinalizeOptions,
    sink: &mut S,
) -> Profile {
    let interner = snapshot.interner();
    let weight_of = |b: &SampleBucket| weights.get(&b.stack_hash).copied().unwrap_or(b.raw_count);

    let mut buckets: Vec<&SampleBucket> = process
        .buckets
        .values()
        .filter(|b| options.load_filter.map_or(true, |level| b.run_level == level))
        .collect();
    buckets.sort_by(|a, b| {
        weight_of(b)
            .cmp(&weight_of(a))
            .then_with(|| a.stack_hash.cmp(&b.stack_hash))
    });

    let mut samples = Vec::with_capacity(buckets.len());
    let mut locations = Vec::new();
    let mut functions = Vec::new();
    let mut seen_locations = HashSet::new();
    let mut seen_functions = HashSet::new();

    for bucket in buckets {
        let Some(stack) = interner.stack(bucket.stack) else {
            continue;
        };
        let weight = weight_of(bucket);
        let (values, clamped) = sample_values(weight, options.period);
        if clamped {
            sink.report(
                Diagnostic::error(DiagnosticKind::RescaleOverflow {
                    total: weight,
                    count: bucket.raw_count,
                    run_level: bucket.run_level,
                })
                .with_context(&format!("pid {} sample values clamped", process.pid)),
            );
        }
        samples.push(Sample {
            values,
            location_ids: stack.locations.clone(),
            run_level: bucket.run_level,
        });

        for &location_id in &stack.locations {
            if !seen_locations.insert(location_id) {
                continue;
            }
            let Some(location) = interner.location(location_id) else {
                continue;
            };
            locations.push(Location {
                id: location.id,
                address: location.address,
                function_id: location.function_id,
            });
            if seen_functions.insert(location.function_id) {
                if let Some(function) = interner.function(location.function_id) {
                    functions.push(Function {
                        id: function.id,
                        name: function.name.clone(),
                    });
                }
            }
        }
    }

    debug!(
        "Emitted {} samples, {} locations, {} functions",
        samples.len(),
        locations.len(),
        functions.len()
    );

    let histogram = report.effective();
    Profile {
        version: SCHEMA_VERSION.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        summary: ProfileSummary {
            pid: process.pid,
            total_samples: histogram.total(),
            avg_load: histogram.average(),
            max_load: report.max_run,
            rescaled: report.rescaled.is_some(),
        },
        period: options.period,
        period_type: ValueType::new(PERIOD_TYPE.0, PERIOD_TYPE.1),
        sample_types: SAMPLE_TYPES
            .iter()
            .map(|(kind, unit)| ValueType::new(kind, unit))
            .collect(),
        samples,
        locations,
        functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Ingest, IngestOptions};
    use crate::parser::{ContextSwitch, Event, Frame, SampleEvent};
    use crate::utils::diagnostics::Severity;

    fn sample(pid: u32, frames: &[(u64, &str)]) -> Event {
        Event::Sample(SampleEvent {
            pid,
            tid: pid,
            cpu: None,
            frames: frames.iter().map(|(a, s)| Frame::new(*a, *s)).collect(),
        })
    }

    fn switch_in(tid: u32) -> Event {
        Event::ContextSwitch(ContextSwitch {
            pid: 0,
            tid: 0,
            cpu: None,
            prev_tid: 0,
            next_tid: tid,
        })
    }

    /// pid 1: 2 samples at run 1; pid 2: 10 samples of `hot` at run 2 and 1 of `cold` at run 4
    fn snapshot() -> IngestSnapshot {
        let mut diags: Vec<Diagnostic> = Vec::new();
        let mut ingest = Ingest::new(IngestOptions::default());
        for _ in 0..2 {
            ingest.handle(sample(1, &[(0x1, "one")]), &mut diags);
        }
        ingest.handle(switch_in(2), &mut diags);
        ingest.handle(switch_in(2), &mut diags);
        for _ in 0..10 {
            ingest.handle(sample(2, &[(0x10, "hot"), (0x20, "main")]), &mut diags);
        }
        ingest.handle(switch_in(2), &mut diags);
        ingest.handle(switch_in(2), &mut diags);
        ingest.handle(sample(2, &[(0x30, "cold"), (0x20, "main")]), &mut diags);
        ingest.finish()
    }

    #[test]
    fn test_auto_selects_busiest_process() {
        let snap = snapshot();
        assert_eq!(select_subject(&snap, None).unwrap().pid, 2);
        assert_eq!(select_subject(&snap, Some(1)).unwrap().pid, 1);
        assert!(matches!(
            select_subject(&snap, Some(99)),
            Err(FinalizeError::ProcessNotFound(99))
        ));
    }

    #[test]
    fn test_empty_trace_has_no_subject() {
        let snap = Ingest::new(IngestOptions::default()).finish();
        assert!(matches!(select_subject(&snap, None), Err(FinalizeError::NoProcess)));
    }

    #[test]
    fn test_realtime_rescale_weights() {
        let snap = snapshot();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let out = finalize(&snap, &FinalizeOptions::default(), &mut diags).unwrap();

        assert_eq!(out.report.max_run, 4);
        assert_eq!(out.report.raw.total(), 11);
        // hot: 10 * 4 / 2, cold: 1 * 4 / 4
        assert_eq!(out.profile.summary.total_samples, 21);
        assert_eq!(out.profile.samples[0].values, vec![20, 20 * SAMPLE_PERIOD_NS]);
        assert_eq!(out.profile.samples[0].run_level, 2);
        assert_eq!(out.profile.samples[1].values[0], 1);
    }

    #[test]
    fn test_raw_counts_without_realtime() {
        let snap = snapshot();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let options = FinalizeOptions {
            realtime: false,
            ..Default::default()
        };
        let out = finalize(&snap, &options, &mut diags).unwrap();
        assert!(out.report.rescaled.is_none());
        assert_eq!(out.profile.summary.total_samples, 11);
        assert_eq!(out.profile.samples[0].values[0], 10);
        assert!(!out.profile.summary.rescaled);
    }

    #[test]
    fn test_load_filter_limits_tables() {
        let snap = snapshot();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let options = FinalizeOptions {
            load_filter: Some(4),
            ..Default::default()
        };
        let out = finalize(&snap, &options, &mut diags).unwrap();

        assert_eq!(out.profile.samples.len(), 1);
        let names: Vec<&str> = out.profile.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["cold", "main", "LOAD 4"]);
        assert_eq!(out.profile.locations.len(), 3);
        // pid 1's "one" and pid 2's "hot" were interned but are not emitted
        assert!(snap.interner().function_count() > out.profile.functions.len());
    }

    #[test]
    fn test_emitted_tables_are_deduplicated() {
        let snap = snapshot();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let out = finalize(&snap, &FinalizeOptions::default(), &mut diags).unwrap();

        // hot, main, LOAD 2, cold, LOAD 4
        assert_eq!(out.profile.locations.len(), 5);
        assert_eq!(out.profile.functions.len(), 5);
        assert_eq!(
            out.profile.sample_frames(&out.profile.samples[0]),
            vec!["hot", "main", "LOAD 2"]
        );
    }

    #[test]
    fn test_sample_values_clamp() {
        assert_eq!(sample_values(3, 250_000), (vec![3, 750_000], false));
        assert_eq!(sample_values(u64::MAX, 1), (vec![i64::MAX, i64::MAX], true));
        assert_eq!(sample_values(2, i64::MAX), (vec![2, i64::MAX], true));
    }

    #[test]
    fn test_clamped_values_are_reported() {
        let snap = snapshot();
        let mut diags: Vec<Diagnostic> = Vec::new();
        let options = FinalizeOptions {
            realtime: false,
            period: i64::MAX,
            ..Default::default()
        };
        let out = finalize(&snap, &options, &mut diags).unwrap();

        // 10 * period overflows, 1 * period fits
        assert_eq!(diags.len(), 1);
        assert!(diags.iter().all(|d| d.severity == Severity::Error));
        assert!(matches!(
            diags[0].kind,
            DiagnosticKind::RescaleOverflow {
                total: 10,
                count: 10,
                run_level: 2
            }
        ));
        assert_eq!(out.profile.samples[0].values, vec![10, i64::MAX]);
        assert_eq!(out.profile.samples[1].values, vec![1, i64::MAX]);
    }
}

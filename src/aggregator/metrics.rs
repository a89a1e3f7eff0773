//! Load histogram and real-time rescaling.
//!
//! With a fixed global sampling rate, a process running `r` threads collects
//! `r` times the samples per unit of wall time that it would at one thread.
//! Rescaling multiplies each bucket by `max_run / run_level` so every
//! run-level is weighted as if it had been sampled per thread at the busiest
//! level's rate. This is an estimate built on the tracker's estimate; odd
//! results are reported, not fixed.

use super::ingest::SampleBucket;
use super::tracker::Process;
use crate::utils::config::HISTOGRAM_BAR_WIDTH;
use crate::utils::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Sample count per run-level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadHistogram {
    counts: BTreeMap<u32, u64>,
}

impl LoadHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: &BTreeMap<u32, u64>) -> Self {
        Self {
            counts: counts.clone(),
        }
    }

    /// Add `n` samples at `run_level`; wraps on overflow like the total does
    pub fn record(&mut self, run_level: u32, n: u64) {
        let slot = self.counts.entry(run_level).or_insert(0);
        *slot = slot.wrapping_add(n);
    }

    pub fn get(&self, run_level: u32) -> u64 {
        self.counts.get(&run_level).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(&level, &n)| (level, n))
    }

    pub fn total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, &n| acc.wrapping_add(n))
    }

    /// Highest run-level with an entry
    pub fn max_level(&self) -> u32 {
        self.counts.keys().next_back().copied().unwrap_or(0)
    }

    /// Largest single-level count
    pub fn max_count(&self) -> u64 {
        self.counts.values().copied().max().unwrap_or(0)
    }

    /// Mean run-level weighted by sample count
    pub fn average(&self) -> f64 {
        let (weighted, total) = self
            .counts
            .iter()
            .fold((0.0f64, 0.0f64), |(w, t), (&level, &n)| {
                (w + f64::from(level) * n as f64, t + n as f64)
            });
        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Bucket weights after rescaling, keyed by stack hash
#[derive(Debug, Clone, Default)]
pub struct Rescaled {
    pub weights: HashMap<u64, u64>,
    pub histogram: LoadHistogram,
    pub total: u64,
}

/// `count * max_run / run_level` in floating point, truncated.
///
/// Run-level 0 is treated as 1. Returns the value as computed (saturated by
/// the cast) plus a diagnostic when it was out of range.
pub fn rescale_count(count: u64, max_run: u32, run_level: u32) -> (u64, Option<DiagnosticKind>) {
    let scaled = count as f64 * f64::from(max_run) / f64::from(run_level.max(1));

    if !scaled.is_finite() || scaled < 0.0 {
        let kind = DiagnosticKind::RescaleUnderflow {
            count,
            max_run,
            run_level,
        };
        return (scaled as u64, Some(kind));
    }
    if scaled >= u64::MAX as f64 {
        let kind = DiagnosticKind::RescaleOverflow {
            total: 0,
            count,
            run_level,
        };
        return (u64::MAX, Some(kind));
    }
    (scaled as u64, None)
}

/// Rescale every bucket of `process` against `max_run`.
///
/// The histogram and total are rebuilt from the rescaled weights so their sum
/// stays equal by construction.
pub fn rescale<S: DiagnosticSink>(process: &Process, max_run: u32, sink: &mut S) -> Rescaled {
    let mut rescaled = Rescaled::default();

    let mut buckets: Vec<&SampleBucket> = process.buckets.values().collect();
    buckets.sort_by_key(|b| b.stack_hash);

    for bucket in buckets {
        let (weight, anomaly) = rescale_count(bucket.raw_count, max_run, bucket.run_level);
        if let Some(kind) = anomaly {
            sink.report(Diagnostic::warning(kind).with_context(&format!("pid {}", process.pid)));
        }

        match rescaled.total.checked_add(weight) {
            Some(total) => rescaled.total = total,
            None => {
                sink.report(
                    Diagnostic::warning(DiagnosticKind::RescaleOverflow {
                        total: rescaled.total,
                        count: weight,
                        run_level: bucket.run_level,
                    })
                    .with_context(&format!("pid {}", process.pid)),
                );
                rescaled.total = rescaled.total.wrapping_add(weight);
            }
        }

        rescaled.histogram.record(bucket.run_level, weight);
        rescaled.weights.insert(bucket.stack_hash, weight);
    }

    debug!(
        "Rescaled pid {} against max run-level {}: {} -> {} samples",
        process.pid, max_run, process.total_samples, rescaled.total
    );
    rescaled
}

/// Raw and (optionally) rescaled load distribution of the subject process
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub pid: u32,
    pub max_run: u32,
    pub raw: LoadHistogram,
    pub rescaled: Option<LoadHistogram>,
}

impl LoadReport {
    /// The histogram the profile was emitted from
    pub fn effective(&self) -> &LoadHistogram {
        self.rescaled.as_ref().unwrap_or(&self.raw)
    }

    pub fn summary_line(&self) -> String {
        let histogram = self.effective();
        format!(
            "pid={} samples={} avgload={:.1}",
            self.pid,
            histogram.total(),
            histogram.average()
        )
    }

    /// Summary line plus one bar per run-level from 1 to `max_run`
    pub fn render(&self) -> String {
        let mut lines = vec![self.summary_line()];
        lines.extend(render_bars(self.effective()));
        lines.join("\n")
    }
}

/// `<level> [<pct>%]: ****`, bar length relative to the busiest level
pub fn render_bars(histogram: &LoadHistogram) -> Vec<String> {
    let total = histogram.total() as f64;
    let max_count = histogram.max_count() as f64;

    (1..=histogram.max_level())
        .map(|level| {
            let n = histogram.get(level) as f64;
            let pct = if total > 0.0 { n / total * 100.0 } else { 0.0 };
            let stars = if max_count > 0.0 {
                (n / max_count * HISTOGRAM_BAR_WIDTH + 0.5) as usize
            } else {
                0
            };
            format!("{:2} [{:5.2}%]: {}", level, pct, "*".repeat(stars))
        })
        .collect()
}

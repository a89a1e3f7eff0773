use perf_runlevel::aggregator::{Ingest, IngestOptions, IngestSnapshot};
use perf_runlevel::parser::parse_events;
use perf_runlevel::perf::ingest_reader;
use perf_runlevel::profile::{finalize, FinalizeOptions};
use perf_runlevel::utils::{Diagnostic, DiagnosticKind, FinalizeError};
use pretty_assertions::assert_eq;
use std::io::Cursor;

/// `app` (pid 100) runs threads 101 and 102; `tool` (pid 200) runs alone.
const TRACE: &str = "\
# ========
# captured on    : Mon Jan  1 00:00:00 2024
# ========
     100/101   [000] cycles:
\t4005d6 compute
\t400a10 main

     100/102   [001] cycles:
\t4005d6 compute
\t400a10 main

     200/200   [002] cycles:
\t7f00 poll
\t7f10 main

       0/0     [000] sched:sched_switch: prev_comm=swapper/0 prev_pid=0 prev_prio=120 prev_state=R ==> next_comm=app next_pid=101 next_prio=120
\tffffffff817297f0 __schedule
\tffffffff8172a109 schedule_idle

       0/0     [001] sched:sched_switch: prev_comm=swapper/1 prev_pid=0 prev_prio=120 prev_state=R ==> next_comm=app next_pid=102 next_prio=120

     100/101   [000] cycles:
\t4005d6 compute
\t400a10 main

     100/102   [001] cycles:
\t4005f0 [unknown]
\t400a10 main

     100/102   [001] sched:sched_switch: prev_comm=app prev_pid=102 prev_prio=120 prev_state=S ==> next_comm=swapper/1 next_pid=0 next_prio=120

     100/101   [000] cycles:
\t4005d6 compute
\t400a10 main

";

fn ingest(text: &str, options: IngestOptions) -> (IngestSnapshot, Vec<Diagnostic>) {
    let outcome = ingest_reader(Cursor::new(text.as_bytes()), options, Vec::new()).unwrap();
    (outcome.snapshot, outcome.sink)
}

#[test]
fn test_busiest_process_is_subject() {
    let (snapshot, diags) = ingest(TRACE, IngestOptions::default());
    assert!(diags.is_empty());

    let app = snapshot.process(100).unwrap();
    assert_eq!(app.total_samples, 5);
    assert!(app.multithreaded);
    assert_eq!(snapshot.process(200).unwrap().total_samples, 1);

    let mut sink: Vec<Diagnostic> = Vec::new();
    let out = finalize(&snapshot, &FinalizeOptions::default(), &mut sink).unwrap();
    assert_eq!(out.profile.summary.pid, 100);
}

#[test]
fn test_histogram_sum_matches_total() {
    let (snapshot, _) = ingest(TRACE, IngestOptions::default());
    let app = snapshot.process(100).unwrap();
    let raw: u64 = app.load_histogram.values().sum();
    assert_eq!(raw, app.total_samples);

    let mut sink: Vec<Diagnostic> = Vec::new();
    let out = finalize(&snapshot, &FinalizeOptions::default(), &mut sink).unwrap();
    let rescaled = out.report.rescaled.as_ref().unwrap();
    let weights: i64 = out.profile.samples.iter().map(|s| s.values[0]).sum();
    assert_eq!(rescaled.total(), out.profile.summary.total_samples);
    assert_eq!(weights as u64, rescaled.total());
}

#[test]
fn test_run_levels_per_sample() {
    let (snapshot, _) = ingest(TRACE, IngestOptions::default());
    let app = snapshot.process(100).unwrap();
    // two samples before any switch, two at run-level 2, one after 102 left
    assert_eq!(app.load_histogram.get(&1), Some(&3));
    assert_eq!(app.load_histogram.get(&2), Some(&2));
    assert_eq!(app.run_level, 1);
}

#[test]
fn test_rescale_doubles_single_thread_samples() {
    let (snapshot, _) = ingest(TRACE, IngestOptions::default());
    let mut sink: Vec<Diagnostic> = Vec::new();
    let out = finalize(&snapshot, &FinalizeOptions::default(), &mut sink).unwrap();

    let rescaled = out.report.rescaled.as_ref().unwrap();
    assert_eq!(out.report.max_run, 2);
    assert_eq!(rescaled.get(1), 6);
    assert_eq!(rescaled.get(2), 2);
    assert!((rescaled.average() - 1.25).abs() < 1e-9);
    assert!(out.report.summary_line().starts_with("pid=100 samples=8 avgload="));
}

#[test]
fn test_repeat_stack_keeps_first_run_level() {
    // compute;main first at run-level 1, seen again at 2 and at 1 again
    let (snapshot, mut diags) = ingest(TRACE, IngestOptions::default());
    let app = snapshot.process(100).unwrap();
    let mut levels: Vec<(u32, u64)> = app
        .buckets
        .values()
        .map(|b| (b.run_level, b.raw_count))
        .collect();
    levels.sort();
    // run-level is part of the stack identity, so no mismatch is possible here
    assert_eq!(levels, vec![(1, 3), (2, 1), (2, 1)]);
    diags.retain(|d| matches!(d.kind, DiagnosticKind::MisaccountedSample { .. }));
    assert!(diags.is_empty());
}

#[test]
fn test_unresolved_frames_dropped_but_sample_counted() {
    let options = IngestOptions {
        drop_unresolved: true,
        ..Default::default()
    };
    let (snapshot, _) = ingest(TRACE, options);
    let app = snapshot.process(100).unwrap();
    assert_eq!(app.total_samples, 5);

    let mut sink: Vec<Diagnostic> = Vec::new();
    let out = finalize(&snapshot, &FinalizeOptions::default(), &mut sink).unwrap();
    assert!(out.profile.functions.iter().all(|f| f.name != "[unknown]"));
}

#[test]
fn test_explicit_pid_filters_samples() {
    let options = IngestOptions {
        target_pid: Some(200),
        ..Default::default()
    };
    let (snapshot, _) = ingest(TRACE, options);
    assert_eq!(snapshot.process(100).map_or(0, |p| p.total_samples), 0);

    let mut sink: Vec<Diagnostic> = Vec::new();
    let finalize_options = FinalizeOptions {
        target_pid: Some(200),
        ..Default::default()
    };
    let out = finalize(&snapshot, &finalize_options, &mut sink).unwrap();
    assert_eq!(out.profile.summary.pid, 200);
    assert_eq!(
        out.profile.sample_frames(&out.profile.samples[0]),
        vec!["poll", "main", "LOAD 1"]
    );
}

#[test]
fn test_unknown_pid_is_fatal() {
    let (snapshot, _) = ingest(TRACE, IngestOptions::default());
    let mut sink: Vec<Diagnostic> = Vec::new();
    let options = FinalizeOptions {
        target_pid: Some(4242),
        ..Default::default()
    };
    assert!(matches!(
        finalize(&snapshot, &options, &mut sink),
        Err(FinalizeError::ProcessNotFound(4242))
    ));
}

#[test]
fn test_skip_init_ignores_samples_before_multithreading() {
    let options = IngestOptions {
        include_init: false,
        ..Default::default()
    };
    let (snapshot, _) = ingest(TRACE, options);
    assert_eq!(snapshot.process(100).unwrap().total_samples, 3);
    // pid 200 never goes multithreaded
    assert_eq!(snapshot.process(200).map_or(0, |p| p.total_samples), 0);
}

#[test]
fn test_malformed_lines_are_reported_not_fatal() {
    let text = "\
     100/abc   [000] cycles:
\t4005d6 compute

       0/0     [000] sched:sched_switch: prev_comm=swapper prev_pid=zero ==> next_pid=101
     100/101   [000] cycles:
\t4005d6 compute
";
    let mut diags: Vec<Diagnostic> = Vec::new();
    let events = parse_events(text, &mut diags);
    assert_eq!(events.len(), 1);
    assert_eq!(diags.len(), 2);
    assert_eq!(diags[0].line, Some(1));
    assert!(matches!(diags[0].kind, DiagnosticKind::MalformedSample(_)));
    assert_eq!(diags[1].line, Some(4));
    assert!(matches!(diags[1].kind, DiagnosticKind::MalformedSwitch(_)));
}

#[test]
fn test_symbol_text_does_not_split_stacks() {
    let text = "\
     100/101   [000] cycles:
\t4005d6 compute

     100/101   [000] cycles:
\t4005d6 compute(inlined)
";
    let mut diags: Vec<Diagnostic> = Vec::new();
    let mut ingest = Ingest::new(IngestOptions::default());
    for event in parse_events(text, &mut diags) {
        ingest.handle(event, &mut diags);
    }
    let snapshot = ingest.finish();
    let app = snapshot.process(100).unwrap();
    assert_eq!(app.buckets.len(), 1);
    assert_eq!(app.buckets.values().next().unwrap().raw_count, 2);
}
